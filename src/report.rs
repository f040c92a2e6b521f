//! The text report attached to every run and the object it is saved as.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::consts::REPORT_NAME_PREFIX;

/// Explains the six CAZy classes ahead of the hit table.
pub const PREAMBLE: &str = "\
The output of Hmmscan are provide below. There are six domain types, as listed below.
Each type represents one group of enzymes for biosynthesis or degradatin of complex carbohydrate.

\tGlycoside Hydrolases (GHs)      \t: \thydrolysis and/or rearrangement of glycosidic bonds
\tGlycosylTransferases (GTs) \t \t: \tformation of glycosidic bonds
\tPolysaccharide Lyases (PLs)  \t\t: \tnon-hydrolytic cleavage of glycosidic bonds
\tCarbohydrate Esterases (CEs) \t\t: \thydrolysis of carbohydrate esters
\tAuxiliary Activities (AAs)   \t\t:\tredox enzymes that act in conjunction with CAZymes
\tCarbohydrate-Binding Modules (CBMs)     : \tadhesion to carbohydrates

Details about them can be found at CAZy website (www.cazy.org)..

";

/// Column names of the dbCAN hit table.
pub const HEADER: &str =
    "Query\tDomain\te-value\tstartQuery\tendQuery\tstartDomain\tendDomain\tCoveredFraction\n";

/// A `KBaseReport.Report` object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub objects_created: Vec<serde_json::Value>,
    pub text_message: String,
}

impl Report {
    /// Preamble, header, then the tool's output verbatim.
    pub fn from_tool_output(output: &str) -> Self {
        let mut text_message = String::with_capacity(PREAMBLE.len() + HEADER.len() + output.len());
        text_message.push_str(PREAMBLE);
        text_message.push_str(HEADER);
        text_message.push_str(output);
        Self {
            objects_created: Vec::new(),
            text_message,
        }
    }
}

/// A report name no other call will produce.
pub fn unique_report_name() -> String {
    format!("{REPORT_NAME_PREFIX}{}", Uuid::new_v4().simple())
}

/// The method's return value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportResults {
    pub report_name: String,
    pub report_ref: String,
}
