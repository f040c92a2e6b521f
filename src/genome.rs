//! Genome records as stored in the workspace, and FASTA extraction.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Feature type carrying a protein translation.
const CDS: &str = "CDS";

/// A `(workspace, genome_id)` pair addressing one genome object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenomeReference {
    pub workspace: String,
    pub genome_id: String,
}

impl GenomeReference {
    pub fn new(workspace: impl Into<String>, genome_id: impl Into<String>) -> Self {
        Self {
            workspace: workspace.into(),
            genome_id: genome_id.into(),
        }
    }
}

impl fmt::Display for GenomeReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.workspace, self.genome_id)
    }
}

/// The slice of a `KBaseGenomes.Genome` this service reads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Genome {
    #[serde(default)]
    pub features: Vec<Feature>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Feature {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub feature_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protein_translation: Option<String>,
}

impl Feature {
    /// The translation, if this is a CDS that has a non-empty one.
    pub fn cds_translation(&self) -> Option<&str> {
        if self.feature_type != CDS {
            return None;
        }
        self.protein_translation
            .as_deref()
            .filter(|seq| !seq.is_empty())
    }
}

/// One FASTA entry. Renders as `>id` followed by the sequence line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastaRecord<'a> {
    pub id: &'a str,
    pub sequence: &'a str,
}

impl fmt::Display for FastaRecord<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, ">{}", self.id)?;
        writeln!(f, "{}", self.sequence)
    }
}

impl Genome {
    /// CDS features with a translation, in feature order.
    pub fn protein_records(&self) -> impl Iterator<Item = FastaRecord<'_>> {
        self.features.iter().filter_map(|feature| {
            feature.cds_translation().map(|sequence| FastaRecord {
                id: &feature.id,
                sequence,
            })
        })
    }

    /// All protein records concatenated into one FASTA document.
    pub fn protein_fasta(&self) -> String {
        self.protein_records()
            .map(|record| record.to_string())
            .collect()
    }
}
