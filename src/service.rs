//! The `run_dbcan` method and the `status` call.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::annotator::Annotator;
use crate::config::ServiceConfig;
use crate::consts::{GIT_COMMIT_HASH, GIT_URL, INPUT_FASTA, OUTPUT_RESULT, REPORT_TYPE, VERSION};
use crate::error::{Result, RunError};
use crate::genome::{Genome, GenomeReference};
use crate::report::{Report, ReportResults, unique_report_name};
use crate::workspace::{
    ObjectSaveData, ObjectSpecification, ObjectStore, ProvenanceAction, SaveObjectsParams,
    WorkspaceError, record_input,
};

/// Input to `run_dbcan`. Keys other than these two are accepted and ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DbcanParams {
    #[serde(default)]
    pub workspace: Option<String>,
    #[serde(default)]
    pub genome_id: Option<String>,
}

impl DbcanParams {
    pub fn new(workspace: impl Into<String>, genome_id: impl Into<String>) -> Self {
        Self {
            workspace: Some(workspace.into()),
            genome_id: Some(genome_id.into()),
        }
    }

    /// Both fields present and non-empty, as a genome reference.
    pub fn validate(&self) -> Result<GenomeReference> {
        let workspace = required(&self.workspace, "workspace")?;
        let genome_id = required(&self.genome_id, "genome_id")?;
        Ok(GenomeReference::new(workspace, genome_id))
    }
}

fn required<'a>(value: &'a Option<String>, field: &'static str) -> Result<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or(RunError::Validation(field))
}

/// Per-call information supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    pub provenance: Vec<ProvenanceAction>,
}

/// Health-check result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub state: String,
    pub message: String,
    pub version: String,
    pub git_url: String,
    pub git_commit_hash: String,
}

/// Fetch a genome, annotate its proteins with dbCAN, save a report.
pub struct DbcanService {
    config: Arc<ServiceConfig>,
    store: Arc<dyn ObjectStore>,
    annotator: Arc<dyn Annotator>,
}

impl DbcanService {
    pub fn new(
        config: Arc<ServiceConfig>,
        store: Arc<dyn ObjectStore>,
        annotator: Arc<dyn Annotator>,
    ) -> Self {
        Self {
            config,
            store,
            annotator,
        }
    }

    pub fn status(&self) -> Status {
        Status {
            state: "OK".to_string(),
            message: String::new(),
            version: VERSION.to_string(),
            git_url: GIT_URL.to_string(),
            git_commit_hash: GIT_COMMIT_HASH.to_string(),
        }
    }

    #[instrument(skip_all, fields(workspace = ?params.workspace, genome_id = ?params.genome_id))]
    pub async fn run_dbcan(&self, ctx: &CallContext, params: &DbcanParams) -> Result<ReportResults> {
        info!("Starting Annotation with DBCan");
        let genome_ref = params.validate()?;
        let reference = genome_ref.to_string();

        let genome = self.fetch_genome(&reference).await?;
        info!(features = genome.features.len(), "Got Genome data.");

        // Removed when `work_dir` drops, on every return path below.
        tokio::fs::create_dir_all(&self.config.scratch)
            .await
            .map_err(RunError::io(format!(
                "cannot create scratch root {}",
                self.config.scratch.display()
            )))?;
        let work_dir = tempfile::Builder::new()
            .prefix("run_dbcan_")
            .tempdir_in(&self.config.scratch)
            .map_err(RunError::io("cannot create working directory"))?;
        let input = work_dir.path().join(INPUT_FASTA);
        let output = work_dir.path().join(OUTPUT_RESULT);

        let fasta = genome.protein_fasta();
        tokio::fs::write(&input, &fasta)
            .await
            .map_err(RunError::io(format!("cannot write {}", input.display())))?;
        info!(
            proteins = genome.protein_records().count(),
            path = %input.display(),
            "wrote Protein fasta file"
        );

        let tool_output = self
            .annotator
            .annotate(&input, &output)
            .await
            .map_err(|source| RunError::ToolExecution {
                tool: self.annotator.name().to_string(),
                source,
            })?;

        let report = Report::from_tool_output(&tool_output.result);
        let report_name = unique_report_name();
        let provenance = record_input(ctx.provenance.clone(), &reference);
        let report_ref = self
            .save_report(&genome_ref.workspace, &report_name, report, provenance)
            .await?;

        Ok(ReportResults {
            report_name,
            report_ref,
        })
    }

    async fn fetch_genome(&self, reference: &str) -> Result<Genome> {
        let retrieval = |source: WorkspaceError| RunError::Retrieval {
            reference: reference.to_string(),
            source,
        };
        let object = self
            .store
            .get_objects(&[ObjectSpecification::by_ref(reference)])
            .await
            .map_err(retrieval)?
            .into_iter()
            .next()
            .ok_or_else(|| retrieval(WorkspaceError::Empty("objects")))?;
        serde_json::from_value(object.data).map_err(|e| retrieval(e.into()))
    }

    /// Save `report` hidden in `workspace` and return `wsid/objid/version`.
    async fn save_report(
        &self,
        workspace: &str,
        name: &str,
        report: Report,
        provenance: Vec<ProvenanceAction>,
    ) -> Result<String> {
        let persistence = |source: WorkspaceError| RunError::Persistence {
            name: name.to_string(),
            workspace: workspace.to_string(),
            source,
        };
        let data = serde_json::to_value(&report).map_err(|e| persistence(e.into()))?;
        let params = SaveObjectsParams {
            workspace: workspace.to_string(),
            objects: vec![ObjectSaveData {
                object_type: REPORT_TYPE.to_string(),
                data,
                name: name.to_string(),
                meta: Default::default(),
                hidden: 1,
                provenance,
            }],
        };
        let info = self
            .store
            .save_objects(&params)
            .await
            .map_err(persistence)?
            .into_iter()
            .next()
            .ok_or_else(|| persistence(WorkspaceError::Empty("object info")))?;
        info!(report = %info.reference(), name = %info.name, "saved Report");
        Ok(info.reference())
    }
}
