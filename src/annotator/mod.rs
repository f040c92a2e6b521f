pub mod dbcan;

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

/// What a finished annotation run left behind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    /// Contents of the result file, unparsed.
    pub result: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("exit code {exit}\nstderr: {stderr}", exit = .code.map_or_else(|| "none (killed by signal)".to_string(), |c| c.to_string()))]
    Failed { code: Option<i32>, stderr: String },

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("could not read result file {path}: {source}")]
    MissingResult {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Something that annotates a protein FASTA file and writes a result file.
#[async_trait]
pub trait Annotator: Send + Sync {
    fn name(&self) -> &str;
    async fn annotate(&self, input: &Path, output: &Path) -> Result<ToolOutput, ToolError>;
}

/// Cut `output` to at most `max_bytes`, on a character boundary.
pub fn truncate_output(output: &str, max_bytes: usize) -> String {
    if output.len() <= max_bytes {
        return output.to_string();
    }
    let mut end = max_bytes;
    while !output.is_char_boundary(end) {
        end -= 1;
    }
    format!(
        "{}\n\n[truncated: showing {}/{} bytes]",
        &output[..end],
        end,
        output.len()
    )
}
