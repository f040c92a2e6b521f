use crate::annotator::ToolError;
use crate::workspace::WorkspaceError;

/// Why a `run_dbcan` call failed. Nothing is saved in any of these cases.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Parameter {0} is not set in input arguments")]
    Validation(&'static str),

    #[error("error loading original Genome object {reference} from workspace:\n    {source}")]
    Retrieval {
        reference: String,
        #[source]
        source: WorkspaceError,
    },

    #[error("{tool} failed: {source}")]
    ToolExecution {
        tool: String,
        #[source]
        source: ToolError,
    },

    #[error("error saving report {name} to workspace {workspace}: {source}")]
    Persistence {
        name: String,
        workspace: String,
        #[source]
        source: WorkspaceError,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl RunError {
    pub(crate) fn io(context: impl Into<String>) -> impl FnOnce(std::io::Error) -> Self {
        let context = context.into();
        move |source| Self::Io { context, source }
    }
}

pub type Result<T> = std::result::Result<T, RunError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_names_the_field() {
        let err = RunError::Validation("genome_id");
        assert_eq!(
            err.to_string(),
            "Parameter genome_id is not set in input arguments"
        );
    }

    #[test]
    fn retrieval_carries_underlying_trace() {
        let err = RunError::Retrieval {
            reference: "ws1/g1".to_string(),
            source: WorkspaceError::Server {
                name: "JSONRPCError".to_string(),
                code: -32500,
                message: "Object g1 cannot be accessed".to_string(),
                trace: Some("at us.kbase.workspace.WorkspaceServer".to_string()),
            },
        };
        let text = err.to_string();
        assert!(text.starts_with("error loading original Genome object ws1/g1"));
        assert!(text.contains("at us.kbase.workspace.WorkspaceServer"));
    }

    #[test]
    fn tool_timeout_message_is_self_contained() {
        let err = RunError::ToolExecution {
            tool: "dbCAN".to_string(),
            source: ToolError::Timeout(std::time::Duration::from_millis(200)),
        };
        assert_eq!(err.to_string(), "dbCAN failed: timed out after 200ms");
    }
}
