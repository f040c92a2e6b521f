//! Project-wide constants.

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Source repository, empty unless set in Cargo.toml.
pub const GIT_URL: &str = env!("CARGO_PKG_REPOSITORY");

/// Commit the binary was built from, when the build environment provides it.
pub const GIT_COMMIT_HASH: &str = match option_env!("PRDCA_GIT_COMMIT") {
    Some(hash) => hash,
    None => "",
};

/// Workspace type of the saved report object.
pub const REPORT_TYPE: &str = "KBaseReport.Report";

/// Prefix of every generated report name.
pub const REPORT_NAME_PREFIX: &str = "run_dbcan_";

/// Default workspace service endpoint.
pub const DEFAULT_WORKSPACE_URL: &str = "https://kbase.us/services/ws";

/// Default scratch root; each call gets its own directory underneath.
pub const DEFAULT_SCRATCH: &str = "/kb/module/work/tmp";

/// Default dbCAN install directory, passed to the wrapper as its first argument.
pub const DEFAULT_DBCAN_DIR: &str = "/kb/module/dbcan";

/// Default dbCAN wrapper script.
pub const DEFAULT_DBCAN_SCRIPT: &str = "/kb/module/dbcan/dbCAN.sh";

/// Interpreter used to launch the wrapper script.
pub const DEFAULT_SHELL: &str = "sh";

/// hmmscan over a full proteome can take a while.
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 3600;

/// Captured tool output beyond this many bytes is truncated in error messages.
pub const MAX_DIAGNOSTIC_BYTES: usize = 50_000;

/// File names inside the per-call scratch directory.
pub const INPUT_FASTA: &str = "input.fasta";
pub const OUTPUT_RESULT: &str = "output.result.txt";
