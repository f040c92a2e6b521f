use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::{Annotator, ToolError, ToolOutput, truncate_output};
use crate::consts::{
    DEFAULT_DBCAN_DIR, DEFAULT_DBCAN_SCRIPT, DEFAULT_SHELL, DEFAULT_TOOL_TIMEOUT_SECS,
    MAX_DIAGNOSTIC_BYTES,
};

/// How to launch the dbCAN wrapper.
#[derive(Debug, Clone)]
pub struct DbcanConfig {
    pub shell: String,
    pub script: PathBuf,
    pub install_dir: PathBuf,
    pub timeout: Duration,
    pub max_diagnostic_bytes: usize,
}

impl Default for DbcanConfig {
    fn default() -> Self {
        Self {
            shell: DEFAULT_SHELL.to_string(),
            script: PathBuf::from(DEFAULT_DBCAN_SCRIPT),
            install_dir: PathBuf::from(DEFAULT_DBCAN_DIR),
            timeout: Duration::from_secs(DEFAULT_TOOL_TIMEOUT_SECS),
            max_diagnostic_bytes: MAX_DIAGNOSTIC_BYTES,
        }
    }
}

/// Runs `<shell> <script> <install_dir> <input> <output>` and reads the
/// result file once the script exits cleanly.
pub struct DbcanTool {
    config: DbcanConfig,
}

impl DbcanTool {
    pub fn new(config: DbcanConfig) -> Self {
        Self { config }
    }

    /// Echo captured output, one `|`-prefixed line per non-empty line.
    fn log_lines(label: &str, text: &str, is_stderr: bool) {
        if text.is_empty() {
            return;
        }
        debug!("{label}:");
        for line in text.lines().filter(|l| !l.is_empty()) {
            if is_stderr {
                warn!("|{line}");
            } else {
                info!("|{line}");
            }
        }
    }
}

#[async_trait]
impl Annotator for DbcanTool {
    fn name(&self) -> &str {
        "dbCAN"
    }

    async fn annotate(&self, input: &Path, output: &Path) -> Result<ToolOutput, ToolError> {
        let cfg = &self.config;
        info!(
            script = %cfg.script.display(),
            input = %input.display(),
            output = %output.display(),
            "running dbCAN"
        );

        let mut command = Command::new(&cfg.shell);
        command
            .arg(&cfg.script)
            .arg(&cfg.install_dir)
            .arg(input)
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // The wrapper leads its own group so hmmscan and friends can be
        // signalled with it.
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|source| ToolError::Spawn {
            program: cfg.shell.clone(),
            source,
        })?;
        let group = child.id();
        let stdout_reader = tokio::spawn(read_all(child.stdout.take()));
        let stderr_reader = tokio::spawn(read_all(child.stderr.take()));

        let status = match tokio::time::timeout(cfg.timeout, child.wait()).await {
            Ok(status) => {
                // Stragglers would otherwise hold the pipes open.
                kill_group(group);
                status.map_err(|source| ToolError::Spawn {
                    program: cfg.shell.clone(),
                    source,
                })?
            }
            Err(_) => {
                kill_group(group);
                let _ = child.kill().await;
                stdout_reader.abort();
                stderr_reader.abort();
                return Err(ToolError::Timeout(cfg.timeout));
            }
        };

        let stdout = lossy(stdout_reader.await.unwrap_or_default());
        let stderr = lossy(stderr_reader.await.unwrap_or_default());
        Self::log_lines("Output", &stdout, false);
        Self::log_lines("Errors", &stderr, true);

        if !status.success() {
            return Err(ToolError::Failed {
                code: status.code(),
                stderr: truncate_output(&stderr, cfg.max_diagnostic_bytes),
            });
        }

        let text = tokio::fs::read(output)
            .await
            .map(lossy)
            .map_err(|source| ToolError::MissingResult {
                path: output.display().to_string(),
                source,
            })?;

        Ok(ToolOutput {
            stdout,
            stderr,
            result: text,
        })
    }
}

async fn read_all<R: AsyncRead + Unpin>(pipe: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf).await;
    }
    buf
}

fn lossy(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

/// SIGKILL every process in the group led by `leader`. A group that is
/// already gone is not an error.
#[cfg(unix)]
fn kill_group(leader: Option<u32>) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    if let Some(pid) = leader.and_then(|pid| i32::try_from(pid).ok()) {
        let _ = killpg(Pid::from_raw(pid), Signal::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_group(_leader: Option<u32>) {}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn tool_with_script(dir: &Path, body: &str, timeout: Duration) -> DbcanTool {
        let script = dir.join("dbCAN.sh");
        std::fs::write(&script, body).unwrap();
        DbcanTool::new(DbcanConfig {
            script,
            install_dir: dir.to_path_buf(),
            timeout,
            ..DbcanConfig::default()
        })
    }

    #[tokio::test]
    async fn passes_positional_arguments_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let tool = tool_with_script(
            dir.path(),
            "printf '%s\\n%s\\n%s\\n' \"$1\" \"$2\" \"$3\" > \"$3\"\n",
            Duration::from_secs(10),
        );
        let input = dir.path().join("in.fasta");
        let output = dir.path().join("out.txt");
        std::fs::write(&input, ">f1\nMKV\n").unwrap();

        let out = tool.annotate(&input, &output).await.unwrap();
        let lines: Vec<_> = out.result.lines().collect();
        assert_eq!(lines[0], dir.path().display().to_string());
        assert_eq!(lines[1], input.display().to_string());
        assert_eq!(lines[2], output.display().to_string());
    }

    #[tokio::test]
    async fn captures_stdout_and_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let tool = tool_with_script(
            dir.path(),
            "echo progress\necho warning >&2\n: > \"$3\"\n",
            Duration::from_secs(10),
        );
        let output = dir.path().join("out.txt");
        let out = tool
            .annotate(&dir.path().join("in.fasta"), &output)
            .await
            .unwrap();
        assert_eq!(out.stdout.trim(), "progress");
        assert_eq!(out.stderr.trim(), "warning");
        assert_eq!(out.result, "");
    }

    #[tokio::test]
    async fn nonzero_exit_is_failure_with_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let tool = tool_with_script(
            dir.path(),
            "echo 'hmmscan: command not found' >&2\nexit 127\n",
            Duration::from_secs(10),
        );
        let err = tool
            .annotate(&dir.path().join("in.fasta"), &dir.path().join("out.txt"))
            .await
            .unwrap_err();
        match err {
            ToolError::Failed { code, stderr } => {
                assert_eq!(code, Some(127));
                assert!(stderr.contains("hmmscan: command not found"));
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn clean_exit_without_result_file_is_missing_result() {
        let dir = tempfile::tempdir().unwrap();
        let tool = tool_with_script(dir.path(), "exit 0\n", Duration::from_secs(10));
        let err = tool
            .annotate(&dir.path().join("in.fasta"), &dir.path().join("out.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::MissingResult { .. }));
    }

    #[tokio::test]
    async fn slow_tool_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let tool = tool_with_script(dir.path(), "sleep 5\n", Duration::from_millis(200));
        let err = tool
            .annotate(&dir.path().join("in.fasta"), &dir.path().join("out.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Timeout(_)));
        assert_eq!(err.to_string(), "timed out after 200ms");
    }

    #[tokio::test]
    async fn timeout_kills_grandchildren() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("late");
        // hmmscan runs as a child of the wrapper, not as the wrapper itself.
        let tool = tool_with_script(
            dir.path(),
            "sh -c 'sleep 1; touch \"$0\"' \"$1/late\"\n",
            Duration::from_millis(300),
        );
        let err = tool
            .annotate(&dir.path().join("in.fasta"), &dir.path().join("out.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Timeout(_)));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!marker.exists(), "grandchild outlived the timeout");
    }

    #[tokio::test]
    async fn background_stragglers_do_not_block_completion() {
        let dir = tempfile::tempdir().unwrap();
        let tool = tool_with_script(
            dir.path(),
            "sleep 30 &\necho done > \"$3\"\n",
            Duration::from_secs(10),
        );
        let started = std::time::Instant::now();
        let out = tool
            .annotate(&dir.path().join("in.fasta"), &dir.path().join("out.txt"))
            .await
            .unwrap();
        assert_eq!(out.result, "done\n");
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn non_utf8_result_is_read_lossily() {
        let dir = tempfile::tempdir().unwrap();
        let tool = tool_with_script(
            dir.path(),
            "printf 'f1\\377\\tGH5\\n' > \"$3\"\n",
            Duration::from_secs(10),
        );
        let out = tool
            .annotate(&dir.path().join("in.fasta"), &dir.path().join("out.txt"))
            .await
            .unwrap();
        assert_eq!(out.result, "f1\u{FFFD}\tGH5\n");
    }

    #[tokio::test]
    async fn missing_shell_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let tool = DbcanTool::new(DbcanConfig {
            shell: "/nonexistent/shell".to_string(),
            ..DbcanConfig::default()
        });
        let err = tool
            .annotate(&dir.path().join("in.fasta"), &dir.path().join("out.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Spawn { .. }));
        assert_eq!(tool.name(), "dbCAN");
    }
}
