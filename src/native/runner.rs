//! Helper subprocess runner

use super::{HelperFailure, HelperRequest, HelperResponse};
use crate::config::HelperCommand;
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Runs one helper call to completion
#[async_trait]
pub trait HelperRunner: Send + Sync {
    /// Run `command` in `cwd` with `request` on stdin, bounded by `timeout`
    async fn run(
        &self,
        command: &HelperCommand,
        request: &HelperRequest,
        cwd: &Path,
        timeout: Duration,
    ) -> Result<Value, HelperFailure>;
}

/// `HelperRunner` that spawns real subprocesses
#[derive(Debug, Clone, Default)]
pub struct SystemHelperRunner;

impl SystemHelperRunner {
    pub fn new() -> Self {
        Self
    }
}

/// Finds the response envelope in helper stdout.
///
/// Helpers may log before answering, so the last line that parses wins when
/// the whole output is not a single JSON document.
fn parse_response(stdout: &str) -> Option<HelperResponse> {
    if let Ok(response) = serde_json::from_str::<HelperResponse>(stdout.trim()) {
        return Some(response);
    }
    stdout
        .lines()
        .rev()
        .filter(|line| line.trim_start().starts_with('{'))
        .find_map(|line| serde_json::from_str(line.trim()).ok())
}

#[async_trait]
impl HelperRunner for SystemHelperRunner {
    async fn run(
        &self,
        command: &HelperCommand,
        request: &HelperRequest,
        cwd: &Path,
        limit: Duration,
    ) -> Result<Value, HelperFailure> {
        let payload = serde_json::to_vec(request)
            .map_err(|e| HelperFailure::setup(format!("failed to encode request: {}", e)))?;

        debug!(
            target: "native",
            program = command.program.as_str(),
            function = request.function.as_str(),
            "spawning helper"
        );

        let mut child = Command::new(&command.program)
            .args(&command.args)
            .current_dir(cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                HelperFailure::setup(format!("failed to start {}: {}", command.program, e))
            })?;

        // Feeding stdin and collecting output share one deadline; a helper
        // that never reads its input cannot stall the write
        let stdin = child.stdin.take();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                // A helper that exits early closes its stdin; its output still decides
                if let Err(e) = stdin.write_all(&payload).await {
                    debug!(target: "native", error = %e, "helper closed stdin early");
                }
            }
        };
        let exchange = async move {
            let ((), output) = tokio::join!(feed, child.wait_with_output());
            output
        };

        // Dropping the exchange on timeout drops the child, which kills it
        let output = match timeout(limit, exchange).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(HelperFailure::setup(format!(
                    "failed to wait for {}: {}",
                    command.program, e
                )))
            }
            Err(_) => {
                warn!(
                    target: "native",
                    function = request.function.as_str(),
                    "helper timed out after {} seconds",
                    limit.as_secs()
                );
                return Err(HelperFailure::timeout(format!(
                    "{} timed out after {} seconds",
                    command.program,
                    limit.as_secs()
                )));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        match parse_response(&stdout).and_then(HelperResponse::into_outcome) {
            Some(outcome) => outcome,
            None => {
                debug!(
                    target: "native",
                    exit_code = ?output.status.code(),
                    stderr = %stderr.trim(),
                    "helper produced no response"
                );
                let message = if stderr.trim().is_empty() {
                    format!("{} produced no response", command.program)
                } else {
                    stderr.trim().to_string()
                };
                Err(HelperFailure::crashed(output.status.code(), message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response_whole_output() {
        let response = parse_response("{\"result\": [\"1.0.0\"]}\n").unwrap();
        assert!(response.result.is_some());
    }

    #[test]
    fn test_parse_response_after_log_lines() {
        let stdout = "Fetching gem metadata...\n{\"result\": {\"version\": \"2.6.0\"}}\n";
        let response = parse_response(stdout).unwrap();
        assert_eq!(
            response.result,
            Some(serde_json::json!({"version": "2.6.0"}))
        );
    }

    #[test]
    fn test_parse_response_garbage() {
        assert!(parse_response("Segmentation fault").is_none());
    }

    #[cfg(unix)]
    mod unix {
        use super::super::*;
        use crate::native::FailureKind;
        use serde_json::json;
        use std::os::unix::fs::PermissionsExt;

        fn script(dir: &Path, body: &str) -> HelperCommand {
            let path = dir.join("helper.sh");
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            HelperCommand::new(path.to_string_lossy())
        }

        fn request() -> HelperRequest {
            HelperRequest::new("resolve", json!({"dependency": "boto3"}))
        }

        #[tokio::test]
        async fn test_success_reads_stdin() {
            let dir = tempfile::tempdir().unwrap();
            // Echo the function name back to prove the envelope arrived
            let command = script(
                dir.path(),
                r#"read input
case "$input" in
  *'"function":"resolve"'*) echo '{"result": "ok"}' ;;
  *) echo '{"error": "bad request", "error_class": "ArgumentError"}' ;;
esac"#,
            );
            let value = SystemHelperRunner::new()
                .run(&command, &request(), dir.path(), Duration::from_secs(10))
                .await
                .unwrap();
            assert_eq!(value, json!("ok"));
        }

        #[tokio::test]
        async fn test_reported_error() {
            let dir = tempfile::tempdir().unwrap();
            let command = script(
                dir.path(),
                r#"cat > /dev/null
echo '{"error": "Could not find a version that matches boto3==9.9.9", "error_class": "pip._internal.exceptions.DistributionNotFound"}'
exit 1"#,
            );
            let failure = SystemHelperRunner::new()
                .run(&command, &request(), dir.path(), Duration::from_secs(10))
                .await
                .unwrap_err();
            assert_eq!(failure.kind, FailureKind::Reported);
            assert!(failure.message.starts_with("Could not find a version"));
        }

        #[tokio::test]
        async fn test_crash_without_response() {
            let dir = tempfile::tempdir().unwrap();
            let command = script(dir.path(), "cat > /dev/null\necho 'boom' >&2\nexit 3");
            let failure = SystemHelperRunner::new()
                .run(&command, &request(), dir.path(), Duration::from_secs(10))
                .await
                .unwrap_err();
            assert_eq!(failure.kind, FailureKind::Crashed { exit_code: Some(3) });
            assert_eq!(failure.message, "boom");
        }

        #[tokio::test]
        async fn test_timeout_kills_helper() {
            let dir = tempfile::tempdir().unwrap();
            let command = script(dir.path(), "sleep 30");
            let start = std::time::Instant::now();
            let failure = SystemHelperRunner::new()
                .run(&command, &request(), dir.path(), Duration::from_millis(300))
                .await
                .unwrap_err();
            assert_eq!(failure.kind, FailureKind::Timeout);
            assert!(start.elapsed() < Duration::from_secs(10));
        }

        #[tokio::test]
        async fn test_timeout_covers_unread_stdin() {
            let dir = tempfile::tempdir().unwrap();
            let command = script(dir.path(), "sleep 30");
            // Larger than a pipe buffer, so the write blocks until the deadline
            let request = HelperRequest::new("resolve", json!({"padding": "x".repeat(512 * 1024)}));
            let start = std::time::Instant::now();
            let failure = SystemHelperRunner::new()
                .run(&command, &request, dir.path(), Duration::from_millis(300))
                .await
                .unwrap_err();
            assert_eq!(failure.kind, FailureKind::Timeout);
            assert!(start.elapsed() < Duration::from_secs(5));
        }

        #[tokio::test]
        async fn test_missing_program() {
            let dir = tempfile::tempdir().unwrap();
            let command = HelperCommand::new("/nonexistent/helper");
            let failure = SystemHelperRunner::new()
                .run(&command, &request(), dir.path(), Duration::from_secs(1))
                .await
                .unwrap_err();
            assert_eq!(failure.kind, FailureKind::Setup);
        }

        #[tokio::test]
        async fn test_runs_in_workspace_directory() {
            let dir = tempfile::tempdir().unwrap();
            std::fs::write(dir.path().join("requirements.in"), "boto3\n").unwrap();
            let command = script(
                dir.path(),
                r#"cat > /dev/null
if [ -f requirements.in ]; then echo '{"result": true}'; else echo '{"result": false}'; fi"#,
            );
            let value = SystemHelperRunner::new()
                .run(&command, &request(), dir.path(), Duration::from_secs(10))
                .await
                .unwrap();
            assert_eq!(value, json!(true));
        }
    }
}
