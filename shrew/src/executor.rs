use std::process::Stdio;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Instant;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

/// Result of running one command. `output` holds stdout and stderr interleaved
/// in arrival order, trimmed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandOutcome {
    pub output: String,
    pub success: bool,
    pub error: Option<String>,
}

impl CommandOutcome {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            success: true,
            error: None,
        }
    }

    pub fn failed(output: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            success: false,
            error: Some(error.into()),
        }
    }

    /// Text fed back to the model. Failures are folded in as an annotation so the
    /// model can see what went wrong and adapt.
    pub fn transcript(&self) -> String {
        match &self.error {
            None => self.output.clone(),
            Some(err) if self.output.is_empty() => format!("[error: {err}]"),
            Some(err) => format!("{}\n[error: {err}]", self.output),
        }
    }
}

/// Runs shell command strings on behalf of the agent loop.
#[async_trait::async_trait]
pub trait CommandRunner: Send + Sync + 'static {
    async fn run(&self, command: &str) -> CommandOutcome;
}

/// Runs commands through `<shell> -c` with the privileges of this process.
/// No timeout and no output cap.
pub struct ShellExecutor {
    shell_path: String,
}

impl ShellExecutor {
    pub fn new(shell_path: impl Into<String>) -> Self {
        Self {
            shell_path: shell_path.into(),
        }
    }

    pub fn shell_path(&self) -> &str {
        &self.shell_path
    }
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self::new("bash")
    }
}

/// Append every line from `stream` to the shared buffer until EOF. Bytes are
/// kept raw; decoding happens once the command is done.
async fn pump<R: AsyncRead + Unpin>(stream: Option<R>, buffer: Arc<StdMutex<Vec<u8>>>) {
    let Some(stream) = stream else {
        return;
    };
    let mut reader = BufReader::new(stream);
    let mut line = Vec::new();
    loop {
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {
                lock(&buffer).extend_from_slice(&line);
                line.clear();
            }
            Err(e) => {
                tracing::warn!("failed to read command output: {e}");
                break;
            }
        }
    }
}

fn lock(buffer: &StdMutex<Vec<u8>>) -> std::sync::MutexGuard<'_, Vec<u8>> {
    buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait::async_trait]
impl CommandRunner for ShellExecutor {
    async fn run(&self, command: &str) -> CommandOutcome {
        let started = Instant::now();
        let mut child = match tokio::process::Command::new(&self.shell_path)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!(command, shell = %self.shell_path, "failed to start command: {e}");
                return CommandOutcome::failed("", format!("failed to start: {e}"));
            }
        };

        let buffer = Arc::new(StdMutex::new(Vec::new()));
        tokio::join!(
            pump(child.stdout.take(), buffer.clone()),
            pump(child.stderr.take(), buffer.clone()),
        );
        let status = child.wait().await;
        let output = String::from_utf8_lossy(&lock(&buffer)).trim().to_string();
        let duration_ms = started.elapsed().as_millis() as u64;

        match status {
            Ok(status) if status.success() => {
                tracing::debug!(command, duration_ms, "command succeeded");
                CommandOutcome::ok(output)
            }
            Ok(status) => {
                let error = match status.code() {
                    Some(code) => format!("exit code: {code}"),
                    None => "terminated by signal".to_string(),
                };
                tracing::debug!(command, duration_ms, %error, "command failed");
                CommandOutcome::failed(output, error)
            }
            Err(e) => {
                tracing::warn!(command, "failed to wait for command: {e}");
                CommandOutcome::failed(output, format!("failed to wait: {e}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echo_yields_trimmed_output() {
        let outcome = ShellExecutor::default().run("echo hello").await;
        assert_eq!(outcome, CommandOutcome::ok("hello"));
        assert_eq!(outcome.transcript(), "hello");
    }

    #[tokio::test]
    async fn stderr_is_combined_with_stdout() {
        let outcome = ShellExecutor::default()
            .run("echo out; echo err 1>&2")
            .await;
        assert!(outcome.success);
        assert!(outcome.output.contains("out"));
        assert!(outcome.output.contains("err"));
    }

    #[tokio::test]
    async fn nonzero_exit_keeps_partial_output() {
        let outcome = ShellExecutor::default().run("echo partial; exit 3").await;
        assert!(!outcome.success);
        assert_eq!(outcome.output, "partial");
        assert_eq!(outcome.error.as_deref(), Some("exit code: 3"));
        assert_eq!(outcome.transcript(), "partial\n[error: exit code: 3]");
    }

    #[tokio::test]
    async fn invalid_utf8_does_not_truncate_output() {
        let outcome = ShellExecutor::default()
            .run("printf 'before\\n\\377\\nafter\\n'; echo tail")
            .await;
        assert!(outcome.success);
        assert_eq!(outcome.output, "before\n\u{fffd}\nafter\ntail");
    }

    #[tokio::test]
    async fn missing_shell_is_a_launch_failure() {
        let outcome = ShellExecutor::new("/definitely/not/a/shell")
            .run("echo hi")
            .await;
        assert!(!outcome.success);
        assert!(outcome.output.is_empty());
        assert!(outcome.error.unwrap().starts_with("failed to start"));
    }

    #[test]
    fn transcript_without_output() {
        let outcome = CommandOutcome::failed("", "exit code: 1");
        assert_eq!(outcome.transcript(), "[error: exit code: 1]");
    }
}
