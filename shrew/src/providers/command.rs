use std::process::Stdio;

use tokio::io::AsyncWriteExt;

use crate::message::Message;
use crate::provider::{self, ProviderError, ProviderGateway};

use super::with_system;

/// Delegates completion to an external command. The full message array (system
/// prompt first) is written to its stdin as JSON; trimmed stdout is the reply.
pub struct CommandBridge {
    command: String,
    shell_path: String,
    model: String,
}

impl CommandBridge {
    pub fn new(
        command: impl Into<String>,
        shell_path: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            command: command.into(),
            shell_path: shell_path.into(),
            model: model.into(),
        }
    }
}

#[async_trait::async_trait]
impl ProviderGateway for CommandBridge {
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[Message],
    ) -> Result<String, ProviderError> {
        let payload = serde_json::to_vec(&with_system(system_prompt, history))
            .map_err(|e| ProviderError::Transport(format!("failed to encode prompt: {e}")))?;

        let mut child = tokio::process::Command::new(&self.shell_path)
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ProviderError::Transport(format!("failed to start bridge: {e}")))?;

        // Feed stdin while stdout is drained; a bridge that echoes as it reads
        // would otherwise fill its pipe and stall both sides.
        let stdin = child.stdin.take();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                // A bridge that exits without reading stdin is not an error by itself.
                if let Err(e) = stdin.write_all(&payload).await {
                    tracing::debug!("bridge closed stdin early: {e}");
                }
            }
        };
        let ((), output) = tokio::join!(feed, child.wait_with_output());
        let output =
            output.map_err(|e| ProviderError::Transport(format!("bridge failed: {e}")))?;
        if !output.status.success() {
            return Err(ProviderError::Rejected {
                status: output.status.to_string(),
                body: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        provider::non_empty(Some(text))
    }

    fn name(&self) -> &str {
        "cmd"
    }

    fn model(&self) -> &str {
        &self.model
    }
}
