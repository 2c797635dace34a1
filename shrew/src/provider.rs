use crate::message::Message;

/// Category of a failed model call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    Transport,
    Rejected,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The backend could not be reached.
    #[error("transport error: {0}")]
    Transport(String),
    /// The backend answered with a non-success status.
    #[error("backend rejected request ({status}): {body}")]
    Rejected { status: String, body: String },
    /// The backend answered but returned no usable text.
    #[error("no response")]
    Empty,
}

impl ProviderError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ProviderError::Transport(_) => FailureKind::Transport,
            ProviderError::Rejected { .. } => FailureKind::Rejected,
            ProviderError::Empty => FailureKind::Empty,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        ProviderError::Transport(e.to_string())
    }
}

/// One call to a language-model backend.
#[async_trait::async_trait]
pub trait ProviderGateway: Send + Sync + 'static {
    /// Complete the conversation given the full history. Never mutates it.
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[Message],
    ) -> Result<String, ProviderError>;

    /// Short backend name for display ("gemini", "openai", ...).
    fn name(&self) -> &str;

    fn model(&self) -> &str;
}

/// Reject blank completions uniformly across backends.
pub(crate) fn non_empty(text: Option<String>) -> Result<String, ProviderError> {
    match text {
        Some(t) if !t.trim().is_empty() => Ok(t),
        _ => Err(ProviderError::Empty),
    }
}

/// Map a non-2xx HTTP response to [`ProviderError::Rejected`].
pub(crate) async fn rejected(resp: reqwest::Response) -> ProviderError {
    let status = resp.status().to_string();
    let body = resp.text().await.unwrap_or_default();
    ProviderError::Rejected { status, body }
}
