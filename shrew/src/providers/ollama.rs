use serde::Deserialize;
use serde_json::json;

use crate::message::Message;
use crate::provider::{self, ProviderError, ProviderGateway};

use super::with_system;

#[derive(Deserialize, Default)]
struct ChatResponse {
    #[serde(default)]
    message: Option<ResponseMessage>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

/// Local Ollama server, non-streaming `/api/chat`.
pub struct Ollama {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl Ollama {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/chat", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait::async_trait]
impl ProviderGateway for Ollama {
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[Message],
    ) -> Result<String, ProviderError> {
        let body = json!({
            "model": self.model,
            "messages": with_system(system_prompt, history),
            "stream": false,
        });

        let resp = self.client.post(self.endpoint()).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(provider::rejected(resp).await);
        }

        let parsed: ChatResponse = resp.json().await.unwrap_or_default();
        provider::non_empty(parsed.message.map(|m| m.content))
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }
}
