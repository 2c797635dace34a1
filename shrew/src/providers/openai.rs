use serde::Deserialize;
use serde_json::json;

use crate::message::Message;
use crate::provider::{self, ProviderError, ProviderGateway};

use super::with_system;

const DEFAULT_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Deserialize, Default)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat completions. `url` may point at any compatible server.
pub struct OpenAi {
    api_key: String,
    model: String,
    url: String,
    client: reqwest::Client,
}

impl OpenAi {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, url: Option<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            url: url.unwrap_or_else(|| DEFAULT_URL.to_string()),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl ProviderGateway for OpenAi {
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[Message],
    ) -> Result<String, ProviderError> {
        let body = json!({
            "model": self.model,
            "messages": with_system(system_prompt, history),
        });

        let resp = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(provider::rejected(resp).await);
        }

        let parsed: ChatResponse = resp.json().await.unwrap_or_default();
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content);
        provider::non_empty(text)
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }
}
