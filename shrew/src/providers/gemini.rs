use serde::{Deserialize, Serialize};

use crate::message::{Message, Role};
use crate::provider::{self, ProviderError, ProviderGateway};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Serialize)]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize, Default)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Default)]
struct Candidate {
    #[serde(default)]
    content: CandidateContent,
}

#[derive(Deserialize, Default)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize, Default)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

/// Google Gemini `generateContent`.
pub struct Gemini {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl Gemini {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, base_url: Option<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

/// Gemini only knows `user` and `model`.
fn gemini_role(role: Role) -> &'static str {
    match role {
        Role::Assistant => "model",
        Role::User | Role::System => "user",
    }
}

#[async_trait::async_trait]
impl ProviderGateway for Gemini {
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[Message],
    ) -> Result<String, ProviderError> {
        let body = GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: system_prompt,
                }],
            },
            contents: history
                .iter()
                .map(|m| Content {
                    role: Some(gemini_role(m.role)),
                    parts: vec![Part { text: &m.content }],
                })
                .collect(),
        };

        let resp = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(provider::rejected(resp).await);
        }

        let parsed: GenerateResponse = resp.json().await.unwrap_or_default();
        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text);
        provider::non_empty(text)
    }

    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_map_to_gemini_vocabulary() {
        assert_eq!(gemini_role(Role::Assistant), "model");
        assert_eq!(gemini_role(Role::User), "user");
        assert_eq!(gemini_role(Role::System), "user");
    }

    #[test]
    fn endpoint_includes_model() {
        let g = Gemini::new("k", "gemini-x", Some("http://host/v1beta/".into()));
        assert_eq!(g.endpoint(), "http://host/v1beta/models/gemini-x:generateContent");
    }
}
