//! One [`ProviderGateway`](crate::ProviderGateway) implementation per backend.

mod command;
mod gemini;
mod ollama;
mod openai;

pub use command::CommandBridge;
pub use gemini::Gemini;
pub use ollama::Ollama;
pub use openai::OpenAi;

use std::sync::Arc;

use serde::Serialize;

use crate::config::{Config, ProviderKind};
use crate::message::Message;
use crate::provider::ProviderGateway;

/// Role/content pair in the shape OpenAI-compatible backends expect.
#[derive(Serialize)]
pub(crate) struct WireMessage<'a> {
    pub role: &'a str,
    pub content: &'a str,
}

/// System prompt first, then the history in order.
pub(crate) fn with_system<'a>(system_prompt: &'a str, history: &'a [Message]) -> Vec<WireMessage<'a>> {
    std::iter::once(WireMessage {
        role: "system",
        content: system_prompt,
    })
    .chain(history.iter().map(|m| WireMessage {
        role: m.role.as_str(),
        content: &m.content,
    }))
    .collect()
}

/// Build the gateway for the configured backend.
pub fn build(config: &Config) -> Arc<dyn ProviderGateway> {
    let gateway: Arc<dyn ProviderGateway> = match config.provider {
        ProviderKind::Gemini => Arc::new(Gemini::new(
            config.gemini_api_key.clone().unwrap_or_default(),
            config.model.clone(),
            config.api_url.clone(),
        )),
        ProviderKind::OpenAi => Arc::new(OpenAi::new(
            config.openai_api_key.clone().unwrap_or_default(),
            config.model.clone(),
            config.api_url.clone(),
        )),
        ProviderKind::Ollama => Arc::new(Ollama::new(
            config.ollama_url.clone(),
            config.model.clone(),
        )),
        ProviderKind::Command => Arc::new(CommandBridge::new(
            config.custom_command.clone().unwrap_or_default(),
            config.shell.clone(),
            config.model.clone(),
        )),
    };
    tracing::info!(provider = gateway.name(), model = gateway.model(), "provider selected");
    gateway
}
