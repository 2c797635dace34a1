use serde::{Deserialize, Serialize};

use crate::directive;

/// Who authored a message in the conversation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

/// One entry of the conversation. Never mutated after it is appended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// A user-role message carrying the observed effect of a command.
    pub fn command_output(output: &str) -> Self {
        Self::user(directive::wrap_command_output(output))
    }

    /// True for user messages that wrap command output in `<output>` tags.
    pub fn is_command_output(&self) -> bool {
        self.role == Role::User && directive::command_output_body(&self.content).is_some()
    }
}

/// Ordered, append-only message history. This is the entire state the model sees.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Most recent assistant message, if any.
    pub fn last_assistant(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::Assistant)
    }
}

impl From<Vec<Message>> for Conversation {
    fn from(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&Message::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }

    #[test]
    fn message_deserializes_from_catalog_shape() {
        let msg: Message = serde_json::from_str(r#"{"role":"system","content":"Error: x"}"#).unwrap();
        assert_eq!(msg.role, Role::System);
        assert_eq!(msg.content, "Error: x");
    }

    #[test]
    fn command_output_is_wrapped_and_detected() {
        let msg = Message::command_output("hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "<output>\nhello\n</output>");
        assert!(msg.is_command_output());
        assert!(!Message::user("hello").is_command_output());
        assert!(!Message::assistant("<output>x</output>").is_command_output());
    }

    #[test]
    fn conversation_is_append_only() {
        let mut conv = Conversation::new();
        conv.push(Message::user("a"));
        conv.push(Message::assistant("b"));
        conv.push(Message::user("c"));
        let roles: Vec<Role> = conv.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
        assert_eq!(conv.last_assistant().unwrap().content, "b");
    }
}
