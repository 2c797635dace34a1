pub mod agent;
pub mod config;
pub mod directive;
pub mod executor;
pub mod message;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod store;

// Re-exports
pub use agent::{
    AgentLoop, ChainEnd, Completion, LoopError, LoopState, Step, SubmitError, Task, dispatch,
    restore_conversation,
};
pub use config::{Config, ConfigError, ConfigFile, ConfigOverrides, ProviderKind};
pub use directive::Directives;
pub use executor::{CommandOutcome, CommandRunner, ShellExecutor};
pub use message::{Conversation, Message, Role};
pub use provider::{FailureKind, ProviderError, ProviderGateway};
pub use store::{Session, SessionCatalog, SessionStore, StoreError};
