//! The turn-taking state machine.
//!
//! [`AgentLoop`] owns the conversation and never performs I/O against the model
//! or the shell itself. Each transition hands back at most one [`Task`]; the
//! caller runs it (see [`dispatch`]) and feeds the resulting [`Completion`]
//! into [`AgentLoop::complete`]. Only one task is ever outstanding.
//!
//! The model→command→model chain has no iteration cap. It ends when a response
//! carries no `<run>` directive or a model call fails.

use std::fmt;
use std::path::Path;

use crate::directive;
use crate::executor::{CommandOutcome, CommandRunner};
use crate::message::{Conversation, Message};
use crate::prompt;
use crate::provider::{ProviderError, ProviderGateway};
use crate::store::{SessionStore, StoreError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    AwaitingModel,
    ExecutingCommand,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LoopState::Idle => "idle",
            LoopState::AwaitingModel => "awaiting model",
            LoopState::ExecutingCommand => "executing command",
        })
    }
}

/// The one unit of work the caller must run next. Tasks carry their own
/// snapshots and never touch loop state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Task {
    CallModel {
        system_prompt: String,
        history: Vec<Message>,
    },
    RunCommand {
        command: String,
    },
}

/// Result of a [`Task`], delivered back to the loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Completion {
    Model(Result<String, ProviderError>),
    Command(CommandOutcome),
}

/// What a completion produced.
#[derive(Debug, Default)]
pub struct Step {
    pub next: Option<Task>,
    /// Set when the snapshot taken for this step could not be written. The
    /// state machine proceeds regardless.
    pub persist_error: Option<StoreError>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("a turn is already in progress")]
    Busy,
    #[error("input is empty")]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoopError {
    #[error("{completion} completion received while {state}")]
    UnexpectedCompletion {
        state: LoopState,
        completion: &'static str,
    },
}

/// How a chain driven by [`AgentLoop::run_until_idle`] ended.
#[derive(Debug, Default)]
pub struct ChainEnd {
    pub model_calls: usize,
    pub commands: usize,
    pub failure: Option<ProviderError>,
    pub persist_errors: Vec<StoreError>,
}

/// Session persistence attached to a loop.
struct Persistence {
    store: SessionStore,
    session_id: String,
}

pub struct AgentLoop {
    system_prompt: String,
    conversation: Conversation,
    state: LoopState,
    turns: usize,
    persistence: Option<Persistence>,
}

impl AgentLoop {
    pub fn new(system_prompt: impl Into<String>, conversation: Conversation) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            conversation,
            state: LoopState::Idle,
            turns: 0,
            persistence: None,
        }
    }

    /// Mirror the conversation to `store` under `session_id` after every
    /// assistant or command-output append.
    pub fn with_store(mut self, store: SessionStore, session_id: impl Into<String>) -> Self {
        self.persistence = Some(Persistence {
            store,
            session_id: session_id.into(),
        });
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == LoopState::Idle
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn messages(&self) -> &[Message] {
        self.conversation.messages()
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Model calls issued in the current chain. Informational only.
    pub fn turns(&self) -> usize {
        self.turns
    }

    pub fn session_id(&self) -> Option<&str> {
        self.persistence.as_ref().map(|p| p.session_id.as_str())
    }

    /// Append a system-role notice, e.g. a startup warning. Not persisted on
    /// its own.
    pub fn push_notice(&mut self, text: impl Into<String>) {
        self.conversation.push(Message::system(text));
    }

    /// Accept human input. Only legal while idle.
    pub fn submit(&mut self, input: &str) -> Result<Task, SubmitError> {
        if self.state != LoopState::Idle {
            return Err(SubmitError::Busy);
        }
        let input = input.trim();
        if input.is_empty() {
            return Err(SubmitError::Empty);
        }
        self.conversation.push(Message::user(input));
        self.turns = 0;
        Ok(self.call_model())
    }

    /// Apply the result of the outstanding task.
    pub fn complete(&mut self, completion: Completion) -> Result<Step, LoopError> {
        match (self.state, completion) {
            (LoopState::AwaitingModel, Completion::Model(Ok(text))) => {
                let command = directive::command(&text);
                self.conversation.push(Message::assistant(text));
                let persist_error = self.persist();
                let next = match command {
                    Some(command) => {
                        tracing::debug!(%command, "model requested command");
                        self.state = LoopState::ExecutingCommand;
                        Some(Task::RunCommand { command })
                    }
                    None => {
                        tracing::debug!(turns = self.turns, "chain finished");
                        self.state = LoopState::Idle;
                        None
                    }
                };
                Ok(Step {
                    next,
                    persist_error,
                })
            }
            (LoopState::AwaitingModel, Completion::Model(Err(e))) => {
                tracing::warn!(kind = ?e.kind(), "model call failed: {e}");
                self.conversation.push(Message::system(format!("Error: {e}")));
                self.state = LoopState::Idle;
                Ok(Step::default())
            }
            (LoopState::ExecutingCommand, Completion::Command(outcome)) => {
                self.conversation
                    .push(Message::command_output(&outcome.transcript()));
                let persist_error = self.persist();
                Ok(Step {
                    next: Some(self.call_model()),
                    persist_error,
                })
            }
            (state, completion) => {
                let completion = match completion {
                    Completion::Model(_) => "model",
                    Completion::Command(_) => "command",
                };
                tracing::warn!(%state, completion, "ignoring unexpected completion");
                Err(LoopError::UnexpectedCompletion { state, completion })
            }
        }
    }

    /// Drive one full chain in-process, from `input` until the loop is idle.
    pub async fn run_until_idle(
        &mut self,
        input: &str,
        gateway: &dyn ProviderGateway,
        runner: &dyn CommandRunner,
    ) -> Result<ChainEnd, SubmitError> {
        let mut end = ChainEnd::default();
        let mut next = Some(self.submit(input)?);

        while let Some(task) = next.take() {
            match &task {
                Task::CallModel { .. } => end.model_calls += 1,
                Task::RunCommand { .. } => end.commands += 1,
            }
            let completion = dispatch(task, gateway, runner).await;
            if let Completion::Model(Err(e)) = &completion {
                end.failure = Some(e.clone());
            }
            match self.complete(completion) {
                Ok(step) => {
                    end.persist_errors.extend(step.persist_error);
                    next = step.next;
                }
                Err(e) => {
                    tracing::warn!("{e}");
                    break;
                }
            }
        }
        Ok(end)
    }

    fn call_model(&mut self) -> Task {
        self.state = LoopState::AwaitingModel;
        self.turns += 1;
        tracing::debug!(
            turn = self.turns,
            messages = self.conversation.len(),
            "calling model"
        );
        Task::CallModel {
            system_prompt: self.system_prompt.clone(),
            history: self.conversation.messages().to_vec(),
        }
    }

    fn persist(&self) -> Option<StoreError> {
        let p = self.persistence.as_ref()?;
        match p.store.save(&p.session_id, self.conversation.messages()) {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!(session = %p.session_id, "failed to persist session: {e}");
                Some(e)
            }
        }
    }
}

/// Run one task to completion.
pub async fn dispatch(
    task: Task,
    gateway: &dyn ProviderGateway,
    runner: &dyn CommandRunner,
) -> Completion {
    match task {
        Task::CallModel {
            system_prompt,
            history,
        } => Completion::Model(gateway.complete(&system_prompt, &history).await),
        Task::RunCommand { command } => Completion::Command(runner.run(&command).await),
    }
}

/// Conversation to start from: the stored session if `session_id` exists,
/// otherwise a fresh one seeded with the environment context of `root`.
/// A store that cannot be read also yields a fresh conversation, with the
/// error returned alongside.
pub fn restore_conversation(
    store: &SessionStore,
    session_id: &str,
    root: &Path,
) -> (Conversation, Option<StoreError>) {
    match store.load(session_id) {
        Ok(Some(messages)) => {
            tracing::info!(session = session_id, messages = messages.len(), "session restored");
            (Conversation::from(messages), None)
        }
        Ok(None) => {
            tracing::info!(session = session_id, "starting new session");
            (Conversation::from(vec![prompt::context_message(root)]), None)
        }
        Err(e) => {
            tracing::warn!(session = session_id, "failed to restore session: {e}");
            (Conversation::from(vec![prompt::context_message(root)]), Some(e))
        }
    }
}
