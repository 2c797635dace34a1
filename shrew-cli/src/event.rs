use crossterm::event::Event as TermEvent;
use shrew::Completion;

/// Unified event type for the main loop.
pub enum AppEvent {
    Terminal(TermEvent),
    /// The outstanding model call or command finished.
    Completion(Completion),
    Tick,
    Quit,
}
