mod app;
mod event;
mod markdown;
mod render;
mod theme;
mod ui;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use clap::Parser;
use crossterm::event::{
    Event as TermEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEventKind,
};
use ratatui::DefaultTerminal;
use shrew::config::{self, Config, ConfigFile, ConfigOverrides};
use shrew::{
    AgentLoop, CommandRunner, Completion, ProviderGateway, SessionStore, ShellExecutor, Task,
    directive, dispatch, prompt, providers, restore_conversation,
};
use tokio::sync::mpsc;

use app::App;
use event::AppEvent;
use theme::Theme;

#[derive(Parser)]
#[command(name = "shrew", version, about = "A minimalist terminal coding agent")]
struct Args {
    /// Restore or create a named session (defaults to a timestamp)
    #[arg(long)]
    session: Option<String>,

    /// List stored sessions and exit
    #[arg(long)]
    list: bool,

    /// Backend: gemini, openai, ollama or cmd
    #[arg(long, env = "SHREW_PROVIDER")]
    provider: Option<String>,

    /// Model name (defaults per provider)
    #[arg(long, env = "SHREW_MODEL")]
    model: Option<String>,

    /// Override the backend endpoint (OpenAI-compatible servers, Gemini base URL)
    #[arg(long, env = "SHREW_API_URL")]
    api_url: Option<String>,

    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    gemini_api_key: Option<String>,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    #[arg(long, env = "OLLAMA_URL")]
    ollama_url: Option<String>,

    /// Command used by the `cmd` provider; receives the messages as JSON on stdin
    #[arg(long = "command", env = "SHREW_COMMAND")]
    custom_command: Option<String>,

    /// Shell used to run commands
    #[arg(long, env = "SHREW_SHELL")]
    shell: Option<String>,

    /// Session history file (default ~/.shrew/history.json)
    #[arg(long, env = "SHREW_HISTORY")]
    history: Option<PathBuf>,

    /// Config file (default ~/.shrew/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory of *.md skill files appended to the system prompt
    #[arg(long)]
    skills_dir: Option<PathBuf>,

    /// Disable mouse scroll support (re-enables terminal text selection)
    #[arg(long)]
    no_mouse: bool,

    /// Run headlessly: execute prompt, print response to stdout, exit
    #[arg(short = 'p', long = "print")]
    print_prompt: Option<String>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            provider: self.provider.clone(),
            model: self.model.clone(),
            api_url: self.api_url.clone(),
            gemini_api_key: self.gemini_api_key.clone(),
            openai_api_key: self.openai_api_key.clone(),
            ollama_url: self.ollama_url.clone(),
            custom_command: self.custom_command.clone(),
            shell: self.shell.clone(),
            history_path: self.history.clone(),
            skills_dir: self.skills_dir.clone(),
        }
    }
}

/// File-based tracing so log lines never land on the TUI (~/.shrew/shrew.log).
fn init_logging() -> anyhow::Result<()> {
    let log_dir = config::data_dir();
    std::fs::create_dir_all(&log_dir).ok();
    let log_file = std::fs::File::create(log_dir.join("shrew.log"))?;

    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_env("SHREW_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(log_file)
        .with_ansi(false)
        .init();
    Ok(())
}

fn cleanup_terminal() {
    let _ = crossterm::execute!(std::io::stdout(), crossterm::event::DisableMouseCapture);
    ratatui::restore();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging()?;
    // Before parsing so `.env` values feed the env-backed flags.
    config::load_dotenv();
    let args = Args::parse();

    let file = match &args.config {
        Some(path) => Some(ConfigFile::load(path)?),
        None => ConfigFile::load_default()?,
    };
    let config = Config::resolve(args.overrides(), file)?;
    let store = SessionStore::new(&config.history_path);

    if args.list {
        return list_sessions(&store);
    }

    let session_id = args.session.clone().unwrap_or_else(shrew::store::session_id_now);
    let cwd = std::env::current_dir().context("cannot determine working directory")?;
    let (conversation, restore_error) = restore_conversation(&store, &session_id, &cwd);
    let mut agent = AgentLoop::new(prompt::system_prompt(&config.skills_dir), conversation)
        .with_store(store, session_id.clone());

    let gateway = providers::build(&config);
    let runner: Arc<dyn CommandRunner> = Arc::new(ShellExecutor::new(config.shell.clone()));

    if let Some(input) = args.print_prompt.as_deref() {
        if let Some(e) = restore_error {
            eprintln!("warning: could not restore session {session_id}: {e}");
        }
        return run_headless(agent, input, gateway, runner).await;
    }
    if let Some(e) = restore_error {
        agent.push_notice(format!("Could not restore session {session_id}: {e}"));
    }

    let theme = if std::env::var_os("NO_COLOR").is_some() {
        Theme::plain()
    } else {
        Theme::default()
    };
    let app = App::new(
        agent,
        theme,
        config.provider.as_str(),
        config.model.clone(),
        session_id,
    );

    // Install panic hook that restores the terminal
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        cleanup_terminal();
        default_hook(info);
    }));

    let terminal = ratatui::init();
    if !args.no_mouse {
        crossterm::execute!(std::io::stdout(), crossterm::event::EnableMouseCapture)?;
    }

    let result = run_app(terminal, app, gateway, runner).await;

    cleanup_terminal();
    result
}

fn list_sessions(store: &SessionStore) -> anyhow::Result<()> {
    let catalog = store
        .list_all()
        .with_context(|| format!("cannot list sessions in {}", store.path().display()))?;
    if catalog.is_empty() {
        println!("No saved sessions in {}", store.path().display());
        return Ok(());
    }
    for session in catalog.sorted() {
        println!(
            "{}  {}  ({} messages)",
            session.id,
            session
                .timestamp
                .with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S"),
            session.messages.len()
        );
    }
    Ok(())
}

/// Run one chain without the TUI and print the final reply's prose to stdout.
async fn run_headless(
    mut agent: AgentLoop,
    input: &str,
    gateway: Arc<dyn ProviderGateway>,
    runner: Arc<dyn CommandRunner>,
) -> anyhow::Result<()> {
    let end = agent
        .run_until_idle(input, gateway.as_ref(), runner.as_ref())
        .await?;
    if let Some(e) = end.persist_errors.first() {
        eprintln!("warning: session not saved: {e}");
    }
    if let Some(e) = end.failure {
        anyhow::bail!("model call failed: {e}");
    }
    if let Some(reply) = agent.conversation().last_assistant() {
        println!("{}", directive::parse(&reply.content).prose);
    }
    Ok(())
}

/// Run `task` off the event loop and post its completion back.
fn spawn_task(
    task: Task,
    gateway: &Arc<dyn ProviderGateway>,
    runner: &Arc<dyn CommandRunner>,
    tx: &mpsc::UnboundedSender<AppEvent>,
) {
    let gateway = Arc::clone(gateway);
    let runner = Arc::clone(runner);
    let tx = tx.clone();
    tokio::spawn(async move {
        let completion = dispatch(task, gateway.as_ref(), runner.as_ref()).await;
        let _ = tx.send(AppEvent::Completion(completion));
    });
}

enum KeyAction {
    None,
    Submit(Task),
    Quit,
}

async fn run_app(
    mut terminal: DefaultTerminal,
    mut app: App,
    gateway: Arc<dyn ProviderGateway>,
    runner: Arc<dyn CommandRunner>,
) -> anyhow::Result<()> {
    // Unified event channel
    let (app_tx, mut app_rx) = mpsc::unbounded_channel::<AppEvent>();

    // Stop flag for the event reader thread
    let stop = Arc::new(AtomicBool::new(false));

    // Terminal event reader polls with a timeout so it can see the stop flag
    let term_tx = app_tx.clone();
    let stop_reader = Arc::clone(&stop);
    tokio::task::spawn_blocking(move || {
        while !stop_reader.load(Ordering::Relaxed) {
            if crossterm::event::poll(std::time::Duration::from_millis(50)).unwrap_or(false) {
                match crossterm::event::read() {
                    Ok(ev) => {
                        if term_tx.send(AppEvent::Terminal(ev)).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
        }
    });

    // Tick timer for spinner animation
    let tick_tx = app_tx.clone();
    let stop_tick = Arc::clone(&stop);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_millis(100));
        loop {
            interval.tick().await;
            if stop_tick.load(Ordering::Relaxed) {
                break;
            }
            if tick_tx.send(AppEvent::Tick).is_err() {
                break;
            }
        }
    });

    // SIGTERM handler for graceful shutdown
    #[cfg(unix)]
    {
        let sigterm_tx = app_tx.clone();
        tokio::spawn(async move {
            use tokio::signal::unix::{SignalKind, signal};
            if let Ok(mut sig) = signal(SignalKind::terminate()) {
                sig.recv().await;
                let _ = sigterm_tx.send(AppEvent::Quit);
            }
        });
    }

    loop {
        let size = terminal.size()?;
        let viewport = ui::history_area(size.width, size.height);

        // Draw only when dirty
        if app.dirty {
            app.prepare_history(viewport.width, viewport.height as usize);
            terminal.draw(|frame| ui::draw(frame, &app))?;
            app.dirty = false;
        }

        let event = match app_rx.recv().await {
            Some(e) => e,
            None => break,
        };

        match event {
            AppEvent::Terminal(TermEvent::Key(key)) => {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                app.dirty = true;
                match handle_key(&mut app, key, viewport.height as usize) {
                    KeyAction::None => {}
                    KeyAction::Submit(task) => spawn_task(task, &gateway, &runner, &app_tx),
                    KeyAction::Quit => break,
                }
            }
            AppEvent::Terminal(TermEvent::Mouse(mouse)) => match mouse.kind {
                MouseEventKind::ScrollUp => {
                    app.scroll_up(3);
                    app.dirty = true;
                }
                MouseEventKind::ScrollDown => {
                    app.scroll_down(3, viewport.height as usize);
                    app.dirty = true;
                }
                _ => {}
            },
            AppEvent::Terminal(TermEvent::Resize(..)) => {
                app.cache.invalidate();
                app.dirty = true;
            }
            AppEvent::Terminal(TermEvent::Paste(text)) => {
                app.insert_str(&text);
                app.dirty = true;
            }
            AppEvent::Terminal(_) => {}
            AppEvent::Completion(completion) => {
                apply_completion(&mut app, completion, &gateway, &runner, &app_tx);
                app.dirty = true;
            }
            AppEvent::Tick => {
                if app.busy() {
                    app.tick = app.tick.wrapping_add(1);
                    app.dirty = true;
                }
            }
            AppEvent::Quit => break,
        }
    }

    stop.store(true, Ordering::Relaxed);
    Ok(())
}

fn apply_completion(
    app: &mut App,
    completion: Completion,
    gateway: &Arc<dyn ProviderGateway>,
    runner: &Arc<dyn CommandRunner>,
    tx: &mpsc::UnboundedSender<AppEvent>,
) {
    match app.agent.complete(completion) {
        Ok(step) => {
            if let Some(e) = step.persist_error {
                app.flash = Some(format!("session not saved: {e}"));
            }
            if let Some(next) = step.next {
                spawn_task(next, gateway, runner, tx);
            }
        }
        Err(e) => tracing::warn!("{e}"),
    }
}

fn handle_key(app: &mut App, key: KeyEvent, page: usize) -> KeyAction {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    app.flash = None;

    match key.code {
        KeyCode::Char('c') if ctrl => return KeyAction::Quit,
        KeyCode::Esc => return KeyAction::Quit,
        KeyCode::Char('y') if ctrl => copy_last_response(app),
        KeyCode::Char('w') if ctrl => app.delete_word(),
        KeyCode::Char('u') if ctrl => app.clear_to_start(),
        KeyCode::Char('a') if ctrl => app.move_cursor_home(),
        KeyCode::Char('e') if ctrl => app.move_cursor_end(),
        KeyCode::Char('p') if ctrl => app.history_up(),
        KeyCode::Char('n') if ctrl => app.history_down(),
        KeyCode::Char(c) if !ctrl => app.insert_char(c),
        KeyCode::Enter => {
            if app.busy() || app.input.trim().is_empty() {
                return KeyAction::None;
            }
            let input = app.take_input();
            match app.agent.submit(&input) {
                Ok(task) => return KeyAction::Submit(task),
                Err(e) => tracing::debug!("input ignored: {e}"),
            }
        }
        KeyCode::Backspace => app.backspace(),
        KeyCode::Delete => app.delete(),
        KeyCode::Left => app.move_cursor_left(),
        KeyCode::Right => app.move_cursor_right(),
        KeyCode::Home => app.move_cursor_home(),
        KeyCode::End => app.move_cursor_end(),
        KeyCode::Up => app.scroll_up(1),
        KeyCode::Down => app.scroll_down(1, page),
        KeyCode::PageUp => app.scroll_up(page.max(1)),
        KeyCode::PageDown => app.scroll_down(page.max(1), page),
        _ => {}
    }
    KeyAction::None
}

fn copy_last_response(app: &mut App) {
    let Some(text) = app.last_assistant_text().map(str::to_string) else {
        return;
    };
    let copied = arboard::Clipboard::new().and_then(|mut clipboard| clipboard.set_text(text));
    app.flash = Some(match copied {
        Ok(()) => "copied last response".to_string(),
        Err(e) => {
            tracing::warn!("clipboard unavailable: {e}");
            "clipboard unavailable".to_string()
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use shrew::{Conversation, Message, ProviderError};

    struct FixedGateway(Result<String, ProviderError>);

    #[async_trait::async_trait]
    impl ProviderGateway for FixedGateway {
        async fn complete(
            &self,
            _system_prompt: &str,
            _history: &[Message],
        ) -> Result<String, ProviderError> {
            self.0.clone()
        }

        fn name(&self) -> &str {
            "fixed"
        }

        fn model(&self) -> &str {
            "fixed"
        }
    }

    fn agent() -> AgentLoop {
        AgentLoop::new("sys", Conversation::new())
    }

    fn runner() -> Arc<dyn CommandRunner> {
        Arc::new(ShellExecutor::default())
    }

    #[tokio::test]
    async fn headless_gateway_failure_is_an_error() {
        let gateway = Arc::new(FixedGateway(Err(ProviderError::Empty)));
        let err = run_headless(agent(), "hi", gateway, runner())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "model call failed: no response");
    }

    #[tokio::test]
    async fn headless_reply_succeeds() {
        let gateway = Arc::new(FixedGateway(Ok("<think>easy</think>done".to_string())));
        assert!(run_headless(agent(), "hi", gateway, runner()).await.is_ok());
    }
}
