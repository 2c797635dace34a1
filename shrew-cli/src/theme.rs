use ratatui::style::{Color, Modifier, Style};

// ── Palette ────────────────────────────────────────────────────────
pub const VIOLET: Color = Color::Rgb(125, 86, 244);
pub const CYAN: Color = Color::Rgb(0, 173, 216);
pub const GOLD: Color = Color::Rgb(255, 215, 0);
pub const RED: Color = Color::Rgb(255, 0, 0);
pub const SNOW: Color = Color::Rgb(250, 250, 250);
pub const GREY: Color = Color::Rgb(136, 136, 136);
pub const GREY_LIGHT: Color = Color::Rgb(170, 170, 170);
pub const GREY_DARK: Color = Color::Rgb(92, 92, 92);

pub const STATUS_SEP: &str = " | ";

/// Every style the front end draws with. Built once and handed to the
/// renderer and the UI.
#[derive(Clone, Debug)]
pub struct Theme {
    pub title: Style,
    pub header: Style,
    pub user: Style,
    pub label: Style,
    pub prose: Style,
    pub think: Style,
    pub think_border: Style,
    pub exec: Style,
    pub output: Style,
    pub error: Style,
    pub heading: Style,
    pub inline_code: Style,
    pub code_content: Style,
    pub code_chrome: Style,
    pub spinner: Style,
    pub status_text: Style,
    pub input_border: Style,
    pub input_text: Style,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            title: Style::default()
                .fg(SNOW)
                .bg(VIOLET)
                .add_modifier(Modifier::BOLD),
            header: Style::default().fg(GREY),
            user: Style::default().fg(CYAN).add_modifier(Modifier::BOLD),
            label: Style::default().fg(VIOLET).add_modifier(Modifier::BOLD),
            prose: Style::default(),
            think: Style::default().fg(GREY).add_modifier(Modifier::DIM),
            think_border: Style::default().fg(GREY_DARK),
            exec: Style::default().fg(GOLD).add_modifier(Modifier::ITALIC),
            output: Style::default().fg(GREY_LIGHT),
            error: Style::default().fg(RED),
            heading: Style::default().fg(VIOLET).add_modifier(Modifier::BOLD),
            inline_code: Style::default().fg(GOLD),
            code_content: Style::default().fg(GREY_LIGHT),
            code_chrome: Style::default().fg(GREY_DARK),
            spinner: Style::default().fg(VIOLET).add_modifier(Modifier::BOLD),
            status_text: Style::default().fg(GREY),
            input_border: Style::default().fg(VIOLET),
            input_text: Style::default(),
        }
    }
}

impl Theme {
    /// No colors or modifiers, for tests and dumb terminals.
    pub fn plain() -> Self {
        let s = Style::default();
        Self {
            title: s,
            header: s,
            user: s,
            label: s,
            prose: s,
            think: s,
            think_border: s,
            exec: s,
            output: s,
            error: s,
            heading: s,
            inline_code: s,
            code_content: s,
            code_chrome: s,
            spinner: s,
            status_text: s,
            input_border: s,
            input_text: s,
        }
    }
}
