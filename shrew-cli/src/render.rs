//! Per-message formatted output for the history viewport.
//!
//! Every slot holds the complete rendering of one message at the cached width,
//! already wrapped so each line fits. A width change clears every slot.

use ratatui::style::Style;
use ratatui::text::{Line, Span};
use shrew::directive;
use shrew::{Message, Role};
use unicode_width::UnicodeWidthChar;

use crate::markdown;
use crate::theme::Theme;

pub struct RenderCache {
    theme: Theme,
    width: u16,
    slots: Vec<Option<Vec<Line<'static>>>>,
}

impl RenderCache {
    pub fn new(theme: Theme) -> Self {
        Self {
            theme,
            width: 0,
            slots: Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn width(&self) -> u16 {
        self.width
    }

    /// Drop every cached rendering.
    pub fn invalidate(&mut self) {
        self.slots.clear();
    }

    /// Bring the cache up to date with `messages` at `width`. Returns the
    /// number of messages that had to be rendered.
    pub fn sync(&mut self, messages: &[Message], width: u16) -> usize {
        if width != self.width {
            tracing::debug!(from = self.width, to = width, "width changed, clearing render cache");
            self.invalidate();
            self.width = width;
        }
        self.slots.resize(messages.len(), None);

        let mut rendered = 0;
        for (slot, message) in self.slots.iter_mut().zip(messages) {
            if slot.is_none() {
                *slot = Some(render_message(message, width as usize, &self.theme));
                rendered += 1;
            }
        }
        rendered
    }

    #[cfg(test)]
    pub fn is_cached(&self, index: usize) -> bool {
        self.slots.get(index).is_some_and(|s| s.is_some())
    }

    /// All cached lines, in message order.
    #[cfg(test)]
    pub fn lines(&self) -> Vec<Line<'static>> {
        self.slots.iter().flatten().flatten().cloned().collect()
    }

    /// `rows` cached lines starting at row `offset`.
    pub fn window(&self, offset: usize, rows: usize) -> Vec<Line<'static>> {
        self.slots
            .iter()
            .flatten()
            .flatten()
            .skip(offset)
            .take(rows)
            .cloned()
            .collect()
    }

    /// Total rows the cached lines occupy.
    pub fn height(&self) -> usize {
        self.slots.iter().flatten().map(Vec::len).sum()
    }
}

fn render_message(message: &Message, width: usize, theme: &Theme) -> Vec<Line<'static>> {
    let lines = match message.role {
        Role::User => match directive::command_output_body(&message.content) {
            Some(body) => render_output(body, theme),
            None => render_user(&message.content, theme),
        },
        Role::Assistant => render_assistant(&message.content, width, theme),
        Role::System => text_lines(&message.content, theme.error),
    };
    lines
        .into_iter()
        .flat_map(|line| wrap_line(line, width))
        .collect()
}

fn render_output(body: &str, theme: &Theme) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from(Span::styled("[Output]:", theme.output))];
    lines.extend(text_lines(body.trim_matches('\n'), theme.output));
    lines.push(Line::default());
    lines
}

fn render_user(content: &str, theme: &Theme) -> Vec<Line<'static>> {
    let mut lines = vec![Line::default()];
    for (i, text) in content.lines().enumerate() {
        let prefix = if i == 0 { "> " } else { "  " };
        lines.push(Line::from(Span::styled(format!("{prefix}{text}"), theme.user)));
    }
    lines.push(Line::default());
    lines
}

fn render_assistant(content: &str, width: usize, theme: &Theme) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    for thought in directive::think_spans(content) {
        let body = thought.trim();
        lines.push(Line::from(Span::styled(
            "\u{256d}\u{2500} Thinking:",
            theme.think_border,
        )));
        for text in body.lines() {
            lines.push(Line::from(vec![
                Span::styled("\u{2502} ", theme.think_border),
                Span::styled(text.to_string(), theme.think),
            ]));
        }
        lines.push(Line::from(Span::styled("\u{2570}\u{2500}", theme.think_border)));
    }

    for command in directive::run_spans(content) {
        lines.push(Line::from(Span::styled(
            format!("[Executing]: {}", command.trim()),
            theme.exec,
        )));
    }

    let prose = directive::parse(content).prose;
    if !prose.is_empty() {
        lines.push(Line::from(Span::styled("shrew:", theme.label)));
        lines.extend(markdown::render_markdown(&prose, width, theme));
    }
    lines.push(Line::default());
    lines
}

fn text_lines(text: &str, style: Style) -> Vec<Line<'static>> {
    text.lines()
        .map(|l| Line::from(Span::styled(l.to_string(), style)))
        .collect()
}

/// Split `line` into rows no wider than `width` display columns, keeping span
/// styles. A zero width leaves the line untouched.
fn wrap_line(line: Line<'static>, width: usize) -> Vec<Line<'static>> {
    if width == 0 || line.width() <= width {
        return vec![line];
    }

    let mut rows: Vec<Line<'static>> = Vec::new();
    let mut current: Vec<Span<'static>> = Vec::new();
    let mut col = 0;
    for span in line.spans {
        let style = span.style;
        let mut buf = String::new();
        for ch in span.content.chars() {
            let cw = UnicodeWidthChar::width(ch).unwrap_or(0);
            if col + cw > width && col > 0 {
                if !buf.is_empty() {
                    current.push(Span::styled(std::mem::take(&mut buf), style));
                }
                rows.push(Line::from(std::mem::take(&mut current)));
                col = 0;
            }
            buf.push(ch);
            col += cw;
        }
        if !buf.is_empty() {
            current.push(Span::styled(buf, style));
        }
    }
    if !current.is_empty() {
        rows.push(Line::from(current));
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(lines: &[Line<'_>]) -> Vec<String> {
        lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    fn cache() -> RenderCache {
        RenderCache::new(Theme::plain())
    }

    #[test]
    fn command_output_is_unwrapped_under_header() {
        let lines = render_message(&Message::command_output("a\nb"), 80, &Theme::plain());
        assert_eq!(text(&lines), vec!["[Output]:", "a", "b", ""]);
    }

    #[test]
    fn plain_user_message_is_echoed() {
        let lines = render_message(&Message::user("fix it\nplease"), 80, &Theme::plain());
        assert_eq!(text(&lines), vec!["", "> fix it", "  please", ""]);
    }

    #[test]
    fn assistant_splits_think_run_and_prose() {
        let msg = Message::assistant("<think>plan it</think>Checking.<run> ls -la </run>");
        let out = text(&render_message(&msg, 80, &Theme::plain()));
        assert_eq!(out[0], "\u{256d}\u{2500} Thinking:");
        assert_eq!(out[1], "\u{2502} plan it");
        assert!(out.contains(&"[Executing]: ls -la".to_string()));
        assert!(out.contains(&"shrew:".to_string()));
        assert!(out.contains(&"Checking.".to_string()));
        assert!(!out.iter().any(|l| l.contains("<run>") || l.contains("<think>")));
    }

    #[test]
    fn directive_only_reply_has_no_label() {
        let msg = Message::assistant("<run>ls</run>");
        let out = text(&render_message(&msg, 80, &Theme::plain()));
        assert_eq!(out, vec!["[Executing]: ls", ""]);
    }

    #[test]
    fn system_message_is_rendered_verbatim() {
        let lines = render_message(&Message::system("Error: no response"), 80, &Theme::plain());
        assert_eq!(text(&lines), vec!["Error: no response"]);
    }

    #[test]
    fn long_lines_wrap_to_width() {
        let msg = Message::command_output(&"x".repeat(25));
        let lines = render_message(&msg, 10, &Theme::plain());
        assert!(lines.iter().all(|l| l.width() <= 10));
        assert_eq!(text(&lines)[1..4], ["xxxxxxxxxx", "xxxxxxxxxx", "xxxxx"]);
    }

    #[test]
    fn wrap_keeps_wide_chars_whole() {
        let rows = wrap_line(Line::from("\u{4e16}\u{4e16}\u{4e16}"), 5);
        assert_eq!(text(&rows), vec!["\u{4e16}\u{4e16}", "\u{4e16}"]);
    }

    #[test]
    fn sync_renders_only_new_messages() {
        let mut cache = cache();
        let mut messages = vec![Message::user("a"), Message::assistant("b")];
        assert_eq!(cache.sync(&messages, 40), 2);
        assert_eq!(cache.sync(&messages, 40), 0);

        messages.push(Message::system("c"));
        assert_eq!(cache.sync(&messages, 40), 1);
        assert!(cache.is_cached(2));
    }

    #[test]
    fn width_change_invalidates_every_slot() {
        let mut cache = cache();
        let messages = vec![Message::user("a"), Message::assistant("b"), Message::system("c")];
        cache.sync(&messages, 40);
        assert_eq!(cache.sync(&messages, 60), 3);
        assert_eq!(cache.width(), 60);
    }

    #[test]
    fn rendering_is_stable_across_syncs_at_same_width() {
        let messages = vec![
            Message::user("Context: Working Dir: /tmp"),
            Message::assistant("<think>t</think>## Title\n\n- one\n- two"),
            Message::command_output("out"),
        ];
        let mut cache = cache();
        cache.sync(&messages, 30);
        let first = cache.lines();

        cache.sync(&messages, 50);
        cache.sync(&messages, 30);
        assert_eq!(cache.lines(), first);

        cache.invalidate();
        cache.sync(&messages, 30);
        assert_eq!(cache.lines(), first);
        assert_eq!(cache.height(), first.len());
    }

    #[test]
    fn window_is_a_slice_of_lines() {
        let mut cache = cache();
        let messages: Vec<Message> = (0..5).map(|i| Message::system(format!("m{i}"))).collect();
        cache.sync(&messages, 40);
        assert_eq!(text(&cache.window(1, 2)), vec!["m1", "m2"]);
        assert_eq!(cache.window(4, 10).len(), 1);
    }

    #[test]
    fn lines_follow_message_order() {
        let mut cache = cache();
        cache.sync(&[Message::system("first"), Message::system("second")], 40);
        assert_eq!(text(&cache.lines()), vec!["first", "second"]);
    }
}
