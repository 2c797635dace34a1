use shrew::{AgentLoop, LoopState};

use crate::render::RenderCache;
use crate::theme::Theme;

/// Front-end state. The conversation itself lives in `agent`; everything here
/// is presentation.
pub struct App {
    pub agent: AgentLoop,
    pub cache: RenderCache,
    pub theme: Theme,
    pub provider: String,
    pub model: String,
    pub session_id: String,
    pub input: String,
    pub cursor_pos: usize,
    pub input_history: Vec<String>,
    pub input_history_idx: Option<usize>,
    /// Rows scrolled down from the top of the history.
    pub scroll_offset: usize,
    /// Stick to the newest output until the user scrolls up.
    pub follow_output: bool,
    /// Spinner frame counter
    pub tick: usize,
    /// Short-lived message shown in the status line (clipboard, save errors).
    pub flash: Option<String>,
    pub dirty: bool,
}

impl App {
    pub fn new(
        agent: AgentLoop,
        theme: Theme,
        provider: impl Into<String>,
        model: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            agent,
            cache: RenderCache::new(theme.clone()),
            theme,
            provider: provider.into(),
            model: model.into(),
            session_id: session_id.into(),
            input: String::new(),
            cursor_pos: 0,
            input_history: Vec::new(),
            input_history_idx: None,
            scroll_offset: 0,
            follow_output: true,
            tick: 0,
            flash: None,
            dirty: true,
        }
    }

    pub fn busy(&self) -> bool {
        !self.agent.is_idle()
    }

    /// Text for the status line while a task is outstanding.
    pub fn status_text(&self) -> Option<&'static str> {
        match self.agent.state() {
            LoopState::Idle => None,
            LoopState::AwaitingModel => Some("Thinking..."),
            LoopState::ExecutingCommand => Some("Running command..."),
        }
    }

    /// Get the current input text and reset input state.
    pub fn take_input(&mut self) -> String {
        let text = std::mem::take(&mut self.input);
        if !text.trim().is_empty() {
            self.input_history.push(text.clone());
        }
        self.cursor_pos = 0;
        self.input_history_idx = None;
        self.follow_output = true;
        text
    }

    /// Re-render anything the cache is missing at `width`, then clamp the
    /// scroll position for a viewport of `viewport_height` rows.
    pub fn prepare_history(&mut self, width: u16, viewport_height: usize) {
        self.cache.sync(self.agent.messages(), width);
        let max_scroll = self.cache.height().saturating_sub(viewport_height);
        if self.follow_output {
            self.scroll_offset = max_scroll;
        } else {
            self.scroll_offset = self.scroll_offset.min(max_scroll);
        }
    }

    pub fn scroll_up(&mut self, amount: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(amount);
        self.follow_output = false;
    }

    pub fn scroll_down(&mut self, amount: usize, viewport_height: usize) {
        let max_scroll = self.cache.height().saturating_sub(viewport_height);
        self.scroll_offset = self.scroll_offset.saturating_add(amount).min(max_scroll);
        if self.scroll_offset >= max_scroll {
            self.follow_output = true;
        }
    }

    /// Content of the most recent assistant message.
    pub fn last_assistant_text(&self) -> Option<&str> {
        self.agent
            .conversation()
            .last_assistant()
            .map(|m| m.content.as_str())
    }

    /// Navigate input history with the up arrow.
    pub fn history_up(&mut self) {
        if self.input_history.is_empty() {
            return;
        }
        let idx = match self.input_history_idx {
            None => self.input_history.len() - 1,
            Some(0) => 0,
            Some(i) => i - 1,
        };
        self.input_history_idx = Some(idx);
        self.input = self.input_history[idx].clone();
        self.cursor_pos = self.input.len();
    }

    /// Navigate input history with the down arrow.
    pub fn history_down(&mut self) {
        match self.input_history_idx {
            None => {}
            Some(i) if i + 1 >= self.input_history.len() => {
                self.input_history_idx = None;
                self.input.clear();
                self.cursor_pos = 0;
            }
            Some(i) => {
                self.input_history_idx = Some(i + 1);
                self.input = self.input_history[i + 1].clone();
                self.cursor_pos = self.input.len();
            }
        }
    }

    pub fn insert_char(&mut self, c: char) {
        self.input.insert(self.cursor_pos, c);
        self.cursor_pos += c.len_utf8();
    }

    pub fn insert_str(&mut self, s: &str) {
        for c in s.chars().filter(|c| *c != '\r') {
            self.insert_char(if c == '\n' { ' ' } else { c });
        }
    }

    /// Delete the character before the cursor.
    pub fn backspace(&mut self) {
        if let Some(prev) = self.prev_boundary() {
            self.input.drain(prev..self.cursor_pos);
            self.cursor_pos = prev;
        }
    }

    /// Delete the character at the cursor.
    pub fn delete(&mut self) {
        if let Some(next) = self.next_boundary() {
            self.input.drain(self.cursor_pos..next);
        }
    }

    /// Delete the word before the cursor (Ctrl+W).
    pub fn delete_word(&mut self) {
        let before = &self.input[..self.cursor_pos];
        let trimmed = before.trim_end();
        let start = trimmed
            .rfind(char::is_whitespace)
            .map(|i| i + 1)
            .unwrap_or(0);
        self.input.drain(start..self.cursor_pos);
        self.cursor_pos = start;
    }

    /// Clear everything before the cursor (Ctrl+U).
    pub fn clear_to_start(&mut self) {
        self.input.drain(..self.cursor_pos);
        self.cursor_pos = 0;
    }

    pub fn move_cursor_left(&mut self) {
        if let Some(prev) = self.prev_boundary() {
            self.cursor_pos = prev;
        }
    }

    pub fn move_cursor_right(&mut self) {
        if let Some(next) = self.next_boundary() {
            self.cursor_pos = next;
        }
    }

    pub fn move_cursor_home(&mut self) {
        self.cursor_pos = 0;
    }

    pub fn move_cursor_end(&mut self) {
        self.cursor_pos = self.input.len();
    }

    fn prev_boundary(&self) -> Option<usize> {
        self.input[..self.cursor_pos]
            .char_indices()
            .next_back()
            .map(|(i, _)| i)
    }

    fn next_boundary(&self) -> Option<usize> {
        self.input[self.cursor_pos..]
            .chars()
            .next()
            .map(|c| self.cursor_pos + c.len_utf8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shrew::{Conversation, Message};

    fn app() -> App {
        App::new(
            AgentLoop::new("sys", Conversation::new()),
            Theme::plain(),
            "ollama",
            "qwen",
            "s1",
        )
    }

    #[test]
    fn editing_handles_multibyte_chars() {
        let mut app = app();
        app.insert_str("h\u{e9}llo");
        app.move_cursor_home();
        app.move_cursor_right();
        app.move_cursor_right();
        app.backspace();
        assert_eq!(app.input, "hllo");
        app.delete();
        assert_eq!(app.input, "hlo");
        app.move_cursor_end();
        assert_eq!(app.cursor_pos, app.input.len());
    }

    #[test]
    fn delete_word_and_clear() {
        let mut app = app();
        app.insert_str("git status  ");
        app.delete_word();
        assert_eq!(app.input, "git ");
        app.clear_to_start();
        assert_eq!(app.input, "");
    }

    #[test]
    fn history_navigation_cycles_entries() {
        let mut app = app();
        app.insert_str("one");
        app.take_input();
        app.insert_str("two");
        app.take_input();

        app.history_up();
        assert_eq!(app.input, "two");
        app.history_up();
        assert_eq!(app.input, "one");
        app.history_down();
        assert_eq!(app.input, "two");
        app.history_down();
        assert_eq!(app.input, "");
    }

    #[test]
    fn status_follows_loop_state() {
        let mut app = app();
        assert_eq!(app.status_text(), None);
        app.agent.submit("hi").unwrap();
        assert_eq!(app.status_text(), Some("Thinking..."));
        assert!(app.busy());
    }

    #[test]
    fn scrolling_up_stops_following_output() {
        let mut app = app();
        for i in 0..20 {
            app.agent.push_notice(format!("line {i}"));
        }
        app.prepare_history(40, 5);
        assert_eq!(app.scroll_offset, 15);

        app.scroll_up(3);
        app.prepare_history(40, 5);
        assert_eq!(app.scroll_offset, 12);
        assert!(!app.follow_output);

        app.scroll_down(10, 5);
        assert_eq!(app.scroll_offset, 15);
        assert!(app.follow_output);
    }

    #[test]
    fn last_assistant_text_for_yank() {
        let conversation = Conversation::from(vec![
            Message::assistant("first"),
            Message::user("q"),
            Message::assistant("second"),
            Message::system("Error: x"),
        ]);
        let app = App::new(
            AgentLoop::new("sys", conversation),
            Theme::plain(),
            "ollama",
            "qwen",
            "s1",
        );
        assert_eq!(app.last_assistant_text(), Some("second"));
    }
}
