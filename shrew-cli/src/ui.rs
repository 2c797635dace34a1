use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph},
};
use unicode_width::UnicodeWidthStr;

use crate::app::App;
use crate::theme::STATUS_SEP;

const INPUT_HEIGHT: u16 = 3;

/// Split the frame into header, history, status and input rows.
fn layout(area: Rect) -> [Rect; 4] {
    Layout::vertical([
        Constraint::Length(1),            // header
        Constraint::Min(1),               // history
        Constraint::Length(1),            // status / spinner
        Constraint::Length(INPUT_HEIGHT), // input
    ])
    .areas(area)
}

/// Size of the history viewport for a terminal of `width` x `height`.
pub fn history_area(width: u16, height: u16) -> Rect {
    layout(Rect::new(0, 0, width, height))[1]
}

pub fn draw(frame: &mut Frame, app: &App) {
    let [header, history, status, input] = layout(frame.area());
    draw_header(frame, app, header);
    draw_history(frame, app, history);
    draw_status(frame, app, status);
    draw_input(frame, app, input);
}

fn draw_header(frame: &mut Frame, app: &App, area: Rect) {
    let session = format!("session: {}", app.session_id);
    let info = [app.provider.as_str(), app.model.as_str(), session.as_str()].join(STATUS_SEP);
    let line = Line::from(vec![
        Span::styled(" SHREW ", app.theme.title),
        Span::raw(" "),
        Span::styled(info, app.theme.header),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

fn draw_history(frame: &mut Frame, app: &App, area: Rect) {
    // scroll_offset is clamped by prepare_history before draw()
    let visible = app.cache.window(app.scroll_offset, area.height as usize);
    frame.render_widget(Paragraph::new(visible), area);
}

fn draw_status(frame: &mut Frame, app: &App, area: Rect) {
    const ANGLES: &[char] = &['\u{2572}', '\u{2500}', '\u{2571}', '\u{2502}'];

    let mut spans = Vec::new();
    if let Some(status) = app.status_text() {
        let idx = (app.tick / 2) % ANGLES.len();
        spans.push(Span::raw(" "));
        spans.push(Span::styled(ANGLES[idx].to_string(), app.theme.spinner));
        spans.push(Span::styled(format!(" {status}"), app.theme.status_text));
        if app.agent.turns() > 1 {
            spans.push(Span::styled(
                format!("{STATUS_SEP}turn {}", app.agent.turns()),
                app.theme.status_text,
            ));
        }
    }
    if let Some(flash) = &app.flash {
        spans.push(Span::styled(format!(" {flash}"), app.theme.status_text));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_input(frame: &mut Frame, app: &App, area: Rect) {
    let inner_width = area.width.saturating_sub(2) as usize;
    let (visible, cursor_col) = visible_input(&app.input, app.cursor_pos, inner_width);

    let placeholder = app.input.is_empty() && !app.busy();
    let content = if placeholder {
        Span::styled("Ask shrew to do something...", app.theme.header)
    } else {
        Span::styled(visible, app.theme.input_text)
    };
    let input = Paragraph::new(Line::from(content)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(app.theme.input_border),
    );
    frame.render_widget(input, area);
    frame.set_cursor_position((area.x + 1 + cursor_col as u16, area.y + 1));
}

/// The slice of `input` that fits in `width` columns with the cursor kept in
/// view, and the cursor column within that slice.
fn visible_input(input: &str, cursor_pos: usize, width: usize) -> (String, usize) {
    let before = &input[..cursor_pos];
    let cursor_w = UnicodeWidthStr::width(before);
    if width == 0 || cursor_w < width {
        return (input.to_string(), cursor_w);
    }

    // Drop leading characters until the cursor fits.
    let mut start = 0;
    let mut dropped = 0;
    for (i, ch) in before.char_indices() {
        if cursor_w - dropped < width {
            break;
        }
        dropped += unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
        start = i + ch.len_utf8();
    }
    (input[start..].to_string(), cursor_w - dropped)
}
