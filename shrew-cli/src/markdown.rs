//! Assistant prose to styled lines.
//!
//! Block structure (headings, lists, quotes, fenced code, tables) is laid out
//! here. Long lines are left alone; `render` hard-wraps everything afterwards.

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use ratatui::{
    style::{Modifier, Style},
    text::{Line, Span},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::theme::Theme;

const QUOTE_GUTTER: &str = "\u{258e} ";
const CODE_GUTTER: &str = "\u{2502} ";
const COLUMN_SEP: &str = " \u{2502} ";
const MIN_COLUMN: usize = 3;

pub fn render_markdown(text: &str, width: usize, theme: &Theme) -> Vec<Line<'static>> {
    let mut writer = Writer::new(width, theme);
    for event in Parser::new_ext(text, Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH) {
        writer.event(event);
    }
    writer.finish()
}

/// Cells buffered until the table ends, so columns can be sized together.
#[derive(Default)]
struct Table {
    head: Vec<String>,
    rows: Vec<Vec<String>>,
    cell: String,
    in_head: bool,
}

impl Table {
    fn end_cell(&mut self) {
        let cell = std::mem::take(&mut self.cell);
        if self.in_head {
            self.head.push(cell);
        } else if let Some(row) = self.rows.last_mut() {
            row.push(cell);
        }
    }

    fn columns(&self) -> usize {
        self.rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.head.len()))
            .max()
            .unwrap_or(0)
    }

    /// Natural column widths, shrunk widest-first until the table fits `width`.
    fn column_widths(&self, width: usize) -> Vec<usize> {
        let mut widths = vec![0; self.columns()];
        for row in std::iter::once(&self.head).chain(&self.rows) {
            for (w, cell) in widths.iter_mut().zip(row) {
                *w = (*w).max(cell.width());
            }
        }
        if width == 0 || widths.is_empty() {
            return widths;
        }

        let budget = width.saturating_sub(COLUMN_SEP.width() * (widths.len() - 1));
        while widths.iter().sum::<usize>() > budget {
            let Some(widest) = widths.iter_mut().filter(|w| **w > MIN_COLUMN).max_by_key(|w| **w)
            else {
                break;
            };
            *widest -= 1;
        }
        widths
    }

    fn render(self, width: usize, theme: &Theme) -> Vec<Line<'static>> {
        let widths = self.column_widths(width);
        let row_line = |cells: &[String], style: Style| {
            let mut spans = Vec::new();
            for (i, w) in widths.iter().enumerate() {
                if i > 0 {
                    spans.push(Span::styled(COLUMN_SEP, theme.code_chrome));
                }
                let text = cells.get(i).map(String::as_str).unwrap_or("");
                spans.push(Span::styled(fit_cell(text, *w), style));
            }
            Line::from(spans)
        };

        let mut lines = Vec::new();
        if !self.head.is_empty() {
            lines.push(row_line(&self.head, theme.prose.add_modifier(Modifier::BOLD)));
            let rule: Vec<String> = widths.iter().map(|w| "\u{2500}".repeat(*w)).collect();
            lines.push(Line::from(Span::styled(
                rule.join("\u{2500}\u{253c}\u{2500}"),
                theme.code_chrome,
            )));
        }
        for row in &self.rows {
            lines.push(row_line(row, theme.prose));
        }
        lines
    }
}

/// `text` cut to `width` columns (ending in `…` when cut) and padded to exactly `width`.
fn fit_cell(text: &str, width: usize) -> String {
    let mut out = String::new();
    let mut col = 0;
    if text.width() <= width {
        out.push_str(text);
        col = text.width();
    } else if width > 0 {
        for ch in text.chars() {
            let cw = UnicodeWidthChar::width(ch).unwrap_or(0);
            if col + cw + 1 > width {
                break;
            }
            out.push(ch);
            col += cw;
        }
        out.push('\u{2026}');
        col += 1;
    }
    out.push_str(&" ".repeat(width.saturating_sub(col)));
    out
}

struct Writer<'t> {
    theme: &'t Theme,
    width: usize,
    out: Vec<Line<'static>>,
    pending: Vec<Span<'static>>,
    styles: Vec<Style>,
    /// Next number for each open list; `None` for bullet lists.
    lists: Vec<Option<u64>>,
    quote_depth: usize,
    /// Set while inside a fenced or indented code block.
    code: bool,
    table: Option<Table>,
}

impl<'t> Writer<'t> {
    fn new(width: usize, theme: &'t Theme) -> Self {
        Self {
            theme,
            width,
            out: Vec::new(),
            pending: Vec::new(),
            styles: Vec::new(),
            lists: Vec::new(),
            quote_depth: 0,
            code: false,
            table: None,
        }
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.flush();
        while self.out.last().is_some_and(|l| l.width() == 0) {
            self.out.pop();
        }
        self.out
    }

    fn style(&self) -> Style {
        self.styles.last().copied().unwrap_or(self.theme.prose)
    }

    fn push_modifier(&mut self, modifier: Modifier) {
        self.styles.push(self.style().add_modifier(modifier));
    }

    fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let mut spans = std::mem::take(&mut self.pending);
        if self.quote_depth > 0 {
            spans.insert(
                0,
                Span::styled(QUOTE_GUTTER.repeat(self.quote_depth), self.theme.code_chrome),
            );
        }
        self.out.push(Line::from(spans));
    }

    /// Blank separator after a top-level block, never doubled.
    fn gap(&mut self) {
        if self.lists.is_empty() && self.out.last().is_some_and(|l| l.width() > 0) {
            self.out.push(Line::default());
        }
    }

    fn start_item(&mut self) {
        self.flush();
        let indent = "  ".repeat(self.lists.len().max(1));
        let marker = match self.lists.last_mut() {
            Some(Some(n)) => {
                let marker = format!("{indent}{n}. ");
                *n += 1;
                marker
            }
            _ => format!("{indent}\u{2022} "),
        };
        self.pending.push(Span::styled(marker, self.style()));
    }

    fn text(&mut self, text: &str) {
        if let Some(table) = self.table.as_mut() {
            table.cell.push_str(text);
        } else if self.code {
            for line in text.lines() {
                self.out.push(Line::from(vec![
                    Span::styled(CODE_GUTTER, self.theme.code_chrome),
                    Span::styled(line.to_string(), self.theme.code_content),
                ]));
            }
        } else {
            self.pending.push(Span::styled(text.to_string(), self.style()));
        }
    }

    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(Tag::Heading { .. }) => {
                self.flush();
                self.styles.push(self.theme.heading);
            }
            Event::End(TagEnd::Heading(_)) => {
                self.flush();
                self.styles.pop();
                self.gap();
            }
            Event::End(TagEnd::Paragraph) => {
                self.flush();
                self.gap();
            }

            Event::Start(Tag::Strong) => self.push_modifier(Modifier::BOLD),
            Event::Start(Tag::Emphasis) => self.push_modifier(Modifier::ITALIC),
            Event::Start(Tag::Strikethrough) => self.push_modifier(Modifier::CROSSED_OUT),
            Event::Start(Tag::Link { .. }) => self.push_modifier(Modifier::UNDERLINED),
            Event::End(TagEnd::Strong | TagEnd::Emphasis | TagEnd::Strikethrough | TagEnd::Link) => {
                self.styles.pop();
            }

            Event::Start(Tag::BlockQuote(_)) => {
                self.flush();
                self.quote_depth += 1;
            }
            Event::End(TagEnd::BlockQuote(_)) => {
                self.flush();
                self.quote_depth = self.quote_depth.saturating_sub(1);
                if self.quote_depth == 0 {
                    self.gap();
                }
            }

            Event::Start(Tag::CodeBlock(kind)) => {
                self.flush();
                self.code = true;
                if let CodeBlockKind::Fenced(info) = kind {
                    if let Some(lang) = info.split_whitespace().next() {
                        self.out.push(Line::from(Span::styled(
                            format!("\u{256d}\u{2500} {lang}"),
                            self.theme.code_chrome,
                        )));
                    }
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                self.code = false;
                self.gap();
            }

            Event::Start(Tag::List(start)) => {
                self.flush();
                self.lists.push(start);
            }
            Event::End(TagEnd::List(_)) => {
                self.flush();
                self.lists.pop();
                self.gap();
            }
            Event::Start(Tag::Item) => self.start_item(),
            Event::End(TagEnd::Item) => self.flush(),

            Event::Start(Tag::Table(_)) => {
                self.flush();
                self.table = Some(Table::default());
            }
            Event::End(TagEnd::Table) => {
                if let Some(table) = self.table.take() {
                    self.out.extend(table.render(self.width, self.theme));
                    self.gap();
                }
            }
            Event::Start(Tag::TableHead) => {
                if let Some(table) = self.table.as_mut() {
                    table.in_head = true;
                }
            }
            Event::End(TagEnd::TableHead) => {
                if let Some(table) = self.table.as_mut() {
                    table.in_head = false;
                }
            }
            Event::Start(Tag::TableRow) => {
                if let Some(table) = self.table.as_mut() {
                    if !table.in_head {
                        table.rows.push(Vec::new());
                    }
                }
            }
            Event::End(TagEnd::TableCell) => {
                if let Some(table) = self.table.as_mut() {
                    table.end_cell();
                }
            }

            Event::Text(text) => self.text(&text),
            Event::Code(code) => match self.table.as_mut() {
                Some(table) => table.cell.push_str(&code),
                None => self
                    .pending
                    .push(Span::styled(code.to_string(), self.theme.inline_code)),
            },
            Event::SoftBreak if self.table.is_none() => self.pending.push(Span::raw(" ")),
            Event::HardBreak => self.flush(),
            Event::Rule => {
                self.flush();
                self.out.push(Line::from(Span::styled(
                    "\u{2500}".repeat(self.width.clamp(1, 40)),
                    self.theme.code_chrome,
                )));
                self.gap();
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(text: &str, width: usize) -> Vec<String> {
        render_markdown(text, width, &Theme::plain())
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    #[test]
    fn fit_cell_pads_and_truncates() {
        assert_eq!(fit_cell("ab", 4), "ab  ");
        assert_eq!(fit_cell("abcdef", 4), "abc\u{2026}");
        assert_eq!(fit_cell("\u{4e16}", 4), "\u{4e16}  ");
        assert_eq!(fit_cell("\u{4e16}\u{4e16}\u{4e16}", 4), "\u{4e16}\u{2026} ");
    }

    #[test]
    fn paragraphs_are_separated_by_one_blank_line() {
        assert_eq!(render("para one\n\npara two", 80), vec!["para one", "", "para two"]);
    }

    #[test]
    fn soft_breaks_join_with_a_space() {
        assert_eq!(render("one\ntwo", 80), vec!["one two"]);
    }

    #[test]
    fn heading_uses_heading_style() {
        let theme = Theme::default();
        let lines = render_markdown("## Plan", 80, &theme);
        assert_eq!(lines[0].spans[0].content, "Plan");
        assert_eq!(lines[0].spans[0].style, theme.heading);
    }

    #[test]
    fn inline_formatting_stacks_modifiers() {
        let theme = Theme::plain();
        let lines = render_markdown("**bold *both***", 80, &theme);
        let both = lines[0].spans.iter().find(|s| s.content == "both").unwrap();
        assert!(both.style.add_modifier.contains(Modifier::BOLD | Modifier::ITALIC));
    }

    #[test]
    fn inline_code_keeps_its_own_style() {
        let theme = Theme::default();
        let lines = render_markdown("run `ls -la` now", 80, &theme);
        let code = lines[0].spans.iter().find(|s| s.content == "ls -la").unwrap();
        assert_eq!(code.style, theme.inline_code);
    }

    #[test]
    fn bullet_list_items() {
        assert_eq!(
            render("- item one\n- item two", 80),
            vec!["  \u{2022} item one", "  \u{2022} item two"]
        );
    }

    #[test]
    fn ordered_list_keeps_start_number() {
        assert_eq!(render("3. three\n4. four", 80), vec!["  3. three", "  4. four"]);
    }

    #[test]
    fn nested_bullets_indent() {
        let text = render("- outer\n  - inner", 80);
        assert_eq!(text[0], "  \u{2022} outer");
        assert_eq!(text[1], "    \u{2022} inner");
    }

    #[test]
    fn fenced_code_has_language_header_and_gutter() {
        let text = render("```rust\nfn main() {}\nlet x = 1;\n```", 80);
        assert_eq!(
            text,
            vec!["\u{256d}\u{2500} rust", "\u{2502} fn main() {}", "\u{2502} let x = 1;"]
        );
    }

    #[test]
    fn block_quote_has_gutter() {
        let text = render("> quoted", 80);
        assert_eq!(text, vec!["\u{258e} quoted"]);
    }

    #[test]
    fn table_columns_are_aligned() {
        let text = render("| A | Long |\n|---|---|\n| 1 | 2 |", 80);
        assert_eq!(
            text,
            vec![
                "A \u{2502} Long",
                "\u{2500}\u{2500}\u{253c}\u{2500}\u{2500}\u{2500}\u{2500}\u{2500}",
                "1 \u{2502} 2   ",
            ]
        );
    }

    #[test]
    fn wide_table_is_shrunk_to_fit() {
        let lines = render_markdown(
            "| Name | Description |\n|---|---|\n| short | A very long description that should be truncated |",
            30,
            &Theme::plain(),
        );
        for line in &lines {
            assert!(line.width() <= 30, "line too wide: {line:?}");
        }
        let last: String = lines[2].spans.iter().map(|s| s.content.as_ref()).collect();
        assert!(last.starts_with("short"));
        assert!(last.ends_with('\u{2026}'));
    }

    #[test]
    fn rule_is_clamped() {
        let text = render("above\n\n---\n\nbelow", 100);
        assert_eq!(text[2], "\u{2500}".repeat(40));
    }
}
