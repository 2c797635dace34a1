//! Extraction of tagged directives from model output.
//!
//! Three tags are recognized:
//! - `<run>COMMAND</run>` requests execution of a shell command. Only the first
//!   well-formed span of a response is honored.
//! - `<think>TEXT</think>` carries reasoning that is shown separately from prose.
//! - `<output>TEXT</output>` wraps command results re-injected as user messages.
//!
//! Matching is non-greedy and spans newlines. Unterminated tags never match.

use std::sync::LazyLock;

use regex::Regex;

static RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<run>(.*?)</run>").unwrap());
static THINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>(.*?)</think>").unwrap());
static OUTPUT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<output>(.*?)</output>").unwrap());

/// Everything the loop and the renderer need from one model response.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Directives {
    /// Trimmed body of the first `<run>` span.
    pub command: Option<String>,
    /// Trimmed bodies of every `<think>` span, in order.
    pub reasoning: Vec<String>,
    /// Text left over once think and run spans are removed.
    pub prose: String,
}

pub fn parse(text: &str) -> Directives {
    let reasoning = THINK_RE
        .captures_iter(text)
        .map(|c| c[1].trim().to_string())
        .collect();
    let without_think = THINK_RE.replace_all(text, "");
    let prose = RUN_RE.replace_all(&without_think, "").trim().to_string();

    Directives {
        command: command(text),
        reasoning,
        prose,
    }
}

/// The command to execute, if the text holds a non-empty `<run>` span.
pub fn command(text: &str) -> Option<String> {
    let caps = RUN_RE.captures(text)?;
    let cmd = caps[1].trim();
    if cmd.is_empty() {
        None
    } else {
        Some(cmd.to_string())
    }
}

/// Untrimmed bodies of every `<run>` span, for display.
pub fn run_spans(text: &str) -> Vec<String> {
    RUN_RE
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .collect()
}

/// Untrimmed bodies of every `<think>` span, for display.
pub fn think_spans(text: &str) -> Vec<String> {
    THINK_RE
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .collect()
}

/// Body of the first `<output>` span, if the content carries one.
pub fn command_output_body(content: &str) -> Option<&str> {
    OUTPUT_RE
        .captures(content)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Format command output for re-injection into the conversation.
pub fn wrap_command_output(output: &str) -> String {
    format!("<output>\n{}\n</output>", output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unterminated_run_is_not_a_command() {
        let d = parse("<run>ls -la");
        assert_eq!(d.command, None);
        assert_eq!(d.prose, "<run>ls -la");
    }

    #[test]
    fn think_run_and_prose_are_separated() {
        let d = parse("<think>plan</think><run>echo hi</run>done");
        assert_eq!(d.reasoning, vec!["plan".to_string()]);
        assert_eq!(d.command.as_deref(), Some("echo hi"));
        assert_eq!(d.prose, "done");
    }

    #[test]
    fn only_first_run_is_honored() {
        let d = parse("<run>first</run> then <run>second</run>");
        assert_eq!(d.command.as_deref(), Some("first"));
        assert_eq!(d.prose, "then");
        assert_eq!(run_spans("<run>first</run><run>second</run>").len(), 2);
    }

    #[test]
    fn command_spans_newlines_and_is_trimmed() {
        let text = "Let me look.\n<run>\n  cd src &&\n  ls\n</run>\n";
        assert_eq!(command(text).as_deref(), Some("cd src &&\n  ls"));
    }

    #[test]
    fn blank_run_is_not_a_command() {
        assert_eq!(command("<run>   </run>"), None);
        assert_eq!(command("<run></run>"), None);
    }

    #[test]
    fn non_greedy_match_stops_at_first_close() {
        assert_eq!(command("<run>a</run>x</run>").as_deref(), Some("a"));
    }

    #[test]
    fn multiple_think_spans_in_order() {
        let d = parse("<think>one</think>mid<think>\ntwo\n</think>");
        assert_eq!(d.reasoning, vec!["one".to_string(), "two".to_string()]);
        assert_eq!(d.prose, "mid");
    }

    #[test]
    fn plain_text_has_no_directives() {
        let d = parse("All done. The tests pass.");
        assert_eq!(d.command, None);
        assert!(d.reasoning.is_empty());
        assert_eq!(d.prose, "All done. The tests pass.");
    }

    #[test]
    fn output_marker_round_trip() {
        let wrapped = wrap_command_output("a\nb");
        assert_eq!(command_output_body(&wrapped), Some("\na\nb\n"));
        assert_eq!(command_output_body("<output>never closed"), None);
        assert_eq!(command_output_body("plain"), None);
    }
}
