//! Tokenizer for the tagged blocks embedded in assistant text.
//!
//! Assistant content carries reasoning and tool-call markers inline:
//!
//! ```text
//! <think>reasoning…</think>
//!
//! <tool_use>
//! {"tool_id": "t1", "server_name": "web_search", "tool_name": "search"}
//! </tool_use>
//!
//! <tool_result>
//! {"tool_id": "t1", "server_name": "web_search", "tool_name": "search", "is_error": false, "result": "…"}
//! </tool_result>
//! ```
//!
//! Tool markers may also be spelled `<mcp_tool_use>` / `<mcp_tool_result>`.
//! Tags are matched case-insensitively. [`parse`] turns the text into a
//! [`Segment`] sequence; [`strip_hidden_blocks`] and [`strip_tool_markers`]
//! remove markers for history and clipboard use.

use serde::Deserialize;

/// A piece of assistant content.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Ordinary markdown text.
    Text(String),
    /// Reasoning block. `closed` is false when the closing tag has not
    /// arrived yet; the block is still rendered as complete.
    Think { content: String, closed: bool },
    /// One tool invocation, shown once at the position of its first marker.
    Tool(ToolCall),
}

/// Latest known state of a tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub tool_id: String,
    pub server_name: String,
    pub tool_name: String,
    pub status: ToolStatus,
}

impl ToolCall {
    /// Server name with underscores shown as spaces.
    pub fn display_server_name(&self) -> String {
        self.server_name.replace('_', " ")
    }
}

/// Progress of a tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolStatus {
    /// Only the use marker has been seen.
    Running,
    /// Result arrived.
    Succeeded { result: String },
    /// Result arrived with `is_error`.
    Failed { result: String },
}

#[derive(Debug, Deserialize)]
struct ToolPayload {
    #[serde(default)]
    tool_id: Option<serde_json::Value>,
    #[serde(default)]
    server_name: String,
    #[serde(default)]
    tool_name: String,
    #[serde(default)]
    is_error: bool,
    #[serde(default)]
    result: Option<serde_json::Value>,
}

const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";
const TOOL_TAGS: [&str; 4] = ["mcp_tool_use", "mcp_tool_result", "tool_use", "tool_result"];

/// Split assistant text into segments.
///
/// An unterminated `<think>` runs to the end of the text and is reported
/// with `closed: false`. A tool marker whose closing tag has not arrived is
/// hidden. A tool marker whose payload is not valid JSON is dropped.
/// Repeated markers for the same `tool_id` update the first segment.
pub fn parse(text: &str) -> Vec<Segment> {
    let lower = text.to_ascii_lowercase();
    let mut segments: Vec<Segment> = Vec::new();
    let mut tool_slots: Vec<(String, usize)> = Vec::new();
    let mut pending_text = String::new();
    let mut pos = 0;

    while pos < text.len() {
        let Some(rel) = lower[pos..].find('<') else {
            pending_text.push_str(&text[pos..]);
            break;
        };
        let start = pos + rel;
        pending_text.push_str(&text[pos..start]);
        let rest = &lower[start..];

        if rest.starts_with(THINK_OPEN) {
            flush_text(&mut segments, &mut pending_text);
            let body_start = start + THINK_OPEN.len();
            match lower[body_start..].find(THINK_CLOSE) {
                Some(end) => {
                    segments.push(Segment::Think {
                        content: text[body_start..body_start + end].to_string(),
                        closed: true,
                    });
                    pos = body_start + end + THINK_CLOSE.len();
                }
                None => {
                    segments.push(Segment::Think {
                        content: text[body_start..].to_string(),
                        closed: false,
                    });
                    pos = text.len();
                }
            }
            continue;
        }

        if let Some(tag) = TOOL_TAGS.iter().find(|t| opens_tag(rest, t)) {
            let body_start = start + tag.len() + 3;
            let close = format!("\n</{tag}>");
            let line_end = lower[body_start..]
                .find('\n')
                .map_or(lower.len(), |i| body_start + i);
            if lower[line_end..].starts_with(&close) {
                flush_text(&mut segments, &mut pending_text);
                let is_result = tag.ends_with("result");
                if let Some(call) = tool_call(&text[body_start..line_end], is_result) {
                    place_tool(&mut segments, &mut tool_slots, call);
                } else {
                    tracing::debug!(tag, "dropping tool marker with invalid payload");
                }
                pos = line_end + close.len();
                continue;
            }
            if line_end == lower.len() || !lower[line_end..].contains(&close) {
                // still streaming; hide the partial marker
                flush_text(&mut segments, &mut pending_text);
                pos = text.len();
                continue;
            }
        }

        pending_text.push('<');
        pos = start + 1;
    }

    flush_text(&mut segments, &mut pending_text);
    segments
}

fn opens_tag(rest: &str, tag: &str) -> bool {
    rest.len() > tag.len() + 2
        && rest.as_bytes()[0] == b'<'
        && rest[1..].starts_with(tag)
        && rest[1 + tag.len()..].starts_with(">\n")
}

fn flush_text(segments: &mut Vec<Segment>, pending: &mut String) {
    if pending.is_empty() {
        return;
    }
    let text = std::mem::take(pending);
    if let Some(Segment::Text(prev)) = segments.last_mut() {
        prev.push_str(&text);
    } else {
        segments.push(Segment::Text(text));
    }
}

fn tool_call(json: &str, is_result: bool) -> Option<ToolCall> {
    let payload: ToolPayload = serde_json::from_str(json).ok()?;
    let tool_id = match payload.tool_id {
        Some(serde_json::Value::String(s)) => s,
        Some(other) => other.to_string(),
        None => String::new(),
    };
    let status = if is_result {
        let result = match payload.result {
            Some(serde_json::Value::String(s)) => s,
            Some(serde_json::Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        if payload.is_error {
            ToolStatus::Failed { result }
        } else {
            ToolStatus::Succeeded { result }
        }
    } else {
        ToolStatus::Running
    };
    Some(ToolCall {
        tool_id,
        server_name: payload.server_name,
        tool_name: payload.tool_name,
        status,
    })
}

fn place_tool(segments: &mut Vec<Segment>, slots: &mut Vec<(String, usize)>, call: ToolCall) {
    if let Some((_, idx)) = slots.iter().find(|(id, _)| *id == call.tool_id) {
        segments[*idx] = Segment::Tool(call);
        return;
    }
    slots.push((call.tool_id.clone(), segments.len()));
    segments.push(Segment::Tool(call));
}

/// Remove reasoning and tool blocks and trim, leaving what the model "said".
///
/// Only complete `<think>`, `<tool_use>` and `<tool_result>` blocks are
/// removed; matching is case-sensitive.
pub fn strip_hidden_blocks(text: &str) -> String {
    let mut out = text.to_string();
    for tag in ["think", "tool_use", "tool_result"] {
        out = remove_delimited(&out, &format!("<{tag}>"), &format!("</{tag}>"));
    }
    out.trim().to_string()
}

fn remove_delimited(text: &str, open: &str, close: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(open) {
        let after_open = &rest[start + open.len()..];
        let Some(end) = after_open.find(close) else {
            break;
        };
        out.push_str(&rest[..start]);
        rest = &after_open[end + close.len()..];
    }
    out.push_str(rest);
    out
}

/// Text for the clipboard: drops framed tool markers and one trailing newline.
pub fn strip_tool_markers(text: &str) -> String {
    let mut out = text.to_string();
    for tag in ["mcp_tool_use", "tool_use"] {
        out = remove_framed(&out, "\n\n", tag, "\n");
    }
    for tag in ["mcp_tool_result", "tool_result"] {
        out = remove_framed(&out, "\n", tag, "\n\n");
    }
    match out.strip_suffix('\n') {
        Some(trimmed) => trimmed.to_string(),
        None => out,
    }
}

/// Remove every `{prefix}<{tag}>\n<one line>\n</{tag}>{suffix}`, ignoring case.
fn remove_framed(text: &str, prefix: &str, tag: &str, suffix: &str) -> String {
    let head = format!("{prefix}<{tag}>\n");
    let tail = format!("\n</{tag}>{suffix}");
    let lower = text.to_ascii_lowercase();
    let mut out = String::with_capacity(text.len());
    let mut pos = 0;
    while let Some(rel) = lower[pos..].find(&head) {
        let start = pos + rel;
        let body = start + head.len();
        let line_end = lower[body..].find('\n').map_or(lower.len(), |i| body + i);
        if lower[line_end..].starts_with(&tail) {
            out.push_str(&text[pos..start]);
            pos = line_end + tail.len();
        } else {
            out.push_str(&text[pos..body]);
            pos = body;
        }
    }
    out.push_str(&text[pos..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Segment {
        Segment::Text(s.into())
    }

    #[test]
    fn plain_text_is_one_segment() {
        assert_eq!(parse("hello <b>world</b>"), vec![text("hello <b>world</b>")]);
    }

    #[test]
    fn think_block_is_extracted() {
        let segments = parse("<THINK>hmm</think>answer");
        assert_eq!(
            segments,
            vec![
                Segment::Think {
                    content: "hmm".into(),
                    closed: true
                },
                text("answer"),
            ]
        );
    }

    #[test]
    fn unterminated_think_is_auto_closed() {
        let segments = parse("a<think>still going");
        assert_eq!(
            segments,
            vec![
                text("a"),
                Segment::Think {
                    content: "still going".into(),
                    closed: false
                },
            ]
        );
    }

    #[test]
    fn tool_use_then_result_share_one_slot() {
        let input = concat!(
            "before\n\n<mcp_tool_use>\n",
            r#"{"tool_id": "t1", "server_name": "web_search", "tool_name": "search"}"#,
            "\n</mcp_tool_use>\n",
            "\n<mcp_tool_result>\n",
            r#"{"tool_id": "t1", "server_name": "web_search", "tool_name": "search", "is_error": false, "result": "ok"}"#,
            "\n</mcp_tool_result>\n\nafter"
        );
        let segments = parse(input);
        let tools: Vec<&ToolCall> = segments
            .iter()
            .filter_map(|s| match s {
                Segment::Tool(t) => Some(t),
                _ => None,
            })
            .collect();
        assert_eq!(tools.len(), 1);
        assert_eq!(
            tools[0].status,
            ToolStatus::Succeeded {
                result: "ok".into()
            }
        );
        assert_eq!(tools[0].display_server_name(), "web search");
        assert!(matches!(segments.first(), Some(Segment::Text(t)) if t == "before\n\n"));
        assert!(matches!(segments.last(), Some(Segment::Text(t)) if t.ends_with("after")));
    }

    #[test]
    fn backend_tool_tags_are_recognised() {
        let input = "<tool_result>\n{\"tool_id\": 7, \"is_error\": true, \"result\": \"boom\"}\n</tool_result>";
        match parse(input).as_slice() {
            [Segment::Tool(call)] => {
                assert_eq!(call.tool_id, "7");
                assert_eq!(
                    call.status,
                    ToolStatus::Failed {
                        result: "boom".into()
                    }
                );
            }
            other => unreachable!("unexpected segments {other:?}"),
        }
    }

    #[test]
    fn invalid_tool_payload_is_dropped() {
        let input = "x<tool_use>\nnot json\n</tool_use>y";
        assert_eq!(parse(input), vec![text("xy")]);
    }

    #[test]
    fn partial_tool_marker_is_hidden_while_streaming() {
        let input = "text\n\n<tool_use>\n{\"tool_id\": \"a\"";
        assert_eq!(parse(input), vec![text("text\n\n")]);
    }

    #[test]
    fn strip_hidden_blocks_removes_think_and_tools() {
        let input = "<think>plan</think>\n<tool_use>x</tool_use>Answer<tool_result>y</tool_result>  ";
        assert_eq!(strip_hidden_blocks(input), "Answer");
    }

    #[test]
    fn strip_hidden_blocks_keeps_unterminated_block() {
        assert_eq!(strip_hidden_blocks(" <think>open"), "<think>open");
    }

    #[test]
    fn strip_tool_markers_for_copy() {
        let input = concat!(
            "Answer\n",
            "\n\n<mcp_tool_use>\n{\"tool_id\":\"1\"}\n</mcp_tool_use>\n",
            "\n<mcp_tool_result>\n{\"tool_id\":\"1\"}\n</mcp_tool_result>\n\n",
            "done\n"
        );
        assert_eq!(strip_tool_markers(input), "Answer\ndone");
    }
}
