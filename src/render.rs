//! Message rendering: HTML for embedding hosts and plain text for the terminal.
//!
//! Assistant text is split by [`markup::parse`] first, so reasoning and tool
//! markers never reach the markdown parser. Markdown goes through
//! `pulldown_cmark` with GFM tables and math enabled; fenced code in a
//! complete message is highlighted with `syntect`, while a message that is
//! still streaming gets plain `<pre>` blocks.

use std::sync::LazyLock;

use pulldown_cmark::{CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};
use syntect::highlighting::{Theme, ThemeSet};
use syntect::parsing::SyntaxSet;

use crate::chat::{ContentPart, Message, MessageContent, Role};
use crate::markup::{self, Segment, ToolCall, ToolStatus};

static SYNTAXES: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_newlines);
static THEMES: LazyLock<ThemeSet> = LazyLock::new(ThemeSet::load_defaults);

const THEME: &str = "InspiredGitHub";

/// Render one transcript message to HTML. `None` for messages that are not
/// drawn (zero-width placeholder, empty parts).
pub fn render_message_html(message: &Message) -> Option<String> {
    if !message.is_renderable() {
        return None;
    }
    let html = match message.role {
        Role::User => format!(
            "<div class=\"message user\">{}</div>",
            render_parts_html(message)
        ),
        Role::Assistant => match &message.content {
            MessageContent::Text(text) => format!(
                "<div class=\"message assistant\">{}</div>",
                render_assistant_html(text, message.is_complete)
            ),
            MessageContent::Parts(_) => format!(
                "<div class=\"message assistant\">{}</div>",
                render_parts_html(message)
            ),
        },
        Role::Error => format!(
            "<div class=\"message error\">{}</div>",
            html_escape(message.text())
        ),
    };
    Some(html)
}

/// Render streamed assistant text: think blocks, tool blocks and markdown.
pub fn render_assistant_html(text: &str, is_complete: bool) -> String {
    let normalized = text.replace("\\[", "$$").replace("\\]", "$$");
    let mut html = String::new();
    for segment in markup::parse(&normalized) {
        match segment {
            Segment::Text(text) => html.push_str(&render_markdown_html(&text, is_complete)),
            Segment::Think { content, .. } => {
                html.push_str("<div class=\"think-block\">");
                html.push_str(&render_markdown_html(&content, is_complete));
                html.push_str("</div>");
            }
            Segment::Tool(call) => html.push_str(&render_tool_html(&call)),
        }
    }
    html
}

fn render_parts_html(message: &Message) -> String {
    let mut html = String::new();
    let MessageContent::Parts(parts) = &message.content else {
        return format!("<p>{}</p>", html_escape(message.text()));
    };
    for part in parts {
        match part {
            ContentPart::Text { text } => {
                html.push_str(&format!("<p>{}</p>", html_escape(text)));
            }
            ContentPart::Image { name, content } => {
                html.push_str(&format!(
                    "<img class=\"message-image\" src=\"{}\" alt=\"{}\" loading=\"lazy\" />",
                    html_escape(safe_url(content)),
                    html_escape(name.as_deref().unwrap_or_default()),
                ));
            }
            ContentPart::File { name, .. } => {
                html.push_str(&format!(
                    "<div class=\"file-chip\">{}</div>",
                    html_escape(name)
                ));
            }
            // Link previews only feed the model.
            ContentPart::Url { .. } => {}
        }
    }
    html
}

fn render_tool_html(call: &ToolCall) -> String {
    let (state, result) = match &call.status {
        ToolStatus::Running => ("running", None),
        ToolStatus::Succeeded { result } => ("success", Some(result)),
        ToolStatus::Failed { result } => ("error", Some(result)),
    };
    let mut html = format!(
        "<div class=\"mcp-tool-block {state}\" data-tool-id=\"{}\">\
         <div class=\"mcp-tool-header\">\
         <span class=\"mcp-server\">{}</span>\
         <span class=\"mcp-tool\">{}</span>\
         </div>",
        html_escape(&call.tool_id),
        html_escape(&call.display_server_name()),
        html_escape(&call.tool_name),
    );
    if let Some(result) = result {
        html.push_str(&format!(
            "<pre class=\"mcp-tool-result\">{}</pre>",
            html_escape(result)
        ));
    }
    html.push_str("</div>");
    html
}

/// Render markdown to HTML.
///
/// Raw HTML in the source is escaped, thematic breaks are dropped and links
/// open in a new tab.
pub fn render_markdown_html(content: &str, is_complete: bool) -> String {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_MATH;

    let mut events: Vec<Event<'_>> = Vec::new();
    let mut code_buf = String::new();
    let mut code_lang = String::new();
    let mut in_code_block = false;

    for event in Parser::new_ext(content, options) {
        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                in_code_block = true;
                code_buf.clear();
                code_lang = match kind {
                    CodeBlockKind::Fenced(info) => fence_language(&info),
                    CodeBlockKind::Indented => String::new(),
                };
            }
            Event::End(TagEnd::CodeBlock) => {
                in_code_block = false;
                let block = if is_complete {
                    highlight_code_block(&code_buf, &code_lang)
                } else {
                    plain_code_block(&code_buf, &code_lang)
                };
                events.push(Event::Html(block.into()));
            }
            Event::Text(text) if in_code_block => code_buf.push_str(&text),
            Event::Rule => {}
            Event::Html(raw) | Event::InlineHtml(raw) => events.push(Event::Text(raw)),
            Event::Start(Tag::Link { dest_url, title, .. }) => {
                let anchor = format!(
                    "<a href=\"{}\" title=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">",
                    html_escape(safe_url(&dest_url)),
                    html_escape(&title),
                );
                events.push(Event::InlineHtml(anchor.into()));
            }
            Event::Start(Tag::Image {
                link_type,
                dest_url,
                title,
                id,
            }) => events.push(Event::Start(Tag::Image {
                link_type,
                dest_url: CowStr::from(safe_url(&dest_url).to_string()),
                title,
                id,
            })),
            other if !in_code_block => events.push(other),
            _ => {}
        }
    }

    let mut html_output = String::new();
    pulldown_cmark::html::push_html(&mut html_output, events.into_iter());
    html_output
}

/// Link or image target with unsafe schemes replaced by an empty string.
///
/// Allowed: `http`, `https`, `mailto`, fragments and relative references.
pub fn safe_url(url: &str) -> &str {
    let trimmed = url.trim_start();
    let scheme_end = trimmed.find(|c: char| matches!(c, ':' | '/' | '?' | '#'));
    match scheme_end {
        Some(end) if trimmed[end..].starts_with(':') => {
            let scheme = trimmed[..end].to_ascii_lowercase();
            if matches!(scheme.as_str(), "http" | "https" | "mailto") {
                url
            } else {
                ""
            }
        }
        _ => url,
    }
}

fn fence_language(info: &CowStr<'_>) -> String {
    info.split(|c: char| c.is_whitespace() || c == ',')
        .next()
        .unwrap_or_default()
        .to_string()
}

fn code_header(lang: &str) -> String {
    format!(
        "<div class=\"code-header\"><span class=\"code-type\">{}</span></div>",
        html_escape(lang)
    )
}

/// Highlight a finished code block. Unknown languages fall back to plain text.
pub fn highlight_code_block(code: &str, lang: &str) -> String {
    let lang = if lang.is_empty() { "text" } else { lang };
    let code = code.strip_suffix('\n').unwrap_or(code);
    let syntax = SYNTAXES
        .find_syntax_by_token(lang)
        .unwrap_or_else(|| SYNTAXES.find_syntax_plain_text());

    let Some(theme) = THEMES.themes.get(THEME) else {
        return plain_code_block(code, lang);
    };
    match highlight(code, syntax, theme) {
        Ok(highlighted) => format!(
            "<div class=\"code-block\" data-lang=\"{}\">{}{highlighted}</div>",
            html_escape(lang),
            code_header(lang),
        ),
        Err(e) => {
            tracing::debug!(lang, error = %e, "highlighting failed");
            plain_code_block(code, lang)
        }
    }
}

fn highlight(
    code: &str,
    syntax: &syntect::parsing::SyntaxReference,
    theme: &Theme,
) -> Result<String, syntect::Error> {
    syntect::html::highlighted_html_for_string(code, &SYNTAXES, syntax, theme)
}

/// Unhighlighted block used while the message is still streaming.
fn plain_code_block(code: &str, lang: &str) -> String {
    let lang = if lang.is_empty() { "javascript" } else { lang };
    let code = code.strip_suffix('\n').unwrap_or(code);
    format!(
        "<div class=\"code-block\" data-lang=\"{}\">{}<pre><code>{}</code></pre></div>",
        html_escape(lang),
        code_header(lang),
        html_escape(code),
    )
}

/// Terminal rendering. Markdown is left as written; think blocks and tool
/// calls are shown as labelled lines.
pub fn render_plain(message: &Message) -> Option<String> {
    if !message.is_renderable() {
        return None;
    }
    let text = match (&message.role, &message.content) {
        (Role::Error, _) => format!("error: {}", message.text()),
        (Role::Assistant, MessageContent::Text(text)) => plain_assistant(text),
        (_, MessageContent::Text(text)) => text.clone(),
        (_, MessageContent::Parts(parts)) => parts
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(text.clone()),
                ContentPart::Image { name, .. } => {
                    Some(format!("[image: {}]", name.as_deref().unwrap_or("untitled")))
                }
                ContentPart::File { name, .. } => Some(format!("[file: {name}]")),
                ContentPart::Url { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n"),
    };
    Some(text)
}

fn plain_assistant(text: &str) -> String {
    let mut out = String::new();
    for segment in markup::parse(text) {
        match segment {
            Segment::Text(text) => out.push_str(&text),
            Segment::Think { content, .. } => {
                out.push_str("[thinking]\n");
                for line in content.trim().lines() {
                    out.push_str("│ ");
                    out.push_str(line);
                    out.push('\n');
                }
            }
            Segment::Tool(call) => {
                let state = match call.status {
                    ToolStatus::Running => "running",
                    ToolStatus::Succeeded { .. } => "done",
                    ToolStatus::Failed { .. } => "failed",
                };
                out.push_str(&format!(
                    "[tool {} / {}: {state}]\n",
                    call.display_server_name(),
                    call.tool_name
                ));
            }
        }
    }
    out
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
