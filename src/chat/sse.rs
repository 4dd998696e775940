//! Incremental parser for the `data:` framed chat response body.
//!
//! The backend writes one event per blank-line-terminated block:
//!
//! ```text
//! data: {"content": "Hel"}
//!
//! data: {"content": "lo"}
//!
//! ```
//!
//! Bytes arrive in arbitrary chunks, so both lines and UTF-8 sequences may
//! be split across chunk boundaries. [`SseLineParser`] buffers both.
//!
//! ```
//! use devochat::chat::sse::SseLineParser;
//!
//! let mut parser = SseLineParser::new();
//! assert!(parser.push(b"data: {\"content\":").is_empty());
//! let events = parser.push(b" \"hi\"}\n\n");
//! assert_eq!(events[0].data, r#"{"content": "hi"}"#);
//! ```

/// A parsed event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Value of the `event:` field, if any.
    pub event_type: Option<String>,
    /// `data:` lines joined with `\n`.
    pub data: String,
}

impl SseEvent {
    /// Whether this is the `[DONE]` sentinel some backends append.
    pub fn is_done(&self) -> bool {
        self.data.trim() == "[DONE]"
    }
}

#[derive(Debug, Default)]
struct EventBuilder {
    event_type: Option<String>,
    data_lines: Vec<String>,
}

impl EventBuilder {
    fn has_data(&self) -> bool {
        !self.data_lines.is_empty()
    }

    fn build(&mut self) -> SseEvent {
        let event = SseEvent {
            event_type: self.event_type.take(),
            data: self.data_lines.join("\n"),
        };
        self.data_lines.clear();
        event
    }

    /// Returns an event when `line` is the blank boundary after data.
    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            if self.has_data() {
                return Some(self.build());
            }
            self.event_type = None;
            return None;
        }
        if line.starts_with(':') {
            return None;
        }
        if let Some((field, value)) = parse_field(line) {
            match field {
                "data" => self.data_lines.push(value.to_string()),
                "event" => self.event_type = Some(value.to_string()),
                _ => {}
            }
        }
        None
    }
}

/// Split `field: value`, dropping one leading space from the value.
fn parse_field(line: &str) -> Option<(&str, &str)> {
    let colon = line.find(':')?;
    let value = &line[colon + 1..];
    Some((&line[..colon], value.strip_prefix(' ').unwrap_or(value)))
}

/// Feed chunks with [`push`](Self::push); call [`flush`](Self::flush) at end of body.
#[derive(Debug, Default)]
pub struct SseLineParser {
    /// Trailing bytes of an incomplete UTF-8 sequence.
    utf8_carry: Vec<u8>,
    line_buffer: String,
    builder: EventBuilder,
}

impl SseLineParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a chunk, returning every event it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        let text = self.decode(chunk);
        let mut events = Vec::new();
        for ch in text.chars() {
            if ch == '\n' {
                let line = std::mem::take(&mut self.line_buffer);
                let line = line.strip_suffix('\r').unwrap_or(&line);
                if let Some(event) = self.builder.process_line(line) {
                    events.push(event);
                }
            } else {
                self.line_buffer.push(ch);
            }
        }
        events
    }

    /// Emit whatever is buffered as a final event.
    ///
    /// A dangling partial UTF-8 sequence is replaced with U+FFFD.
    pub fn flush(&mut self) -> Option<SseEvent> {
        if !self.utf8_carry.is_empty() {
            let tail = std::mem::take(&mut self.utf8_carry);
            self.line_buffer.push_str(&String::from_utf8_lossy(&tail));
        }
        if !self.line_buffer.is_empty() {
            let line = std::mem::take(&mut self.line_buffer);
            let line = line.strip_suffix('\r').unwrap_or(&line);
            if let Some(event) = self.builder.process_line(line) {
                return Some(event);
            }
        }
        self.builder.has_data().then(|| self.builder.build())
    }

    /// Decode as much of `carry + chunk` as forms complete UTF-8, keeping an
    /// incomplete trailing sequence for the next chunk.
    fn decode(&mut self, chunk: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.utf8_carry);
        bytes.extend_from_slice(chunk);

        let mut out = String::with_capacity(bytes.len());
        let mut rest = bytes.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match err.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[bad..];
                        }
                        None => {
                            self.utf8_carry = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }
}
