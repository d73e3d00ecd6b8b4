//! Incremental server-sent-events decoder
//!
//! Bytes go in as they arrive off the wire; complete frames come out. Lines
//! end in `\n` with an optional `\r` before it, and a blank line dispatches
//! the frame collected so far.

/// One dispatched event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseFrame {
    /// `event:` name, `None` for the default `message` event
    pub event: Option<String>,
    /// `data:` lines joined with `\n`
    pub data: String,
    /// Last `id:` seen
    pub id: Option<String>,
}

impl SseFrame {
    /// Event name, defaulting to `message`
    #[inline]
    #[must_use]
    pub fn event_name(&self) -> &str {
        self.event.as_deref().unwrap_or("message")
    }
}

/// Stateful SSE decoder
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
    has_fields: bool,
}

impl SseDecoder {
    /// Create a decoder
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and collect every frame it completes
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=newline).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if let Some(frame) = self.process_line(&String::from_utf8_lossy(&line)) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Bytes and fields of an unterminated frame still held
    #[inline]
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty() || self.has_fields
    }

    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => {
                self.event = Some(value.to_string());
                self.has_fields = true;
            }
            "data" => {
                self.data.push(value.to_string());
                self.has_fields = true;
            }
            "id" => {
                self.id = Some(value.to_string());
                self.has_fields = true;
            }
            "retry" => {}
            other => tracing::trace!(field = other, "unknown sse field ignored"),
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        let data = std::mem::take(&mut self.data);
        self.has_fields = false;
        if data.is_empty() {
            return None;
        }
        Some(SseFrame {
            event: event.filter(|e| !e.is_empty()),
            data: data.join("\n"),
            id: self.id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn named_event_with_data() {
        let mut d = SseDecoder::new();
        let frames = d.push(b"event: status_update\ndata: {\"a\":1}\n\n");
        assert_eq!(
            frames,
            vec![SseFrame {
                event: Some("status_update".into()),
                data: "{\"a\":1}".into(),
                id: None,
            }]
        );
        assert!(!d.has_pending());
    }

    #[test]
    fn frames_split_across_chunks() {
        let mut d = SseDecoder::new();
        assert!(d.push(b"event: status_up").is_empty());
        assert!(d.push(b"date\r\ndata: x").is_empty());
        assert!(d.has_pending());
        let frames = d.push(b"yz\r\n\r\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event_name(), "status_update");
        assert_eq!(frames[0].data, "xyz");
    }

    #[test]
    fn multiline_data_and_comments() {
        let mut d = SseDecoder::new();
        let frames = d.push(b": keep-alive\n\ndata: one\ndata:two\nid: 7\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event_name(), "message");
        assert_eq!(frames[0].data, "one\ntwo");
        assert_eq!(frames[0].id.as_deref(), Some("7"));
    }

    #[test]
    fn event_without_data_is_dropped() {
        let mut d = SseDecoder::new();
        assert!(d.push(b"event: ping\n\n").is_empty());
        let frames = d.push(b"data: next\n\n");
        assert_eq!(frames[0].event, None);
    }

    #[test]
    fn several_frames_in_one_chunk() {
        let mut d = SseDecoder::new();
        let frames = d.push(b"event: a\ndata: 1\n\nevent: b\ndata: 2\n\n");
        let names: Vec<_> = frames.iter().map(SseFrame::event_name).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
