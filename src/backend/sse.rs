//! SSE (Server-Sent Events) decoder for OpenAI-compatible streams.
//!
//! Handles the `data: ` prefix, `[DONE]` termination, line buffering across
//! TCP chunk boundaries, and empty keep-alive lines.

use serde_json::Value;

/// Buffering SSE decoder.
///
/// # Example
///
/// ```
/// use slidesmith::backend::sse::SseDecoder;
///
/// let mut decoder = SseDecoder::new();
/// let data = b"data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\ndata: [DONE]\n\n";
/// assert_eq!(decoder.feed(data).len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: String,
}

impl SseDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
        }
    }

    /// Feed raw bytes and return the JSON payload of each complete
    /// `data:` line. `event:` lines, keep-alive blanks, and the `[DONE]`
    /// terminator are skipped.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Value> {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));

        let mut values = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            if let Some(value) = parse_data_line(line.trim()) {
                values.push(value);
            }
        }
        values
    }

    /// Drain whatever is left in the buffer at stream close.
    pub fn finish(&mut self) -> Vec<Value> {
        let remaining = std::mem::take(&mut self.buffer);
        remaining
            .lines()
            .filter_map(|line| parse_data_line(line.trim()))
            .collect()
    }
}

fn parse_data_line(line: &str) -> Option<Value> {
    let data = line
        .strip_prefix("data: ")
        .or_else(|| line.strip_prefix("data:"))?
        .trim();
    if data == "[DONE]" {
        return None;
    }
    serde_json::from_str(data).ok()
}

/// Pull the token text out of a streaming chat completion delta.
pub(crate) fn delta_content(value: &Value) -> Option<&str> {
    value
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("delta"))
        .and_then(|d| d.get("content"))
        .and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_decode() {
        let mut decoder = SseDecoder::new();
        let values = decoder.feed(b"data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\n");
        assert_eq!(values.len(), 1);
        assert_eq!(delta_content(&values[0]), Some("Hello"));
    }

    #[test]
    fn test_done_ignored() {
        let mut decoder = SseDecoder::new();
        let values =
            decoder.feed(b"data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\ndata: [DONE]\n\n");
        assert_eq!(values.len(), 1);
    }

    #[test]
    fn test_keep_alive_and_event_lines_ignored() {
        let mut decoder = SseDecoder::new();
        let values = decoder.feed(b"\n\nevent: message\ndata: {\"x\":1}\n\n\n");
        assert_eq!(values.len(), 1);
        assert_eq!(values[0]["x"], 1);
    }

    #[test]
    fn test_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: {\"cho").is_empty());
        let values = decoder.feed(b"ices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n");
        assert_eq!(values.len(), 1);
    }

    #[test]
    fn test_multiple_events_one_chunk() {
        let mut decoder = SseDecoder::new();
        let values = decoder.feed(b"data: {\"a\":1}\n\ndata: {\"a\":2}\n\ndata: {\"a\":3}\n\n");
        assert_eq!(values.len(), 3);
    }

    #[test]
    fn test_finish_drains_unterminated_line() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: {\"a\":1}").is_empty());
        let values = decoder.finish();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0]["a"], 1);
    }

    #[test]
    fn test_delta_content_missing() {
        let value = serde_json::json!({"choices": [{"delta": {}}]});
        assert_eq!(delta_content(&value), None);
    }
}
