//! Stream demultiplexer for back-to-back JSON objects.
//!
//! The streaming Blueprint variant asks the model for one JSON object per
//! slide, concatenated with no delimiter — the only boundary is the adjacent
//! `}{` between two objects. [`StreamDemux`] buffers incoming text across
//! arbitrary chunk boundaries and yields each object as soon as it is
//! syntactically complete, without waiting for the stream to close.
//!
//! Known limitation, kept deliberately: a string value that itself contains
//! the literal substring `}{` will split mid-object. Both halves then fail
//! to parse and are dropped rather than aborting the stream. A proper
//! incremental tokenizer would remove this case; the demux is isolated here
//! so one can be swapped in.

use serde_json::Value;

use crate::parse::strip_code_fences;

/// Buffered demultiplexer for concatenated JSON objects.
///
/// # Example
///
/// ```
/// use slidesmith::demux::StreamDemux;
///
/// let mut demux = StreamDemux::new();
///
/// // First chunk ends mid-object: nothing is ready yet.
/// assert!(demux.feed(r#"{"slide_title": "One"#).is_empty());
///
/// // The `}{` boundary completes the first object.
/// let ready = demux.feed(r#""}{"slide_title":"#);
/// assert_eq!(ready.len(), 1);
/// assert_eq!(ready[0]["slide_title"], "One");
///
/// // Stream close flushes the trailing object.
/// demux.feed(r#" "Two"}"#);
/// assert_eq!(demux.finish().unwrap()["slide_title"], "Two");
/// ```
#[derive(Debug, Default)]
pub struct StreamDemux {
    buffer: String,
}

impl StreamDemux {
    /// Create an empty demultiplexer.
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
        }
    }

    /// Append a chunk and return every object completed by it.
    ///
    /// Each returned `Value` parsed successfully after fence stripping;
    /// segments that fail to parse are dropped silently so one bad object
    /// never aborts the stream. The buffer is only ever cleared at a
    /// detected `}{` boundary — a single object split across many tiny
    /// chunks reassembles intact.
    pub fn feed(&mut self, chunk: &str) -> Vec<Value> {
        self.buffer.push_str(chunk);

        let mut ready = Vec::new();
        while let Some(pos) = self.buffer.find("}{") {
            // Keep the closing brace with the finished segment; the tail
            // keeps its opening brace and reseeds the buffer.
            let tail = self.buffer.split_off(pos + 1);
            let segment = std::mem::replace(&mut self.buffer, tail);
            if let Some(value) = parse_segment(&segment) {
                ready.push(value);
            }
        }
        ready
    }

    /// Flush the trailing segment at stream close.
    ///
    /// The final object has no `}{` after it, so it can only be parsed once
    /// the stream ends. Returns `None` when the remainder is empty or not
    /// valid JSON (a truly malformed final object is undetectable earlier).
    pub fn finish(&mut self) -> Option<Value> {
        let remaining = std::mem::take(&mut self.buffer);
        parse_segment(&remaining)
    }

    /// The raw buffered text not yet emitted.
    pub fn pending(&self) -> &str {
        &self.buffer
    }
}

fn parse_segment(segment: &str) -> Option<Value> {
    let cleaned = strip_code_fences(segment);
    if cleaned.is_empty() {
        return None;
    }
    serde_json::from_str::<Value>(cleaned).ok()
}
