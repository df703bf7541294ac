//! Minimal server-sent-events frame decoder.
//!
//! Only `data:` fields matter to the change feed; comments (keep-alives),
//! `event:`, `id:` and `retry:` fields are skipped.

use std::str::Utf8Error;

/// Accumulates raw bytes and yields complete `data` payloads.
///
/// Bytes are buffered undecoded until a frame is complete, so a multi-byte
/// character split across network chunks survives.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Feed a chunk; returns the data payload of every completed event.
    ///
    /// A completed frame that is not valid UTF-8 yields an error in its place.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<String, Utf8Error>> {
        self.buffer.extend_from_slice(chunk);
        // CRLF is treated as LF; bare CR line endings are not supported.
        self.buffer.retain(|&b| b != b'\r');

        let mut payloads = Vec::new();
        while let Some(end) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            let frame: Vec<u8> = self.buffer.drain(..end + 2).collect();
            match std::str::from_utf8(&frame) {
                Ok(text) => payloads.extend(parse_frame(text).map(Ok)),
                Err(e) => payloads.push(Err(e)),
            }
        }
        payloads
    }
}

fn parse_frame(frame: &str) -> Option<String> {
    let data: Vec<&str> = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|value| value.strip_prefix(' ').unwrap_or(value))
        .collect();

    if data.is_empty() {
        None
    } else {
        Some(data.join("\n"))
    }
}
