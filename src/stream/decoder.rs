//! SSE frame decoding
//!
//! Bytes arrive in arbitrary chunks; frames are the payloads of complete
//! `data: ` lines. A trailing partial line stays buffered until the rest of
//! it shows up, so the frames produced never depend on how the transport
//! happened to split the body.

use async_stream::stream;
use futures::{pin_mut, Stream, StreamExt};

use crate::transport::TransportError;

const DATA_PREFIX: &str = "data: ";

/// Payload that ends the stream. It is never forwarded as a frame.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Incremental line splitter for an SSE body
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    /// Bytes of `buffer` already known to hold no newline
    scanned: usize,
    done: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the `[DONE]` sentinel has been seen
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed one chunk and collect every frame it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut frames = Vec::new();
        if self.done {
            return frames;
        }

        self.buffer.extend_from_slice(chunk);

        while let Some(offset) = self.buffer[self.scanned..].iter().position(|&b| b == b'\n') {
            let pos = self.scanned + offset;
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.scanned = 0;
            if let Some(frame) = self.decode_line(&line[..pos]) {
                frames.push(frame);
            }
            if self.done {
                self.buffer.clear();
                break;
            }
        }
        self.scanned = self.buffer.len();

        frames
    }

    /// Flush whatever is left once the transport reports completion.
    pub fn finish(&mut self) -> Option<String> {
        if self.done || self.buffer.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        self.decode_line(&line)
    }

    fn decode_line(&mut self, line: &[u8]) -> Option<String> {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let line = String::from_utf8_lossy(line);

        let payload = line.strip_prefix(DATA_PREFIX)?;
        if payload == DONE_SENTINEL {
            self.done = true;
            return None;
        }
        Some(payload.to_string())
    }
}

/// Turn a stream of body chunks into a lazy stream of frames.
///
/// The stream ends at `[DONE]` or when `chunks` is exhausted. A transport
/// error is yielded once and ends the stream.
pub fn frames<S>(chunks: S) -> impl Stream<Item = Result<String, TransportError>>
where
    S: Stream<Item = Result<Vec<u8>, TransportError>>,
{
    stream! {
        let mut decoder = FrameDecoder::new();
        pin_mut!(chunks);

        while let Some(chunk) = chunks.next().await {
            let bytes = match chunk {
                Ok(bytes) => bytes,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            for frame in decoder.push(&bytes) {
                yield Ok(frame);
            }

            if decoder.is_done() {
                tracing::debug!("Received {} sentinel", DONE_SENTINEL);
                return;
            }
        }

        if let Some(frame) = decoder.finish() {
            yield Ok(frame);
        }
    }
}
