//! Stream consumer: chunked UTF-8 body → text fragments → accumulated text.
//!
//! Chunk boundaries are arbitrary. A multi-byte character split across two
//! reads is held back by `Utf8StreamDecoder` until its remaining bytes
//! arrive, so the concatenated fragments always equal the decoded body.

use std::pin::Pin;
use std::task::{ready, Context, Poll};

use axum::body::Bytes;
use futures_util::stream::BoxStream;
use futures_util::{Stream, StreamExt};

use crate::completion::CompletionError;

/// Raw body of a chunked completion response.
pub type ByteStream = BoxStream<'static, Result<Bytes, CompletionError>>;

// ═══════════════════════════════════════════
// Incremental UTF-8 decoding
// ═══════════════════════════════════════════

/// UTF-8 decoder whose state persists between reads.
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as much of `pending + chunk` as forms complete characters.
    /// Invalid sequences become U+FFFD; an incomplete trailing sequence
    /// is kept for the next call.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut out = String::new();

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    return out;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match err.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + bad);
                        }
                        None => {
                            self.pending.drain(..valid);
                            return out;
                        }
                    }
                }
            }
        }
    }

    /// End of input: flush a dangling partial sequence lossily.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        let tail = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        tail
    }

    /// Bytes held back waiting for the rest of a character.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

// ═══════════════════════════════════════════
// TextStream
// ═══════════════════════════════════════════

/// Lazy sequence of decoded fragments over a byte stream.
/// Each call to `TextStream::new` starts with a fresh decoder.
pub struct TextStream {
    inner: ByteStream,
    decoder: Utf8StreamDecoder,
    finished: bool,
}

impl TextStream {
    pub fn new(inner: ByteStream) -> Self {
        Self {
            inner,
            decoder: Utf8StreamDecoder::new(),
            finished: false,
        }
    }
}

impl Stream for TextStream {
    type Item = Result<String, CompletionError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if this.finished {
                return Poll::Ready(None);
            }
            match ready!(this.inner.poll_next_unpin(cx)) {
                Some(Ok(bytes)) => {
                    let text = this.decoder.decode(&bytes);
                    if !text.is_empty() {
                        return Poll::Ready(Some(Ok(text)));
                    }
                }
                Some(Err(e)) => {
                    this.finished = true;
                    return Poll::Ready(Some(Err(e)));
                }
                None => {
                    this.finished = true;
                    let tail = this.decoder.finish();
                    if !tail.is_empty() {
                        return Poll::Ready(Some(Ok(tail)));
                    }
                }
            }
        }
    }
}

// ═══════════════════════════════════════════
// Transient streaming state
// ═══════════════════════════════════════════

/// Streamed-but-uncommitted response of the current send.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StreamState {
    pub text: String,
    pub done: bool,
    pub suggestions: Vec<String>,
}

impl StreamState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fragment: &str) {
        self.text.push_str(fragment);
    }

    pub fn finish(&mut self) {
        self.done = true;
    }

    /// Reset once the assistant turn is durably committed.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Read `stream` to the end, calling `on_partial` with the running total
/// after every fragment. Returns the full text.
pub async fn consume_stream<F>(
    mut stream: TextStream,
    state: &mut StreamState,
    mut on_partial: F,
) -> Result<String, CompletionError>
where
    F: FnMut(&StreamState),
{
    while let Some(fragment) = stream.next().await {
        state.push(&fragment?);
        on_partial(state);
    }
    state.finish();
    on_partial(state);
    Ok(state.text.clone())
}
