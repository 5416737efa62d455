//! Incremental decoder for streamed completions.
//!
//! The remote API sends server-sent events, one JSON object per
//! `data:` line, terminated by `data: [DONE]`. Network chunks may split a
//! line anywhere (including inside a multi-byte character), so bytes are
//! buffered until a full line is available.

use super::types::StreamChunk;
use super::CompletionError;

const DONE_MARKER: &str = "[DONE]";

/// Output of the decoder for a fed chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// Text appended by the model.
    Delta(String),
    /// The stream announced its end.
    Done,
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `[DONE]` has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed one network chunk; returns the events completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<SseEvent>, CompletionError> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(event) = self.decode_line(&line)? {
                events.push(event);
            }
        }
        Ok(events)
    }

    /// Flush a trailing line that was not newline-terminated.
    pub fn finish(&mut self) -> Result<Vec<SseEvent>, CompletionError> {
        if self.buffer.is_empty() {
            return Ok(Vec::new());
        }
        let line = std::mem::take(&mut self.buffer);
        Ok(self.decode_line(&line)?.into_iter().collect())
    }

    fn decode_line(&mut self, raw: &[u8]) -> Result<Option<SseEvent>, CompletionError> {
        if self.done {
            return Ok(None);
        }
        let line = std::str::from_utf8(raw)
            .map_err(|e| CompletionError::Parse(format!("invalid UTF-8 in event stream: {e}")))?
            .trim_end_matches(&['\n', '\r'][..]);

        // Comments, `event:`/`id:` fields and blank separators carry no text.
        let Some(data) = line.strip_prefix("data:") else {
            return Ok(None);
        };
        let data = data.trim();
        if data.is_empty() {
            return Ok(None);
        }
        if data == DONE_MARKER {
            self.done = true;
            return Ok(Some(SseEvent::Done));
        }

        let chunk: StreamChunk =
            serde_json::from_str(data).map_err(|e| CompletionError::Parse(e.to_string()))?;
        let text: String = chunk
            .choices
            .into_iter()
            .filter_map(|c| c.delta.content)
            .collect();

        if text.is_empty() {
            Ok(None)
        } else {
            Ok(Some(SseEvent::Delta(text)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(text: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"delta": {"content": text}, "index": 0}]})
        )
    }

    fn collect_text(events: &[SseEvent]) -> String {
        events
            .iter()
            .filter_map(|e| match e {
                SseEvent::Delta(t) => Some(t.as_str()),
                SseEvent::Done => None,
            })
            .collect()
    }

    #[test]
    fn decodes_deltas_and_done() {
        let body = format!(
            "data: {{\"choices\":[{{\"delta\":{{\"role\":\"assistant\"}}}}]}}\n\n{}{}data: [DONE]\n\n",
            delta("Hel"),
            delta("lo")
        );
        let mut decoder = SseDecoder::new();
        let events = decoder.push(body.as_bytes()).unwrap();
        assert_eq!(
            events,
            vec![
                SseEvent::Delta("Hel".into()),
                SseEvent::Delta("lo".into()),
                SseEvent::Done
            ]
        );
        assert!(decoder.is_done());
    }

    #[test]
    fn lines_split_across_chunks_including_multibyte() {
        let body = format!("{}{}data: [DONE]\n", delta("こんにちは"), delta("世界"));
        let bytes = body.as_bytes();
        for split in 1..bytes.len() {
            let mut decoder = SseDecoder::new();
            let mut events = decoder.push(&bytes[..split]).unwrap();
            events.extend(decoder.push(&bytes[split..]).unwrap());
            assert_eq!(collect_text(&events), "こんにちは世界", "split at {split}");
            assert_eq!(events.last(), Some(&SseEvent::Done));
        }
    }

    #[test]
    fn ignores_comments_and_crlf() {
        let mut decoder = SseDecoder::new();
        let body = ": keep-alive\r\nevent: message\r\ndata: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\r\n\r\n";
        let events = decoder.push(body.as_bytes()).unwrap();
        assert_eq!(events, vec![SseEvent::Delta("x".into())]);
    }

    #[test]
    fn data_after_done_is_ignored() {
        let mut decoder = SseDecoder::new();
        let body = format!("data: [DONE]\n{}", delta("late"));
        let events = decoder.push(body.as_bytes()).unwrap();
        assert_eq!(events, vec![SseEvent::Done]);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let mut decoder = SseDecoder::new();
        let err = decoder.push(b"data: {not json}\n").unwrap_err();
        assert!(matches!(err, CompletionError::Parse(_)));
    }

    #[test]
    fn finish_flushes_unterminated_line() {
        let mut decoder = SseDecoder::new();
        let body = delta("tail");
        let trimmed = body.trim_end();
        assert!(decoder.push(trimmed.as_bytes()).unwrap().is_empty());
        assert_eq!(
            decoder.finish().unwrap(),
            vec![SseEvent::Delta("tail".into())]
        );
    }
}
