/// Sentinel payload the backend sends when the event stream is complete.
pub(crate) const SSE_DONE: &str = "[DONE]";

/// Reassembles `data:` payloads from a server-sent-events body that arrives
/// in arbitrary chunk slices. Buffering happens at the byte level so a chunk
/// boundary inside a multi-byte character cannot corrupt the line.
#[derive(Debug, Default)]
pub(crate) struct SseBuffer {
    pending: Vec<u8>,
}

impl SseBuffer {
    /// Feeds one body chunk and returns every complete `data:` payload it
    /// finished. Comment lines and other fields are ignored.
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some(newline) = self.pending.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim();
            if let Some(data) = line.strip_prefix("data:") {
                let data = data.trim();
                if !data.is_empty() {
                    payloads.push(data.to_string());
                }
            }
        }

        payloads
    }

    /// Drains whatever is left once the body stream ends. Some backends
    /// close the connection without a trailing newline after the last
    /// frame; that final line still counts.
    pub(crate) fn finish(self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.pending);
        let data = line.trim().strip_prefix("data:")?.trim();
        if data.is_empty() {
            return None;
        }
        Some(data.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_data_payloads() {
        let mut buffer = SseBuffer::default();
        let payloads = buffer.push(b"data: {\"a\":1}\n\ndata: {\"b\":2}\n");
        assert_eq!(payloads, vec!["{\"a\":1}".to_string(), "{\"b\":2}".to_string()]);
    }

    #[test]
    fn reassembles_lines_across_chunk_boundaries() {
        let mut buffer = SseBuffer::default();
        assert!(buffer.push(b"data: {\"content\":\"\xd8\xb3").is_empty());
        let payloads = buffer.push(b"\xd9\x84\xd8\xa7\xd9\x85\"}\n");
        assert_eq!(payloads, vec!["{\"content\":\"سلام\"}".to_string()]);
    }

    #[test]
    fn ignores_non_data_lines() {
        let mut buffer = SseBuffer::default();
        let payloads = buffer.push(b": keep-alive\nevent: message\ndata: x\n");
        assert_eq!(payloads, vec!["x".to_string()]);
    }

    #[test]
    fn passes_done_sentinel_through() {
        let mut buffer = SseBuffer::default();
        let payloads = buffer.push(b"data: [DONE]\n");
        assert_eq!(payloads, vec![SSE_DONE.to_string()]);
    }

    #[test]
    fn flushes_an_unterminated_final_line() {
        let mut buffer = SseBuffer::default();
        let payloads = buffer.push(b"data: {\"a\":1}\ndata: {\"b\":2}");
        assert_eq!(payloads, vec!["{\"a\":1}".to_string()]);
        assert_eq!(buffer.finish(), Some("{\"b\":2}".to_string()));
    }

    #[test]
    fn finish_is_empty_after_terminated_input() {
        let mut buffer = SseBuffer::default();
        buffer.push(b"data: x\n");
        assert_eq!(buffer.finish(), None);
    }
}
