/// Prefix of the records that carry payload text.
pub const DATA_PREFIX: &str = "data:";

/// Terminator sent by OpenAI-compatible upstreams.
pub const DONE_PAYLOAD: &str = "[DONE]";

/// Splits transport increments into `data:` payloads.
///
/// A record may be cut anywhere, including inside a multi-byte character, so
/// the unterminated tail of each increment is kept until its newline arrives.
#[derive(Debug, Default)]
pub struct SseLineDecoder {
    pending: Vec<u8>,
}

impl SseLineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one increment and return the payloads of every record it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let Some(last_newline) = self.pending.iter().rposition(|b| *b == b'\n') else {
            return Vec::new();
        };

        let complete: Vec<u8> = self.pending.drain(..=last_newline).collect();
        complete
            .split(|b| *b == b'\n')
            .filter_map(parse_record)
            .collect()
    }

    /// Flush a final record that was not newline-terminated.
    pub fn finish(&mut self) -> Vec<String> {
        let rest = std::mem::take(&mut self.pending);
        parse_record(&rest).into_iter().collect()
    }
}

fn parse_record(line: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(line);
    let payload = line.strip_prefix(DATA_PREFIX)?.trim();
    if payload.is_empty() {
        None
    } else {
        Some(payload.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiple_records_in_one_increment() {
        let mut decoder = SseLineDecoder::new();
        let payloads = decoder.feed(b"data: <summary>\n\ndata: A quiet\n\n");
        assert_eq!(payloads, vec!["<summary>", "A quiet"]);
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn test_record_split_across_increments() {
        let mut decoder = SseLineDecoder::new();
        assert!(decoder.feed(b"da").is_empty());
        assert!(decoder.feed(b"ta: <fin").is_empty());
        assert_eq!(decoder.feed(b"ding>\n\n"), vec!["<finding>"]);
    }

    #[test]
    fn test_split_inside_multibyte_character() {
        let text = "data: 静けさ\n";
        let bytes = text.as_bytes();
        let mut decoder = SseLineDecoder::new();
        assert!(decoder.feed(&bytes[..8]).is_empty());
        assert_eq!(decoder.feed(&bytes[8..]), vec!["静けさ"]);
    }

    #[test]
    fn test_ignores_other_records() {
        let mut decoder = SseLineDecoder::new();
        let payloads = decoder.feed(b": keep-alive\nevent: message\nid: 3\ndata:\ndata:  x \r\n");
        assert_eq!(payloads, vec!["x"]);
    }

    #[test]
    fn test_finish_flushes_unterminated_record() {
        let mut decoder = SseLineDecoder::new();
        assert!(decoder.feed(b"data: tail").is_empty());
        assert_eq!(decoder.finish(), vec!["tail"]);
        assert!(decoder.finish().is_empty());
    }
}
