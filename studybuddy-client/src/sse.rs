//! Incremental decoding of server-sent-event streams. Both realtime feeds
//! (note changes, editing presence) arrive over SSE and share this decoder.

/// One complete frame off the stream: the event name and its data payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SseFrame {
    pub kind: String,
    pub data: String,
}

/// Incremental SSE frame decoder. Frames are separated by a blank line;
/// chunk boundaries can fall anywhere, including inside a UTF-8 sequence,
/// so the buffer stays raw bytes until a full frame is available.
#[derive(Debug, Default)]
pub(crate) struct SseParser {
    buf: Vec<u8>,
}

impl SseParser {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buf.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(end) = self.buf.windows(2).position(|window| window == b"\n\n") {
            let frame: Vec<u8> = self.buf.drain(..end + 2).collect();
            let frame = String::from_utf8_lossy(&frame[..end]);
            if let Some(frame) = parse_frame(&frame) {
                frames.push(frame);
            }
        }
        frames
    }
}

fn parse_frame(frame: &str) -> Option<SseFrame> {
    let mut kind: Option<&str> = None;
    let mut data = String::new();

    for line in frame.lines() {
        if let Some(rest) = line.strip_prefix("event:") {
            kind = Some(rest.trim());
        } else if let Some(rest) = line.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(rest.strip_prefix(' ').unwrap_or(rest));
        }
        // comment lines (keep-alives) and other fields are ignored
    }

    kind.map(|kind| SseFrame {
        kind: kind.to_string(),
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_a_complete_frame() {
        let mut parser = SseParser::default();

        let frames = parser.push(b"event: insert\ndata: {\"id\":1}\n\n");
        assert_eq!(
            frames,
            vec![SseFrame {
                kind: "insert".to_string(),
                data: "{\"id\":1}".to_string(),
            }]
        );
    }

    #[test]
    fn frame_split_across_chunks_is_reassembled() {
        let mut parser = SseParser::default();
        let frame = b"event: update\ndata: {\"id\":2}\n\n";
        let (left, right) = frame.split_at(frame.len() / 2);

        assert!(parser.push(left).is_empty());
        let frames = parser.push(right);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].kind, "update");
    }

    #[test]
    fn keepalive_comments_are_ignored() {
        let mut parser = SseParser::default();
        assert!(parser.push(b": keepalive\n\n").is_empty());
    }

    #[test]
    fn several_frames_in_one_chunk_all_decode() {
        let mut parser = SseParser::default();
        let frames = parser.push(b"event: a\ndata: 1\n\nevent: b\ndata: 2\n\n");

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].kind, "a");
        assert_eq!(frames[1].data, "2");
    }

    #[test]
    fn multi_line_data_is_joined_with_newlines() {
        let mut parser = SseParser::default();
        let frames = parser.push(b"event: a\ndata: first\ndata: second\n\n");

        assert_eq!(frames[0].data, "first\nsecond");
    }
}
