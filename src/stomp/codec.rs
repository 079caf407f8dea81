//! `tokio-util` codec for STOMP frames.
//!
//! Wire shape: `COMMAND\n`, `key:value\n` headers, a blank line, the body,
//! then a NUL octet. Bare EOLs between frames are heart-beats. Lines may
//! end in `\r\n`.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::StompError;
use super::frame::{Frame, StompCommand};

/// Default upper bound on a single frame, in bytes.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

/// Item produced and accepted by [`StompCodec`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StompItem {
    /// A complete frame.
    Frame(Frame),
    /// A heart-beat EOL.
    Heartbeat,
}

/// STOMP frame codec.
#[derive(Debug, Clone)]
pub struct StompCodec {
    max_frame_bytes: usize,
}

impl StompCodec {
    /// Creates a codec that rejects frames larger than `max_frame_bytes`.
    #[must_use]
    pub const fn new(max_frame_bytes: usize) -> Self {
        Self { max_frame_bytes }
    }

    fn incomplete(&self, buffered: usize) -> Result<Option<StompItem>, StompError> {
        if buffered > self.max_frame_bytes {
            return Err(StompError::FrameTooLarge {
                limit: self.max_frame_bytes,
            });
        }
        Ok(None)
    }
}

impl Default for StompCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_BYTES)
    }
}

impl Decoder for StompCodec {
    type Item = StompItem;
    type Error = StompError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match src.first() {
            None => return Ok(None),
            Some(b'\n') => {
                src.advance(1);
                return Ok(Some(StompItem::Heartbeat));
            }
            Some(b'\r') => {
                return match src.get(1) {
                    None => Ok(None),
                    Some(b'\n') => {
                        src.advance(2);
                        Ok(Some(StompItem::Heartbeat))
                    }
                    Some(_) => Err(StompError::Malformed("stray carriage return".to_string())),
                };
            }
            Some(_) => {}
        }

        let Some((head_end, body_start)) = find_head_end(src) else {
            return self.incomplete(src.len());
        };
        let Some(head) = src.get(..head_end) else {
            return self.incomplete(src.len());
        };
        let (command, headers) = parse_head(head)?;

        let content_length = headers
            .iter()
            .find(|(k, _)| k == "content-length")
            .map(|(_, v)| {
                v.trim()
                    .parse::<usize>()
                    .map_err(|_| StompError::Malformed(format!("bad content-length: {v}")))
            })
            .transpose()?;

        let body_len = match content_length {
            Some(len) => {
                let too_large = StompError::FrameTooLarge {
                    limit: self.max_frame_bytes,
                };
                if len > self.max_frame_bytes {
                    return Err(too_large);
                }
                let Some(terminator) = body_start.checked_add(len) else {
                    return Err(too_large);
                };
                match src.get(terminator) {
                    None => return self.incomplete(src.len()),
                    Some(0) => len,
                    Some(_) => {
                        return Err(StompError::Malformed(
                            "body longer than content-length".to_string(),
                        ));
                    }
                }
            }
            None => {
                let Some(body) = src.get(body_start..) else {
                    return self.incomplete(src.len());
                };
                match body.iter().position(|b| *b == 0) {
                    Some(len) => len,
                    None => return self.incomplete(src.len()),
                }
            }
        };

        let frame_len = body_start.saturating_add(body_len).saturating_add(1);
        if frame_len > self.max_frame_bytes {
            return Err(StompError::FrameTooLarge {
                limit: self.max_frame_bytes,
            });
        }

        let mut raw = src.split_to(frame_len);
        raw.advance(body_start);
        raw.truncate(body_len);

        Ok(Some(StompItem::Frame(Frame {
            command,
            headers,
            body: raw.freeze(),
        })))
    }
}

impl Encoder<Frame> for StompCodec {
    type Error = StompError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let escape = frame.command.escapes_headers();
        dst.put_slice(frame.command.as_str().as_bytes());
        dst.put_u8(b'\n');
        for (key, value) in &frame.headers {
            if escape {
                dst.put_slice(escape_header(key).as_bytes());
                dst.put_u8(b':');
                dst.put_slice(escape_header(value).as_bytes());
            } else {
                dst.put_slice(key.as_bytes());
                dst.put_u8(b':');
                dst.put_slice(value.as_bytes());
            }
            dst.put_u8(b'\n');
        }
        if !frame.body.is_empty() && frame.get_header("content-length").is_none() {
            dst.put_slice(format!("content-length:{}\n", frame.body.len()).as_bytes());
        }
        dst.put_u8(b'\n');
        dst.put_slice(&frame.body);
        dst.put_u8(0);
        Ok(())
    }
}

impl Encoder<StompItem> for StompCodec {
    type Error = StompError;

    fn encode(&mut self, item: StompItem, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            StompItem::Frame(frame) => Encoder::<Frame>::encode(self, frame, dst),
            StompItem::Heartbeat => {
                dst.put_u8(b'\n');
                Ok(())
            }
        }
    }
}

/// Locates the blank line ending the header block.
///
/// Returns the offset where the header block ends and the offset where
/// the body begins.
fn find_head_end(buf: &[u8]) -> Option<(usize, usize)> {
    let mut from = 0;
    while let Some(offset) = buf.get(from..)?.iter().position(|b| *b == b'\n') {
        let newline = from + offset;
        match buf.get(newline + 1) {
            Some(b'\n') => return Some((newline, newline + 2)),
            Some(b'\r') if buf.get(newline + 2) == Some(&b'\n') => {
                return Some((newline, newline + 3));
            }
            None => return None,
            Some(_) => from = newline + 1,
        }
    }
    None
}

fn parse_head(head: &[u8]) -> Result<(StompCommand, Vec<(String, String)>), StompError> {
    let text = std::str::from_utf8(head)
        .map_err(|_| StompError::Malformed("headers are not UTF-8".to_string()))?;
    let mut lines = text.split('\n').map(|line| line.strip_suffix('\r').unwrap_or(line));

    let command: StompCommand = lines
        .next()
        .ok_or_else(|| StompError::Malformed("missing command".to_string()))?
        .parse()?;

    let mut headers = Vec::new();
    for line in lines {
        let (key, value) = line
            .split_once(':')
            .ok_or_else(|| StompError::Malformed(format!("header without colon: {line}")))?;
        if command.escapes_headers() {
            headers.push((unescape_header(key)?, unescape_header(value)?));
        } else {
            headers.push((key.to_string(), value.to_string()));
        }
    }
    Ok((command, headers))
}

fn escape_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_header(raw: &str) -> Result<String, StompError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            Some('\\') => out.push('\\'),
            other => {
                return Err(StompError::Malformed(format!(
                    "undefined header escape: \\{}",
                    other.map(String::from).unwrap_or_default()
                )));
            }
        }
    }
    Ok(out)
}
