//! Tokio codec for the Redis serialization protocol (RESP2).
//!
//! Only what a publishing client needs: commands go out as arrays of bulk
//! strings, replies come back as any RESP2 type.
//!
//! ```text
//! *3\r\n$4\r\nHSET\r\n$7\r\nkeycard\r\n$3\r\nuid\r\n   command
//! :1\r\n                                              reply
//! ```
//!
//! # Usage with Tokio Framed
//!
//! ```rust,no_run
//! use futures::{SinkExt, StreamExt};
//! use keycard_network::resp::{Command, RespCodec};
//! use tokio::net::TcpStream;
//! use tokio_util::codec::Framed;
//!
//! # async fn example() -> Result<(), keycard_network::NotifyError> {
//! let stream = TcpStream::connect("127.0.0.1:6379").await?;
//! let mut framed = Framed::new(stream, RespCodec::new());
//!
//! framed.send(Command::new("PING").into_value()).await?;
//! if let Some(Ok(reply)) = framed.next().await {
//!     println!("Received: {:?}", reply);
//! }
//! # Ok(())
//! # }
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{NotifyError, NotifyResult};

/// Default maximum reply size in bytes (64 KB).
///
/// Replies to the commands this crate sends are a few bytes; anything
/// larger than this is a misbehaving peer.
const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024;

/// Nesting limit for arrays.
const MAX_DEPTH: usize = 8;

/// A RESP2 value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// `+OK`
    Simple(String),

    /// `-ERR message`
    Error(String),

    /// `:1`
    Integer(i64),

    /// `$n` followed by `n` bytes, `None` for the null bulk string.
    Bulk(Option<Bytes>),

    /// `*n` followed by `n` values, `None` for the null array.
    Array(Option<Vec<RespValue>>),
}

impl RespValue {
    pub fn bulk(data: impl Into<Bytes>) -> Self {
        Self::Bulk(Some(data.into()))
    }

    /// Elements of a non-null array of bulk strings, as UTF-8 text.
    ///
    /// Returns `None` for anything else.
    pub fn as_command(&self) -> Option<Vec<String>> {
        let Self::Array(Some(items)) = self else {
            return None;
        };
        items
            .iter()
            .map(|item| match item {
                Self::Bulk(Some(data)) => String::from_utf8(data.to_vec()).ok(),
                _ => None,
            })
            .collect()
    }
}

/// A command: name followed by arguments, all sent as bulk strings.
///
/// # Example
///
/// ```
/// use keycard_network::resp::Command;
///
/// let cmd = Command::new("EXPIRE").arg("keycard").arg(10.to_string());
/// assert_eq!(cmd.name(), "EXPIRE");
/// assert_eq!(cmd.len(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    parts: Vec<Bytes>,
}

impl Command {
    pub fn new(name: &'static str) -> Self {
        Self {
            parts: vec![Bytes::from_static(name.as_bytes())],
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<Bytes>) -> Self {
        self.parts.push(arg.into());
        self
    }

    pub fn name(&self) -> &str {
        std::str::from_utf8(&self.parts[0]).unwrap_or_default()
    }

    /// Number of parts including the command name.
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Wire representation as an array of bulk strings.
    pub fn into_value(self) -> RespValue {
        RespValue::Array(Some(self.parts.into_iter().map(|p| RespValue::Bulk(Some(p))).collect()))
    }
}

/// Tokio codec for RESP2 values.
#[derive(Debug)]
pub struct RespCodec {
    max_frame_size: usize,
}

impl RespCodec {
    /// Create a new codec with the default maximum frame size.
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Create a new codec with a custom maximum frame size.
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Default for RespCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for RespCodec {
    type Item = RespValue;
    type Error = NotifyError;

    fn decode(&mut self, src: &mut BytesMut) -> NotifyResult<Option<RespValue>> {
        match parse_value(src, 0, 0)? {
            Some((value, consumed)) => {
                src.advance(consumed);
                Ok(Some(value))
            }
            None if src.len() > self.max_frame_size => Err(NotifyError::protocol(format!(
                "frame exceeds {} bytes",
                self.max_frame_size
            ))),
            None => Ok(None),
        }
    }
}

impl Encoder<RespValue> for RespCodec {
    type Error = NotifyError;

    fn encode(&mut self, value: RespValue, dst: &mut BytesMut) -> NotifyResult<()> {
        write_value(&value, dst);
        Ok(())
    }
}

fn write_value(value: &RespValue, dst: &mut BytesMut) {
    match value {
        RespValue::Simple(text) => write_line(dst, b'+', text.as_bytes()),
        RespValue::Error(text) => write_line(dst, b'-', text.as_bytes()),
        RespValue::Integer(n) => write_line(dst, b':', n.to_string().as_bytes()),
        RespValue::Bulk(None) => dst.put_slice(b"$-1\r\n"),
        RespValue::Bulk(Some(data)) => {
            write_line(dst, b'$', data.len().to_string().as_bytes());
            dst.put_slice(data);
            dst.put_slice(b"\r\n");
        }
        RespValue::Array(None) => dst.put_slice(b"*-1\r\n"),
        RespValue::Array(Some(items)) => {
            write_line(dst, b'*', items.len().to_string().as_bytes());
            for item in items {
                write_value(item, dst);
            }
        }
    }
}

fn write_line(dst: &mut BytesMut, prefix: u8, body: &[u8]) {
    dst.reserve(body.len() + 3);
    dst.put_u8(prefix);
    dst.put_slice(body);
    dst.put_slice(b"\r\n");
}

/// Find the `\r\n`-terminated line starting at `pos`. Returns the line
/// contents and the offset just past the terminator.
fn read_line(buf: &[u8], pos: usize) -> Option<(&[u8], usize)> {
    let rest = buf.get(pos..)?;
    let end = rest.windows(2).position(|w| w == b"\r\n")?;
    Some((&rest[..end], pos + end + 2))
}

fn parse_int(line: &[u8]) -> NotifyResult<i64> {
    std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| NotifyError::protocol(format!("invalid integer {:?}", String::from_utf8_lossy(line))))
}

fn parse_text(line: &[u8]) -> NotifyResult<String> {
    String::from_utf8(line.to_vec()).map_err(|_| NotifyError::protocol("non UTF-8 status line"))
}

/// Parse one value starting at `pos`. `Ok(None)` means more bytes are needed.
fn parse_value(buf: &[u8], pos: usize, depth: usize) -> NotifyResult<Option<(RespValue, usize)>> {
    if depth > MAX_DEPTH {
        return Err(NotifyError::protocol("array nesting too deep"));
    }
    let Some(&prefix) = buf.get(pos) else {
        return Ok(None);
    };
    let Some((line, next)) = read_line(buf, pos + 1) else {
        return Ok(None);
    };

    let parsed = match prefix {
        b'+' => (RespValue::Simple(parse_text(line)?), next),
        b'-' => (RespValue::Error(parse_text(line)?), next),
        b':' => (RespValue::Integer(parse_int(line)?), next),
        b'$' => match parse_int(line)? {
            -1 => (RespValue::Bulk(None), next),
            len if len < 0 => {
                return Err(NotifyError::protocol(format!("invalid bulk length {len}")));
            }
            len => {
                let end = next + len as usize;
                if buf.len() < end + 2 {
                    return Ok(None);
                }
                if &buf[end..end + 2] != b"\r\n" {
                    return Err(NotifyError::protocol("bulk string not terminated"));
                }
                (
                    RespValue::Bulk(Some(Bytes::copy_from_slice(&buf[next..end]))),
                    end + 2,
                )
            }
        },
        b'*' => match parse_int(line)? {
            -1 => (RespValue::Array(None), next),
            count if count < 0 => {
                return Err(NotifyError::protocol(format!("invalid array length {count}")));
            }
            count => {
                let mut items = Vec::with_capacity((count as usize).min(64));
                let mut cursor = next;
                for _ in 0..count {
                    let Some((item, after)) = parse_value(buf, cursor, depth + 1)? else {
                        return Ok(None);
                    };
                    items.push(item);
                    cursor = after;
                }
                (RespValue::Array(Some(items)), cursor)
            }
        },
        other => {
            return Err(NotifyError::protocol(format!(
                "unknown type byte 0x{other:02X}"
            )));
        }
    };
    Ok(Some(parsed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn decode_all(input: &[u8]) -> Vec<RespValue> {
        let mut codec = RespCodec::new();
        let mut buf = BytesMut::from(input);
        let mut values = Vec::new();
        while let Some(value) = codec.decode(&mut buf).unwrap() {
            values.push(value);
        }
        assert!(buf.is_empty(), "trailing bytes: {buf:?}");
        values
    }

    #[test]
    fn test_encode_command() {
        let mut codec = RespCodec::new();
        let mut buf = BytesMut::new();
        let cmd = Command::new("HSET").arg("keycard").arg("uid").arg("AABBCCDD");

        codec.encode(cmd.into_value(), &mut buf).unwrap();

        assert_eq!(
            &buf[..],
            b"*4\r\n$4\r\nHSET\r\n$7\r\nkeycard\r\n$3\r\nuid\r\n$8\r\nAABBCCDD\r\n"
        );
    }

    #[rstest]
    #[case(b"+OK\r\n", RespValue::Simple("OK".into()))]
    #[case(b"-ERR wrong type\r\n", RespValue::Error("ERR wrong type".into()))]
    #[case(b":1\r\n", RespValue::Integer(1))]
    #[case(b":-3\r\n", RespValue::Integer(-3))]
    #[case(b"$5\r\nhello\r\n", RespValue::bulk("hello"))]
    #[case(b"$0\r\n\r\n", RespValue::bulk(""))]
    #[case(b"$-1\r\n", RespValue::Bulk(None))]
    #[case(b"*-1\r\n", RespValue::Array(None))]
    #[case(
        b"*2\r\n:1\r\n$3\r\nfoo\r\n",
        RespValue::Array(Some(vec![RespValue::Integer(1), RespValue::bulk("foo")]))
    )]
    fn test_decode_reply(#[case] input: &[u8], #[case] expected: RespValue) {
        assert_eq!(decode_all(input), vec![expected]);
    }

    #[test]
    fn test_decode_pipelined_replies() {
        let values = decode_all(b":1\r\n:0\r\n:1\r\n:2\r\n:1\r\n");
        assert_eq!(values.len(), 5);
        assert_eq!(values[3], RespValue::Integer(2));
    }

    #[test]
    fn test_decode_partial_frames() {
        let mut codec = RespCodec::new();
        let mut buf = BytesMut::new();

        for chunk in [&b"*2\r\n$3\r"[..], b"\nfoo\r\n$", b"3\r\nbar", b"\r\n"] {
            assert!(buf.is_empty() || codec.decode(&mut buf).unwrap().is_none());
            buf.extend_from_slice(chunk);
        }

        let value = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(
            value.as_command(),
            Some(vec!["foo".to_string(), "bar".to_string()])
        );
        assert!(buf.is_empty());
    }

    #[rstest]
    #[case(b"?1\r\n")]
    #[case(b":abc\r\n")]
    #[case(b"$-5\r\n")]
    #[case(b"$3\r\nfooXY")]
    fn test_decode_rejects_malformed(#[case] input: &[u8]) {
        let mut codec = RespCodec::new();
        let mut buf = BytesMut::from(input);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(NotifyError::Protocol(_))
        ));
    }

    #[test]
    fn test_decode_rejects_oversized_frame() {
        let mut codec = RespCodec::with_max_frame_size(16);
        let mut buf = BytesMut::from(&b"$100\r\n0123456789012345678901234567890"[..]);
        assert!(codec.decode(&mut buf).is_err());
    }

    #[test]
    fn test_as_command_rejects_non_commands() {
        assert_eq!(RespValue::Integer(1).as_command(), None);
        assert_eq!(
            RespValue::Array(Some(vec![RespValue::Integer(1)])).as_command(),
            None
        );
    }
}
