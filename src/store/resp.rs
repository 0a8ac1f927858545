//! RESP2 wire codec
//!
//! Commands are encoded as arrays of bulk strings. Replies are parsed
//! incrementally from a byte buffer: `parse` returns `Ok(None)` until a
//! complete value is available.

use crate::error::{MirrorError, MirrorResult};

/// Largest bulk string a server may send (Redis `proto-max-bulk-len`)
const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;

/// A decoded RESP2 value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// `+OK\r\n`
    Simple(String),
    /// `-ERR message\r\n`
    Error(String),
    /// `:42\r\n`
    Integer(i64),
    /// `$3\r\nfoo\r\n`, `$-1\r\n` is `None`
    Bulk(Option<Vec<u8>>),
    /// `*2\r\n...`, `*-1\r\n` is `None`
    Array(Option<Vec<RespValue>>),
}

impl RespValue {
    /// Text content of a simple or bulk string
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Simple(s) => Some(s.clone()),
            Self::Bulk(Some(bytes)) => Some(String::from_utf8_lossy(bytes).into_owned()),
            _ => None,
        }
    }

    /// Whether this is a nil bulk string or nil array
    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Bulk(None) | Self::Array(None))
    }

    /// Elements of a non-nil array
    pub fn into_array(self) -> Option<Vec<RespValue>> {
        match self {
            Self::Array(Some(items)) => Some(items),
            _ => None,
        }
    }
}

/// Encode a command as a RESP array of bulk strings
pub fn encode_command(args: &[&str]) -> Vec<u8> {
    let mut out = Vec::with_capacity(16 + args.iter().map(|a| a.len() + 16).sum::<usize>());
    out.extend_from_slice(format!("*{}\r\n", args.len()).as_bytes());
    for arg in args {
        out.extend_from_slice(format!("${}\r\n", arg.len()).as_bytes());
        out.extend_from_slice(arg.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out
}

/// Parse one value from the front of `buf`.
///
/// Returns the value and the number of bytes it occupied, or `None` if
/// `buf` does not yet hold a complete value.
pub fn parse(buf: &[u8]) -> MirrorResult<Option<(RespValue, usize)>> {
    parse_at(buf, 0)
}

fn parse_at(buf: &[u8], start: usize) -> MirrorResult<Option<(RespValue, usize)>> {
    let Some(&tag) = buf.get(start) else {
        return Ok(None);
    };
    let Some((line, after_line)) = read_line(buf, start + 1) else {
        return Ok(None);
    };

    match tag {
        b'+' => Ok(Some((RespValue::Simple(text(line)), after_line - start))),
        b'-' => Ok(Some((RespValue::Error(text(line)), after_line - start))),
        b':' => {
            let n = parse_int(line)?;
            Ok(Some((RespValue::Integer(n), after_line - start)))
        }
        b'$' => {
            let len = parse_int(line)?;
            if len < 0 {
                return Ok(Some((RespValue::Bulk(None), after_line - start)));
            }
            if len > MAX_BULK_LEN {
                return Err(MirrorError::StoreProtocol(format!(
                    "bulk length {} exceeds {}",
                    len, MAX_BULK_LEN
                )));
            }
            let end = after_line + len as usize;
            if buf.len() < end + 2 {
                return Ok(None);
            }
            if &buf[end..end + 2] != b"\r\n" {
                return Err(MirrorError::StoreProtocol(
                    "bulk string not terminated by CRLF".to_string(),
                ));
            }
            let data = buf[after_line..end].to_vec();
            Ok(Some((RespValue::Bulk(Some(data)), end + 2 - start)))
        }
        b'*' => {
            let count = parse_int(line)?;
            if count < 0 {
                return Ok(Some((RespValue::Array(None), after_line - start)));
            }
            // Every element takes at least three bytes, so never reserve more
            // than the buffer could hold
            let reserve = usize::try_from(count)
                .unwrap_or(usize::MAX)
                .min((buf.len() - after_line) / 3);
            let mut items = Vec::with_capacity(reserve);
            let mut pos = after_line;
            for _ in 0..count {
                match parse_at(buf, pos)? {
                    Some((item, used)) => {
                        items.push(item);
                        pos += used;
                    }
                    None => return Ok(None),
                }
            }
            Ok(Some((RespValue::Array(Some(items)), pos - start)))
        }
        other => Err(MirrorError::StoreProtocol(format!(
            "unexpected type byte {:?}",
            other as char
        ))),
    }
}

/// Find the CRLF-terminated line starting at `from`; returns the line and the
/// index just past its CRLF.
fn read_line(buf: &[u8], from: usize) -> Option<(&[u8], usize)> {
    let rest = buf.get(from..)?;
    let idx = rest.windows(2).position(|w| w == b"\r\n")?;
    Some((&rest[..idx], from + idx + 2))
}

fn text(line: &[u8]) -> String {
    String::from_utf8_lossy(line).into_owned()
}

fn parse_int(line: &[u8]) -> MirrorResult<i64> {
    std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| MirrorError::StoreProtocol(format!("invalid integer {:?}", text(line))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bulk(s: &str) -> RespValue {
        RespValue::Bulk(Some(s.as_bytes().to_vec()))
    }

    #[test]
    fn encodes_command() {
        assert_eq!(
            encode_command(&["GET", "env/color"]),
            b"*2\r\n$3\r\nGET\r\n$9\r\nenv/color\r\n".to_vec()
        );
    }

    #[test]
    fn parses_scalars() {
        assert_eq!(
            parse(b"+OK\r\n").unwrap(),
            Some((RespValue::Simple("OK".to_string()), 5))
        );
        assert_eq!(
            parse(b"-ERR unknown\r\n").unwrap(),
            Some((RespValue::Error("ERR unknown".to_string()), 14))
        );
        assert_eq!(parse(b":-7\r\n").unwrap(), Some((RespValue::Integer(-7), 5)));
        assert_eq!(parse(b"$2\r\n12\r\n").unwrap(), Some((bulk("12"), 8)));
        assert_eq!(parse(b"$-1\r\n").unwrap(), Some((RespValue::Bulk(None), 5)));
    }

    #[test]
    fn parses_nested_arrays() {
        let input = b"*2\r\n$1\r\n0\r\n*2\r\n$9\r\nenv/color\r\n$6\r\njunk/x\r\n";
        let (value, used) = parse(input).unwrap().unwrap();
        assert_eq!(used, input.len());
        assert_eq!(
            value,
            RespValue::Array(Some(vec![
                bulk("0"),
                RespValue::Array(Some(vec![bulk("env/color"), bulk("junk/x")])),
            ]))
        );
    }

    #[test]
    fn bulk_may_contain_crlf() {
        let (value, _) = parse(b"$4\r\na\r\nb\r\n").unwrap().unwrap();
        assert_eq!(value, bulk("a\r\nb"));
    }

    #[test]
    fn incomplete_input_waits() {
        assert_eq!(parse(b"").unwrap(), None);
        assert_eq!(parse(b"+OK").unwrap(), None);
        assert_eq!(parse(b"$5\r\nhel").unwrap(), None);
        assert_eq!(parse(b"*2\r\n$1\r\na\r\n").unwrap(), None);
    }

    #[test]
    fn trailing_bytes_are_left_alone() {
        let (value, used) = parse(b":1\r\n:2\r\n").unwrap().unwrap();
        assert_eq!(value, RespValue::Integer(1));
        assert_eq!(used, 4);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse(b"?what\r\n").is_err());
        assert!(parse(b":abc\r\n").is_err());
        assert!(parse(b"$2\r\nabcd\r\n").is_err());
        assert!(parse(b"$9223372036854775807\r\n").is_err());
    }

    #[test]
    fn huge_array_length_waits_for_data() {
        assert_eq!(parse(b"*9223372036854775807\r\n").unwrap(), None);
        assert_eq!(parse(b"*9223372036854775807\r\n:1\r\n").unwrap(), None);
    }

    #[test]
    fn value_helpers() {
        assert_eq!(bulk("x").as_text().as_deref(), Some("x"));
        assert!(RespValue::Bulk(None).is_nil());
        assert!(RespValue::Array(None).into_array().is_none());
    }
}
