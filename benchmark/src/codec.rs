//! HTTP/1.1 wire handling for pipelined connections.
//!
//! Requests are encoded once per run and written verbatim. Responses are only
//! framed, never decoded: the worker needs the status, the number of bytes the
//! response occupied on the wire and whether the server is closing the
//! connection.

use bytes::{BufMut, Bytes, BytesMut};
use hyper::Method;

use crate::{error::ParseError, settings::BenchmarkConfig};

const CRLF: &[u8] = b"\r\n";
const HEADER_END: &[u8] = b"\r\n\r\n";

pub(crate) fn encode_request(config: &BenchmarkConfig) -> Bytes {
    let mut buf = BytesMut::with_capacity(128);
    buf.put_slice(config.method().as_str().as_bytes());
    buf.put_u8(b' ');
    buf.put_slice(config.path_and_query().as_bytes());
    buf.put_slice(b" HTTP/1.1\r\nHost: ");
    buf.put_slice(config.host_header().as_bytes());
    buf.put_slice(b"\r\nUser-Agent: http-bench/");
    buf.put_slice(env!("CARGO_PKG_VERSION").as_bytes());
    buf.put_slice(b"\r\nAccept: */*\r\n");
    if [Method::POST, Method::PUT, Method::PATCH].contains(config.method()) {
        buf.put_slice(b"Content-Length: 0\r\n");
    }
    buf.put_slice(CRLF);
    buf.freeze()
}

/// A complete response found at the start of the read buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Frame {
    pub status: u16,
    /// Bytes the response occupies, head and body.
    pub len: usize,
    /// The server will not accept further requests on this connection.
    pub close: bool,
}

/// Frames the first response in `buf`.
///
/// Returns `Ok(None)` while more bytes are needed. `eof` marks that the peer
/// has shut down its side, which completes a close-delimited body.
pub(crate) fn parse_response(
    buf: &[u8],
    expects_body: bool,
    eof: bool,
) -> Result<Option<Frame>, ParseError> {
    let Some(head_end) = find(buf, HEADER_END) else {
        return Ok(None);
    };
    let body_start = head_end + HEADER_END.len();
    let mut lines = buf[..head_end].split(|b| *b == b'\n').map(trim_cr);

    let status_line = lines.next().ok_or(ParseError::StatusLine)?;
    let (http_10, status) = parse_status_line(status_line)?;

    let mut content_length = None;
    let mut chunked = false;
    let mut close = http_10;
    for line in lines {
        let colon = line
            .iter()
            .position(|b| *b == b':')
            .ok_or(ParseError::Header)?;
        let name = line[..colon].trim_ascii();
        let value = line[colon + 1..].trim_ascii();
        if name.eq_ignore_ascii_case(b"content-length") {
            let len = std::str::from_utf8(value)
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .ok_or(ParseError::ContentLength)?;
            content_length = Some(len);
        } else if name.eq_ignore_ascii_case(b"transfer-encoding") {
            chunked = has_token(value, b"chunked");
        } else if name.eq_ignore_ascii_case(b"connection") {
            if has_token(value, b"close") {
                close = true;
            } else if has_token(value, b"keep-alive") {
                close = false;
            }
        }
    }

    let bodiless = !expects_body || (100..200).contains(&status) || status == 204 || status == 304;
    let len = if bodiless {
        Some(body_start)
    } else if chunked {
        chunked_len(&buf[body_start..])?.map(|n| body_start + n)
    } else if let Some(n) = content_length {
        let end = body_start
            .checked_add(n)
            .ok_or(ParseError::ContentLength)?;
        (buf.len() >= end).then_some(end)
    } else if eof {
        close = true;
        Some(buf.len())
    } else {
        None
    };

    Ok(len.map(|len| Frame { status, len, close }))
}

fn parse_status_line(line: &[u8]) -> Result<(bool, u16), ParseError> {
    let mut parts = line.splitn(3, |b| *b == b' ');
    let version = parts.next().ok_or(ParseError::StatusLine)?;
    let http_10 = match version {
        b"HTTP/1.1" => false,
        b"HTTP/1.0" => true,
        _ => return Err(ParseError::StatusLine),
    };
    let code = parts.next().ok_or(ParseError::StatusLine)?;
    if code.len() != 3 || !code.iter().all(u8::is_ascii_digit) {
        return Err(ParseError::StatusLine);
    }
    let status = code
        .iter()
        .fold(0u16, |acc, d| acc * 10 + u16::from(d - b'0'));
    if status < 100 {
        return Err(ParseError::StatusLine);
    }
    Ok((http_10, status))
}

/// Length of a complete chunked body, trailers included.
fn chunked_len(body: &[u8]) -> Result<Option<usize>, ParseError> {
    let mut pos = 0;
    loop {
        let Some(line_len) = find(&body[pos..], CRLF) else {
            return Ok(None);
        };
        let size_line = &body[pos..pos + line_len];
        let size_hex = size_line
            .split(|b| *b == b';')
            .next()
            .unwrap_or_default()
            .trim_ascii();
        let size = std::str::from_utf8(size_hex)
            .ok()
            .and_then(|s| usize::from_str_radix(s, 16).ok())
            .ok_or(ParseError::Chunk)?;
        pos += line_len + CRLF.len();

        if size == 0 {
            // trailer section ends with an empty line
            loop {
                let Some(line_len) = find(&body[pos..], CRLF) else {
                    return Ok(None);
                };
                pos += line_len + CRLF.len();
                if line_len == 0 {
                    return Ok(Some(pos));
                }
            }
        }

        let data_end = pos.checked_add(size).ok_or(ParseError::Chunk)?;
        let chunk_end = data_end
            .checked_add(CRLF.len())
            .ok_or(ParseError::Chunk)?;
        if body.len() < chunk_end {
            return Ok(None);
        }
        if &body[data_end..chunk_end] != CRLF {
            return Err(ParseError::Chunk);
        }
        pos = chunk_end;
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn trim_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn has_token(value: &[u8], token: &[u8]) -> bool {
    value
        .split(|b| *b == b',')
        .any(|part| part.trim_ascii().eq_ignore_ascii_case(token))
}
