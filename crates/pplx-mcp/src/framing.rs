//! Message framing on the stdio streams.
//!
//! Two framings are accepted. Clients that follow the LSP convention send
//!
//! ```text
//! Content-Length: <length>\r\n
//! \r\n
//! {"jsonrpc": "2.0", ...}
//! ```
//!
//! while most MCP clients send one JSON object per line. Each reply uses the
//! framing of the message it answers.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{McpError, Result};

/// Upper bound on a Content-Length body.
const MAX_MESSAGE_BYTES: usize = 16 * 1024 * 1024;

/// How a message was framed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// One JSON document per line.
    Line,
    /// `Content-Length` header block followed by the body.
    ContentLength,
}

/// One raw message read from the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub framing: Framing,
    pub body: String,
}

/// Read the next message.
///
/// Returns `Ok(None)` at end of input. Blank lines between messages are
/// skipped.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Frame>>
where
    R: AsyncBufRead + Unpin,
{
    read_frame_limited(reader, MAX_MESSAGE_BYTES).await
}

/// [`read_frame`] with an explicit cap on line and body size.
///
/// An oversized line is discarded up to its newline before the error is
/// returned, so the next call starts on a fresh message.
async fn read_frame_limited<R>(reader: &mut R, limit: usize) -> Result<Option<Frame>>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let Some(line) = read_line_limited(reader, limit).await? else {
            return Ok(None);
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if is_json_start(trimmed) {
            return Ok(Some(Frame {
                framing: Framing::Line,
                body: trimmed.to_string(),
            }));
        }

        // Header block: read until the blank separator line
        let mut content_length = parse_content_length(trimmed)?;
        loop {
            let Some(line) = read_line_limited(reader, limit).await? else {
                return Err(McpError::protocol("unexpected end of input in headers"));
            };
            let header = line.trim();
            if header.is_empty() {
                break;
            }
            if is_json_start(header) {
                return Err(McpError::protocol(
                    "JSON message inside an unterminated header block",
                ));
            }
            if let Some(len) = parse_content_length(header)? {
                content_length = Some(len);
            }
        }

        let len =
            content_length.ok_or_else(|| McpError::protocol("missing Content-Length header"))?;
        if len > limit {
            return Err(McpError::protocol(format!(
                "message of {} bytes exceeds limit of {}",
                len, limit
            )));
        }

        let mut body = vec![0u8; len];
        reader.read_exact(&mut body).await?;
        let body = String::from_utf8(body)
            .map_err(|e| McpError::protocol(format!("message body is not UTF-8: {}", e)))?;
        return Ok(Some(Frame {
            framing: Framing::ContentLength,
            body,
        }));
    }
}

fn is_json_start(line: &str) -> bool {
    line.starts_with('{') || line.starts_with('[')
}

/// Read the next line, taking at most `limit` bytes. `None` at end of input.
async fn read_line_limited<R>(reader: &mut R, limit: usize) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let n = (&mut *reader)
        .take(limit as u64 + 1)
        .read_until(b'\n', &mut buf)
        .await?;
    if n == 0 {
        return Ok(None);
    }
    if n > limit && buf.last() != Some(&b'\n') {
        discard_line(reader).await?;
        return Err(McpError::protocol(format!(
            "line exceeds limit of {} bytes",
            limit
        )));
    }
    String::from_utf8(buf)
        .map(Some)
        .map_err(|e| McpError::protocol(format!("line is not UTF-8: {}", e)))
}

/// Skip input up to and including the next newline.
async fn discard_line<R>(reader: &mut R) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let buf = reader.fill_buf().await?;
        if buf.is_empty() {
            return Ok(());
        }
        match buf.iter().position(|&b| b == b'\n') {
            Some(i) => {
                reader.consume(i + 1);
                return Ok(());
            }
            None => {
                let n = buf.len();
                reader.consume(n);
            }
        }
    }
}

/// Returns the length if `header` is a Content-Length header.
fn parse_content_length(header: &str) -> Result<Option<usize>> {
    let Some((name, value)) = header.split_once(':') else {
        return Err(McpError::protocol(format!("malformed header line: {}", header)));
    };
    if !name.trim().eq_ignore_ascii_case("content-length") {
        return Ok(None);
    }
    value
        .trim()
        .parse()
        .map(Some)
        .map_err(|e| McpError::protocol(format!("invalid Content-Length: {}", e)))
}

/// Write one message using `framing` and flush.
pub async fn write_frame<W>(writer: &mut W, framing: Framing, body: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    match framing {
        Framing::Line => {
            writer.write_all(body.as_bytes()).await?;
            writer.write_all(b"\n").await?;
        }
        Framing::ContentLength => {
            let header = format!("Content-Length: {}\r\n\r\n", body.len());
            writer.write_all(header.as_bytes()).await?;
            writer.write_all(body.as_bytes()).await?;
        }
    }
    writer.flush().await?;
    Ok(())
}
