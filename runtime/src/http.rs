use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};

use crate::{Result, ServerError};

/// A parsed HTTP request: request line plus the `Content-Length` body. Other
/// headers are read off the wire and discarded; nothing in the protocol
/// surface consumes them.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub body: String,
}

/// Responses use a fixed framing: status line, `Content-Type: text/plain`,
/// `Content-Length`, `Connection: close`. This byte layout is the
/// compatibility surface and must not change.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: String,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            body: body.into(),
        }
    }

    pub fn ok(body: impl Into<String>) -> Self {
        Self::new("200 OK", body)
    }

    pub fn created(body: impl Into<String>) -> Self {
        Self::new("201 Created", body)
    }

    pub fn bad_request(body: impl Into<String>) -> Self {
        Self::new("400 Bad Request", body)
    }

    pub fn not_found(body: impl Into<String>) -> Self {
        Self::new("404 Not Found", body)
    }

    pub fn encode(&self) -> String {
        format!(
            "HTTP/1.1 {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            self.status,
            self.body.len(),
            self.body
        )
    }
}

/// Reads one request from the stream: request line, headers up to the blank
/// line, then exactly `Content-Length` body bytes.
pub(crate) async fn read_request<R>(reader: &mut BufReader<R>) -> Result<HttpRequest>
where
    R: AsyncRead + Unpin,
{
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;

    let mut parts = request_line.split_whitespace();
    let method = parts
        .next()
        .ok_or_else(|| ServerError::Protocol("empty request line".to_string()))?
        .to_string();
    let path = parts
        .next()
        .ok_or_else(|| ServerError::Protocol("request line missing path".to_string()))?
        .to_string();

    let mut content_length = 0usize;
    loop {
        let mut header = String::new();
        let read = reader.read_line(&mut header).await?;
        let header = header.trim_end();
        if read == 0 || header.is_empty() {
            break;
        }

        if let Some((name, value)) = header.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse::<usize>().map_err(|e| {
                    ServerError::Protocol(format!("bad Content-Length: {}", e))
                })?;
            }
        }
    }

    let mut body = String::new();
    if content_length > 0 {
        let mut buf = vec![0u8; content_length];
        reader.read_exact(&mut buf).await?;
        body = String::from_utf8_lossy(&buf).into_owned();
    }

    Ok(HttpRequest { method, path, body })
}
