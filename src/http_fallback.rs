//! Handlers for connections that do not speak the transfer protocol.
//!
//! The dispatcher hands over the first request line and the raw stream;
//! nothing here touches session state.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use anyhow::Result;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use crate::protocol_core::normalize_under_root;

/// Upper bound on request headers we drain before answering
const MAX_HEADER_BYTES: usize = 16 * 1024;

pub trait ForeignStream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> ForeignStream for T {}

pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

pub trait ForeignHandler: Send + Sync {
    fn handle<'a>(
        &'a self,
        line: &'a str,
        stream: &'a mut dyn ForeignStream,
        root: &'a Path,
    ) -> HandlerFuture<'a>;
}

/// Logs the request and closes the connection.
pub struct RefuseForeign;

impl ForeignHandler for RefuseForeign {
    fn handle<'a>(
        &'a self,
        line: &'a str,
        _stream: &'a mut dyn ForeignStream,
        _root: &'a Path,
    ) -> HandlerFuture<'a> {
        Box::pin(async move {
            info!("refusing non-protocol request: {}", line);
            Ok(())
        })
    }
}

/// Minimal HTTP/1.0 responder: GET or HEAD of one file under the root.
pub struct StaticHttp;

impl ForeignHandler for StaticHttp {
    fn handle<'a>(
        &'a self,
        line: &'a str,
        stream: &'a mut dyn ForeignStream,
        root: &'a Path,
    ) -> HandlerFuture<'a> {
        Box::pin(serve_static(line, stream, root))
    }
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase()).as_deref() {
        Some("html") | Some("htm") => "text/html",
        Some("txt") => "text/plain",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

fn percent_decode(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = std::str::from_utf8(bytes.get(i + 1..i + 3)?).ok()?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

async fn drain_headers(stream: &mut dyn ForeignStream) -> Result<()> {
    let mut seen = 0usize;
    let mut line_len = 0usize;
    let mut byte = [0u8; 1];
    while seen < MAX_HEADER_BYTES {
        if stream.read(&mut byte).await? == 0 {
            break;
        }
        seen += 1;
        match byte[0] {
            b'\n' if line_len == 0 => break,
            b'\n' => line_len = 0,
            b'\r' => {}
            _ => line_len += 1,
        }
    }
    Ok(())
}

async fn write_status(stream: &mut dyn ForeignStream, code: u16, reason: &str) -> Result<()> {
    let body = format!("{code} {reason}\n");
    let head = format!(
        "HTTP/1.0 {code} {reason}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    stream.write_all(head.as_bytes()).await?;
    stream.write_all(body.as_bytes()).await?;
    stream.flush().await?;
    Ok(())
}

async fn serve_static(line: &str, stream: &mut dyn ForeignStream, root: &Path) -> Result<()> {
    let mut parts = line.split_whitespace();
    let (method, target) = match (parts.next(), parts.next()) {
        (Some(m), Some(t)) => (m, t),
        _ => return write_status(stream, 400, "Bad Request").await,
    };
    drain_headers(stream).await?;

    if method != "GET" && method != "HEAD" {
        return write_status(stream, 405, "Method Not Allowed").await;
    }

    let raw_path = target.split(['?', '#']).next().unwrap_or("");
    let Some(name) = percent_decode(raw_path.trim_start_matches('/')) else {
        return write_status(stream, 400, "Bad Request").await;
    };
    let path = match normalize_under_root(root, &name) {
        Ok(p) if p.is_file() => p,
        _ => {
            debug!("http fallback: no file for {:?}", target);
            return write_status(stream, 404, "Not Found").await;
        }
    };

    let mut file = match tokio::fs::File::open(&path).await {
        Ok(f) => f,
        Err(_) => return write_status(stream, 404, "Not Found").await,
    };
    let len = file.metadata().await?.len();
    let head = format!(
        "HTTP/1.0 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        content_type(&path),
        len
    );
    stream.write_all(head.as_bytes()).await?;
    if method == "GET" {
        tokio::io::copy(&mut file, stream).await?;
    }
    stream.flush().await?;
    info!("http fallback: {} {} ({} bytes)", method, name, len);
    Ok(())
}
