//! Wire codec: length-prefixed strings and big-endian integers.
//!
//! Every decode reads exactly the bytes it needs straight from the stream.
//! Nothing is buffered ahead, so a bulk copy that follows the handshake sees
//! the payload from its first byte.

use std::future::Future;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

use crate::error::{SessionError, SessionResult};
use crate::protocol::MAX_STRING_LEN;

/// Run `fut` under an optional deadline.
pub async fn timed<T, F>(limit: Option<Duration>, what: &'static str, fut: F) -> SessionResult<T>
where
    F: Future<Output = SessionResult<T>>,
{
    match limit {
        None => fut.await,
        Some(d) => match timeout(d, fut).await {
            Ok(res) => res,
            Err(_) => Err(SessionError::Timeout(d, what)),
        },
    }
}

/// Fill `buf` completely or fail with `ShortRead`.
pub async fn read_full<R>(r: &mut R, buf: &mut [u8]) -> SessionResult<()>
where
    R: AsyncRead + Unpin,
{
    let mut got = 0;
    while got < buf.len() {
        let n = r.read(&mut buf[got..]).await?;
        if n == 0 {
            return Err(SessionError::ShortRead {
                expected: buf.len(),
                got,
            });
        }
        got += n;
    }
    Ok(())
}

pub async fn read_i32<R: AsyncRead + Unpin>(r: &mut R) -> SessionResult<i32> {
    let mut b = [0u8; 4];
    read_full(r, &mut b).await?;
    Ok(i32::from_be_bytes(b))
}

pub async fn read_i64<R: AsyncRead + Unpin>(r: &mut R) -> SessionResult<i64> {
    let mut b = [0u8; 8];
    read_full(r, &mut b).await?;
    Ok(i64::from_be_bytes(b))
}

pub async fn read_string<R: AsyncRead + Unpin>(r: &mut R) -> SessionResult<String> {
    let mut len = [0u8; 2];
    read_full(r, &mut len).await?;
    let len = u16::from_be_bytes(len) as usize;
    let mut body = vec![0u8; len];
    read_full(r, &mut body).await?;
    String::from_utf8(body).map_err(|e| SessionError::Protocol(format!("string is not UTF-8: {e}")))
}

pub async fn write_i32<W: AsyncWrite + Unpin>(w: &mut W, v: i32) -> SessionResult<()> {
    w.write_all(&v.to_be_bytes()).await?;
    Ok(())
}

pub async fn write_i64<W: AsyncWrite + Unpin>(w: &mut W, v: i64) -> SessionResult<()> {
    w.write_all(&v.to_be_bytes()).await?;
    Ok(())
}

/// Write a u16-length-prefixed string and flush it.
pub async fn write_string<W: AsyncWrite + Unpin>(w: &mut W, s: &str) -> SessionResult<()> {
    if s.len() > MAX_STRING_LEN {
        return Err(SessionError::Protocol(format!(
            "string too long: {} bytes (max: {})",
            s.len(),
            MAX_STRING_LEN
        )));
    }
    let mut out = Vec::with_capacity(2 + s.len());
    out.extend_from_slice(&(s.len() as u16).to_be_bytes());
    out.extend_from_slice(s.as_bytes());
    w.write_all(&out).await?;
    w.flush().await?;
    Ok(())
}
