//! Transfer engine: bounded bulk copy with per-session progress accounting.
//!
//! The same loop serves all four directions (server send/receive, client
//! send/receive). Which end is the file only matters for error attribution.

use std::path::Path;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::info;

use crate::error::{SessionError, SessionResult};
use crate::progress::TransferBar;
use crate::wire::timed;

/// Which end of a copy is the local file.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Flow {
    /// file -> socket
    Send,
    /// socket -> file
    Receive,
}

/// Emits each 10% boundary of `total` once, in order.
#[derive(Debug)]
pub struct DecileTracker {
    total: u64,
    reported: u8,
}

impl DecileTracker {
    pub fn new(total: u64) -> Self {
        Self { total, reported: 0 }
    }

    /// Percentages newly crossed now that `transferred` bytes are done.
    pub fn advance_to(&mut self, transferred: u64) -> Vec<u8> {
        if self.total == 0 {
            return Vec::new();
        }
        let decile = ((transferred as u128 * 10) / self.total as u128).min(10) as u8;
        let crossed = (self.reported + 1..=decile).map(|d| d * 10).collect();
        if decile > self.reported {
            self.reported = decile;
        }
        crossed
    }
}

/// Running byte counter for one session, plus its optional observers.
pub struct Meter {
    verb: &'static str,
    label: String,
    transferred: u64,
    deciles: Option<DecileTracker>,
    bar: Option<TransferBar>,
}

impl Meter {
    /// Decile lines are only produced when `debug` is set and the total is known.
    pub fn new(verb: &'static str, label: &str, total: Option<u64>, debug: bool) -> Self {
        let deciles = match total {
            Some(t) if debug && t > 0 => Some(DecileTracker::new(t)),
            _ => None,
        };
        Self {
            verb,
            label: label.to_string(),
            transferred: 0,
            deciles,
            bar: None,
        }
    }

    pub fn with_bar(mut self, bar: TransferBar) -> Self {
        self.bar = Some(bar);
        self
    }

    pub fn transferred(&self) -> u64 {
        self.transferred
    }

    pub fn bar(&self) -> Option<&TransferBar> {
        self.bar.as_ref()
    }

    fn record(&mut self, n: u64) {
        self.transferred += n;
        if let Some(bar) = &self.bar {
            bar.advance(n);
        }
        if let Some(d) = &mut self.deciles {
            for pct in d.advance_to(self.transferred) {
                info!("{} {}% of {}", self.verb, pct, self.label);
            }
        }
    }
}

/// Copy from `src` to `dst` until `limit` bytes have moved or `src` ends.
/// With `limit = None` the copy runs to end of stream.
///
/// Each read asks for at most `min(buf_size, remaining)` bytes, so a bounded
/// copy never consumes past its window.
pub async fn pump<R, W>(
    src: &mut R,
    dst: &mut W,
    limit: Option<u64>,
    buf_size: usize,
    io_timeout: Option<Duration>,
    file: (&Path, Flow),
    meter: &mut Meter,
) -> SessionResult<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (path, flow) = file;
    let attribute = |e: std::io::Error, file_side: bool| {
        if file_side {
            SessionError::storage(path, e)
        } else {
            SessionError::Transport(e)
        }
    };

    let mut buf = vec![0u8; buf_size.max(1)];
    let mut copied: u64 = 0;
    loop {
        let want = match limit {
            Some(l) => {
                let remaining = l - copied;
                if remaining == 0 {
                    break;
                }
                remaining.min(buf.len() as u64) as usize
            }
            None => buf.len(),
        };

        let n = timed(io_timeout, "transfer read", async {
            src.read(&mut buf[..want])
                .await
                .map_err(|e| attribute(e, flow == Flow::Send))
        })
        .await?;
        if n == 0 {
            break;
        }

        timed(io_timeout, "transfer write", async {
            dst.write_all(&buf[..n])
                .await
                .map_err(|e| attribute(e, flow == Flow::Receive))
        })
        .await?;

        copied += n as u64;
        meter.record(n as u64);
    }

    dst.flush()
        .await
        .map_err(|e| attribute(e, flow == Flow::Receive))?;
    Ok(copied)
}
