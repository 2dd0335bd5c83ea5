//! Client driver: one connection, one transfer, closed on every exit path.

use std::io::{ErrorKind, SeekFrom};
use std::path::Path;
use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncSeekExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::error::{SessionError, SessionResult};
use crate::progress::TransferBar;
use crate::protocol::BUFFER_SIZE;
use crate::protocol_core::{ensure_parent_exists, resolve_window, Window};
use crate::session::{Mode, TransferOutcome, TransferRequest, TransferStatus};
use crate::transfer::{pump, Flow, Meter};
use crate::wire;

#[derive(Clone, Debug)]
pub struct ClientOptions {
    pub io_timeout: Option<Duration>,
    pub buffer_size: usize,
    /// Decile progress lines
    pub debug: bool,
    /// Interactive progress bar
    pub progress: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            io_timeout: None,
            buffer_size: BUFFER_SIZE,
            debug: false,
            progress: false,
        }
    }
}

pub async fn connect(host: &str, port: u16, io_timeout: Option<Duration>) -> SessionResult<TcpStream> {
    let stream = wire::timed(io_timeout, "connect", async {
        TcpStream::connect((host, port)).await.map_err(SessionError::from)
    })
    .await?;
    let _ = stream.set_nodelay(true);
    Ok(stream)
}

/// Run `request` against `host:port`.
///
/// For a download `local` is the target (created or overwritten); for an
/// upload it is the source. Protocol rejections are returned as outcomes.
pub async fn transfer(
    host: &str,
    port: u16,
    request: &TransferRequest,
    local: &Path,
    opts: &ClientOptions,
) -> SessionResult<TransferOutcome> {
    match request.mode {
        Mode::Download => {
            let mut stream = connect(host, port, opts.io_timeout).await?;
            let res = download_on(&mut stream, request, local, opts).await;
            close(&mut stream).await;
            res
        }
        Mode::Upload => {
            // Open and slice the source before touching the network
            let (file, window) = match open_source(request, local).await? {
                Ok(opened) => opened,
                Err(rejected) => return Ok(rejected),
            };
            let mut stream = connect(host, port, opts.io_timeout).await?;
            let res = upload_on(&mut stream, request, file, window, local, opts).await;
            close(&mut stream).await;
            res
        }
    }
}

async fn close(stream: &mut TcpStream) {
    if let Err(e) = stream.shutdown().await {
        debug!("shutdown: {}", e);
    }
}

async fn send_request<S>(stream: &mut S, request: &TransferRequest, t: Option<Duration>) -> SessionResult<()>
where
    S: AsyncWrite + Unpin,
{
    wire::timed(t, "mode token", wire::write_i32(stream, request.mode.token())).await?;
    wire::timed(t, "filename", wire::write_string(stream, &request.filename)).await
}

async fn read_status<S>(stream: &mut S, t: Option<Duration>) -> SessionResult<TransferStatus>
where
    S: AsyncRead + Unpin,
{
    let reply = wire::timed(t, "reply", wire::read_string(stream)).await?;
    TransferStatus::from_reply(&reply)
        .ok_or_else(|| SessionError::Protocol(format!("unexpected reply {:?}", reply)))
}

fn meter_for(verb: &'static str, request: &TransferRequest, total: Option<u64>, opts: &ClientOptions) -> Meter {
    let meter = Meter::new(verb, &request.filename, total, opts.debug);
    if opts.progress {
        meter.with_bar(TransferBar::new(&request.filename, total))
    } else {
        meter
    }
}

fn finish(meter: &Meter, res: &SessionResult<u64>) {
    if let Some(bar) = meter.bar() {
        match res {
            Ok(n) => bar.finish_success(*n),
            Err(e) => bar.finish_error(&e.to_string()),
        }
    }
}

/// Download half of the exchange over an open stream.
pub async fn download_on<S>(
    stream: &mut S,
    request: &TransferRequest,
    target: &Path,
    opts: &ClientOptions,
) -> SessionResult<TransferOutcome>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let t = opts.io_timeout;
    send_request(stream, request, t).await?;
    let status = read_status(stream, t).await?;
    if status != TransferStatus::Ok {
        return Ok(TransferOutcome::rejected(status));
    }

    let (skip, end) = request.wire_range();
    wire::timed(t, "skip count", wire::write_i64(stream, skip)).await?;
    wire::timed(t, "end index", wire::write_i64(stream, end)).await?;
    wire::timed(t, "flush", async { stream.flush().await.map_err(SessionError::from) }).await?;
    let status = read_status(stream, t).await?;
    if status != TransferStatus::Ok {
        return Ok(TransferOutcome::rejected(status));
    }

    // Only touch the local target once the server has committed
    ensure_parent_exists(target).map_err(|e| SessionError::storage(target, e))?;
    let mut file = File::create(target)
        .await
        .map_err(|e| SessionError::storage(target, e))?;

    let expected = (end > 0).then(|| (end - skip) as u64);
    let mut meter = meter_for("Received", request, expected, opts);
    let res = pump(
        stream,
        &mut file,
        expected,
        opts.buffer_size,
        t,
        (target, Flow::Receive),
        &mut meter,
    )
    .await;
    finish(&meter, &res);
    let got = res?;

    if let Some(expected) = expected {
        if got < expected {
            return Err(SessionError::ShortRead {
                expected: expected as usize,
                got: got as usize,
            });
        }
    }
    if opts.debug {
        info!("Finished receiving {} ({} bytes)", request.filename, got);
    }
    Ok(TransferOutcome::ok(got))
}

/// Open the upload source and apply the request's range to it.
/// The inner `Err` is a locally detected rejection.
pub async fn open_source(
    request: &TransferRequest,
    source: &Path,
) -> SessionResult<Result<(File, Window), TransferOutcome>> {
    let file = match File::open(source).await {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Ok(Err(TransferOutcome::rejected(TransferStatus::FileNotFound)))
        }
        Err(e) => return Err(SessionError::storage(source, e)),
    };
    let len = file
        .metadata()
        .await
        .map_err(|e| SessionError::storage(source, e))?
        .len();
    let (skip, end) = request.wire_range();
    match resolve_window(len, skip, end) {
        Some(w) => Ok(Ok((file, w))),
        None => Ok(Err(TransferOutcome::rejected(TransferStatus::InvalidRange))),
    }
}

/// Upload half of the exchange: sends `window` of `file`.
pub async fn upload_on<S>(
    stream: &mut S,
    request: &TransferRequest,
    mut file: File,
    window: Window,
    source: &Path,
    opts: &ClientOptions,
) -> SessionResult<TransferOutcome>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let t = opts.io_timeout;
    send_request(stream, request, t).await?;
    let status = read_status(stream, t).await?;
    if status != TransferStatus::Ok {
        return Ok(TransferOutcome::rejected(status));
    }

    file.seek(SeekFrom::Start(window.offset))
        .await
        .map_err(|e| SessionError::storage(source, e))?;

    let mut meter = meter_for("Sent", request, Some(window.len), opts);
    let res = pump(
        &mut file,
        stream,
        Some(window.len),
        opts.buffer_size,
        t,
        (source, Flow::Send),
        &mut meter,
    )
    .await;
    finish(&meter, &res);
    let sent = res?;
    // End of data is signalled by closing our write half
    wire::timed(t, "close", async { stream.shutdown().await.map_err(SessionError::from) }).await?;
    if opts.debug {
        info!("Finished sending {} ({} bytes)", request.filename, sent);
    }
    Ok(TransferOutcome::ok(sent))
}
