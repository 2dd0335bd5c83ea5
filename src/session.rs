//! Session protocol: request/outcome types and the responder state machine.
//!
//! A connection opens with a 4-byte mode token. If those bytes instead look
//! like the start of a text request line (`GET `, `HEAD`, ...), the connection
//! is a [`Entry::Foreign`] request and leaves the protocol entirely.
//!
//! Responder side, once the mode is known:
//!
//! ```text
//! Download: <- filename
//!           -> OkToRead | ErrFileDoesNotExist | ErrInvalidPath | ErrIoFailure
//!           <- skip:i64 end:i64
//!           -> OkToRead | ErrInvalidByteRange
//!           -> raw bytes, close
//! Upload:   <- filename
//!           -> OkToWrite | ErrFileExists | ErrInvalidPath | ErrIoFailure
//!           <- raw bytes until the peer closes
//! ```

use std::io::{ErrorKind, SeekFrom};
use std::path::Path;

use serde::Serialize;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWrite};
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::{SessionError, SessionResult};
use crate::protocol::{mode, reply, MAX_FOREIGN_LINE};
use crate::protocol_core::{encode_range, ensure_parent_exists, normalize_under_root, resolve_window};
use crate::transfer::{pump, Flow, Meter};
use crate::wire;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Mode {
    Download,
    Upload,
}

impl Mode {
    /// Only the upload token selects an upload.
    pub fn from_token(token: i32) -> Self {
        if token == mode::UPLOAD {
            Mode::Upload
        } else {
            Mode::Download
        }
    }

    pub fn token(self) -> i32 {
        match self {
            Mode::Download => mode::DOWNLOAD,
            Mode::Upload => mode::UPLOAD,
        }
    }
}

/// What the initiator asks for. Range bounds are 1-indexed and inclusive.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TransferRequest {
    pub mode: Mode,
    pub filename: String,
    pub range_start: Option<i64>,
    pub range_end: Option<i64>,
}

impl TransferRequest {
    pub fn download(filename: impl Into<String>) -> Self {
        Self {
            mode: Mode::Download,
            filename: filename.into(),
            range_start: None,
            range_end: None,
        }
    }

    pub fn upload(filename: impl Into<String>) -> Self {
        Self {
            mode: Mode::Upload,
            ..Self::download(filename)
        }
    }

    /// Attach a byte range. A start needs an end; an end of 0 or less means
    /// "to end of file", and a bounded end may not precede the start.
    pub fn with_range(mut self, start: Option<i64>, end: Option<i64>) -> SessionResult<Self> {
        if start.is_some() && end.is_none() {
            return Err(SessionError::Usage("a range start requires a range end".into()));
        }
        if let (Some(s), Some(e)) = (start, end) {
            if e > 0 && s.max(1) > e {
                return Err(SessionError::Usage(format!("range start {s} is after end {e}")));
            }
        }
        self.range_start = start;
        self.range_end = end;
        Ok(self)
    }

    /// (skip count, end index) as sent on the wire
    pub fn wire_range(&self) -> (i64, i64) {
        encode_range(self.range_start, self.range_end)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum TransferStatus {
    Ok,
    FileNotFound,
    FileAlreadyExists,
    InvalidRange,
    InvalidPath,
    IoFailure,
}

impl TransferStatus {
    /// Reply string for a rejection. `Ok` has no single reply; it depends on the mode.
    pub fn reject_reply(self) -> Option<&'static str> {
        match self {
            TransferStatus::Ok => None,
            TransferStatus::FileNotFound => Some(reply::ERR_FILE_DOES_NOT_EXIST),
            TransferStatus::FileAlreadyExists => Some(reply::ERR_FILE_EXISTS),
            TransferStatus::InvalidRange => Some(reply::ERR_INVALID_BYTE_RANGE),
            TransferStatus::InvalidPath => Some(reply::ERR_INVALID_PATH),
            TransferStatus::IoFailure => Some(reply::ERR_IO_FAILURE),
        }
    }

    pub fn from_reply(s: &str) -> Option<Self> {
        Some(match s {
            reply::OK_TO_READ | reply::OK_TO_WRITE => TransferStatus::Ok,
            reply::ERR_FILE_DOES_NOT_EXIST => TransferStatus::FileNotFound,
            reply::ERR_FILE_EXISTS => TransferStatus::FileAlreadyExists,
            reply::ERR_INVALID_BYTE_RANGE => TransferStatus::InvalidRange,
            reply::ERR_INVALID_PATH => TransferStatus::InvalidPath,
            reply::ERR_IO_FAILURE => TransferStatus::IoFailure,
            _ => return None,
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TransferOutcome {
    pub status: TransferStatus,
    pub bytes_transferred: u64,
}

impl TransferOutcome {
    pub fn ok(bytes: u64) -> Self {
        Self {
            status: TransferStatus::Ok,
            bytes_transferred: bytes,
        }
    }

    pub fn rejected(status: TransferStatus) -> Self {
        Self {
            status,
            bytes_transferred: 0,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == TransferStatus::Ok
    }
}

/// First thing read off a connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Entry {
    Protocol(Mode),
    /// The first request line, without its line terminator
    Foreign(String),
}

fn looks_like_text_request(head: &[u8; 4]) -> bool {
    head[0].is_ascii_alphabetic() && head.iter().all(|b| b.is_ascii_alphabetic() || *b == b' ')
}

/// Read the mode token, or the first line of a foreign request.
pub async fn read_entry<R: AsyncRead + Unpin>(r: &mut R) -> SessionResult<Entry> {
    let mut head = [0u8; 4];
    wire::read_full(r, &mut head).await?;
    if !looks_like_text_request(&head) {
        return Ok(Entry::Protocol(Mode::from_token(i32::from_be_bytes(head))));
    }

    // Byte at a time so nothing past the line is consumed
    let mut line = head.to_vec();
    let mut byte = [0u8; 1];
    while line.len() < MAX_FOREIGN_LINE {
        if r.read(&mut byte).await? == 0 || byte[0] == b'\n' {
            break;
        }
        line.push(byte[0]);
    }
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    Ok(Entry::Foreign(String::from_utf8_lossy(&line).into_owned()))
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
    Start,
    ModeSelected,
    FilenameExchanged,
    Validated,
    Rejected,
    Transferring,
    Closed,
}

/// Responder half of one connection.
pub struct Session<'a, S> {
    stream: S,
    config: &'a ServerConfig,
    peer: String,
    state: SessionState,
    mode: Option<Mode>,
    filename: Option<String>,
    bytes: u64,
}

impl<'a, S> Session<'a, S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, config: &'a ServerConfig, peer: impl Into<String>) -> Self {
        Self {
            stream,
            config,
            peer: peer.into(),
            state: SessionState::Start,
            mode: None,
            filename: None,
            bytes: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn mode(&self) -> Option<Mode> {
        self.mode
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// Bytes moved so far, including a transfer that failed part-way.
    pub fn bytes_transferred(&self) -> u64 {
        self.bytes
    }

    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn into_stream(self) -> S {
        self.stream
    }

    pub async fn read_entry(&mut self) -> SessionResult<Entry> {
        let entry = wire::timed(self.config.io_timeout(), "mode token", read_entry(&mut self.stream)).await?;
        if let Entry::Protocol(m) = entry {
            self.mode = Some(m);
            self.state = SessionState::ModeSelected;
        }
        Ok(entry)
    }

    /// Drive the exchange for `mode` to completion. Rejections are `Ok`
    /// outcomes; transport and storage failures come back as errors.
    /// The session ends `Closed` either way.
    pub async fn serve(&mut self, mode: Mode) -> SessionResult<TransferOutcome> {
        self.mode = Some(mode);
        self.state = SessionState::ModeSelected;
        let result = self.exchange(mode).await;
        self.state = SessionState::Closed;
        result
    }

    async fn exchange(&mut self, mode: Mode) -> SessionResult<TransferOutcome> {
        let filename = wire::timed(self.config.io_timeout(), "filename", wire::read_string(&mut self.stream)).await?;
        self.filename = Some(filename.clone());
        self.state = SessionState::FilenameExchanged;

        if self.config.debug {
            match mode {
                Mode::Download => info!("Sending {} to {}", filename, self.peer),
                Mode::Upload => info!("Receiving {} from {}", filename, self.peer),
            }
        }

        match normalize_under_root(&self.config.root, &filename) {
            Ok(path) => match mode {
                Mode::Download => self.download(&filename, &path).await,
                Mode::Upload => self.upload(&filename, &path).await,
            },
            Err(e) => {
                warn!("{}: {}", self.peer, e);
                self.reject(TransferStatus::InvalidPath).await
            }
        }
    }

    async fn send(&mut self, msg: &str) -> SessionResult<()> {
        wire::timed(self.config.io_timeout(), "reply", wire::write_string(&mut self.stream, msg)).await
    }

    async fn reject(&mut self, status: TransferStatus) -> SessionResult<TransferOutcome> {
        if let Some(msg) = status.reject_reply() {
            self.send(msg).await?;
        }
        self.state = SessionState::Rejected;
        Ok(TransferOutcome::rejected(status))
    }

    async fn download(&mut self, filename: &str, path: &Path) -> SessionResult<TransferOutcome> {
        let mut file = match File::open(path).await {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                if self.config.debug {
                    info!("** File {} does not exist. Aborting download.", filename);
                }
                return self.reject(TransferStatus::FileNotFound).await;
            }
            Err(e) => {
                warn!("{}: cannot open {}: {}", self.peer, path.display(), e);
                return self.reject(TransferStatus::IoFailure).await;
            }
        };
        let meta = match file.metadata().await {
            Ok(m) => m,
            Err(e) => {
                warn!("{}: cannot stat {}: {}", self.peer, path.display(), e);
                return self.reject(TransferStatus::IoFailure).await;
            }
        };
        if !meta.is_file() {
            // directories are not served
            return self.reject(TransferStatus::FileNotFound).await;
        }
        self.send(reply::OK_TO_READ).await?;

        let timeout = self.config.io_timeout();
        let skip = wire::timed(timeout, "skip count", wire::read_i64(&mut self.stream)).await?;
        let end = wire::timed(timeout, "end index", wire::read_i64(&mut self.stream)).await?;

        let Some(window) = resolve_window(meta.len(), skip, end) else {
            if self.config.debug {
                info!(
                    "** Invalid byte range skip={} end={} for {} ({} bytes)",
                    skip,
                    end,
                    filename,
                    meta.len()
                );
            }
            return self.reject(TransferStatus::InvalidRange).await;
        };
        self.state = SessionState::Validated;
        self.send(reply::OK_TO_READ).await?;

        file.seek(SeekFrom::Start(window.offset))
            .await
            .map_err(|e| SessionError::storage(path, e))?;

        self.state = SessionState::Transferring;
        let mut meter = Meter::new("Sent", filename, Some(window.len), self.config.debug);
        let res = pump(
            &mut file,
            &mut self.stream,
            Some(window.len),
            self.config.buffer_size,
            timeout,
            (path, Flow::Send),
            &mut meter,
        )
        .await;
        self.bytes = meter.transferred();
        let sent = res?;
        if sent < window.len {
            // file shrank underneath us; the peer sees a short stream
            warn!(
                "{}: {} ended after {} of {} bytes",
                self.peer, filename, sent, window.len
            );
        }
        if self.config.debug {
            info!("Finished sending {} to {}", filename, self.peer);
        }
        Ok(TransferOutcome::ok(sent))
    }

    async fn upload(&mut self, filename: &str, path: &Path) -> SessionResult<TransferOutcome> {
        if let Err(e) = ensure_parent_exists(path) {
            warn!("{}: cannot create parent of {}: {}", self.peer, path.display(), e);
            return self.reject(TransferStatus::IoFailure).await;
        }
        // create_new: the existence check and the create are one step
        let mut file = match OpenOptions::new().write(true).create_new(true).open(path).await {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists || path.is_dir() => {
                if self.config.debug {
                    info!("** File {} already exists. Aborting upload.", filename);
                }
                return self.reject(TransferStatus::FileAlreadyExists).await;
            }
            Err(e) => {
                warn!("{}: cannot create {}: {}", self.peer, path.display(), e);
                return self.reject(TransferStatus::IoFailure).await;
            }
        };
        self.state = SessionState::Validated;
        self.send(reply::OK_TO_WRITE).await?;

        self.state = SessionState::Transferring;
        let mut meter = Meter::new("Received", filename, None, self.config.debug);
        let res = pump(
            &mut self.stream,
            &mut file,
            None,
            self.config.buffer_size,
            self.config.io_timeout(),
            (path, Flow::Receive),
            &mut meter,
        )
        .await;
        self.bytes = meter.transferred();
        drop(file);

        match res {
            Ok(n) => {
                if self.config.debug {
                    info!("Finished receiving {} from {}", filename, self.peer);
                }
                Ok(TransferOutcome::ok(n))
            }
            Err(e) => {
                debug!("removing partial upload {}", path.display());
                if let Err(rm) = std::fs::remove_file(path) {
                    warn!("could not remove partial upload {}: {}", path.display(), rm);
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::{duplex, AsyncWriteExt, DuplexStream};

    fn config(root: &Path) -> ServerConfig {
        ServerConfig {
            root: root.canonicalize().unwrap(),
            ..Default::default()
        }
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 % 256) as u8).collect()
    }

    async fn run_responder(cfg: ServerConfig, server_end: DuplexStream) -> SessionResult<TransferOutcome> {
        let mut session = Session::new(server_end, &cfg, "test-peer");
        let outcome = match session.read_entry().await? {
            Entry::Protocol(m) => session.serve(m).await,
            Entry::Foreign(line) => panic!("unexpected foreign request {line}"),
        };
        session.into_stream().shutdown().await.ok();
        outcome
    }

    #[test]
    fn mode_tokens() {
        assert_eq!(Mode::from_token(1), Mode::Upload);
        assert_eq!(Mode::from_token(0), Mode::Download);
        assert_eq!(Mode::from_token(7), Mode::Download);
        assert_eq!(Mode::from_token(-1), Mode::Download);
        assert_eq!(Mode::Upload.token(), 1);
    }

    #[test]
    fn request_range_invariants() {
        let r = TransferRequest::download("a").with_range(Some(1), Some(5000)).unwrap();
        assert_eq!(r.wire_range(), (0, 5000));
        assert_eq!(r.range_start, Some(1));

        assert!(TransferRequest::download("a").with_range(Some(3), None).is_err());
        assert!(TransferRequest::download("a").with_range(Some(9), Some(3)).is_err());
        // end <= 0 is unbounded, so any start is acceptable client-side
        assert!(TransferRequest::download("a").with_range(Some(9), Some(0)).is_ok());
        assert!(TransferRequest::download("a").with_range(None, Some(10)).is_ok());
        assert_eq!(TransferRequest::download("a").wire_range(), (0, -1));
    }

    #[test]
    fn reply_vocabulary() {
        assert_eq!(TransferStatus::from_reply("OkToRead"), Some(TransferStatus::Ok));
        assert_eq!(TransferStatus::from_reply("OkToWrite"), Some(TransferStatus::Ok));
        assert_eq!(
            TransferStatus::from_reply("ErrFileExists"),
            Some(TransferStatus::FileAlreadyExists)
        );
        assert_eq!(TransferStatus::from_reply("nonsense"), None);
        assert_eq!(
            TransferStatus::InvalidRange.reject_reply(),
            Some("ErrInvalidByteRange")
        );
        assert_eq!(TransferStatus::Ok.reject_reply(), None);
    }

    #[tokio::test]
    async fn entry_detects_foreign_request() {
        let (mut a, mut b) = duplex(256);
        a.write_all(b"GET /index.html HTTP/1.0\r\nHost: x\r\n\r\n").await.unwrap();
        let entry = read_entry(&mut b).await.unwrap();
        assert_eq!(entry, Entry::Foreign("GET /index.html HTTP/1.0".into()));
        // the headers are still unread
        let mut next = [0u8; 5];
        wire::read_full(&mut b, &mut next).await.unwrap();
        assert_eq!(&next, b"Host:");
    }

    #[tokio::test]
    async fn entry_detects_protocol_tokens() {
        let (mut a, mut b) = duplex(64);
        wire::write_i32(&mut a, 1).await.unwrap();
        wire::write_i32(&mut a, 0).await.unwrap();
        assert_eq!(read_entry(&mut b).await.unwrap(), Entry::Protocol(Mode::Upload));
        assert_eq!(read_entry(&mut b).await.unwrap(), Entry::Protocol(Mode::Download));
    }

    #[tokio::test]
    async fn ranged_download_over_duplex() {
        let tmp = TempDir::new().unwrap();
        let data = pattern(10_000);
        std::fs::write(tmp.path().join("report.txt"), &data).unwrap();
        let (mut client, server) = duplex(64 * 1024);
        let task = tokio::spawn(run_responder(config(tmp.path()), server));

        wire::write_i32(&mut client, Mode::Download.token()).await.unwrap();
        wire::write_string(&mut client, "report.txt").await.unwrap();
        assert_eq!(wire::read_string(&mut client).await.unwrap(), "OkToRead");
        wire::write_i64(&mut client, 0).await.unwrap();
        wire::write_i64(&mut client, 5000).await.unwrap();
        assert_eq!(wire::read_string(&mut client).await.unwrap(), "OkToRead");
        let mut body = Vec::new();
        client.read_to_end(&mut body).await.unwrap();

        assert_eq!(body, &data[..5000]);
        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome, TransferOutcome::ok(5000));
    }

    #[tokio::test]
    async fn missing_file_is_terminal() {
        let tmp = TempDir::new().unwrap();
        let (mut client, server) = duplex(1024);
        let task = tokio::spawn(run_responder(config(tmp.path()), server));

        wire::write_i32(&mut client, 0).await.unwrap();
        wire::write_string(&mut client, "ghost.txt").await.unwrap();
        assert_eq!(wire::read_string(&mut client).await.unwrap(), "ErrFileDoesNotExist");
        let mut rest = Vec::new();
        client.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());

        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome.status, TransferStatus::FileNotFound);
        assert_eq!(outcome.bytes_transferred, 0);
    }

    #[tokio::test]
    async fn end_before_start_is_invalid_range() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("f"), pattern(100)).unwrap();
        let (mut client, server) = duplex(1024);
        let task = tokio::spawn(run_responder(config(tmp.path()), server));

        wire::write_i32(&mut client, 0).await.unwrap();
        wire::write_string(&mut client, "f").await.unwrap();
        assert_eq!(wire::read_string(&mut client).await.unwrap(), "OkToRead");
        wire::write_i64(&mut client, 50).await.unwrap();
        wire::write_i64(&mut client, 10).await.unwrap();
        assert_eq!(wire::read_string(&mut client).await.unwrap(), "ErrInvalidByteRange");
        let mut rest = Vec::new();
        client.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());

        assert_eq!(task.await.unwrap().unwrap().status, TransferStatus::InvalidRange);
    }

    #[tokio::test]
    async fn upload_writes_new_file() {
        let tmp = TempDir::new().unwrap();
        let data = pattern(12_345);
        let (mut client, server) = duplex(64 * 1024);
        let task = tokio::spawn(run_responder(config(tmp.path()), server));

        wire::write_i32(&mut client, Mode::Upload.token()).await.unwrap();
        wire::write_string(&mut client, "nested/up.bin").await.unwrap();
        assert_eq!(wire::read_string(&mut client).await.unwrap(), "OkToWrite");
        client.write_all(&data).await.unwrap();
        client.shutdown().await.unwrap();

        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome, TransferOutcome::ok(12_345));
        assert_eq!(std::fs::read(tmp.path().join("nested/up.bin")).unwrap(), data);
    }

    #[tokio::test]
    async fn upload_never_overwrites() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("dup.txt"), b"original").unwrap();
        let (mut client, server) = duplex(1024);
        let task = tokio::spawn(run_responder(config(tmp.path()), server));

        wire::write_i32(&mut client, 1).await.unwrap();
        wire::write_string(&mut client, "dup.txt").await.unwrap();
        assert_eq!(wire::read_string(&mut client).await.unwrap(), "ErrFileExists");

        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome, TransferOutcome::rejected(TransferStatus::FileAlreadyExists));
        assert_eq!(std::fs::read(tmp.path().join("dup.txt")).unwrap(), b"original");
    }

    #[tokio::test]
    async fn traversal_is_rejected_before_io() {
        let tmp = TempDir::new().unwrap();
        let (mut client, server) = duplex(1024);
        let task = tokio::spawn(run_responder(config(tmp.path()), server));

        wire::write_i32(&mut client, 1).await.unwrap();
        wire::write_string(&mut client, "../escape.txt").await.unwrap();
        assert_eq!(wire::read_string(&mut client).await.unwrap(), "ErrInvalidPath");

        assert_eq!(task.await.unwrap().unwrap().status, TransferStatus::InvalidPath);
        assert!(!tmp.path().parent().unwrap().join("escape.txt").exists());
    }

    #[tokio::test]
    async fn truncated_handshake_is_short_read() {
        let tmp = TempDir::new().unwrap();
        let (mut client, server) = duplex(1024);
        let task = tokio::spawn(run_responder(config(tmp.path()), server));

        wire::write_i32(&mut client, 0).await.unwrap();
        client.write_all(&[0, 20, b'a']).await.unwrap();
        drop(client);

        assert!(matches!(
            task.await.unwrap(),
            Err(SessionError::ShortRead { expected: 20, got: 1 })
        ));
    }

    #[tokio::test]
    async fn session_tracks_state() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("f"), b"abc").unwrap();
        let cfg = config(tmp.path());
        let (mut client, server) = duplex(1024);

        let mut session = Session::new(server, &cfg, "p");
        assert_eq!(session.state(), SessionState::Start);

        wire::write_i32(&mut client, 0).await.unwrap();
        wire::write_string(&mut client, "f").await.unwrap();
        wire::write_i64(&mut client, 0).await.unwrap();
        wire::write_i64(&mut client, -1).await.unwrap();

        let Entry::Protocol(m) = session.read_entry().await.unwrap() else {
            panic!("expected protocol entry");
        };
        assert_eq!(session.state(), SessionState::ModeSelected);
        let outcome = session.serve(m).await.unwrap();
        assert_eq!(outcome, TransferOutcome::ok(3));
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(session.filename(), Some("f"));
        assert_eq!(session.bytes_transferred(), 3);
        assert_eq!(session.mode(), Some(Mode::Download));
    }

    #[tokio::test]
    async fn failed_session_still_ends_closed() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("f"), b"abc").unwrap();
        let cfg = config(tmp.path());

        // peer hangs up before sending the byte range
        let (mut client, server) = duplex(1024);
        wire::write_string(&mut client, "f").await.unwrap();
        drop(client);
        let mut session = Session::new(server, &cfg, "p");
        assert!(session.serve(Mode::Download).await.is_err());
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(session.filename(), Some("f"));

        // peer hangs up in the middle of the filename
        let (mut client, server) = duplex(1024);
        client.write_all(&[0, 9, b'f']).await.unwrap();
        drop(client);
        let mut session = Session::new(server, &cfg, "p");
        assert!(session.serve(Mode::Upload).await.is_err());
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(session.filename(), None);
    }
}
