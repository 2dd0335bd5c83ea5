//! Command-line surfaces for `skiff` (client) and `skiffd` (daemon)

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;

use crate::client::ClientOptions;
use crate::config::ServerConfig;
use crate::error::SessionResult;
use crate::protocol::{timeouts, BUFFER_SIZE};
use crate::session::TransferRequest;
use crate::url::{parse_server_addr, ServerAddr};

/// Parse the daemon's `DEBUG=0|1` switch (key is case-insensitive).
pub fn parse_debug_flag(s: &str) -> Result<bool, String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected DEBUG=0 or DEBUG=1, got {s:?}"))?;
    if !key.eq_ignore_ascii_case("debug") {
        return Err(format!("unknown setting {key:?}; expected DEBUG"));
    }
    match value.trim() {
        "0" => Ok(false),
        "1" => Ok(true),
        other => Err(format!("DEBUG must be 0 or 1, got {other:?}")),
    }
}

/// Daemon options. Anything unset falls back to the config file, then to defaults.
#[derive(Clone, Debug, Parser)]
#[command(name = "skiffd", author, version, about = "skiff file transfer daemon")]
pub struct DaemonOpts {
    /// DEBUG=1 enables per-session messages and transfer progress
    #[arg(value_name = "DEBUG=0|1", value_parser = parse_debug_flag)]
    pub debug: Option<bool>,

    /// TOML file with server settings
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Port to listen on
    #[arg(long)]
    pub port: Option<u16>,

    /// Host or address to bind
    #[arg(long)]
    pub bind: Option<String>,

    /// Storage root directory
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Maximum concurrent sessions (0 = unbounded)
    #[arg(long)]
    pub max_connections: Option<usize>,

    /// Per-operation I/O timeout in seconds (0 = none)
    #[arg(long)]
    pub io_timeout_secs: Option<u64>,

    /// Transfer buffer size in bytes
    #[arg(long)]
    pub buffer_size: Option<usize>,

    /// Append a JSON line per finished session to this file
    #[arg(long)]
    pub journal: Option<PathBuf>,

    /// Close non-protocol connections instead of answering them over HTTP
    #[arg(long)]
    pub no_http_fallback: bool,
}

impl DaemonOpts {
    /// Merge file settings and flags into one `ServerConfig`.
    pub fn to_config(&self) -> Result<ServerConfig> {
        let mut cfg = match &self.config {
            Some(path) => ServerConfig::load(path)?,
            None => ServerConfig::default(),
        };
        if let Some(d) = self.debug {
            cfg.debug = d;
        }
        if let Some(p) = self.port {
            cfg.port = p;
        }
        if let Some(b) = &self.bind {
            cfg.bind = b.clone();
        }
        if let Some(r) = &self.root {
            cfg.root = r.clone();
        }
        if let Some(m) = self.max_connections {
            cfg.max_connections = m;
        }
        if let Some(t) = self.io_timeout_secs {
            cfg.io_timeout_secs = Some(t);
        }
        if let Some(b) = self.buffer_size {
            cfg.buffer_size = b;
        }
        if let Some(j) = &self.journal {
            cfg.journal = Some(j.clone());
        }
        if self.no_http_fallback {
            cfg.http_fallback = false;
        }
        Ok(cfg)
    }
}

/// Client options
#[derive(Clone, Debug, Parser)]
#[command(name = "skiff", author, version, about = "Fetch or send one file via a skiff daemon")]
pub struct ClientOpts {
    /// Server: host, host:port or skiff://host[:port]
    pub server: String,

    /// File name on the server
    pub filename: String,

    /// Upload instead of download
    #[arg(short = 'w', long = "write")]
    pub upload: bool,

    /// First byte of the range (1-based, inclusive)
    #[arg(short = 's', long = "start", requires = "end", allow_negative_numbers = true)]
    pub start: Option<i64>,

    /// Last byte of the range (1-based, inclusive; 0 or less = end of file)
    #[arg(short = 'e', long = "end", allow_negative_numbers = true)]
    pub end: Option<i64>,

    /// Local file: download target or upload source (default: FILENAME)
    #[arg(short = 'o', long = "local")]
    pub local: Option<PathBuf>,

    /// Print decile progress lines
    #[arg(long)]
    pub debug: bool,

    /// Show a progress bar
    #[arg(short = 'p', long)]
    pub progress: bool,

    /// Per-operation I/O timeout in seconds (0 = none)
    #[arg(long)]
    pub io_timeout_secs: Option<u64>,
}

impl ClientOpts {
    pub fn server_addr(&self) -> Result<ServerAddr> {
        parse_server_addr(&self.server).ok_or_else(|| anyhow!("invalid server address {:?}", self.server))
    }

    pub fn request(&self) -> SessionResult<TransferRequest> {
        let base = if self.upload {
            TransferRequest::upload(self.filename.clone())
        } else {
            TransferRequest::download(self.filename.clone())
        };
        base.with_range(self.start, self.end)
    }

    pub fn local_path(&self) -> PathBuf {
        self.local
            .clone()
            .unwrap_or_else(|| PathBuf::from(&self.filename))
    }

    pub fn options(&self) -> ClientOptions {
        ClientOptions {
            io_timeout: timeouts::from_secs(self.io_timeout_secs),
            buffer_size: BUFFER_SIZE,
            debug: self.debug,
            progress: self.progress,
        }
    }
}
