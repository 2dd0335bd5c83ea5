//! Server configuration: built once at startup, then shared read-only.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::protocol::{timeouts, BUFFER_SIZE, DEFAULT_PORT};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// TCP port to listen on
    pub port: u16,
    /// Host or address to bind
    pub bind: String,
    /// Storage root; every filename is resolved under it
    pub root: PathBuf,
    /// Per-session chatter and decile progress lines
    pub debug: bool,
    /// Concurrent session cap (0 = unbounded)
    pub max_connections: usize,
    /// Deadline for each socket/file operation, in seconds (unset or 0 = none)
    pub io_timeout_secs: Option<u64>,
    /// Working buffer capacity for bulk copies
    pub buffer_size: usize,
    /// Append a JSON line per finished session to this file
    pub journal: Option<PathBuf>,
    /// Answer non-protocol requests with the static HTTP responder
    pub http_fallback: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: "0.0.0.0".to_string(),
            root: PathBuf::from("Files"),
            debug: false,
            max_connections: 512,
            io_timeout_secs: None,
            buffer_size: BUFFER_SIZE,
            journal: None,
            http_fallback: true,
        }
    }
}

impl ServerConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("invalid server configuration")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("in {}", path.display()))
    }

    pub fn listen_addr(&self) -> String {
        if self.bind.contains(':') && !self.bind.starts_with('[') {
            format!("[{}]:{}", self.bind, self.port)
        } else {
            format!("{}:{}", self.bind, self.port)
        }
    }

    pub fn io_timeout(&self) -> Option<Duration> {
        timeouts::from_secs(self.io_timeout_secs)
    }

    /// Check invariants and canonicalize the storage root.
    pub fn validated(mut self) -> Result<Self> {
        if self.buffer_size == 0 {
            bail!("buffer_size must be at least 1");
        }
        if !self.root.exists() {
            bail!("Root directory does not exist: {}", self.root.display());
        }
        if !self.root.is_dir() {
            bail!("Root path is not a directory: {}", self.root.display());
        }
        self.root = std::fs::canonicalize(&self.root)
            .with_context(|| format!("Failed to canonicalize root path: {}", self.root.display()))?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_protocol() {
        let c = ServerConfig::default();
        assert_eq!(c.port, 5000);
        assert_eq!(c.buffer_size, 4096);
        assert_eq!(c.listen_addr(), "0.0.0.0:5000");
        assert_eq!(c.io_timeout(), None);
        assert!(c.http_fallback);
    }

    #[test]
    fn toml_overrides_some_fields() {
        let c = ServerConfig::from_toml_str(
            r#"
            port = 6000
            debug = true
            io_timeout_secs = 30
            "#,
        )
        .unwrap();
        assert_eq!(c.port, 6000);
        assert!(c.debug);
        assert_eq!(c.io_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(c.root, PathBuf::from("Files"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(ServerConfig::from_toml_str("prot = 1").is_err());
    }

    #[test]
    fn ipv6_bind_is_bracketed() {
        let c = ServerConfig {
            bind: "::1".into(),
            port: 7000,
            ..Default::default()
        };
        assert_eq!(c.listen_addr(), "[::1]:7000");
    }

    #[test]
    fn validation_checks_root() {
        let tmp = tempfile::tempdir().unwrap();
        let c = ServerConfig {
            root: tmp.path().to_path_buf(),
            ..Default::default()
        }
        .validated()
        .unwrap();
        assert!(c.root.is_absolute());

        let missing = ServerConfig {
            root: tmp.path().join("nope"),
            ..Default::default()
        };
        assert!(missing.validated().is_err());

        let file = tmp.path().join("f");
        std::fs::write(&file, "x").unwrap();
        let not_dir = ServerConfig {
            root: file,
            ..Default::default()
        };
        assert!(not_dir.validated().is_err());

        let zero_buf = ServerConfig {
            root: tmp.path().to_path_buf(),
            buffer_size: 0,
            ..Default::default()
        };
        assert!(zero_buf.validated().is_err());
    }
}
