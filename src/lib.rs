//! skiff: single-file transfer over TCP with byte-range downloads.
//!
//! A daemon serves a storage root to many concurrent clients; each
//! connection carries one download or one upload.

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod http_fallback;
pub mod log;
pub mod logger;
pub mod progress;
pub mod protocol;
pub mod protocol_core;
pub mod server;
pub mod session;
pub mod transfer;
pub mod url;
pub mod wire;

pub use config::ServerConfig;
pub use error::{FailureKind, SessionError};
pub use session::{Mode, TransferOutcome, TransferRequest, TransferStatus};
