//! Connection dispatcher: one accept loop, one task per connection.
//!
//! Tasks share nothing mutable. A failing session is logged and dropped;
//! only a failed bind surfaces to the caller.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::http_fallback::{ForeignHandler, RefuseForeign, StaticHttp};
use crate::logger::{Logger, NoopLogger, SessionRecord};
use crate::protocol::timeouts::ACCEPT_RETRY_MS;
use crate::session::{Entry, Session, TransferOutcome, TransferStatus};

struct Shared {
    config: ServerConfig,
    logger: Arc<dyn Logger>,
    foreign: Arc<dyn ForeignHandler>,
}

pub struct Server {
    config: ServerConfig,
    logger: Arc<dyn Logger>,
    foreign: Arc<dyn ForeignHandler>,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        let foreign: Arc<dyn ForeignHandler> = if config.http_fallback {
            Arc::new(StaticHttp)
        } else {
            Arc::new(RefuseForeign)
        };
        Self {
            config,
            logger: Arc::new(NoopLogger),
            foreign,
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_foreign_handler(mut self, handler: Arc<dyn ForeignHandler>) -> Self {
        self.foreign = handler;
        self
    }

    /// Bind the listening socket. Failure here is fatal to the daemon.
    pub async fn bind(self) -> Result<BoundServer> {
        let addr = self.config.listen_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("bind {}", addr))?;
        Ok(BoundServer {
            listener,
            shared: Arc::new(Shared {
                config: self.config,
                logger: self.logger,
                foreign: self.foreign,
            }),
        })
    }
}

pub struct BoundServer {
    listener: TcpListener,
    shared: Arc<Shared>,
}

impl BoundServer {
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept forever.
    pub async fn run(self) -> Result<()> {
        let cfg = &self.shared.config;
        info!(
            "skiff daemon listening on {} root={}",
            self.local_addr()?,
            cfg.root.display()
        );
        let limiter = (cfg.max_connections > 0).then(|| Arc::new(Semaphore::new(cfg.max_connections)));

        loop {
            // Hold a slot before accepting so excess peers wait in the backlog
            let permit = match &limiter {
                Some(sem) => Some(
                    sem.clone()
                        .acquire_owned()
                        .await
                        .context("connection limiter closed")?,
                ),
                None => None,
            };

            let (stream, peer) = match self.listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("accept failed: {}", e);
                    tokio::time::sleep(Duration::from_millis(ACCEPT_RETRY_MS)).await;
                    continue;
                }
            };
            let _ = stream.set_nodelay(true);

            let shared = self.shared.clone();
            let id = Uuid::new_v4().simple().to_string();
            let span = info_span!("session", id = %&id[..8], %peer);
            tokio::spawn(
                async move {
                    let _permit = permit;
                    handle_connection(stream, peer, id, shared).await;
                }
                .instrument(span),
            );
        }
    }
}

async fn handle_connection(stream: TcpStream, peer: SocketAddr, id: String, shared: Arc<Shared>) {
    let started = Instant::now();
    let peer_s = peer.to_string();
    debug!("connection from {}", peer_s);
    let mut session = Session::new(stream, &shared.config, peer_s.clone());

    match session.read_entry().await {
        Ok(Entry::Foreign(line)) => {
            shared.logger.foreign(&id, &peer_s, &line);
            if let Err(e) = shared
                .foreign
                .handle(&line, session.stream_mut(), &shared.config.root)
                .await
            {
                warn!("foreign request {:?} failed: {:#}", line, e);
            }
        }
        Ok(Entry::Protocol(mode)) => {
            let (outcome, error) = match session.serve(mode).await {
                Ok(outcome) => (outcome, None),
                Err(e) => {
                    warn!("session aborted ({:?}): {}", e.kind(), e);
                    let partial = TransferOutcome {
                        status: TransferStatus::IoFailure,
                        bytes_transferred: session.bytes_transferred(),
                    };
                    (partial, Some(e.to_string()))
                }
            };
            let elapsed_ms = started.elapsed().as_millis() as u64;
            debug!(
                "Session summary: mode={:?} file={:?} status={:?} bytes={} elapsed_ms={}",
                mode,
                session.filename(),
                outcome.status,
                outcome.bytes_transferred,
                elapsed_ms
            );
            shared.logger.session_done(&SessionRecord {
                session_id: &id,
                peer: &peer_s,
                mode: session.mode(),
                filename: session.filename(),
                outcome: &outcome,
                elapsed_ms,
                error: error.as_deref(),
            });
        }
        Err(e) => warn!("bad handshake: {}", e),
    }

    let mut stream = session.into_stream();
    if let Err(e) = stream.shutdown().await {
        debug!("shutdown: {}", e);
    }
}
