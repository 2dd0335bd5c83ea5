use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;

use skiff::cli::DaemonOpts;
use skiff::logger::{JsonlLogger, Logger, NoopLogger};
use skiff::server::Server;

fn run(opts: DaemonOpts) -> Result<()> {
    let config = opts.to_config()?.validated()?;
    skiff::log::setup(config.debug)?;

    ctrlc::set_handler(|| {
        tracing::warn!("Interrupted. Exiting without draining open sessions.");
        std::process::exit(130);
    })
    .context("Error setting Ctrl-C handler")?;

    tracing::info!("Starting skiff daemon:");
    tracing::info!("  Root: {}", config.root.display());
    tracing::info!("  Bind: {}", config.listen_addr());
    tracing::info!(
        "  Max sessions: {}",
        if config.max_connections == 0 {
            "unbounded".to_string()
        } else {
            config.max_connections.to_string()
        }
    );
    if let Some(t) = config.io_timeout() {
        tracing::info!("  I/O timeout: {:?}", t);
    }

    if config.bind.starts_with("0.0.0.0") {
        tracing::warn!("Binding to 0.0.0.0 exposes the daemon on all interfaces.");
        tracing::warn!("The protocol is UNENCRYPTED and UNAUTHENTICATED; use trusted networks only.");
    }

    let logger: Arc<dyn Logger> = match &config.journal {
        Some(path) => Arc::new(JsonlLogger::new(path)?),
        None => Arc::new(NoopLogger),
    };

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    rt.block_on(async move {
        let bound = Server::new(config).with_logger(logger).bind().await?;
        bound.run().await
    })
}

fn main() -> ExitCode {
    let opts = match DaemonOpts::try_parse() {
        Ok(o) => o,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() { ExitCode::from(1) } else { ExitCode::SUCCESS };
        }
    };
    match run(opts) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}
