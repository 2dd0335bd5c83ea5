//! skiff client: download or upload one file through a skiff daemon.
//!
//! Exit status: 0 on success, 1 on a usage error, 2 when the transfer was
//! rejected or failed.

use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;

use skiff::cli::ClientOpts;
use skiff::client;
use skiff::url::ServerAddr;
use skiff::{TransferRequest, TransferStatus};

const EXIT_USAGE: u8 = 1;
const EXIT_FAILED: u8 = 2;

fn describe(status: TransferStatus, filename: &str) -> String {
    match status {
        TransferStatus::Ok => format!("{filename}: done"),
        TransferStatus::FileNotFound => format!("{filename}: file does not exist"),
        TransferStatus::FileAlreadyExists => format!("{filename}: file already exists on server"),
        TransferStatus::InvalidRange => format!("{filename}: invalid byte range"),
        TransferStatus::InvalidPath => format!("{filename}: file name rejected by server"),
        TransferStatus::IoFailure => format!("{filename}: server could not open the file"),
    }
}

fn run(opts: &ClientOpts, addr: ServerAddr, request: TransferRequest) -> Result<TransferStatus> {
    let local = opts.local_path();
    let options = opts.options();

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    let outcome = rt
        .block_on(client::transfer(&addr.host, addr.port, &request, &local, &options))
        .with_context(|| format!("transfer with {}:{} failed", addr.host, addr.port))?;

    if outcome.is_ok() {
        tracing::info!(
            "{} ({} bytes)",
            describe(outcome.status, &request.filename),
            outcome.bytes_transferred
        );
    } else {
        eprintln!("Error: {}", describe(outcome.status, &request.filename));
    }
    Ok(outcome.status)
}

fn main() -> ExitCode {
    let opts = match ClientOpts::try_parse() {
        Ok(o) => o,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(EXIT_USAGE)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    if let Err(e) = skiff::log::setup(opts.debug) {
        eprintln!("Error: {:#}", e);
        return ExitCode::from(EXIT_USAGE);
    }

    // Range and address problems are usage errors, caught before connecting
    let addr = match opts.server_addr() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::from(EXIT_USAGE);
        }
    };
    let request = match opts.request() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_USAGE);
        }
    };

    match run(&opts, addr, request) {
        Ok(TransferStatus::Ok) => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(EXIT_FAILED),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(EXIT_FAILED)
        }
    }
}
