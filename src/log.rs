//! Diagnostic output setup (tracing subscriber on stderr)

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::EnvFilter;

static TRACING_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Environment variable that overrides the computed filter
const STANDARD_ENV_VAR: &str = "RUST_LOG";

pub fn trace_level(debug: bool) -> &'static str {
    if debug {
        "debug"
    } else {
        "info"
    }
}

/// Use `RUST_LOG` if set; otherwise log only skiff items at the given level.
fn filter_for(level: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_env(STANDARD_ENV_VAR) {
        Ok(f) => Ok(f),
        Err(e) => {
            if std::env::var(STANDARD_ENV_VAR).is_ok() {
                anyhow::bail!("{STANDARD_ENV_VAR} (set in environment) was not understood: {e}");
            }
            Ok(EnvFilter::try_new(format!("skiff={level}"))?)
        }
    }
}

/// Install the global subscriber. Later calls are no-ops.
pub fn setup(debug: bool) -> Result<()> {
    if TRACING_INITIALIZED.swap(true, Ordering::SeqCst) {
        return Ok(());
    }
    let filter = filter_for(trace_level(debug))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("tracing setup failed: {e}"))?;
    Ok(())
}
