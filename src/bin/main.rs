//! Unwind CLI
//!
//! Administrative commands for the control-transfer core: inspect the
//! effective settings and benchmark the fast path against the fallback path.

use tracing_subscriber::EnvFilter;
use unwind_core::cli;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = cli::run_cli() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
