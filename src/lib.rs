pub mod args;
pub mod command;
pub mod console;
pub mod error;
pub mod paths;
pub mod processor;
pub mod run_log;
pub mod runner;
pub mod tags;

use tracing_subscriber::EnvFilter;

/// Diagnostics go to stderr; `RUST_LOG` wins over `--verbose`.
pub fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
