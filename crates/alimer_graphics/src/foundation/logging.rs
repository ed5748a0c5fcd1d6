//! Logging bootstrap
//!
//! The crate logs through the `log` facade; binaries pick the backend. These helpers install
//! `env_logger` the way the demo and tools expect.

pub use log::{debug, info, warn, error, trace};

/// Initialize the logging system from `RUST_LOG`
pub fn init() {
    env_logger::init();
}

/// Initialize the logging system, falling back to `default_filter` when `RUST_LOG` is unset
///
/// Safe to call more than once; later calls are ignored.
pub fn init_with_filter(default_filter: &str) {
    let env = env_logger::Env::default().default_filter_or(default_filter);
    let _ = env_logger::Builder::from_env(env).try_init();
}
