//! Namespace Sandbox host
//!
//! Host-side plumbing around the sandbox engine:
//!
//! - **Configuration**: policy files and environment switches ([`config`])
//! - **Context I/O**: JSON contexts in, bindings and error reports out ([`context_io`])
//! - **Logging**: `tracing-subscriber` setup shared by the binaries
//!
//! The engine itself lives in `sandbox-core`; OS capabilities live in
//! `sandbox-introspect`.

pub mod config;
pub mod context_io;

pub use config::{load_policy, HostConfig};
pub use context_io::{load_context, parse_context, ErrorReport};

use tracing_subscriber::EnvFilter;

/// Install a formatting subscriber filtered by `RUST_LOG`.
///
/// Without `RUST_LOG` the filter is `warn`, or `debug` when `verbose` is set.
/// Calling this more than once keeps the first subscriber.
pub fn init_logging(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
