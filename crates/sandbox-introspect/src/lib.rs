//! OS and process introspection for sandboxed code.
//!
//! Nothing here touches the sandbox boundary: these are capability values a
//! host may choose to bind into a guarded context. Each capability reports
//! failure as an `OSError` inside the sandbox.
//!
//! ```no_run
//! use std::sync::Arc;
//! use sandbox_core::Sandbox;
//! use sandbox_introspect::{capabilities, NativeLauncher};
//!
//! let sandbox = Sandbox::default();
//! let context = sandbox.guard(capabilities(Arc::new(NativeLauncher))).unwrap();
//! let module = sandbox.construct("up = system_uptime()\n", "uptime").unwrap();
//! let context = module.evaluate(context).unwrap();
//! assert!(context.get("up").is_some());
//! ```

pub mod capabilities;
pub mod launcher;
pub mod network;
pub mod proc_stats;

pub use capabilities::{capabilities, capabilities_with};
pub use launcher::{DisabledLauncher, LaunchError, LaunchOutput, NativeLauncher, ProcessLauncher};
pub use proc_stats::ProcFs;
