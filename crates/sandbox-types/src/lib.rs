//! Shared types for the namespace-sandbox workspace.
//!
//! This crate holds the types every layer agrees on, so the engine, the
//! capability services and the host can exchange errors and policy without
//! depending on each other:
//!
//! - [`error`]: the closed [`SandboxError`] enumeration and script tracebacks
//! - [`exception`]: exception kinds visible to sandboxed code
//! - [`policy`]: the admission/verification rule set, loadable from JSON

pub mod error;
pub mod exception;
pub mod policy;

pub use error::{ErrorKind, SandboxError, ScriptError, TraceFrame};
pub use exception::ExceptionKind;
pub use policy::PolicyConfig;
