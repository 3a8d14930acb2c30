//! Sandbox Core
//!
//! Verified compilation and guarded evaluation of untrusted code.
//!
//! Untrusted text goes through a fixed pipeline before it can run:
//! line endings are normalized, a preamble is prepended, a
//! [`SafetyVerifier`] approves or rejects the combined text, and only then is
//! it compiled into an immutable [`SandboxedModule`]. Evaluation always happens
//! against a [`GuardedContext`], whose bindings a [`ContextGuard`] screens at
//! wrap time and on every later write.
//!
//! # Core Modules
//!
//! - [`module`]: [`Sandbox`] and [`SandboxedModule`], the public boundary
//! - [`guard`]: context admission and [`GuardedContext`]
//! - [`verifier`]: the policy-driven token verifier
//! - [`preamble`]: the preamble and its line offset
//! - [`interpreter`]: the evaluator for the safe language subset
//! - [`value`]: runtime values and host capabilities ([`NativeFunction`])
//!
//! # Example
//!
//! ```
//! use sandbox_core::{construct, ErrorKind, Namespace};
//!
//! let err = construct("import os\n", "t").unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::CodeUnsafe);
//!
//! let module = construct("a = 1\nraise ValueError('x')", "t").unwrap();
//! let err = module.evaluate(Namespace::new()).unwrap_err();
//! assert_eq!(err.line(), Some(2));
//! ```

pub mod ast;
pub mod compiler;
pub mod guard;
pub mod interpreter;
pub mod lexer;
pub mod module;
pub mod parser;
pub mod preamble;
pub mod value;
pub mod verifier;

pub use guard::{ContextGuard, ContextInput, GuardedContext, PolicyContextGuard};
pub use interpreter::MAX_CALL_DEPTH;
pub use module::{Sandbox, SandboxedModule};
pub use preamble::{PREAMBLE, PREAMBLE_LINES};
pub use value::{DictKey, Namespace, NativeError, NativeFunction, Value};
pub use verifier::{Rejection, SafetyVerifier, TokenPolicyVerifier};

pub use sandbox_types::{ErrorKind, ExceptionKind, PolicyConfig, SandboxError, ScriptError, TraceFrame};

/// Construct a module under the default policy.
pub fn construct(source: &str, name: &str) -> Result<SandboxedModule, SandboxError> {
    Sandbox::default().construct(source, name)
}
