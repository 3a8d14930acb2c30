//! Sandboxed module construction and evaluation.
//!
//! # Example
//!
//! ```
//! use sandbox_core::{Namespace, Sandbox, Value};
//!
//! let sandbox = Sandbox::default();
//! let module = sandbox.construct("x = 1 + 1\n", "example").unwrap();
//! let context = module.evaluate(Namespace::new()).unwrap();
//! assert_eq!(context.get("x"), Some(&Value::Int(2)));
//!
//! // Reusing the returned context keeps earlier bindings.
//! let again = sandbox.construct("y = x * 10\n", "example").unwrap();
//! let context = again.evaluate(context).unwrap();
//! assert_eq!(context.get("y"), Some(&Value::Int(20)));
//! ```

use std::sync::Arc;

use sandbox_types::{PolicyConfig, SandboxError, ScriptError, TraceFrame};
use tracing::{debug, trace};

use crate::compiler::{compile, CompiledUnit};
use crate::guard::{self, ContextGuard, ContextInput, GuardedContext, PolicyContextGuard};
use crate::interpreter::{Interpreter, Raised};
use crate::preamble::{prepare, to_source_line};
use crate::verifier::{SafetyVerifier, TokenPolicyVerifier};

/// Factory for sandboxed modules: pairs a safety verifier with the context
/// guard every module it builds will evaluate under.
#[derive(Clone)]
pub struct Sandbox {
    verifier: Arc<dyn SafetyVerifier>,
    guard: Arc<dyn ContextGuard>,
}

impl Sandbox {
    pub fn new(verifier: Arc<dyn SafetyVerifier>, guard: Arc<dyn ContextGuard>) -> Self {
        Self { verifier, guard }
    }

    /// Verifier and guard both driven by `policy`.
    pub fn with_policy(policy: PolicyConfig) -> Self {
        let policy = Arc::new(policy);
        Self::new(
            Arc::new(TokenPolicyVerifier::new(policy.clone())),
            Arc::new(PolicyContextGuard::new(policy)),
        )
    }

    /// Verify and compile `source` into a module named `name`.
    ///
    /// Line endings are normalized and the preamble prepended before the
    /// verifier sees the text. Nothing is built unless every step succeeds.
    pub fn construct(&self, source: &str, name: &str) -> Result<SandboxedModule, SandboxError> {
        if name.contains(['\n', '\0']) {
            return Err(SandboxError::Argument(
                "diagnostic name must be a single line without NUL".to_string(),
            ));
        }
        let combined = prepare(source);

        self.verifier
            .verify(&combined)
            .map_err(|rejection| SandboxError::CodeUnsafe {
                name: name.to_string(),
                line: rejection.line.and_then(to_source_line),
                reason: rejection.reason,
            })?;

        let unit = compile(&combined, name).map_err(|err| SandboxError::Compile {
            name: name.to_string(),
            line: to_source_line(err.line),
            message: err.message,
        })?;

        debug!(name, digest = unit.digest(), "sandboxed module constructed");
        Ok(SandboxedModule {
            unit,
            guard: self.guard.clone(),
        })
    }

    /// [`Sandbox::construct`] for raw bytes; anything but UTF-8 is an
    /// argument error.
    pub fn construct_bytes(&self, source: &[u8], name: &str) -> Result<SandboxedModule, SandboxError> {
        let source = std::str::from_utf8(source).map_err(|err| {
            SandboxError::Argument(format!("source text is not valid UTF-8: {}", err))
        })?;
        self.construct(source, name)
    }

    /// Guard a context with this sandbox's guard. Already guarded contexts
    /// are returned as-is.
    pub fn guard(&self, context: impl Into<ContextInput>) -> Result<GuardedContext, SandboxError> {
        guard::guard(context.into(), &self.guard)
    }

    /// A fresh, empty guarded context.
    pub fn context(&self) -> GuardedContext {
        GuardedContext::empty(self.guard.clone())
    }
}

impl Default for Sandbox {
    fn default() -> Self {
        Self::with_policy(PolicyConfig::default())
    }
}

impl std::fmt::Debug for Sandbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sandbox").finish_non_exhaustive()
    }
}

/// Verified, compiled code ready to run. Immutable; evaluate it any number
/// of times, concurrently if each call has its own context.
pub struct SandboxedModule {
    unit: CompiledUnit,
    guard: Arc<dyn ContextGuard>,
}

impl SandboxedModule {
    pub fn name(&self) -> &str {
        self.unit.name()
    }

    pub fn digest(&self) -> &str {
        self.unit.digest()
    }

    /// Guard `context`, run the module against it, and hand it back.
    pub fn evaluate(&self, context: impl Into<ContextInput>) -> Result<GuardedContext, SandboxError> {
        let mut context = guard::guard(context.into(), &self.guard)?;
        self.evaluate_in(&mut context)?;
        Ok(context)
    }

    /// Run the module against a context the caller keeps. Bindings made
    /// before an exception stay in `context`.
    pub fn evaluate_in(&self, context: &mut GuardedContext) -> Result<(), SandboxError> {
        trace!(name = self.name(), context_id = %context.id(), "evaluating module");
        let result = Interpreter::new(context).run(self.unit.program(), Arc::from(self.name()));
        result.map_err(|raised| SandboxError::Script(self.script_error(raised)))?;
        trace!(name = self.name(), context_id = %context.id(), "evaluation finished");
        Ok(())
    }

    fn script_error(&self, raised: Raised) -> ScriptError {
        let traceback: Vec<TraceFrame> = raised
            .frames
            .into_iter()
            .rev()
            .filter_map(|frame| {
                Some(TraceFrame {
                    line: to_source_line(frame.line)?,
                    ..frame
                })
            })
            .collect();
        ScriptError {
            kind: raised.exception.kind,
            message: raised.exception.message.clone(),
            traceback,
        }
    }
}

impl std::fmt::Debug for SandboxedModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SandboxedModule")
            .field("name", &self.unit.name())
            .field("digest", &self.unit.digest())
            .finish()
    }
}
