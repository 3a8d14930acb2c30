//! Sandbox error types.
//!
//! Every failure the boundary can surface is one variant of [`SandboxError`].
//! Line numbers carried here are always in original-source coordinates: the
//! component that produced them has already removed the preamble offset.

use serde::{Deserialize, Serialize};

use crate::exception::ExceptionKind;

/// Stable tag for each [`SandboxError`] variant, for hosts and JSON output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Argument,
    CodeUnsafe,
    Compile,
    ContextUnsafe,
    Script,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Argument => "argument",
            ErrorKind::CodeUnsafe => "code_unsafe",
            ErrorKind::Compile => "compile",
            ErrorKind::ContextUnsafe => "context_unsafe",
            ErrorKind::Script => "script",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One frame of a sandboxed-code traceback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceFrame {
    /// Diagnostic name of the module the frame executes in.
    pub module: String,
    /// Function name, or `None` for module top level.
    pub function: Option<String>,
    /// Line in original-source coordinates.
    pub line: usize,
}

impl std::fmt::Display for TraceFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "File \"{}\", line {}, in {}",
            self.module,
            self.line,
            self.function.as_deref().unwrap_or("<module>")
        )
    }
}

/// An exception that escaped sandboxed code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptError {
    pub kind: ExceptionKind,
    pub message: String,
    /// Frames from outermost call to the frame that raised.
    pub traceback: Vec<TraceFrame>,
}

impl ScriptError {
    /// Line of the innermost frame, where the exception was raised.
    pub fn line(&self) -> Option<usize> {
        self.traceback.last().map(|frame| frame.line)
    }

    /// Render a Python-style traceback.
    pub fn format_traceback(&self) -> String {
        let mut out = String::from("Traceback (most recent call last):\n");
        for frame in &self.traceback {
            out.push_str(&format!("  {}\n", frame));
        }
        out.push_str(&self.to_string());
        out
    }
}

impl std::fmt::Display for ScriptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for ScriptError {}

/// Every failure the sandbox boundary reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SandboxError {
    /// Input had the wrong shape or encoding. A caller bug; never retried.
    Argument(String),

    /// The safety verifier rejected the code. Permanent for that text.
    CodeUnsafe {
        name: String,
        line: Option<usize>,
        reason: String,
    },

    /// The code passed verification but is not syntactically valid.
    Compile {
        name: String,
        line: Option<usize>,
        message: String,
    },

    /// The context could not be guarded, or a binding was refused.
    ContextUnsafe(String),

    /// An exception raised by sandboxed code, passed through.
    Script(ScriptError),
}

impl SandboxError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SandboxError::Argument(_) => ErrorKind::Argument,
            SandboxError::CodeUnsafe { .. } => ErrorKind::CodeUnsafe,
            SandboxError::Compile { .. } => ErrorKind::Compile,
            SandboxError::ContextUnsafe(_) => ErrorKind::ContextUnsafe,
            SandboxError::Script(_) => ErrorKind::Script,
        }
    }

    /// Line in original-source coordinates, when the failure has one.
    pub fn line(&self) -> Option<usize> {
        match self {
            SandboxError::CodeUnsafe { line, .. } | SandboxError::Compile { line, .. } => *line,
            SandboxError::Script(err) => err.line(),
            SandboxError::Argument(_) | SandboxError::ContextUnsafe(_) => None,
        }
    }

    pub fn as_script(&self) -> Option<&ScriptError> {
        match self {
            SandboxError::Script(err) => Some(err),
            _ => None,
        }
    }
}

impl std::fmt::Display for SandboxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SandboxError::Argument(message) => write!(f, "Argument error: {}", message),
            SandboxError::CodeUnsafe { name, line, reason } => {
                write!(f, "Code failed safety check! Error: {}", reason)?;
                match line {
                    Some(line) => write!(f, " ({}, line {})", name, line),
                    None => write!(f, " ({})", name),
                }
            }
            SandboxError::Compile {
                name,
                line,
                message,
            } => {
                write!(f, "Compile error in {}", name)?;
                if let Some(line) = line {
                    write!(f, " at line {}", line)?;
                }
                write!(f, ": {}", message)
            }
            SandboxError::ContextUnsafe(reason) => {
                write!(f, "Provided context is not safe! Error: {}", reason)
            }
            SandboxError::Script(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for SandboxError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SandboxError::Script(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ScriptError> for SandboxError {
    fn from(err: ScriptError) -> Self {
        SandboxError::Script(err)
    }
}
