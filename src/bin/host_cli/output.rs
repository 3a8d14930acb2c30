//! Output formatting for sandbox-host
//!
//! Human-readable and JSON renderings of modules, evaluation results and
//! errors.

use std::path::Path;

use namespace_sandbox::context_io::{format_sandbox_error, ErrorReport};
use sandbox_core::{SandboxError, SandboxedModule};
use serde::Serialize;

/// Diagnostic name for a script file: its file name, or the whole path when
/// it has none.
pub fn module_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// The first [`SandboxError`] in an error's chain.
pub fn sandbox_error(error: &anyhow::Error) -> Option<&SandboxError> {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<SandboxError>())
}

pub fn format_module(module: &SandboxedModule, json_output: bool) -> String {
    if json_output {
        #[derive(Serialize)]
        struct ModuleJson<'a> {
            success: bool,
            module: &'a str,
            digest: &'a str,
        }

        let json = ModuleJson {
            success: true,
            module: module.name(),
            digest: module.digest(),
        };
        serde_json::to_string_pretty(&json).unwrap_or_else(|_| "{}".to_string())
    } else {
        format!(
            "\x1b[32m✓ {} passed verification\x1b[0m\nDigest: sha256:{}",
            module.name(),
            module.digest()
        )
    }
}

/// Format an error for display
pub fn format_error(error: &anyhow::Error, json_output: bool) -> String {
    let sandbox = sandbox_error(error);
    if json_output {
        #[derive(Serialize)]
        struct ErrorJson {
            success: bool,
            error: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            sandbox: Option<ErrorReport>,
        }

        let err = ErrorJson {
            success: false,
            error: error.to_string(),
            sandbox: sandbox.map(ErrorReport::from),
        };
        serde_json::to_string_pretty(&err).unwrap_or_else(|_| "{}".to_string())
    } else {
        let mut out = format!("\x1b[31mError:\x1b[0m {}\n", error);
        let mut causes = error.chain().skip(1).peekable();
        if causes.peek().is_some() {
            out.push_str("Caused by:\n");
            for (idx, cause) in causes.enumerate() {
                out.push_str(&format!("  {}: {}\n", idx + 1, cause));
            }
        }
        if let Some(script_err) = sandbox.filter(|err| err.as_script().is_some()) {
            out.push_str(&format_sandbox_error(script_err));
            out.push('\n');
        }
        out
    }
}
