//! Process launching for capabilities that shell out to system tools.

use std::process::{Command, Stdio};

use tracing::debug;

/// Captured result of a finished child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOutput {
    /// Exit code, or `None` when the child was killed by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl LaunchOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

#[derive(Debug)]
pub enum LaunchError {
    /// This target has no way to spawn processes.
    Unsupported { program: String },
    /// The spawn itself failed (missing binary, permissions, ...).
    Spawn {
        program: String,
        source: std::io::Error,
    },
}

impl std::fmt::Display for LaunchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LaunchError::Unsupported { program } => {
                write!(f, "No subprocess available on this platform! (wanted '{}')", program)
            }
            LaunchError::Spawn { program, source } => {
                write!(f, "failed to launch '{}': {}", program, source)
            }
        }
    }
}

impl std::error::Error for LaunchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LaunchError::Spawn { source, .. } => Some(source),
            LaunchError::Unsupported { .. } => None,
        }
    }
}

/// Runs an external program to completion.
///
/// A launcher that cannot spawn the requested program must fail; it never
/// falls back to a different interpreter or execution path.
pub trait ProcessLauncher: Send + Sync {
    fn run(&self, program: &str, args: &[&str]) -> Result<LaunchOutput, LaunchError>;
}

/// [`ProcessLauncher`] backed by [`std::process::Command`].
///
/// stdin is closed, stdout and stderr are captured. The standard library
/// opens every descriptor close-on-exec, so the child inherits nothing else.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeLauncher;

impl NativeLauncher {
    /// Whether this target can spawn processes at all.
    pub const fn is_supported() -> bool {
        !cfg!(any(
            target_family = "wasm",
            target_os = "ios",
            target_os = "tvos",
            target_os = "watchos"
        ))
    }
}

impl ProcessLauncher for NativeLauncher {
    fn run(&self, program: &str, args: &[&str]) -> Result<LaunchOutput, LaunchError> {
        if !Self::is_supported() {
            return Err(LaunchError::Unsupported {
                program: program.to_string(),
            });
        }
        debug!(program, args = ?args, "launching process");
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| LaunchError::Spawn {
                program: program.to_string(),
                source,
            })?;
        Ok(LaunchOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Launcher for hosts that must never spawn anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledLauncher;

impl ProcessLauncher for DisabledLauncher {
    fn run(&self, program: &str, _args: &[&str]) -> Result<LaunchOutput, LaunchError> {
        Err(LaunchError::Unsupported {
            program: program.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_launcher_fails_loudly() {
        let err = DisabledLauncher.run("ip", &["-4"]).unwrap_err();
        assert!(matches!(err, LaunchError::Unsupported { ref program } if program == "ip"));
        assert!(err.to_string().contains("No subprocess available"));
    }

    #[test]
    fn missing_binary_is_a_spawn_error() {
        let err = NativeLauncher
            .run("definitely-not-a-real-binary-7f3a", &[])
            .unwrap_err();
        assert!(matches!(err, LaunchError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn captures_stdout_and_status() {
        let output = NativeLauncher.run("sh", &["-c", "echo hi; exit 3"]).expect("spawn sh");
        assert_eq!(output.stdout, "hi\n");
        assert_eq!(output.status, Some(3));
        assert!(!output.success());
    }
}
