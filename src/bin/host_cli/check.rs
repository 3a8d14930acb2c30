//! Check command - verify and compile a script without running it

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use namespace_sandbox::HostConfig;
use sandbox_core::SandboxedModule;

use super::output::{format_error, format_module, module_name};

#[derive(Parser, Debug)]
pub struct CheckCmd {
    /// Script to check
    pub file: PathBuf,

    /// Diagnostic name used in errors (default: the file name)
    #[arg(long)]
    pub name: Option<String>,
}

impl CheckCmd {
    pub fn execute(&self, config: &HostConfig, json_output: bool) -> Result<()> {
        match construct(&self.file, self.name.as_deref(), config) {
            Ok(module) => {
                println!("{}", format_module(&module, json_output));
                Ok(())
            }
            Err(e) => {
                eprintln!("{}", format_error(&e, json_output));
                Err(e)
            }
        }
    }
}

/// Read `file` and construct it under the configured policy.
pub fn construct(
    file: &std::path::Path,
    name: Option<&str>,
    config: &HostConfig,
) -> Result<SandboxedModule> {
    let sandbox = config.sandbox()?;
    let source = std::fs::read(file)
        .with_context(|| format!("Failed to read script {}", file.display()))?;
    let name = name.map(str::to_string).unwrap_or_else(|| module_name(file));
    Ok(sandbox.construct_bytes(&source, &name)?)
}
