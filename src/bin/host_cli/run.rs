//! Run command - evaluate a script against JSON contexts

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::Parser;
use namespace_sandbox::context_io::{
    bindings_json, format_bindings, format_sandbox_error, load_context, merge_bindings,
    ErrorReport,
};
use namespace_sandbox::HostConfig;
use rayon::prelude::*;
use sandbox_core::{ContextInput, GuardedContext, Namespace, SandboxError, SandboxedModule};
use sandbox_introspect::{capabilities, NativeLauncher};
use serde::Serialize;
use tracing::{debug, warn};

use super::check::construct;
use super::output::format_error;

const EMPTY_CONTEXT: &str = "<empty>";

#[derive(Parser, Debug)]
pub struct RunCmd {
    /// Script to evaluate
    pub file: PathBuf,

    /// Context JSON file (an object); repeat to evaluate against several
    #[arg(long = "context")]
    pub contexts: Vec<PathBuf>,

    /// Diagnostic name used in errors (default: the file name)
    #[arg(long)]
    pub name: Option<String>,

    /// Bind process and network introspection into every context
    /// (default: $SANDBOX_INTROSPECT)
    #[arg(long)]
    pub introspect: bool,
}

type Evaluation = (String, Result<GuardedContext, SandboxError>);

impl RunCmd {
    pub fn execute(&self, config: &HostConfig, json_output: bool) -> Result<()> {
        let prepared = construct(&self.file, self.name.as_deref(), config)
            .and_then(|module| Ok((module, self.load()?)));
        let (module, inputs) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                eprintln!("{}", format_error(&e, json_output));
                return Err(e);
            }
        };

        let capabilities = if self.introspect || config.introspect {
            if !NativeLauncher::is_supported() {
                warn!("no subprocess support on this platform; interface queries will fail");
            }
            capabilities(Arc::new(NativeLauncher))
        } else {
            Namespace::new()
        };
        let results = evaluate_all(&module, inputs, &capabilities);

        if json_output {
            println!("{}", format_results_json(&module, &results, &capabilities));
        } else {
            print_results(&results, &capabilities);
        }

        let failed = results.iter().filter(|(_, result)| result.is_err()).count();
        if failed == 0 {
            Ok(())
        } else {
            Err(anyhow!("{} of {} evaluations failed", failed, results.len()))
        }
    }

    /// Contexts in command-line order; one empty context when none is given.
    fn load(&self) -> Result<Vec<(String, ContextInput)>> {
        if self.contexts.is_empty() {
            return Ok(vec![(
                EMPTY_CONTEXT.to_string(),
                ContextInput::Plain(Namespace::new()),
            )]);
        }
        self.contexts
            .iter()
            .map(|path| Ok((path.display().to_string(), load_context(path)?)))
            .collect()
    }
}

/// Evaluate `module` once per context, in parallel, keeping input order.
fn evaluate_all(
    module: &SandboxedModule,
    inputs: Vec<(String, ContextInput)>,
    capabilities: &Namespace,
) -> Vec<Evaluation> {
    debug!(module = module.name(), contexts = inputs.len(), "evaluating");
    inputs
        .into_par_iter()
        .map(|(label, input)| {
            let input = merge_bindings(input, capabilities);
            let result = module.evaluate(input);
            (label, result)
        })
        .collect()
}

fn print_results(results: &[Evaluation], hidden: &Namespace) {
    for (label, result) in results {
        match result {
            Ok(context) => {
                println!("\x1b[32m✓ {}\x1b[0m", label);
                print!("{}", format_bindings(context, hidden));
            }
            Err(err) => {
                eprintln!("\x1b[31m✗ {}\x1b[0m", label);
                eprintln!("{}", format_sandbox_error(err));
            }
        }
    }
}

fn format_results_json(
    module: &SandboxedModule,
    results: &[Evaluation],
    hidden: &Namespace,
) -> String {
    #[derive(Serialize)]
    struct ResultJson<'a> {
        context: &'a str,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        bindings: Option<serde_json::Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<ErrorReport>,
    }

    #[derive(Serialize)]
    struct RunJson<'a> {
        success: bool,
        module: &'a str,
        digest: &'a str,
        results: Vec<ResultJson<'a>>,
    }

    let results: Vec<ResultJson<'_>> = results
        .iter()
        .map(|(label, result)| match result {
            Ok(context) => ResultJson {
                context: label,
                success: true,
                bindings: Some(bindings_json(context, hidden)),
                error: None,
            },
            Err(err) => ResultJson {
                context: label,
                success: false,
                bindings: None,
                error: Some(ErrorReport::from(err)),
            },
        })
        .collect();
    let json = RunJson {
        success: results.iter().all(|result| result.success),
        module: module.name(),
        digest: module.digest(),
        results,
    };
    serde_json::to_string_pretty(&json).unwrap_or_else(|_| "{}".to_string())
}
