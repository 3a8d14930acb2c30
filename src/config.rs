//! Host configuration.
//!
//! The policy comes from a JSON file named on the command line or in
//! `SANDBOX_POLICY`; absent both, the built-in defaults apply.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sandbox_core::{PolicyConfig, Sandbox};
use tracing::debug;

pub const POLICY_ENV: &str = "SANDBOX_POLICY";
pub const INTROSPECT_ENV: &str = "SANDBOX_INTROSPECT";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostConfig {
    /// JSON policy file; `None` means [`PolicyConfig::default`].
    pub policy_path: Option<PathBuf>,
    /// Bind the OS introspection capabilities into every context.
    pub introspect: bool,
}

impl HostConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let policy_path = lookup(POLICY_ENV)
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);
        let introspect = lookup(INTROSPECT_ENV)
            .map(|value| parse_flag(&value))
            .unwrap_or(false);
        Self {
            policy_path,
            introspect,
        }
    }

    pub fn policy(&self) -> Result<PolicyConfig> {
        match &self.policy_path {
            Some(path) => load_policy(path),
            None => Ok(PolicyConfig::default()),
        }
    }

    pub fn sandbox(&self) -> Result<Sandbox> {
        Ok(Sandbox::with_policy(self.policy()?))
    }
}

pub fn load_policy(path: &Path) -> Result<PolicyConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read policy file {}", path.display()))?;
    let policy = PolicyConfig::from_json(&text)
        .with_context(|| format!("Invalid policy file {}", path.display()))?;
    debug!(path = %path.display(), "loaded policy");
    Ok(policy)
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = HostConfig::from_lookup(lookup(&[]));
        assert_eq!(config, HostConfig::default());
        assert_eq!(config.policy().unwrap(), PolicyConfig::default());
    }

    #[test]
    fn reads_switches_from_environment() {
        let config = HostConfig::from_lookup(lookup(&[
            (POLICY_ENV, "/etc/sandbox/policy.json"),
            (INTROSPECT_ENV, "Yes"),
        ]));
        assert_eq!(
            config.policy_path.as_deref(),
            Some(Path::new("/etc/sandbox/policy.json"))
        );
        assert!(config.introspect);

        let config = HostConfig::from_lookup(lookup(&[(POLICY_ENV, " "), (INTROSPECT_ENV, "0")]));
        assert_eq!(config, HostConfig::default());
    }

    #[test]
    fn policy_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.json");
        std::fs::write(&path, r#"{ "forbidden_names": ["print"] }"#).unwrap();
        let config = HostConfig {
            policy_path: Some(path),
            introspect: false,
        };
        assert!(config.policy().unwrap().is_forbidden_name("print"));
    }

    #[test]
    fn bad_policy_files_name_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        let err = load_policy(&missing).unwrap_err();
        assert!(err.to_string().contains("missing.json"));

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{").unwrap();
        let err = load_policy(&broken).unwrap_err();
        assert!(err.to_string().starts_with("Invalid policy file"));
    }
}
