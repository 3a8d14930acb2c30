//! Admission and verification rule set.
//!
//! The boundary logic never hard-codes which identifiers are dangerous; it asks
//! a [`PolicyConfig`]. Hosts can replace the defaults with a JSON document:
//!
//! ```
//! use sandbox_types::PolicyConfig;
//!
//! let policy = PolicyConfig::from_json(r#"{ "forbidden_names": ["open"] }"#).unwrap();
//! assert!(policy.is_forbidden_name("open"));
//! assert!(!policy.is_forbidden_name("eval"));
//! // Fields left out keep their defaults.
//! assert!(policy.is_forbidden_keyword("import"));
//! ```

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

const DEFAULT_FORBIDDEN_KEYWORDS: &[&str] = &[
    "import", "from", "global", "nonlocal", "class", "with", "yield", "lambda", "async", "await",
    "del",
];

const DEFAULT_FORBIDDEN_NAMES: &[&str] = &[
    "eval", "exec", "compile", "open", "globals", "locals", "vars", "getattr", "setattr",
    "delattr", "input", "type", "dir",
];

const DEFAULT_RESERVED_PREFIXES: &[&str] = &["_"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Keywords whose appearance anywhere in code is a rejection.
    pub forbidden_keywords: BTreeSet<String>,
    /// Identifiers code may not mention.
    pub forbidden_names: BTreeSet<String>,
    /// Prefixes no identifier, attribute or context key may start with.
    pub reserved_prefixes: Vec<String>,
    /// Exact context keys that are never admitted.
    pub reserved_keys: BTreeSet<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            forbidden_keywords: DEFAULT_FORBIDDEN_KEYWORDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            forbidden_names: DEFAULT_FORBIDDEN_NAMES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            reserved_prefixes: DEFAULT_RESERVED_PREFIXES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            reserved_keys: DEFAULT_FORBIDDEN_NAMES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl PolicyConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn is_forbidden_keyword(&self, keyword: &str) -> bool {
        self.forbidden_keywords.contains(keyword)
    }

    pub fn is_forbidden_name(&self, name: &str) -> bool {
        self.forbidden_names.contains(name)
    }

    /// The reserved prefix `name` starts with, if any.
    pub fn reserved_prefix_of(&self, name: &str) -> Option<&str> {
        self.reserved_prefixes
            .iter()
            .map(String::as_str)
            .find(|prefix| !prefix.is_empty() && name.starts_with(prefix))
    }

    pub fn is_reserved_key(&self, key: &str) -> bool {
        self.reserved_keys.contains(key)
    }
}
