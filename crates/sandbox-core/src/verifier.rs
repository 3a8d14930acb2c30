//! Safety verification of candidate code.

use std::sync::Arc;

use sandbox_types::PolicyConfig;

use crate::lexer::{scan, Token};

/// Why a verifier refused a text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// Line in the verified text's coordinates, when the verifier knows one.
    pub line: Option<usize>,
    pub reason: String,
}

impl Rejection {
    pub fn new(line: Option<usize>, reason: impl Into<String>) -> Self {
        Self {
            line,
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.reason)
    }
}

/// Decides whether a text may be compiled at all.
///
/// Implementations must be deterministic and free of side effects: the same
/// text is always accepted or always rejected.
pub trait SafetyVerifier: Send + Sync {
    fn verify(&self, text: &str) -> Result<(), Rejection>;
}

/// Token-level verifier driven by a [`PolicyConfig`].
///
/// Rejects forbidden keywords, forbidden names and any identifier (including
/// attribute names) that starts with a reserved prefix. Text it cannot lex is
/// left for the compiler to report.
#[derive(Debug, Clone, Default)]
pub struct TokenPolicyVerifier {
    policy: Arc<PolicyConfig>,
}

impl TokenPolicyVerifier {
    pub fn new(policy: Arc<PolicyConfig>) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &PolicyConfig {
        &self.policy
    }
}

impl SafetyVerifier for TokenPolicyVerifier {
    fn verify(&self, text: &str) -> Result<(), Rejection> {
        for (line, token) in scan(text) {
            if let Some(keyword) = token.keyword() {
                if self.policy.is_forbidden_keyword(keyword) {
                    return Err(Rejection::new(
                        Some(line),
                        format!("use of '{}' is not allowed", keyword),
                    ));
                }
                continue;
            }
            let Token::Ident(name) = token else {
                continue;
            };
            if self.policy.is_forbidden_name(&name) {
                return Err(Rejection::new(
                    Some(line),
                    format!("name '{}' is not allowed", name),
                ));
            }
            if let Some(prefix) = self.policy.reserved_prefix_of(&name) {
                return Err(Rejection::new(
                    Some(line),
                    format!("identifier '{}' uses reserved prefix '{}'", name, prefix),
                ));
            }
        }
        Ok(())
    }
}
