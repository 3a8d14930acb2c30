//! Context guarding.
//!
//! A [`GuardedContext`] is the only namespace sandboxed code ever runs
//! against. Its bindings are screened by a [`ContextGuard`] when the context is
//! wrapped and again on every insertion afterwards, including insertions made
//! by running code, so a forbidden binding can never appear in it.

use std::collections::HashMap;
use std::sync::Arc;

use logos::Logos;
use sandbox_types::{PolicyConfig, SandboxError};
use tracing::debug;
use uuid::Uuid;

use crate::lexer::Token;
use crate::value::{Namespace, Value};

/// Admission policy for namespace bindings.
pub trait ContextGuard: Send + Sync {
    /// Accept the binding, or explain why it breaches the boundary.
    fn admit(&self, key: &str, value: &Value) -> Result<(), String>;
}

/// [`ContextGuard`] driven by a [`PolicyConfig`].
///
/// Keys must be plain identifiers (not keywords), must not start with a
/// reserved prefix and must not be a reserved key. Values are not screened:
/// capabilities are placed by the host on purpose.
#[derive(Debug, Clone, Default)]
pub struct PolicyContextGuard {
    policy: Arc<PolicyConfig>,
}

impl PolicyContextGuard {
    pub fn new(policy: Arc<PolicyConfig>) -> Self {
        Self { policy }
    }
}

/// Whether `key` lexes as exactly one identifier token.
pub fn is_identifier(key: &str) -> bool {
    let mut lexer = Token::lexer(key);
    matches!(
        (lexer.next(), lexer.next()),
        (Some(Ok(Token::Ident(ref name))), None) if name == key
    )
}

impl ContextGuard for PolicyContextGuard {
    fn admit(&self, key: &str, _value: &Value) -> Result<(), String> {
        if !is_identifier(key) {
            return Err(format!("'{}' is not a valid identifier", key));
        }
        if let Some(prefix) = self.policy.reserved_prefix_of(key) {
            return Err(format!(
                "'{}' starts with reserved prefix '{}'",
                key, prefix
            ));
        }
        if self.policy.is_reserved_key(key) {
            return Err(format!("'{}' is a reserved name", key));
        }
        Ok(())
    }
}

/// A namespace proven free of boundary-breaching bindings.
pub struct GuardedContext {
    id: Uuid,
    bindings: Namespace,
    guard: Arc<dyn ContextGuard>,
}

impl GuardedContext {
    /// Screen every binding of `mapping`. The first refused key fails the
    /// whole wrap; nothing is dropped silently.
    pub fn wrap(mapping: Namespace, guard: Arc<dyn ContextGuard>) -> Result<Self, SandboxError> {
        for (key, value) in &mapping {
            guard
                .admit(key, value)
                .map_err(SandboxError::ContextUnsafe)?;
        }
        let id = Uuid::new_v4();
        debug!(context_id = %id, bindings = mapping.len(), "guarded context created");
        Ok(Self {
            id,
            bindings: mapping,
            guard,
        })
    }

    pub fn empty(guard: Arc<dyn ContextGuard>) -> Self {
        Self {
            id: Uuid::new_v4(),
            bindings: Namespace::new(),
            guard,
        }
    }

    /// Instance identity; stable for the context's lifetime.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.bindings.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.bindings.contains_key(key)
    }

    /// Bind `key`, subject to the guard. Returns the previous value.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: Value,
    ) -> Result<Option<Value>, SandboxError> {
        let key = key.into();
        self.guard
            .admit(&key, &value)
            .map_err(SandboxError::ContextUnsafe)?;
        Ok(self.bindings.insert(key, value))
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.bindings.remove(key)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.bindings.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.bindings.keys()
    }

    /// JSON object of every binding, via [`Value::to_json`].
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.bindings
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }

    pub fn into_namespace(self) -> Namespace {
        self.bindings
    }
}

impl std::fmt::Debug for GuardedContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardedContext")
            .field("id", &self.id)
            .field("keys", &self.bindings.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Context argument to evaluation, resolved once at the API boundary.
#[derive(Debug)]
pub enum ContextInput {
    Guarded(GuardedContext),
    Plain(Namespace),
}

impl From<GuardedContext> for ContextInput {
    fn from(context: GuardedContext) -> Self {
        ContextInput::Guarded(context)
    }
}

impl From<Namespace> for ContextInput {
    fn from(mapping: Namespace) -> Self {
        ContextInput::Plain(mapping)
    }
}

impl From<HashMap<String, Value>> for ContextInput {
    fn from(mapping: HashMap<String, Value>) -> Self {
        ContextInput::Plain(mapping.into_iter().collect())
    }
}

impl TryFrom<serde_json::Value> for ContextInput {
    type Error = SandboxError;

    /// Only JSON objects are namespaces.
    fn try_from(json: serde_json::Value) -> Result<Self, Self::Error> {
        match json {
            serde_json::Value::Object(map) => Ok(ContextInput::Plain(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            )),
            other => Err(SandboxError::Argument(format!(
                "Provided context is not a mapping (got JSON {})",
                json_type_name(&other)
            ))),
        }
    }
}

fn json_type_name(json: &serde_json::Value) -> &'static str {
    match json {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Resolve a [`ContextInput`] into a guarded context.
///
/// An already guarded context is returned as the same instance; a plain mapping
/// is wrapped with `guard`.
pub fn guard(
    input: ContextInput,
    guard: &Arc<dyn ContextGuard>,
) -> Result<GuardedContext, SandboxError> {
    match input {
        ContextInput::Guarded(context) => Ok(context),
        ContextInput::Plain(mapping) => GuardedContext::wrap(mapping, guard.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn default_guard() -> Arc<dyn ContextGuard> {
        Arc::new(PolicyContextGuard::default())
    }

    #[test]
    fn identifiers_exclude_keywords_and_punctuation() {
        assert!(is_identifier("total"));
        assert!(is_identifier("_hidden"));
        assert!(!is_identifier("import"));
        assert!(!is_identifier("two words"));
        assert!(!is_identifier("1abc"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn wrap_rejects_reserved_prefix() {
        let mut mapping = Namespace::new();
        mapping.insert("ok".to_string(), Value::Int(1));
        mapping.insert("__builtins__".to_string(), Value::None);
        let err = GuardedContext::wrap(mapping, default_guard()).unwrap_err();
        assert!(matches!(err, SandboxError::ContextUnsafe(ref reason) if reason.contains("__builtins__")));
    }

    #[test]
    fn insert_is_screened_after_wrap() {
        let mut context = GuardedContext::empty(default_guard());
        assert!(context.insert("x", Value::Int(1)).is_ok());
        assert!(context.insert("eval", Value::None).is_err());
        assert!(!context.contains_key("eval"));
        assert_eq!(context.get("x"), Some(&Value::Int(1)));
    }

    #[test]
    fn guarding_a_guarded_context_is_identity() {
        let context = GuardedContext::empty(default_guard());
        let id = context.id();
        let again = guard(ContextInput::from(context), &default_guard()).expect("guard");
        assert_eq!(again.id(), id);
    }

    #[test]
    fn json_non_objects_are_argument_errors() {
        let err = ContextInput::try_from(json!([1, 2])).unwrap_err();
        assert!(matches!(err, SandboxError::Argument(_)));
        let ok = ContextInput::try_from(json!({"a": 1})).expect("object");
        assert!(matches!(ok, ContextInput::Plain(ref m) if m.len() == 1));
    }

    #[test]
    fn custom_policy_reserved_keys() {
        let policy = PolicyConfig {
            reserved_keys: ["secret".to_string()].into_iter().collect(),
            ..PolicyConfig::default()
        };
        let guard = PolicyContextGuard::new(Arc::new(policy));
        assert!(guard.admit("secret", &Value::None).is_err());
        assert!(guard.admit("eval", &Value::None).is_ok());
    }
}
