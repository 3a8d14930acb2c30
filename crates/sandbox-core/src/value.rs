//! Runtime values.
//!
//! Lists and dicts are shared by reference, as in the source language: placing
//! the same list in two contexts is the one sanctioned way for evaluations to
//! observe each other. Everything else is immutable and freely cloned.

use std::collections::{BTreeMap, HashSet};
use std::ops::Deref;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use sandbox_types::ExceptionKind;

use crate::ast::FunctionDef;
use crate::interpreter::builtins::Builtin;

/// A namespace mapping as hosts supply it.
pub type Namespace = BTreeMap<String, Value>;

pub type ListRef = Arc<ListCell>;
pub type DictRef = Arc<DictCell>;

/// Storage behind a list value.
pub struct ListCell(RwLock<Vec<Value>>);

/// Storage behind a dict value.
pub struct DictCell(RwLock<IndexMap<DictKey, Value>>);

impl Deref for ListCell {
    type Target = RwLock<Vec<Value>>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Deref for DictCell {
    type Target = RwLock<IndexMap<DictKey, Value>>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// Containers nested a million deep must not drop one stack frame per level.
impl Drop for ListCell {
    fn drop(&mut self) {
        dismantle(std::mem::take(self.0.get_mut()));
    }
}

impl Drop for DictCell {
    fn drop(&mut self) {
        dismantle(std::mem::take(self.0.get_mut()).into_values().collect());
    }
}

/// Drop `pending` with an explicit work list, unpacking every container
/// whose last reference is going away.
fn dismantle(mut pending: Vec<Value>) {
    while let Some(value) = pending.pop() {
        match value {
            Value::List(list) => {
                if let Ok(mut cell) = Arc::try_unwrap(list) {
                    pending.append(cell.0.get_mut());
                }
            }
            Value::Dict(dict) => {
                if let Ok(mut cell) = Arc::try_unwrap(dict) {
                    pending.extend(std::mem::take(cell.0.get_mut()).into_values());
                }
            }
            Value::Method(method) => {
                if let Ok(method) = Arc::try_unwrap(method) {
                    pending.push(method.receiver);
                }
            }
            _ => {}
        }
    }
}

/// Deepest container nesting walked by `repr`, equality and ordering.
pub(crate) const MAX_REPR_DEPTH: usize = 32;

/// Longest text `str()` and `repr()` may produce.
pub const MAX_RENDER_LEN: usize = 1 << 22;

/// Containers visited before `to_json` stops descending.
const MAX_JSON_NODES: usize = 1 << 18;

/// A host capability callable from sandboxed code.
///
/// Implementations receive already-evaluated arguments and must not retain
/// them beyond the call.
pub trait NativeFunction: Send + Sync {
    fn name(&self) -> &str;
    fn call(&self, args: &[Value]) -> Result<Value, NativeError>;
}

/// Failure reported by a [`NativeFunction`]; surfaces as a script exception.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeError {
    pub kind: ExceptionKind,
    pub message: String,
}

impl NativeError {
    pub fn new(kind: ExceptionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::TypeError, message)
    }
}

/// Adapter turning a closure into a [`NativeFunction`].
pub struct NativeFn<F> {
    name: String,
    func: F,
}

impl<F> NativeFunction for NativeFn<F>
where
    F: Fn(&[Value]) -> Result<Value, NativeError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, args: &[Value]) -> Result<Value, NativeError> {
        (self.func)(args)
    }
}

/// An exception object as sandboxed code sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionValue {
    pub kind: ExceptionKind,
    pub message: String,
}

/// A method looked up on a receiver, e.g. `items.append`.
#[derive(Clone)]
pub struct BoundMethod {
    pub receiver: Value,
    pub name: &'static str,
}

/// Hashable projection of the values usable as dict keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DictKey {
    None,
    Bool(bool),
    Int(i64),
    /// Non-integral float, by bit pattern.
    Float(u64),
    Str(Arc<str>),
}

impl DictKey {
    pub fn from_value(value: &Value) -> Option<DictKey> {
        match value {
            Value::None => Some(DictKey::None),
            Value::Bool(b) => Some(DictKey::Bool(*b)),
            Value::Int(i) => Some(DictKey::Int(*i)),
            Value::Float(f) => {
                if f.fract() == 0.0 && f.abs() < 9.0e15 {
                    Some(DictKey::Int(*f as i64))
                } else {
                    Some(DictKey::Float(f.to_bits()))
                }
            }
            Value::Str(s) => Some(DictKey::Str(s.clone())),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            DictKey::None => Value::None,
            DictKey::Bool(b) => Value::Bool(*b),
            DictKey::Int(i) => Value::Int(*i),
            DictKey::Float(bits) => Value::Float(f64::from_bits(*bits)),
            DictKey::Str(s) => Value::Str(s.clone()),
        }
    }
}

#[derive(Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    List(ListRef),
    Dict(DictRef),
    Range { start: i64, stop: i64, step: i64 },
    Function(Arc<FunctionDef>),
    Native(Arc<dyn NativeFunction>),
    Builtin(Builtin),
    ExceptionType(ExceptionKind),
    Exception(Arc<ExceptionValue>),
    Method(Arc<BoundMethod>),
}

impl Value {
    pub fn str(text: impl Into<Arc<str>>) -> Value {
        Value::Str(text.into())
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Arc::new(ListCell(RwLock::new(items))))
    }

    pub fn dict(entries: IndexMap<DictKey, Value>) -> Value {
        Value::Dict(Arc::new(DictCell(RwLock::new(entries))))
    }

    pub fn native<F>(name: impl Into<String>, func: F) -> Value
    where
        F: Fn(&[Value]) -> Result<Value, NativeError> + Send + Sync + 'static,
    {
        Value::Native(Arc::new(NativeFn {
            name: name.into(),
            func,
        }))
    }

    pub fn exception(kind: ExceptionKind, message: impl Into<String>) -> Value {
        Value::Exception(Arc::new(ExceptionValue {
            kind,
            message: message.into(),
        }))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
            Value::Range { .. } => "range",
            Value::Function(_) => "function",
            Value::Native(_) | Value::Builtin(_) => "builtin_function_or_method",
            Value::ExceptionType(_) => "type",
            Value::Exception(e) => e.kind.name(),
            Value::Method(_) => "method",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.read_recursive().is_empty(),
            Value::Dict(entries) => !entries.read_recursive().is_empty(),
            Value::Range { .. } => range_len(self).unwrap_or(0) > 0,
            _ => true,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_ref()),
            _ => None,
        }
    }

    /// `repr()` rendering for diagnostics; cut short past [`MAX_RENDER_LEN`].
    pub fn repr(&self) -> String {
        let mut renderer = Renderer::default();
        if renderer.write(self, 0).is_err() {
            renderer.out.push_str("...");
        }
        renderer.out
    }

    /// `repr()` as scripts see it: too long a rendering is an `OverflowError`.
    pub fn try_repr(&self) -> Result<String, NativeError> {
        let mut renderer = Renderer::default();
        renderer.write(self, 0).map_err(|RenderTooLong| {
            NativeError::new(ExceptionKind::OverflowError, "rendered value is too large")
        })?;
        Ok(renderer.out)
    }

    /// `str()` rendering: strings bare, everything else as `repr`.
    pub fn to_display(&self) -> String {
        match self {
            Value::Str(s) => s.to_string(),
            Value::Exception(e) => e.message.clone(),
            other => other.repr(),
        }
    }

    /// `str()` as scripts see it; fails like [`Value::try_repr`].
    pub fn try_display(&self) -> Result<String, NativeError> {
        match self {
            Value::Str(s) => Ok(s.to_string()),
            Value::Exception(e) => Ok(e.message.clone()),
            other => other.try_repr(),
        }
    }

    /// Convert host JSON data into sandbox values.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::None,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::str(s.as_str()),
            serde_json::Value::Array(items) => {
                Value::list(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::dict(
                map.iter()
                    .map(|(k, v)| (DictKey::Str(Arc::from(k.as_str())), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Project into JSON for hosts. Callables and exceptions become their
    /// `repr`; non-finite floats become `null`. So does a container met again
    /// inside itself, or one past [`MAX_REPR_DEPTH`] or the node budget.
    pub fn to_json(&self) -> serde_json::Value {
        let mut walk = JsonWalk {
            path: Vec::new(),
            remaining: MAX_JSON_NODES,
        };
        walk.project(self)
    }
}

struct JsonWalk {
    path: Vec<usize>,
    remaining: usize,
}

impl JsonWalk {
    fn project(&mut self, value: &Value) -> serde_json::Value {
        let address = match value {
            Value::List(items) => Some(Arc::as_ptr(items) as *const () as usize),
            Value::Dict(entries) => Some(Arc::as_ptr(entries) as *const () as usize),
            _ => None,
        };
        if let Some(address) = address {
            if self.remaining == 0
                || self.path.len() > MAX_REPR_DEPTH
                || self.path.contains(&address)
            {
                return serde_json::Value::Null;
            }
            self.remaining -= 1;
            self.path.push(address);
        }
        let json = match value {
            Value::None => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s.to_string()),
            Value::List(items) => serde_json::Value::Array(
                items
                    .read_recursive()
                    .iter()
                    .map(|item| self.project(item))
                    .collect(),
            ),
            Value::Dict(entries) => serde_json::Value::Object(
                entries
                    .read_recursive()
                    .iter()
                    .map(|(k, v)| (k.to_value().to_display(), self.project(v)))
                    .collect(),
            ),
            Value::Range { .. } if range_len(value).unwrap_or(0) <= self.remaining => {
                serde_json::Value::Array(
                    range_items(value)
                        .unwrap_or_default()
                        .into_iter()
                        .map(serde_json::Value::from)
                        .collect(),
                )
            }
            Value::Range { .. } => serde_json::Value::Null,
            other => serde_json::Value::String(other.repr()),
        };
        if address.is_some() {
            self.path.pop();
        }
        json
    }
}

/// Number of items in a `Range` value.
pub fn range_len(value: &Value) -> Option<usize> {
    let Value::Range { start, stop, step } = *value else {
        return None;
    };
    let (start, stop, step) = (start as i128, stop as i128, step as i128);
    let len = if step > 0 && start < stop {
        (stop - start + step - 1) / step
    } else if step < 0 && start > stop {
        (start - stop - step - 1) / -step
    } else {
        0
    };
    usize::try_from(len).ok()
}

/// The `i`-th item of a `Range` value.
pub fn range_item(value: &Value, i: usize) -> Option<i64> {
    let Value::Range { start, step, .. } = *value else {
        return None;
    };
    if i >= range_len(value)? {
        return None;
    }
    i64::try_from(start as i128 + step as i128 * i as i128).ok()
}

fn range_items(value: &Value) -> Option<Vec<i64>> {
    let len = range_len(value)?;
    (0..len).map(|i| range_item(value, i)).collect()
}

/// Ranges are equal when they yield the same items.
fn ranges_equal(a: &Value, b: &Value) -> bool {
    let (len, other_len) = (range_len(a), range_len(b));
    if len != other_len {
        return false;
    }
    match len {
        Some(0) => true,
        Some(1) => range_item(a, 0) == range_item(b, 0),
        Some(_) => {
            range_item(a, 0) == range_item(b, 0) && range_item(a, 1) == range_item(b, 1)
        }
        None => false,
    }
}

/// Rendering stopped at [`MAX_RENDER_LEN`].
struct RenderTooLong;

/// `repr` writer. Containers already on the current path render as `[...]`
/// or `{...}`.
#[derive(Default)]
struct Renderer {
    out: String,
    path: Vec<usize>,
}

impl Renderer {
    fn push(&mut self, text: &str) -> Result<(), RenderTooLong> {
        if self.out.len() + text.len() > MAX_RENDER_LEN {
            let mut end = MAX_RENDER_LEN - self.out.len();
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            self.out.push_str(&text[..end]);
            return Err(RenderTooLong);
        }
        self.out.push_str(text);
        Ok(())
    }

    /// Enter a container unless it is already being rendered or too deep.
    fn enter(&mut self, address: usize, depth: usize) -> bool {
        if depth >= MAX_REPR_DEPTH || self.path.contains(&address) {
            return false;
        }
        self.path.push(address);
        true
    }

    fn write(&mut self, value: &Value, depth: usize) -> Result<(), RenderTooLong> {
        match value {
            Value::None => self.push("None"),
            Value::Bool(true) => self.push("True"),
            Value::Bool(false) => self.push("False"),
            Value::Int(i) => self.push(&i.to_string()),
            Value::Float(f) => self.push(&format_float(*f)),
            Value::Str(s) => self.push(&quote(s)),
            Value::List(items) => {
                if !self.enter(Arc::as_ptr(items) as *const () as usize, depth) {
                    return self.push("[...]");
                }
                self.push("[")?;
                for (i, item) in items.read_recursive().iter().enumerate() {
                    if i > 0 {
                        self.push(", ")?;
                    }
                    self.write(item, depth + 1)?;
                }
                self.path.pop();
                self.push("]")
            }
            Value::Dict(entries) => {
                if !self.enter(Arc::as_ptr(entries) as *const () as usize, depth) {
                    return self.push("{...}");
                }
                self.push("{")?;
                for (i, (key, item)) in entries.read_recursive().iter().enumerate() {
                    if i > 0 {
                        self.push(", ")?;
                    }
                    self.write(&key.to_value(), depth + 1)?;
                    self.push(": ")?;
                    self.write(item, depth + 1)?;
                }
                self.path.pop();
                self.push("}")
            }
            Value::Range { start, stop, step } => {
                if *step == 1 {
                    self.push(&format!("range({}, {})", start, stop))
                } else {
                    self.push(&format!("range({}, {}, {})", start, stop, step))
                }
            }
            Value::Function(def) => self.push(&format!("<function {}>", def.name)),
            Value::Native(native) => {
                self.push(&format!("<built-in function {}>", native.name()))
            }
            Value::Builtin(builtin) => {
                self.push(&format!("<built-in function {}>", builtin.name()))
            }
            Value::ExceptionType(kind) => self.push(&format!("<class '{}'>", kind)),
            Value::Exception(e) => self.push(&format!("{}({})", e.kind, quote(&e.message))),
            Value::Method(method) => self.push(&format!(
                "<built-in method {} of {} object>",
                method.name,
                method.receiver.type_name()
            )),
        }
    }
}

pub(crate) fn format_float(f: f64) -> String {
    if f.is_nan() {
        "nan".to_string()
    } else if f.is_infinite() {
        let sign = if f > 0.0 { "" } else { "-" };
        format!("{}inf", sign)
    } else if f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{:.1}", f)
    } else {
        format!("{}", f)
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out.push('\'');
    out
}

/// Structural equality with numeric coercion (`1 == 1.0 == True`).
///
/// A pair of containers met again while comparing them is assumed equal, so
/// cyclic and heavily shared structures are compared once per pair.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    let mut assumed = HashSet::new();
    values_equal_bounded(a, b, 0, &mut assumed)
}

fn values_equal_bounded(
    a: &Value,
    b: &Value,
    depth: usize,
    assumed: &mut HashSet<(usize, usize)>,
) -> bool {
    if depth > MAX_REPR_DEPTH {
        return false;
    }
    match (a, b) {
        (Value::None, Value::None) => true,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Int(_) | Value::Bool(_), Value::Int(_) | Value::Bool(_)) => {
            a.as_int() == b.as_int()
        }
        (Value::Float(_), Value::Int(_) | Value::Bool(_) | Value::Float(_))
        | (Value::Int(_) | Value::Bool(_), Value::Float(_)) => a.as_float() == b.as_float(),
        (Value::List(x), Value::List(y)) => {
            let pair = (
                Arc::as_ptr(x) as *const () as usize,
                Arc::as_ptr(y) as *const () as usize,
            );
            if pair.0 == pair.1 || !assumed.insert(pair) {
                return true;
            }
            let (x, y) = (x.read_recursive(), y.read_recursive());
            x.len() == y.len()
                && x.iter()
                    .zip(y.iter())
                    .all(|(p, q)| values_equal_bounded(p, q, depth + 1, assumed))
        }
        (Value::Dict(x), Value::Dict(y)) => {
            let pair = (
                Arc::as_ptr(x) as *const () as usize,
                Arc::as_ptr(y) as *const () as usize,
            );
            if pair.0 == pair.1 || !assumed.insert(pair) {
                return true;
            }
            let (x, y) = (x.read_recursive(), y.read_recursive());
            x.len() == y.len()
                && x.iter().all(|(k, v)| {
                    y.get(k)
                        .is_some_and(|w| values_equal_bounded(v, w, depth + 1, assumed))
                })
        }
        (Value::Range { .. }, Value::Range { .. }) => ranges_equal(a, b),
        (Value::ExceptionType(x), Value::ExceptionType(y)) => x == y,
        (Value::Builtin(x), Value::Builtin(y)) => x == y,
        _ => is_same_object(a, b),
    }
}

/// Identity, as the `is` operator sees it.
pub fn is_same_object(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::None, Value::None) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => Arc::ptr_eq(x, y) || x == y,
        (Value::List(x), Value::List(y)) => Arc::ptr_eq(x, y),
        (Value::Dict(x), Value::Dict(y)) => Arc::ptr_eq(x, y),
        (Value::Function(x), Value::Function(y)) => Arc::ptr_eq(x, y),
        (Value::Native(x), Value::Native(y)) => Arc::ptr_eq(x, y),
        (Value::Exception(x), Value::Exception(y)) => Arc::ptr_eq(x, y),
        (Value::ExceptionType(x), Value::ExceptionType(y)) => x == y,
        (Value::Builtin(x), Value::Builtin(y)) => x == y,
        _ => false,
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        values_equal(self, other)
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.repr())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::list(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_equality_coerces() {
        assert_eq!(Value::Int(1), Value::Float(1.0));
        assert_eq!(Value::Bool(true), Value::Int(1));
        assert_ne!(Value::Int(1), Value::str("1"));
    }

    #[test]
    fn self_referential_list_renders_and_compares() {
        let items = Value::list(vec![Value::Int(1)]);
        if let Value::List(inner) = &items {
            inner.write().push(items.clone());
        }
        assert!(items.repr().contains("[...]"));
        assert_eq!(items, items.clone());
    }

    fn holding_itself_twice() -> Value {
        let items = Value::list(Vec::new());
        if let Value::List(inner) = &items {
            let mut inner = inner.write();
            inner.push(items.clone());
            inner.push(items.clone());
        }
        items
    }

    /// `levels` doublings of an empty list, each level shared twice.
    fn doubled(levels: usize) -> Value {
        (0..levels).fold(Value::list(Vec::new()), |inner, _| {
            Value::list(vec![inner.clone(), inner])
        })
    }

    #[test]
    fn repeated_self_reference_renders_once_per_path() {
        let items = holding_itself_twice();
        assert_eq!(items.repr(), "[[...], [...]]");
        assert_eq!(items.try_display().unwrap(), "[[...], [...]]");
        assert_eq!(items.to_json(), json!([null, null]));
        assert_eq!(items, holding_itself_twice());
    }

    #[test]
    fn shared_structure_is_compared_once_per_pair() {
        assert_eq!(doubled(30), doubled(30));
        assert_ne!(doubled(30), doubled(29));
    }

    #[test]
    fn oversized_rendering_is_cut_short() {
        let wide = doubled(30);
        let err = wide.try_repr().unwrap_err();
        assert_eq!(err.kind, ExceptionKind::OverflowError);
        let text = wide.repr();
        assert!(text.ends_with("..."));
        assert!(text.len() <= MAX_RENDER_LEN + 3);
    }

    #[test]
    fn deeply_nested_lists_drop_iteratively() {
        let nested = (0..1_000_000).fold(Value::list(Vec::new()), |inner, _| {
            Value::list(vec![inner])
        });
        drop(nested);
    }

    #[test]
    fn huge_ranges_compare_without_materialising() {
        let range = |stop| Value::Range {
            start: 0,
            stop,
            step: 1,
        };
        assert_eq!(range(i64::MAX), range(i64::MAX));
        assert_ne!(range(i64::MAX), range(i64::MAX - 1));
        assert_eq!(range(i64::MAX).to_json(), serde_json::Value::Null);
    }

    #[test]
    fn json_round_trip_preserves_shape() {
        let source = json!({"a": [1, 2.5, "x", null, true], "b": {"c": 3}});
        let value = Value::from_json(&source);
        assert_eq!(value.to_json(), source);
    }

    #[test]
    fn callables_project_to_repr_strings() {
        let native = Value::native("uptime", |_| Ok(Value::Int(0)));
        assert_eq!(native.to_json(), json!("<built-in function uptime>"));
    }

    #[test]
    fn range_length_handles_negative_steps() {
        let r = Value::Range {
            start: 10,
            stop: 0,
            step: -3,
        };
        assert_eq!(range_len(&r), Some(4));
        assert_eq!(range_item(&r, 3), Some(1));
        assert_eq!(range_item(&r, 4), None);
    }

    #[test]
    fn repr_matches_source_conventions() {
        assert_eq!(Value::Float(2.0).repr(), "2.0");
        assert_eq!(Value::str("it's").repr(), "'it\\'s'");
        assert_eq!(Value::None.repr(), "None");
        assert_eq!(
            Value::exception(ExceptionKind::ValueError, "x").repr(),
            "ValueError('x')"
        );
    }

    #[test]
    fn integral_float_keys_collide_with_ints() {
        assert_eq!(
            DictKey::from_value(&Value::Float(2.0)),
            DictKey::from_value(&Value::Int(2))
        );
        assert!(DictKey::from_value(&Value::list(vec![])).is_none());
    }
}
