//! Methods on list, dict and str receivers.

use std::sync::Arc;

use sandbox_types::ExceptionKind;

use super::ops;
use crate::value::{BoundMethod, NativeError, Value};

const LIST_METHODS: &[&str] = &["append", "pop", "extend", "insert", "index"];
const DICT_METHODS: &[&str] = &["get", "keys", "values", "items", "pop"];
const STR_METHODS: &[&str] = &[
    "upper",
    "lower",
    "strip",
    "split",
    "join",
    "replace",
    "startswith",
    "endswith",
];

/// Resolve `receiver.name` to a bound method.
pub fn lookup(receiver: &Value, name: &str) -> Result<Value, NativeError> {
    let table: &[&'static str] = match receiver {
        Value::List(_) => LIST_METHODS,
        Value::Dict(_) => DICT_METHODS,
        Value::Str(_) => STR_METHODS,
        _ => &[],
    };
    match table.iter().copied().find(|method| *method == name) {
        Some(method) => Ok(Value::Method(Arc::new(BoundMethod {
            receiver: receiver.clone(),
            name: method,
        }))),
        None => Err(NativeError::new(
            ExceptionKind::AttributeError,
            format!(
                "'{}' object has no attribute '{}'",
                receiver.type_name(),
                name
            ),
        )),
    }
}

fn arity(method: &BoundMethod, min: usize, max: usize, given: usize) -> Result<(), NativeError> {
    if given < min || given > max {
        let expected = if min == max {
            format!("{}", min)
        } else {
            format!("{} to {}", min, max)
        };
        return Err(NativeError::type_error(format!(
            "{}.{}() takes {} argument(s) ({} given)",
            method.receiver.type_name(),
            method.name,
            expected,
            given
        )));
    }
    Ok(())
}

fn str_arg<'a>(method: &BoundMethod, value: &'a Value) -> Result<&'a str, NativeError> {
    value.as_str().ok_or_else(|| {
        NativeError::type_error(format!(
            "{}() argument must be str, not {}",
            method.name,
            value.type_name()
        ))
    })
}

pub fn call(method: &BoundMethod, args: &[Value]) -> Result<Value, NativeError> {
    match &method.receiver {
        Value::List(_) => list_method(method, args),
        Value::Dict(_) => dict_method(method, args),
        Value::Str(s) => str_method(method, s, args),
        other => Err(NativeError::type_error(format!(
            "'{}' object has no methods",
            other.type_name()
        ))),
    }
}

fn list_method(method: &BoundMethod, args: &[Value]) -> Result<Value, NativeError> {
    let Value::List(items) = &method.receiver else {
        return Err(NativeError::type_error("list method on non-list"));
    };
    match method.name {
        "append" => {
            arity(method, 1, 1, args.len())?;
            let mut items = items.write();
            if items.len() >= ops::MAX_SEQUENCE_LEN {
                return Err(NativeError::new(ExceptionKind::OverflowError, "list is too large"));
            }
            items.push(args[0].clone());
            Ok(Value::None)
        }
        "extend" => {
            arity(method, 1, 1, args.len())?;
            let extra = ops::iterate(&args[0])?;
            let mut items = items.write();
            if items.len() + extra.len() > ops::MAX_SEQUENCE_LEN {
                return Err(NativeError::new(ExceptionKind::OverflowError, "list is too large"));
            }
            items.extend(extra);
            Ok(Value::None)
        }
        "insert" => {
            arity(method, 2, 2, args.len())?;
            let index = args[0].as_int().ok_or_else(|| {
                NativeError::type_error("list.insert() index must be an integer")
            })?;
            let mut items = items.write();
            let len = items.len() as i64;
            let at = if index < 0 { (index + len).max(0) } else { index.min(len) };
            items.insert(at as usize, args[1].clone());
            Ok(Value::None)
        }
        "pop" => {
            arity(method, 0, 1, args.len())?;
            let mut items = items.write();
            if items.is_empty() {
                return Err(NativeError::new(ExceptionKind::IndexError, "pop from empty list"));
            }
            let len = items.len() as i64;
            let index = match args.first() {
                Some(arg) => arg.as_int().ok_or_else(|| {
                    NativeError::type_error("list.pop() index must be an integer")
                })?,
                None => -1,
            };
            let at = if index < 0 { index + len } else { index };
            if at < 0 || at >= len {
                return Err(NativeError::new(ExceptionKind::IndexError, "pop index out of range"));
            }
            Ok(items.remove(at as usize))
        }
        "index" => {
            arity(method, 1, 1, args.len())?;
            let position = items
                .read_recursive()
                .iter()
                .position(|item| *item == args[0]);
            match position {
                Some(i) => Ok(Value::Int(i as i64)),
                None => Err(NativeError::new(
                    ExceptionKind::ValueError,
                    format!("{} is not in list", args[0].repr()),
                )),
            }
        }
        other => Err(NativeError::new(
            ExceptionKind::AttributeError,
            format!("'list' object has no attribute '{}'", other),
        )),
    }
}

fn dict_method(method: &BoundMethod, args: &[Value]) -> Result<Value, NativeError> {
    let Value::Dict(entries) = &method.receiver else {
        return Err(NativeError::type_error("dict method on non-dict"));
    };
    match method.name {
        "get" => {
            arity(method, 1, 2, args.len())?;
            let key = ops::hash_key(&args[0])?;
            let found = entries.read_recursive().get(&key).cloned();
            Ok(found.unwrap_or_else(|| args.get(1).cloned().unwrap_or(Value::None)))
        }
        "keys" => {
            arity(method, 0, 0, args.len())?;
            Ok(Value::list(
                entries.read_recursive().keys().map(|key| key.to_value()).collect(),
            ))
        }
        "values" => {
            arity(method, 0, 0, args.len())?;
            Ok(Value::list(entries.read_recursive().values().cloned().collect()))
        }
        // Pairs are two-item lists; the language has no tuples.
        "items" => {
            arity(method, 0, 0, args.len())?;
            Ok(Value::list(
                entries
                    .read_recursive()
                    .iter()
                    .map(|(key, value)| Value::list(vec![key.to_value(), value.clone()]))
                    .collect(),
            ))
        }
        "pop" => {
            arity(method, 1, 2, args.len())?;
            let key = ops::hash_key(&args[0])?;
            let removed = entries.write().shift_remove(&key);
            match (removed, args.get(1)) {
                (Some(value), _) => Ok(value),
                (None, Some(default)) => Ok(default.clone()),
                (None, None) => Err(NativeError::new(ExceptionKind::KeyError, args[0].repr())),
            }
        }
        other => Err(NativeError::new(
            ExceptionKind::AttributeError,
            format!("'dict' object has no attribute '{}'", other),
        )),
    }
}

fn str_method(method: &BoundMethod, s: &str, args: &[Value]) -> Result<Value, NativeError> {
    match method.name {
        "upper" => {
            arity(method, 0, 0, args.len())?;
            Ok(Value::str(s.to_uppercase()))
        }
        "lower" => {
            arity(method, 0, 0, args.len())?;
            Ok(Value::str(s.to_lowercase()))
        }
        "strip" => {
            arity(method, 0, 1, args.len())?;
            match args.first() {
                None | Some(Value::None) => Ok(Value::str(s.trim())),
                Some(chars) => {
                    let chars = str_arg(method, chars)?;
                    Ok(Value::str(s.trim_matches(|c: char| chars.contains(c))))
                }
            }
        }
        "split" => {
            arity(method, 0, 1, args.len())?;
            let parts: Vec<Value> = match args.first() {
                None | Some(Value::None) => s.split_whitespace().map(Value::str).collect(),
                Some(sep) => {
                    let sep = str_arg(method, sep)?;
                    if sep.is_empty() {
                        return Err(NativeError::new(ExceptionKind::ValueError, "empty separator"));
                    }
                    s.split(sep).map(Value::str).collect()
                }
            };
            Ok(Value::list(parts))
        }
        "join" => {
            arity(method, 1, 1, args.len())?;
            let items = ops::iterate(&args[0])?;
            let mut parts = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                match item.as_str() {
                    Some(part) => parts.push(part),
                    None => {
                        return Err(NativeError::type_error(format!(
                            "sequence item {}: expected str instance, {} found",
                            i,
                            item.type_name()
                        )))
                    }
                }
            }
            let total = parts.iter().map(|p| p.len()).sum::<usize>()
                + s.len() * parts.len().saturating_sub(1);
            if total > ops::MAX_SEQUENCE_LEN {
                return Err(NativeError::new(ExceptionKind::OverflowError, "result is too large"));
            }
            Ok(Value::str(parts.join(s)))
        }
        "replace" => {
            arity(method, 2, 2, args.len())?;
            let old = str_arg(method, &args[0])?;
            let new = str_arg(method, &args[1])?;
            let estimate = if old.is_empty() {
                s.len() + new.len() * (s.chars().count() + 1)
            } else {
                s.len() + new.len().saturating_sub(old.len()) * s.matches(old).count()
            };
            if estimate > ops::MAX_SEQUENCE_LEN {
                return Err(NativeError::new(ExceptionKind::OverflowError, "result is too large"));
            }
            Ok(Value::str(s.replace(old, new)))
        }
        "startswith" => {
            arity(method, 1, 1, args.len())?;
            Ok(Value::Bool(s.starts_with(str_arg(method, &args[0])?)))
        }
        "endswith" => {
            arity(method, 1, 1, args.len())?;
            Ok(Value::Bool(s.ends_with(str_arg(method, &args[0])?)))
        }
        other => Err(NativeError::new(
            ExceptionKind::AttributeError,
            format!("'str' object has no attribute '{}'", other),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoke(receiver: &Value, name: &str, args: Vec<Value>) -> Result<Value, NativeError> {
        let Value::Method(method) = lookup(receiver, name)? else {
            panic!("expected bound method");
        };
        call(&method, &args)
    }

    #[test]
    fn list_mutation_is_visible_through_every_reference() {
        let items = Value::list(vec![]);
        let alias = items.clone();
        invoke(&items, "append", vec![Value::Int(1)]).unwrap();
        invoke(&items, "insert", vec![Value::Int(0), Value::Int(0)]).unwrap();
        assert_eq!(alias, Value::list(vec![Value::Int(0), Value::Int(1)]));
        assert_eq!(invoke(&alias, "pop", vec![]).unwrap(), Value::Int(1));
    }

    #[test]
    fn extending_a_list_with_itself_does_not_deadlock() {
        let items = Value::list(vec![Value::Int(1)]);
        invoke(&items, "extend", vec![items.clone()]).unwrap();
        assert_eq!(items, Value::list(vec![Value::Int(1), Value::Int(1)]));
    }

    #[test]
    fn pop_from_empty_list() {
        let err = invoke(&Value::list(vec![]), "pop", vec![]).unwrap_err();
        assert_eq!(err.kind, ExceptionKind::IndexError);
    }

    #[test]
    fn dict_get_and_pop_defaults() {
        let dict = Value::from_json(&serde_json::json!({"a": 1}));
        assert_eq!(invoke(&dict, "get", vec![Value::str("b")]).unwrap(), Value::None);
        assert_eq!(
            invoke(&dict, "pop", vec![Value::str("b"), Value::Int(0)]).unwrap(),
            Value::Int(0)
        );
        assert_eq!(invoke(&dict, "pop", vec![Value::str("a")]).unwrap(), Value::Int(1));
        let err = invoke(&dict, "pop", vec![Value::str("a")]).unwrap_err();
        assert_eq!(err.kind, ExceptionKind::KeyError);
    }

    #[test]
    fn string_helpers() {
        let s = Value::str("  a,b  ");
        assert_eq!(invoke(&s, "strip", vec![]).unwrap(), Value::str("a,b"));
        assert_eq!(
            invoke(&Value::str("a,b"), "split", vec![Value::str(",")]).unwrap(),
            Value::list(vec![Value::str("a"), Value::str("b")])
        );
        let joined = invoke(
            &Value::str("-"),
            "join",
            vec![Value::list(vec![Value::str("x"), Value::str("y")])],
        )
        .unwrap();
        assert_eq!(joined, Value::str("x-y"));
    }

    #[test]
    fn unknown_attribute_is_attribute_error() {
        let err = lookup(&Value::Int(1), "real").unwrap_err();
        assert_eq!(err.kind, ExceptionKind::AttributeError);
        assert_eq!(err.message, "'int' object has no attribute 'real'");
    }
}
