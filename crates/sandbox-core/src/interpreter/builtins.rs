//! Builtin functions available to every evaluation.
//!
//! Builtins sit below the guarded context in name resolution, so a host may
//! shadow any of them by binding the same name.

use indexmap::IndexMap;
use sandbox_types::ExceptionKind;

use super::ops::{self, MAX_SEQUENCE_LEN};
use crate::ast::BinOp;
use crate::value::{DictKey, NativeError, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Len,
    Range,
    Str,
    Repr,
    Int,
    Float,
    Bool,
    Abs,
    Min,
    Max,
    Sum,
    Sorted,
    List,
    Dict,
    Round,
}

impl Builtin {
    pub const ALL: [Builtin; 15] = [
        Builtin::Len,
        Builtin::Range,
        Builtin::Str,
        Builtin::Repr,
        Builtin::Int,
        Builtin::Float,
        Builtin::Bool,
        Builtin::Abs,
        Builtin::Min,
        Builtin::Max,
        Builtin::Sum,
        Builtin::Sorted,
        Builtin::List,
        Builtin::Dict,
        Builtin::Round,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Len => "len",
            Builtin::Range => "range",
            Builtin::Str => "str",
            Builtin::Repr => "repr",
            Builtin::Int => "int",
            Builtin::Float => "float",
            Builtin::Bool => "bool",
            Builtin::Abs => "abs",
            Builtin::Min => "min",
            Builtin::Max => "max",
            Builtin::Sum => "sum",
            Builtin::Sorted => "sorted",
            Builtin::List => "list",
            Builtin::Dict => "dict",
            Builtin::Round => "round",
        }
    }

    pub fn from_name(name: &str) -> Option<Builtin> {
        Self::ALL.iter().copied().find(|builtin| builtin.name() == name)
    }

    pub fn call(self, args: &[Value]) -> Result<Value, NativeError> {
        match self {
            Builtin::Len => len(one(self, args)?),
            Builtin::Range => range(args),
            Builtin::Str => Ok(Value::str(
                optional(self, args)?
                    .map(Value::try_display)
                    .transpose()?
                    .unwrap_or_default(),
            )),
            Builtin::Repr => Ok(Value::str(one(self, args)?.try_repr()?)),
            Builtin::Int => to_int(optional(self, args)?),
            Builtin::Float => to_float(optional(self, args)?),
            Builtin::Bool => Ok(Value::Bool(optional(self, args)?.is_some_and(Value::is_truthy))),
            Builtin::Abs => abs(one(self, args)?),
            Builtin::Min => extreme(self, args, std::cmp::Ordering::Less),
            Builtin::Max => extreme(self, args, std::cmp::Ordering::Greater),
            Builtin::Sum => sum(args),
            Builtin::Sorted => Ok(Value::list(sorted(ops::iterate(one(self, args)?)?)?)),
            Builtin::List => match optional(self, args)? {
                Some(iterable) => Ok(Value::list(ops::iterate(iterable)?)),
                None => Ok(Value::list(Vec::new())),
            },
            Builtin::Dict => dict(optional(self, args)?),
            Builtin::Round => round(args),
        }
    }
}

fn arity_error(builtin: Builtin, expected: &str, given: usize) -> NativeError {
    NativeError::type_error(format!(
        "{}() takes {} ({} given)",
        builtin.name(),
        expected,
        given
    ))
}

fn one(builtin: Builtin, args: &[Value]) -> Result<&Value, NativeError> {
    match args {
        [value] => Ok(value),
        _ => Err(arity_error(builtin, "exactly one argument", args.len())),
    }
}

fn optional(builtin: Builtin, args: &[Value]) -> Result<Option<&Value>, NativeError> {
    match args {
        [] => Ok(None),
        [value] => Ok(Some(value)),
        _ => Err(arity_error(builtin, "at most 1 argument", args.len())),
    }
}

fn len(value: &Value) -> Result<Value, NativeError> {
    let n = match value {
        Value::Str(s) => s.chars().count(),
        Value::List(items) => items.read_recursive().len(),
        Value::Dict(entries) => entries.read_recursive().len(),
        Value::Range { .. } => crate::value::range_len(value).unwrap_or(0),
        other => {
            return Err(NativeError::type_error(format!(
                "object of type '{}' has no len()",
                other.type_name()
            )))
        }
    };
    i64::try_from(n)
        .map(Value::Int)
        .map_err(|_| NativeError::new(ExceptionKind::OverflowError, "length too large"))
}

fn range(args: &[Value]) -> Result<Value, NativeError> {
    let ints = args
        .iter()
        .map(|arg| {
            arg.as_int().ok_or_else(|| {
                NativeError::type_error(format!(
                    "'{}' object cannot be interpreted as an integer",
                    arg.type_name()
                ))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let (start, stop, step) = match ints[..] {
        [stop] => (0, stop, 1),
        [start, stop] => (start, stop, 1),
        [start, stop, step] => (start, stop, step),
        _ => return Err(arity_error(Builtin::Range, "1 to 3 arguments", args.len())),
    };
    if step == 0 {
        return Err(NativeError::new(
            ExceptionKind::ValueError,
            "range() arg 3 must not be zero",
        ));
    }
    Ok(Value::Range { start, stop, step })
}

fn to_int(value: Option<&Value>) -> Result<Value, NativeError> {
    match value {
        None => Ok(Value::Int(0)),
        Some(Value::Int(i)) => Ok(Value::Int(*i)),
        Some(Value::Bool(b)) => Ok(Value::Int(*b as i64)),
        Some(Value::Float(f)) => float_to_int(*f),
        Some(Value::Str(s)) => s.trim().parse::<i64>().map(Value::Int).map_err(|_| {
            NativeError::new(
                ExceptionKind::ValueError,
                format!("invalid literal for int() with base 10: {}", Value::Str(s.clone()).repr()),
            )
        }),
        Some(other) => Err(NativeError::type_error(format!(
            "int() argument must be a string or a number, not '{}'",
            other.type_name()
        ))),
    }
}

fn float_to_int(f: f64) -> Result<Value, NativeError> {
    if f.is_nan() {
        return Err(NativeError::new(
            ExceptionKind::ValueError,
            "cannot convert float NaN to integer",
        ));
    }
    let truncated = f.trunc();
    if !(-9.223_372_036_854_776e18..9.223_372_036_854_776e18).contains(&truncated) {
        return Err(NativeError::new(
            ExceptionKind::OverflowError,
            "cannot convert float infinity or out-of-range value to integer",
        ));
    }
    Ok(Value::Int(truncated as i64))
}

fn to_float(value: Option<&Value>) -> Result<Value, NativeError> {
    match value {
        None => Ok(Value::Float(0.0)),
        Some(Value::Str(s)) => s.trim().parse::<f64>().map(Value::Float).map_err(|_| {
            NativeError::new(
                ExceptionKind::ValueError,
                format!("could not convert string to float: {}", Value::Str(s.clone()).repr()),
            )
        }),
        Some(other) => other.as_float().map(Value::Float).ok_or_else(|| {
            NativeError::type_error(format!(
                "float() argument must be a string or a number, not '{}'",
                other.type_name()
            ))
        }),
    }
}

fn abs(value: &Value) -> Result<Value, NativeError> {
    match value {
        Value::Int(i) => i
            .checked_abs()
            .map(Value::Int)
            .ok_or_else(|| NativeError::new(ExceptionKind::OverflowError, "integer overflow")),
        Value::Bool(b) => Ok(Value::Int(*b as i64)),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        other => Err(NativeError::type_error(format!(
            "bad operand type for abs(): '{}'",
            other.type_name()
        ))),
    }
}

/// `min`/`max`: one iterable argument, or two or more values.
fn extreme(
    builtin: Builtin,
    args: &[Value],
    wanted: std::cmp::Ordering,
) -> Result<Value, NativeError> {
    let candidates = match args {
        [] => return Err(arity_error(builtin, "at least 1 argument", 0)),
        [iterable] => ops::iterate(iterable)?,
        many => many.to_vec(),
    };
    let mut candidates = candidates.into_iter();
    let Some(mut best) = candidates.next() else {
        return Err(NativeError::new(
            ExceptionKind::ValueError,
            format!("{}() arg is an empty sequence", builtin.name()),
        ));
    };
    let symbol = if wanted == std::cmp::Ordering::Less { "<" } else { ">" };
    for candidate in candidates {
        if ops::order(&candidate, &best, symbol)? == Some(wanted) {
            best = candidate;
        }
    }
    Ok(best)
}

fn sum(args: &[Value]) -> Result<Value, NativeError> {
    let (iterable, start) = match args {
        [iterable] => (iterable, Value::Int(0)),
        [iterable, start] => {
            if matches!(start, Value::Str(_)) {
                return Err(NativeError::type_error(
                    "sum() can't sum strings [use ''.join(seq) instead]",
                ));
            }
            (iterable, start.clone())
        }
        _ => return Err(arity_error(Builtin::Sum, "1 or 2 arguments", args.len())),
    };
    ops::iterate(iterable)?
        .iter()
        .try_fold(start, |total, item| ops::binary(BinOp::Add, &total, item))
}

pub(crate) fn sorted(items: Vec<Value>) -> Result<Vec<Value>, NativeError> {
    ops::sort_values(items)
}

fn dict(source: Option<&Value>) -> Result<Value, NativeError> {
    let mut entries: IndexMap<DictKey, Value> = IndexMap::new();
    match source {
        None => {}
        Some(Value::Dict(other)) => entries = other.read_recursive().clone(),
        Some(pairs) => {
            for (i, pair) in ops::iterate(pairs)?.into_iter().enumerate() {
                let items = ops::iterate(&pair)?;
                let [key, value] = <[Value; 2]>::try_from(items).map_err(|items| {
                    NativeError::new(
                        ExceptionKind::ValueError,
                        format!(
                            "dictionary update sequence element #{} has length {}; 2 is required",
                            i,
                            items.len()
                        ),
                    )
                })?;
                entries.insert(ops::hash_key(&key)?, value);
            }
        }
    }
    if entries.len() > MAX_SEQUENCE_LEN {
        return Err(NativeError::new(ExceptionKind::OverflowError, "result is too large"));
    }
    Ok(Value::dict(entries))
}

/// Banker's rounding, as the source language does it.
fn round(args: &[Value]) -> Result<Value, NativeError> {
    let (value, digits) = match args {
        [value] => (value, None),
        [value, Value::None] => (value, None),
        [value, digits] => (
            value,
            Some(digits.as_int().ok_or_else(|| {
                NativeError::type_error(format!(
                    "'{}' object cannot be interpreted as an integer",
                    digits.type_name()
                ))
            })?),
        ),
        _ => return Err(arity_error(Builtin::Round, "1 or 2 arguments", args.len())),
    };
    match (value, digits) {
        (Value::Int(_) | Value::Bool(_), _) => Ok(Value::Int(value.as_int().unwrap_or(0))),
        (Value::Float(f), None) => float_to_int(f.round_ties_even()),
        (Value::Float(f), Some(digits)) => {
            let digits = digits.clamp(-308, 308) as i32;
            let scale = 10f64.powi(digits);
            let scaled = f * scale;
            if !scaled.is_finite() {
                return Ok(Value::Float(*f));
            }
            Ok(Value::Float(scaled.round_ties_even() / scale))
        }
        (other, _) => Err(NativeError::type_error(format!(
            "type {} doesn't define __round__ method",
            other.type_name()
        ))),
    }
}
