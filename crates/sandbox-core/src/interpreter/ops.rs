//! Operators, indexing and iteration over runtime values.

use std::cmp::Ordering;
use std::sync::Arc;

use sandbox_types::ExceptionKind;

use crate::ast::{BinOp, CmpOp, UnaryOp};
use crate::value::{
    is_same_object, range_item, range_len, values_equal, DictKey, NativeError, Value,
    MAX_REPR_DEPTH,
};

/// Longest string or list an operation may build.
pub const MAX_SEQUENCE_LEN: usize = 1 << 24;

#[derive(Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

fn num(value: &Value) -> Option<Num> {
    match value {
        Value::Int(i) => Some(Num::Int(*i)),
        Value::Bool(b) => Some(Num::Int(*b as i64)),
        Value::Float(f) => Some(Num::Float(*f)),
        _ => None,
    }
}

fn overflow() -> NativeError {
    NativeError::new(ExceptionKind::OverflowError, "integer overflow")
}

fn zero_division(message: &str) -> NativeError {
    NativeError::new(ExceptionKind::ZeroDivisionError, message)
}

fn unsupported(op: BinOp, a: &Value, b: &Value) -> NativeError {
    NativeError::type_error(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        op.symbol(),
        a.type_name(),
        b.type_name()
    ))
}

fn checked(value: Option<i64>) -> Result<Value, NativeError> {
    value.map(Value::Int).ok_or_else(overflow)
}

pub fn unary(op: UnaryOp, operand: &Value) -> Result<Value, NativeError> {
    match (op, num(operand)) {
        (UnaryOp::Not, _) => Ok(Value::Bool(!operand.is_truthy())),
        (UnaryOp::Neg, Some(Num::Int(i))) => checked(i.checked_neg()),
        (UnaryOp::Neg, Some(Num::Float(f))) => Ok(Value::Float(-f)),
        (UnaryOp::Pos, Some(Num::Int(i))) => Ok(Value::Int(i)),
        (UnaryOp::Pos, Some(Num::Float(f))) => Ok(Value::Float(f)),
        (UnaryOp::Neg, None) | (UnaryOp::Pos, None) => Err(NativeError::type_error(format!(
            "bad operand type for unary {}: '{}'",
            if op == UnaryOp::Neg { "-" } else { "+" },
            operand.type_name()
        ))),
    }
}

pub fn binary(op: BinOp, a: &Value, b: &Value) -> Result<Value, NativeError> {
    if let (Some(x), Some(y)) = (num(a), num(b)) {
        return arithmetic(op, x, y);
    }
    match (op, a, b) {
        (BinOp::Add, Value::Str(x), Value::Str(y)) => {
            ensure_len(x.len() + y.len())?;
            Ok(Value::str(format!("{}{}", x, y)))
        }
        (BinOp::Add, Value::List(x), Value::List(y)) => {
            let mut items = x.read_recursive().clone();
            items.extend(y.read_recursive().iter().cloned());
            ensure_len(items.len())?;
            Ok(Value::list(items))
        }
        (BinOp::Mul, Value::Str(s), count) | (BinOp::Mul, count, Value::Str(s))
            if count.as_int().is_some() =>
        {
            let times = repeat_count(count, s.len())?;
            Ok(Value::str(s.repeat(times)))
        }
        (BinOp::Mul, Value::List(items), count) | (BinOp::Mul, count, Value::List(items))
            if count.as_int().is_some() =>
        {
            let items = items.read_recursive().clone();
            let times = repeat_count(count, items.len())?;
            let mut out = Vec::with_capacity(items.len() * times);
            for _ in 0..times {
                out.extend(items.iter().cloned());
            }
            Ok(Value::list(out))
        }
        _ => Err(unsupported(op, a, b)),
    }
}

fn ensure_len(len: usize) -> Result<(), NativeError> {
    if len > MAX_SEQUENCE_LEN {
        return Err(NativeError::new(
            ExceptionKind::OverflowError,
            "result is too large",
        ));
    }
    Ok(())
}

fn repeat_count(count: &Value, unit: usize) -> Result<usize, NativeError> {
    let times = usize::try_from(count.as_int().unwrap_or(0).max(0)).map_err(|_| overflow())?;
    ensure_len(unit.checked_mul(times).ok_or_else(overflow)?)?;
    Ok(times)
}

fn arithmetic(op: BinOp, x: Num, y: Num) -> Result<Value, NativeError> {
    if let (Num::Int(a), Num::Int(b)) = (x, y) {
        return int_arithmetic(op, a, b);
    }
    let a = match x {
        Num::Int(i) => i as f64,
        Num::Float(f) => f,
    };
    let b = match y {
        Num::Int(i) => i as f64,
        Num::Float(f) => f,
    };
    let result = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => {
            if b == 0.0 {
                return Err(zero_division("float division by zero"));
            }
            a / b
        }
        BinOp::FloorDiv => {
            if b == 0.0 {
                return Err(zero_division("float floor division by zero"));
            }
            (a / b).floor()
        }
        BinOp::Mod => {
            if b == 0.0 {
                return Err(zero_division("float modulo"));
            }
            let r = a % b;
            if r != 0.0 && (r < 0.0) != (b < 0.0) {
                r + b
            } else {
                r
            }
        }
        BinOp::Pow => {
            if a == 0.0 && b < 0.0 {
                return Err(zero_division("0.0 cannot be raised to a negative power"));
            }
            a.powf(b)
        }
    };
    Ok(Value::Float(result))
}

fn int_arithmetic(op: BinOp, a: i64, b: i64) -> Result<Value, NativeError> {
    match op {
        BinOp::Add => checked(a.checked_add(b)),
        BinOp::Sub => checked(a.checked_sub(b)),
        BinOp::Mul => checked(a.checked_mul(b)),
        BinOp::Div => {
            if b == 0 {
                return Err(zero_division("division by zero"));
            }
            Ok(Value::Float(a as f64 / b as f64))
        }
        BinOp::FloorDiv => {
            if b == 0 {
                return Err(zero_division("integer division or modulo by zero"));
            }
            let q = a.checked_div(b).ok_or_else(overflow)?;
            if a % b != 0 && (a < 0) != (b < 0) {
                checked(q.checked_sub(1))
            } else {
                Ok(Value::Int(q))
            }
        }
        BinOp::Mod => {
            if b == 0 {
                return Err(zero_division("integer modulo by zero"));
            }
            let r = a.checked_rem(b).unwrap_or(0);
            if r != 0 && (r < 0) != (b < 0) {
                Ok(Value::Int(r + b))
            } else {
                Ok(Value::Int(r))
            }
        }
        BinOp::Pow => {
            if b < 0 {
                if a == 0 {
                    return Err(zero_division("0.0 cannot be raised to a negative power"));
                }
                return Ok(Value::Float((a as f64).powf(b as f64)));
            }
            match a {
                0 | 1 => Ok(Value::Int(if b == 0 { 1 } else { a })),
                -1 => Ok(Value::Int(if b % 2 == 0 { 1 } else { -1 })),
                _ => {
                    let exp = u32::try_from(b).map_err(|_| overflow())?;
                    checked(a.checked_pow(exp))
                }
            }
        }
    }
}

/// Ordering for `< <= > >=`, `min` and `max`. `None` when a NaN is involved.
pub fn order(a: &Value, b: &Value, symbol: &str) -> Result<Option<Ordering>, NativeError> {
    order_bounded(a, b, symbol, 0)
}

fn order_bounded(
    a: &Value,
    b: &Value,
    symbol: &str,
    depth: usize,
) -> Result<Option<Ordering>, NativeError> {
    if let (Some(x), Some(y)) = (num(a), num(b)) {
        return Ok(compare_numbers(x, y));
    }
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => Ok(Some(x.cmp(y))),
        (Value::List(x), Value::List(y)) => {
            if Arc::ptr_eq(x, y) {
                return Ok(Some(Ordering::Equal));
            }
            if depth >= MAX_REPR_DEPTH {
                return Err(comparison_too_deep());
            }
            let x = x.read_recursive().clone();
            let y = y.read_recursive().clone();
            for (p, q) in x.iter().zip(y.iter()) {
                if !values_equal(p, q) {
                    return order_bounded(p, q, symbol, depth + 1);
                }
            }
            Ok(Some(x.len().cmp(&y.len())))
        }
        _ => Err(not_orderable(symbol, a.type_name(), b.type_name())),
    }
}

fn not_orderable(symbol: &str, left: &str, right: &str) -> NativeError {
    NativeError::type_error(format!(
        "'{}' not supported between instances of '{}' and '{}'",
        symbol, left, right
    ))
}

fn comparison_too_deep() -> NativeError {
    NativeError::new(
        ExceptionKind::RecursionError,
        "maximum recursion depth exceeded in comparison",
    )
}

/// Exact numeric ordering; ints are not rounded through `f64`.
fn compare_numbers(x: Num, y: Num) -> Option<Ordering> {
    match (x, y) {
        (Num::Int(p), Num::Int(q)) => Some(p.cmp(&q)),
        (Num::Float(p), Num::Float(q)) => p.partial_cmp(&q),
        (Num::Int(p), Num::Float(q)) => int_float_cmp(p, q),
        (Num::Float(p), Num::Int(q)) => int_float_cmp(q, p).map(Ordering::reverse),
    }
}

fn int_float_cmp(i: i64, f: f64) -> Option<Ordering> {
    // 2^63, exactly representable.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if f.is_nan() {
        None
    } else if f >= LIMIT {
        Some(Ordering::Less)
    } else if f < -LIMIT {
        Some(Ordering::Greater)
    } else {
        let whole = f.trunc();
        Some(i.cmp(&(whole as i64)).then_with(|| {
            if f > whole {
                Ordering::Less
            } else if f < whole {
                Ordering::Greater
            } else {
                Ordering::Equal
            }
        }))
    }
}

/// Immutable snapshot of a value taken for sorting. Comparing keys cannot
/// fail or observe concurrent writes to shared lists.
enum SortKey {
    Number(Num, &'static str),
    Text(Arc<str>),
    Items(Vec<SortKey>),
    Other(&'static str),
}

/// Expanded nodes one item may contribute to a sort.
const MAX_SORT_KEY_NODES: usize = 1 << 20;

impl SortKey {
    fn build(value: &Value, depth: usize, budget: &mut usize) -> Result<SortKey, NativeError> {
        if *budget == 0 {
            return Err(NativeError::new(
                ExceptionKind::OverflowError,
                "sort item is too large",
            ));
        }
        *budget -= 1;
        if let Some(n) = num(value) {
            return Ok(SortKey::Number(n, value.type_name()));
        }
        match value {
            Value::Str(s) => Ok(SortKey::Text(s.clone())),
            Value::List(items) => {
                if depth >= MAX_REPR_DEPTH {
                    return Err(comparison_too_deep());
                }
                let items = items.read_recursive().clone();
                items
                    .iter()
                    .map(|item| SortKey::build(item, depth + 1, budget))
                    .collect::<Result<_, _>>()
                    .map(SortKey::Items)
            }
            other => Ok(SortKey::Other(other.type_name())),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            SortKey::Number(_, name) | SortKey::Other(name) => *name,
            SortKey::Text(_) => "str",
            SortKey::Items(_) => "list",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            SortKey::Number(..) => 0,
            SortKey::Text(_) => 1,
            SortKey::Items(_) => 2,
            SortKey::Other(_) => 3,
        }
    }

    /// Total order: NaN sorts after every other number, and values of
    /// different kinds group by kind.
    fn total_cmp(&self, other: &SortKey) -> Ordering {
        match (self, other) {
            (SortKey::Number(x, _), SortKey::Number(y, _)) => {
                match (is_nan(*x), is_nan(*y)) {
                    (true, true) => Ordering::Equal,
                    (true, false) => Ordering::Greater,
                    (false, true) => Ordering::Less,
                    (false, false) => compare_numbers(*x, *y).unwrap_or(Ordering::Equal),
                }
            }
            (SortKey::Text(x), SortKey::Text(y)) => x.cmp(y),
            (SortKey::Items(x), SortKey::Items(y)) => x
                .iter()
                .zip(y.iter())
                .map(|(p, q)| p.total_cmp(q))
                .find(|ordering| ordering.is_ne())
                .unwrap_or_else(|| x.len().cmp(&y.len())),
            _ => self.rank().cmp(&other.rank()),
        }
    }

    /// Whether `<` is defined between the two keys.
    fn check_orderable(&self, other: &SortKey) -> Result<(), NativeError> {
        match (self, other) {
            (SortKey::Number(..), SortKey::Number(..)) | (SortKey::Text(_), SortKey::Text(_)) => {
                Ok(())
            }
            (SortKey::Items(x), SortKey::Items(y)) => {
                match x.iter().zip(y.iter()).find(|(p, q)| p.total_cmp(q).is_ne()) {
                    Some((p, q)) => p.check_orderable(q),
                    None => Ok(()),
                }
            }
            _ => Err(not_orderable("<", self.type_name(), other.type_name())),
        }
    }
}

fn is_nan(n: Num) -> bool {
    matches!(n, Num::Float(f) if f.is_nan())
}

/// Stable ascending sort for `sorted`.
///
/// Items are snapshotted first, so the comparator is total even with NaN or
/// lists shared with other threads. Neighbours that `<` cannot relate raise
/// `TypeError`; cyclic or overly deep lists raise `RecursionError`.
pub fn sort_values(items: Vec<Value>) -> Result<Vec<Value>, NativeError> {
    if items.len() < 2 {
        return Ok(items);
    }
    let mut keyed = items
        .into_iter()
        .map(|item| {
            let mut budget = MAX_SORT_KEY_NODES;
            SortKey::build(&item, 0, &mut budget).map(|key| (key, item))
        })
        .collect::<Result<Vec<_>, _>>()?;
    keyed.sort_by(|(a, _), (b, _)| a.total_cmp(b));
    for pair in keyed.windows(2) {
        pair[0].0.check_orderable(&pair[1].0)?;
    }
    Ok(keyed.into_iter().map(|(_, item)| item).collect())
}

pub fn compare(op: CmpOp, a: &Value, b: &Value) -> Result<bool, NativeError> {
    let ordered = |symbol: &str, test: fn(Ordering) -> bool| {
        order(a, b, symbol).map(|ordering| ordering.is_some_and(test))
    };
    match op {
        CmpOp::Eq => Ok(values_equal(a, b)),
        CmpOp::NotEq => Ok(!values_equal(a, b)),
        CmpOp::Lt => ordered("<", Ordering::is_lt),
        CmpOp::LtEq => ordered("<=", Ordering::is_le),
        CmpOp::Gt => ordered(">", Ordering::is_gt),
        CmpOp::GtEq => ordered(">=", Ordering::is_ge),
        CmpOp::In => contains(b, a),
        CmpOp::NotIn => contains(b, a).map(|found| !found),
        CmpOp::Is => Ok(is_same_object(a, b)),
        CmpOp::IsNot => Ok(!is_same_object(a, b)),
    }
}

pub fn contains(container: &Value, item: &Value) -> Result<bool, NativeError> {
    match container {
        Value::List(items) => Ok(items
            .read_recursive()
            .iter()
            .any(|candidate| values_equal(candidate, item))),
        Value::Dict(entries) => Ok(hash_key(item)
            .map(|key| entries.read_recursive().contains_key(&key))
            .unwrap_or(false)),
        Value::Str(haystack) => match item {
            Value::Str(needle) => Ok(haystack.contains(needle.as_ref())),
            other => Err(NativeError::type_error(format!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            ))),
        },
        Value::Range { start, stop, step } => Ok(match item.as_int() {
            Some(i) => {
                let in_bounds = if *step > 0 {
                    i >= *start && i < *stop
                } else {
                    i <= *start && i > *stop
                };
                in_bounds && (i as i128 - *start as i128) % *step as i128 == 0
            }
            None => false,
        }),
        other => Err(NativeError::type_error(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

pub fn hash_key(value: &Value) -> Result<DictKey, NativeError> {
    DictKey::from_value(value).ok_or_else(|| {
        NativeError::type_error(format!("unhashable type: '{}'", value.type_name()))
    })
}

fn sequence_index(index: &Value, len: usize, what: &str) -> Result<usize, NativeError> {
    let Some(i) = index.as_int() else {
        return Err(NativeError::type_error(format!(
            "{} indices must be integers, not {}",
            what,
            index.type_name()
        )));
    };
    let len = i64::try_from(len).map_err(|_| overflow())?;
    let resolved = if i < 0 { i + len } else { i };
    if resolved < 0 || resolved >= len {
        return Err(NativeError::new(
            ExceptionKind::IndexError,
            format!("{} index out of range", what),
        ));
    }
    Ok(resolved as usize)
}

/// `object[index]`.
pub fn get_item(object: &Value, index: &Value) -> Result<Value, NativeError> {
    match object {
        Value::List(items) => {
            let items = items.read_recursive();
            let i = sequence_index(index, items.len(), "list")?;
            Ok(items[i].clone())
        }
        Value::Str(s) => {
            let count = s.chars().count();
            let i = sequence_index(index, count, "string")?;
            Ok(Value::str(s.chars().nth(i).map(String::from).unwrap_or_default()))
        }
        Value::Range { .. } => {
            let i = sequence_index(index, range_len(object).unwrap_or(0), "range")?;
            range_item(object, i).map(Value::Int).ok_or_else(overflow)
        }
        Value::Dict(entries) => {
            let key = hash_key(index)?;
            entries
                .read_recursive()
                .get(&key)
                .cloned()
                .ok_or_else(|| NativeError::new(ExceptionKind::KeyError, index.repr()))
        }
        other => Err(NativeError::type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

/// `object[index] = value`.
pub fn set_item(object: &Value, index: &Value, value: Value) -> Result<(), NativeError> {
    match object {
        Value::List(items) => {
            let mut items = items.write();
            let i = sequence_index(index, items.len(), "list assignment")?;
            items[i] = value;
            Ok(())
        }
        Value::Dict(entries) => {
            let key = hash_key(index)?;
            entries.write().insert(key, value);
            Ok(())
        }
        other => Err(NativeError::type_error(format!(
            "'{}' object does not support item assignment",
            other.type_name()
        ))),
    }
}

/// Snapshot of the items a `for` loop or builtin would visit.
pub fn iterate(value: &Value) -> Result<Vec<Value>, NativeError> {
    match value {
        Value::List(items) => Ok(items.read_recursive().clone()),
        Value::Dict(entries) => Ok(entries.read_recursive().keys().map(DictKey::to_value).collect()),
        Value::Str(s) => Ok(s.chars().map(|c| Value::str(c.to_string())).collect()),
        Value::Range { .. } => {
            let len = range_len(value).unwrap_or(0);
            ensure_len(len)?;
            (0..len)
                .map(|i| range_item(value, i).map(Value::Int).ok_or_else(overflow))
                .collect()
        }
        other => Err(NativeError::type_error(format!(
            "'{}' object is not iterable",
            other.type_name()
        ))),
    }
}
