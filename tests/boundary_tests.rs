//! Behaviour of the construct/evaluate boundary as a host sees it.

mod common;

use std::collections::BTreeSet;
use std::sync::Arc;

use common::{assert_error_contains, assert_error_kind, assert_ok, namespace};
use sandbox_core::value::is_same_object;
use sandbox_core::{
    construct, ContextInput, ErrorKind, ExceptionKind, Namespace, PolicyConfig, Sandbox, Value,
};

const SCORING: &str = "\
def score(items):
    total = 0
    for item in items:
        if item < 0:
            raise ValueError('negative item')
        total += item
    return total

result = score(values)
";

#[test]
fn identical_construction_gives_identical_modules() {
    let first = assert_ok(construct(SCORING, "scoring"), "first construct");
    let second = assert_ok(construct(SCORING, "scoring"), "second construct");
    assert_eq!(first.digest(), second.digest());

    let values = || namespace([("values", Value::list(vec![Value::Int(3), Value::Int(4)]))]);
    let a = assert_ok(first.evaluate(values()), "evaluate first");
    let b = assert_ok(second.evaluate(values()), "evaluate second");
    assert_eq!(a.get("result"), Some(&Value::Int(7)));
    assert_eq!(a.to_json(), b.to_json());

    // Running one module does not change the other.
    let again = assert_ok(first.evaluate(values()), "evaluate first again");
    assert_eq!(again.to_json(), b.to_json());
}

#[test]
fn guarding_is_idempotent() {
    let sandbox = Sandbox::default();
    let context = assert_ok(sandbox.guard(namespace([("a", Value::Int(1))])), "guard");
    let id = context.id();

    let again = assert_ok(sandbox.guard(context), "guard again");
    assert_eq!(again.id(), id);
    assert_eq!(again.len(), 1);

    let module = assert_ok(construct("b = a + 1\n", "t"), "construct");
    let evaluated = assert_ok(module.evaluate(again), "evaluate guarded");
    assert_eq!(evaluated.id(), id);
}

#[test]
fn script_errors_report_source_lines() {
    let module = assert_ok(construct("a = 1\nraise ValueError('x')", "t"), "construct");
    let err = assert_error_kind(module.evaluate(Namespace::new()), ErrorKind::Script, "raise");
    assert_eq!(err.line(), Some(2));
    assert_eq!(err.to_string(), "ValueError: x");
}

#[test]
fn tracebacks_run_outermost_first() {
    let module = assert_ok(construct(SCORING, "scoring"), "construct");
    let values = namespace([("values", Value::list(vec![Value::Int(1), Value::Int(-1)]))]);
    let err = assert_error_kind(module.evaluate(values), ErrorKind::Script, "negative");
    let script = err.as_script().expect("script error");
    assert_eq!(script.kind, ExceptionKind::ValueError);
    let frames: Vec<(Option<&str>, usize)> = script
        .traceback
        .iter()
        .map(|frame| (frame.function.as_deref(), frame.line))
        .collect();
    assert_eq!(frames, vec![(None, 9), (Some("score"), 5)]);
    assert_eq!(err.line(), Some(5));
}

#[test]
fn rejections_are_permanent() {
    for name in ["t", "t", "other"] {
        let err = assert_error_kind(construct("import os\n", name), ErrorKind::CodeUnsafe, "import");
        assert_eq!(err.line(), Some(1));
        assert_error_contains(&err, "Code failed safety check!", "rejection message");
        assert_error_contains(&err, "import", "rejection reason");
    }
}

#[test]
fn reuse_of_returned_context_sees_bindings() {
    let module = assert_ok(construct("x = 1 + 1\n", "t"), "construct");
    let context = assert_ok(module.evaluate(Namespace::new()), "evaluate");
    assert_eq!(context.get("x"), Some(&Value::Int(2)));

    let follow_up = assert_ok(construct("y = x * 10\n", "t2"), "construct follow-up");
    let context = assert_ok(follow_up.evaluate(context), "evaluate follow-up");
    assert_eq!(context.get("x"), Some(&Value::Int(2)));
    assert_eq!(context.get("y"), Some(&Value::Int(20)));
}

#[test]
fn forbidden_context_keys_are_refused_not_dropped() {
    let module = assert_ok(construct("x = 1\n", "t"), "construct");
    for key in ["eval", "__builtins__", "not an identifier", ""] {
        let mapping = namespace([(key, Value::Int(1)), ("fine", Value::Int(2))]);
        let err = assert_error_kind(module.evaluate(mapping), ErrorKind::ContextUnsafe, key);
        assert_error_contains(&err, "Provided context is not safe!", key);
    }
}

#[test]
fn contexts_only_share_explicitly_shared_values() {
    let module = assert_ok(construct("shared.append(1)\nmine = len(shared)\n", "t"), "construct");
    let shared = Value::list(Vec::new());

    let first = assert_ok(
        module.evaluate(namespace([("shared", shared.clone()), ("only_first", Value::Int(0))])),
        "first",
    );
    let second = assert_ok(module.evaluate(namespace([("shared", shared.clone())])), "second");

    assert_eq!(first.get("mine"), Some(&Value::Int(1)));
    assert_eq!(second.get("mine"), Some(&Value::Int(2)));
    assert!(!second.contains_key("only_first"));
    let (Some(a), Some(b)) = (first.get("shared"), second.get("shared")) else {
        panic!("shared binding missing");
    };
    assert!(is_same_object(a, b));
}

#[test]
fn json_contexts_must_be_objects() {
    let module = assert_ok(construct("n = len(names)\n", "t"), "construct");
    let input = assert_ok(
        ContextInput::try_from(serde_json::json!({ "names": ["a", "b", "c"] })),
        "object context",
    );
    let context = assert_ok(module.evaluate(input), "evaluate");
    assert_eq!(context.get("n"), Some(&Value::Int(3)));

    let err = assert_error_kind(
        ContextInput::try_from(serde_json::json!(["names"])),
        ErrorKind::Argument,
        "array context",
    );
    assert_error_contains(&err, "not a mapping", "array context");
}

#[test]
fn refused_writes_surface_as_safety_errors() {
    let policy = PolicyConfig {
        reserved_keys: BTreeSet::from(["secret".to_string()]),
        ..PolicyConfig::default()
    };
    let sandbox = Sandbox::with_policy(policy);
    let module = assert_ok(sandbox.construct("ok = 1\nsecret = 2\n", "t"), "construct");

    let mut context = sandbox.context();
    let err = assert_error_kind(module.evaluate_in(&mut context), ErrorKind::Script, "bind");
    assert_eq!(err.as_script().map(|s| s.kind), Some(ExceptionKind::SafetyError));
    assert_eq!(err.line(), Some(2));
    assert_eq!(context.get("ok"), Some(&Value::Int(1)));
    assert!(!context.contains_key("secret"));

    // Handlers can observe the refusal.
    let module = assert_ok(
        sandbox.construct("try:\n    secret = 2\nexcept SafetyError:\n    refused = True\n", "t"),
        "construct handler",
    );
    let context = assert_ok(module.evaluate(Namespace::new()), "evaluate handler");
    assert_eq!(context.get("refused"), Some(&Value::Bool(true)));
}

#[test]
fn modules_evaluate_concurrently() {
    let module = Arc::new(assert_ok(construct("doubled = n * 2\n", "t"), "construct"));
    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|n| {
                let module = module.clone();
                scope.spawn(move || {
                    let context = module
                        .evaluate(namespace([("n", Value::Int(n))]))
                        .expect("evaluate");
                    context.get("doubled").cloned()
                })
            })
            .collect();
        for (n, handle) in handles.into_iter().enumerate() {
            let doubled = handle.join().expect("thread panicked");
            assert_eq!(doubled, Some(Value::Int(n as i64 * 2)));
        }
    });
}

#[test]
fn custom_policies_change_what_is_rejected() {
    let policy = assert_ok(
        PolicyConfig::from_json(r#"{ "forbidden_names": ["sorted"] }"#),
        "parse policy",
    );
    let sandbox = Sandbox::with_policy(policy);
    let err = assert_error_kind(
        sandbox.construct("x = 1\ny = sorted([2, 1])\n", "t"),
        ErrorKind::CodeUnsafe,
        "forbidden name",
    );
    assert_eq!(err.line(), Some(2));

    // `eval` is no longer forbidden in code, but the default reserved keys
    // still keep it out of contexts.
    assert_ok(sandbox.construct("y = eval\n", "t"), "eval is allowed");
}
