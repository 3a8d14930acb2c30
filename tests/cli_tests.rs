use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn sandbox_host() -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("sandbox-host").unwrap();
    cmd.env_remove("SANDBOX_POLICY")
        .env_remove("SANDBOX_INTROSPECT")
        .env_remove("RUST_LOG");
    cmd
}

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_check_accepts_safe_script() {
    let temp_dir = TempDir::new().unwrap();
    let script = write(temp_dir.path(), "rules.py", "x = 1 + 1\n");

    sandbox_host()
        .arg("check")
        .arg(&script)
        .assert()
        .success()
        .stdout(predicate::str::contains("rules.py passed verification"))
        .stdout(predicate::str::contains("sha256:"));
}

#[test]
fn test_check_rejects_import_with_source_line() {
    let temp_dir = TempDir::new().unwrap();
    let script = write(temp_dir.path(), "bad.py", "x = 1\nimport os\n");

    let output = sandbox_host()
        .arg("check")
        .arg(&script)
        .arg("--json")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let json: serde_json::Value = serde_json::from_slice(&output.stderr).unwrap();
    assert_eq!(json["success"], false);
    assert_eq!(json["sandbox"]["kind"], "code_unsafe");
    assert_eq!(json["sandbox"]["line"], 2);
}

#[test]
fn test_run_evaluates_each_context_in_order() {
    let temp_dir = TempDir::new().unwrap();
    let script = write(temp_dir.path(), "double.py", "doubled = n * 2\n");
    let first = write(temp_dir.path(), "first.json", r#"{ "n": 2 }"#);
    let second = write(temp_dir.path(), "second.json", r#"{ "n": 21 }"#);

    let output = sandbox_host()
        .arg("run")
        .arg(&script)
        .arg("--context")
        .arg(&first)
        .arg("--context")
        .arg(&second)
        .arg("--json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["module"], "double.py");
    let results = json["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["bindings"], serde_json::json!({ "n": 2, "doubled": 4 }));
    assert_eq!(results[1]["bindings"]["doubled"], 42);
}

#[test]
fn test_run_reports_script_errors_per_context() {
    let temp_dir = TempDir::new().unwrap();
    let script = write(
        temp_dir.path(),
        "check_limit.py",
        "if n > 10:\n    raise ValueError('too big')\nok = True\n",
    );
    let small = write(temp_dir.path(), "small.json", r#"{ "n": 1 }"#);
    let large = write(temp_dir.path(), "large.json", r#"{ "n": 100 }"#);

    let output = sandbox_host()
        .arg("--json")
        .arg("run")
        .arg(&script)
        .arg("--context")
        .arg(&small)
        .arg("--context")
        .arg(&large)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["success"], false);
    assert_eq!(json["results"][0]["success"], true);
    let error = &json["results"][1]["error"];
    assert_eq!(error["kind"], "script");
    assert_eq!(error["exception"], "ValueError");
    assert_eq!(error["line"], 2);
}

#[test]
fn test_run_refuses_unsafe_context() {
    let temp_dir = TempDir::new().unwrap();
    let script = write(temp_dir.path(), "noop.py", "pass\n");
    let context = write(temp_dir.path(), "ctx.json", r#"{ "__builtins__": {} }"#);

    sandbox_host()
        .arg("run")
        .arg(&script)
        .arg("--context")
        .arg(&context)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Provided context is not safe!"));
}

#[test]
fn test_run_rejects_non_object_context() {
    let temp_dir = TempDir::new().unwrap();
    let script = write(temp_dir.path(), "noop.py", "pass\n");
    let context = write(temp_dir.path(), "ctx.json", "[1, 2, 3]");

    sandbox_host()
        .arg("run")
        .arg(&script)
        .arg("--context")
        .arg(&context)
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a mapping"));
}

#[test]
fn test_policy_file_from_environment() {
    let temp_dir = TempDir::new().unwrap();
    let script = write(temp_dir.path(), "uses_sorted.py", "y = sorted([2, 1])\n");
    let policy = write(
        temp_dir.path(),
        "policy.json",
        r#"{ "forbidden_names": ["sorted"] }"#,
    );

    sandbox_host()
        .arg("check")
        .arg(&script)
        .assert()
        .success();

    sandbox_host()
        .env("SANDBOX_POLICY", &policy)
        .arg("check")
        .arg(&script)
        .assert()
        .failure()
        .stderr(predicate::str::contains("name 'sorted' is not allowed"));
}

#[test]
fn test_missing_script_is_reported() {
    let temp_dir = TempDir::new().unwrap();

    sandbox_host()
        .arg("check")
        .arg(temp_dir.path().join("missing.py"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read script"));
}

#[cfg(target_os = "linux")]
#[test]
fn test_introspection_capabilities_are_hidden_from_output() {
    let temp_dir = TempDir::new().unwrap();
    let script = write(temp_dir.path(), "uptime.py", "positive = system_uptime() > 0\n");

    let output = sandbox_host()
        .arg("run")
        .arg(&script)
        .arg("--introspect")
        .arg("--json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(
        json["results"][0]["bindings"],
        serde_json::json!({ "positive": true })
    );
}
