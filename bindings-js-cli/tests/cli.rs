use assert_cmd::Command;
use engine_js::Bytecode;
use engine_js::BytecodeBuilder;
use engine_js::Instruction;
use predicates::str::contains;
use predicates::str::is_empty;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

fn bindings_js_cli() -> Command {
  let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("bindings-js-cli");
  cmd.timeout(Duration::from_secs(10));
  cmd
}

fn write_bytecode(dir: &TempDir, name: &str, bytecode: &Bytecode) -> PathBuf {
  let path = dir.path().join(name);
  fs::write(&path, bytecode.to_vec().expect("encode bytecode")).expect("write bytecode");
  path
}

fn spins_forever() -> Bytecode {
  Bytecode::new(vec![
    Instruction::EnterTry { handler: 2 },
    Instruction::Jump { target: 1 },
    Instruction::Return,
  ])
}

#[test]
fn native_test_reports_ascii_argument() {
  let dir = TempDir::new().expect("temp dir");
  let bytecode = BytecodeBuilder::new()
    .call_global("nativeTest", 2, |b| b.load_number(42.0).load_string("hi"))
    .ret()
    .build();
  let path = write_bytecode(&dir, "ascii.hbc.json", &bytecode);

  bindings_js_cli()
    .arg(&path)
    .assert()
    .success()
    .stdout(
      "nativeTest called with 2 arguments\nargument is 42\nargument is in ASCII encoding\n",
    )
    .stderr(is_empty());
}

#[test]
fn native_test_prints_utf16_code_units() {
  let dir = TempDir::new().expect("temp dir");
  let bytecode = BytecodeBuilder::new()
    .call_global("nativeTest", 2, |b| b.load_number(1.5).load_string("é☃"))
    .ret()
    .build();
  let path = write_bytecode(&dir, "utf16.hbc.json", &bytecode);

  bindings_js_cli()
    .arg(&path)
    .assert()
    .success()
    .stdout(
      "nativeTest called with 2 arguments\nargument is 1.5\nargument is in UTF16 encoding\nE9 2603\n",
    );
}

#[test]
fn native_test_without_arguments_only_reports_the_count() {
  let dir = TempDir::new().expect("temp dir");
  let bytecode = BytecodeBuilder::new()
    .call_global("nativeTest", 0, |b| b)
    .ret()
    .build();
  let path = write_bytecode(&dir, "empty.hbc.json", &bytecode);

  bindings_js_cli()
    .arg(&path)
    .assert()
    .success()
    .stdout("nativeTest called with 0 arguments\n");
}

#[test]
fn native_test_rejects_a_non_numeric_first_argument() {
  let dir = TempDir::new().expect("temp dir");
  let bytecode = BytecodeBuilder::new()
    .call_global("nativeTest", 1, |b| b.load_string("nope"))
    .ret()
    .build();
  let path = write_bytecode(&dir, "bad.hbc.json", &bytecode);

  bindings_js_cli()
    .arg(&path)
    .assert()
    .failure()
    .code(1)
    .stderr(contains(
      "Uncaught TypeError: expected argument to be a number",
    ));
}

#[test]
fn print_joins_its_arguments() {
  let dir = TempDir::new().expect("temp dir");
  let bytecode = BytecodeBuilder::new()
    .call_global("print", 3, |b| {
      b.load_string("sum").load_number(7.0).load_undefined()
    })
    .ret()
    .build();
  let path = write_bytecode(&dir, "print.hbc.json", &bytecode);

  bindings_js_cli()
    .arg(&path)
    .assert()
    .success()
    .stdout("sum 7 undefined\n");
}

#[test]
fn uncaught_script_exception_fails() {
  let dir = TempDir::new().expect("temp dir");
  let bytecode = BytecodeBuilder::new()
    .load_string("boom")
    .push(Instruction::Throw)
    .build();
  let path = write_bytecode(&dir, "throw.hbc.json", &bytecode);

  bindings_js_cli()
    .arg(&path)
    .assert()
    .failure()
    .code(1)
    .stdout(is_empty())
    .stderr(contains("Uncaught boom"));
}

#[test]
fn time_limit_terminates_a_spinning_script() {
  let dir = TempDir::new().expect("temp dir");
  let path = write_bytecode(&dir, "spin.hbc.json", &spins_forever());

  bindings_js_cli()
    .arg(&path)
    .args(["--time-limit", "50"])
    .assert()
    .failure()
    .code(1)
    .stderr(contains("execution terminated: deadline exceeded"));
}

#[test]
fn config_file_supplies_the_time_limit() {
  let dir = TempDir::new().expect("temp dir");
  let path = write_bytecode(&dir, "spin.hbc.json", &spins_forever());
  let config = dir.path().join("options.json");
  fs::write(&config, r#"{ "time_limit_ms": 50 }"#).expect("write config");

  bindings_js_cli()
    .arg(&path)
    .arg("--config")
    .arg(&config)
    .assert()
    .failure()
    .code(1)
    .stderr(contains("deadline exceeded"));
}

#[test]
fn stop_after_init_does_not_run_the_script() {
  let dir = TempDir::new().expect("temp dir");
  let path = write_bytecode(&dir, "spin.hbc.json", &spins_forever());

  bindings_js_cli()
    .arg(&path)
    .arg("--stop-after-init")
    .assert()
    .success()
    .stdout(is_empty());
}

#[test]
fn gc_stats_are_printed_as_json() {
  let dir = TempDir::new().expect("temp dir");
  let bytecode = BytecodeBuilder::new().load_number(1.0).ret().build();
  let path = write_bytecode(&dir, "stats.hbc.json", &bytecode);

  let assert = bindings_js_cli()
    .arg(&path)
    .arg("--force-gc-before-stats")
    .assert()
    .success();
  let stderr = String::from_utf8_lossy(&assert.get_output().stderr);
  let stats: Value = serde_json::from_str(&stderr).expect("stderr to be valid JSON");
  assert_eq!(stats["gc"]["name"], "hvm-rust");
  assert!(stats["gc"]["gc_runs"].as_u64().unwrap_or(0) >= 1);
  assert_eq!(stats["gc"]["events"][0]["cause"], "forced");
  assert!(stats["sampled"].is_null());
}

#[test]
fn missing_input_fails() {
  let dir = TempDir::new().expect("temp dir");
  bindings_js_cli()
    .arg(dir.path().join("missing.hbc.json"))
    .assert()
    .failure()
    .code(1)
    .stderr(contains("failed to read"));
}

#[test]
fn malformed_bytecode_fails() {
  let dir = TempDir::new().expect("temp dir");
  let path = dir.path().join("garbage.hbc.json");
  fs::write(&path, "not bytecode").expect("write input");

  bindings_js_cli()
    .arg(&path)
    .assert()
    .failure()
    .code(1)
    .stderr(contains("failed to decode"));
}

#[test]
fn usage_errors_exit_with_one() {
  bindings_js_cli().assert().failure().code(1);
}
