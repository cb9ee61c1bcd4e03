use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn demo() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_autocli-demo"));
    cmd.env_remove("AUTOCLI_DEMO_CONFIG").env_remove("RUST_LOG");
    cmd
}

fn run(args: &[&str]) -> Output {
    demo().args(args).output().expect("failed to run autocli-demo")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn write_config(dir: &Path, yaml: &str) -> String {
    let path = dir.join("demo.yml");
    fs::write(&path, yaml).expect("failed to write config");
    path.to_string_lossy().into_owned()
}

// ---- greet ----

#[test]
fn test_greet_defaults() {
    let output = run(&["greet"]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("Starting <greet>"));
    assert!(out.contains("Hello, World!"));
    assert!(out.contains("Done <greet>"));
}

#[test]
fn test_greet_short_flags_and_verbose() {
    let output = run(&["greet", "-n", "Ada", "-c", "2", "-v"]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert_eq!(out.matches("Hello, Ada!").count(), 2);
    assert!(out.contains("Greeted Ada 2 times"));
}

#[test]
fn test_greet_count_out_of_range() {
    for count in ["0", "101"] {
        let output = run(&["greet", "--count", count]);
        assert_eq!(output.status.code(), Some(2));
        let err = stderr(&output);
        assert!(err.contains("count"), "stderr: {err}");
        assert!(!stdout(&output).contains("Hello"));
    }
}

// ---- file ----

#[test]
fn test_file_write_then_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("note.txt");
    let path = path.to_str().unwrap();

    let output = run(&["file", "-f", path, "--write", "--mode", "append"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("in append mode"));

    let output = run(&["file", "--file", path]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("File content: Hello from autocli!"));
}

#[test]
fn test_file_missing_is_failure() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.txt");
    let output = run(&["file", "-f", path.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("File not found"));
}

#[test]
fn test_file_requires_filename() {
    let output = run(&["file"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("--file"));
}

#[test]
fn test_file_rejects_unknown_mode() {
    let output = run(&["file", "-f", "x", "--mode", "delete"]);
    assert_eq!(output.status.code(), Some(2));
    let err = stderr(&output);
    assert!(err.contains("text, binary, append"), "stderr: {err}");
}

// ---- exec ----

#[test]
fn test_exec_dry_run() {
    let output = run(&[
        "exec", "file1.py", "file2.py", "--dry-run", "--", "python", "-m", "pytest", "--tb=short",
    ]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("$ python -m pytest --tb=short file1.py"));
    assert!(out.contains("$ python -m pytest --tb=short file2.py"));
}

#[test]
fn test_exec_without_command() {
    let output = run(&["exec", "file1.py"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("Nothing to run"));
}

#[cfg(unix)]
#[test]
fn test_exec_propagates_exit_code() {
    let output = run(&["exec", "--", "sh", "-c", "exit 3"]);
    assert_eq!(output.status.code(), Some(3));
}

// ---- sleep / check ----

#[test]
fn test_sleep_is_awaited() {
    let output = run(&["sleep", "--millis", "5"]);
    assert!(output.status.success());
    let out = stdout(&output);
    let slept = out.find("Slept 5ms").expect("missing sleep output");
    let done = out.find("Done <sleep>").expect("missing done banner");
    assert!(slept < done);
}

#[test]
fn test_check_exit_codes() {
    assert_eq!(run(&["check"]).status.code(), Some(0));
    assert_eq!(run(&["check", "--code", "7"]).status.code(), Some(7));

    let output = run(&["check", "--code", "300"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("run_check"));
}

// ---- default / help ----

#[test]
fn test_default_command() {
    let output = run(&[]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("Starting <default>"));
    assert!(out.contains("Nothing to do for ."));

    let output = run(&["--target", "src", "stray"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Nothing to do for src"));
}

#[test]
fn test_help_lists_commands() {
    let output = run(&["--help"]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("--target"));
    for command in ["check", "exec", "file", "greet", "sleep"] {
        assert!(out.contains(command), "missing {command} in help");
    }
    assert!(!out.contains("Starting"));
}

#[test]
fn test_command_help() {
    let output = run(&["file", "-h"]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("-f, --file <TEXT>"));
    assert!(out.contains("-w, --write"));
    assert!(out.contains("possible values"));
}

#[test]
fn test_unknown_flag_is_usage_error() {
    let output = run(&["greet", "--loud"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("--loud"));
}

#[cfg(unix)]
#[test]
fn test_non_utf8_argument_is_usage_error() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let output = demo()
        .args([OsStr::new("greet"), OsStr::new("--name"), OsStr::from_bytes(b"\xff")])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let err = stderr(&output);
    assert!(err.contains("invalid UTF-8"), "stderr: {err}");
    assert!(!stdout(&output).contains("Hello"));
}

#[test]
fn test_help_lists_default_entry() {
    let output = run(&["--help"]);
    assert!(output.status.success());
    let out = stdout(&output);
    let listed = out.split("Commands:").nth(1).expect("missing command list");
    assert!(listed.contains("default"), "stdout: {out}");
}

// ---- config ----

#[test]
fn test_quiet_config_suppresses_banners() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "name: demo\nquiet: true\n");
    let output = demo()
        .env("AUTOCLI_DEMO_CONFIG", &config)
        .args(["greet", "-n", "Ada"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(stdout(&output), "Hello, Ada!\n");
}

#[test]
fn test_bad_config_fails_startup() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "quiet: [1, 2]\n");
    let output = demo()
        .env("AUTOCLI_DEMO_CONFIG", &config)
        .arg("greet")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("YAML error"));
}
