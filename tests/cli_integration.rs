// CLI integration tests for table inspection and escaping.
use std::io::Write;
use std::process::{Command, Stdio};

use serde_json::Value;

fn cmd() -> Command {
    let exe = env!("CARGO_BIN_EXE_tsvrec");
    Command::new(exe)
}

fn parse_json(value: &str) -> Value {
    serde_json::from_str(value).expect("valid json")
}

fn json_lines(output: &[u8]) -> Vec<Value> {
    std::str::from_utf8(output)
        .expect("utf8")
        .lines()
        .map(parse_json)
        .collect()
}

fn run_with_stdin(args: &[&str], input: &str) -> std::process::Output {
    let mut child = cmd()
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(input.as_bytes())
        .expect("write stdin");
    child.wait_with_output().expect("wait")
}

#[test]
fn header_reports_columns() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("tweets.tsv");
    std::fs::write(&path, "\u{feff}Id\tTime\tUser\tText\n").expect("write");

    let output = cmd()
        .args(["header", path.to_str().unwrap()])
        .output()
        .expect("header");
    assert!(output.status.success());
    let report = &json_lines(&output.stdout)[0];
    assert_eq!(report["columns"], serde_json::json!(["Id", "Time", "User", "Text"]));
    assert!(report["path"].as_str().unwrap().ends_with("tweets.tsv"));
}

#[test]
fn dump_decodes_cells_and_honors_limit() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("rows.tsv");
    std::fs::write(&path, "id\tname\n1\t\"a\\tb\"\n2\n3\t\"c\"\n").expect("write");

    let output = cmd()
        .args(["dump", path.to_str().unwrap(), "--limit", "2"])
        .output()
        .expect("dump");
    assert!(output.status.success());
    let rows = json_lines(&output.stdout);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["id"], "1");
    assert_eq!(rows[0]["name"], "\"a\tb\"");
    assert!(rows[1].get("name").is_none());
}

#[test]
fn dump_of_missing_file_is_not_found() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("absent.tsv");

    let output = cmd()
        .args(["dump", path.to_str().unwrap()])
        .output()
        .expect("dump");
    assert_eq!(output.status.code(), Some(3));
    let err = &json_lines(&output.stderr)[0];
    assert_eq!(err["error"]["kind"], "NotFound");
    assert!(err["error"]["path"].as_str().unwrap().ends_with("absent.tsv"));
}

#[test]
fn escape_then_unescape_restores_lines() {
    let escaped = run_with_stdin(&["escape"], "tab\there\nback\\slash\n");
    assert!(escaped.status.success());
    let text = String::from_utf8(escaped.stdout).expect("utf8");
    assert_eq!(text, "tab\\there\nback\\\\slash\n");

    let restored = run_with_stdin(&["unescape"], &text);
    assert!(restored.status.success());
    assert_eq!(
        String::from_utf8(restored.stdout).expect("utf8"),
        "tab\there\nback\\slash\n"
    );
}

#[test]
fn unknown_flag_is_usage_error() {
    let output = cmd().args(["dump", "--bogus"]).output().expect("run");
    assert_eq!(output.status.code(), Some(2));
    let err = &json_lines(&output.stderr)[0];
    assert_eq!(err["error"]["kind"], "Usage");
    assert!(err["error"]["hint"].as_str().unwrap().contains("--help"));
}
