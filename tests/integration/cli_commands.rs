#![allow(missing_docs)]

mod support;

use std::fs;
use std::path::PathBuf;

use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::{json, Value};
use tempfile::TempDir;

struct Workspace {
    dir: TempDir,
    schema: PathBuf,
    graph: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let schema = dir.path().join("schema.json");
        let graph = dir.path().join("graph.json");
        let schema_doc = serde_json::to_string(&support::care_bears_schema()).unwrap();
        fs::write(&schema, schema_doc).unwrap();
        fs::write(&graph, support::care_bears_graph_value().to_string()).unwrap();
        Self { dir, schema, graph }
    }

    fn config(&self) -> PathBuf {
        self.dir.path().join("quarry.toml")
    }

    fn quarry(&self) -> assert_cmd::Command {
        let mut cmd = cargo_bin_cmd!("quarry");
        cmd.env("QUARRY_CONFIG", self.config())
            .env_remove("QUARRY_PROFILE")
            .env("RUST_LOG", "off");
        cmd
    }
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

#[test]
fn query_prints_results_as_json() {
    let ws = Workspace::new();
    let output = ws
        .quarry()
        .args(["--format", "json", "query", "--schema"])
        .arg(&ws.schema)
        .arg("--graph")
        .arg(&ws.graph)
        .arg(r#"{"type":"bears","id":"1","select":["name",{"home":{"select":["name"]}}]}"#)
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(
        stdout_json(&output),
        json!({ "name": "Tenderheart Bear", "home": { "name": "Care-a-Lot" } })
    );
}

#[test]
fn query_documents_can_come_from_files_and_stdin() {
    let ws = Workspace::new();
    let query_path = ws.dir.path().join("query.json");
    fs::write(&query_path, r#"{"type":"homes","select":["name"],"order":{"name":"desc"}}"#).unwrap();
    let from_file = ws
        .quarry()
        .args(["--format", "json", "query", "--schema"])
        .arg(&ws.schema)
        .arg("--graph")
        .arg(&ws.graph)
        .arg(&query_path)
        .output()
        .unwrap();
    assert_eq!(
        stdout_json(&from_file),
        json!([{ "name": "Forest of Feelings" }, { "name": "Care-a-Lot" }])
    );

    let from_stdin = ws
        .quarry()
        .args(["--format", "json", "query", "--schema"])
        .arg(&ws.schema)
        .arg("--graph")
        .arg(&ws.graph)
        .arg("-")
        .write_stdin(r#"{"type":"powers","id":"makeAWish","select":["name"]}"#)
        .output()
        .unwrap();
    assert_eq!(stdout_json(&from_stdin), json!({ "name": "Make a Wish" }));
}

#[test]
fn validate_reports_issues_with_exit_code_two() {
    let ws = Workspace::new();
    let output = ws
        .quarry()
        .args(["--format", "json", "validate", "--schema"])
        .arg(&ws.schema)
        .arg(r#"{"type":"bears","select":["wings"],"limit":"ten"}"#)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let issues = stdout_json(&output);
    let paths: Vec<&Value> = issues
        .as_array()
        .unwrap()
        .iter()
        .map(|issue| &issue["path"])
        .collect();
    assert_eq!(paths, [&json!(["limit"]), &json!(["select", "0"])]);

    ws.quarry()
        .args(["validate", "--schema"])
        .arg(&ws.schema)
        .arg(r#"{"type":"bears","select":["name"]}"#)
        .assert()
        .success();
}

#[test]
fn normalize_prints_the_normal_form() {
    let ws = Workspace::new();
    let output = ws
        .quarry()
        .args(["--format", "json", "normalize", "--schema"])
        .arg(&ws.schema)
        .arg(r#"{"type":"homes","select":"name","where":{"caring_meter":1},"limit":1}"#)
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(
        stdout_json(&output),
        json!({
            "type": "homes",
            "select": { "name": "name" },
            "where": { "$pipe": [{ "$get": "caring_meter" }, { "$eq": 1 }] },
            "slice": { "limit": 1 }
        })
    );
}

#[test]
fn eval_runs_standalone_expressions() {
    let ws = Workspace::new();
    let output = ws
        .quarry()
        .args(["--format", "json", "eval", r#"{"$sum":[1,2,3]}"#])
        .output()
        .unwrap();
    assert_eq!(stdout_json(&output), json!(6));

    let output = ws
        .quarry()
        .args(["--format", "json", "eval", r#"{"$gt":3}"#, "--input", "5"])
        .output()
        .unwrap();
    assert_eq!(stdout_json(&output), json!(true));

    ws.quarry()
        .args(["eval", "--vocabulary", "where", r#"{"$sum":[1]}"#])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn profiles_supply_default_documents() {
    let ws = Workspace::new();
    ws.quarry()
        .args(["profile", "set", "bears", "--schema"])
        .arg(&ws.schema)
        .arg("--graph")
        .arg(&ws.graph)
        .arg("--default")
        .assert()
        .success();
    let saved = fs::read_to_string(ws.config()).unwrap();
    assert!(saved.contains("default_profile = \"bears\""));

    let output = ws
        .quarry()
        .args(["--format", "json", "query", r#"{"type":"bears","ids":["5"],"select":["name"]}"#])
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(stdout_json(&output), json!([{ "name": "Smart Heart Bear" }]));

    ws.quarry().args(["profile", "delete", "bears"]).assert().success();
    ws.quarry()
        .args(["query", r#"{"type":"bears"}"#])
        .assert()
        .failure();
}

#[test]
fn errors_carry_their_code() {
    let ws = Workspace::new();
    let output = ws
        .quarry()
        .args(["query", "--no-validate", "--schema"])
        .arg(&ws.schema)
        .arg("--graph")
        .arg(&ws.graph)
        .arg(r#"{"type":"cousins"}"#)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error[UnknownResourceType]"), "stderr: {stderr}");
}

#[test]
fn help_lists_every_command() {
    let ws = Workspace::new();
    let output = ws.quarry().arg("--help").output().unwrap();
    assert!(output.status.success());
    let help = String::from_utf8_lossy(&output.stdout);
    for command in ["query", "normalize", "validate", "eval", "profile"] {
        assert!(help.contains(command), "missing {command} in:\n{help}");
    }
}
