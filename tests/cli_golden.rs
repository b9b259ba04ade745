// Copyright 2026 Omnio Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::path::Path;

use assert_cmd::Command;
use predicates::str::contains;
use serde_json::Value;
use serde_json::json;
use tempfile::TempDir;

fn omnio_cmd(root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("omnio").expect("find omnio binary");
    cmd.current_dir(root);
    cmd
}

fn init(root: &Path) {
    omnio_cmd(root).arg("init").assert().success();
}

fn json_of(cmd: &mut Command) -> Value {
    let output = cmd.arg("--json").output().expect("run omnio");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    serde_json::from_slice(&output.stdout).expect("parse json output")
}

#[test]
fn put_then_get_round_trips_bytes() {
    let dir = TempDir::new().unwrap();
    init(dir.path());

    omnio_cmd(dir.path())
        .args(["put", "greeting.txt"])
        .write_stdin("hello, omnio")
        .assert()
        .success();

    let output = omnio_cmd(dir.path())
        .args(["get", "greeting.txt"])
        .output()
        .unwrap();
    assert_eq!(output.stdout, b"hello, omnio");
}

#[test]
fn create_exclusive_rejects_duplicate_path() {
    let dir = TempDir::new().unwrap();
    init(dir.path());

    omnio_cmd(dir.path())
        .args(["put", "a.txt", "--flag", "wx"])
        .write_stdin("first")
        .assert()
        .success();

    omnio_cmd(dir.path())
        .args(["put", "a.txt", "--flag", "wx"])
        .write_stdin("second")
        .assert()
        .failure()
        .stderr(contains("a.txt"));

    let output = omnio_cmd(dir.path()).args(["get", "a.txt"]).output().unwrap();
    assert_eq!(output.stdout, b"first");
}

#[test]
fn append_extends_existing_object() {
    let dir = TempDir::new().unwrap();
    init(dir.path());

    omnio_cmd(dir.path())
        .args(["put", "log.txt"])
        .write_stdin("line one\n")
        .assert()
        .success();
    omnio_cmd(dir.path())
        .args(["put", "log.txt", "--flag", "a"])
        .write_stdin("line two\n")
        .assert()
        .success();

    let output = omnio_cmd(dir.path()).args(["get", "log.txt"]).output().unwrap();
    assert_eq!(output.stdout, b"line one\nline two\n");
}

#[test]
fn rm_then_purge_removes_object_and_entity() {
    let dir = TempDir::new().unwrap();
    init(dir.path());

    omnio_cmd(dir.path())
        .args(["put", "a.txt"])
        .write_stdin("bye")
        .assert()
        .success();

    let rm_out = json_of(omnio_cmd(dir.path()).args(["rm", "a.txt"]));
    let object_id = rm_out["data"]["objectId"].as_str().unwrap().to_string();

    omnio_cmd(dir.path()).args(["get", "a.txt"]).assert().failure();

    omnio_cmd(dir.path())
        .args(["purge", &object_id])
        .assert()
        .success();

    let doctor_out = json_of(omnio_cmd(dir.path()).arg("doctor"));
    assert_eq!(doctor_out["data"]["objectsChecked"], 0);
}

#[test]
fn mv_then_ls_reflects_new_path() {
    let dir = TempDir::new().unwrap();
    init(dir.path());

    omnio_cmd(dir.path())
        .args(["put", "old.txt"])
        .write_stdin("x")
        .assert()
        .success();
    omnio_cmd(dir.path()).args(["mv", "old.txt", "new.txt"]).assert().success();

    omnio_cmd(dir.path()).args(["get", "old.txt"]).assert().failure();
    let output = omnio_cmd(dir.path()).args(["get", "new.txt"]).output().unwrap();
    assert_eq!(output.stdout, b"x");

    let ls_out = json_of(omnio_cmd(dir.path()).arg("ls"));
    let entries = ls_out["data"]["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["path"], "new.txt");
}

#[test]
fn cp_to_same_path_is_a_no_op() {
    let dir = TempDir::new().unwrap();
    init(dir.path());

    omnio_cmd(dir.path())
        .args(["put", "a.txt"])
        .write_stdin("same")
        .assert()
        .success();
    let before = json_of(omnio_cmd(dir.path()).args(["stat", "a.txt"]));

    omnio_cmd(dir.path()).args(["cp", "a.txt", "a.txt"]).assert().success();

    let after = json_of(omnio_cmd(dir.path()).args(["stat", "a.txt"]));
    assert_eq!(before, after);
}

#[test]
fn put_reports_size_checksum_and_tags() {
    let dir = TempDir::new().unwrap();
    init(dir.path());

    let put_json = json_of(
        omnio_cmd(dir.path())
            .args(["put", "notes/a.txt", "--tag", "draft", "--description", "quarterly notes"])
            .write_stdin("quarterly update"),
    );
    let data = &put_json["data"];
    assert_eq!(data["size"], 16);
    assert_eq!(data["numParts"], 1);
    assert!(data["checksum"].as_str().unwrap().len() == 32);

    let stat_json = json_of(omnio_cmd(dir.path()).args(["stat", "notes/a.txt"]));
    assert_eq!(stat_json["data"], json!({ "isObject": true, "isDirectory": false }));
}

#[test]
fn search_finds_object_by_description() {
    let dir = TempDir::new().unwrap();
    init(dir.path());

    omnio_cmd(dir.path())
        .args(["put", "doc.txt", "--description", "a quick fox jumps"])
        .write_stdin("content")
        .assert()
        .success();

    let hits = json_of(omnio_cmd(dir.path()).args(["search", "fox"]));
    let hits = hits["data"]["hits"].as_array().unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["path"], "doc.txt");
}
