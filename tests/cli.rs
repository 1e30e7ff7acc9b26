mod common;

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;

use common::{TestWorkspace, fixture_path};

fn csv_recon() -> Command {
    Command::cargo_bin("csv-recon").expect("binary exists")
}

fn path_str(path: &std::path::Path) -> &str {
    path.to_str().expect("utf-8 path")
}

#[test]
fn compare_prints_summary_and_differences() {
    let left = fixture_path("orders_a.csv");
    let right = fixture_path("orders_b.tsv");
    csv_recon()
        .args(["compare", "--left", path_str(&left), "--right", path_str(&right)])
        .assert()
        .success()
        .stdout(contains("Matched by: key detected by name (order_id=OrderID)"))
        .stdout(contains("Matched: 3  Identical: 2  Differing: 1  Filtered: 0"))
        .stdout(contains("Left-only rows: 4"))
        .stdout(contains("Right-only fields: Region"))
        .stdout(contains("[order_id=1002] similarity 0.75 (3/4 fields equal)"));
}

#[test]
fn compare_writes_json_report_to_file() {
    let workspace = TestWorkspace::new();
    let output = workspace.path().join("report.json");
    csv_recon()
        .args([
            "compare",
            "--left",
            path_str(&fixture_path("orders_a.csv")),
            "--right",
            path_str(&fixture_path("orders_b.tsv")),
            "--key",
            "order_id=OrderID",
            "--exclude-keys",
            "--format",
            "json",
            "-o",
            path_str(&output),
        ])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let report: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&output).expect("read report")).expect("json");
    assert_eq!(report["strategy"]["kind"], "explicit");
    assert_eq!(report["matched"], 3);
    assert_eq!(report["compared_fields"], serde_json::json!(["customer", "amount", "status"]));
    assert_eq!(report["differing"][0]["similarity"], serde_json::json!(2.0 / 3.0));
}

#[test]
fn unknown_key_fails_with_side() {
    csv_recon()
        .args([
            "compare",
            "--left",
            path_str(&fixture_path("orders_a.csv")),
            "--right",
            path_str(&fixture_path("orders_b.tsv")),
            "-k",
            "nope",
        ])
        .assert()
        .failure()
        .code(1)
        .stderr(contains("error: "))
        .stderr(contains("Key field 'nope' not found in left table"));
}

#[test]
fn disjoint_files_fail_with_schema_error() {
    let workspace = TestWorkspace::new();
    let left = workspace.write("left.csv", "alpha,beta\n1,2\n");
    let right = workspace.write("right.csv", "zzz,qqq\n1,2\n");
    csv_recon()
        .args(["compare", "--left", path_str(&left), "--right", path_str(&right)])
        .assert()
        .failure()
        .stderr(contains("No common fields"));
}

#[test]
fn reject_empty_turns_empty_input_into_an_error() {
    let workspace = TestWorkspace::new();
    let left = workspace.write("left.csv", "id,v\n1,a\n");
    let right = workspace.write("right.csv", "id,v\n");
    csv_recon()
        .args(["compare", "--left", path_str(&left), "--right", path_str(&right)])
        .assert()
        .success()
        .stdout(contains("Left only: 1  Right only: 0"));
    csv_recon()
        .args([
            "compare",
            "--left",
            path_str(&left),
            "--right",
            path_str(&right),
            "--reject-empty",
        ])
        .assert()
        .failure()
        .stderr(contains("The right table has no rows"));
}

#[test]
fn left_input_can_come_from_stdin() {
    let workspace = TestWorkspace::new();
    let right = workspace.write("right.csv", "id,name\n2,Bo\n1,Al\n");
    csv_recon()
        .args(["compare", "--left", "-", "--right", path_str(&right)])
        .write_stdin("id,name\n1,al\n2,bo\n")
        .assert()
        .success()
        .stdout(contains("Matched: 2  Identical: 2  Differing: 0"));
}

#[test]
fn yaml_config_is_applied_and_flags_override_it() {
    let workspace = TestWorkspace::new();
    let left = workspace.write("left.csv", "id,name\n1,al\n2,bo\n");
    let right = workspace.write("right.csv", "id,name\n2,bo\n1,al\n");
    let config = workspace.write("recon.yaml", "ignore_order: false\nnormalize_values: true\n");
    csv_recon()
        .args([
            "compare",
            "--left",
            path_str(&left),
            "--right",
            path_str(&right),
            "--config",
            path_str(&config),
        ])
        .assert()
        .success()
        .stdout(contains("Matched by: row position"))
        .stdout(contains("Differing: 2"));

    let bad = workspace.write("bad.yaml", "similarity_treshold: 0.5\n");
    csv_recon()
        .args([
            "compare",
            "--left",
            path_str(&left),
            "--right",
            path_str(&right),
            "--config",
            path_str(&bad),
        ])
        .assert()
        .failure()
        .stderr(contains("Parsing config YAML"));
}

#[test]
fn encodings_are_decoded_per_side() {
    let workspace = TestWorkspace::new();
    let (gbk, _, _) = encoding_rs::GBK.encode("编号,名称\n1,苹果\n");
    let left = workspace.write_bytes("left.csv", &gbk);
    let right = workspace.write("right.csv", "编号,名称\n1,苹果\n");
    csv_recon()
        .args([
            "compare",
            "--left",
            path_str(&left),
            "--right",
            path_str(&right),
            "--left-encoding",
            "gbk",
        ])
        .assert()
        .success()
        .stdout(contains("Identical: 1"));
}

#[test]
fn keys_reports_candidates_and_checks() {
    csv_recon()
        .args([
            "keys",
            "-i",
            path_str(&fixture_path("orders_a.csv")),
            "--check",
            "status",
        ])
        .assert()
        .success()
        .stdout(contains("Single-column keys: order_id, customer, amount"))
        .stdout(contains("Composite keys: (none)"))
        .stdout(contains("Check [status]: not a key: not unique"));
}

#[test]
fn keys_json_output_parses() {
    let output = csv_recon()
        .args([
            "keys",
            "-i",
            path_str(&fixture_path("orders_b.tsv")),
            "--format",
            "json",
        ])
        .output()
        .expect("run keys");
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(report["rows"], 4);
    assert_eq!(report["single_keys"][0], "OrderID");
    assert!(report.get("check").is_none());
}

#[test]
fn unlabelled_gbk_input_is_detected() {
    let workspace = TestWorkspace::new();
    let (gbk, _, _) = encoding_rs::GBK.encode("编号,名称\n1,苹果\n2,香蕉\n");
    let left = workspace.write_bytes("left.csv", &gbk);
    let right = workspace.write("right.csv", "编号,名称\n1,苹果\n2,香蕉\n");
    csv_recon()
        .args(["compare", "--left", path_str(&left), "--right", path_str(&right)])
        .assert()
        .success()
        .stdout(contains("Identical: 2"))
        .stderr(contains("with encoding GBK"));
}

#[test]
fn duplicate_header_names_are_rejected() {
    let workspace = TestWorkspace::new();
    let left = workspace.write("left.csv", "id,x,x\n1,a,b\n");
    let right = workspace.write("right.csv", "id,x,x\n1,z,b\n");
    csv_recon()
        .args([
            "compare",
            "--left",
            path_str(&left),
            "--right",
            path_str(&right),
            "--key",
            "id",
        ])
        .assert()
        .failure()
        .stderr(contains("Duplicate column name 'x'"));
}

#[test]
fn values_flag_reports_shared_and_one_sided_values() {
    csv_recon()
        .args([
            "compare",
            "--left",
            path_str(&fixture_path("orders_a.csv")),
            "--right",
            path_str(&fixture_path("orders_b.tsv")),
            "--values",
            "Customer",
        ])
        .assert()
        .success()
        .stdout(contains("Values of customer=Customer: 3 common, 1 left only, 1 right only"))
        .stdout(contains("  left only: dan"))
        .stdout(contains("  right only: eve"));
}

#[test]
fn values_flag_rejects_unaligned_fields() {
    csv_recon()
        .args([
            "compare",
            "--left",
            path_str(&fixture_path("orders_a.csv")),
            "--right",
            path_str(&fixture_path("orders_b.tsv")),
            "--values",
            "Region",
        ])
        .assert()
        .failure()
        .stderr(contains("Field 'Region' is not aligned"));
}
