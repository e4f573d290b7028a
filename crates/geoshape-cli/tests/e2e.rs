use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use geoshape_core::{Attributes, Point, Shape, ShapeType};
use geoshape_format::{DbfField, DbfFile, ShpFile};
use serde_json::Value;

fn geoshape() -> Command {
    Command::new(env!("CARGO_BIN_EXE_geoshape"))
}

fn run_ok(cwd: &Path, args: &[&str]) -> Output {
    let out = geoshape()
        .current_dir(cwd)
        .args(args)
        .output()
        .expect("run geoshape");
    assert!(
        out.status.success(),
        "expected success\nargs={args:?}\nstatus={}\nstdout={}\nstderr={}",
        out.status,
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr),
    );
    out
}

fn run_err(cwd: &Path, args: &[&str]) -> Output {
    let out = geoshape()
        .current_dir(cwd)
        .args(args)
        .output()
        .expect("run geoshape");
    assert!(
        !out.status.success(),
        "expected failure\nargs={args:?}\nstatus={}\nstdout={}\nstderr={}",
        out.status,
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr),
    );
    out
}

fn run_ok_json(cwd: &Path, args: &[&str]) -> Value {
    let out = run_ok(cwd, args);
    serde_json::from_slice(&out.stdout).expect("stdout is valid JSON")
}

/// Writes `towns.shp/.shx/.dbf` with four points on the diagonal, the third
/// one a null shape.
fn write_towns(dir: &Path) -> PathBuf {
    let path = dir.join("towns.shp");
    let mut shp = ShpFile::create_empty(&path, ShapeType::Point).expect("create shp");
    shp.open().expect("open shp");
    for i in 1..=4u8 {
        let xy = f64::from(i);
        if i == 3 {
            shp.push_null().expect("push null");
        } else {
            shp.push(&Shape::Point(Point::new(xy, xy))).expect("push");
        }
    }
    shp.close();

    let fields = [
        DbfField::character("NAME", 20),
        DbfField::numeric("POP", 8, 0),
        DbfField::logical("CAPITAL"),
    ];
    let mut dbf = DbfFile::create_empty(dir.join("towns.dbf"), &fields).expect("create dbf");
    dbf.open().expect("open dbf");
    let rows = [
        ("Ashford", 1200, false),
        ("Brook", 560, true),
        ("Cedar", 90, false),
        ("Dale", 3400, false),
    ];
    dbf.push_rows(rows.into_iter().map(|(name, pop, capital)| {
        let mut row = Attributes::new();
        row.insert("NAME", name);
        row.insert("POP", pop);
        row.insert("CAPITAL", capital);
        row
    }));
    dbf.flush().expect("flush");
    dbf.close();
    path
}

#[test]
fn inspect_reports_headers_and_fields() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_towns(dir.path());

    let v = run_ok_json(dir.path(), &["--json", "inspect", "towns.shp"]);
    assert_eq!(v["shp"]["shape_type"], "point");
    assert_eq!(v["shp"]["shape_type_code"], 1);
    assert_eq!(v["shp"]["record_count"], 4);
    assert_eq!(v["shp"]["removed_count"], 0);
    assert_eq!(v["shp"]["envelope"]["minx"], 1.0);
    assert_eq!(v["shp"]["envelope"]["maxy"], 4.0);
    assert_eq!(v["dbf"]["record_count"], 4);
    assert_eq!(v["dbf"]["record_length"], 1 + 20 + 8 + 1);
    let fields = v["dbf"]["fields"].as_array().expect("fields array");
    let names: Vec<&str> = fields.iter().filter_map(|f| f["name"].as_str()).collect();
    assert_eq!(names, vec!["NAME", "POP", "CAPITAL"]);
    assert_eq!(fields[1]["type"], "N");

    let out = run_ok(dir.path(), &["inspect", "towns.shp"]);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("type=point"), "stdout={stdout}");
    assert!(stdout.contains("CAPITAL"), "stdout={stdout}");
}

#[test]
fn features_skip_null_shapes_and_honour_filters() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_towns(dir.path());

    let v = run_ok_json(dir.path(), &["--json", "features", "towns.shp"]);
    assert_eq!(v["type"], "FeatureCollection");
    let ids: Vec<u64> = v["features"]
        .as_array()
        .expect("features")
        .iter()
        .filter_map(|f| f["id"].as_u64())
        .collect();
    assert_eq!(ids, vec![1, 2, 4]);
    assert_eq!(v["features"][0]["geometry"]["type"], "Point");
    assert_eq!(v["features"][1]["properties"]["NAME"], "Brook");
    assert_eq!(v["features"][1]["properties"]["CAPITAL"], true);

    let v = run_ok_json(
        dir.path(),
        &[
            "--json",
            "features",
            "towns.shp",
            "--bbox",
            "1.5,1.5,10,10",
            "--field",
            "NAME",
        ],
    );
    let features = v["features"].as_array().expect("features");
    assert_eq!(features.len(), 2);
    assert_eq!(features[0]["id"], 2);
    assert_eq!(features[1]["id"], 4);
    assert_eq!(features[0]["properties"], serde_json::json!({ "NAME": "Brook" }));

    let v = run_ok_json(
        dir.path(),
        &["--json", "features", "towns.shp", "--from", "1", "--limit", "1"],
    );
    let features = v["features"].as_array().expect("features");
    assert_eq!(features.len(), 1);
    assert_eq!(features[0]["id"], 2);
}

#[test]
fn get_prints_one_feature() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_towns(dir.path());

    let v = run_ok_json(dir.path(), &["--json", "get", "towns.shp", "--id", "4"]);
    assert_eq!(v["type"], "Feature");
    assert_eq!(v["id"], 4);
    assert_eq!(v["properties"]["NAME"], "Dale");
    assert_eq!(v["properties"]["POP"], 3400.0);

    let out = run_ok(dir.path(), &["get", "towns.shp", "--id", "1"]);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("NAME: \"Ashford\""), "stdout={stdout}");

    run_err(dir.path(), &["get", "towns.shp", "--id", "3"]);
    run_err(dir.path(), &["get", "towns.shp", "--id", "9"]);
    run_err(dir.path(), &["get", "towns.shp", "--id", "1", "--field", "NOPE"]);
}

#[test]
fn remove_soft_deletes_in_both_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_towns(dir.path());

    let v = run_ok_json(dir.path(), &["--json", "remove", "towns.shp", "--id", "2"]);
    assert_eq!(v["removed"], true);

    let v = run_ok_json(dir.path(), &["--json", "inspect", "towns.shp"]);
    assert_eq!(v["shp"]["record_count"], 4);
    assert_eq!(v["shp"]["removed_count"], 1);
    assert_eq!(v["dbf"]["deleted_count"], 1);

    let v = run_ok_json(dir.path(), &["--json", "features", "towns.shp"]);
    let ids: Vec<u64> = v["features"]
        .as_array()
        .expect("features")
        .iter()
        .filter_map(|f| f["id"].as_u64())
        .collect();
    assert_eq!(ids, vec![1, 4]);

    run_err(dir.path(), &["remove", "towns.shp", "--id", "0"]);
}

#[test]
fn missing_files_and_bad_bbox_fail() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = run_err(dir.path(), &["inspect", "nowhere.shp"]);
    assert!(String::from_utf8_lossy(&out.stderr).contains("open nowhere.shp"));

    write_towns(dir.path());
    std::fs::remove_file(dir.path().join("towns.shx")).expect("remove shx");
    run_err(dir.path(), &["features", "towns.shp"]);

    write_towns(dir.path());
    run_err(dir.path(), &["features", "towns.shp", "--bbox", "1,2,3"]);
}
