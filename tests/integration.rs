use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use std::time::Duration;
use tempfile::TempDir;

fn ghgf_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("ghgf");
    path
}

fn col_letter(col: usize) -> char {
    (b'A' + col as u8) as char
}

/// Builds a minimal xlsx in memory: one worksheet, inline-string cells.
/// Only the parts our reader consults are written.
fn build_workbook(sheet_name: &str, rows: &[(u32, Vec<Option<String>>)]) -> Vec<u8> {
    let mut sheet = String::from(r#"<?xml version="1.0"?><worksheet><sheetData>"#);
    for (number, cells) in rows {
        sheet.push_str(&format!(r#"<row r="{}">"#, number));
        for (col, cell) in cells.iter().enumerate() {
            if let Some(value) = cell {
                sheet.push_str(&format!(
                    r#"<c r="{}{}" t="inlineStr"><is><t>{}</t></is></c>"#,
                    col_letter(col),
                    number,
                    value.replace('&', "&amp;").replace('<', "&lt;"),
                ));
            }
        }
        sheet.push_str("</row>");
    }
    sheet.push_str("</sheetData></worksheet>");

    let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    zip.start_file("xl/workbook.xml", options).unwrap();
    write!(
        zip,
        r#"<?xml version="1.0"?><workbook><sheets><sheet name="{}" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
        sheet_name
    )
    .unwrap();
    zip.start_file("xl/_rels/workbook.xml.rels", options).unwrap();
    write!(
        zip,
        r#"<?xml version="1.0"?><Relationships><Relationship Id="rId1" Type="worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#
    )
    .unwrap();
    zip.start_file("xl/worksheets/sheet1.xml", options).unwrap();
    write!(zip, "{}", sheet).unwrap();
    zip.finish().unwrap().into_inner()
}

fn s(value: &str) -> Option<String> {
    Some(value.to_string())
}

fn factor_row(
    number: u32,
    id: Option<&str>,
    scope: &str,
    levels: [&str; 4],
    uom: &str,
    factor: Option<&str>,
) -> (u32, Vec<Option<String>>) {
    let cells = vec![
        id.map(str::to_string),
        s(scope),
        if levels[0].is_empty() { None } else { s(levels[0]) },
        if levels[1].is_empty() { None } else { s(levels[1]) },
        if levels[2].is_empty() { None } else { s(levels[2]) },
        if levels[3].is_empty() { None } else { s(levels[3]) },
        s("Total"),
        s(uom),
        s("kg CO2e"),
        factor.map(str::to_string),
    ];
    (number, cells)
}

/// The fixture sheet: a banner row, a header row, three named records, one
/// row missing its factor, one row missing its id, and 25 homeworking
/// records for pagination.
fn fixture_rows() -> Vec<(u32, Vec<Option<String>>)> {
    let mut rows = vec![
        (1, vec![s("UK Government GHG Conversion Factors 2025")]),
        (
            5,
            vec![
                s("ID"),
                s("Scope"),
                s("Level 1"),
                s("Level 2"),
                s("Level 3"),
                s("Level 4"),
                s("Column Text"),
                s("UOM"),
                s("GHG/Unit"),
                s("GHG Conversion Factor 2025"),
            ],
        ),
        factor_row(
            6,
            Some("1.1"),
            "Scope 1",
            ["Fuels", "Liquid fuels", "Diesel (average biofuel blend)", ""],
            "litres",
            Some("2.31"),
        ),
        factor_row(
            7,
            Some("2.1"),
            "Scope 2",
            ["UK electricity", "Electricity generated", "", ""],
            "kWh",
            Some("0.207"),
        ),
        factor_row(
            8,
            Some("3.1"),
            "Scope 3",
            ["Business travel- air", "Flights", "", ""],
            "passenger.km",
            Some("0.15"),
        ),
        factor_row(
            9,
            Some("4.1"),
            "Scope 3",
            ["Water supply", "", "", ""],
            "cubic metres",
            None,
        ),
        factor_row(10, None, "Scope 1", ["Fuels", "", "", ""], "litres", Some("1.0")),
    ];
    for i in 1..=25u32 {
        let factor = format!("{}", f64::from(i) * 0.01);
        rows.push(factor_row(
            10 + i,
            Some(&format!("H{}", i)),
            "Scope 3",
            ["Homeworking", "", "", ""],
            "FTE",
            Some(&factor),
        ));
    }
    rows
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let workbook = build_workbook("Factors by Category", &fixture_rows());
    fs::write(root.join("flat-file.xlsx"), workbook).unwrap();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let config_content = format!(
        r#"[source]
workbook = "{root}/flat-file.xlsx"
url = "https://www.gov.uk/government/publications/greenhouse-gas-reporting-conversion-factors-2025"
sheet = "Factors by Category"
header_rows = 5
description = "UK Government GHG Conversion Factors 2025"
year = 2025

[data]
factors = "{root}/data/conversion_factors_2025.json"
changes = "{root}/data/major_changes_2025.json"

[server]
bind = "127.0.0.1:17893"
default_per_page = 50
max_per_page = 1000
"#,
        root = root.display()
    );
    let config_path = config_dir.join("ghgf.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_ghgf(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = ghgf_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run ghgf binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_parse_extracts_and_warns() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_ghgf(&config_path, &["parse"]);
    assert!(success, "parse failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("factors extracted: 28"), "stdout: {}", stdout);
    assert!(stdout.contains("rows skipped: 2"), "stdout: {}", stdout);
    assert!(stdout.contains("ok"));
    assert!(stderr.contains("warning: skipping row 9"), "stderr: {}", stderr);
    assert!(stderr.contains("warning: skipping row 10"), "stderr: {}", stderr);

    let artifact = tmp.path().join("data/conversion_factors_2025.json");
    assert!(artifact.exists());
    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&artifact).unwrap()).unwrap();
    assert_eq!(json["metadata"]["total_factors"], 28);
    assert_eq!(json["metadata"]["year"], 2025);
    assert_eq!(json["metadata"]["categories"]["Homeworking"], 25);
    assert_eq!(json["metadata"]["scopes"]["Scope 3"], 26);
    assert_eq!(json["conversion_factors"][0]["id"], "1.1");
    assert_eq!(json["conversion_factors"][0]["conversion_factor"], 2.31);

    // Top category first in the serialized object.
    let categories = json["metadata"]["categories"].as_object().unwrap();
    assert_eq!(categories.keys().next().unwrap(), "Homeworking");
}

#[test]
fn test_parse_is_idempotent_modulo_timestamp() {
    let (tmp, config_path) = setup_test_env();
    let artifact = tmp.path().join("data/conversion_factors_2025.json");

    let (_, _, success) = run_ghgf(&config_path, &["parse"]);
    assert!(success);
    let first: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&artifact).unwrap()).unwrap();

    let (_, _, success) = run_ghgf(&config_path, &["parse"]);
    assert!(success);
    let second: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&artifact).unwrap()).unwrap();

    assert_eq!(first["conversion_factors"], second["conversion_factors"]);
    assert_eq!(
        first["metadata"]["categories"],
        second["metadata"]["categories"]
    );
}

#[test]
fn test_summary_prints_statistics() {
    let (_tmp, config_path) = setup_test_env();
    run_ghgf(&config_path, &["parse"]);

    let (stdout, stderr, success) = run_ghgf(&config_path, &["summary"]);
    assert!(success, "summary failed: {}", stderr);
    assert!(stdout.contains("total factors: 28"), "stdout: {}", stdout);
    assert!(stdout.contains("Homeworking"));
    assert!(stdout.contains("Scope 1"));
}

#[test]
fn test_get_by_id() {
    let (_tmp, config_path) = setup_test_env();
    run_ghgf(&config_path, &["parse"]);

    let (stdout, _, success) = run_ghgf(&config_path, &["get", "1.1"]);
    assert!(success);
    assert!(stdout.contains("conversion_factor: 2.31"), "stdout: {}", stdout);
    assert!(stdout.contains("Fuels"));

    let (_, stderr, success) = run_ghgf(&config_path, &["get", "no-such-id"]);
    assert!(!success);
    assert!(stderr.contains("not found"), "stderr: {}", stderr);
}

#[test]
fn test_search_cli() {
    let (_tmp, config_path) = setup_test_env();
    run_ghgf(&config_path, &["parse"]);

    let (stdout, _, success) = run_ghgf(&config_path, &["search", "diesel"]);
    assert!(success);
    assert!(stdout.contains("1.1"), "stdout: {}", stdout);

    let (stdout, _, success) =
        run_ghgf(&config_path, &["search", "--scope", "Scope 2"]);
    assert!(success);
    assert!(stdout.contains("2.1"), "stdout: {}", stdout);

    // No criteria at all is a usage error.
    let (_, _, success) = run_ghgf(&config_path, &["search"]);
    assert!(!success);
}

#[test]
fn test_parse_fails_without_workbook() {
    let (tmp, config_path) = setup_test_env();
    fs::remove_file(tmp.path().join("flat-file.xlsx")).unwrap();

    let (_, stderr, success) = run_ghgf(&config_path, &["parse"]);
    assert!(!success);
    assert!(stderr.contains("workbook"), "stderr: {}", stderr);
}

#[test]
fn test_serve_fails_without_artifact() {
    let (_tmp, config_path) = setup_test_env();

    // No parse has run, so the artifact is missing: startup must fail.
    let (_, stderr, success) = run_ghgf(&config_path, &["serve"]);
    assert!(!success);
    assert!(stderr.contains("artifact"), "stderr: {}", stderr);
}

struct KillOnDrop(Child);

impl Drop for KillOnDrop {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

#[test]
fn test_server_round_trip() {
    let (_tmp, config_path) = setup_test_env();
    run_ghgf(&config_path, &["parse"]);

    let child = Command::new(ghgf_binary())
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .arg("serve")
        .spawn()
        .unwrap();
    let _guard = KillOnDrop(child);

    let base = "http://127.0.0.1:17893";
    let client = reqwest::blocking::Client::new();

    // Wait for the server to come up.
    let mut health = None;
    for _ in 0..50 {
        if let Ok(resp) = client.get(format!("{}/health", base)).send() {
            health = Some(resp);
            break;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    let health = health.expect("server did not start");
    let health: serde_json::Value = health.json().unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["factors_loaded"], 28);

    let root: serde_json::Value = client
        .get(base)
        .send()
        .unwrap()
        .json()
        .unwrap();
    assert_eq!(root["status"], "ok");
    assert_eq!(root["total_factors"], 28);
    assert_eq!(root["year"], 2025);

    // Paged list: page 2 of the 25 homeworking records.
    let page: serde_json::Value = client
        .get(format!(
            "{}/factors?category=Homeworking&page=2&per_page=10",
            base
        ))
        .send()
        .unwrap()
        .json()
        .unwrap();
    assert_eq!(page["total"], 25);
    assert_eq!(page["page"], 2);
    assert_eq!(page["per_page"], 10);
    let factors = page["factors"].as_array().unwrap();
    assert_eq!(factors.len(), 10);
    assert_eq!(factors[0]["id"], "H11");
    assert_eq!(factors[9]["id"], "H20");

    // Advanced search with inclusive bounds.
    let hits: serde_json::Value = client
        .post(format!("{}/search", base))
        .json(&serde_json::json!({ "min_factor": 2.31, "max_factor": 2.31 }))
        .send()
        .unwrap()
        .json()
        .unwrap();
    assert_eq!(hits["total"], 1);
    assert_eq!(hits["factors"][0]["id"], "1.1");

    // Out-of-range paging is a client error.
    let bad = client
        .get(format!("{}/factors?per_page=5000", base))
        .send()
        .unwrap();
    assert_eq!(bad.status().as_u16(), 400);
    let bad: serde_json::Value = bad.json().unwrap();
    assert_eq!(bad["error"]["code"], "bad_request");

    // Single record lookup, hit and miss.
    let factor: serde_json::Value = client
        .get(format!("{}/factors/2.1", base))
        .send()
        .unwrap()
        .json()
        .unwrap();
    assert_eq!(factor["scope"], "Scope 2");

    let miss = client
        .get(format!("{}/factors/no-such-id", base))
        .send()
        .unwrap();
    assert_eq!(miss.status().as_u16(), 404);
    let miss: serde_json::Value = miss.json().unwrap();
    assert_eq!(miss["error"]["code"], "not_found");

    // Quick lookup: the UK electricity record qualifies (Scope 2 + uk tag).
    let quick: serde_json::Value = client
        .get(format!("{}/quick-lookup?electricity=true", base))
        .send()
        .unwrap()
        .json()
        .unwrap();
    let ids: Vec<&str> = quick["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&"2.1"), "ids: {:?}", ids);
    assert!(!ids.contains(&"3.1"));

    // Changes artifact is absent: placeholder, not an error.
    let changes: serde_json::Value = client
        .get(format!("{}/major-changes", base))
        .send()
        .unwrap()
        .json()
        .unwrap();
    assert_eq!(
        changes["metadata"]["title"],
        "No major changes data available"
    );
    assert_eq!(changes["major_changes"].as_array().unwrap().len(), 0);

    // Category summary reflects the fixture.
    let categories: serde_json::Value = client
        .get(format!("{}/categories", base))
        .send()
        .unwrap()
        .json()
        .unwrap();
    assert_eq!(categories["categories"]["Homeworking"], 25);
    assert_eq!(categories["scopes"]["Scope 2"], 1);
}
