use serde_json::{Value, json};
use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn run_cli(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_arpes-rs"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("arpes-rs should launch")
}

fn linspace(start: f64, stop: f64, count: usize) -> Vec<f64> {
    let step = (stop - start) / (count - 1) as f64;
    (0..count).map(|index| start + step * index as f64).collect()
}

fn write_cut(dir: &Path, name: &str, attrs: Value) -> String {
    let energies = vec![-0.1, 0.0];
    let phi = linspace(-0.2, 0.2, 21);
    let values: Vec<f64> = energies
        .iter()
        .flat_map(|energy| phi.iter().map(move |angle| 100.0 * (-(angle - energy).powi(2) / 0.01).exp()))
        .collect();
    let document = json!({
        "dims": [
            { "name": "eV", "values": energies },
            { "name": "phi", "values": phi },
        ],
        "values": values,
        "attrs": attrs,
    });
    let path = dir.join(name);
    fs::write(&path, serde_json::to_string(&document).expect("serialize")).expect("write cut");
    path.to_string_lossy().into_owned()
}

fn write_map(dir: &Path) -> String {
    let phi = linspace(-0.3, 0.05, 36);
    let psi = linspace(-0.12, 0.12, 25);
    let values: Vec<f64> = phi
        .iter()
        .flat_map(|angle| {
            psi.iter()
                .map(move |deflection| 200.0 * (-((angle + 0.13).powi(2) + deflection.powi(2)) / 0.002).exp())
        })
        .collect();
    let document = json!({
        "dims": [
            { "name": "eV", "values": [0.0] },
            { "name": "phi", "values": phi },
            { "name": "psi", "values": psi },
        ],
        "values": values,
        "attrs": { "hv": 21.2, "theta": -0.1 },
    });
    let path = dir.join("map.json");
    fs::write(&path, serde_json::to_string(&document).expect("serialize")).expect("write map");
    path.to_string_lossy().into_owned()
}

fn read_output(path: &Path) -> Value {
    let source = fs::read_to_string(path).expect("output should exist");
    serde_json::from_str(&source).expect("output should be JSON")
}

fn dim_names(document: &Value) -> Vec<String> {
    document["dims"]
        .as_array()
        .expect("dims array")
        .iter()
        .map(|dim| dim["name"].as_str().expect("dim name").to_string())
        .collect()
}

#[test]
fn convert_writes_momentum_document() {
    let temp = TempDir::new().expect("tempdir");
    let input = write_cut(temp.path(), "cut.json", json!({ "hv": 21.2, "sample": "Bi2Se3" }));
    let output = temp.path().join("out/kspace.json");

    let result = run_cli(&[
        "convert",
        "--input",
        &input,
        "--output",
        output.to_str().expect("utf-8 path"),
        "--grid",
        "kp=-0.3:0.3:31",
    ]);
    assert_eq!(result.status.code(), Some(0), "stderr: {}", String::from_utf8_lossy(&result.stderr));
    assert!(String::from_utf8_lossy(&result.stdout).contains("eV[2] x kp[31]"));

    let document = read_output(&output);
    assert_eq!(dim_names(&document), vec!["eV", "kp"]);
    assert_eq!(document["values"].as_array().expect("values").len(), 62);
    assert_eq!(document["attrs"]["sample"], json!("Bi2Se3"));
}

#[test]
fn missing_photon_energy_is_a_missing_coordinate() {
    let temp = TempDir::new().expect("tempdir");
    let input = write_cut(temp.path(), "cut.json", json!({}));
    let output = temp.path().join("kspace.json");

    let result = run_cli(&["convert", "--input", &input, "--output", output.to_str().expect("utf-8 path")]);
    assert_eq!(result.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&result.stderr).contains("ERROR: [INPUT.GEOMETRY_ATTR]"));
    assert!(!output.exists());
}

#[test]
fn degenerate_grid_is_a_grid_error() {
    let temp = TempDir::new().expect("tempdir");
    let input = write_cut(temp.path(), "cut.json", json!({ "hv": 21.2 }));
    let output = temp.path().join("kspace.json");

    let result = run_cli(&[
        "convert",
        "--input",
        &input,
        "--output",
        output.to_str().expect("utf-8 path"),
        "--grid",
        "kp=0.3..-0.3@0.01",
    ]);
    assert_eq!(result.status.code(), Some(4));
    assert!(String::from_utf8_lossy(&result.stderr).contains("ERROR: ["));
}

#[test]
fn malformed_grid_and_unknown_format_are_input_errors() {
    let temp = TempDir::new().expect("tempdir");
    let input = write_cut(temp.path(), "cut.json", json!({ "hv": 21.2 }));
    let output = temp.path().join("kspace.json");
    let output = output.to_str().expect("utf-8 path");

    let result = run_cli(&["convert", "--input", &input, "--output", output, "--grid", "kp=0:1"]);
    assert_eq!(result.status.code(), Some(6));
    assert!(String::from_utf8_lossy(&result.stderr).contains("ERROR: [INPUT.CLI_USAGE]"));

    let text_input = temp.path().join("cut.txt");
    fs::write(&text_input, "phi intensity\n").expect("write text");
    let result = run_cli(&[
        "convert",
        "--input",
        text_input.to_str().expect("utf-8 path"),
        "--output",
        output,
    ]);
    assert_eq!(result.status.code(), Some(6));
    assert!(String::from_utf8_lossy(&result.stderr).contains("ERROR: [INPUT.FORMAT]"));
}

#[test]
fn missing_settings_file_has_its_own_diagnostic() {
    let temp = TempDir::new().expect("tempdir");
    let input = write_cut(temp.path(), "cut.json", json!({ "hv": 21.2 }));
    let output = temp.path().join("kspace.json");
    let settings = temp.path().join("absent-settings.json");

    let result = run_cli(&[
        "convert",
        "--input",
        &input,
        "--output",
        output.to_str().expect("utf-8 path"),
        "--settings",
        settings.to_str().expect("utf-8 path"),
    ]);
    assert_eq!(result.status.code(), Some(7));
    assert!(String::from_utf8_lossy(&result.stderr).contains("ERROR: [IO.SETTINGS_READ]"));
    assert!(!output.exists());
}

#[test]
fn through_point_records_solved_offsets() {
    let temp = TempDir::new().expect("tempdir");
    let input = write_map(temp.path());
    let output = temp.path().join("slice.json");

    let result = run_cli(&[
        "through-point",
        "--input",
        &input,
        "--output",
        output.to_str().expect("utf-8 path"),
        "--point",
        "phi=-0.13,theta=-0.1",
        "--through",
        "ky=-0.4:0.4:41",
        "--transverse",
        "kx=-0.02:0.02:5",
    ]);
    assert_eq!(result.status.code(), Some(0), "stderr: {}", String::from_utf8_lossy(&result.stderr));

    let document = read_output(&output);
    assert_eq!(dim_names(&document), vec!["eV", "ky"]);
    let theta_offset = document["attrs"]["theta_offset"].as_f64().expect("theta offset");
    assert!((theta_offset + 0.23).abs() < 1.0e-8, "{theta_offset}");
}

#[test]
fn help_exits_cleanly() {
    let result = run_cli(&["--help"]);
    assert_eq!(result.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&result.stdout);
    assert!(stdout.contains("convert"));
    assert!(stdout.contains("through-point"));
}
