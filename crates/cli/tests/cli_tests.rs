//! CLI integration tests

use std::io::Write;
use std::path::Path;
use std::process::Command;

fn driftwatch(args: &[&str]) -> std::process::Output {
    let mut full = vec!["run", "-p", "driftwatch-cli", "--quiet", "--"];
    full.extend_from_slice(args);
    Command::new("cargo")
        .args(&full)
        .output()
        .expect("Failed to execute command")
}

fn write_telemetry(dir: &Path, lines: &[&str]) {
    let mut file = std::fs::File::create(dir.join("telemetry.jsonl")).unwrap();
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
}

#[test]
fn test_cli_help() {
    let output = driftwatch(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("drift detection"), "Should show about text");
    assert!(stdout.contains("baseline"), "Should show baseline command");
    assert!(stdout.contains("run"), "Should show run command");
}

#[test]
fn test_cli_version() {
    let output = driftwatch(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("driftwatch"), "Should show binary name");
}

#[test]
fn test_baseline_out_dir_keeps_input_clean() {
    let input = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_telemetry(
        input.path(),
        &[r#"{"ts": "2025-01-01T00:00:00Z", "link_id": "link-1", "errors": 1}"#],
    );

    let output = driftwatch(&[
        "baseline",
        "--input",
        input.path().to_str().unwrap(),
        "--out",
        out.path().to_str().unwrap(),
    ]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(out.path().join("baseline.json").exists());
    assert!(out.path().join("normalized.jsonl").exists());
    assert!(!input.path().join("baseline.json").exists());
}

#[test]
fn test_run_without_baseline_fails() {
    let input = tempfile::tempdir().unwrap();
    let baseline = tempfile::tempdir().unwrap();
    let output_dir = tempfile::tempdir().unwrap();
    write_telemetry(
        input.path(),
        &[r#"{"ts": "2025-01-01T00:30:00Z", "link_id": "link-1", "errors": 1}"#],
    );

    let output = driftwatch(&[
        "run",
        "--input",
        input.path().to_str().unwrap(),
        "--baseline",
        baseline.path().to_str().unwrap(),
        "--output",
        output_dir.path().to_str().unwrap(),
    ]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("baseline.json"), "stderr was: {stderr}");
}

#[test]
fn test_baseline_then_run_produces_outputs() {
    let baseline_dir = tempfile::tempdir().unwrap();
    let run_dir = tempfile::tempdir().unwrap();
    let output_dir = tempfile::tempdir().unwrap();

    write_telemetry(
        baseline_dir.path(),
        &[
            r#"{"ts": "2025-01-01T00:00:00Z", "link_id": "link-1", "errors": 1, "temperature_c": 40.0}"#,
            r#"{"ts": "2025-01-01T00:05:00Z", "link_id": "link-1", "errors": 1, "temperature_c": 40.0}"#,
        ],
    );
    let output = driftwatch(&[
        "baseline",
        "--input",
        baseline_dir.path().to_str().unwrap(),
    ]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(baseline_dir.path().join("baseline.json").exists());
    assert!(baseline_dir.path().join("normalized.jsonl").exists());

    write_telemetry(
        run_dir.path(),
        &[
            r#"{"ts": "2025-01-01T01:00:00Z", "link_id": "link-1", "errors": 6, "temperature_c": 52.0}"#,
            r#"{"ts": "2025-01-01T01:05:00Z", "link_id": "link-1", "errors": 6, "temperature_c": 52.0}"#,
        ],
    );
    let output = driftwatch(&[
        "run",
        "--input",
        run_dir.path().to_str().unwrap(),
        "--baseline",
        baseline_dir.path().to_str().unwrap(),
        "--output",
        output_dir.path().to_str().unwrap(),
    ]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    for artifact in ["run_stats.json", "scores.json", "actions.json", "events.jsonl", "run_meta.json"] {
        assert!(
            output_dir.path().join(artifact).exists(),
            "missing {artifact}"
        );
    }

    let scores: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(output_dir.path().join("scores.json")).unwrap())
            .unwrap();
    let score = &scores.as_array().unwrap()[0];
    assert_eq!(score["entity_id"], "link-1");
    assert_eq!(score["status"], "FAIL");
    let drivers: Vec<String> = score["drivers"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d.as_str().unwrap().to_string())
        .collect();
    assert!(drivers.contains(&"errors_spike".to_string()));
    assert!(drivers.contains(&"temperature_drift".to_string()));

    let actions: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(output_dir.path().join("actions.json")).unwrap())
            .unwrap();
    let kinds: Vec<&str> = actions
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["action"].as_str().unwrap())
        .collect();
    assert!(kinds.contains(&"REROUTE"));
    assert!(kinds.contains(&"RATE_LIMIT"));
    assert!(kinds.contains(&"POWER_THERMAL_CONSTRAINT"));
}
