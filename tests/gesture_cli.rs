use std::path::PathBuf;
use std::process::Command;

use serde_json::Value;

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_gesture_cli"))
}

fn temp_file(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("gesture-cli-{}-{}", std::process::id(), name))
}

fn json_lines(stdout: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(stdout)
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect()
}

#[test]
fn simulate_outputs_outcomes_and_snapshot() {
    let output = cli()
        .args(["simulate", "--pattern", "cw", "--duration-ms", "2000"])
        .output()
        .expect("simulate command");

    assert!(
        output.status.success(),
        "simulate exited with {:?}",
        output.status.code()
    );
    let lines = json_lines(&output.stdout);
    let (snapshot, outcomes) = lines.split_last().expect("at least one line");

    assert_eq!(outcomes.len(), 100);
    assert_eq!(outcomes[0]["outcome"], "skipped");
    assert_eq!(outcomes[0]["reason"], "first_sample");

    let last = &outcomes[outcomes.len() - 1];
    assert_eq!(last["outcome"], "playback");
    assert_eq!(last["direction"], -1);
    assert_eq!(snapshot["direction_changes"], 1);
}

#[test]
fn replay_reads_jsonl_capture() {
    let input = temp_file("replay.jsonl");
    let lines: Vec<String> = (0..20)
        .map(|i| {
            format!(
                r#"{{"channel":"left","angularVelocityDps":45.0,"timestampMs":{}}}"#,
                i * 20
            )
        })
        .collect();
    std::fs::write(&input, lines.join("\n")).expect("write capture");

    let output = cli()
        .args(["replay", "--input", input.to_str().unwrap()])
        .output()
        .expect("replay command");
    let _ = std::fs::remove_file(&input);

    assert!(output.status.success(), "replay exited with {:?}", output.status.code());
    let lines = json_lines(&output.stdout);
    assert!(lines
        .iter()
        .any(|line| line["outcome"] == "volume" && line["channel"] == "left"));
}

#[test]
fn inspect_calibration_reports_missing_file() {
    let missing = temp_file("missing-calibration.json");
    let output = cli()
        .args(["inspect-calibration", "--file", missing.to_str().unwrap()])
        .output()
        .expect("inspect command");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no calibration stored"), "stderr: {stderr}");
}
