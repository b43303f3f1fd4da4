use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar(
    subjects: &str,
    export_dir: &PathBuf,
) -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_gradebookd");
    let mut child = Command::new(exe)
        .arg("--subjects")
        .arg(subjects)
        .arg("--export-dir")
        .arg(export_dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn gradebookd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn error_code(value: &serde_json::Value) -> &str {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("gradebook-router-smoke");
    let csv_out = workspace.join("smoke-export.csv");
    let (mut child, mut stdin, mut reader) = spawn_sidecar("数学:20,英語:18", &workspace);

    let calls: Vec<(&str, serde_json::Value)> = vec![
        ("health", json!({})),
        ("subjects.list", json!({})),
        ("subjects.add", json!({ "name": "理科", "totalDays": 16 })),
        ("subjects.updateTotalDays", json!({ "name": "理科", "totalDays": 15 })),
        ("subjects.remove", json!({ "name": "理科" })),
        ("students.nextId", json!({})),
        ("students.create", json!({ "name": "Smoke Student" })),
        ("students.update", json!({ "studentId": "S001", "name": "Renamed" })),
        ("students.list", json!({})),
        (
            "grades.update",
            json!({
                "studentId": "S001",
                "entries": [{ "subject": "数学", "attendedDays": 18, "testScore": 85 }]
            }),
        ),
        ("grades.get", json!({ "studentId": "S001" })),
        (
            "grades.preview",
            json!({ "subject": "数学", "attendedDays": "18", "testScore": "85" }),
        ),
        ("calc.studentSummary", json!({ "studentId": "S001" })),
        ("calc.classStats", json!({})),
        ("calc.scoreToGrade", json!({ "score": 75 })),
        ("exchange.exportCsv", json!({ "outPath": csv_out.to_string_lossy() })),
        ("exchange.importCsv", json!({ "inPath": csv_out.to_string_lossy() })),
        ("students.delete", json!({ "studentId": "S001" })),
    ];

    for (i, (method, params)) in calls.into_iter().enumerate() {
        let id = (i + 1).to_string();
        let value = request(&mut stdin, &mut reader, &id, method, params);
        assert_ne!(
            error_code(&value),
            "not_implemented",
            "unexpected unknown method for {}",
            method
        );
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(true),
            "{} failed: {}",
            method,
            value
        );
    }

    let unknown = request(&mut stdin, &mut reader, "99", "seating.get", json!({}));
    assert_eq!(error_code(&unknown), "not_implemented");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn malformed_line_gets_bad_json_and_session_continues() {
    let workspace = temp_dir("gradebook-bad-json");
    let (mut child, mut stdin, mut reader) = spawn_sidecar("数学:20", &workspace);

    writeln!(stdin, "{{not json").expect("write garbage");
    stdin.flush().expect("flush");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read response");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("json");
    assert_eq!(value.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(error_code(&value), "bad_json");

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(health.get("subjectCount").and_then(|v| v.as_u64()), Some(1));
    assert_eq!(health.get("studentCount").and_then(|v| v.as_u64()), Some(0));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
