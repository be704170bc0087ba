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

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_cetsd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn cetsd");
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

fn error_code(value: &serde_json::Value) -> String {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

fn roster() -> serde_json::Value {
    json!([
        { "studentId": "s1", "fullName": "Ada Lovelace" },
        { "studentId": "s2", "fullName": "Grace Hopper" },
        { "studentId": "s3", "fullName": "Katherine Johnson" },
    ])
}

const SHEET: &str = "student_id,full_name,Quiz 1,Final\ns1,Ada Lovelace,7.5,10\ns2,,4,\n";

#[test]
fn preview_stages_rows_and_apply_consumes_the_token() {
    let dir = temp_dir("cetsd-import-apply");
    let sheet_path = dir.join("grades.csv");
    std::fs::write(&sheet_path, SHEET).expect("write sheet");

    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let preview = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "grades.importPreview",
        json!({ "path": sheet_path.to_string_lossy(), "roster": roster() }),
    );
    let token = preview
        .get("token")
        .and_then(|v| v.as_str())
        .expect("token")
        .to_string();
    assert!(!token.is_empty());

    let fingerprint = preview
        .get("fingerprint")
        .and_then(|v| v.as_str())
        .expect("fingerprint")
        .to_string();
    assert_eq!(fingerprint.len(), 64);
    assert!(fingerprint.chars().all(|c| c.is_ascii_hexdigit()));

    assert_eq!(preview.get("columns"), Some(&json!(["Quiz 1", "Final"])));
    assert_eq!(preview.get("rowsTotal").and_then(|v| v.as_u64()), Some(2));
    assert_eq!(preview.get("staged").and_then(|v| v.as_u64()), Some(2));
    assert_eq!(preview.get("rejected").and_then(|v| v.as_u64()), Some(0));
    assert_eq!(preview.get("errors"), Some(&json!([])));
    assert_eq!(preview.get("missingStudentIds"), Some(&json!(["s3"])));

    let staged = preview
        .get("stagedRows")
        .and_then(|v| v.as_array())
        .expect("stagedRows");
    assert_eq!(staged.len(), 2);
    assert_eq!(staged[0].get("line").and_then(|v| v.as_u64()), Some(2));
    assert_eq!(
        staged[0].get("studentId").and_then(|v| v.as_str()),
        Some("s1")
    );
    assert_eq!(
        staged[0].pointer("/grades/Quiz 1").and_then(|v| v.as_f64()),
        Some(7.5)
    );
    assert_eq!(
        staged[0].pointer("/grades/Final").and_then(|v| v.as_f64()),
        Some(10.0)
    );
    // Blank name cell: the roster spelling is staged. Blank grade: null.
    assert_eq!(
        staged[1].get("fullName").and_then(|v| v.as_str()),
        Some("Grace Hopper")
    );
    assert_eq!(staged[1].pointer("/grades/Final"), Some(&json!(null)));

    let applied = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "grades.importApply",
        json!({ "token": token }),
    );
    assert_eq!(applied.get("appliedCount").and_then(|v| v.as_u64()), Some(2));
    assert_eq!(
        applied.get("fingerprint").and_then(|v| v.as_str()),
        Some(fingerprint.as_str())
    );
    assert_eq!(applied.get("columns"), Some(&json!(["Quiz 1", "Final"])));
    let records = applied
        .get("records")
        .and_then(|v| v.as_array())
        .expect("records");
    assert_eq!(
        records[0].get("studentId").and_then(|v| v.as_str()),
        Some("s1")
    );
    assert_eq!(
        records[1].pointer("/grades/Quiz 1").and_then(|v| v.as_f64()),
        Some(4.0)
    );

    // The token is single-use.
    let again = request(
        &mut stdin,
        &mut reader,
        "3",
        "grades.importApply",
        json!({ "token": token }),
    );
    assert_eq!(error_code(&again), "unknown_token");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn edited_sheet_is_refused_then_applies_after_restore() {
    let dir = temp_dir("cetsd-import-edited");
    let sheet_path = dir.join("grades.csv");
    std::fs::write(&sheet_path, SHEET).expect("write sheet");

    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let preview = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "grades.importPreview",
        json!({ "path": sheet_path.to_string_lossy(), "roster": roster() }),
    );
    let token = preview
        .get("token")
        .and_then(|v| v.as_str())
        .expect("token")
        .to_string();
    let fingerprint = preview
        .get("fingerprint")
        .and_then(|v| v.as_str())
        .expect("fingerprint")
        .to_string();

    // Edit the file behind the preview's back.
    std::fs::write(
        &sheet_path,
        "student_id,full_name,Quiz 1,Final\ns1,Ada Lovelace,3,3\n",
    )
    .expect("rewrite sheet");

    let refused = request(
        &mut stdin,
        &mut reader,
        "2",
        "grades.importApply",
        json!({ "token": token }),
    );
    assert_eq!(error_code(&refused), "sheet_changed");
    assert_eq!(
        refused
            .pointer("/error/details/expected")
            .and_then(|v| v.as_str()),
        Some(fingerprint.as_str())
    );
    let actual = refused
        .pointer("/error/details/actual")
        .and_then(|v| v.as_str())
        .expect("actual fingerprint");
    assert_ne!(actual, fingerprint);

    // The preview survives the refusal: restoring the bytes lets the same
    // token apply.
    std::fs::write(&sheet_path, SHEET).expect("restore sheet");
    let applied = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "grades.importApply",
        json!({ "token": token }),
    );
    assert_eq!(applied.get("appliedCount").and_then(|v| v.as_u64()), Some(2));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn unreadable_sheet_fails_apply_but_keeps_the_preview() {
    let dir = temp_dir("cetsd-import-unreadable");
    let sheet_path = dir.join("grades.csv");
    std::fs::write(&sheet_path, SHEET).expect("write sheet");

    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let preview = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "grades.importPreview",
        json!({ "path": sheet_path.to_string_lossy(), "roster": roster() }),
    );
    let token = preview
        .get("token")
        .and_then(|v| v.as_str())
        .expect("token")
        .to_string();

    std::fs::remove_file(&sheet_path).expect("remove sheet");
    let failed = request(
        &mut stdin,
        &mut reader,
        "2",
        "grades.importApply",
        json!({ "token": token }),
    );
    assert_eq!(error_code(&failed), "sheet_read_failed");

    // Same token works once the file is back with the previewed bytes.
    std::fs::write(&sheet_path, SHEET).expect("recreate sheet");
    let applied = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "grades.importApply",
        json!({ "token": token }),
    );
    assert_eq!(applied.get("appliedCount").and_then(|v| v.as_u64()), Some(2));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn discard_releases_the_token() {
    let dir = temp_dir("cetsd-import-discard");
    let sheet_path = dir.join("grades.csv");
    std::fs::write(&sheet_path, SHEET).expect("write sheet");

    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let preview = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "grades.importPreview",
        json!({ "path": sheet_path.to_string_lossy(), "roster": roster() }),
    );
    let token = preview
        .get("token")
        .and_then(|v| v.as_str())
        .expect("token")
        .to_string();

    let discarded = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "grades.importDiscard",
        json!({ "token": token }),
    );
    assert_eq!(discarded.get("ok").and_then(|v| v.as_bool()), Some(true));

    let again = request(
        &mut stdin,
        &mut reader,
        "3",
        "grades.importDiscard",
        json!({ "token": token }),
    );
    assert_eq!(error_code(&again), "unknown_token");

    let apply = request(
        &mut stdin,
        &mut reader,
        "4",
        "grades.importApply",
        json!({ "token": token }),
    );
    assert_eq!(error_code(&apply), "unknown_token");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(&dir);
}
