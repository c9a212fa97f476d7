use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
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

fn spawn_sidecar(args: &[&str]) -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_conduitd");
    let mut child = Command::new(exe)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn conduitd");
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

fn record(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    student: &str,
    subject: &str,
    score: u8,
) -> serde_json::Value {
    request_ok(
        stdin,
        reader,
        id,
        "assessments.record",
        json!({
            "form": {
                "studentName": student,
                "subject": subject,
                "gradeLevel": "5",
                "assessmentDate": "2024-04-02",
                "workContent": "Short written response",
            },
            "results": {
                "overallScore": score,
                "strengths": ["Clear reasoning"],
                "areasForGrowth": ["Show all steps"],
                "recommendations": ["Practice multi-step problems"]
            }
        }),
    )
}

fn select(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>, workspace: &Path) {
    let _ = request_ok(
        stdin,
        reader,
        "select",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
}

#[test]
fn export_then_replace_import_restores_an_equal_document() {
    let workspace = temp_dir("conduit-exchange-src");
    let workspace2 = temp_dir("conduit-exchange-dst");
    let out_dir = temp_dir("conduit-exchange-out");

    let (mut child, mut stdin, mut reader) = spawn_sidecar(&[]);
    select(&mut stdin, &mut reader, &workspace);
    record(&mut stdin, &mut reader, "r1", "Maya", "math", 72);
    record(&mut stdin, &mut reader, "r2", "Leo", "science", 91);
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "p1",
        "profile.save",
        json!({ "name": "Ms. Rivera", "school": "Eastside", "email": "rivera@example.org" }),
    );
    let before = request_ok(&mut stdin, &mut reader, "g1", "document.get", json!({}));

    let exported = request_ok(
        &mut stdin,
        &mut reader,
        "e1",
        "data.export",
        json!({ "outDir": out_dir.to_string_lossy() }),
    );
    let path = exported["path"].as_str().expect("export path").to_string();
    assert!(path.contains("conduit-all-data-"), "{path}");
    let on_disk: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).expect("read export")).expect("json");
    assert!(on_disk.get("exportDate").is_some());

    // Restore into a fresh workspace.
    select(&mut stdin, &mut reader, &workspace2);
    let check = request_ok(
        &mut stdin,
        &mut reader,
        "v1",
        "data.validateImport",
        json!({ "path": path }),
    );
    assert_eq!(check["valid"], true);
    assert_eq!(check["assessmentCount"], 2);
    assert_eq!(check["studentCount"], 2);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "i1",
        "data.import",
        json!({ "path": path, "strategy": "replace" }),
    );
    let after = request_ok(&mut stdin, &mut reader, "g2", "document.get", json!({}));
    assert_eq!(before["document"], after["document"]);
    assert!(after["document"].get("exportDate").is_none());

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn too_old_version_is_rejected_and_document_is_untouched() {
    let workspace = temp_dir("conduit-exchange-old");

    let (mut child, mut stdin, mut reader) = spawn_sidecar(&[]);
    select(&mut stdin, &mut reader, &workspace);
    record(&mut stdin, &mut reader, "r1", "Maya", "math", 80);
    let before = request_ok(&mut stdin, &mut reader, "g1", "document.get", json!({}));

    let candidate = json!({
        "version": "1.4.0",
        "assessments": [],
        "students": ["Someone"],
        "settings": {},
        "profile": {}
    });
    for strategy in ["merge", "replace"] {
        let resp = request(
            &mut stdin,
            &mut reader,
            strategy,
            "data.import",
            json!({ "document": candidate, "strategy": strategy }),
        );
        assert_eq!(resp["ok"], false);
        assert_eq!(resp["error"]["code"], "import_invalid");
        assert_eq!(resp["error"]["details"]["reason"], "version_too_old");
    }

    let check = request_ok(
        &mut stdin,
        &mut reader,
        "v1",
        "data.validateImport",
        json!({ "document": candidate }),
    );
    assert_eq!(check["valid"], false);
    assert_eq!(check["reason"], "version_too_old");
    assert_eq!(check["studentCount"], 1);

    let missing = request(
        &mut stdin,
        &mut reader,
        "m1",
        "data.import",
        json!({
            "document": { "version": "2.0.0", "assessments": [], "students": [], "settings": {} },
            "strategy": "merge"
        }),
    );
    assert_eq!(missing["error"]["details"]["reason"], "missing_field");
    assert_eq!(missing["error"]["details"]["field"], "profile");

    let after = request_ok(&mut stdin, &mut reader, "g2", "document.get", json!({}));
    assert_eq!(before, after);

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn merge_import_skips_known_ids_and_unions_students() {
    let workspace = temp_dir("conduit-exchange-merge");

    let (mut child, mut stdin, mut reader) = spawn_sidecar(&[]);
    select(&mut stdin, &mut reader, &workspace);
    let first = record(&mut stdin, &mut reader, "r1", "Maya", "math", 64);
    let existing = first["assessment"].clone();

    let mut duplicate = existing.clone();
    duplicate["results"]["overallScore"] = json!(99);
    let candidate = json!({
        "version": "2.1.0",
        "assessments": [
            duplicate,
            {
                "id": "imported-1",
                "date": "2024-02-11",
                "studentName": "Ana",
                "subject": "ela",
                "gradeLevel": "5",
                "results": { "overallScore": 93 },
                "timestamp": "2024-02-11T15:00:00Z"
            }
        ],
        "students": ["Ana", "Maya"],
        "settings": { "autoSave": true, "darkMode": true, "notifications": false },
        "profile": { "name": "Imported", "school": "", "email": "" }
    });

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "i1",
        "data.import",
        json!({ "document": candidate, "strategy": "merge" }),
    );
    assert_eq!(result["assessmentCount"], 2);
    assert_eq!(result["studentCount"], 2);

    let doc = request_ok(&mut stdin, &mut reader, "g1", "document.get", json!({}))["document"].clone();
    let assessments = doc["assessments"].as_array().expect("assessments");
    assert_eq!(assessments[0]["results"]["overallScore"], 64);
    assert_eq!(assessments[1]["id"], "imported-1");
    assert_eq!(doc["students"], json!(["Maya", "Ana"]));
    assert_eq!(doc["settings"]["darkMode"], true);
    assert_eq!(doc["profile"]["name"], "Imported");
    assert_eq!(doc["version"], "2.1.0");

    let backup = request_ok(
        &mut stdin,
        &mut reader,
        "b1",
        "data.backup",
        json!({ "outDir": workspace.join("out").to_string_lossy() }),
    );
    let path = backup["path"].as_str().expect("backup path");
    assert!(path.contains("conduit-backup-"), "{path}");
    let on_disk: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(path).expect("read backup")).expect("json");
    assert_eq!(on_disk["version"], "2.0.0");
    assert!(on_disk.get("backupDate").is_some());

    let student = request_ok(
        &mut stdin,
        &mut reader,
        "s1",
        "data.exportStudent",
        json!({ "studentName": "Ana", "outDir": workspace.join("out").to_string_lossy() }),
    );
    assert_eq!(student["assessmentCount"], 1);
    let on_disk: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(student["path"].as_str().expect("student path"))
            .expect("read student export"),
    )
    .expect("json");
    assert_eq!(on_disk["student"], "Ana");
    assert_eq!(on_disk["assessments"][0]["id"], "imported-1");

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn clear_writes_emergency_backup_then_resets() {
    let workspace = temp_dir("conduit-exchange-clear");
    let out_dir = workspace.join("safety");

    let (mut child, mut stdin, mut reader) = spawn_sidecar(&[]);
    select(&mut stdin, &mut reader, &workspace);

    let empty_export = request(
        &mut stdin,
        &mut reader,
        "e0",
        "data.export",
        json!({ "outDir": out_dir.to_string_lossy() }),
    );
    assert_eq!(empty_export["error"]["code"], "no_data");

    record(&mut stdin, &mut reader, "r1", "Maya", "math", 77);
    let cleared = request_ok(
        &mut stdin,
        &mut reader,
        "c1",
        "data.clear",
        json!({ "outDir": out_dir.to_string_lossy() }),
    );
    let backup_path = cleared["emergencyBackupPath"]
        .as_str()
        .expect("emergency backup path");
    assert!(backup_path.contains("emergency-backup-"));
    let backup: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(backup_path).expect("read backup"))
            .expect("backup json");
    assert_eq!(backup["backupReason"], "Pre-clear emergency backup");
    assert_eq!(backup["assessments"].as_array().map(|a| a.len()), Some(1));

    let stats = request_ok(&mut stdin, &mut reader, "s1", "data.stats", json!({}));
    assert_eq!(stats["totalAssessments"], 0);
    assert_eq!(stats["totalStudents"], 0);

    // Nothing left to lose, so no second backup.
    let again = request_ok(
        &mut stdin,
        &mut reader,
        "c2",
        "data.clear",
        json!({ "outDir": out_dir.to_string_lossy() }),
    );
    assert!(again["emergencyBackupPath"].is_null());

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn quota_rejection_keeps_previous_document() {
    let workspace = temp_dir("conduit-exchange-quota");

    let (mut child, mut stdin, mut reader) = spawn_sidecar(&["--storage-quota", "1200"]);
    select(&mut stdin, &mut reader, &workspace);
    record(&mut stdin, &mut reader, "r1", "Maya", "math", 70);
    let before = request_ok(&mut stdin, &mut reader, "g1", "document.get", json!({}));

    let mut last = json!(null);
    for i in 0..20 {
        let resp = request(
            &mut stdin,
            &mut reader,
            &format!("fill-{i}"),
            "assessments.record",
            json!({
                "form": {
                    "studentName": format!("Student {i}"),
                    "subject": "science",
                    "workContent": "lab notes"
                },
                "results": { "overallScore": 50 }
            }),
        );
        if resp["ok"] == false {
            last = resp;
            break;
        }
    }
    assert_eq!(last["error"]["code"], "storage_quota_exceeded", "{last}");

    let stats = request_ok(&mut stdin, &mut reader, "s1", "data.stats", json!({}));
    assert_eq!(stats["quotaBytes"], 1200);
    let after = request_ok(&mut stdin, &mut reader, "g2", "document.get", json!({}));
    // Only successfully saved records are visible.
    let kept = after["document"]["assessments"].as_array().map(|a| a.len()).unwrap_or(0);
    assert!(kept >= 1);
    assert_eq!(
        after["document"]["assessments"][0],
        before["document"]["assessments"][0]
    );

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn replace_import_stores_the_candidate_as_supplied() {
    let workspace = temp_dir("conduit-exchange-verbatim");

    let (mut child, mut stdin, mut reader) = spawn_sidecar(&[]);
    select(&mut stdin, &mut reader, &workspace);
    record(&mut stdin, &mut reader, "r1", "Maya", "math", 70);

    let candidate = json!({
        "version": "2.0.0",
        "assessments": [{
            "id": "legacy-7",
            "date": "2024-01-15",
            "studentName": "Ana",
            "subject": "math",
            "gradeLevel": "4",
            "workDescription": "fractions worksheet",
            "results": { "overallScore": null, "strengths": ["Persistence"] },
            "timestamp": "2024-01-15T14:03:00.000Z"
        }],
        "students": ["Ana"],
        "settings": { "autoSave": true, "darkMode": false, "notifications": true },
        "profile": { "name": "", "school": "", "email": "" },
        "templates": [],
        "exportDate": "2024-01-16T08:00:00.000Z"
    });
    let mut expected = candidate.clone();
    expected.as_object_mut().expect("object").remove("exportDate");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "i1",
        "data.import",
        json!({ "document": candidate, "strategy": "replace" }),
    );
    let after = request_ok(&mut stdin, &mut reader, "g1", "document.get", json!({}));
    assert_eq!(after["document"], expected);

    // Typed readers see the null score as zero.
    let class = request_ok(&mut stdin, &mut reader, "c1", "analytics.class", json!({}));
    assert_eq!(class["averageScore"], 0);
    assert_eq!(class["totalAssessments"], 1);

    drop(stdin);
    let _ = child.wait();
}
