use serde_json::json;

mod common;
use common::{request, request_ok, seed_class, spawn_sidecar, temp_dir};

#[test]
fn workspace_bundle_roundtrips_marks_into_a_fresh_workspace() {
    let source_ws = temp_dir("rollcall-backup-src");
    let target_ws = temp_dir("rollcall-backup-dst");
    let bundle = source_ws.join("term.rcbackup.zip");

    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let (class_id, student_ids) = seed_class(
        &mut stdin,
        &mut reader,
        &source_ws,
        &[("Aarav Sharma", "21BCE001"), ("Vivaan Singh", "21BCE002")],
    );

    let opened = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "sessions.open",
        json!({ "classId": class_id, "date": "2024-11-25" }),
    );
    let session_id = opened.get("sessionId").and_then(|v| v.as_str()).unwrap().to_string();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "attendance.mark",
        json!({ "sessionId": session_id, "studentId": student_ids[0] }),
    );

    let exported = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "backup.exportWorkspaceBundle",
        json!({ "outPath": bundle.to_string_lossy() }),
    );
    assert_eq!(
        exported.get("bundleFormat").and_then(|v| v.as_str()),
        Some("rollcall-workspace-v1")
    );
    assert!(bundle.is_file());

    // Import into an empty workspace and confirm the ledger came across.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "workspace.select",
        json!({ "path": target_ws.to_string_lossy() }),
    );
    let imported = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "backup.importWorkspaceBundle",
        json!({ "inPath": bundle.to_string_lossy() }),
    );
    assert_eq!(
        imported
            .get("bundleFormatDetected")
            .and_then(|v| v.as_str()),
        Some("rollcall-workspace-v1")
    );

    let classes = request_ok(&mut stdin, &mut reader, "6", "classes.list", json!({}));
    let class_list = classes.get("classes").and_then(|v| v.as_array()).unwrap();
    assert_eq!(class_list.len(), 1);
    assert_eq!(
        class_list[0].get("enrolledCount").and_then(|v| v.as_i64()),
        Some(2)
    );

    let counts = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "attendance.sessionCounts",
        json!({ "sessionId": session_id }),
    );
    assert_eq!(counts.get("present").and_then(|v| v.as_i64()), Some(1));
}

#[test]
fn failed_import_leaves_the_workspace_usable() {
    let workspace = temp_dir("rollcall-backup-badimport");
    let not_a_bundle = workspace.join("notes.txt");
    std::fs::write(&not_a_bundle, "term plan, not a backup").unwrap();

    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let (_, _) = seed_class(
        &mut stdin,
        &mut reader,
        &workspace,
        &[("Aarav Sharma", "21BCE001")],
    );

    let response = request(
        &mut stdin,
        &mut reader,
        "1",
        "backup.importWorkspaceBundle",
        json!({ "inPath": not_a_bundle.to_string_lossy() }),
    );
    assert_eq!(response.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        response.pointer("/error/code").and_then(|v| v.as_str()),
        Some("io_failed")
    );

    // The original database survives the failed import and stays connected.
    let classes = request_ok(&mut stdin, &mut reader, "2", "classes.list", json!({}));
    let class_list = classes.get("classes").and_then(|v| v.as_array()).unwrap();
    assert_eq!(class_list.len(), 1);
}
