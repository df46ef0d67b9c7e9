use serde_json::json;

mod common;
use common::{request_ok, seed_class, spawn_sidecar, temp_dir};

fn row_rolls(result: &serde_json::Value) -> Vec<String> {
    result
        .get("rows")
        .and_then(|v| v.as_array())
        .unwrap()
        .iter()
        .map(|r| r.get("rollNo").and_then(|v| v.as_str()).unwrap().to_string())
        .collect()
}

#[test]
fn roster_filter_composes_text_and_status_preserving_order() {
    let workspace = temp_dir("rollcall-roster-filter");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let (class_id, student_ids) = seed_class(
        &mut stdin,
        &mut reader,
        &workspace,
        &[
            ("Aarav Sharma", "21BCE001"),
            ("Vivaan Singh", "21BCE002"),
            ("Priya Sharma", "21BCE045"),
            ("Arush Sharma", "21BCE042"),
            ("Kian Kumar", "21BCE050"),
        ],
    );

    let opened = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "sessions.open",
        json!({ "classId": class_id, "date": "2024-11-25" }),
    );
    let session_id = opened.get("sessionId").and_then(|v| v.as_str()).unwrap().to_string();
    // Present today: Aarav Sharma, Arush Sharma, Kian Kumar.
    for (i, idx) in [0usize, 3, 4].iter().enumerate() {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("mark-{}", i),
            "attendance.mark",
            json!({ "sessionId": session_id, "studentId": student_ids[*idx] }),
        );
    }

    let filtered = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "reports.roster",
        json!({
            "classId": class_id,
            "date": "2024-11-25",
            "search": "shar",
            "status": "present"
        }),
    );
    // Present Sharmas only, roster order preserved.
    assert_eq!(row_rolls(&filtered), vec!["21BCE001", "21BCE042"]);
    assert_eq!(filtered.pointer("/totals/present").and_then(|v| v.as_i64()), Some(2));
    assert_eq!(filtered.pointer("/totals/absent").and_then(|v| v.as_i64()), Some(0));
    assert_eq!(filtered.pointer("/totals/rate").and_then(|v| v.as_f64()), Some(100.0));

    // Totals track the filtered set, not the whole roster.
    let absent_only = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "reports.roster",
        json!({ "classId": class_id, "date": "2024-11-25", "status": "absent" }),
    );
    assert_eq!(row_rolls(&absent_only), vec!["21BCE002", "21BCE045"]);
    assert_eq!(absent_only.pointer("/totals/rate").and_then(|v| v.as_f64()), Some(0.0));

    let everyone = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "reports.roster",
        json!({ "classId": class_id, "date": "2024-11-25" }),
    );
    assert_eq!(everyone.get("rows").and_then(|v| v.as_array()).unwrap().len(), 5);
    assert_eq!(everyone.pointer("/totals/present").and_then(|v| v.as_i64()), Some(3));
    let rate = everyone.pointer("/totals/rate").and_then(|v| v.as_f64()).unwrap();
    assert!((rate - 60.0).abs() < 1e-9);

    // Per-student running counts: one session day so far.
    let first_row = everyone.pointer("/rows/0").unwrap();
    assert_eq!(first_row.get("presentDays").and_then(|v| v.as_i64()), Some(1));
    assert_eq!(first_row.get("totalDays").and_then(|v| v.as_i64()), Some(1));
}

#[test]
fn roster_csv_export_writes_every_student() {
    let workspace = temp_dir("rollcall-roster-csv");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let (class_id, student_ids) = seed_class(
        &mut stdin,
        &mut reader,
        &workspace,
        &[
            ("Aarav Sharma", "21BCE001"),
            ("Singh, Vivaan", "21BCE002"),
        ],
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

    let out_path = workspace.join("roster.csv");
    let exported = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "reports.exportCsv",
        json!({
            "classId": class_id,
            "date": "2024-11-25",
            "outPath": out_path.to_string_lossy()
        }),
    );
    assert_eq!(exported.get("rows").and_then(|v| v.as_i64()), Some(2));

    let body = std::fs::read_to_string(&out_path).expect("read exported csv");
    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "rollNo,name,status,presentDays,totalDays,attendanceRate");
    assert!(lines[1].contains("21BCE001") && lines[1].contains("Present"));
    // Names containing commas are quoted.
    assert!(lines[2].contains("\"Singh, Vivaan\"") && lines[2].contains("Absent"));
}
