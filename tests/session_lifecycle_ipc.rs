use serde_json::json;

mod common;
use common::{request, request_ok, seed_class, spawn_sidecar, temp_dir};

#[test]
fn rotating_a_session_expires_the_prior_one() {
    let workspace = temp_dir("rollcall-session-rotate");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let (class_id, _) = seed_class(
        &mut stdin,
        &mut reader,
        &workspace,
        &[("Aarav Sharma", "21BCE001")],
    );

    let first = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "sessions.open",
        json!({ "classId": class_id, "date": "2024-11-25" }),
    );
    let first_id = first.get("sessionId").and_then(|v| v.as_str()).unwrap().to_string();
    assert_eq!(first.get("state").and_then(|v| v.as_str()), Some("open"));
    // Default validity window is five minutes.
    let seconds_left = first.get("secondsLeft").and_then(|v| v.as_i64()).unwrap();
    assert!(seconds_left > 295 && seconds_left <= 300);

    let second = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "sessions.open",
        json!({ "classId": class_id, "date": "2024-11-25" }),
    );
    let second_id = second.get("sessionId").and_then(|v| v.as_str()).unwrap().to_string();
    assert_ne!(first_id, second_id);

    // The first session is expired the moment the second opens.
    let first_status = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "sessions.status",
        json!({ "sessionId": first_id }),
    );
    assert_eq!(
        first_status.get("state").and_then(|v| v.as_str()),
        Some("expired")
    );
    assert_eq!(
        first_status.get("secondsLeft").and_then(|v| v.as_i64()),
        Some(0)
    );

    // sessions.active resolves to the replacement.
    let active = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "sessions.active",
        json!({ "classId": class_id, "date": "2024-11-25" }),
    );
    assert_eq!(
        active
            .pointer("/session/sessionId")
            .and_then(|v| v.as_str()),
        Some(second_id.as_str())
    );

    // Sessions for other dates are untouched by the rotation.
    let other_day = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "sessions.open",
        json!({ "classId": class_id, "date": "2024-11-26" }),
    );
    assert_eq!(other_day.get("state").and_then(|v| v.as_str()), Some("open"));
    let second_again = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "sessions.status",
        json!({ "sessionId": second_id }),
    );
    assert_eq!(
        second_again.get("state").and_then(|v| v.as_str()),
        Some("open")
    );
}

#[test]
fn close_forces_expiry_and_active_returns_null() {
    let workspace = temp_dir("rollcall-session-close");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let (class_id, _) = seed_class(
        &mut stdin,
        &mut reader,
        &workspace,
        &[("Aarav Sharma", "21BCE001")],
    );

    let opened = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "sessions.open",
        json!({ "classId": class_id, "date": "2024-11-25" }),
    );
    let session_id = opened.get("sessionId").and_then(|v| v.as_str()).unwrap().to_string();

    let closed = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "sessions.close",
        json!({ "sessionId": session_id }),
    );
    assert_eq!(closed.get("state").and_then(|v| v.as_str()), Some("expired"));

    let active = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "sessions.active",
        json!({ "classId": class_id, "date": "2024-11-25" }),
    );
    assert!(active.get("session").map(|v| v.is_null()).unwrap_or(false));
}

#[test]
fn oversized_validity_window_is_rejected_not_fatal() {
    let workspace = temp_dir("rollcall-session-validity");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let (class_id, _) = seed_class(
        &mut stdin,
        &mut reader,
        &workspace,
        &[("Aarav Sharma", "21BCE001")],
    );

    // Values past the one-day cap are a parameter error, including extremes
    // that would overflow the expiry instant.
    for (id, bad) in [("1", json!(86_401)), ("2", json!(i64::MAX))] {
        let response = request(
            &mut stdin,
            &mut reader,
            id,
            "sessions.open",
            json!({ "classId": class_id, "date": "2024-11-25", "validitySeconds": bad }),
        );
        assert_eq!(response.get("ok").and_then(|v| v.as_bool()), Some(false));
        assert_eq!(
            response.pointer("/error/code").and_then(|v| v.as_str()),
            Some("bad_params")
        );
    }

    // The process stays up and the cap itself is accepted.
    let opened = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "sessions.open",
        json!({ "classId": class_id, "date": "2024-11-25", "validitySeconds": 86_400 }),
    );
    assert_eq!(opened.get("state").and_then(|v| v.as_str()), Some("open"));
}

#[test]
fn session_payloads_are_link_safe_and_unique() {
    let workspace = temp_dir("rollcall-session-payload");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let (class_id, _) = seed_class(
        &mut stdin,
        &mut reader,
        &workspace,
        &[("Aarav Sharma", "21BCE001")],
    );

    let opened = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "sessions.open",
        json!({ "classId": class_id, "date": "2024-11-25", "subject": "Computer Networks" }),
    );
    let session_id = opened.get("sessionId").and_then(|v| v.as_str()).unwrap();
    let payload = opened.get("codePayload").and_then(|v| v.as_str()).unwrap();
    let link = opened.get("link").and_then(|v| v.as_str()).unwrap();

    assert!(payload.starts_with("ATTEND:"));
    assert!(payload.contains(session_id));
    assert_eq!(link, format!("/daily/{}", session_id));
    assert!(!session_id.contains(' '));
}
