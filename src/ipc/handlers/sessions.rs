use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::ledger;
use crate::session::{self, AttendanceSession, SessionState};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;

struct HandlerErr {
    code: &'static str,
    message: String,
    details: Option<serde_json::Value>,
}

impl HandlerErr {
    fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }

    fn db(e: rusqlite::Error) -> HandlerErr {
        HandlerErr {
            code: "db_query_failed",
            message: e.to_string(),
            details: None,
        }
    }
}

fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr {
            code: "bad_params",
            message: format!("missing {}", key),
            details: None,
        })
}

fn parse_date(params: &serde_json::Value, now: DateTime<Utc>) -> Result<NaiveDate, HandlerErr> {
    match params.get("date").and_then(|v| v.as_str()) {
        None => Ok(now.date_naive()),
        Some(raw) => raw.parse::<NaiveDate>().map_err(|_| HandlerErr {
            code: "bad_params",
            message: "date must be YYYY-MM-DD".to_string(),
            details: None,
        }),
    }
}

fn class_exists(conn: &Connection, class_id: &str) -> Result<bool, HandlerErr> {
    conn.query_row("SELECT 1 FROM classes WHERE id = ?", [class_id], |r| {
        r.get::<_, i64>(0)
    })
    .optional()
    .map(|v| v.is_some())
    .map_err(HandlerErr::db)
}

fn session_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AttendanceSession> {
    let date_raw: String = row.get(2)?;
    let date = date_raw.parse::<NaiveDate>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let issued_at: i64 = row.get(5)?;
    let expires_at: i64 = row.get(6)?;
    Ok(AttendanceSession {
        session_id: row.get(0)?,
        class_id: row.get(1)?,
        date,
        subject: row.get(3)?,
        scheduled_time: row.get(4)?,
        issued_at: Utc.timestamp_opt(issued_at, 0).single().unwrap_or_default(),
        expires_at: Utc
            .timestamp_opt(expires_at, 0)
            .single()
            .unwrap_or_default(),
        closed: row.get::<_, i64>(7)? != 0,
    })
}

/// Upper bound on a session's validity window: one full day. Anything longer
/// is a client bug, and unbounded values would overflow the expiry instant.
const MAX_VALIDITY_SECS: i64 = 86_400;

const SESSION_COLUMNS: &str =
    "id, class_id, date, subject, scheduled_time, issued_at, expires_at, closed";

pub(super) fn load_session(
    conn: &Connection,
    session_id: &str,
) -> rusqlite::Result<Option<AttendanceSession>> {
    conn.query_row(
        &format!("SELECT {SESSION_COLUMNS} FROM attendance_sessions WHERE id = ?"),
        [session_id],
        session_from_row,
    )
    .optional()
}

fn session_json(session: &AttendanceSession, now: DateTime<Utc>) -> serde_json::Value {
    json!({
        "sessionId": session.session_id,
        "classId": session.class_id,
        "date": session.date.to_string(),
        "subject": session.subject,
        "scheduledTime": session.scheduled_time,
        "issuedAt": session.issued_at.timestamp(),
        "expiresAt": session.expires_at.timestamp(),
        "state": session.state(now).as_str(),
        "secondsLeft": session.seconds_left(now),
        "codePayload": session.code_payload(),
        "link": session.link(),
    })
}

fn sessions_open(
    conn: &Connection,
    params: &serde_json::Value,
    now: DateTime<Utc>,
) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let date = parse_date(params, now)?;
    if !class_exists(conn, &class_id)? {
        return Err(HandlerErr {
            code: "not_found",
            message: "class not found".to_string(),
            details: None,
        });
    }
    let subject = params
        .get("subject")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    let scheduled_time = params
        .get("scheduledTime")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    let validity_secs = match params.get("validitySeconds") {
        None => session::DEFAULT_VALIDITY_SECS,
        Some(v) => match v.as_i64() {
            Some(n) if (0..=MAX_VALIDITY_SECS).contains(&n) => n,
            _ => {
                return Err(HandlerErr {
                    code: "bad_params",
                    message: format!(
                        "validitySeconds must be an integer between 0 and {}",
                        MAX_VALIDITY_SECS
                    ),
                    details: None,
                })
            }
        },
    };

    let session = session::open_session(&class_id, date, subject, scheduled_time, now, validity_secs);

    // Rotating a session implicitly expires any prior open one for the same
    // class and date, inside the same transaction as the insert.
    let tx = conn.unchecked_transaction().map_err(|e| HandlerErr {
        code: "db_tx_failed",
        message: e.to_string(),
        details: None,
    })?;
    tx.execute(
        "UPDATE attendance_sessions SET closed = 1
         WHERE class_id = ? AND date = ? AND closed = 0",
        (&class_id, date.to_string()),
    )
    .map_err(HandlerErr::db)?;
    tx.execute(
        "INSERT INTO attendance_sessions(id, class_id, date, subject, scheduled_time,
                                         issued_at, expires_at, closed)
         VALUES(?, ?, ?, ?, ?, ?, ?, 0)",
        (
            &session.session_id,
            &session.class_id,
            session.date.to_string(),
            &session.subject,
            &session.scheduled_time,
            session.issued_at.timestamp(),
            session.expires_at.timestamp(),
        ),
    )
    .map_err(|e| HandlerErr {
        code: "db_insert_failed",
        message: e.to_string(),
        details: Some(json!({ "table": "attendance_sessions" })),
    })?;
    tx.commit().map_err(|e| HandlerErr {
        code: "db_commit_failed",
        message: e.to_string(),
        details: None,
    })?;

    Ok(session_json(&session, now))
}

fn sessions_status(
    conn: &Connection,
    params: &serde_json::Value,
    now: DateTime<Utc>,
) -> Result<serde_json::Value, HandlerErr> {
    let session_id = get_required_str(params, "sessionId")?;
    let Some(session) = load_session(conn, &session_id).map_err(HandlerErr::db)? else {
        return Err(HandlerErr {
            code: "not_found",
            message: "unknown session".to_string(),
            details: None,
        });
    };
    let present = ledger::present_count(conn, &session.session_id).map_err(HandlerErr::db)?;
    let enrolled = ledger::enrolled_count(conn, &session.class_id).map_err(HandlerErr::db)?;

    let mut out = session_json(&session, now);
    out["presentCount"] = json!(present);
    out["enrolledCount"] = json!(enrolled);
    Ok(out)
}

fn sessions_close(
    conn: &Connection,
    params: &serde_json::Value,
    now: DateTime<Utc>,
) -> Result<serde_json::Value, HandlerErr> {
    let session_id = get_required_str(params, "sessionId")?;
    let Some(mut session) = load_session(conn, &session_id).map_err(HandlerErr::db)? else {
        return Err(HandlerErr {
            code: "not_found",
            message: "unknown session".to_string(),
            details: None,
        });
    };
    conn.execute(
        "UPDATE attendance_sessions SET closed = 1 WHERE id = ?",
        [&session_id],
    )
    .map_err(|e| HandlerErr {
        code: "db_update_failed",
        message: e.to_string(),
        details: Some(json!({ "table": "attendance_sessions" })),
    })?;
    session.close();
    Ok(session_json(&session, now))
}

fn sessions_active(
    conn: &Connection,
    params: &serde_json::Value,
    now: DateTime<Utc>,
) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let date = parse_date(params, now)?;
    // By the rotation invariant there is at most one non-closed session per
    // class/date; the newest wins if an older workspace predates it.
    let found = conn
        .query_row(
            &format!(
                "SELECT {SESSION_COLUMNS} FROM attendance_sessions
                 WHERE class_id = ? AND date = ? AND closed = 0
                 ORDER BY issued_at DESC
                 LIMIT 1"
            ),
            (&class_id, date.to_string()),
            session_from_row,
        )
        .optional()
        .map_err(HandlerErr::db)?;

    match found {
        Some(session) if session.state(now) == SessionState::Open => {
            Ok(json!({ "session": session_json(&session, now) }))
        }
        _ => Ok(json!({ "session": null })),
    }
}

fn with_conn<F>(state: &mut AppState, req: &Request, f: F) -> serde_json::Value
where
    F: FnOnce(&Connection, &serde_json::Value, DateTime<Utc>) -> Result<serde_json::Value, HandlerErr>,
{
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match f(conn, &req.params, Utc::now()) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "sessions.open" => Some(with_conn(state, req, sessions_open)),
        "sessions.status" => Some(with_conn(state, req, sessions_status)),
        "sessions.close" => Some(with_conn(state, req, sessions_close)),
        "sessions.active" => Some(with_conn(state, req, sessions_active)),
        _ => None,
    }
}
