use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::ledger::{self, MarkMethod};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;

use super::sessions::load_session;

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

fn attendance_mark(
    conn: &Connection,
    params: &serde_json::Value,
    now: DateTime<Utc>,
) -> Result<serde_json::Value, HandlerErr> {
    let session_id = get_required_str(params, "sessionId")?;
    let student_id = get_required_str(params, "studentId")?;
    let method = MarkMethod::parse(params.get("method").and_then(|v| v.as_str())).ok_or_else(
        || HandlerErr {
            code: "bad_params",
            message: "method must be code or manual".to_string(),
            details: None,
        },
    )?;

    let Some(session) = load_session(conn, &session_id).map_err(HandlerErr::db)? else {
        return Err(HandlerErr {
            code: "not_found",
            message: "unknown session".to_string(),
            details: None,
        });
    };

    // The student must belong to the session's class; any other reference is
    // an external-roster problem surfaced to the caller.
    let student_exists = conn
        .query_row(
            "SELECT 1 FROM students WHERE id = ? AND class_id = ?",
            (&student_id, &session.class_id),
            |r| r.get::<_, i64>(0),
        )
        .optional()
        .map_err(HandlerErr::db)?
        .is_some();
    if !student_exists {
        return Err(HandlerErr {
            code: "not_found",
            message: "unknown student for this class".to_string(),
            details: None,
        });
    }

    let result = ledger::record_mark(conn, &session, &student_id, now, method).map_err(|e| {
        HandlerErr {
            code: "db_insert_failed",
            message: e.to_string(),
            details: Some(json!({ "table": "attendance_marks" })),
        }
    })?;
    let present = ledger::present_count(conn, &session_id).map_err(HandlerErr::db)?;

    Ok(json!({
        "result": result.as_str(),
        "sessionId": session_id,
        "studentId": student_id,
        "presentCount": present
    }))
}

fn attendance_session_counts(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let session_id = get_required_str(params, "sessionId")?;
    if load_session(conn, &session_id)
        .map_err(HandlerErr::db)?
        .is_none()
    {
        return Err(HandlerErr {
            code: "not_found",
            message: "unknown session".to_string(),
            details: None,
        });
    }
    let present = ledger::present_count(conn, &session_id).map_err(HandlerErr::db)?;
    let students = ledger::marked_student_ids(conn, &session_id).map_err(HandlerErr::db)?;
    Ok(json!({
        "sessionId": session_id,
        "present": present,
        "studentIds": students
    }))
}

fn attendance_day_summary(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let date = get_required_str(params, "date")?
        .parse::<NaiveDate>()
        .map_err(|_| HandlerErr {
            code: "bad_params",
            message: "date must be YYYY-MM-DD".to_string(),
            details: None,
        })?;
    let summary = ledger::day_summary(conn, &class_id, date).map_err(HandlerErr::db)?;
    Ok(json!({
        "date": summary.date.to_string(),
        "present": summary.present,
        "enrolled": summary.enrolled,
        "rate": summary.rate,
        "isWeekend": summary.is_weekend
    }))
}

fn with_conn<F>(state: &mut AppState, req: &Request, f: F) -> serde_json::Value
where
    F: FnOnce(&Connection) -> Result<serde_json::Value, HandlerErr>,
{
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match f(conn) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.mark" => Some(with_conn(state, req, |conn| {
            attendance_mark(conn, &req.params, Utc::now())
        })),
        "attendance.sessionCounts" => Some(with_conn(state, req, |conn| {
            attendance_session_counts(conn, &req.params)
        })),
        "attendance.daySummary" => Some(with_conn(state, req, |conn| {
            attendance_day_summary(conn, &req.params)
        })),
        _ => None,
    }
}
