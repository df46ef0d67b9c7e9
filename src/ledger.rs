use crate::calendar::DaySummary;
use crate::session::{AttendanceSession, SessionState};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Connection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkMethod {
    Code,
    Manual,
}

impl MarkMethod {
    pub fn parse(raw: Option<&str>) -> Option<MarkMethod> {
        match raw.map(|s| s.to_ascii_lowercase()).as_deref() {
            None | Some("code") => Some(MarkMethod::Code),
            Some("manual") => Some(MarkMethod::Manual),
            Some(_) => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MarkMethod::Code => "code",
            MarkMethod::Manual => "manual",
        }
    }
}

/// Outcome of a mark submission. AlreadyRecorded is idempotent success, not
/// an error; SessionExpired tells the caller to request a fresh session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkResult {
    Recorded,
    AlreadyRecorded,
    SessionExpired,
}

impl MarkResult {
    pub fn as_str(self) -> &'static str {
        match self {
            MarkResult::Recorded => "recorded",
            MarkResult::AlreadyRecorded => "already_recorded",
            MarkResult::SessionExpired => "session_expired",
        }
    }
}

/// Append one mark for (student, session). The check-and-insert is atomic at
/// the storage layer: the marks table keys on (student_id, session_id) and
/// the insert is ON CONFLICT DO NOTHING, so a racing duplicate resolves to
/// exactly one Recorded with the rest AlreadyRecorded.
pub fn record_mark(
    conn: &Connection,
    session: &AttendanceSession,
    student_id: &str,
    now: DateTime<Utc>,
    method: MarkMethod,
) -> rusqlite::Result<MarkResult> {
    if session.state(now) == SessionState::Expired {
        return Ok(MarkResult::SessionExpired);
    }
    let changed = conn.execute(
        "INSERT INTO attendance_marks(student_id, session_id, marked_at, method)
         VALUES(?, ?, ?, ?)
         ON CONFLICT(student_id, session_id) DO NOTHING",
        (
            student_id,
            &session.session_id,
            now.timestamp(),
            method.as_str(),
        ),
    )?;
    if changed == 0 {
        Ok(MarkResult::AlreadyRecorded)
    } else {
        Ok(MarkResult::Recorded)
    }
}

/// Distinct students with a mark for the session. The primary key already
/// guarantees one row per student, so a plain count never double-counts.
pub fn present_count(conn: &Connection, session_id: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM attendance_marks WHERE session_id = ?",
        [session_id],
        |r| r.get(0),
    )
}

pub fn marked_student_ids(conn: &Connection, session_id: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT student_id FROM attendance_marks WHERE session_id = ? ORDER BY marked_at, student_id",
    )?;
    let rows = stmt.query_map([session_id], |r| r.get(0))?;
    rows.collect()
}

pub fn enrolled_count(conn: &Connection, class_id: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM students WHERE class_id = ? AND active = 1",
        [class_id],
        |r| r.get(0),
    )
}

/// Fold the day's marks into a DailyAttendanceSummary. A student marked in
/// any of the day's sessions counts once; rate is 0 when nobody is enrolled.
pub fn day_summary(
    conn: &Connection,
    class_id: &str,
    date: NaiveDate,
) -> rusqlite::Result<DaySummary> {
    let present: i64 = conn.query_row(
        "SELECT COUNT(DISTINCT m.student_id)
         FROM attendance_marks m
         JOIN attendance_sessions s ON s.id = m.session_id
         WHERE s.class_id = ? AND s.date = ?",
        (class_id, date.to_string()),
        |r| r.get(0),
    )?;
    let enrolled = enrolled_count(conn, class_id)?;
    Ok(DaySummary::new(date, present as u32, enrolled as u32))
}
