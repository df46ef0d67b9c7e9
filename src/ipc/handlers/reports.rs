use crate::calendar::{self, DaySummary, IntensityBucket};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::ledger;
use crate::roster::{self, RosterEntry, StatusFilter};
use chrono::{Datelike, Duration, NaiveDate, Utc};
use rusqlite::Connection;
use serde_json::json;
use std::collections::HashMap;
use std::io::Write;

const DEFAULT_WINDOW_DAYS: i64 = 30;

fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

fn db_err(req: &Request, e: rusqlite::Error) -> serde_json::Value {
    err(&req.id, "db_query_failed", e.to_string(), None)
}

fn parse_date_param(req: &Request, key: &str, default: NaiveDate) -> Result<NaiveDate, serde_json::Value> {
    match req.params.get(key).and_then(|v| v.as_str()) {
        None => Ok(default),
        Some(raw) => raw.parse::<NaiveDate>().map_err(|_| {
            err(
                &req.id,
                "bad_params",
                format!("{} must be YYYY-MM-DD", key),
                None,
            )
        }),
    }
}

/// Materialize the trailing window as one summary per calendar day. Weekends
/// become zero-rate slots; weekdays fold whatever marks the ledger holds for
/// that date (a weekday with no session reads as zero attendance, which the
/// heatmap renders as Very Low, not No Class).
fn window_summaries(
    conn: &Connection,
    class_id: &str,
    window_end: NaiveDate,
    days: i64,
) -> rusqlite::Result<Vec<DaySummary>> {
    let mut out = Vec::with_capacity(days as usize);
    for i in 0..days {
        let date = window_end - Duration::days(days - 1 - i);
        if calendar::is_weekend(date) {
            out.push(DaySummary::new(date, 0, 0));
        } else {
            out.push(ledger::day_summary(conn, class_id, date)?);
        }
    }
    Ok(out)
}

fn cell_json(slot: Option<&DaySummary>) -> serde_json::Value {
    match slot {
        None => serde_json::Value::Null,
        Some(day) => json!({
            "date": day.date.to_string(),
            "day": day.date.day(),
            "present": day.present,
            "enrolled": day.enrolled,
            "rate": day.rate,
            "isWeekend": day.is_weekend,
            "bucket": IntensityBucket::for_slot(Some(day)).label(),
        }),
    }
}

fn day_ref_json(day: &Option<DaySummary>) -> serde_json::Value {
    match day {
        None => serde_json::Value::Null,
        Some(d) => json!({ "date": d.date.to_string(), "rate": d.rate }),
    }
}

fn handle_reports_heatmap(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let window_end = match parse_date_param(req, "windowEnd", Utc::now().date_naive()) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let days = match req.params.get("windowDays") {
        None => DEFAULT_WINDOW_DAYS,
        Some(v) => match v.as_i64() {
            Some(n) if (1..=366).contains(&n) => n,
            _ => {
                return err(
                    &req.id,
                    "bad_params",
                    "windowDays must be between 1 and 366",
                    None,
                )
            }
        },
    };

    let summaries = match window_summaries(conn, &class_id, window_end, days) {
        Ok(v) => v,
        Err(e) => return db_err(req, e),
    };
    let weeks = calendar::build_weeks(&summaries);
    let stats = calendar::summary_stats(&summaries);

    let weeks_json: Vec<serde_json::Value> = weeks
        .iter()
        .map(|week| json!(week.iter().map(|s| cell_json(s.as_ref())).collect::<Vec<_>>()))
        .collect();

    ok(
        &req.id,
        json!({
            "classId": class_id,
            "windowEnd": window_end.to_string(),
            "windowDays": days,
            "weekdays": ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"],
            "weeks": weeks_json,
            "stats": {
                "averageRate": stats.average_rate,
                "bestDay": day_ref_json(&stats.best_day),
                "worstDay": day_ref_json(&stats.worst_day),
                "totalClassDays": stats.total_class_days,
            }
        }),
    )
}

/// Roster-with-attendance view for one date: today's status from that date's
/// sessions, plus running present/total day counts across the class history.
fn roster_view(
    conn: &Connection,
    class_id: &str,
    date: NaiveDate,
) -> rusqlite::Result<(Vec<RosterEntry>, HashMap<String, Option<String>>)> {
    let total_days: i64 = conn.query_row(
        "SELECT COUNT(DISTINCT date) FROM attendance_sessions WHERE class_id = ?",
        [class_id],
        |r| r.get(0),
    )?;

    let mut stmt = conn.prepare(
        "SELECT st.id, st.name, st.roll_no, st.email,
           EXISTS(
             SELECT 1 FROM attendance_marks m
             JOIN attendance_sessions s ON s.id = m.session_id
             WHERE m.student_id = st.id AND s.class_id = st.class_id AND s.date = ?
           ) AS present_today,
           (
             SELECT COUNT(DISTINCT s.date) FROM attendance_marks m
             JOIN attendance_sessions s ON s.id = m.session_id
             WHERE m.student_id = st.id AND s.class_id = st.class_id
           ) AS present_days
         FROM students st
         WHERE st.class_id = ? AND st.active = 1
         ORDER BY st.sort_order",
    )?;

    let mut entries = Vec::new();
    let mut emails = HashMap::new();
    let rows = stmt.query_map((date.to_string(), class_id), |r| {
        let id: String = r.get(0)?;
        let name: String = r.get(1)?;
        let roll_no: String = r.get(2)?;
        let email: Option<String> = r.get(3)?;
        let present: i64 = r.get(4)?;
        let present_days: i64 = r.get(5)?;
        Ok((id, name, roll_no, email, present != 0, present_days))
    })?;
    for row in rows {
        let (id, name, roll_no, email, present, present_days) = row?;
        emails.insert(id.clone(), email);
        entries.push(RosterEntry {
            student_id: id,
            name,
            roll_no,
            present,
            present_days: present_days as u32,
            total_days: total_days as u32,
        });
    }
    Ok((entries, emails))
}

fn parse_roster_query(req: &Request) -> Result<(String, StatusFilter), serde_json::Value> {
    let text = req
        .params
        .get("search")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    let status = StatusFilter::parse(req.params.get("status").and_then(|v| v.as_str()))
        .ok_or_else(|| {
            err(
                &req.id,
                "bad_params",
                "status must be one of: all, present, absent",
                None,
            )
        })?;
    Ok((text, status))
}

fn handle_reports_roster(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let date = match parse_date_param(req, "date", Utc::now().date_naive()) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let (text, status) = match parse_roster_query(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let (entries, emails) = match roster_view(conn, &class_id, date) {
        Ok(v) => v,
        Err(e) => return db_err(req, e),
    };
    let filtered = roster::apply(&entries, &text, status);
    let totals = roster::aggregate(&filtered);

    let rows: Vec<serde_json::Value> = filtered
        .iter()
        .map(|e| {
            json!({
                "studentId": e.student_id,
                "name": e.name,
                "rollNo": e.roll_no,
                "email": emails.get(&e.student_id).cloned().flatten(),
                "status": if e.present { "Present" } else { "Absent" },
                "presentDays": e.present_days,
                "totalDays": e.total_days,
                "attendanceRate": e.attendance_rate(),
            })
        })
        .collect();

    ok(
        &req.id,
        json!({
            "classId": class_id,
            "date": date.to_string(),
            "rows": rows,
            "totals": {
                "present": totals.present,
                "absent": totals.absent,
                "rate": totals.rate,
            }
        }),
    )
}

fn csv_field(raw: &str) -> String {
    if raw.contains(',') || raw.contains('"') || raw.contains('\n') {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

fn handle_reports_export_csv(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let out_path = match required_str(req, "outPath") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let date = match parse_date_param(req, "date", Utc::now().date_naive()) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let (entries, _) = match roster_view(conn, &class_id, date) {
        Ok(v) => v,
        Err(e) => return db_err(req, e),
    };

    let mut body = String::from("rollNo,name,status,presentDays,totalDays,attendanceRate\n");
    for e in &entries {
        body.push_str(&format!(
            "{},{},{},{},{},{:.1}\n",
            csv_field(&e.roll_no),
            csv_field(&e.name),
            if e.present { "Present" } else { "Absent" },
            e.present_days,
            e.total_days,
            e.attendance_rate(),
        ));
    }

    let write_result = std::fs::File::create(&out_path)
        .and_then(|mut f| f.write_all(body.as_bytes()).and_then(|_| f.flush()));
    if let Err(e) = write_result {
        return err(
            &req.id,
            "io_failed",
            e.to_string(),
            Some(json!({ "path": out_path })),
        );
    }

    ok(
        &req.id,
        json!({ "path": out_path, "rows": entries.len(), "date": date.to_string() }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.heatmap" => Some(handle_reports_heatmap(state, req)),
        "reports.roster" => Some(handle_reports_roster(state, req)),
        "reports.exportCsv" => Some(handle_reports_export_csv(state, req)),
        _ => None,
    }
}
