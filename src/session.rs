use chrono::{DateTime, Duration, NaiveDate, Utc};
use uuid::Uuid;

/// Default validity window for a newly opened session: 5 minutes.
pub const DEFAULT_VALIDITY_SECS: i64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Expired,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Open => "open",
            SessionState::Expired => "expired",
        }
    }
}

/// One time-bounded attendance window for a class meeting. Expiry is computed
/// on read against a supplied `now`; there is no timer state anywhere.
#[derive(Debug, Clone)]
pub struct AttendanceSession {
    pub session_id: String,
    pub class_id: String,
    pub date: NaiveDate,
    pub subject: Option<String>,
    pub scheduled_time: Option<String>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub closed: bool,
}

impl AttendanceSession {
    pub fn state(&self, now: DateTime<Utc>) -> SessionState {
        if self.closed || now >= self.expires_at {
            SessionState::Expired
        } else {
            SessionState::Open
        }
    }

    /// Remaining validity in whole seconds, clamped at zero. Display-only;
    /// never used for the accept/reject decision itself.
    pub fn seconds_left(&self, now: DateTime<Utc>) -> i64 {
        if self.closed {
            return 0;
        }
        (self.expires_at - now).num_seconds().max(0)
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Opaque payload embedded in the QR code shown on the classroom screen.
    pub fn code_payload(&self) -> String {
        format!("ATTEND:{}:{}:{}", self.class_id, self.session_id, self.date)
    }

    /// Shareable fallback link for students who cannot scan.
    pub fn link(&self) -> String {
        format!("/daily/{}", self.session_id)
    }
}

pub fn open_session(
    class_id: &str,
    date: NaiveDate,
    subject: Option<String>,
    scheduled_time: Option<String>,
    now: DateTime<Utc>,
    validity_secs: i64,
) -> AttendanceSession {
    AttendanceSession {
        session_id: new_session_id(class_id, date),
        class_id: class_id.to_string(),
        date,
        subject,
        scheduled_time,
        issued_at: now,
        expires_at: now + Duration::seconds(validity_secs),
        closed: false,
    }
}

/// Session ids combine class and date with a random suffix so ids stay unique
/// across calls issued in the same millisecond. The suffix comes from a v4
/// uuid; the id as a whole is opaque and safe to embed in a link or QR code.
pub fn new_session_id(class_id: &str, date: NaiveDate) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}-{}", class_id, date.format("%Y%m%d"), &suffix[..8])
}
