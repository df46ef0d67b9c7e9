/// One roster row in the attendance report view: today's status plus the
/// running present/total day counts used for the per-student rate column.
#[derive(Debug, Clone, PartialEq)]
pub struct RosterEntry {
    pub student_id: String,
    pub name: String,
    pub roll_no: String,
    pub present: bool,
    pub present_days: u32,
    pub total_days: u32,
}

impl RosterEntry {
    pub fn attendance_rate(&self) -> f64 {
        if self.total_days == 0 {
            0.0
        } else {
            100.0 * f64::from(self.present_days) / f64::from(self.total_days)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    All,
    PresentOnly,
    AbsentOnly,
}

impl StatusFilter {
    pub fn parse(raw: Option<&str>) -> Option<StatusFilter> {
        match raw.map(|s| s.to_ascii_lowercase()).as_deref() {
            None | Some("all") => Some(StatusFilter::All),
            Some("present") => Some(StatusFilter::PresentOnly),
            Some("absent") => Some(StatusFilter::AbsentOnly),
            Some(_) => None,
        }
    }

    fn matches(self, entry: &RosterEntry) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::PresentOnly => entry.present,
            StatusFilter::AbsentOnly => !entry.present,
        }
    }
}

/// Stable filter over the roster view. The text query matches name OR roll
/// number, case-insensitively; original order is preserved.
pub fn apply<'a>(
    roster: &'a [RosterEntry],
    text: &str,
    status: StatusFilter,
) -> Vec<&'a RosterEntry> {
    let needle = text.trim().to_lowercase();
    roster
        .iter()
        .filter(|entry| {
            let text_match = needle.is_empty()
                || entry.name.to_lowercase().contains(&needle)
                || entry.roll_no.to_lowercase().contains(&needle);
            text_match && status.matches(entry)
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RosterTotals {
    pub present: usize,
    pub absent: usize,
    pub rate: f64,
}

/// Aggregates over the filtered set only, so the summary cards track the
/// active filter instead of the global roster.
pub fn aggregate(filtered: &[&RosterEntry]) -> RosterTotals {
    let present = filtered.iter().filter(|e| e.present).count();
    let absent = filtered.len() - present;
    let rate = if filtered.is_empty() {
        0.0
    } else {
        100.0 * present as f64 / filtered.len() as f64
    };
    RosterTotals {
        present,
        absent,
        rate,
    }
}
