use chrono::{Datelike, NaiveDate, Weekday};

/// Derived per-day attendance summary. Weekend days are real slots with a
/// zero rate; "no data" days in the week grid are `None`, never a zero rate.
#[derive(Debug, Clone, PartialEq)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub present: u32,
    pub enrolled: u32,
    pub rate: f64,
    pub is_weekend: bool,
}

impl DaySummary {
    pub fn new(date: NaiveDate, present: u32, enrolled: u32) -> DaySummary {
        let rate = if enrolled == 0 {
            0.0
        } else {
            100.0 * f64::from(present) / f64::from(enrolled)
        };
        DaySummary {
            date,
            present,
            enrolled,
            rate,
            is_weekend: is_weekend(date),
        }
    }
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// One calendar week row, Monday..Sunday. `None` slots fall outside the
/// reporting window.
pub type WeekRow = Vec<Option<DaySummary>>;

/// Fold an ordered run of daily summaries into Monday-aligned week rows.
/// The first row is padded with leading `None` slots up to the weekday of
/// the first summary; the last row is padded with trailing `None` slots
/// after the window end.
pub fn build_weeks(summaries: &[DaySummary]) -> Vec<WeekRow> {
    let mut weeks: Vec<WeekRow> = Vec::new();
    let mut current: WeekRow = Vec::with_capacity(7);

    for (i, day) in summaries.iter().enumerate() {
        if i == 0 {
            let offset = day.date.weekday().num_days_from_monday() as usize;
            for _ in 0..offset {
                current.push(None);
            }
        }
        current.push(Some(day.clone()));
        if current.len() == 7 {
            weeks.push(current);
            current = Vec::with_capacity(7);
        }
    }

    if !current.is_empty() {
        while current.len() < 7 {
            current.push(None);
        }
        weeks.push(current);
    }

    weeks
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntensityBucket {
    NoClass,
    VeryLow,
    Low,
    Average,
    Good,
    Excellent,
}

impl IntensityBucket {
    /// Bucket for a grid slot. Placeholders and weekends are NoClass; a
    /// weekday with a zero rate is VeryLow, not NoClass.
    pub fn for_slot(slot: Option<&DaySummary>) -> IntensityBucket {
        match slot {
            None => IntensityBucket::NoClass,
            Some(day) if day.is_weekend => IntensityBucket::NoClass,
            Some(day) => IntensityBucket::from_rate(day.rate),
        }
    }

    /// Fixed half-open boundaries: <25, <50, <75, <90, >=90.
    pub fn from_rate(rate: f64) -> IntensityBucket {
        if rate < 25.0 {
            IntensityBucket::VeryLow
        } else if rate < 50.0 {
            IntensityBucket::Low
        } else if rate < 75.0 {
            IntensityBucket::Average
        } else if rate < 90.0 {
            IntensityBucket::Good
        } else {
            IntensityBucket::Excellent
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            IntensityBucket::NoClass => "No Class",
            IntensityBucket::VeryLow => "Very Low",
            IntensityBucket::Low => "Low",
            IntensityBucket::Average => "Average",
            IntensityBucket::Good => "Good",
            IntensityBucket::Excellent => "Excellent",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryStats {
    /// None when the window holds no class days (all weekend / empty).
    pub average_rate: Option<f64>,
    pub best_day: Option<DaySummary>,
    pub worst_day: Option<DaySummary>,
    pub total_class_days: usize,
}

/// Headline stats over the non-weekend days of a window. Ties in best/worst
/// resolve to the earliest date encountered (stable scan order).
pub fn summary_stats(summaries: &[DaySummary]) -> SummaryStats {
    let mut total = 0usize;
    let mut sum = 0.0f64;
    let mut best: Option<&DaySummary> = None;
    let mut worst: Option<&DaySummary> = None;

    for day in summaries.iter().filter(|day| !day.is_weekend) {
        total += 1;
        sum += day.rate;
        if best.map(|b| day.rate > b.rate).unwrap_or(true) {
            best = Some(day);
        }
        if worst.map(|w| day.rate < w.rate).unwrap_or(true) {
            worst = Some(day);
        }
    }

    SummaryStats {
        average_rate: if total > 0 { Some(sum / total as f64) } else { None },
        best_day: best.cloned(),
        worst_day: worst.cloned(),
        total_class_days: total,
    }
}
