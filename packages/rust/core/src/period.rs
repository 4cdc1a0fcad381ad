//! Month-to-date / year-to-date windows over CRM date strings.

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime};

/// The calendar month (and year) that MTD and YTD filters are anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportingPeriod {
    year: i32,
    month: u32,
}

impl ReportingPeriod {
    /// Period containing `date`.
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Period containing today's local date.
    pub fn current() -> Self {
        Self::containing(Local::now().date_naive())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Whether `date` parses and falls in this month. Empty or unparseable is false.
    pub fn is_current_month(&self, date: &str) -> bool {
        parse_date(date).is_some_and(|d| d.year() == self.year && d.month() == self.month)
    }

    /// Whether `date` parses and falls in this year. Empty or unparseable is false.
    pub fn is_current_year(&self, date: &str) -> bool {
        parse_date(date).is_some_and(|d| d.year() == self.year)
    }
}

/// Parse the date formats the CRM emits.
///
/// Offset timestamps are converted to local time before taking the date;
/// naive timestamps and bare dates are taken as-is.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Local).date_naive());
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt.date());
        }
    }

    for fmt in ["%Y-%m-%d", "%m/%d/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(value, fmt) {
            return Some(d);
        }
    }

    None
}
