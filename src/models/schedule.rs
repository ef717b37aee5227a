use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// One open window in a doctor's calendar at a location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleEntry {
    pub id: i64,
    pub doctor_name: String,
    pub location: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub available_slots: i64,
    pub booked_slots: i64,
}

impl ScheduleEntry {
    pub fn remaining(&self) -> i64 {
        (self.available_slots - self.booked_slots).max(0)
    }

    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.start_time)
    }

    pub fn ends_at(&self) -> NaiveDateTime {
        self.date.and_time(self.end_time)
    }
}

/// A bookable appointment window derived from a schedule row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Slot {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub doctor: String,
    pub location: String,
    pub duration_minutes: u32,
}

impl Slot {
    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }

    pub fn ends_at(&self) -> NaiveDateTime {
        self.starts_at() + Duration::minutes(i64::from(self.duration_minutes))
    }

    /// Whether both slots tie up the same doctor at an overlapping time. The location does
    /// not matter since a doctor cannot be in two places at once.
    pub fn overlaps(&self, other: &Slot) -> bool {
        self.doctor.eq_ignore_ascii_case(&other.doctor)
            && self.starts_at() < other.ends_at()
            && other.starts_at() < self.ends_at()
    }

    /// `Monday, March 10, 2025 at 09:00 AM`
    pub fn describe(&self) -> String {
        format!(
            "{} at {}",
            self.date.format("%A, %B %d, %Y"),
            self.time.format("%I:%M %p")
        )
    }
}

/// Raw schedule row as it appears in the schedule spreadsheet export.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleRow {
    pub doctor_name: String,
    pub location: String,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub available_slots: i64,
    #[serde(default)]
    pub booked_slots: i64,
}

impl ScheduleRow {
    /// Parses the textual columns. Rows whose date or times do not parse are rejected.
    pub fn into_entry(self) -> anyhow::Result<ScheduleEntry> {
        let date = NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d")
            .map_err(|e| anyhow::anyhow!("invalid schedule date {:?}: {e}", self.date))?;
        let start_time = parse_clock(&self.start_time)?;
        let end_time = parse_clock(&self.end_time)?;
        Ok(ScheduleEntry {
            id: 0,
            doctor_name: self.doctor_name.trim().to_string(),
            location: self.location.trim().to_string(),
            date,
            start_time,
            end_time,
            available_slots: self.available_slots,
            booked_slots: self.booked_slots,
        })
    }
}

/// Accepts `HH:MM` and `HH:MM:SS`.
pub fn parse_clock(s: &str) -> anyhow::Result<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|e| anyhow::anyhow!("invalid time {s:?}: {e}"))
}
