//! Expands schedule windows into bookable slots and resolves slot picks from replies.
//!
//! Everything here is a pure function over schedule rows; capacity is only reserved when a
//! booking is committed in the database layer.

use std::sync::LazyLock;

use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime, Timelike};
use regex::Regex;

use crate::models::{ScheduleEntry, Slot};
use crate::services::extraction::contains_phrase;

/// Slots start on a half-hour grid regardless of appointment length.
pub const SLOT_STEP_MINUTES: i64 = 30;

/// Upper bound on slots returned by one availability query.
pub const MAX_SLOTS: usize = 10;

static SLOT_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})(?::(\d{2}))?(?:\s*([ap])\.?m\b\.?|\b)").expect("valid regex")
});

const WEEKDAYS: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

#[derive(Debug, Clone)]
pub struct SlotQuery<'a> {
    pub doctor: Option<&'a str>,
    pub location: Option<&'a str>,
    pub duration_minutes: u32,
    pub limit: usize,
    /// Slots starting before this instant are skipped.
    pub not_before: Option<NaiveDateTime>,
    /// Already-booked appointments. Positions that overlap one are never offered.
    pub taken: &'a [Slot],
}

impl<'a> SlotQuery<'a> {
    pub fn new(duration_minutes: u32) -> Self {
        Self {
            doctor: None,
            location: None,
            duration_minutes,
            limit: MAX_SLOTS,
            not_before: None,
            taken: &[],
        }
    }

    pub fn for_pair(doctor: &'a str, location: &'a str, duration_minutes: u32) -> Self {
        Self {
            doctor: Some(doctor),
            location: Some(location),
            ..Self::new(duration_minutes)
        }
    }

    fn matches(&self, entry: &ScheduleEntry) -> bool {
        self.doctor.map_or(true, |d| entry.doctor_name.eq_ignore_ascii_case(d))
            && self.location.map_or(true, |l| entry.location.eq_ignore_ascii_case(l))
    }

    fn is_open(&self, slot: &Slot) -> bool {
        self.not_before.map_or(true, |t| slot.starts_at() >= t)
            && !self.taken.iter().any(|booked| booked.overlaps(slot))
    }
}

/// Slots from one schedule row: a half-hour cursor from start to end, stopping once the
/// appointment would overrun the window or the row's remaining capacity is used up.
/// Past and already-booked positions are skipped without using capacity.
pub fn expand_row(entry: &ScheduleEntry, query: &SlotQuery<'_>) -> Vec<Slot> {
    let duration = Duration::minutes(i64::from(query.duration_minutes));
    let end = entry.ends_at();
    let capacity = usize::try_from(entry.remaining()).unwrap_or(0);

    let mut slots = Vec::new();
    let mut cursor = entry.starts_at();
    while cursor + duration <= end && slots.len() < capacity {
        let slot = Slot {
            date: cursor.date(),
            time: cursor.time(),
            doctor: entry.doctor_name.clone(),
            location: entry.location.clone(),
            duration_minutes: query.duration_minutes,
        };
        if query.is_open(&slot) {
            slots.push(slot);
        }
        cursor += Duration::minutes(SLOT_STEP_MINUTES);
    }
    slots
}

/// Time-ordered slots for the query, ties kept in schedule row order.
pub fn available_slots(rows: &[ScheduleEntry], query: &SlotQuery<'_>) -> Vec<Slot> {
    let mut slots: Vec<Slot> = rows
        .iter()
        .filter(|entry| query.matches(entry))
        .flat_map(|entry| expand_row(entry, query))
        .collect();
    slots.sort_by_key(|slot| (slot.date, slot.time));
    slots.truncate(query.limit.min(MAX_SLOTS));
    slots
}

/// Doctor/location pairs other than the query's own that still have at least one slot
/// under the same duration, cutoff and bookings.
pub fn alternatives(rows: &[ScheduleEntry], query: &SlotQuery<'_>) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = Vec::new();
    for entry in rows {
        let pair = (entry.doctor_name.clone(), entry.location.clone());
        if query.matches(entry) || pairs.contains(&pair) {
            continue;
        }
        let candidate = SlotQuery {
            doctor: Some(&pair.0),
            location: Some(&pair.1),
            limit: 1,
            ..query.clone()
        };
        if !available_slots(rows, &candidate).is_empty() {
            pairs.push(pair);
        }
    }
    pairs
}

struct SlotToken {
    hour: u32,
    minute: Option<u32>,
    meridiem: Option<char>,
}

fn slot_tokens(reply: &str) -> Vec<SlotToken> {
    SLOT_TOKEN_RE
        .captures_iter(reply)
        .filter_map(|caps| {
            Some(SlotToken {
                hour: caps[1].parse().ok()?,
                minute: caps.get(2).and_then(|m| m.as_str().parse().ok()),
                meridiem: caps
                    .get(3)
                    .and_then(|m| m.as_str().chars().next())
                    .map(|c| c.to_ascii_lowercase()),
            })
        })
        .collect()
}

fn time_matches(token: &SlotToken, time: NaiveTime) -> bool {
    if token.minute.unwrap_or(0) != time.minute() {
        return false;
    }
    match token.meridiem {
        Some('p') if token.hour < 12 => time.hour() == token.hour + 12,
        Some('a') if token.hour == 12 => time.hour() == 0,
        Some(_) => time.hour() == token.hour,
        None => time.hour() == token.hour || (token.hour < 12 && time.hour() == token.hour + 12),
    }
}

/// Resolves a reply against the list that was last shown to the patient.
///
/// A bare number within range picks by position (1-based). Otherwise a time of day
/// (`10:30`, `2pm`, `2:30 p.m.`) or a weekday name picks the first slot that matches.
pub fn select_slot<'a>(reply: &str, presented: &'a [Slot]) -> Option<&'a Slot> {
    let tokens = slot_tokens(reply);

    let by_position = tokens
        .iter()
        .filter(|t| t.minute.is_none() && t.meridiem.is_none())
        .find_map(|t| {
            let index = usize::try_from(t.hour).ok()?;
            (1..=presented.len()).contains(&index).then(|| &presented[index - 1])
        });
    if by_position.is_some() {
        return by_position;
    }

    let by_time = tokens
        .iter()
        .filter(|t| t.minute.is_some() || t.meridiem.is_some())
        .find_map(|t| presented.iter().find(|slot| time_matches(t, slot.time)));
    if by_time.is_some() {
        return by_time;
    }

    let lower = reply.to_lowercase();
    WEEKDAYS
        .iter()
        .enumerate()
        .filter(|(_, day)| contains_phrase(&lower, day))
        .find_map(|(index, _)| {
            presented
                .iter()
                .find(|slot| slot.date.weekday().num_days_from_monday() as usize == index)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn entry(doctor: &str, location: &str, date: (i32, u32, u32), start: u32, end: u32, available: i64, booked: i64) -> ScheduleEntry {
        ScheduleEntry {
            id: 0,
            doctor_name: doctor.to_string(),
            location: location.to_string(),
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            start_time: NaiveTime::from_hms_opt(start, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(end, 0, 0).unwrap(),
            available_slots: available,
            booked_slots: booked,
        }
    }

    fn slot_at(date: (i32, u32, u32), hour: u32, minute: u32) -> Slot {
        Slot {
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            time: NaiveTime::from_hms_opt(hour, minute, 0).unwrap(),
            doctor: "Dr. Lee".to_string(),
            location: "Uptown Center".to_string(),
            duration_minutes: 30,
        }
    }

    #[test]
    fn test_expand_row_respects_window_end() {
        let row = entry("Dr. Lee", "Uptown Center", (2025, 3, 10), 9, 11, 10, 0);
        let slots = expand_row(&row, &SlotQuery::new(60));
        let times: Vec<String> = slots.iter().map(|s| s.time.format("%H:%M").to_string()).collect();
        assert_eq!(times, vec!["09:00", "09:30", "10:00"]);
        assert!(slots.iter().all(|s| s.ends_at() <= row.ends_at()));
    }

    #[test]
    fn test_expand_row_respects_capacity() {
        let row = entry("Dr. Lee", "Uptown Center", (2025, 3, 10), 9, 17, 5, 3);
        assert_eq!(expand_row(&row, &SlotQuery::new(30)).len(), 2);

        let full = entry("Dr. Lee", "Uptown Center", (2025, 3, 10), 9, 17, 4, 4);
        assert!(expand_row(&full, &SlotQuery::new(30)).is_empty());
    }

    #[test]
    fn test_available_slots_sorted_and_capped() {
        let rows = vec![
            entry("Dr. Lee", "Uptown Center", (2025, 3, 12), 9, 17, 8, 0),
            entry("Dr. Lee", "Uptown Center", (2025, 3, 10), 13, 17, 8, 0),
        ];
        let slots = available_slots(&rows, &SlotQuery::for_pair("Dr. Lee", "Uptown Center", 30));
        assert_eq!(slots.len(), MAX_SLOTS);
        assert!(slots.windows(2).all(|w| (w[0].date, w[0].time) <= (w[1].date, w[1].time)));
        assert_eq!(slots[0].date, NaiveDate::from_ymd_opt(2025, 3, 10).unwrap());
    }

    #[test]
    fn test_filter_is_case_insensitive() {
        let rows = vec![
            entry("Dr. Lee", "Uptown Center", (2025, 3, 10), 9, 10, 2, 0),
            entry("Dr. Johnson", "Uptown Center", (2025, 3, 10), 9, 10, 2, 0),
        ];
        let slots = available_slots(&rows, &SlotQuery::for_pair("dr. lee", "UPTOWN CENTER", 30));
        assert_eq!(slots.len(), 2);
        assert!(slots.iter().all(|s| s.doctor == "Dr. Lee"));
    }

    #[test]
    fn test_ties_keep_row_order() {
        let rows = vec![
            entry("Dr. Martinez", "Downtown Clinic", (2025, 3, 10), 9, 10, 1, 0),
            entry("Dr. Johnson", "Downtown Clinic", (2025, 3, 10), 9, 10, 1, 0),
        ];
        let slots = available_slots(&rows, &SlotQuery::new(30));
        assert_eq!(slots[0].doctor, "Dr. Martinez");
        assert_eq!(slots[1].doctor, "Dr. Johnson");
    }

    #[test]
    fn test_limit_and_not_before() {
        let rows = vec![entry("Dr. Lee", "Uptown Center", (2025, 3, 10), 9, 12, 6, 0)];
        let query = SlotQuery {
            limit: 2,
            not_before: Some(NaiveDate::from_ymd_opt(2025, 3, 10).unwrap().and_hms_opt(10, 0, 0).unwrap()),
            ..SlotQuery::new(30)
        };
        let slots = available_slots(&rows, &query);
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].time, NaiveTime::from_hms_opt(10, 0, 0).unwrap());
    }

    #[test]
    fn test_past_positions_do_not_use_up_capacity() {
        let rows = vec![entry("Dr. Lee", "Uptown Center", (2025, 3, 10), 9, 17, 3, 0)];
        let query = SlotQuery {
            not_before: Some(NaiveDate::from_ymd_opt(2025, 3, 10).unwrap().and_hms_opt(12, 0, 0).unwrap()),
            ..SlotQuery::for_pair("Dr. Lee", "Uptown Center", 30)
        };
        let times: Vec<String> = available_slots(&rows, &query)
            .iter()
            .map(|s| s.time.format("%H:%M").to_string())
            .collect();
        assert_eq!(times, vec!["12:00", "12:30", "13:00"]);
    }

    #[test]
    fn test_booked_times_are_skipped() {
        let rows = vec![entry("Dr. Lee", "Uptown Center", (2025, 3, 10), 9, 12, 4, 1)];
        let mut booked = slot_at((2025, 3, 10), 9, 0);
        booked.duration_minutes = 60;
        let query = SlotQuery {
            taken: std::slice::from_ref(&booked),
            ..SlotQuery::for_pair("Dr. Lee", "Uptown Center", 60)
        };
        let times: Vec<String> = available_slots(&rows, &query)
            .iter()
            .map(|s| s.time.format("%H:%M").to_string())
            .collect();
        assert_eq!(times, vec!["10:00", "10:30", "11:00"]);
    }

    #[test]
    fn test_alternatives_respect_bookings() {
        let rows = vec![
            entry("Dr. Lee", "Uptown Center", (2025, 3, 10), 9, 12, 4, 4),
            entry("Dr. Johnson", "Downtown Clinic", (2025, 3, 10), 9, 10, 2, 1),
        ];
        let mut booked = slot_at((2025, 3, 10), 9, 0);
        booked.doctor = "Dr. Johnson".to_string();
        booked.duration_minutes = 60;
        let query = SlotQuery {
            taken: std::slice::from_ref(&booked),
            ..SlotQuery::for_pair("Dr. Lee", "Uptown Center", 30)
        };
        assert!(alternatives(&rows, &query).is_empty());
    }

    #[test]
    fn test_empty_schedule_is_empty() {
        assert!(available_slots(&[], &SlotQuery::new(60)).is_empty());
    }

    #[test]
    fn test_alternatives_skip_current_and_full_pairs() {
        let rows = vec![
            entry("Dr. Lee", "Uptown Center", (2025, 3, 10), 9, 12, 4, 4),
            entry("Dr. Johnson", "Downtown Clinic", (2025, 3, 10), 9, 12, 4, 0),
            entry("Dr. Martinez", "West Side Clinic", (2025, 3, 10), 9, 12, 2, 2),
            entry("Dr. Johnson", "Downtown Clinic", (2025, 3, 11), 9, 12, 4, 0),
        ];
        let pairs = alternatives(&rows, &SlotQuery::for_pair("Dr. Lee", "Uptown Center", 30));
        assert_eq!(pairs, vec![("Dr. Johnson".to_string(), "Downtown Clinic".to_string())]);
    }

    #[test]
    fn test_select_by_position() {
        let presented = vec![
            slot_at((2025, 3, 10), 9, 0),
            slot_at((2025, 3, 10), 9, 30),
            slot_at((2025, 3, 11), 10, 0),
        ];
        assert_eq!(select_slot("2", &presented), Some(&presented[1]));
        assert_eq!(select_slot("option 3 please", &presented), Some(&presented[2]));
        assert_eq!(select_slot("7", &presented), None);
    }

    #[test]
    fn test_select_by_time_of_day() {
        let presented = vec![slot_at((2025, 3, 10), 9, 0), slot_at((2025, 3, 10), 14, 30)];
        assert_eq!(select_slot("2:30 pm works", &presented), Some(&presented[1]));
        assert_eq!(select_slot("2:30", &presented), Some(&presented[1]));
        assert_eq!(select_slot("9am", &presented), Some(&presented[0]));
        assert_eq!(select_slot("11:00", &presented), None);
    }

    #[test]
    fn test_time_is_not_read_as_position() {
        let presented = vec![slot_at((2025, 3, 10), 9, 0), slot_at((2025, 3, 10), 14, 0)];
        assert_eq!(select_slot("2pm", &presented), Some(&presented[1]));
        assert_eq!(select_slot("1:00 pm? no, 9:00", &presented), Some(&presented[0]));
    }

    #[test]
    fn test_select_by_weekday() {
        let presented = vec![slot_at((2025, 3, 10), 9, 0), slot_at((2025, 3, 12), 9, 0)];
        assert_eq!(select_slot("Wednesday is best", &presented), Some(&presented[1]));
        assert_eq!(select_slot("how about friday", &presented), None);
    }

    #[test]
    fn test_years_are_not_positions() {
        let presented = vec![slot_at((2025, 3, 10), 9, 0), slot_at((2025, 3, 12), 9, 0)];
        assert_eq!(select_slot("2025", &presented), None);
    }
}
