//! Reply text helpers shared by the stage handlers.

use chrono::{NaiveDate, NaiveTime};

use crate::db::queries::DATE_FORMAT;
use crate::models::{Appointment, Slot};

pub fn long_date(date: NaiveDate) -> String {
    date.format("%A, %B %d, %Y").to_string()
}

pub fn clock(time: NaiveTime) -> String {
    time.format("%I:%M %p").to_string()
}

/// A stored `YYYY-MM-DD` date in long form, or the raw text when it does not parse.
pub fn stored_date(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return "N/A".to_string();
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map(long_date)
        .unwrap_or_else(|_| raw.to_string())
}

/// `1. Monday, March 10, 2025 at 09:00 AM`, one per line.
pub fn numbered_slots(slots: &[Slot]) -> String {
    slots
        .iter()
        .enumerate()
        .map(|(i, slot)| format!("{}. {}", i + 1, slot.describe()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// "a", "a and b", "a, b and c"
pub fn join_words<S: AsRef<str>>(items: &[S]) -> String {
    match items {
        [] => String::new(),
        [only] => only.as_ref().to_string(),
        [rest @ .., last] => format!(
            "{} and {}",
            rest.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(", "),
            last.as_ref()
        ),
    }
}

pub fn appointment_summary(appt: &Appointment, visit_label: &str) -> String {
    format!(
        "APPOINTMENT DETAILS:\n\
         Patient: {}\n\
         Date: {}\n\
         Time: {}\n\
         Duration: {} minutes\n\
         Doctor: {}\n\
         Location: {}\n\
         Type: {}\n\n\
         PATIENT INFORMATION:\n\
         Phone: {}\n\
         Email: {}\n\
         Date of Birth: {}\n\
         Patient ID: {}\n\n\
         INSURANCE INFORMATION:\n\
         Carrier: {}\n\
         Member ID: {}\n\
         Group: {}",
        appt.patient_name,
        long_date(appt.appointment_date),
        clock(appt.appointment_time),
        appt.duration_minutes,
        appt.doctor,
        appt.location,
        visit_label,
        appt.phone,
        appt.email,
        appt.date_of_birth,
        appt.patient_id,
        appt.insurance_carrier,
        appt.member_id,
        appt.group_number,
    )
}
