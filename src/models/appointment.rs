use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use super::schedule::Slot;

/// One row of the appointments export, keyed by confirmation id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub confirmation_id: String,
    pub patient_name: String,
    pub patient_id: String,
    pub date_of_birth: String,
    pub phone: String,
    pub email: String,
    pub doctor: String,
    pub location: String,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub duration_minutes: u32,
    pub patient_type: String,
    pub insurance_carrier: String,
    pub member_id: String,
    pub group_number: String,
    pub booked_at: NaiveDateTime,
    pub status: AppointmentStatus,
}

impl Appointment {
    pub fn starts_at(&self) -> NaiveDateTime {
        self.appointment_date.and_time(self.appointment_time)
    }

    /// The time this appointment occupies in the doctor's calendar.
    pub fn slot(&self) -> Slot {
        Slot {
            date: self.appointment_date,
            time: self.appointment_time,
            doctor: self.doctor.clone(),
            location: self.location.clone(),
            duration_minutes: self.duration_minutes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Confirmed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "cancelled" => AppointmentStatus::Cancelled,
            _ => AppointmentStatus::Confirmed,
        }
    }
}

/// Intake-form delivery tracking for a new patient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormTracking {
    pub patient_id: String,
    pub patient_name: String,
    pub email: String,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub sent_at: NaiveDateTime,
    pub forms_completed: String,
    pub forms_returned: String,
    pub reminder_count: i64,
}
