use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReminderKind {
    Standard,
    FormCheck,
    Confirmation,
}

impl ReminderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderKind::Standard => "standard",
            ReminderKind::FormCheck => "form_check",
            ReminderKind::Confirmation => "confirmation",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "form_check" => ReminderKind::FormCheck,
            "confirmation" => ReminderKind::Confirmation,
            _ => ReminderKind::Standard,
        }
    }

    pub fn message_template(&self) -> &'static str {
        match self {
            ReminderKind::Standard => "Standard appointment reminder",
            ReminderKind::FormCheck => "Form completion verification",
            ReminderKind::Confirmation => "Final confirmation and cancellation check",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReminderStatus {
    Scheduled,
    Sent,
    Failed,
    /// The appointment was cancelled before the reminder came due.
    Cancelled,
}

impl ReminderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderStatus::Scheduled => "scheduled",
            ReminderStatus::Sent => "sent",
            ReminderStatus::Failed => "failed",
            ReminderStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "sent" => ReminderStatus::Sent,
            "failed" => ReminderStatus::Failed,
            "cancelled" => ReminderStatus::Cancelled,
            _ => ReminderStatus::Scheduled,
        }
    }
}

/// A computed reminder event, before it is attached to a patient and stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReminderPlan {
    pub number: u8,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub kind: ReminderKind,
    pub message: &'static str,
}

impl ReminderPlan {
    pub fn due_at(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }
}

/// A stored reminder with its delivery bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reminder {
    pub reminder_id: String,
    pub confirmation_id: String,
    pub patient_id: String,
    pub patient_name: String,
    pub email: String,
    pub phone: String,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub doctor: String,
    pub location: String,
    pub reminder_number: u8,
    pub reminder_date: NaiveDate,
    pub reminder_time: NaiveTime,
    pub reminder_type: ReminderKind,
    pub message_template: String,
    pub status: ReminderStatus,
    pub sms_sent: bool,
    pub email_sent: bool,
    pub response_received: bool,
    pub created_at: NaiveDateTime,
}
