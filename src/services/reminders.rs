//! The three-reminder timeline, reminder message templates, and delivery of due reminders.

use std::sync::Arc;

use chrono::{Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

use crate::db::queries::{self, DATE_FORMAT};
use crate::models::{Appointment, Reminder, ReminderKind, ReminderPlan, ReminderStatus};
use crate::services::messaging;
use crate::state::AppState;

/// Anchor used when the appointment date cannot be read.
pub const FALLBACK_LEAD_DAYS: i64 = 7;

/// (days before the appointment, hour of day, kind)
const TIMELINE: [(i64, u32, ReminderKind); 3] = [
    (3, 10, ReminderKind::Standard),
    (1, 14, ReminderKind::FormCheck),
    (0, 8, ReminderKind::Confirmation),
];

/// Exactly three reminders for a `YYYY-MM-DD` appointment date. An unparseable date is
/// replaced by `today` plus a week before the offsets are applied.
pub fn plan_reminders(appointment_date: &str, today: NaiveDate) -> Vec<ReminderPlan> {
    let anchor = match NaiveDate::parse_from_str(appointment_date.trim(), DATE_FORMAT) {
        Ok(date) => date,
        Err(_) => {
            let fallback = today + Duration::days(FALLBACK_LEAD_DAYS);
            tracing::warn!(
                appointment_date,
                %fallback,
                "unparseable appointment date, anchoring reminders a week out"
            );
            fallback
        }
    };

    TIMELINE
        .iter()
        .zip(1u8..)
        .map(|(&(days_before, hour, kind), number)| ReminderPlan {
            number,
            date: anchor - Duration::days(days_before),
            time: NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN),
            kind,
            message: kind.message_template(),
        })
        .collect()
}

/// Stored reminder rows for a committed appointment.
pub fn reminder_rows(
    appointment: &Appointment,
    plans: &[ReminderPlan],
    created_at: NaiveDateTime,
) -> Vec<Reminder> {
    plans
        .iter()
        .map(|plan| Reminder {
            reminder_id: format!("REM-{}-{}", appointment.confirmation_id, plan.number),
            confirmation_id: appointment.confirmation_id.clone(),
            patient_id: appointment.patient_id.clone(),
            patient_name: appointment.patient_name.clone(),
            email: appointment.email.clone(),
            phone: appointment.phone.clone(),
            appointment_date: appointment.appointment_date,
            appointment_time: appointment.appointment_time,
            doctor: appointment.doctor.clone(),
            location: appointment.location.clone(),
            reminder_number: plan.number,
            reminder_date: plan.date,
            reminder_time: plan.time,
            reminder_type: plan.kind,
            message_template: plan.message.to_string(),
            status: ReminderStatus::Scheduled,
            sms_sent: false,
            email_sent: false,
            response_received: false,
            created_at,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReminderMessage {
    pub subject: String,
    pub email: String,
    pub sms: String,
}

pub fn compose(reminder: &Reminder, clinic_name: &str) -> ReminderMessage {
    let date = reminder.appointment_date.format("%A, %B %d, %Y");
    let time = reminder.appointment_time.format("%I:%M %p");
    let name = &reminder.patient_name;
    let doctor = &reminder.doctor;
    let location = &reminder.location;

    match reminder.reminder_type {
        ReminderKind::Standard => ReminderMessage {
            subject: format!("Appointment Reminder - {date}"),
            email: format!(
                "Dear {name},\n\n\
                 This is a reminder of your upcoming appointment:\n\n\
                 Date: {date}\nTime: {time}\nDoctor: {doctor}\nLocation: {location}\n\n\
                 Please arrive 15 minutes early for check-in.\n\n\
                 If you need to reschedule, please call our office at least 24 hours in advance.\n\n\
                 Thank you,\n{clinic_name}\n"
            ),
            sms: format!(
                "Reminder: Appointment {date} at {time} with {doctor} at {location}. Arrive 15 min early."
            ),
        },
        ReminderKind::FormCheck => ReminderMessage {
            subject: "Forms Check - Appointment Tomorrow".to_string(),
            email: format!(
                "Dear {name},\n\n\
                 Your appointment with {doctor} is tomorrow at {time}.\n\n\
                 IMPORTANT: Have you completed your intake forms?\n\n\
                 If not, please complete and return them today or bring them completed tomorrow.\n\n\
                 Please reply to confirm:\n1. Forms completed: YES/NO\n2. Appointment confirmed: YES/NO\n\n\
                 Thank you,\n{clinic_name}\n"
            ),
            sms: format!(
                "Appointment tomorrow at {time}. Have you completed your intake forms? \
                 Reply: 1=Forms done 2=Not done. Appointment confirmed?"
            ),
        },
        ReminderKind::Confirmation => ReminderMessage {
            subject: "Final Confirmation - Appointment Today".to_string(),
            email: format!(
                "Dear {name},\n\n\
                 Your appointment is TODAY at {time} with {doctor}.\n\n\
                 Please confirm:\n1. Are you still planning to attend? YES/NO\n\
                 2. If NO, please provide the reason for cancellation\n\n\
                 If yes, please arrive 15 minutes early.\n\n\
                 Thank you,\n{clinic_name}\n"
            ),
            sms: format!(
                "Appointment TODAY at {time}. Confirm attendance: YES/NO. \
                 If NO, reply with reason. Arrive 15 min early if attending."
            ),
        },
    }
}

#[derive(Debug, Default, Clone, Serialize, PartialEq)]
pub struct DispatchSummary {
    pub due: usize,
    pub sent: usize,
    pub failed: usize,
}

/// Sends every due reminder once over SMS and email and records the outcome. A reminder
/// counts as sent when at least one channel delivered. There are no retries.
pub async fn dispatch_due(state: &AppState, now: NaiveDateTime) -> anyhow::Result<DispatchSummary> {
    let due = {
        let conn = state.conn()?;
        queries::due_reminders(&conn, now)?
    };

    let mut summary = DispatchSummary {
        due: due.len(),
        ..DispatchSummary::default()
    };

    for reminder in &due {
        let message = compose(reminder, &state.config.clinic_name);
        let sms_sent = messaging::send_sms(state, &reminder.phone, &message.sms).await;
        let email_sent =
            messaging::send_email(state, &reminder.email, &message.subject, &message.email).await;

        let status = if sms_sent || email_sent {
            summary.sent += 1;
            ReminderStatus::Sent
        } else {
            summary.failed += 1;
            ReminderStatus::Failed
        };

        {
            let conn = state.conn()?;
            queries::record_reminder_delivery(&conn, &reminder.reminder_id, sms_sent, email_sent, status)?;
        }

        tracing::info!(
            reminder_id = %reminder.reminder_id,
            kind = reminder.reminder_type.as_str(),
            sms_sent,
            email_sent,
            status = status.as_str(),
            "reminder dispatched"
        );
    }

    Ok(summary)
}

/// Background loop: every `REMINDER_POLL_SECS` sends due reminders and drops expired
/// conversations.
pub fn spawn_dispatcher(state: Arc<AppState>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let period = std::time::Duration::from_secs(state.config.reminder_poll_secs);
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            let now = Local::now().naive_local();

            match dispatch_due(&state, now).await {
                Ok(summary) if summary.due > 0 => {
                    tracing::info!(due = summary.due, sent = summary.sent, failed = summary.failed, "reminder sweep finished");
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "reminder sweep failed"),
            }

            let expired = state
                .conn()
                .and_then(|conn| queries::expire_old_conversations(&conn, now));
            match expired {
                Ok(0) => {}
                Ok(count) => tracing::debug!(count, "expired conversations removed"),
                Err(e) => tracing::error!(error = %e, "failed to expire conversations"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AppointmentStatus;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn appointment() -> Appointment {
        Appointment {
            confirmation_id: "CONF-20250301120000-AB12".to_string(),
            patient_name: "John Doe".to_string(),
            patient_id: "P004".to_string(),
            date_of_birth: "01/15/1990".to_string(),
            phone: "987-654-3210".to_string(),
            email: "john@x.com".to_string(),
            doctor: "Dr. Lee".to_string(),
            location: "Uptown Center".to_string(),
            appointment_date: date("2025-03-10"),
            appointment_time: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            duration_minutes: 60,
            patient_type: "new".to_string(),
            insurance_carrier: "Aetna".to_string(),
            member_id: "ABC123456".to_string(),
            group_number: "GRP001".to_string(),
            booked_at: date("2025-03-01").and_hms_opt(12, 0, 0).unwrap(),
            status: AppointmentStatus::Confirmed,
        }
    }

    #[test]
    fn test_plan_for_known_date() {
        let plans = plan_reminders("2025-03-10", date("2025-01-01"));
        let got: Vec<(String, String, ReminderKind)> = plans
            .iter()
            .map(|p| (p.date.to_string(), p.time.format("%H:%M").to_string(), p.kind))
            .collect();
        assert_eq!(
            got,
            vec![
                ("2025-03-07".to_string(), "10:00".to_string(), ReminderKind::Standard),
                ("2025-03-09".to_string(), "14:00".to_string(), ReminderKind::FormCheck),
                ("2025-03-10".to_string(), "08:00".to_string(), ReminderKind::Confirmation),
            ]
        );
        assert_eq!(plans[1].message, "Form completion verification");
        assert_eq!(plans.iter().map(|p| p.number).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_unparseable_date_anchors_a_week_out() {
        let plans = plan_reminders("next tuesday", date("2025-03-01"));
        assert_eq!(plans.len(), 3);
        assert_eq!(plans[2].date, date("2025-03-08"));
        assert_eq!(plans[0].date, date("2025-03-05"));
    }

    #[test]
    fn test_plan_crosses_month_boundary() {
        let plans = plan_reminders("2025-03-01", date("2025-01-01"));
        assert_eq!(plans[0].date, date("2025-02-26"));
        assert_eq!(plans[1].date, date("2025-02-28"));
    }

    #[test]
    fn test_rows_are_keyed_by_confirmation() {
        let appt = appointment();
        let plans = plan_reminders("2025-03-10", date("2025-03-01"));
        let rows = reminder_rows(&appt, &plans, appt.booked_at);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].reminder_id, "REM-CONF-20250301120000-AB12-1");
        assert_eq!(rows[2].reminder_type, ReminderKind::Confirmation);
        assert!(rows.iter().all(|r| r.status == ReminderStatus::Scheduled && !r.sms_sent));
    }

    #[test]
    fn test_compose_per_kind() {
        let appt = appointment();
        let plans = plan_reminders("2025-03-10", date("2025-03-01"));
        let rows = reminder_rows(&appt, &plans, appt.booked_at);

        let standard = compose(&rows[0], "Medical Clinic");
        assert_eq!(standard.subject, "Appointment Reminder - Monday, March 10, 2025");
        assert!(standard.sms.contains("09:30 AM with Dr. Lee at Uptown Center"));
        assert!(standard.email.ends_with("Medical Clinic\n"));

        let forms = compose(&rows[1], "Medical Clinic");
        assert!(forms.sms.contains("intake forms"));

        let last = compose(&rows[2], "Medical Clinic");
        assert!(last.sms.starts_with("Appointment TODAY at 09:30 AM"));
    }
}
