use super::format::{clock, long_date};
use super::{apology, Turn};
use crate::db::queries;
use crate::models::{ConversationRecord, FormTracking, PatientType};
use crate::services::messaging;

fn intake_email(record: &ConversationRecord, date: &str, time: &str, clinic_name: &str) -> String {
    format!(
        "Dear {name},\n\n\
         Welcome to our medical practice! We're looking forward to seeing you for your appointment \
         with {doctor} on {date} at {time}.\n\n\
         As a new patient, please complete the attached intake forms before your visit:\n\n\
         ATTACHED FORMS:\n\
         • New Patient Intake Form (PDF)\n\n\
         INSTRUCTIONS:\n\
         1. Complete all sections of the form\n\
         2. Please return the forms at least 24 hours before your appointment\n\
         3. You can email the completed forms back to us or bring them with you\n\
         4. If you prefer, you can arrive 30 minutes early to complete forms in our office\n\n\
         WHAT TO BRING TO YOUR APPOINTMENT:\n\
         • Completed intake forms (if not already submitted)\n\
         • Valid photo identification\n\
         • Current insurance card\n\
         • List of current medications (including dosages)\n\
         • Any relevant medical records from previous doctors\n\n\
         APPOINTMENT DETAILS:\n\
         Date: {date}\nTime: {time}\nDoctor: {doctor}\nLocation: {location}\n\
         Duration: {duration} minutes\nPatient Type: New Patient Consultation\n\n\
         OFFICE POLICIES:\n\
         • Please arrive 15 minutes early for check-in\n\
         • Appointment cancellations require 24-hour notice\n\n\
         Thank you,\n{clinic_name}\n",
        name = record.patient_name.as_deref().unwrap_or_default(),
        doctor = record.preferred_doctor.as_deref().unwrap_or_default(),
        location = record.location.as_deref().unwrap_or_default(),
        duration = record.appointment_duration.unwrap_or_default(),
    )
}

/// New patients are emailed the intake forms and tracked; returning patients are told what
/// to bring.
pub async fn handle(turn: &Turn<'_>, record: &mut ConversationRecord) -> String {
    let (Some(date), Some(time)) = (record.appointment_date, record.appointment_time) else {
        return "Your appointment needs to be confirmed before I can send the intake forms."
            .to_string();
    };
    let when = format!("{} at {}", long_date(date), clock(time));
    let name = record.patient_name.clone().unwrap_or_default();
    let doctor = record.preferred_doctor.clone().unwrap_or_default();

    if record.patient_type == Some(PatientType::Returning) {
        record.forms_sent = true;
        return format!(
            "Welcome back, {name}! Since you're a returning patient, you don't need to complete new \
             intake forms.\n\n\
             WHAT TO BRING:\n\
             • A valid photo ID\n\
             • Your current insurance card\n\
             • A list of any new medications or changes since your last visit\n\
             • Any relevant medical records from other providers\n\n\
             Your appointment is confirmed for {when} with {doctor}. \
             Reply when you're ready and I'll set up your appointment reminders."
        );
    }

    let email = record.email.clone().unwrap_or_default();
    let tracking = FormTracking {
        patient_id: record.patient_id.clone().unwrap_or_default(),
        patient_name: name.clone(),
        email: email.clone(),
        appointment_date: date,
        appointment_time: time,
        sent_at: turn.now,
        forms_completed: "Pending".to_string(),
        forms_returned: "No".to_string(),
        reminder_count: 0,
    };
    let tracked = turn
        .state
        .conn()
        .and_then(|conn| queries::insert_form_tracking(&conn, &tracking));
    if let Err(e) = tracked {
        tracing::error!(error = %e, "failed to record intake form delivery");
        return apology(turn, "sending your intake forms");
    }

    let body = intake_email(record, &long_date(date), &clock(time), &turn.state.config.clinic_name);
    let subject = format!("New Patient Intake Forms - Appointment {}", long_date(date));
    messaging::send_email(turn.state, &email, &subject, &body).await;
    record.forms_sent = true;

    format!(
        "PATIENT INTAKE FORMS SENT\n\n\
         {name}, since this is your first visit with us, I've sent the New Patient Intake Form to \
         your email address: {email}\n\n\
         IMPORTANT INSTRUCTIONS:\n\
         • Please complete and return the forms at least 24 hours before your appointment\n\
         • You can fill them out digitally or print and complete them by hand\n\
         • Bring a completed copy with you to your appointment\n\
         • Also bring a valid photo ID and your insurance card\n\n\
         If you don't see the email in your inbox, please check your spam folder.\n\n\
         Your appointment is scheduled for {when} with {doctor}. \
         Reply when you're ready and I'll set up your appointment reminders."
    )
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::{NaiveDate, NaiveTime};

    use super::*;
    use crate::config::AppConfig;
    use crate::db::init_db;
    use crate::models::Stage;
    use crate::services::messaging::EmailProvider;
    use crate::services::router;
    use crate::state::AppState;

    struct Outbox {
        sent: Arc<Mutex<Vec<(String, String)>>>,
    }

    #[async_trait]
    impl EmailProvider for Outbox {
        async fn send_email(&self, to: &str, subject: &str, _body: &str) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push((to.to_string(), subject.to_string()));
            Ok(())
        }
    }

    fn confirmed(patient_type: PatientType) -> ConversationRecord {
        let mut r = ConversationRecord::new();
        r.patient_name = Some("John Doe".to_string());
        r.email = Some("john@x.com".to_string());
        r.preferred_doctor = Some("Dr. Lee".to_string());
        r.location = Some("Uptown Center".to_string());
        r.patient_id = Some("P004".to_string());
        r.assign_patient_type(patient_type);
        r.appointment_date = NaiveDate::from_ymd_opt(2025, 3, 10);
        r.appointment_time = NaiveTime::from_hms_opt(9, 0, 0);
        r.confirmation_sent = true;
        r
    }

    fn turn(state: &AppState) -> Turn<'_> {
        Turn {
            state,
            message: "ok",
            now: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap().and_hms_opt(12, 5, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_new_patient_gets_forms_and_tracking_row() {
        let sent = Arc::new(Mutex::new(vec![]));
        let mut state = AppState::new(init_db(":memory:").unwrap(), AppConfig::default());
        state.email = Some(Box::new(Outbox { sent: sent.clone() }));
        let mut record = confirmed(PatientType::New);

        let reply = handle(&turn(&state), &mut record).await;

        assert!(record.forms_sent);
        assert!(reply.contains("john@x.com"));
        assert_eq!(router::next_stage(&record, Stage::Forms), Stage::Reminders);
        assert_eq!(
            sent.lock().unwrap()[0],
            ("john@x.com".to_string(), "New Patient Intake Forms - Appointment Monday, March 10, 2025".to_string())
        );

        let conn = state.conn().unwrap();
        let rows = queries::list_form_tracking(&conn, "P004").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].forms_completed, "Pending");
        assert_eq!(rows[0].reminder_count, 0);
    }

    #[tokio::test]
    async fn test_returning_patient_is_told_what_to_bring() {
        let state = AppState::new(init_db(":memory:").unwrap(), AppConfig::default());
        let mut record = confirmed(PatientType::Returning);

        let reply = handle(&turn(&state), &mut record).await;

        assert!(record.forms_sent);
        assert!(reply.contains("WHAT TO BRING"));
        let conn = state.conn().unwrap();
        assert!(queries::list_form_tracking(&conn, "P004").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_email_provider_does_not_block_forms() {
        let state = AppState::new(init_db(":memory:").unwrap(), AppConfig::default());
        let mut record = confirmed(PatientType::New);
        handle(&turn(&state), &mut record).await;
        assert!(record.forms_sent);
    }
}
