use chrono::NaiveDateTime;

use super::format::{appointment_summary, clock, long_date};
use super::{apology, Turn};
use crate::db::booking::{commit_booking, confirmation_id, BookingRequest};
use crate::db::queries::DATE_FORMAT;
use crate::errors::BookingError;
use crate::models::{Appointment, ConversationRecord, NewPatient, PatientType, Slot};
use crate::services::directory::directory_dob;
use crate::services::messaging;

/// Everything the commit needs, or `None` when the record is still incomplete.
fn booking_request(record: &ConversationRecord, now: NaiveDateTime) -> Option<BookingRequest> {
    let patient_name = record.patient_name.clone()?;
    let date_of_birth = record.date_of_birth.clone()?;
    let phone = record.phone.clone()?;
    let email = record.email.clone()?;
    let doctor = record.preferred_doctor.clone()?;
    let location = record.location.clone()?;
    let patient_type = record.patient_type?;
    let date = record.appointment_date?;
    let time = record.appointment_time?;

    let existing_patient_id = match patient_type {
        PatientType::Returning => record.patient_id.clone(),
        PatientType::New => None,
    };

    Some(BookingRequest {
        confirmation_id: confirmation_id(now),
        existing_patient_id,
        patient: NewPatient {
            first_name: record.first_name().unwrap_or_default().to_string(),
            last_name: record.last_name().unwrap_or_default().to_string(),
            date_of_birth: directory_dob(&date_of_birth).unwrap_or_else(|| date_of_birth.clone()),
            phone_number: phone.clone(),
            email: email.clone(),
            preferred_doctor: doctor.clone(),
            location: location.clone(),
            last_visit_date: date.format(DATE_FORMAT).to_string(),
        },
        patient_name,
        date_of_birth,
        phone,
        email,
        slot: Slot {
            date,
            time,
            doctor,
            location,
            duration_minutes: record
                .appointment_duration
                .unwrap_or_else(|| patient_type.appointment_minutes()),
        },
        patient_type,
        insurance_carrier: record.insurance_carrier.clone()?,
        member_id: record.member_id.clone()?,
        group_number: record.group_number.clone()?,
        booked_at: now,
    })
}

async fn send_confirmations(turn: &Turn<'_>, appt: &Appointment) {
    let date = long_date(appt.appointment_date);
    let time = clock(appt.appointment_time);
    let body = format!(
        "APPOINTMENT CONFIRMATION\n\n\
         Dear {},\n\n\
         Your appointment has been confirmed:\n\n\
         Confirmation: {}\nDate: {date}\nTime: {time}\nDoctor: {}\nLocation: {}\nDuration: {} minutes\n\n\
         Please arrive 15 minutes early for check-in.\n\n\
         Thank you,\n{}\n",
        appt.patient_name,
        appt.confirmation_id,
        appt.doctor,
        appt.location,
        appt.duration_minutes,
        turn.state.config.clinic_name,
    );
    let sms = format!(
        "Appointment confirmed: {date} at {time} with {} at {}. Confirmation {}. Arrive 15 min early.",
        appt.doctor, appt.location, appt.confirmation_id
    );

    messaging::send_email(turn.state, &appt.email, "Appointment Confirmation", &body).await;
    messaging::send_sms(turn.state, &appt.phone, &sms).await;
}

/// Commits the booking. A slot that can no longer be booked clears the chosen time so the
/// conversation returns to scheduling.
pub async fn handle(turn: &Turn<'_>, record: &mut ConversationRecord) -> String {
    let Some(request) = booking_request(record, turn.now) else {
        return "I'm missing some information to confirm your appointment. Let me get those details."
            .to_string();
    };

    let outcome = match turn.state.conn() {
        Ok(mut conn) => commit_booking(&mut conn, &request),
        Err(e) => {
            tracing::error!(error = %e, "booking commit failed");
            return apology(turn, "confirming your appointment");
        }
    };

    match outcome {
        Ok(receipt) => {
            let appt = receipt.appointment;
            record.patient_id = Some(appt.patient_id.clone());
            record.confirmation_id = Some(appt.confirmation_id.clone());
            record.confirmation_sent = true;

            send_confirmations(turn, &appt).await;

            let next = match request.patient_type {
                PatientType::New => "I'll now send you the new patient intake forms to complete before your visit.",
                PatientType::Returning => "Next I'll go over what to bring to your visit.",
            };
            format!(
                "APPOINTMENT CONFIRMED!\n\n\
                 Confirmation number: {}\n\n\
                 {}\n\n\
                 Your appointment has been added to our system.\n\n\
                 NEXT STEPS:\n\
                 {next}\n\
                 You'll receive an email confirmation and appointment reminders.\n\
                 SMS reminders will be sent to {}.\n\n\
                 Reply when you're ready to continue.",
                appt.confirmation_id,
                appointment_summary(&appt, request.patient_type.visit_label()),
                appt.phone,
            )
        }
        Err(e @ (BookingError::CapacityExhausted | BookingError::NoScheduleWindow)) => {
            tracing::warn!(error = %e, slot = %request.slot.describe(), "selected slot can no longer be booked");
            record.appointment_date = None;
            record.appointment_time = None;
            record.presented_slots.clear();
            format!(
                "I'm sorry, {} is no longer available with {}. Reply and I'll show you the latest open times.",
                request.slot.describe(),
                request.slot.doctor,
            )
        }
        Err(BookingError::Storage(e)) => {
            tracing::error!(error = %e, "booking commit failed");
            apology(turn, "confirming your appointment")
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};

    use super::*;
    use crate::config::AppConfig;
    use crate::db::{init_db, queries};
    use crate::models::{PatientDirectoryEntry, ScheduleEntry, Stage};
    use crate::services::router;
    use crate::state::AppState;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 1).unwrap().and_hms_opt(12, 0, 0).unwrap()
    }

    fn state(available: i64, booked: i64) -> AppState {
        let conn = init_db(":memory:").unwrap();
        queries::insert_schedule_entry(
            &conn,
            &ScheduleEntry {
                id: 0,
                doctor_name: "Dr. Lee".to_string(),
                location: "Uptown Center".to_string(),
                date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
                start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                end_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
                available_slots: available,
                booked_slots: booked,
            },
        )
        .unwrap();
        queries::insert_patient(
            &conn,
            &PatientDirectoryEntry {
                patient_id: "P003".to_string(),
                first_name: "Jane".to_string(),
                last_name: "Smith".to_string(),
                date_of_birth: "1985-04-12".to_string(),
                phone_number: "555-222-3333".to_string(),
                email: "jane@example.com".to_string(),
                preferred_doctor: "Dr. Lee".to_string(),
                location: "Uptown Center".to_string(),
                last_visit_date: "2024-11-02".to_string(),
            },
        )
        .unwrap();
        AppState::new(conn, AppConfig::default())
    }

    fn complete_record() -> ConversationRecord {
        let mut r = ConversationRecord::new();
        r.patient_name = Some("John Doe".to_string());
        r.date_of_birth = Some("01/15/1990".to_string());
        r.phone = Some("987-654-3210".to_string());
        r.email = Some("john@x.com".to_string());
        r.preferred_doctor = Some("Dr. Lee".to_string());
        r.location = Some("Uptown Center".to_string());
        r.assign_patient_type(PatientType::New);
        r.appointment_date = NaiveDate::from_ymd_opt(2025, 3, 10);
        r.appointment_time = NaiveTime::from_hms_opt(9, 0, 0);
        r.insurance_carrier = Some("Aetna".to_string());
        r.member_id = Some("ABC123456".to_string());
        r.group_number = Some("GRP001".to_string());
        r
    }

    async fn run(state: &AppState, record: &mut ConversationRecord) -> String {
        let turn = Turn { state, message: "yes, confirm", now: now() };
        handle(&turn, record).await
    }

    #[tokio::test]
    async fn test_new_patient_booking_allocates_next_id() {
        let state = state(4, 0);
        let mut record = complete_record();

        let reply = run(&state, &mut record).await;

        assert!(record.confirmation_sent);
        assert_eq!(record.patient_id.as_deref(), Some("P004"));
        let confirmation = record.confirmation_id.clone().unwrap();
        assert!(confirmation.starts_with("CONF-20250301120000-"));
        assert!(reply.contains(&confirmation));
        assert!(reply.contains("Type: New Patient Consultation"));
        assert_eq!(router::next_stage(&record, Stage::Confirmation), Stage::Forms);

        let conn = state.conn().unwrap();
        let stored = queries::get_appointment(&conn, &confirmation).unwrap().unwrap();
        assert_eq!(stored.duration_minutes, 60);
        let patients = queries::list_patients(&conn).unwrap();
        let added = patients.iter().find(|p| p.patient_id == "P004").unwrap();
        assert_eq!(added.date_of_birth, "1990-01-15");
        assert_eq!(added.last_visit_date, "2025-03-10");
    }

    #[tokio::test]
    async fn test_returning_patient_keeps_id() {
        let state = state(4, 0);
        let mut record = complete_record();
        record.patient_name = Some("Jane Smith".to_string());
        record.date_of_birth = Some("04/12/1985".to_string());
        record.assign_patient_type(PatientType::Returning);
        record.patient_id = Some("P003".to_string());

        let reply = run(&state, &mut record).await;
        assert_eq!(record.patient_id.as_deref(), Some("P003"));
        assert!(reply.contains("Type: Follow-up Appointment"));

        let conn = state.conn().unwrap();
        assert_eq!(queries::list_patients(&conn).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_full_window_sends_conversation_back_to_scheduling() {
        let state = state(2, 2);
        let mut record = complete_record();

        let reply = run(&state, &mut record).await;

        assert!(!record.confirmation_sent);
        assert!(record.appointment_date.is_none());
        assert!(reply.contains("no longer available"));
        assert_eq!(router::next_stage(&record, Stage::Confirmation), Stage::Scheduling);
    }

    #[tokio::test]
    async fn test_slot_outside_any_window_is_rejected() {
        let state = state(4, 0);
        let mut record = complete_record();
        record.appointment_time = NaiveTime::from_hms_opt(15, 0, 0);

        run(&state, &mut record).await;
        assert!(record.appointment_time.is_none());
        assert!(record.patient_id.is_none());
    }
}
