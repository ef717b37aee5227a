use super::format::stored_date;
use super::{apology, Turn};
use crate::db::queries;
use crate::models::{ConversationRecord, Field, PatientDirectoryEntry, PatientType};
use crate::services::directory::find_patient;

/// Copies directory contact details and preferences into fields the patient has not given.
fn prefill(record: &mut ConversationRecord, entry: &PatientDirectoryEntry) {
    let known = [
        (Field::Phone, &entry.phone_number),
        (Field::Email, &entry.email),
        (Field::PreferredDoctor, &entry.preferred_doctor),
        (Field::Location, &entry.location),
    ];
    for (field, value) in known {
        let value = value.trim();
        if !value.is_empty() {
            record.set_if_absent(field, value);
        }
    }
}

/// Decides new vs returning. A miss in the directory is the new-patient path, not an error.
pub fn handle(turn: &Turn<'_>, record: &mut ConversationRecord) -> String {
    let (Some(name), Some(dob)) = (record.patient_name.clone(), record.date_of_birth.clone()) else {
        return "I need your full name and date of birth to look up your records. \
                Please provide them."
            .to_string();
    };

    let directory = turn
        .state
        .conn()
        .and_then(|conn| queries::list_patients(&conn));
    let directory = match directory {
        Ok(rows) => rows,
        Err(e) => {
            tracing::error!(error = %e, "patient lookup failed");
            return apology(turn, "looking up your records");
        }
    };

    match find_patient(&directory, &name, &dob) {
        Some(entry) => {
            tracing::info!(patient_id = %entry.patient_id, "returning patient found");
            record.assign_patient_type(PatientType::Returning);
            record.patient_id = Some(entry.patient_id.clone());
            prefill(record, entry);

            let doctor = match entry.preferred_doctor.trim() {
                "" => "your doctor",
                doctor => doctor,
            };
            format!(
                "Welcome back, {name}! I found your records. Your last visit was on {} with {doctor}. \
                 I can schedule you for a 30-minute follow-up appointment. Shall I check {}'s \
                 availability at {}?",
                stored_date(&entry.last_visit_date),
                record.preferred_doctor.as_deref().unwrap_or(doctor),
                record.location.as_deref().unwrap_or("your usual location"),
            )
        }
        None => {
            tracing::info!("no directory match, continuing as a new patient");
            record.assign_patient_type(PatientType::New);

            let mut reply = format!(
                "Welcome to our clinic, {name}! I don't see you in our system, so you'll be \
                 scheduled as a new patient with a 60-minute appointment. This gives the doctor \
                 extra time to review your medical history and perform a comprehensive examination."
            );
            match (&record.preferred_doctor, &record.location) {
                (Some(doctor), Some(location)) => reply.push_str(&format!(
                    " I see you'd like to see {doctor} at {location}. Shall I check their availability?"
                )),
                _ => reply.push_str(" Which doctor would you prefer to see, and at which location?"),
            }
            reply
        }
    }
}
