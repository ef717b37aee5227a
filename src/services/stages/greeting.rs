use super::format::join_words;
use super::Turn;
use crate::models::{ConversationRecord, Field};
use crate::services::ai::reprompt;
use crate::services::extraction::clinic::{DOCTORS, LOCATIONS};
use crate::services::extraction::{self, GREETING_FIELDS};
use crate::services::router;

const DEMOGRAPHICS: [Field; 4] = [Field::PatientName, Field::DateOfBirth, Field::Phone, Field::Email];
const CLINIC_DETAILS: [Field; 2] = [Field::PreferredDoctor, Field::Location];

const DEMOGRAPHICS_PROMPT: &str = "You are a friendly medical clinic scheduling assistant. \
    You are collecting the patient's full name, date of birth (MM/DD/YYYY), phone number and \
    email address. Ask for every missing item in one short, warm message. Do not invent \
    details and do not ask about anything else.";

const CLINIC_PROMPT: &str = "You are a friendly medical clinic scheduling assistant. \
    You are asking which doctor the patient would like to see and at which location. \
    Ask for every missing item in one short message and mention the available options \
    exactly as given. Do not invent doctors or locations.";

fn catalog(names: &[crate::services::extraction::clinic::KnownName]) -> String {
    join_words(&names.iter().map(|n| n.canonical).collect::<Vec<_>>())
}

fn demographics_template(turn: &Turn<'_>, record: &ConversationRecord, missing: &[&str]) -> String {
    let asked_before = record.messages.iter().any(|m| m.role == "assistant");
    if asked_before {
        format!("Thank you! I still need your {}.", join_words(missing))
    } else {
        format!(
            "Hello and welcome to {}! I can help you book an appointment. \
             To get started, please share your {}.",
            turn.state.config.clinic_name,
            join_words(missing)
        )
    }
}

fn clinic_template(record: &ConversationRecord, missing: &[Field]) -> String {
    let greeting = match record.first_name() {
        Some(first) => format!("Thank you, {first}!"),
        None => "Thank you!".to_string(),
    };
    let question = match missing {
        [Field::PreferredDoctor] => "Which doctor would you like to see?",
        [Field::Location] => "Which location works best for you?",
        _ => "Which doctor would you like to see, and at which location?",
    };
    let mut reply = format!("{greeting} {question}");
    if missing.contains(&Field::PreferredDoctor) {
        reply.push_str(&format!(" Our doctors are {}.", catalog(DOCTORS)));
    }
    if missing.contains(&Field::Location) {
        reply.push_str(&format!(" We see patients at {}.", catalog(LOCATIONS)));
    }
    reply
}

/// Collects demographics first, then clinic preferences.
pub async fn handle(turn: &Turn<'_>, record: &mut ConversationRecord) -> String {
    let found = extraction::extract(turn.message, record, &GREETING_FIELDS);
    extraction::apply(record, &found);

    let missing_demographics = router::missing(record, &DEMOGRAPHICS);
    let missing_clinic = router::missing(record, &CLINIC_DETAILS);

    let (system_prompt, missing, fallback) = if !missing_demographics.is_empty() {
        let labels: Vec<&str> = missing_demographics.iter().map(Field::label).collect();
        let fallback = demographics_template(turn, record, &labels);
        (DEMOGRAPHICS_PROMPT, missing_demographics, fallback)
    } else if !missing_clinic.is_empty() {
        let fallback = clinic_template(record, &missing_clinic);
        (CLINIC_PROMPT, missing_clinic, fallback)
    } else {
        return "Perfect! I have all your information. Shall I look up your records and check \
                appointment availability?"
            .to_string();
    };

    let labels: Vec<&str> = missing.iter().map(Field::label).collect();
    let mut instruction = format!(
        "The patient still needs to provide: {}. Write a friendly reply asking for all of it at once.",
        join_words(&labels)
    );
    if system_prompt == CLINIC_PROMPT {
        instruction.push_str(&format!(
            " Doctors: {}. Locations: {}.",
            catalog(DOCTORS),
            catalog(LOCATIONS)
        ));
    }

    reprompt::phrase(
        turn.state.llm.as_deref(),
        system_prompt,
        &instruction,
        &record.messages,
        fallback,
    )
    .await
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::config::AppConfig;
    use crate::db::init_db;
    use crate::models::Stage;
    use crate::state::AppState;

    fn state() -> AppState {
        AppState::new(init_db(":memory:").unwrap(), AppConfig::default())
    }

    fn now() -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 1).unwrap().and_hms_opt(9, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_extracts_four_fields_and_asks_for_clinic_details() {
        let state = state();
        let message = "My name is John Doe, DOB 01/15/1990, phone 987-654-3210, email john@x.com";
        let turn = Turn { state: &state, message, now: now() };
        let mut record = ConversationRecord::new();
        record.push_user(message);

        let reply = handle(&turn, &mut record).await;

        assert_eq!(record.patient_name.as_deref(), Some("John Doe"));
        assert_eq!(record.date_of_birth.as_deref(), Some("01/15/1990"));
        assert_eq!(record.phone.as_deref(), Some("987-654-3210"));
        assert_eq!(record.email.as_deref(), Some("john@x.com"));
        assert!(record.preferred_doctor.is_none());
        assert!(record.location.is_none());
        assert_eq!(router::next_stage(&record, Stage::Greeting), Stage::Greeting);
        assert!(reply.starts_with("Thank you, John!"));
        assert!(reply.contains("Dr. Johnson, Dr. Martinez and Dr. Lee"));
    }

    #[tokio::test]
    async fn test_first_prompt_lists_missing_demographics() {
        let state = state();
        let turn = Turn { state: &state, message: "hello", now: now() };
        let mut record = ConversationRecord::new();
        record.push_user("hello");

        let reply = handle(&turn, &mut record).await;
        assert!(reply.contains("welcome to Medical Clinic"));
        assert!(reply.contains("full name, date of birth, phone number and email address"));
    }

    #[tokio::test]
    async fn test_existing_values_are_not_overwritten() {
        let state = state();
        let message = "Actually my email is other@x.com, see Dr. Lee at uptown";
        let turn = Turn { state: &state, message, now: now() };
        let mut record = ConversationRecord::new();
        record.email = Some("john@x.com".to_string());

        handle(&turn, &mut record).await;
        assert_eq!(record.email.as_deref(), Some("john@x.com"));
        assert_eq!(record.preferred_doctor.as_deref(), Some("Dr. Lee"));
        assert_eq!(record.location.as_deref(), Some("Uptown Center"));
    }
}
