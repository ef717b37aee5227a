//! One handler per conversation stage. A handler reads the patient's message, updates the
//! record, and returns exactly one reply. Handlers never choose the next stage; the router
//! derives it from the record afterwards.

pub mod confirmation;
pub mod format;
pub mod forms;
pub mod greeting;
pub mod insurance;
pub mod lookup;
pub mod reminders;
pub mod scheduling;

use chrono::NaiveDateTime;

use crate::models::{ConversationRecord, Stage};
use crate::state::AppState;

/// Inputs shared by every handler for one turn.
pub struct Turn<'a> {
    pub state: &'a AppState,
    pub message: &'a str,
    pub now: NaiveDateTime,
}

pub async fn handle(stage: Stage, turn: &Turn<'_>, record: &mut ConversationRecord) -> String {
    match stage {
        Stage::Greeting => greeting::handle(turn, record).await,
        Stage::Lookup => lookup::handle(turn, record),
        Stage::Scheduling => scheduling::handle(turn, record).await,
        Stage::Insurance => insurance::handle(turn, record),
        Stage::Confirmation => confirmation::handle(turn, record).await,
        Stage::Forms => forms::handle(turn, record).await,
        Stage::Reminders => reminders::handle(turn, record),
        Stage::Complete => complete(turn, record),
    }
}

fn complete(turn: &Turn<'_>, record: &ConversationRecord) -> String {
    let name = record.first_name().unwrap_or("there");
    match (record.appointment_date, record.appointment_time) {
        (Some(date), Some(time)) => format!(
            "You're all set, {name}! Your appointment is on {} at {} with {}. \
             If you need to make changes, please call our office at {}.",
            format::long_date(date),
            format::clock(time),
            record.preferred_doctor.as_deref().unwrap_or("your doctor"),
            turn.state.config.office_phone,
        ),
        _ => format!(
            "You're all set, {name}! If you need anything else, please call our office at {}.",
            turn.state.config.office_phone
        ),
    }
}

/// The single polite reply for a turn whose work could not be finished.
pub(crate) fn apology(turn: &Turn<'_>, doing: &str) -> String {
    format!(
        "I'm sorry, I ran into a problem {doing}. Please try again in a moment, \
         or call our office at {}.",
        turn.state.config.office_phone
    )
}
