//! Stage transitions as pure predicates over the conversation record.
//!
//! Each stage names the fields it needs before it can run and the fields it produces. The
//! next stage is always computed from those two tables, so a stage whose upstream data has
//! gone missing routes back to the earliest stage that supplies it.

use crate::models::{ConversationRecord, Field, Stage};

pub fn requires(stage: Stage) -> &'static [Field] {
    match stage {
        Stage::Greeting => &[],
        Stage::Lookup => &[Field::PatientName, Field::DateOfBirth],
        Stage::Scheduling => &[Field::PatientType, Field::PreferredDoctor, Field::Location],
        Stage::Insurance => &[Field::AppointmentDate, Field::AppointmentTime],
        Stage::Confirmation => &[
            Field::PatientName,
            Field::DateOfBirth,
            Field::Phone,
            Field::Email,
            Field::PreferredDoctor,
            Field::Location,
            Field::PatientType,
            Field::AppointmentDate,
            Field::AppointmentTime,
            Field::InsuranceCarrier,
            Field::MemberId,
            Field::GroupNumber,
        ],
        Stage::Forms => &[Field::ConfirmationSent],
        Stage::Reminders => &[Field::FormsSent],
        Stage::Complete => &[Field::RemindersScheduled],
    }
}

pub fn produces(stage: Stage) -> &'static [Field] {
    match stage {
        Stage::Greeting => &[
            Field::PatientName,
            Field::DateOfBirth,
            Field::Phone,
            Field::Email,
            Field::PreferredDoctor,
            Field::Location,
        ],
        Stage::Lookup => &[Field::PatientType],
        Stage::Scheduling => &[Field::AppointmentDate, Field::AppointmentTime],
        Stage::Insurance => &[Field::InsuranceCarrier, Field::MemberId, Field::GroupNumber],
        Stage::Confirmation => &[Field::ConfirmationSent],
        Stage::Forms => &[Field::FormsSent],
        Stage::Reminders => &[Field::RemindersScheduled],
        Stage::Complete => &[],
    }
}

/// The stage that collects a field.
pub fn supplier(field: Field) -> Stage {
    Stage::ALL
        .into_iter()
        .find(|stage| produces(*stage).contains(&field))
        .unwrap_or(Stage::Greeting)
}

pub fn missing(record: &ConversationRecord, fields: &[Field]) -> Vec<Field> {
    fields.iter().copied().filter(|f| !record.has(*f)).collect()
}

pub fn can_enter(record: &ConversationRecord, stage: Stage) -> bool {
    requires(stage).iter().all(|f| record.has(*f))
}

pub fn exit_met(record: &ConversationRecord, stage: Stage) -> bool {
    produces(stage).iter().all(|f| record.has(*f))
}

/// `stage` if its requirements hold, otherwise the earliest stage able to supply what is
/// missing, applied until a stage can be entered.
pub fn entry_stage(record: &ConversationRecord, stage: Stage) -> Stage {
    let mut stage = stage;
    loop {
        let fallback = missing(record, requires(stage))
            .into_iter()
            .map(supplier)
            .min();
        match fallback {
            Some(earlier) if earlier < stage => stage = earlier,
            _ => return stage,
        }
    }
}

/// Where the conversation resumes after `current` has handled a turn.
///
/// An unmet exit condition re-enters `current`. Otherwise the router moves forward past
/// any stage whose work is already done. Either way the result is passed through
/// [`entry_stage`], which may send the conversation back to an earlier stage.
pub fn next_stage(record: &ConversationRecord, current: Stage) -> Stage {
    if !exit_met(record, current) {
        return entry_stage(record, current);
    }
    let mut stage = current.successor();
    while stage != Stage::Complete && exit_met(record, stage) {
        stage = stage.successor();
    }
    entry_stage(record, stage)
}
