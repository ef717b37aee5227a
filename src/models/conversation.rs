use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use super::schedule::Slot;

/// Phases of the intake conversation, in the order they must be completed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Greeting,
    Lookup,
    Scheduling,
    Insurance,
    Confirmation,
    Forms,
    Reminders,
    Complete,
}

impl Stage {
    pub const ALL: [Stage; 8] = [
        Stage::Greeting,
        Stage::Lookup,
        Stage::Scheduling,
        Stage::Insurance,
        Stage::Confirmation,
        Stage::Forms,
        Stage::Reminders,
        Stage::Complete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Greeting => "greeting",
            Stage::Lookup => "lookup",
            Stage::Scheduling => "scheduling",
            Stage::Insurance => "insurance",
            Stage::Confirmation => "confirmation",
            Stage::Forms => "forms",
            Stage::Reminders => "reminders",
            Stage::Complete => "complete",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "lookup" => Stage::Lookup,
            "scheduling" => Stage::Scheduling,
            "insurance" => Stage::Insurance,
            "confirmation" => Stage::Confirmation,
            "forms" => Stage::Forms,
            "reminders" => Stage::Reminders,
            "complete" => Stage::Complete,
            _ => Stage::Greeting,
        }
    }

    /// The stage that follows this one when its work is done. `Complete` is terminal.
    pub fn successor(&self) -> Stage {
        match self {
            Stage::Greeting => Stage::Lookup,
            Stage::Lookup => Stage::Scheduling,
            Stage::Scheduling => Stage::Insurance,
            Stage::Insurance => Stage::Confirmation,
            Stage::Confirmation => Stage::Forms,
            Stage::Forms => Stage::Reminders,
            Stage::Reminders => Stage::Complete,
            Stage::Complete => Stage::Complete,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PatientType {
    New,
    Returning,
}

impl PatientType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatientType::New => "new",
            PatientType::Returning => "returning",
        }
    }

    /// First visits get a full hour, follow-ups half of one.
    pub fn appointment_minutes(&self) -> u32 {
        match self {
            PatientType::New => 60,
            PatientType::Returning => 30,
        }
    }

    pub fn visit_label(&self) -> &'static str {
        match self {
            PatientType::New => "New Patient Consultation",
            PatientType::Returning => "Follow-up Appointment",
        }
    }
}

/// Every piece of data a stage can require or produce.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    PatientName,
    DateOfBirth,
    Phone,
    Email,
    PreferredDoctor,
    Location,
    PatientType,
    AppointmentDate,
    AppointmentTime,
    InsuranceCarrier,
    MemberId,
    GroupNumber,
    ConfirmationSent,
    FormsSent,
    RemindersScheduled,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::PatientName => "patient_name",
            Field::DateOfBirth => "date_of_birth",
            Field::Phone => "phone",
            Field::Email => "email",
            Field::PreferredDoctor => "preferred_doctor",
            Field::Location => "location",
            Field::PatientType => "patient_type",
            Field::AppointmentDate => "appointment_date",
            Field::AppointmentTime => "appointment_time",
            Field::InsuranceCarrier => "insurance_carrier",
            Field::MemberId => "member_id",
            Field::GroupNumber => "group_number",
            Field::ConfirmationSent => "confirmation_sent",
            Field::FormsSent => "forms_sent",
            Field::RemindersScheduled => "reminders_scheduled",
        }
    }

    /// How the field is named when asking the patient for it.
    pub fn label(&self) -> &'static str {
        match self {
            Field::PatientName => "full name",
            Field::DateOfBirth => "date of birth",
            Field::Phone => "phone number",
            Field::Email => "email address",
            Field::PreferredDoctor => "preferred doctor",
            Field::Location => "preferred location",
            Field::PatientType => "patient record",
            Field::AppointmentDate | Field::AppointmentTime => "appointment time",
            Field::InsuranceCarrier => "insurance carrier",
            Field::MemberId => "member ID",
            Field::GroupNumber => "group number",
            Field::ConfirmationSent => "appointment confirmation",
            Field::FormsSent => "intake forms",
            Field::RemindersScheduled => "reminders",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationMessage {
    pub role: String,
    pub content: String,
}

/// The typed record threaded through every stage of one intake conversation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConversationRecord {
    pub patient_name: Option<String>,
    /// `MM/DD/YYYY`, exactly as the patient typed it apart from separators.
    pub date_of_birth: Option<String>,
    /// `###-###-####`
    pub phone: Option<String>,
    pub email: Option<String>,
    pub preferred_doctor: Option<String>,
    pub location: Option<String>,
    pub patient_type: Option<PatientType>,
    /// `P###`, known for returning patients and assigned to new ones at booking commit.
    pub patient_id: Option<String>,
    pub insurance_carrier: Option<String>,
    pub member_id: Option<String>,
    pub group_number: Option<String>,
    pub appointment_date: Option<NaiveDate>,
    pub appointment_time: Option<NaiveTime>,
    pub appointment_duration: Option<u32>,
    pub confirmation_id: Option<String>,
    pub forms_sent: bool,
    pub confirmation_sent: bool,
    pub reminders_scheduled: bool,
    pub conversation_stage: Stage,
    /// The slot list shown in the most recent scheduling reply; selections index into it.
    #[serde(default)]
    pub presented_slots: Vec<Slot>,
    /// Set when the last availability check for the current doctor/location came back empty.
    #[serde(default)]
    pub slots_exhausted: bool,
    #[serde(default)]
    pub messages: Vec<ConversationMessage>,
}

impl ConversationRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, field: Field) -> bool {
        match field {
            Field::PatientName => self.patient_name.is_some(),
            Field::DateOfBirth => self.date_of_birth.is_some(),
            Field::Phone => self.phone.is_some(),
            Field::Email => self.email.is_some(),
            Field::PreferredDoctor => self.preferred_doctor.is_some(),
            Field::Location => self.location.is_some(),
            Field::PatientType => self.patient_type.is_some(),
            Field::AppointmentDate => self.appointment_date.is_some(),
            Field::AppointmentTime => self.appointment_time.is_some(),
            Field::InsuranceCarrier => self.insurance_carrier.is_some(),
            Field::MemberId => self.member_id.is_some(),
            Field::GroupNumber => self.group_number.is_some(),
            Field::ConfirmationSent => self.confirmation_sent,
            Field::FormsSent => self.forms_sent,
            Field::RemindersScheduled => self.reminders_scheduled,
        }
    }

    fn text_slot(&mut self, field: Field) -> Option<&mut Option<String>> {
        match field {
            Field::PatientName => Some(&mut self.patient_name),
            Field::DateOfBirth => Some(&mut self.date_of_birth),
            Field::Phone => Some(&mut self.phone),
            Field::Email => Some(&mut self.email),
            Field::PreferredDoctor => Some(&mut self.preferred_doctor),
            Field::Location => Some(&mut self.location),
            Field::InsuranceCarrier => Some(&mut self.insurance_carrier),
            Field::MemberId => Some(&mut self.member_id),
            Field::GroupNumber => Some(&mut self.group_number),
            _ => None,
        }
    }

    /// Writes a text field only when it is still empty. Returns whether the value was stored.
    pub fn set_if_absent(&mut self, field: Field, value: impl Into<String>) -> bool {
        match self.text_slot(field) {
            Some(slot) if slot.is_none() => {
                *slot = Some(value.into());
                true
            }
            _ => false,
        }
    }

    /// Explicit user-driven replacement, used when the patient picks a different doctor or
    /// location after a dead end. Extraction never goes through here.
    pub fn replace_preference(&mut self, field: Field, value: impl Into<String>) {
        if matches!(field, Field::PreferredDoctor | Field::Location) {
            if let Some(slot) = self.text_slot(field) {
                *slot = Some(value.into());
            }
        }
    }

    /// Sets the patient type and the appointment length that follows from it.
    pub fn assign_patient_type(&mut self, patient_type: PatientType) {
        self.patient_type = Some(patient_type);
        self.appointment_duration = Some(patient_type.appointment_minutes());
    }

    pub fn first_name(&self) -> Option<&str> {
        self.patient_name.as_deref()?.split_whitespace().next()
    }

    pub fn last_name(&self) -> Option<&str> {
        let mut parts = self.patient_name.as_deref()?.split_whitespace();
        parts.next()?;
        parts.last()
    }

    pub fn push_user(&mut self, content: &str) {
        self.messages.push(ConversationMessage {
            role: "user".to_string(),
            content: content.to_string(),
        });
    }

    pub fn push_assistant(&mut self, content: &str) {
        self.messages.push(ConversationMessage {
            role: "assistant".to_string(),
            content: content.to_string(),
        });
    }

    pub fn last_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
    }
}

/// A stored conversation: the record plus the session bookkeeping around it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub session_key: String,
    pub record: ConversationRecord,
    pub last_activity: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_if_absent_is_write_once() {
        let mut record = ConversationRecord::new();
        assert!(record.set_if_absent(Field::Email, "a@b.com"));
        assert!(!record.set_if_absent(Field::Email, "other@b.com"));
        assert_eq!(record.email.as_deref(), Some("a@b.com"));
    }

    #[test]
    fn test_set_if_absent_ignores_non_text_fields() {
        let mut record = ConversationRecord::new();
        assert!(!record.set_if_absent(Field::PatientType, "new"));
        assert!(record.patient_type.is_none());
    }

    #[test]
    fn test_duration_follows_patient_type() {
        let mut record = ConversationRecord::new();
        assert_eq!(record.appointment_duration, None);
        record.assign_patient_type(PatientType::New);
        assert_eq!(record.appointment_duration, Some(60));

        let mut record = ConversationRecord::new();
        record.assign_patient_type(PatientType::Returning);
        assert_eq!(record.appointment_duration, Some(30));
    }

    #[test]
    fn test_name_parts() {
        let mut record = ConversationRecord::new();
        record.patient_name = Some("Jane Smith".to_string());
        assert_eq!(record.first_name(), Some("Jane"));
        assert_eq!(record.last_name(), Some("Smith"));
    }

    #[test]
    fn test_stage_round_trip_names() {
        for stage in Stage::ALL {
            assert_eq!(Stage::parse(stage.as_str()), stage);
        }
        assert_eq!(Stage::parse("bogus"), Stage::Greeting);
    }

    #[test]
    fn test_record_deserializes_without_optional_collections() {
        let json = r#"{
            "patient_name": "John Doe", "date_of_birth": null, "phone": null, "email": null,
            "preferred_doctor": null, "location": null, "patient_type": null, "patient_id": null,
            "insurance_carrier": null, "member_id": null, "group_number": null,
            "appointment_date": null, "appointment_time": null, "appointment_duration": null,
            "confirmation_id": null, "forms_sent": false, "confirmation_sent": false,
            "reminders_scheduled": false, "conversation_stage": "lookup"
        }"#;
        let record: ConversationRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.conversation_stage, Stage::Lookup);
        assert!(record.messages.is_empty());
        assert!(record.presented_slots.is_empty());
    }
}
