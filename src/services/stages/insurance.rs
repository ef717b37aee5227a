use super::Turn;
use crate::models::{ConversationRecord, Field};
use crate::services::extraction::{self, INSURANCE_FIELDS};
use crate::services::router;

pub(crate) const CARRIER_PROMPT: &str = "Now I need to collect your insurance information for billing purposes.\n\n\
    First, what's your insurance carrier? Common carriers include:\n\
    • Blue Cross Blue Shield (BCBS)\n\
    • Aetna\n\
    • UnitedHealth/United Healthcare\n\
    • Cigna\n\
    • Humana\n\
    • Kaiser Permanente\n\
    • Medicare/Medicaid\n\n\
    What insurance do you have?";

const GROUP_PROMPT: &str = "Great! The last piece of insurance information I need is your Group Number. \
    This is also found on your insurance card, often labeled as \"Group #\" or \"GRP #\".\n\n\
    If you don't see a group number on your card, or if you have individual insurance, just let me \
    know and I'll mark it as \"Individual Plan\".\n\n\
    What's your Group Number?";

fn member_id_prompt(carrier: &str) -> String {
    format!(
        "Thank you! I have {carrier} as your insurance carrier.\n\n\
         Now I need your Member ID (also called Policy Number or Subscriber ID). This is usually \
         found on the front of your insurance card. It may contain letters and numbers.\n\n\
         What's your Member ID?"
    )
}

/// Asks for the first insurance field still missing.
pub fn handle(turn: &Turn<'_>, record: &mut ConversationRecord) -> String {
    let found = extraction::extract(turn.message, record, &INSURANCE_FIELDS);
    for extraction in &found {
        tracing::debug!(field = extraction.field.as_str(), rule = extraction.rule, "insurance field extracted");
    }
    extraction::apply(record, &found);

    match router::missing(record, &INSURANCE_FIELDS).first() {
        Some(Field::InsuranceCarrier) => CARRIER_PROMPT.to_string(),
        Some(Field::MemberId) => member_id_prompt(record.insurance_carrier.as_deref().unwrap_or("your insurance")),
        Some(_) => GROUP_PROMPT.to_string(),
        None => "Perfect! I have all your insurance information. Shall I confirm your appointment?"
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::config::AppConfig;
    use crate::db::init_db;
    use crate::models::Stage;
    use crate::state::AppState;

    fn run(message: &str, record: &mut ConversationRecord) -> String {
        let state = AppState::new(init_db(":memory:").unwrap(), AppConfig::default());
        let turn = Turn {
            state: &state,
            message,
            now: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap().and_hms_opt(9, 0, 0).unwrap(),
        };
        handle(&turn, record)
    }

    #[test]
    fn test_prompts_walk_through_missing_fields() {
        let mut record = ConversationRecord::new();
        assert_eq!(run("hmm", &mut record), CARRIER_PROMPT);

        let reply = run("I have Aetna", &mut record);
        assert_eq!(record.insurance_carrier.as_deref(), Some("Aetna"));
        assert!(reply.starts_with("Thank you! I have Aetna"));

        let reply = run("member id ABC123456", &mut record);
        assert_eq!(record.member_id.as_deref(), Some("ABC123456"));
        assert!(reply.contains("Group Number"));
    }

    #[test]
    fn test_missing_member_id_keeps_insurance_stage() {
        let mut record = ConversationRecord::new();
        run("Aetna, no group number", &mut record);
        assert!(record.member_id.is_none());
        assert_eq!(router::next_stage(&record, Stage::Insurance), Stage::Insurance);
    }

    #[test]
    fn test_all_fields_in_one_reply() {
        let mut record = ConversationRecord::new();
        let reply = run("BCBS member id XYZ987654 group GRP001", &mut record);
        assert_eq!(record.insurance_carrier.as_deref(), Some("Blue Cross Blue Shield"));
        assert_eq!(record.group_number.as_deref(), Some("GRP001"));
        assert!(reply.starts_with("Perfect!"));
    }
}
