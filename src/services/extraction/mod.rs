//! Pattern-based field extraction from free-text replies.
//!
//! Each field owns an ordered list of independent rules; the first rule that produces a
//! value wins. Rules are plain functions over the input text so they can be exercised with
//! literal strings. Only fields still absent from the record are considered, and applying an
//! extraction never overwrites a value that is already present.

pub mod clinic;
pub mod insurance;
pub mod patient;

use crate::models::{ConversationRecord, Field};

/// Fields collected during the greeting stage.
pub const GREETING_FIELDS: [Field; 6] = [
    Field::PatientName,
    Field::DateOfBirth,
    Field::Phone,
    Field::Email,
    Field::PreferredDoctor,
    Field::Location,
];

/// Fields collected during the insurance stage.
pub const INSURANCE_FIELDS: [Field; 3] =
    [Field::InsuranceCarrier, Field::MemberId, Field::GroupNumber];

#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub field: Field,
    pub value: String,
    /// Name of the rule that produced the value.
    pub rule: &'static str,
}

pub struct Rule {
    pub name: &'static str,
    pub extract: fn(&str) -> Option<String>,
}

static NAME_RULES: [Rule; 2] = [
    Rule { name: "introduction", extract: patient::name_from_introduction },
    Rule { name: "bare_name", extract: patient::bare_name },
];

static DOB_RULES: [Rule; 1] = [Rule { name: "mm_dd_yyyy", extract: patient::date_of_birth }];

static PHONE_RULES: [Rule; 1] = [Rule { name: "ten_digits", extract: patient::phone }];

static EMAIL_RULES: [Rule; 1] = [Rule { name: "address", extract: patient::email }];

static DOCTOR_RULES: [Rule; 1] = [Rule { name: "known_doctor", extract: clinic::doctor }];

static LOCATION_RULES: [Rule; 1] = [Rule { name: "known_location", extract: clinic::location }];

static CARRIER_RULES: [Rule; 2] = [
    Rule { name: "carrier_name", extract: insurance::carrier_by_name },
    Rule { name: "carrier_abbreviation", extract: insurance::carrier_by_abbreviation },
];

static MEMBER_ID_RULES: [Rule; 4] = [
    Rule { name: "keyword", extract: insurance::member_id_keyword },
    Rule { name: "generic_span", extract: insurance::member_id_generic },
    Rule { name: "letters_digits", extract: insurance::member_id_letters_digits },
    Rule { name: "numeric", extract: insurance::member_id_numeric },
];

static GROUP_RULES: [Rule; 4] = [
    Rule { name: "individual_plan", extract: insurance::group_individual },
    Rule { name: "grp_code", extract: insurance::group_code },
    Rule { name: "keyword", extract: insurance::group_keyword },
    Rule { name: "letters_digits", extract: insurance::group_letters_digits },
];

/// The ordered rules for a field. Fields that are not extracted from text have none.
pub fn rules_for(field: Field) -> &'static [Rule] {
    match field {
        Field::PatientName => &NAME_RULES,
        Field::DateOfBirth => &DOB_RULES,
        Field::Phone => &PHONE_RULES,
        Field::Email => &EMAIL_RULES,
        Field::PreferredDoctor => &DOCTOR_RULES,
        Field::Location => &LOCATION_RULES,
        Field::InsuranceCarrier => &CARRIER_RULES,
        Field::MemberId => &MEMBER_ID_RULES,
        Field::GroupNumber => &GROUP_RULES,
        _ => &[],
    }
}

/// Runs the first matching rule for one field.
pub fn extract_field(field: Field, text: &str) -> Option<Extraction> {
    extract_field_where(field, text, |_| true)
}

/// Like [`extract_field`], but a rule whose value `accept` refuses falls through to the next rule.
fn extract_field_where(field: Field, text: &str, accept: impl Fn(&str) -> bool) -> Option<Extraction> {
    rules_for(field).iter().find_map(|rule| {
        (rule.extract)(text)
            .filter(|value| accept(value.as_str()))
            .map(|value| Extraction {
                field,
                value,
                rule: rule.name,
            })
    })
}

/// Newly discovered values for the requested fields that the record does not have yet.
pub fn extract(text: &str, record: &ConversationRecord, fields: &[Field]) -> Vec<Extraction> {
    let wanted: Vec<Field> = fields.iter().copied().filter(|field| !record.has(*field)).collect();
    let member_id = wanted
        .contains(&Field::MemberId)
        .then(|| extract_field(Field::MemberId, text))
        .flatten()
        .map(|found| found.value);

    wanted
        .iter()
        .filter_map(|field| match (field, &member_id) {
            // A token taken as this turn's member ID is never also the group number.
            (Field::GroupNumber, Some(member_id)) => {
                extract_field_where(*field, text, |value| !value.eq_ignore_ascii_case(member_id))
            }
            _ => extract_field(*field, text),
        })
        .collect()
}

/// Stores extractions in the record without overwriting. Returns how many were stored.
pub fn apply(record: &mut ConversationRecord, found: &[Extraction]) -> usize {
    let mut stored = 0;
    for extraction in found {
        if record.set_if_absent(extraction.field, extraction.value.clone()) {
            tracing::debug!(
                field = extraction.field.as_str(),
                rule = extraction.rule,
                "extracted field"
            );
            stored += 1;
        }
    }
    stored
}

/// Case-insensitive whole-word phrase search. `needle` must already be lower-case.
pub(crate) fn contains_phrase(haystack_lower: &str, needle: &str) -> bool {
    haystack_lower.match_indices(needle).any(|(start, _)| {
        let before = haystack_lower[..start].chars().next_back();
        let after = haystack_lower[start + needle.len()..].chars().next();
        !before.is_some_and(|c| c.is_alphanumeric()) && !after.is_some_and(|c| c.is_alphanumeric())
    })
}
