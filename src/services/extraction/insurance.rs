//! Insurance rules: carrier, member ID and group number.

use std::sync::LazyLock;

use regex::Regex;

use super::contains_phrase;

/// Longer names come first so "Blue Cross Blue Shield" is not read as "Blue Cross".
pub const CARRIERS: &[&str] = &[
    "Blue Cross Blue Shield",
    "Blue Cross",
    "Aetna",
    "United Healthcare",
    "UnitedHealth",
    "Cigna",
    "Humana",
    "Kaiser Permanente",
    "Anthem",
    "Molina",
    "Centene",
    "WellCare",
    "Medicare",
    "Medicaid",
];

const CARRIER_ABBREVIATIONS: &[(&str, &str)] = &[
    ("bcbs", "Blue Cross Blue Shield"),
    ("uhc", "UnitedHealth"),
    ("united", "UnitedHealth"),
    ("kaiser", "Kaiser Permanente"),
];

pub const INDIVIDUAL_PLAN: &str = "Individual Plan";

const NO_GROUP_PHRASES: &[&str] = &["individual", "no group", "none", "n/a", "na"];

static MEMBER_KEYWORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:member|policy|subscriber|id)(?:\s+(?:id|number|no\.?|#))?\s*(?:is\s+|:\s*|#\s*)?([a-z0-9][a-z0-9-]{5,19})\b",
    )
    .expect("valid regex")
});

static GENERIC_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([A-Za-z0-9][A-Za-z0-9-]{7,14})\b").expect("valid regex")
});

static LETTERS_DIGITS_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Za-z]{2,3}\d{6,12})\b").expect("valid regex"));

static NUMERIC_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{9,12})\b").expect("valid regex"));

static GRP_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(grp\d{3,6})\b").expect("valid regex"));

static GROUP_KEYWORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:group|grp)(?:\s+(?:number|num|no\.?|id|#))?\s*(?:is\s+|:\s*|#\s*)?([a-z0-9][a-z0-9-]{2,14})\b",
    )
    .expect("valid regex")
});

static GROUP_LETTERS_DIGITS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Za-z]{3}\d{3})\b").expect("valid regex"));

pub fn carrier_by_name(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    CARRIERS
        .iter()
        .find(|carrier| contains_phrase(&lower, &carrier.to_lowercase()))
        .map(|carrier| carrier.to_string())
}

pub fn carrier_by_abbreviation(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    CARRIER_ABBREVIATIONS
        .iter()
        .find(|(abbreviation, _)| contains_phrase(&lower, abbreviation))
        .map(|(_, carrier)| carrier.to_string())
}

/// 6 to 20 alphanumeric characters once dashes are ignored, with at least one digit.
fn plausible_member_id(candidate: &str) -> bool {
    let significant = candidate.chars().filter(|c| *c != '-').count();
    (6..=20).contains(&significant)
        && candidate.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        && candidate.chars().any(|c| c.is_ascii_digit())
}

fn first_capture(re: &Regex, text: &str, accept: impl Fn(&str) -> bool) -> Option<String> {
    re.captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .find(|candidate| accept(candidate))
        .map(str::to_string)
}

/// "member ID is ABC123456", "policy number: XYZ-998877".
pub fn member_id_keyword(text: &str) -> Option<String> {
    first_capture(&MEMBER_KEYWORD_RE, text, plausible_member_id)
}

/// Any 8 to 15 character token with a digit in it.
pub fn member_id_generic(text: &str) -> Option<String> {
    first_capture(&GENERIC_ID_RE, text, |candidate| {
        plausible_member_id(candidate) && !candidate.to_lowercase().starts_with("grp")
    })
}

pub fn member_id_letters_digits(text: &str) -> Option<String> {
    first_capture(&LETTERS_DIGITS_ID_RE, text, plausible_member_id)
}

pub fn member_id_numeric(text: &str) -> Option<String> {
    first_capture(&NUMERIC_ID_RE, text, plausible_member_id)
}

/// "individual", "no group", "none", "n/a" or "na" as whole words.
pub fn group_individual(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    NO_GROUP_PHRASES
        .iter()
        .any(|phrase| contains_phrase(&lower, phrase))
        .then(|| INDIVIDUAL_PLAN.to_string())
}

pub fn group_code(text: &str) -> Option<String> {
    first_capture(&GRP_CODE_RE, text, |_| true).map(|code| code.to_uppercase())
}

/// "group number is 55432", "grp # A-1001".
pub fn group_keyword(text: &str) -> Option<String> {
    first_capture(&GROUP_KEYWORD_RE, text, |candidate| {
        candidate.chars().any(|c| c.is_ascii_digit())
    })
}

pub fn group_letters_digits(text: &str) -> Option<String> {
    first_capture(&GROUP_LETTERS_DIGITS_RE, text, |_| true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_longest_carrier_wins() {
        assert_eq!(
            carrier_by_name("I have Blue Cross Blue Shield"),
            Some("Blue Cross Blue Shield".to_string())
        );
        assert_eq!(carrier_by_name("blue cross"), Some("Blue Cross".to_string()));
        assert_eq!(carrier_by_name("it's Aetna"), Some("Aetna".to_string()));
    }

    #[test]
    fn test_carrier_abbreviations() {
        assert_eq!(carrier_by_abbreviation("BCBS"), Some("Blue Cross Blue Shield".to_string()));
        assert_eq!(carrier_by_abbreviation("uhc"), Some("UnitedHealth".to_string()));
        assert_eq!(carrier_by_abbreviation("kaiser"), Some("Kaiser Permanente".to_string()));
        assert_eq!(carrier_by_abbreviation("reunited"), None);
    }

    #[test]
    fn test_member_id_keyword() {
        assert_eq!(member_id_keyword("my member ID is ABC123456"), Some("ABC123456".to_string()));
        assert_eq!(member_id_keyword("policy number: XYZ-998877"), Some("XYZ-998877".to_string()));
        assert_eq!(member_id_keyword("member id is pending"), None);
    }

    #[test]
    fn test_member_id_generic_needs_a_digit() {
        assert_eq!(member_id_generic("insurance"), None);
        assert_eq!(member_id_generic("it is W12345678"), Some("W12345678".to_string()));
        assert_eq!(member_id_generic("GRP12345 only"), None);
    }

    #[test]
    fn test_member_id_numeric() {
        assert_eq!(member_id_numeric("123456789"), Some("123456789".to_string()));
        assert_eq!(member_id_numeric("12345"), None);
    }

    #[test]
    fn test_individual_plan_phrases() {
        assert_eq!(group_individual("I don't have one, it's individual"), Some(INDIVIDUAL_PLAN.to_string()));
        assert_eq!(group_individual("N/A"), Some(INDIVIDUAL_PLAN.to_string()));
        assert_eq!(group_individual("na"), Some(INDIVIDUAL_PLAN.to_string()));
        assert_eq!(group_individual("Aetna"), None);
        assert_eq!(group_individual("my name is Donna"), None);
    }

    #[test]
    fn test_group_rules() {
        assert_eq!(group_code("grp12345"), Some("GRP12345".to_string()));
        assert_eq!(group_keyword("group number is 55432"), Some("55432".to_string()));
        assert_eq!(group_keyword("group: A-1001"), Some("A-1001".to_string()));
        assert_eq!(group_keyword("group health plan"), None);
        assert_eq!(group_letters_digits("it's ABC123"), Some("ABC123".to_string()));
    }
}
