//! Demographic rules: name, date of birth, phone and email.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

static INTRODUCTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:my name is|my name's|name is|i['’]m|i am|this is|call me|it's)\s+([a-z]+)\s+([a-z]+)\b",
    )
    .expect("valid regex")
});

static DOB_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})[/-](\d{1,2})[/-](\d{4})\b").expect("valid regex")
});

static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^\d])\(?(\d{3})\)?[-.\s]?(\d{3})[-.\s]?(\d{4})(?:$|[^\d])")
        .expect("valid regex")
});

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}\b").expect("valid regex")
});

/// Words that can appear in a two-word reply without being a person's name.
const NOT_A_NAME: &[&str] = &[
    "a", "am", "an", "and", "appointment", "at", "book", "calling", "center", "clinic", "dob",
    "doctor", "downtown", "dr", "email", "evening", "for", "good", "great", "hello", "here", "hey",
    "hi", "i", "im", "in", "is", "just", "like", "looking", "me", "morning", "my", "name", "need",
    "new", "no", "not", "of", "ok", "okay", "on", "patient", "phone", "please", "returning", "see",
    "side", "sounds", "sure", "thank", "thanks", "the", "there", "to", "uptown", "visit", "want",
    "west", "westside", "with", "would", "yes", "you",
];

fn is_name_word(word: &str) -> bool {
    word.len() > 1
        && word.chars().all(|c| c.is_alphabetic())
        && !NOT_A_NAME.contains(&word.to_lowercase().as_str())
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn full_name(first: &str, last: &str) -> Option<String> {
    (is_name_word(first) && is_name_word(last))
        .then(|| format!("{} {}", title_case(first), title_case(last)))
}

/// "My name is Jane Smith", "I'm jane smith", "this is Jane Smith".
pub fn name_from_introduction(text: &str) -> Option<String> {
    INTRODUCTION_RE
        .captures_iter(text)
        .find_map(|caps| full_name(&caps[1], &caps[2]))
}

/// A reply, or a comma-separated part of one, made of exactly two name-like words.
pub fn bare_name(text: &str) -> Option<String> {
    text.split([',', ';', '\n', '.', '!', '?'])
        .find_map(|segment| {
            let words: Vec<&str> = segment.split_whitespace().collect();
            match words.as_slice() {
                [first, last] => full_name(first, last),
                _ => None,
            }
        })
}

/// `MM/DD/YYYY` or `MM-DD-YYYY`, stored with slashes. Impossible dates are rejected.
pub fn date_of_birth(text: &str) -> Option<String> {
    DOB_RE.find_iter(text).find_map(|m| {
        let value = m.as_str().replace('-', "/");
        NaiveDate::parse_from_str(&value, "%m/%d/%Y")
            .ok()
            .map(|_| value)
    })
}

/// Any ten-digit number, normalized to `###-###-####`.
pub fn phone(text: &str) -> Option<String> {
    PHONE_RE
        .captures(text)
        .map(|caps| format!("{}-{}-{}", &caps[1], &caps[2], &caps[3]))
}

pub fn email(text: &str) -> Option<String> {
    EMAIL_RE.find(text).map(|m| m.as_str().to_lowercase())
}
