//! Patient lookup and id allocation over directory rows.

use chrono::NaiveDate;

use crate::models::PatientDirectoryEntry;

/// `MM/DD/YYYY` as typed in conversation to the directory's `YYYY-MM-DD`.
pub fn directory_dob(mm_dd_yyyy: &str) -> Option<String> {
    NaiveDate::parse_from_str(mm_dd_yyyy.trim(), "%m/%d/%Y")
        .ok()
        .map(|d| d.format("%Y-%m-%d").to_string())
}

/// Exact match on case-folded first name, last name and date of birth. The first and last
/// words of `full_name` are used; a single-word name never matches.
pub fn find_patient<'a>(
    entries: &'a [PatientDirectoryEntry],
    full_name: &str,
    date_of_birth: &str,
) -> Option<&'a PatientDirectoryEntry> {
    let words: Vec<&str> = full_name.split_whitespace().collect();
    let (first, last) = match words.as_slice() {
        [first, .., last] => (first.to_lowercase(), last.to_lowercase()),
        _ => return None,
    };
    let dob = directory_dob(date_of_birth)?;

    entries.iter().find(|entry| {
        entry.first_name.trim().to_lowercase() == first
            && entry.last_name.trim().to_lowercase() == last
            && entry.date_of_birth.trim() == dob
    })
}

/// One past the highest `P<digits>` id, zero-padded to three digits. Ids in other formats
/// are ignored.
pub fn next_patient_id<'a>(ids: impl IntoIterator<Item = &'a str>) -> String {
    let highest = ids
        .into_iter()
        .filter_map(|id| id.trim().strip_prefix('P'))
        .filter(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
        .filter_map(|digits| digits.parse::<u64>().ok())
        .max()
        .unwrap_or(0);
    format!("P{:03}", highest + 1)
}
