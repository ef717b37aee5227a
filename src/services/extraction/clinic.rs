//! Doctor and location catalogs.

use super::contains_phrase;

pub struct KnownName {
    pub canonical: &'static str,
    pub aliases: &'static [&'static str],
}

pub const DOCTORS: &[KnownName] = &[
    KnownName { canonical: "Dr. Johnson", aliases: &["dr. johnson", "dr johnson", "johnson"] },
    KnownName { canonical: "Dr. Martinez", aliases: &["dr. martinez", "dr martinez", "martinez"] },
    KnownName { canonical: "Dr. Lee", aliases: &["dr. lee", "dr lee", "lee"] },
];

pub const LOCATIONS: &[KnownName] = &[
    KnownName { canonical: "Downtown Clinic", aliases: &["downtown clinic", "downtown"] },
    KnownName { canonical: "Uptown Center", aliases: &["uptown center", "uptown"] },
    KnownName {
        canonical: "West Side Clinic",
        aliases: &["west side clinic", "west side", "westside"],
    },
];

fn first_match(catalog: &'static [KnownName], text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    catalog
        .iter()
        .find(|known| known.aliases.iter().any(|alias| contains_phrase(&lower, alias)))
        .map(|known| known.canonical)
}

pub fn doctor(text: &str) -> Option<String> {
    first_match(DOCTORS, text).map(str::to_string)
}

pub fn location(text: &str) -> Option<String> {
    first_match(LOCATIONS, text).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doctor_aliases() {
        assert_eq!(doctor("I'd like to see Dr. Lee"), Some("Dr. Lee".to_string()));
        assert_eq!(doctor("martinez please"), Some("Dr. Martinez".to_string()));
        assert_eq!(doctor("DR JOHNSON"), Some("Dr. Johnson".to_string()));
    }

    #[test]
    fn test_doctor_alias_must_be_whole_word() {
        assert_eq!(doctor("I couldn't sleep last night"), None);
        assert_eq!(doctor("my surname is Johnsonville"), None);
    }

    #[test]
    fn test_location_aliases() {
        assert_eq!(location("the westside office"), Some("West Side Clinic".to_string()));
        assert_eq!(location("West Side is closer"), Some("West Side Clinic".to_string()));
        assert_eq!(location("downtown works"), Some("Downtown Clinic".to_string()));
        assert_eq!(location("Uptown Center"), Some("Uptown Center".to_string()));
        assert_eq!(location("anywhere"), None);
    }
}
