//! Regular expressions for the loosely structured circular text
//!
//! Circulars reproduce consolidated-list entries as flowing text, e.g.
//! `QDi.123 Name: 1: ABDUL 2: RAHMAN 3: na 4: na Title: ... Nationality: ...`.

use once_cell::sync::Lazy;
use regex::Regex;

/// Values the source uses for "not available"
const PLACEHOLDERS: [&str; 3] = ["na", "n/a", ""];

/// A record boundary: a list identifier such as `QDi.123` or `KPe.007`
static BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Z]{2}[ie]\.\d+)").expect("boundary pattern"));

/// Ends a field value: a known label, any `Capitalised words:` label, or end of text
const FIELD_END: &str = r"(?:Title:|DOB:|Designation:|Nationality:|Passport|[A-Z][a-z]+(?:\s[a-z]+)*\s?:|$)";

/// Name patterns, tried in order; the first that matches wins.
static NAME_PATTERNS: Lazy<[Regex; 3]> = Lazy::new(|| {
    [
        // Numbered parts in upper-case transliteration, ended by a label
        Regex::new(&format!(
            r"Name:\s*1:\s*([A-Z][A-Z\s'\-]*?)\s*2:\s*([A-Za-z\s'/\-]*?)\s*3:\s*([A-Za-z\s'/\-]*?)\s*4:\s*([A-Za-z\s'/\-]*?)\s*{FIELD_END}"
        ))
        .expect("numbered name pattern"),
        // Numbered parts, one token each
        Regex::new(r"Name:\s*1:\s*([^\s:]+)\s*2:\s*([^\s:]*)\s*3:\s*([^\s:]*)\s*4:\s*([^\s:]*)")
            .expect("numbered token name pattern"),
        // A single free-text name
        Regex::new(&format!(
            r"Name:\s*([A-Z][A-Za-z\s'.,\-]+?)\s*{FIELD_END}"
        ))
        .expect("free-text name pattern"),
    ]
});

static NATIONALITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"Nationality:\s*([A-Za-z][A-Za-z\s'/\-]*?)\s*{FIELD_END}"
    ))
    .expect("nationality pattern")
});

/// Passport label variants, tried in order; the first that matches wins.
static PASSPORT_PATTERNS: Lazy<[Regex; 3]> = Lazy::new(|| {
    [
        Regex::new(r"(?i)Passport no\.?:\s*([^\s,;]+(?:\s+number\s+[^\s,;]+)?)")
            .expect("passport no pattern"),
        Regex::new(r"(?i)Passport number:?\s*([^\s,;]+)").expect("passport number pattern"),
        Regex::new(r"(?i)Passport:\s*([^\s,;]+)").expect("passport pattern"),
    ]
});

/// Returns true if `value` is one of the source's "not available" markers
pub fn is_placeholder(value: &str) -> bool {
    let value = value.trim();
    PLACEHOLDERS.iter().any(|p| value.eq_ignore_ascii_case(p))
}

/// Returns the list identifier if `line` starts a new record
pub fn boundary(line: &str) -> Option<&str> {
    BOUNDARY
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Extracts a space-joined name from an entry's accumulated text
pub fn name(text: &str) -> Option<String> {
    NAME_PATTERNS.iter().find_map(|pattern| {
        let caps = pattern.captures(text)?;
        let parts: Vec<&str> = caps
            .iter()
            .skip(1)
            .flatten()
            .map(|m| m.as_str().trim())
            .filter(|part| !is_placeholder(part))
            .collect();
        Some(join_words(&parts))
    })
}

/// Extracts the nationality on one line, if labelled
pub fn nationality(line: &str) -> Option<String> {
    NATIONALITY
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Outcome of a passport label match
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassportField {
    /// No passport label on the line
    Absent,
    /// A label with a "not available" value
    Rejected,
    Value(String),
}

/// Extracts the passport number on one line
pub fn passport(line: &str) -> PassportField {
    let Some(caps) = PASSPORT_PATTERNS.iter().find_map(|p| p.captures(line)) else {
        return PassportField::Absent;
    };

    let value = caps
        .get(1)
        .map(|m| m.as_str().trim().trim_end_matches('.'))
        .unwrap_or_default();

    if is_placeholder(value) {
        PassportField::Rejected
    } else {
        PassportField::Value(value.to_string())
    }
}

/// Joins name fragments with single spaces, collapsing inner whitespace
fn join_words(parts: &[&str]) -> String {
    parts
        .iter()
        .flat_map(|part| part.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_identifiers() {
        assert_eq!(boundary("QDi.123 Name: 1: A"), Some("QDi.123"));
        assert_eq!(boundary("KPe.007"), Some("KPe.007"));
        assert_eq!(boundary("Name: QDi.123"), None);
        assert_eq!(boundary("QDi. 123"), None);
        assert_eq!(boundary("Mr.12 something"), None);
    }

    #[test]
    fn test_numbered_name_drops_placeholders() {
        let text = "QDi.1 Name: 1: ABDUL 2: RAHMAN 3: na 4: na Title: Mullah";
        assert_eq!(name(text).as_deref(), Some("ABDUL RAHMAN"));
    }

    #[test]
    fn test_numbered_name_with_multiword_parts() {
        let text = "QDi.2 Name: 1: AMIN  MUHAMMAD 2: UL 3: HAQ 4: SAAM KHAN DOB: 1960";
        assert_eq!(name(text).as_deref(), Some("AMIN MUHAMMAD UL HAQ SAAM KHAN"));
    }

    #[test]
    fn test_token_name_fallback() {
        // Digits defeat the upper-case pattern; the token pattern still applies
        let text = "QDi.3 Name: 1: Ali2 2: Hassan 3: 4:";
        assert_eq!(name(text).as_deref(), Some("Ali2 Hassan"));
    }

    #[test]
    fn test_free_text_name() {
        let text = "QDe.9 Name: AL-RASHID TRUST Nationality: na";
        assert_eq!(name(text).as_deref(), Some("AL-RASHID TRUST"));
    }

    #[test]
    fn test_no_name_label() {
        assert_eq!(name("QDi.4 Title: na"), None);
    }

    #[test]
    fn test_nationality_stops_at_next_label() {
        assert_eq!(
            nationality("Nationality: Wakanda Passport no: X123").as_deref(),
            Some("Wakanda")
        );
        assert_eq!(
            nationality("Nationality: Saudi Arabia National identification no: 1").as_deref(),
            Some("Saudi Arabia")
        );
        assert_eq!(nationality("Nationality: Pakistan").as_deref(), Some("Pakistan"));
        assert_eq!(nationality("Address: Kabul"), None);
    }

    #[test]
    fn test_passport_variants() {
        assert_eq!(
            passport("Passport no: X123"),
            PassportField::Value("X123".to_string())
        );
        assert_eq!(
            passport("passport number: AB99."),
            PassportField::Value("AB99".to_string())
        );
        assert_eq!(
            passport("Passport: P-77, issued 2001"),
            PassportField::Value("P-77".to_string())
        );
        assert_eq!(passport("Passport no: n/a"), PassportField::Rejected);
        assert_eq!(passport("Passport no: NA"), PassportField::Rejected);
        assert_eq!(passport("Nationality: Wakanda"), PassportField::Absent);
    }

    #[test]
    fn test_placeholders() {
        assert!(is_placeholder("na"));
        assert!(is_placeholder(" N/A "));
        assert!(is_placeholder(""));
        assert!(!is_placeholder("nan"));
    }
}
