//! Entry extraction from circular page text
//!
//! Pure and per-page: no I/O, and no state carried between pages. An entry
//! that continues onto the next page is cut at the page break.

mod patterns;

pub use patterns::is_placeholder;
use patterns::PassportField;

/// Name used when none could be extracted
pub const UNKNOWN_NAME: &str = "Unknown";

/// Nationality used when none could be extracted
pub const UNKNOWN_NATIONALITY: &str = "Unknown";

/// Passport number used when none could be extracted
pub const NO_PASSPORT: &str = "na";

/// A finalized sanctioned-entity candidate from one page
///
/// All fields are populated; missing values carry their placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateEntry {
    /// The list identifier that opened the record, e.g. `QDi.123`
    pub list_id: String,
    pub name: String,
    pub nationality: String,
    pub passport_no: String,
}

impl CandidateEntry {
    /// Returns true if no usable name was extracted
    pub fn has_unknown_name(&self) -> bool {
        self.name == UNKNOWN_NAME
    }
}

/// An entry while its lines are still being read
#[derive(Debug)]
struct EntryBuilder {
    list_id: String,
    text: String,
    nationality: Option<String>,
    passport: Option<String>,
}

impl EntryBuilder {
    fn new(list_id: &str) -> Self {
        Self {
            list_id: list_id.to_string(),
            text: String::new(),
            nationality: None,
            passport: None,
        }
    }

    fn push_line(&mut self, line: &str) {
        if !self.text.is_empty() {
            self.text.push(' ');
        }
        self.text.push_str(line);

        if self.nationality.is_none() {
            self.nationality = patterns::nationality(line).filter(|n| !is_placeholder(n));
        }

        // First real value wins; an "na" label leaves room for a later one
        if self.passport.is_none() {
            match patterns::passport(line) {
                PassportField::Absent | PassportField::Rejected => {}
                PassportField::Value(value) => self.passport = Some(value),
            }
        }
    }

    fn finalize(self) -> CandidateEntry {
        let name = patterns::name(&self.text)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| UNKNOWN_NAME.to_string());

        CandidateEntry {
            list_id: self.list_id,
            name,
            nationality: self
                .nationality
                .unwrap_or_else(|| UNKNOWN_NATIONALITY.to_string()),
            passport_no: self.passport.unwrap_or_else(|| NO_PASSPORT.to_string()),
        }
    }
}

/// Extracts candidate entries from the text of one page
///
/// A line starting with a list identifier (`QDi.123`) opens a record; the
/// previous record is finalized. Lines before the first identifier are
/// ignored, so text without identifiers yields no entries.
///
/// # Example
///
/// ```
/// use sanctions_harvest::extract::extract_entries;
///
/// let text = "QDi.42 Name: 1: JOHN 2: DOE 3: na 4: na\nNationality: Wakanda Passport no: X123";
/// let entries = extract_entries(text);
/// assert_eq!(entries.len(), 1);
/// assert_eq!(entries[0].name, "JOHN DOE");
/// assert_eq!(entries[0].nationality, "Wakanda");
/// assert_eq!(entries[0].passport_no, "X123");
/// ```
pub fn extract_entries(page_text: &str) -> Vec<CandidateEntry> {
    let mut entries = Vec::new();
    let mut current: Option<EntryBuilder> = None;

    for line in page_text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(list_id) = patterns::boundary(line) {
            if let Some(done) = current.take() {
                entries.push(done.finalize());
            }
            current = Some(EntryBuilder::new(list_id));
        }

        if let Some(entry) = current.as_mut() {
            entry.push_line(line);
        }
    }

    if let Some(done) = current {
        entries.push(done.finalize());
    }

    entries
}
