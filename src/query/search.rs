//! Name search

use crate::storage::{SanctionedProfile, Storage};
use crate::HarvestError;
use serde::Serialize;

/// Profiles matching a name fragment
#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub query: String,
    pub count: usize,
    pub profiles: Vec<SanctionedProfile>,
}

/// Finds profiles whose name contains `name`, ignoring case
///
/// Results are ordered newest year first, then by name. A blank query
/// matches nothing.
pub fn search_by_name(storage: &dyn Storage, name: &str) -> Result<SearchResults, HarvestError> {
    let query = name.trim().to_string();
    let profiles = if query.is_empty() {
        Vec::new()
    } else {
        storage.search_by_name(&query)?
    };

    Ok(SearchResults {
        count: profiles.len(),
        query,
        profiles,
    })
}

fn year_label(year: Option<i32>) -> String {
    year.map_or_else(|| "----".to_string(), |y| y.to_string())
}

/// Prints search results to stdout, one profile per line
pub fn print_search_results(results: &SearchResults) {
    println!("=== Search: \"{}\" ({} matches) ===\n", results.query, results.count);
    for profile in &results.profiles {
        println!(
            "  [{}] {} | {} | passport {}",
            year_label(profile.year),
            profile.name,
            profile.nationality,
            profile.passport_no
        );
        println!("         {}", profile.source_document);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{NewProfile, SqliteStorage};

    #[test]
    fn test_search_trims_and_ignores_blank_queries() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage
            .append_profile(&NewProfile {
                year: 2024,
                name: "ABU BAKR".to_string(),
                nationality: "Iraq".to_string(),
                passport_no: "na".to_string(),
                source_document: "d".to_string(),
            })
            .unwrap();
        storage.commit().unwrap();

        let results = search_by_name(&storage, "  bakr ").unwrap();
        assert_eq!(results.query, "bakr");
        assert_eq!(results.count, 1);
        assert_eq!(results.profiles[0].year, Some(2024));

        assert_eq!(search_by_name(&storage, "   ").unwrap().count, 0);
    }
}
