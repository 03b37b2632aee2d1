//! Statistics generation from the profile database
//!
//! This module provides functionality for extracting and displaying
//! ingestion statistics from the storage layer.

use crate::storage::Storage;
use crate::HarvestError;
use serde::Serialize;

/// Number of nationalities listed in the statistics
const TOP_NATIONALITIES: u32 = 10;

/// Profile count for one circular year
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearCount {
    /// None for rows migrated from stores that had no year column
    pub year: Option<i32>,
    pub count: u64,
}

/// Ingestion statistics summary
#[derive(Debug, Clone, Serialize)]
pub struct ProfileStats {
    /// Total number of profiles
    pub total_profiles: u64,

    /// Profile counts by year, newest first
    pub by_year: Vec<YearCount>,

    /// Most frequent nationalities with their counts
    pub top_nationalities: Vec<(String, u64)>,

    /// Newest year with any profiles
    pub latest_year: Option<i32>,

    /// Number of documents fully ingested
    pub processed_documents: u64,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(ProfileStats)` - Successfully loaded statistics
/// * `Err(HarvestError)` - Failed to query statistics
pub fn get_stats(storage: &dyn Storage) -> Result<ProfileStats, HarvestError> {
    let total_profiles = storage.count_profiles(None)?;

    let by_year: Vec<YearCount> = storage
        .count_by_year()?
        .into_iter()
        .map(|(year, count)| YearCount { year, count })
        .collect();
    let latest_year = by_year.iter().filter_map(|y| y.year).max();

    let top_nationalities = storage.top_nationalities(TOP_NATIONALITIES)?;
    let processed_documents = storage.count_processed()?;

    Ok(ProfileStats {
        total_profiles,
        by_year,
        top_nationalities,
        latest_year,
        processed_documents,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_stats(stats: &ProfileStats) {
    println!("=== Profile Statistics ===\n");

    println!("Overview:");
    println!("  Total profiles: {}", stats.total_profiles);
    println!("  Processed documents: {}", stats.processed_documents);
    match stats.latest_year {
        Some(year) => println!("  Latest year: {}", year),
        None => println!("  Latest year: none"),
    }
    println!();

    if !stats.by_year.is_empty() {
        println!("Profiles by Year:");
        for entry in &stats.by_year {
            let label = entry
                .year
                .map_or_else(|| "unknown".to_string(), |y| y.to_string());
            println!("  {}: {}", label, entry.count);
        }
        println!();
    }

    if !stats.top_nationalities.is_empty() {
        println!("Top Nationalities:");
        for (nationality, count) in &stats.top_nationalities {
            let percentage = if stats.total_profiles > 0 {
                (*count as f64 / stats.total_profiles as f64) * 100.0
            } else {
                0.0
            };
            println!("  {}: {} ({:.1}%)", nationality, count, percentage);
        }
    }
}
