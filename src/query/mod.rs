//! Query surface over the ingested profiles
//!
//! This module backs an HTTP or CLI front end:
//! - Name search
//! - Paginated listing with an optional nationality filter
//! - Aggregate statistics

mod pages;
mod search;
pub mod stats;

pub use pages::{get_profiles_page, print_profiles_page, ProfilePage, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use search::{print_search_results, search_by_name, SearchResults};
pub use stats::{get_stats, print_stats, ProfileStats, YearCount};
