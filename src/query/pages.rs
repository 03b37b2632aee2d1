//! Paginated profile listing

use crate::storage::{SanctionedProfile, Storage};
use crate::HarvestError;
use serde::Serialize;

/// Page size used when none is requested
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Largest page size served
pub const MAX_PAGE_SIZE: u32 = 100;

/// One page of profiles with pagination metadata
#[derive(Debug, Clone, Serialize)]
pub struct ProfilePage {
    pub profiles: Vec<SanctionedProfile>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u64,
    pub has_prev: bool,
    pub has_next: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nationality: Option<String>,
}

/// Lists one page of profiles
///
/// `page` is 1-based and at least 1; `page_size` is clamped to
/// `1..=MAX_PAGE_SIZE`. A page past the end is empty but still reports the
/// totals.
///
/// # Arguments
///
/// * `storage` - The storage backend to query
/// * `page` - Requested page number
/// * `page_size` - Requested page size
/// * `nationality` - Exact nationality to filter on
pub fn get_profiles_page(
    storage: &dyn Storage,
    page: u32,
    page_size: u32,
    nationality: Option<&str>,
) -> Result<ProfilePage, HarvestError> {
    let page = page.max(1);
    let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
    let nationality = nationality.map(str::trim).filter(|n| !n.is_empty());

    let total = storage.count_profiles(nationality)?;
    let offset = u64::from(page - 1) * u64::from(page_size);
    let profiles = if offset < total {
        storage.list_profiles(nationality, page_size, offset)?
    } else {
        Vec::new()
    };

    let total_pages = total.div_ceil(u64::from(page_size));
    Ok(ProfilePage {
        profiles,
        total,
        page,
        page_size,
        total_pages,
        has_prev: page > 1,
        has_next: u64::from(page) < total_pages,
        nationality: nationality.map(str::to_string),
    })
}

/// Prints a page of profiles to stdout
pub fn print_profiles_page(page: &ProfilePage) {
    match &page.nationality {
        Some(n) => println!("=== Profiles ({}) ===\n", n),
        None => println!("=== Profiles ===\n"),
    }

    for profile in &page.profiles {
        let year = profile
            .year
            .map_or_else(|| "----".to_string(), |y| y.to_string());
        println!(
            "  {:>6}  [{}] {} | {} | passport {}",
            profile.id, year, profile.name, profile.nationality, profile.passport_no
        );
    }

    println!();
    println!(
        "Page {} of {} ({} profiles, {} per page)",
        page.page,
        page.total_pages.max(1),
        page.total,
        page.page_size
    );
}
