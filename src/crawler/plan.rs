//! Which years a crawl visits

use crate::config::YearPolicy;
use std::collections::BTreeSet;

/// Builds the ordered work list of years
///
/// An explicit `override_year` wins over the policy. Under `Auto`, an empty
/// store gets a full backfill from `epoch` and a populated store only the
/// current year, since published circulars do not change afterwards.
///
/// # Arguments
///
/// * `policy` - The configured year policy
/// * `existing` - Years already present in the store
/// * `epoch` - First year of the backfill range
/// * `current_year` - The current calendar year
/// * `override_year` - A year requested explicitly by the caller
pub fn years_to_visit(
    policy: YearPolicy,
    existing: &BTreeSet<i32>,
    epoch: i32,
    current_year: i32,
    override_year: Option<i32>,
) -> Vec<i32> {
    if let Some(year) = override_year {
        return vec![year];
    }

    let backfill = || (epoch..=current_year).collect::<Vec<_>>();
    match policy {
        YearPolicy::Backfill => backfill(),
        YearPolicy::Current => vec![current_year],
        YearPolicy::Auto if existing.is_empty() => backfill(),
        YearPolicy::Auto => vec![current_year],
    }
}
