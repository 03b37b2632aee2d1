//! State module for tracking crawl progress
//!
//! Each year in the work list moves through its own sequence of states:
//! pending, fetching links, processing documents, checkpointed, done.

mod year_state;

pub use year_state::YearState;
