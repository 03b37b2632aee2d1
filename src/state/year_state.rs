/// Year state definitions for tracking crawl progress
///
/// This module defines the states a year passes through during a crawl.
use std::fmt;

/// Represents the current state of one year in the crawl process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum YearState {
    /// Year is in the work list but not yet started
    Pending,

    /// Year page links are being discovered
    FetchingLinks,

    /// Documents linked from the year page are being ingested
    ProcessingDocuments,

    /// The store has been committed and uploaded for this year
    Checkpointed,

    /// Nothing further to do for this year in this run
    Done,
}

impl YearState {
    /// Returns true if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Returns true if `next` may follow this state
    ///
    /// A year whose link discovery yields nothing skips straight from
    /// `FetchingLinks` to `Checkpointed`.
    pub fn can_transition_to(&self, next: YearState) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::FetchingLinks)
                | (Self::FetchingLinks, Self::ProcessingDocuments)
                | (Self::FetchingLinks, Self::Checkpointed)
                | (Self::ProcessingDocuments, Self::Checkpointed)
                | (Self::Checkpointed, Self::Done)
        )
    }

    /// Converts the year state to its log/database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::FetchingLinks => "fetching_links",
            Self::ProcessingDocuments => "processing_documents",
            Self::Checkpointed => "checkpointed",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for YearState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
