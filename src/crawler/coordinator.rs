//! Crawler coordinator - main crawl orchestration logic
//!
//! This module drives the pipeline across years and documents, including:
//! - Restoring the store from its backing copy and creating a run record
//! - Per-year state transitions from link discovery to checkpoint
//! - Skipping processed documents and resuming partial ones
//! - Batched commits with page watermarks
//! - The cooperative time budget
//! - Uploading the store after each year and at the end

use crate::config::Config;
use crate::crawler::deadline::Deadline;
use crate::crawler::discover::LinkDiscoverer;
use crate::crawler::document::PdfPages;
use crate::crawler::fetcher::{build_http_client, download_pdf};
use crate::crawler::plan::years_to_visit;
use crate::extract::{extract_entries, CandidateEntry};
use crate::state::YearState;
use crate::storage::{backing_store_for, BackingStore, NewProfile, RunStatus, SqliteStorage, Storage};
use crate::{HarvestError, Result};
use chrono::{Datelike, Utc};
use reqwest::Client;
use serde::{Serialize, Serializer};
use std::path::PathBuf;
use std::time::Duration;
use tracing::Instrument;

/// Decides which extracted candidates become profiles
#[derive(Debug, Clone, Copy)]
pub struct AcceptancePolicy {
    min_name_length: usize,
}

impl AcceptancePolicy {
    pub fn new(min_name_length: usize) -> Self {
        Self { min_name_length }
    }

    /// Rejects unnamed entries and names shorter than the minimum
    pub fn accepts(&self, entry: &CandidateEntry) -> bool {
        !entry.has_unknown_name() && entry.name.chars().count() >= self.min_name_length
    }
}

fn serialize_secs<S: Serializer>(duration: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

/// What a crawl did
#[derive(Debug, Clone, Default, Serialize)]
pub struct CrawlSummary {
    pub run_id: i64,
    /// Years started, in order
    pub years_visited: Vec<i32>,
    /// Years that reached `Done`
    pub years_completed: Vec<i32>,
    /// Documents newly marked processed
    pub documents_processed: u64,
    /// Documents already processed by an earlier run
    pub documents_skipped: u64,
    /// Documents that failed and stay unprocessed
    pub documents_failed: u64,
    pub profiles_added: u64,
    #[serde(rename = "elapsed_secs", serialize_with = "serialize_secs")]
    pub elapsed: Duration,
    /// True if the time budget stopped the crawl early
    pub budget_exhausted: bool,
}

/// Outcome of one document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocumentOutcome {
    AlreadyProcessed,
    Ingested { profiles: u64 },
    Failed,
}

/// Moves a year to its next state, rejecting out-of-order transitions
fn advance(state: &mut YearState, next: YearState, year: i32) -> Result<()> {
    if !state.can_transition_to(next) {
        return Err(HarvestError::InvalidTransition {
            year,
            from: *state,
            to: next,
        });
    }
    tracing::debug!(year, from = %state, to = %next, "Year state transition");
    *state = next;
    Ok(())
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Config,
    storage: SqliteStorage,
    backing: Box<dyn BackingStore>,
    database_path: PathBuf,
    client: Client,
    discoverer: LinkDiscoverer,
    policy: AcceptancePolicy,
    run_id: i64,
    /// Documents attempted since the last memory reclamation
    attempted_since_reclaim: u32,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// Restores the database from its backing store (if one exists), opens
    /// it with the current schema and records a new crawl run.
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `config_hash` - Hash of the configuration file, stored on the run
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(HarvestError)` - Failed to restore or open storage, or to build the client
    pub fn new(config: Config, config_hash: &str) -> Result<Self> {
        let database_path = PathBuf::from(&config.storage.database_path);
        let backing = backing_store_for(&config.storage);

        if backing.download(&database_path)? {
            tracing::info!("Restored database from {}", backing.describe());
        } else {
            tracing::info!(
                "No durable copy at {}; using {}",
                backing.describe(),
                database_path.display()
            );
        }

        let mut storage = SqliteStorage::new(&database_path)?;
        let run_id = storage.create_run(config_hash)?;

        let client = build_http_client(
            &config.user_agent,
            Duration::from_secs(config.crawler.request_timeout_secs),
        )?;
        let discoverer = LinkDiscoverer::new(client.clone(), config.site.clone());
        let policy = AcceptancePolicy::new(config.crawler.min_name_length);

        Ok(Self {
            config,
            storage,
            backing,
            database_path,
            client,
            discoverer,
            policy,
            run_id,
            attempted_since_reclaim: 0,
        })
    }

    /// Runs the crawl to completion or until the time budget runs out
    ///
    /// The run record is closed with its final status, the store is
    /// uploaded and the connection closed. On a fatal error the committed
    /// work is still uploaded before the error is returned.
    pub async fn run(mut self, override_year: Option<i32>) -> Result<CrawlSummary> {
        tracing::info!("Starting crawl run {}", self.run_id);
        let deadline = Deadline::new(Duration::from_secs(self.config.crawler.time_budget_secs));
        let mut summary = CrawlSummary {
            run_id: self.run_id,
            ..CrawlSummary::default()
        };

        match self.crawl_years(override_year, &deadline, &mut summary).await {
            Ok(()) => {
                summary.elapsed = deadline.elapsed();
                let status = if summary.budget_exhausted {
                    RunStatus::BudgetExhausted
                } else {
                    RunStatus::Completed
                };
                self.storage.finish_run(
                    self.run_id,
                    status,
                    summary.documents_processed,
                    summary.profiles_added,
                )?;
                self.checkpoint_and_upload()?;
                self.storage.close()?;

                tracing::info!(
                    "Crawl {}: {} documents processed, {} profiles added, {} failed, in {:?}",
                    status.to_db_string(),
                    summary.documents_processed,
                    summary.profiles_added,
                    summary.documents_failed,
                    summary.elapsed
                );
                Ok(summary)
            }
            Err(e) => {
                tracing::error!("Crawl run {} failed: {}", self.run_id, e);
                self.abandon(&summary);
                Err(e)
            }
        }
    }

    /// Best-effort cleanup after a fatal error
    fn abandon(&mut self, summary: &CrawlSummary) {
        if let Err(e) = self.storage.rollback() {
            tracing::warn!("Rollback failed: {}", e);
        }
        if let Err(e) = self.storage.finish_run(
            self.run_id,
            RunStatus::Failed,
            summary.documents_processed,
            summary.profiles_added,
        ) {
            tracing::warn!("Could not record failed run: {}", e);
        }
        if let Err(e) = self.checkpoint_and_upload() {
            tracing::warn!("Could not upload database after failure: {}", e);
        }
    }

    async fn crawl_years(
        &mut self,
        override_year: Option<i32>,
        deadline: &Deadline,
        summary: &mut CrawlSummary,
    ) -> Result<()> {
        let existing = self.storage.distinct_years()?;
        let years = years_to_visit(
            self.config.crawler.year_policy,
            &existing,
            self.config.crawler.epoch_year,
            Utc::now().year(),
            override_year,
        );
        tracing::info!(
            "Work list: {} years ({} already in store)",
            years.len(),
            existing.len()
        );

        for year in years {
            if deadline.is_expired() {
                summary.budget_exhausted = true;
                break;
            }

            tracing::debug!(year, "Starting year with {:?} of budget left", deadline.remaining());
            summary.years_visited.push(year);
            let state = self
                .crawl_year(year, deadline, summary)
                .instrument(tracing::info_span!("year", year))
                .await?;
            if state.is_terminal() {
                summary.years_completed.push(year);
            }

            if summary.budget_exhausted {
                tracing::warn!(
                    "Time budget of {}s exhausted after {:?}; remaining years resume next run",
                    self.config.crawler.time_budget_secs,
                    deadline.elapsed()
                );
                break;
            }
        }

        Ok(())
    }

    /// Crawls one year and returns the state it ended in
    async fn crawl_year(
        &mut self,
        year: i32,
        deadline: &Deadline,
        summary: &mut CrawlSummary,
    ) -> Result<YearState> {
        let mut state = YearState::Pending;
        advance(&mut state, YearState::FetchingLinks, year)?;

        let links = match self.discoverer.discover(year).await {
            Ok(links) => links,
            Err(e) if e.is_recoverable() => {
                tracing::warn!(year, error = %e, "Link discovery failed; no documents this year");
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        if !links.is_empty() {
            advance(&mut state, YearState::ProcessingDocuments, year)?;

            for (index, url) in links.iter().enumerate() {
                tracing::info!("Document {}/{}: {}", index + 1, links.len(), url);
                let outcome = self
                    .process_document(url, year)
                    .instrument(tracing::info_span!("document", url = %url))
                    .await?;

                match outcome {
                    DocumentOutcome::AlreadyProcessed => summary.documents_skipped += 1,
                    DocumentOutcome::Ingested { profiles } => {
                        summary.documents_processed += 1;
                        summary.profiles_added += profiles;
                    }
                    DocumentOutcome::Failed => summary.documents_failed += 1,
                }
                if outcome != DocumentOutcome::AlreadyProcessed {
                    self.reclaim_if_due()?;
                }

                if deadline.is_expired() {
                    summary.budget_exhausted = true;
                    break;
                }
            }
        }

        advance(&mut state, YearState::Checkpointed, year)?;
        self.checkpoint_and_upload()?;

        if !summary.budget_exhausted {
            advance(&mut state, YearState::Done, year)?;
        }
        Ok(state)
    }

    /// Processes one document, containing recoverable failures
    ///
    /// A failed document has its in-flight batch rolled back and is not
    /// marked processed, so the next run retries it.
    async fn process_document(&mut self, url: &str, year: i32) -> Result<DocumentOutcome> {
        if self.storage.is_processed(url)? {
            tracing::debug!("Already processed, skipping");
            return Ok(DocumentOutcome::AlreadyProcessed);
        }

        match self.ingest_document(url, year).await {
            Ok(profiles) => Ok(DocumentOutcome::Ingested { profiles }),
            Err(e) if e.is_recoverable() => {
                self.storage.rollback()?;
                tracing::warn!(url = %url, year, error = %e, "Document failed; it will be retried next run");
                Ok(DocumentOutcome::Failed)
            }
            Err(e) => Err(e),
        }
    }

    /// Downloads, parses and stores one document
    ///
    /// # Returns
    ///
    /// The number of profiles appended
    async fn ingest_document(&mut self, url: &str, year: i32) -> Result<u64> {
        let crawler = &self.config.crawler;
        let download = download_pdf(
            &self.client,
            url,
            Duration::from_secs(crawler.download_timeout_secs),
            crawler.chunk_size,
        )
        .await?;

        let mut pages = PdfPages::open(download.file.path(), url, crawler.max_pages)?;
        tracing::info!(
            "Parsing {} of {} pages ({} bytes)",
            pages.remaining(),
            pages.total_pages(),
            download.bytes
        );

        // Honour the watermark only while profiles behind it are stored
        if let Some(last_page) = self.storage.page_watermark(url)? {
            if self.storage.count_profiles_for_document(url)? > 0 {
                pages.skip_through(last_page);
                tracing::info!("Resuming after committed page {}", last_page);
            } else {
                tracing::info!("Ignoring watermark at page {} with no stored profiles", last_page);
            }
        }

        let commit_every = self.config.crawler.commit_every_pages.max(1);
        let mut added = 0u64;
        let mut attempted = 0u32;
        let mut failed_pages = 0u32;
        let mut last_error = None;
        let mut since_commit = 0u32;
        let mut readable_since_commit = 0u32;

        for (number, text) in pages.by_ref() {
            attempted += 1;
            match text {
                Ok(text) => {
                    readable_since_commit += 1;
                    for entry in extract_entries(&text) {
                        if self.policy.accepts(&entry) {
                            self.storage
                                .append_profile(&NewProfile::from_candidate(&entry, year, url))?;
                            added += 1;
                        } else {
                            tracing::trace!(list_id = %entry.list_id, name = %entry.name, "Rejected candidate");
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(page = number, error = %e, "Page text unreadable; treated as empty");
                    failed_pages += 1;
                    last_error = Some(e);
                }
            }

            since_commit += 1;
            if since_commit >= commit_every {
                // A window of unreadable pages moves no watermark
                if readable_since_commit > 0 {
                    self.storage.record_watermark(url, number)?;
                    self.storage.commit()?;
                    tracing::debug!("Committed through page {}", number);
                }
                since_commit = 0;
                readable_since_commit = 0;
            }
        }

        // Nothing readable at all: leave the document for a later run
        if let Some(e) = last_error {
            if failed_pages == attempted {
                return Err(e);
            }
        }

        self.storage.mark_processed(url)?;
        self.storage.commit()?;
        tracing::info!("Extracted {} profiles", added);

        drop(pages);
        drop(download);
        tracing::debug!("Released document resources");
        Ok(added)
    }

    /// Issues the memory-reclamation hint every few attempted documents
    fn reclaim_if_due(&mut self) -> Result<()> {
        self.attempted_since_reclaim += 1;
        if self.attempted_since_reclaim >= self.config.crawler.reclaim_every_documents.max(1) {
            self.storage.release_memory()?;
            self.attempted_since_reclaim = 0;
            tracing::debug!("Released cached database memory");
        }
        Ok(())
    }

    /// Commits, checkpoints the WAL and uploads the database file
    fn checkpoint_and_upload(&mut self) -> Result<()> {
        self.storage.checkpoint()?;
        self.backing.upload(&self.database_path)?;
        tracing::debug!("Uploaded database to {}", self.backing.describe());
        Ok(())
    }
}

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Restore the store from its backing copy and migrate its schema
/// 2. Record a crawl run
/// 3. Work out which years to visit
/// 4. Discover, download and parse each year's circulars
/// 5. Upload the store after each year and at the end
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `config_hash` - Hash of the configuration, recorded on the run
/// * `year` - Visit exactly this year instead of applying the year policy
///
/// # Returns
///
/// * `Ok(CrawlSummary)` - Crawl finished or stopped at the time budget
/// * `Err(HarvestError)` - Storage failed; committed work was still uploaded
///
/// # Example
///
/// ```no_run
/// use sanctions_harvest::config::load_config_with_hash;
/// use sanctions_harvest::crawler::run_crawl;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("harvest.toml"))?;
/// let summary = run_crawl(config, &hash, None).await?;
/// println!("{} new profiles", summary.profiles_added);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(config: Config, config_hash: &str, year: Option<i32>) -> Result<CrawlSummary> {
    let coordinator = Coordinator::new(config, config_hash)?;
    coordinator.run(year).await
}
