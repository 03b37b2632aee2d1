//! Crawler module for circular discovery and ingestion
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching and streamed PDF downloads
//! - Year listing discovery
//! - Page-capped PDF text extraction
//! - Year planning and the time budget
//! - Overall crawl coordination

mod coordinator;
mod deadline;
mod discover;
mod document;
mod fetcher;
mod plan;

pub use coordinator::{run_crawl, AcceptancePolicy, Coordinator, CrawlSummary};
pub use deadline::Deadline;
pub use discover::{anchor_hrefs, collect_pdf_links, find_year_link, LinkDiscoverer};
pub use document::PdfPages;
pub use fetcher::{build_http_client, download_pdf, fetch_html, DownloadedPdf};
pub use plan::years_to_visit;
