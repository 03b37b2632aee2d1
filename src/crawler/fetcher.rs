//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - GET requests for listing pages
//! - Streamed circular downloads into scoped temp files
//! - Error classification
//!
//! Nothing here retries. A failed unit of work is retried by the next
//! scheduled run, since it will still be unprocessed.

use crate::config::UserAgentConfig;
use crate::{HarvestError, Result};
use reqwest::{redirect::Policy, Client, Response};
use std::io::{BufWriter, Write};
use std::time::Duration;
use tempfile::NamedTempFile;

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Default per-request timeout
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use sanctions_harvest::config::UserAgentConfig;
/// use sanctions_harvest::crawler::build_http_client;
/// use std::time::Duration;
///
/// let config = UserAgentConfig {
///     crawler_name: "SanctionsHarvest".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: Some("https://example.com/about".to_string()),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> std::result::Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Sends a GET and rejects non-success statuses
async fn get_checked(client: &Client, url: &str, timeout: Option<Duration>) -> Result<Response> {
    let mut request = client.get(url);
    if let Some(timeout) = timeout {
        request = request.timeout(timeout);
    }

    let response = request
        .send()
        .await
        .map_err(|e| HarvestError::from_transport(url, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(HarvestError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    Ok(response)
}

/// Fetches an HTML page body
///
/// # Returns
///
/// * `Ok(String)` - The decoded body
/// * `Err(HarvestError)` - Transport failure, timeout, or non-2xx status
pub async fn fetch_html(client: &Client, url: &str) -> Result<String> {
    let response = get_checked(client, url, None).await?;
    response
        .text()
        .await
        .map_err(|e| HarvestError::from_transport(url, e))
}

/// A circular downloaded to local disk
///
/// The temp file is deleted when this value is dropped, on every exit path.
#[derive(Debug)]
pub struct DownloadedPdf {
    pub file: NamedTempFile,
    pub bytes: u64,
}

/// Downloads a PDF by streaming its body to a temp file
///
/// The body is never held in memory as a whole; each network chunk is
/// written through a buffer of `chunk_size` bytes.
///
/// # Arguments
///
/// * `client` - The HTTP client to use
/// * `url` - The PDF URL
/// * `timeout` - Bound on the whole download
/// * `chunk_size` - Write buffer size in bytes
pub async fn download_pdf(
    client: &Client,
    url: &str,
    timeout: Duration,
    chunk_size: usize,
) -> Result<DownloadedPdf> {
    let mut response = get_checked(client, url, Some(timeout)).await?;

    let file = tempfile::Builder::new()
        .prefix("circular-")
        .suffix(".pdf")
        .tempfile()?;
    let mut writer = BufWriter::with_capacity(chunk_size, file.as_file());
    let mut bytes = 0u64;

    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| HarvestError::from_transport(url, e))?
    {
        writer.write_all(&chunk)?;
        bytes += chunk.len() as u64;
    }
    writer.flush()?;
    drop(writer);

    tracing::debug!(url = %url, bytes, "Downloaded circular");
    Ok(DownloadedPdf { file, bytes })
}
