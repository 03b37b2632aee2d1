//! Link discovery over the regulator's year-indexed listing pages
//!
//! The master index links to one listing page per year; each listing page
//! links to that year's circular PDFs.

use crate::config::SiteConfig;
use crate::crawler::fetcher::fetch_html;
use crate::Result;
use reqwest::Client;
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Finds circular PDF URLs for a given year
pub struct LinkDiscoverer {
    client: Client,
    site: SiteConfig,
    /// Anchor hrefs from the master index, fetched once per run; an
    /// unreachable index is cached as an empty list
    index_hrefs: Option<Vec<String>>,
}

impl LinkDiscoverer {
    pub fn new(client: Client, site: SiteConfig) -> Self {
        Self {
            client,
            site,
            index_hrefs: None,
        }
    }

    /// Resolves the listing page URL for `year`
    ///
    /// Uses the index's link when present, otherwise the URL template. An
    /// unreachable index also falls back to the template.
    pub async fn year_page_url(&mut self, year: i32) -> Result<String> {
        if self.index_hrefs.is_none() {
            match fetch_html(&self.client, &self.site.index_url).await {
                Ok(html) => self.index_hrefs = Some(anchor_hrefs(&html)),
                Err(e) => {
                    tracing::warn!(url = %self.site.index_url, error = %e, "Index page unavailable; using fallback URLs this run");
                    self.index_hrefs = Some(Vec::new());
                }
            }
        }

        let index_base = Url::parse(&self.site.index_url)?;
        let linked = self.index_hrefs.as_deref().and_then(|hrefs| {
            find_year_link(hrefs, &self.site.year_link_needle(year), &index_base)
        });

        Ok(match linked {
            Some(url) => url,
            None => {
                let fallback = self.site.fallback_year_url(year);
                tracing::info!(year, url = %fallback, "No index link for year, using fallback URL");
                fallback
            }
        })
    }

    /// Returns every distinct PDF URL linked from `year`'s listing page
    ///
    /// An empty result is normal for a year without circulars. Failing to
    /// fetch the listing page is an error for the caller to log.
    pub async fn discover(&mut self, year: i32) -> Result<Vec<String>> {
        let year_url = self.year_page_url(year).await?;
        let html = fetch_html(&self.client, &year_url).await?;
        let links = collect_pdf_links(&html, &Url::parse(&year_url)?);

        tracing::info!(year, count = links.len(), "Found circulars");
        Ok(links)
    }
}

fn anchor_selector() -> Option<Selector> {
    Selector::parse("a[href]").ok()
}

/// Collects every anchor href on a page, trimmed
pub fn anchor_hrefs(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Some(selector) = anchor_selector() else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .map(|href| href.trim().to_string())
        .filter(|href| !href.is_empty())
        .collect()
}

fn ends_with_ignore_case(value: &str, suffix: &str) -> bool {
    value.len() >= suffix.len()
        && value
            .get(value.len() - suffix.len()..)
            .is_some_and(|tail| tail.eq_ignore_ascii_case(suffix))
}

/// Picks the first `.html` href containing `needle`, resolved against `base`
pub fn find_year_link(hrefs: &[String], needle: &str, base: &Url) -> Option<String> {
    hrefs
        .iter()
        .filter(|href| href.contains(needle) && ends_with_ignore_case(href, ".html"))
        .find_map(|href| base.join(href).ok())
        .map(String::from)
}

/// Collects `.pdf` links (case-insensitive) resolved against the page's own URL
///
/// Duplicates are dropped, keeping first-seen order.
pub fn collect_pdf_links(html: &str, page_url: &Url) -> Vec<String> {
    let mut seen = HashSet::new();
    anchor_hrefs(html)
        .into_iter()
        .filter(|href| ends_with_ignore_case(href, ".pdf"))
        .filter_map(|href| match page_url.join(&href) {
            Ok(url) => Some(String::from(url)),
            Err(e) => {
                tracing::debug!(href = %href, error = %e, "Skipping unresolvable link");
                None
            }
        })
        .filter(|url| seen.insert(url.clone()))
        .collect()
}
