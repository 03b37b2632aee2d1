//! Page-by-page text from a downloaded circular

use crate::{HarvestError, Result};
use lopdf::Document;
use std::collections::VecDeque;
use std::path::Path;

/// Lazy sequence of page texts, capped at a maximum page count
///
/// Yields each 1-based page number with that page's text, or the error
/// extracting it. Finite; restarting means reopening the file.
pub struct PdfPages {
    document: Document,
    source_document: String,
    pending: VecDeque<u32>,
    total_pages: usize,
}

impl PdfPages {
    /// Opens a PDF and selects its first `max_pages` pages
    ///
    /// # Arguments
    ///
    /// * `path` - Local file holding the PDF
    /// * `source_document` - Identifier used in errors and logs
    /// * `max_pages` - Page cap; later pages are never read
    pub fn open(path: &Path, source_document: &str, max_pages: u32) -> Result<Self> {
        let document = Document::load(path).map_err(|source| HarvestError::Pdf {
            source_document: source_document.to_string(),
            source,
        })?;

        let numbers = document.get_pages();
        let total_pages = numbers.len();
        let pending = numbers.into_keys().take(max_pages as usize).collect();

        Ok(Self {
            document,
            source_document: source_document.to_string(),
            pending,
            total_pages,
        })
    }

    /// Page count of the whole document, before capping
    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    /// Pages still to be yielded
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    /// Drops every page numbered `last_page` or lower without reading it
    pub fn skip_through(&mut self, last_page: u32) {
        while self.pending.front().is_some_and(|&n| n <= last_page) {
            self.pending.pop_front();
        }
    }
}

impl Iterator for PdfPages {
    type Item = (u32, Result<String>);

    fn next(&mut self) -> Option<Self::Item> {
        let number = self.pending.pop_front()?;
        let text = self
            .document
            .extract_text(&[number])
            .map_err(|source| HarvestError::Pdf {
                source_document: self.source_document.clone(),
                source,
            });
        Some((number, text))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.pending.len(), Some(self.pending.len()))
    }
}
