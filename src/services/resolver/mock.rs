//! Offline place lookup and link expansion
//!
//! Used when no Google key is configured and throughout the tests. Lookups
//! answer from fixed tables and count every call.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::TransportError;
use crate::types::Coordinates;
use super::patterns::is_http_url;
use super::{LinkExpander, PlaceLookup};

#[derive(Default)]
pub struct MockPlaces {
    details: HashMap<String, Coordinates>,
    geocoded: HashMap<String, Coordinates>,
    found: HashMap<String, Coordinates>,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl MockPlaces {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_place(mut self, place_id: &str, coords: Coordinates) -> Self {
        self.details.insert(place_id.to_string(), coords);
        self
    }

    pub fn with_geocode(mut self, text: &str, coords: Coordinates) -> Self {
        self.geocoded.insert(text.to_string(), coords);
        self
    }

    pub fn with_found(mut self, text: &str, coords: Coordinates) -> Self {
        self.found.insert(text.to_string(), coords);
        self
    }

    /// While set, every lookup fails like an unreachable upstream
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn answer(
        &self,
        table: &HashMap<String, Coordinates>,
        key: &str,
    ) -> Result<Option<Coordinates>, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransportError::Status(503));
        }
        Ok(table.get(key).copied())
    }
}

#[async_trait]
impl PlaceLookup for MockPlaces {
    async fn place_details(&self, place_id: &str) -> Result<Option<Coordinates>, TransportError> {
        self.answer(&self.details, place_id)
    }

    async fn geocode(&self, text: &str) -> Result<Option<Coordinates>, TransportError> {
        self.answer(&self.geocoded, text)
    }

    async fn find_place(&self, text: &str) -> Result<Option<Coordinates>, TransportError> {
        self.answer(&self.found, text)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Expands links from a fixed redirect table; unknown http links expand to themselves
#[derive(Default)]
pub struct MockExpander {
    redirects: HashMap<String, String>,
    calls: AtomicUsize,
}

impl MockExpander {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_redirect(mut self, from: &str, to: &str) -> Self {
        self.redirects.insert(from.to_string(), to.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LinkExpander for MockExpander {
    async fn expand(&self, url: &str) -> Result<Option<String>, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !is_http_url(url) {
            return Ok(None);
        }
        Ok(Some(
            self.redirects
                .get(url)
                .cloned()
                .unwrap_or_else(|| url.to_string()),
        ))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
