//! Coordinate resolution cascade
//!
//! Turns a pasted address or map link into coordinates:
//! 1. coordinates embedded in the text itself
//! 2. expand the link and look again
//! 3. place id in the expanded URL → place details
//! 4. free-text `q`/`query` in the expanded URL → geocoding
//! 5. text search on the original input
//!
//! Every call-bearing stage and the cascade as a whole are memoized.

mod google;
mod mock;
pub mod patterns;

pub use google::{GooglePlacesClient, HttpLinkExpander, GOOGLE_API_BASE};
pub use mock::{MockExpander, MockPlaces};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::services::cache::MemoCache;
use crate::types::Coordinates;
use patterns::{coords_from_text, place_id_from_text, text_query_from_url};

/// Place-details, geocoding and text-search capability
#[async_trait]
pub trait PlaceLookup: Send + Sync {
    async fn place_details(&self, place_id: &str) -> Result<Option<Coordinates>, TransportError>;

    async fn geocode(&self, text: &str) -> Result<Option<Coordinates>, TransportError>;

    async fn find_place(&self, text: &str) -> Result<Option<Coordinates>, TransportError>;

    /// Backend name for logging
    fn name(&self) -> &'static str;
}

/// Redirect follower for share links
#[async_trait]
pub trait LinkExpander: Send + Sync {
    /// Long form of `url`; `None` when it cannot be expanded at all
    async fn expand(&self, url: &str) -> Result<Option<String>, TransportError>;

    fn name(&self) -> &'static str;
}

type CoordsCache = MemoCache<String, Option<Coordinates>>;

pub struct CoordinateResolver {
    places: Arc<dyn PlaceLookup>,
    expander: Arc<dyn LinkExpander>,
    resolved: CoordsCache,
    expanded: MemoCache<String, Option<String>>,
    details: CoordsCache,
    geocoded: CoordsCache,
    found: CoordsCache,
}

impl CoordinateResolver {
    pub fn new(
        places: Arc<dyn PlaceLookup>,
        expander: Arc<dyn LinkExpander>,
        cache_size: usize,
        negative_ttl: Duration,
    ) -> Self {
        let coords_cache = |name: &'static str| -> CoordsCache {
            MemoCache::new(name, cache_size).with_negative_ttl(negative_ttl, Option::is_none)
        };

        Self {
            places,
            expander,
            resolved: coords_cache("resolve"),
            expanded: MemoCache::new("expand", cache_size)
                .with_negative_ttl(negative_ttl, Option::is_none),
            details: coords_cache("place_details"),
            geocoded: coords_cache("geocode"),
            found: coords_cache("find_place"),
        }
    }

    /// Resolve with upstream failures folded into "not found"
    pub async fn resolve(&self, input: &str) -> Option<Coordinates> {
        match self.try_resolve(input).await {
            Ok(coords) => coords,
            Err(e) => {
                warn!("Resolution of '{}' degraded by upstream failure: {}", input, e);
                None
            }
        }
    }

    /// `Err` only when nothing was found and some stage failed in transport,
    /// so the miss is not memoized.
    pub async fn try_resolve(&self, input: &str) -> Result<Option<Coordinates>, TransportError> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(None);
        }

        self.resolved
            .get_or_try_compute(input.to_string(), || self.cascade(input))
            .await
    }

    /// Memoized link expansion
    pub async fn expand(&self, url: &str) -> Result<Option<String>, TransportError> {
        let expander = &self.expander;
        self.expanded
            .get_or_try_compute(url.to_string(), || expander.expand(url))
            .await
    }

    async fn cascade(&self, input: &str) -> Result<Option<Coordinates>, TransportError> {
        if let Some(coords) = coords_from_text(input) {
            debug!("Coordinates embedded in input");
            return Ok(Some(coords));
        }

        let mut degraded = None;

        let long_url = settle(self.expand(input).await, &mut degraded)
            .unwrap_or_else(|| input.to_string());
        if let Some(coords) = coords_from_text(&long_url) {
            debug!("Coordinates found in expanded link {}", long_url);
            return Ok(Some(coords));
        }

        if let Some(place_id) = place_id_from_text(&long_url) {
            let places = &self.places;
            let lookup = memoized(&self.details, &place_id, || places.place_details(&place_id));
            if let Some(coords) = settle(lookup.await, &mut degraded) {
                debug!("Resolved via place id {}", place_id);
                return Ok(Some(coords));
            }
        }

        if let Some(text) = text_query_from_url(&long_url) {
            let places = &self.places;
            let lookup = memoized(&self.geocoded, &text, || places.geocode(&text));
            if let Some(coords) = settle(lookup.await, &mut degraded) {
                debug!("Resolved by geocoding '{}'", text);
                return Ok(Some(coords));
            }
        }

        let places = &self.places;
        let lookup = memoized(&self.found, input, || places.find_place(input));
        if let Some(coords) = settle(lookup.await, &mut degraded) {
            debug!("Resolved by text search");
            return Ok(Some(coords));
        }

        match degraded {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }
}

async fn memoized<F, Fut>(
    cache: &CoordsCache,
    key: &str,
    lookup: F,
) -> Result<Option<Coordinates>, TransportError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Option<Coordinates>, TransportError>>,
{
    cache.get_or_try_compute(key.to_string(), lookup).await
}

/// Stage result with a transport failure recorded and treated as a miss
fn settle<T>(
    result: Result<Option<T>, TransportError>,
    degraded: &mut Option<TransportError>,
) -> Option<T> {
    match result {
        Ok(value) => value,
        Err(e) => {
            warn!("Resolution stage failed: {}", e);
            *degraded = Some(e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLACE_ID: &str = "ChIJN1t_tDeuEmsRUsoyG83frY4";

    fn resolver(places: Arc<MockPlaces>, expander: Arc<MockExpander>) -> CoordinateResolver {
        CoordinateResolver::new(places, expander, 64, Duration::from_secs(600))
    }

    #[tokio::test]
    async fn test_embedded_coordinates_make_no_calls() {
        let places = Arc::new(MockPlaces::new());
        let expander = Arc::new(MockExpander::new());
        let resolver = resolver(places.clone(), expander.clone());

        let coords = resolver
            .resolve("https://www.google.com/maps/place/School/@24.7136,46.6753,17z")
            .await;

        assert_eq!(coords, Some(Coordinates::new(24.7136, 46.6753)));
        assert_eq!(places.calls(), 0);
        assert_eq!(expander.calls(), 0);
    }

    #[tokio::test]
    async fn test_short_link_is_expanded() {
        let places = Arc::new(MockPlaces::new());
        let expander = Arc::new(MockExpander::new().with_redirect(
            "https://maps.app.goo.gl/abc",
            "https://www.google.com/maps/place/X/data=!3d24.5!4d46.5",
        ));
        let resolver = resolver(places.clone(), expander.clone());

        let coords = resolver.resolve("https://maps.app.goo.gl/abc").await;

        assert_eq!(coords, Some(Coordinates::new(24.5, 46.5)));
        assert_eq!(expander.calls(), 1);
        assert_eq!(places.calls(), 0);
    }

    #[tokio::test]
    async fn test_place_id_lookup() {
        let places = Arc::new(MockPlaces::new().with_place(PLACE_ID, Coordinates::new(21.4, 39.8)));
        let expander = Arc::new(MockExpander::new().with_redirect(
            "https://goo.gl/maps/p",
            &format!("https://www.google.com/maps/search/?api=1&query=Mall&query_place_id={PLACE_ID}"),
        ));
        let resolver = resolver(places.clone(), expander);

        let coords = resolver.resolve("https://goo.gl/maps/p").await;

        assert_eq!(coords, Some(Coordinates::new(21.4, 39.8)));
        assert_eq!(places.calls(), 1);
    }

    #[tokio::test]
    async fn test_text_query_is_geocoded() {
        let places = Arc::new(MockPlaces::new().with_geocode("Kingdom Centre", Coordinates::new(24.71, 46.67)));
        let expander = Arc::new(MockExpander::new().with_redirect(
            "https://goo.gl/maps/q",
            "https://maps.google.com/maps?q=Kingdom+Centre",
        ));
        let resolver = resolver(places.clone(), expander);

        let coords = resolver.resolve("https://goo.gl/maps/q").await;

        assert_eq!(coords, Some(Coordinates::new(24.71, 46.67)));
    }

    #[tokio::test]
    async fn test_text_search_on_original_input() {
        let places = Arc::new(MockPlaces::new().with_found("Olaya Towers", Coordinates::new(24.69, 46.68)));
        let expander = Arc::new(MockExpander::new());
        let resolver = resolver(places.clone(), expander);

        let coords = resolver.resolve("Olaya Towers").await;

        assert_eq!(coords, Some(Coordinates::new(24.69, 46.68)));
    }

    #[tokio::test]
    async fn test_results_are_memoized() {
        let places = Arc::new(MockPlaces::new().with_found("Olaya Towers", Coordinates::new(24.69, 46.68)));
        let expander = Arc::new(MockExpander::new());
        let resolver = resolver(places.clone(), expander.clone());

        resolver.resolve("Olaya Towers").await;
        let calls = (places.calls(), expander.calls());
        resolver.resolve("Olaya Towers").await;

        assert_eq!((places.calls(), expander.calls()), calls);
    }

    #[tokio::test]
    async fn test_clean_miss_is_memoized() {
        let places = Arc::new(MockPlaces::new());
        let expander = Arc::new(MockExpander::new());
        let resolver = resolver(places.clone(), expander);

        assert_eq!(resolver.try_resolve("nowhere").await.unwrap(), None);
        let calls = places.calls();
        assert_eq!(resolver.try_resolve("nowhere").await.unwrap(), None);

        assert_eq!(places.calls(), calls);
    }

    #[tokio::test]
    async fn test_transport_failure_is_retried_later() {
        let places = Arc::new(MockPlaces::new().with_found("Olaya Towers", Coordinates::new(24.69, 46.68)));
        let expander = Arc::new(MockExpander::new());
        let resolver = resolver(places.clone(), expander);

        places.set_failing(true);
        assert!(resolver.try_resolve("Olaya Towers").await.is_err());
        assert_eq!(resolver.resolve("Olaya Towers").await, None);

        places.set_failing(false);
        assert_eq!(
            resolver.resolve("Olaya Towers").await,
            Some(Coordinates::new(24.69, 46.68))
        );
    }

    #[tokio::test]
    async fn test_blank_input() {
        let places = Arc::new(MockPlaces::new());
        let expander = Arc::new(MockExpander::new());
        let resolver = resolver(places.clone(), expander);

        assert_eq!(resolver.resolve("   ").await, None);
        assert_eq!(places.calls(), 0);
    }
}
