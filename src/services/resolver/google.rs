//! Google Places / Geocoding clients and HTTP link expansion

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::TransportError;
use crate::services::http::HttpClient;
use crate::types::Coordinates;
use super::patterns::{is_http_url, maps_url_from_html};
use super::{LinkExpander, PlaceLookup};

pub const GOOGLE_API_BASE: &str = "https://maps.googleapis.com/maps/api";

/// Google web-service backed place lookup
pub struct GooglePlacesClient {
    http: HttpClient,
    api_key: String,
    base_url: String,
}

impl GooglePlacesClient {
    pub fn new(http: HttpClient, api_key: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            base_url: GOOGLE_API_BASE.to_string(),
        }
    }

    async fn fetch<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        mut params: Vec<(&str, String)>,
    ) -> Result<T, TransportError> {
        params.push(("key", self.api_key.clone()));
        let url = format!("{}/{}", self.base_url, path);
        self.http.get_json(&url, &params).await
    }
}

#[async_trait]
impl PlaceLookup for GooglePlacesClient {
    async fn place_details(&self, place_id: &str) -> Result<Option<Coordinates>, TransportError> {
        debug!("Place details lookup for {}", place_id);
        let response: PlaceDetailsResponse = self
            .fetch(
                "place/details/json",
                vec![
                    ("place_id", place_id.to_string()),
                    ("fields", "geometry".to_string()),
                ],
            )
            .await?;
        interpret_status(&response.status, response.error_message, response.result.as_ref())
    }

    async fn geocode(&self, text: &str) -> Result<Option<Coordinates>, TransportError> {
        debug!("Geocoding '{}'", text);
        let response: GeocodeResponse = self
            .fetch("geocode/json", vec![("address", text.to_string())])
            .await?;
        interpret_status(&response.status, response.error_message, response.results.first())
    }

    async fn find_place(&self, text: &str) -> Result<Option<Coordinates>, TransportError> {
        debug!("Find place from text '{}'", text);
        let response: FindPlaceResponse = self
            .fetch(
                "place/findplacefromtext/json",
                vec![
                    ("input", text.to_string()),
                    ("inputtype", "textquery".to_string()),
                    ("fields", "geometry".to_string()),
                ],
            )
            .await?;
        interpret_status(&response.status, response.error_message, response.candidates.first())
    }

    fn name(&self) -> &'static str {
        "google"
    }
}

/// Follows redirects (HEAD, then GET) to find the long form of a share link
pub struct HttpLinkExpander {
    http: HttpClient,
}

impl HttpLinkExpander {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

#[async_trait]
impl LinkExpander for HttpLinkExpander {
    async fn expand(&self, url: &str) -> Result<Option<String>, TransportError> {
        if !is_http_url(url) {
            return Ok(None);
        }

        let head_final = self.http.head_final_url(url).await?;
        if is_google_maps_url(&head_final) {
            return Ok(Some(head_final));
        }

        let (final_url, body) = self.http.get_page(url).await?;
        if is_google_maps_url(&final_url) {
            return Ok(Some(final_url));
        }
        if let Some(embedded) = maps_url_from_html(&body) {
            debug!("Found embedded maps URL in page body of {}", final_url);
            return Ok(Some(embedded));
        }
        Ok(Some(final_url))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

fn is_google_maps_url(url: &str) -> bool {
    url.contains("google.com/maps")
}

// Google web-service response shapes

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct Located {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<Located>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaceDetailsResponse {
    status: String,
    #[serde(default)]
    result: Option<Located>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FindPlaceResponse {
    status: String,
    #[serde(default)]
    candidates: Vec<Located>,
    #[serde(default)]
    error_message: Option<String>,
}

/// OK yields the first location, ZERO_RESULTS/NOT_FOUND are a clean miss,
/// any other status is an upstream failure
fn interpret_status(
    status: &str,
    error_message: Option<String>,
    first: Option<&Located>,
) -> Result<Option<Coordinates>, TransportError> {
    match status {
        "OK" => Ok(first.and_then(|located| {
            Coordinates::checked(located.geometry.location.lat, located.geometry.location.lng)
        })),
        "ZERO_RESULTS" | "NOT_FOUND" => Ok(None),
        other => Err(TransportError::Api {
            status: other.to_string(),
            message: error_message.unwrap_or_default(),
        }),
    }
}
