//! Google Distance Matrix client
//!
//! API documentation:
//! https://developers.google.com/maps/documentation/distance-matrix/distance-matrix

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::TransportError;
use crate::services::http::HttpClient;
use crate::services::resolver::GOOGLE_API_BASE;
use crate::types::Coordinates;
use super::{BatchCell, Departure, DistanceMatrixSource};

pub struct GoogleDistanceMatrixClient {
    http: HttpClient,
    api_key: String,
    base_url: String,
}

impl GoogleDistanceMatrixClient {
    pub fn new(http: HttpClient, api_key: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            base_url: GOOGLE_API_BASE.to_string(),
        }
    }

    fn build_params(
        &self,
        origins: &[Coordinates],
        destinations: &[Coordinates],
        departure: Departure,
    ) -> Vec<(&'static str, String)> {
        vec![
            ("origins", join_locations(origins)),
            ("destinations", join_locations(destinations)),
            ("mode", "driving".to_string()),
            ("departure_time", departure.query_value()),
            ("traffic_model", "best_guess".to_string()),
            ("key", self.api_key.clone()),
        ]
    }
}

#[async_trait]
impl DistanceMatrixSource for GoogleDistanceMatrixClient {
    async fn batch(
        &self,
        origins: &[Coordinates],
        destinations: &[Coordinates],
        departure: Departure,
    ) -> Result<Vec<Vec<Option<BatchCell>>>, TransportError> {
        debug!(
            "Requesting Google distance matrix {}x{} departing {}",
            origins.len(),
            destinations.len(),
            departure.query_value()
        );

        let url = format!("{}/distancematrix/json", self.base_url);
        let params = self.build_params(origins, destinations, departure);
        let response: MatrixResponse = self.http.get_json(&url, &params).await?;

        response.into_cells()
    }

    fn name(&self) -> &'static str {
        "google"
    }
}

fn join_locations(points: &[Coordinates]) -> String {
    points
        .iter()
        .map(|p| format!("{},{}", p.lat, p.lng))
        .collect::<Vec<_>>()
        .join("|")
}

// Distance Matrix API types

#[derive(Debug, Deserialize)]
struct MatrixResponse {
    status: String,
    #[serde(default)]
    rows: Vec<MatrixRow>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MatrixRow {
    #[serde(default)]
    elements: Vec<MatrixElement>,
}

#[derive(Debug, Deserialize)]
struct MatrixElement {
    status: String,
    distance: Option<ValueField>,
    duration: Option<ValueField>,
    duration_in_traffic: Option<ValueField>,
}

#[derive(Debug, Deserialize)]
struct ValueField {
    value: f64,
}

impl MatrixResponse {
    fn into_cells(self) -> Result<Vec<Vec<Option<BatchCell>>>, TransportError> {
        if self.status != "OK" {
            return Err(TransportError::Api {
                status: self.status,
                message: self.error_message.unwrap_or_default(),
            });
        }

        Ok(self
            .rows
            .into_iter()
            .map(|row| row.elements.into_iter().map(MatrixElement::into_cell).collect())
            .collect())
    }
}

impl MatrixElement {
    fn into_cell(self) -> Option<BatchCell> {
        if self.status != "OK" {
            return None;
        }
        let distance = self.distance?;
        let duration = self.duration_in_traffic.or(self.duration)?;
        Some(BatchCell {
            distance_m: distance.value.max(0.0) as u64,
            duration_s: duration.value.max(0.0) as u64,
        })
    }
}
