//! Optimization response types

use serde::{Deserialize, Serialize};

use super::{Objective, Point};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizeResponse {
    pub summary: PlanSummary,
    pub routes: Vec<RouteSummary>,
    pub diagnostics: Diagnostics,
}

/// Totals, averages and the effective (clamped) parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanSummary {
    pub total_students: usize,
    pub buses_used: usize,
    pub bus_count: usize,
    pub objective: Objective,
    pub defaulted_departure_time: bool,
    pub departure_time: String,
    pub max_speed_kmh: f64,
    pub fallback_speed_kmh: f64,
    pub fuel_consumption_lper100: f64,
    pub avg_distance_km: f64,
    pub avg_duration_min: f64,
    pub total_fuel_liters: f64,
    /// Present only for the hybrid objective
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_duration: Option<f64>,
}

/// One bus: its closed tour and metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSummary {
    /// 1-based cluster index
    pub bus_id: usize,
    /// Depot first and last
    pub stops: Vec<RouteStop>,
    pub total_distance_km: f64,
    pub total_duration_min: f64,
    pub used_seats: usize,
    pub capacity: usize,
    pub fuel_liters: f64,
    /// Raw tour cost in objective units
    pub objective_cost: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteStop {
    pub name: String,
    pub lat: f64,
    pub lng: f64,
}

impl RouteStop {
    /// Stop for `point`, falling back to "Stop k" for unnamed points
    pub fn from_point(point: &Point, local_index: usize) -> Self {
        Self {
            name: point
                .name
                .clone()
                .unwrap_or_else(|| format!("Stop {}", local_index)),
            lat: point.coordinates.lat,
            lng: point.coordinates.lng,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    /// Depot plus students
    pub matrix_points: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_departure_epoch: Option<i64>,
    /// Directed pairs filled by the straight-line estimate
    pub fallback_pairs: usize,
}

/// Round half away from zero to `digits` decimals
pub fn round_to(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (value * factor).round() / factor
}
