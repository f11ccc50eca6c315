//! Cost matrix to vrp-pragmatic problem conversion

use serde_json::{json, Value};
use vrp_pragmatic::format::problem::Matrix;

pub const DEFAULT_PROFILE: &str = "car";
pub const DEFAULT_VEHICLE_ID: &str = "bus_1";
pub const DEFAULT_VEHICLE_TYPE: &str = "bus";

/// Shift bounds wide enough that time never constrains the tour
const SHIFT_START: &str = "2026-01-01T00:00:00Z";
const SHIFT_END: &str = "2100-01-01T00:00:00Z";

/// Job id for local point `index`
pub fn job_id(index: usize) -> String {
    format!("stop-{}", index)
}

/// Inverse of [`job_id`]
pub fn job_index(id: &str) -> Option<usize> {
    id.strip_prefix("stop-")?.parse().ok()
}

/// Single-vehicle closed tour over `size` locations, depot at index 0.
///
/// The cost matrix is fed as the distance dimension with unit distance cost
/// and zero time cost, so the solver minimizes the objective directly.
pub fn build_tour_problem(size: usize) -> Value {
    let jobs: Vec<Value> = (1..size)
        .map(|index| {
            json!({
                "id": job_id(index),
                "services": [{
                    "places": [{
                        "location": { "index": index },
                        "duration": 0
                    }]
                }]
            })
        })
        .collect();

    json!({
        "plan": {
            "jobs": jobs
        },
        "fleet": {
            "vehicles": [{
                "typeId": DEFAULT_VEHICLE_TYPE,
                "vehicleIds": [DEFAULT_VEHICLE_ID],
                "profile": { "matrix": DEFAULT_PROFILE },
                "costs": {
                    "fixed": 0.0,
                    "distance": 1.0,
                    "time": 0.0
                },
                "shifts": [{
                    "start": {
                        "earliest": SHIFT_START,
                        "location": { "index": 0 }
                    },
                    "end": {
                        "latest": SHIFT_END,
                        "location": { "index": 0 }
                    }
                }],
                "capacity": [size.max(1)]
            }],
            "profiles": [{
                "name": DEFAULT_PROFILE
            }]
        }
    })
}

/// Row-major routing matrix with the cost in both dimensions
pub fn build_cost_matrix(cost: &[Vec<u64>], profile: &str) -> Matrix {
    let flat: Vec<i64> = cost
        .iter()
        .flat_map(|row| row.iter().map(|&c| i64::try_from(c).unwrap_or(i64::MAX)))
        .collect();

    Matrix {
        profile: Some(profile.to_string()),
        timestamp: None,
        travel_times: flat.clone(),
        distances: flat,
        error_codes: None,
    }
}
