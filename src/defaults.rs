use chrono::NaiveTime;

/// Hard cap on students per request
pub const MAX_STUDENTS: usize = 500;

/// Student links resolved at once within one request
pub const DEFAULT_RESOLVE_CONCURRENCY: usize = 8;

pub const DEFAULT_BUS_COUNT: usize = 1;
pub const MAX_BUS_COUNT: usize = 1000;
pub const DEFAULT_BUS_CAPACITY: usize = 10;
pub const MAX_BUS_CAPACITY: usize = 500;

pub const MIN_SPEED_CAP_KMH: f64 = 15.0;
pub const MAX_SPEED_CAP_KMH: f64 = 120.0;
/// Reference speed for the hybrid objective when none is given
pub const V_REF_KMH_DEFAULT: f64 = 60.0;
pub const FALLBACK_SPEED_KMH_DEFAULT: f64 = 60.0;

pub const MIN_FUEL_L_PER_100KM: f64 = 0.1;
pub const MAX_FUEL_L_PER_100KM: f64 = 60.0;
pub const DEFAULT_FUEL_L_PER_100KM: f64 = 6.0;

pub const DEFAULT_WEIGHT_DURATION: f64 = 0.7;

/// Per-bus bias (seconds-equivalent) added when comparing fleet sizes
pub const BUS_PENALTY_EQUIV_SEC: u64 = 60;

/// Departure times are floored to this bucket before querying traffic
pub const DEPARTURE_BUCKET_SECS: i64 = 15 * 60;

/// Fallback speed granularity of the matrix cache key
pub const SPEED_BUCKET_KMH: f64 = 5.0;

/// Upstream limit on origins/destinations per Distance Matrix call
pub const MATRIX_MAX_CHUNK: usize = 25;

pub const KMEANS_ITERATIONS: usize = 12;
/// Fixed so identical input always produces identical clusters
pub const KMEANS_SEED: u64 = 42;

pub const DEFAULT_DEPOT_NAME: &str = "School";

pub fn default_departure_time() -> NaiveTime {
    NaiveTime::from_hms_opt(7, 30, 0).expect("valid static default departure time")
}
