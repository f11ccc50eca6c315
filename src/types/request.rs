//! Optimization request types
//!
//! The request body is deliberately loose: numeric knobs may arrive as
//! numbers or numeric strings, and out-of-range values are clamped rather
//! than rejected. `OptimizeParams` is the normalized view used by the planner.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::defaults::{
    DEFAULT_BUS_CAPACITY, DEFAULT_BUS_COUNT, DEFAULT_FUEL_L_PER_100KM, DEFAULT_WEIGHT_DURATION,
    FALLBACK_SPEED_KMH_DEFAULT, MAX_BUS_CAPACITY, MAX_BUS_COUNT, MAX_FUEL_L_PER_100KM,
    MAX_SPEED_CAP_KMH, MIN_FUEL_L_PER_100KM, MIN_SPEED_CAP_KMH, V_REF_KMH_DEFAULT,
};
use super::Coordinates;

/// Cost basis for tour optimization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Objective {
    #[default]
    Duration,
    Distance,
    Hybrid,
}

impl Objective {
    /// Parse case-insensitively; anything unknown means `Duration`
    pub fn parse_lenient(value: Option<&Value>) -> Self {
        match value.and_then(Value::as_str).map(str::to_lowercase).as_deref() {
            Some("distance") => Objective::Distance,
            Some("hybrid") => Objective::Hybrid,
            _ => Objective::Duration,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Objective::Duration => "duration",
            Objective::Distance => "distance",
            Objective::Hybrid => "hybrid",
        }
    }
}

/// Raw `/optimize` body
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeRequest {
    pub school: Option<SchoolInput>,
    pub students: Option<Vec<StudentInput>>,
    #[serde(default)]
    pub bus_count: Option<Value>,
    #[serde(default)]
    pub bus_capacity: Option<Value>,
    #[serde(default)]
    pub departure_time: Option<Value>,
    #[serde(default)]
    pub max_speed_kmh: Option<Value>,
    #[serde(default)]
    pub fuel_consumption_lper100: Option<Value>,
    #[serde(default)]
    pub objective: Option<Value>,
    #[serde(default)]
    pub weight_duration: Option<Value>,
}

/// The depot
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchoolInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub lat: Option<Value>,
    #[serde(default)]
    pub lng: Option<Value>,
}

impl SchoolInput {
    pub fn coordinates(&self) -> Option<Coordinates> {
        numeric_pair(self.lat.as_ref(), self.lng.as_ref())
    }
}

/// One student: either a coordinate pair or something to resolve
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub lat: Option<Value>,
    #[serde(default)]
    pub lng: Option<Value>,
    #[serde(default)]
    pub maps_link: Option<Value>,
    #[serde(default)]
    pub address: Option<Value>,
    #[serde(default)]
    pub place: Option<Value>,
    #[serde(default)]
    pub url: Option<Value>,
}

impl StudentInput {
    /// Numeric lat/lng carried directly on the record
    pub fn coordinates(&self) -> Option<Coordinates> {
        numeric_pair(self.lat.as_ref(), self.lng.as_ref())
    }

    /// First non-empty of mapsLink, address, place, url
    pub fn link(&self) -> Option<&str> {
        [&self.maps_link, &self.address, &self.place, &self.url]
            .into_iter()
            .flatten()
            .find(|value| is_truthy(value))
            .and_then(Value::as_str)
    }

    /// Only http(s) links trigger the resolution cascade
    pub fn resolvable_link(&self) -> Option<&str> {
        self.link()
            .filter(|link| link.starts_with("http://") || link.starts_with("https://"))
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("(no name)")
    }
}

/// Normalized, clamped request parameters
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizeParams {
    pub bus_count: usize,
    pub bus_capacity: usize,
    /// Trimmed caller-supplied departure time; `None` means "use the default"
    pub departure_time: Option<String>,
    pub max_speed_kmh: f64,
    pub fallback_speed_kmh: f64,
    pub fuel_l_per_100km: f64,
    pub objective: Objective,
    pub weight_duration: f64,
}

impl OptimizeParams {
    pub fn from_request(request: &OptimizeRequest) -> Self {
        let bus_count = clamp_int(
            request.bus_count.as_ref(),
            DEFAULT_BUS_COUNT,
            1,
            MAX_BUS_COUNT,
        );
        let bus_capacity = clamp_int(
            request.bus_capacity.as_ref(),
            DEFAULT_BUS_CAPACITY,
            1,
            MAX_BUS_CAPACITY,
        );

        let departure_time = request
            .departure_time
            .as_ref()
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let max_speed_kmh = clamp_float(
            request.max_speed_kmh.as_ref(),
            MIN_SPEED_CAP_KMH,
            MAX_SPEED_CAP_KMH,
            V_REF_KMH_DEFAULT,
        );
        let mut fallback_speed_kmh = max_speed_kmh.clamp(MIN_SPEED_CAP_KMH, MAX_SPEED_CAP_KMH);
        if fallback_speed_kmh <= 0.0 {
            fallback_speed_kmh = FALLBACK_SPEED_KMH_DEFAULT;
        }

        let fuel_l_per_100km = clamp_float(
            request.fuel_consumption_lper100.as_ref(),
            MIN_FUEL_L_PER_100KM,
            MAX_FUEL_L_PER_100KM,
            DEFAULT_FUEL_L_PER_100KM,
        );

        let weight_duration = request
            .weight_duration
            .as_ref()
            .and_then(lenient_f64)
            .filter(|w| w.is_finite())
            .unwrap_or(DEFAULT_WEIGHT_DURATION);

        Self {
            bus_count,
            bus_capacity,
            departure_time,
            max_speed_kmh,
            fallback_speed_kmh,
            fuel_l_per_100km,
            objective: Objective::parse_lenient(request.objective.as_ref()),
            weight_duration,
        }
    }
}

fn numeric_pair(lat: Option<&Value>, lng: Option<&Value>) -> Option<Coordinates> {
    let lat = lat.filter(|v| v.is_number()).and_then(Value::as_f64)?;
    let lng = lng.filter(|v| v.is_number()).and_then(Value::as_f64)?;
    Coordinates::checked(lat, lng)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Number(_) => true,
    }
}

/// Number or numeric string
fn lenient_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn lenient_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn clamp_int(value: Option<&Value>, default: usize, lo: usize, hi: usize) -> usize {
    match value.and_then(lenient_i64) {
        Some(v) => v.clamp(lo as i64, hi as i64) as usize,
        None => default,
    }
}

fn clamp_float(value: Option<&Value>, lo: f64, hi: f64, default: f64) -> f64 {
    match value.and_then(lenient_f64) {
        Some(v) if v.is_finite() => v.clamp(lo, hi),
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(body: Value) -> OptimizeRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_defaults_when_knobs_missing() {
        let params = OptimizeParams::from_request(&parse(json!({
            "school": {"lat": 1.0, "lng": 2.0},
            "students": []
        })));

        assert_eq!(params.bus_count, 1);
        assert_eq!(params.bus_capacity, 10);
        assert_eq!(params.departure_time, None);
        assert_eq!(params.max_speed_kmh, 60.0);
        assert_eq!(params.fallback_speed_kmh, 60.0);
        assert_eq!(params.fuel_l_per_100km, 6.0);
        assert_eq!(params.objective, Objective::Duration);
        assert_eq!(params.weight_duration, 0.7);
    }

    #[test]
    fn test_numeric_knobs_are_clamped() {
        let params = OptimizeParams::from_request(&parse(json!({
            "busCount": 5000,
            "busCapacity": 0,
            "maxSpeedKmh": 300,
            "fuelConsumptionLper100": 0.0
        })));

        assert_eq!(params.bus_count, 1000);
        assert_eq!(params.bus_capacity, 1);
        assert_eq!(params.max_speed_kmh, 120.0);
        assert_eq!(params.fuel_l_per_100km, 0.1);
    }

    #[test]
    fn test_numeric_strings_and_garbage() {
        let params = OptimizeParams::from_request(&parse(json!({
            "busCount": "3",
            "busCapacity": "many",
            "maxSpeedKmh": "10",
            "fuelConsumptionLper100": "NaN",
            "weightDuration": "0.25"
        })));

        assert_eq!(params.bus_count, 3);
        assert_eq!(params.bus_capacity, 10);
        assert_eq!(params.max_speed_kmh, 15.0);
        assert_eq!(params.fuel_l_per_100km, 6.0);
        assert_eq!(params.weight_duration, 0.25);
    }

    #[test]
    fn test_objective_is_case_insensitive_with_fallback() {
        assert_eq!(Objective::parse_lenient(Some(&json!("HYBRID"))), Objective::Hybrid);
        assert_eq!(Objective::parse_lenient(Some(&json!("distance"))), Objective::Distance);
        assert_eq!(Objective::parse_lenient(Some(&json!("fastest"))), Objective::Duration);
        assert_eq!(Objective::parse_lenient(Some(&json!(7))), Objective::Duration);
        assert_eq!(Objective::parse_lenient(None), Objective::Duration);
    }

    #[test]
    fn test_blank_departure_time_is_defaulted() {
        let params = OptimizeParams::from_request(&parse(json!({"departureTime": "   "})));
        assert_eq!(params.departure_time, None);

        let params = OptimizeParams::from_request(&parse(json!({"departureTime": " 2026-03-02T07:40 "})));
        assert_eq!(params.departure_time.as_deref(), Some("2026-03-02T07:40"));
    }

    #[test]
    fn test_student_link_priority() {
        let student: StudentInput = serde_json::from_value(json!({
            "name": "Ali",
            "mapsLink": "",
            "address": "https://maps.app.goo.gl/abc",
            "url": "https://example.com"
        }))
        .unwrap();

        assert_eq!(student.link(), Some("https://maps.app.goo.gl/abc"));
        assert_eq!(student.resolvable_link(), Some("https://maps.app.goo.gl/abc"));
        assert!(student.coordinates().is_none());
    }

    #[test]
    fn test_plain_text_address_is_not_resolvable() {
        let student: StudentInput =
            serde_json::from_value(json!({"address": "12 King Fahd Rd"})).unwrap();

        assert_eq!(student.link(), Some("12 King Fahd Rd"));
        assert_eq!(student.resolvable_link(), None);
    }

    #[test]
    fn test_coordinates_must_be_numbers() {
        let student: StudentInput =
            serde_json::from_value(json!({"lat": "24.7", "lng": 46.6})).unwrap();
        assert!(student.coordinates().is_none());

        let student: StudentInput =
            serde_json::from_value(json!({"lat": 24.7, "lng": 46.6})).unwrap();
        assert_eq!(student.coordinates(), Some(Coordinates::new(24.7, 46.6)));
    }
}
