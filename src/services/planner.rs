//! Request-level orchestration
//!
//! Validates and normalizes an optimize request, resolves student links,
//! builds the matrices once, and runs the fleet search off the async
//! runtime.

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{debug, info};

use crate::config::{Config, MapsBackend};
use crate::defaults::{DEFAULT_DEPOT_NAME, DEFAULT_RESOLVE_CONCURRENCY, MAX_STUDENTS};
use crate::error::PlanError;
use crate::services::clustering::Clusterer;
use crate::services::fleet::FleetSearch;
use crate::services::http::HttpClient;
use crate::services::resolver::{
    CoordinateResolver, GooglePlacesClient, HttpLinkExpander, LinkExpander, MockExpander,
    MockPlaces, PlaceLookup,
};
use crate::services::routing::departure::local_iso;
use crate::services::routing::{
    Departure, DistanceMatrixSource, GoogleDistanceMatrixClient, MatrixProvider,
    OfflineMatrixSource,
};
use crate::services::tour::{create_tour_solver, RouteParams, TourBuilder, TourSolver};
use crate::types::{
    round_to, Coordinates, Diagnostics, Objective, OptimizeParams, OptimizeRequest,
    OptimizeResponse, PlanSummary, Point, RouteSummary,
};

pub struct Planner {
    resolver: CoordinateResolver,
    matrices: MatrixProvider,
    solver: Arc<dyn TourSolver>,
    clusterer: Clusterer,
    resolve_concurrency: usize,
}

impl Planner {
    pub fn new(
        resolver: CoordinateResolver,
        matrices: MatrixProvider,
        solver: Arc<dyn TourSolver>,
    ) -> Self {
        Self {
            resolver,
            matrices,
            solver,
            clusterer: Clusterer::new(),
            resolve_concurrency: DEFAULT_RESOLVE_CONCURRENCY,
        }
    }

    /// Cap on student links resolved at once
    pub fn with_resolve_concurrency(mut self, limit: usize) -> Self {
        self.resolve_concurrency = limit.max(1);
        self
    }

    /// Wire up the backends named by `config`
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let (places, expander, source): (
            Arc<dyn PlaceLookup>,
            Arc<dyn LinkExpander>,
            Arc<dyn DistanceMatrixSource>,
        ) = match config.maps_backend {
            MapsBackend::Google => {
                let key = config
                    .google_api_key
                    .clone()
                    .context("GOOGLE_MAPS_SERVER_KEY must be set for the google backend")?;
                let http = HttpClient::new(config.request_timeout, config.retry)
                    .context("Failed to build HTTP client")?;
                (
                    Arc::new(GooglePlacesClient::new(http.clone(), key.clone())),
                    Arc::new(HttpLinkExpander::new(http.clone())),
                    Arc::new(GoogleDistanceMatrixClient::new(http, key)),
                )
            }
            MapsBackend::Mock => (
                Arc::new(MockPlaces::new()),
                Arc::new(MockExpander::new()),
                Arc::new(OfflineMatrixSource::new()),
            ),
        };

        let resolver = CoordinateResolver::new(
            places,
            expander,
            config.resolve_cache_size,
            config.negative_cache_ttl,
        );
        let matrices = MatrixProvider::new(
            source,
            config.matrix_chunk,
            config.matrix_concurrency,
            config.matrix_cache_size,
        );
        let solver = create_tour_solver(config.solver_backend, config.solver.clone());

        info!(
            "Planner ready: {:?} maps backend, {} tour solver",
            config.maps_backend,
            solver.name()
        );
        Ok(Self::new(resolver, matrices, solver)
            .with_resolve_concurrency(config.resolve_concurrency))
    }

    /// Coordinates for one pasted address or link
    pub async fn resolve(&self, text: &str) -> Result<Coordinates, PlanError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(PlanError::Validation("missing url".to_string()));
        }
        self.resolver
            .resolve(text)
            .await
            .ok_or_else(|| PlanError::NotFound("coords not found".to_string()))
    }

    /// Long form of a share link
    pub async fn expand(&self, url: &str) -> Result<String, PlanError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(PlanError::Validation("missing url".to_string()));
        }
        match self.resolver.expand(url).await {
            Ok(Some(long_url)) => Ok(long_url),
            Ok(None) | Err(_) => Err(PlanError::ExpandFailed("expand failed".to_string())),
        }
    }

    pub async fn optimize(&self, request: OptimizeRequest) -> Result<OptimizeResponse, PlanError> {
        let (Some(school), Some(students)) = (request.school.as_ref(), request.students.as_ref())
        else {
            return Err(PlanError::Validation(
                "Provide 'school' and 'students'.".to_string(),
            ));
        };
        if students.len() > MAX_STUDENTS {
            return Err(PlanError::Validation(format!(
                "Too many students. Limit is {}.",
                MAX_STUDENTS
            )));
        }

        let params = OptimizeParams::from_request(&request);
        let defaulted_departure_time = params.departure_time.is_none();

        if students.is_empty() {
            return Ok(empty_response(&params, defaulted_departure_time));
        }

        // Resolve students lacking numeric coordinates, a bounded number at once
        let resolver = &self.resolver;
        let resolved: Vec<Option<Coordinates>> = stream::iter(students.iter())
            .map(|student| async move {
                if let Some(coords) = student.coordinates() {
                    return Some(coords);
                }
                match student.resolvable_link() {
                    Some(link) => resolver.resolve(link).await,
                    None => None,
                }
            })
            .buffered(self.resolve_concurrency)
            .collect()
            .await;

        let mut student_coords = Vec::with_capacity(students.len());
        for (student, coords) in students.iter().zip(resolved) {
            match coords {
                Some(coords) => student_coords.push(coords),
                None => {
                    return Err(PlanError::UnresolvedStudent {
                        name: student.display_name().to_string(),
                    })
                }
            }
        }

        let school_coords = school.coordinates().ok_or_else(|| {
            PlanError::Validation("School must include numeric 'lat' and 'lng'.".to_string())
        })?;

        let mut points = Vec::with_capacity(students.len() + 1);
        points.push(Point::new(
            school.name.clone().unwrap_or_else(|| DEFAULT_DEPOT_NAME.to_string()),
            school_coords,
        ));
        for (student, &coords) in students.iter().zip(&student_coords) {
            points.push(Point {
                name: student.name.clone(),
                coordinates: coords,
            });
        }

        let departure = Departure::normalize(params.departure_time.as_deref());
        let all_coords: Vec<Coordinates> = points.iter().map(|p| p.coordinates).collect();
        let build = self
            .matrices
            .build(&all_coords, departure, params.fallback_speed_kmh)
            .await;
        debug!(
            "Matrix ready for {} points departing {}",
            points.len(),
            departure.query_value()
        );

        let route_params = RouteParams {
            objective: params.objective,
            weight_duration: params.weight_duration,
            v_ref_kmh: params.max_speed_kmh,
            fuel_l_per_100km: params.fuel_l_per_100km,
            capacity: params.bus_capacity,
        };
        let search = FleetSearch::new(self.clusterer, TourBuilder::new(Arc::clone(&self.solver)));
        let bus_count = params.bus_count;
        let matrix_points = points.len();
        let search_build = Arc::clone(&build);

        // Clustering and tour search are CPU bound
        let solution = tokio::task::spawn_blocking(move || {
            search.search(
                &student_coords,
                &points,
                &search_build.matrices,
                bus_count,
                &route_params,
            )
        })
        .await
        .map_err(|e| PlanError::Internal(format!("fleet search task failed: {}", e)))??;

        let used_departure_epoch = departure.epoch_or(Utc::now().timestamp());
        let departure_time = params
            .departure_time
            .clone()
            .unwrap_or_else(|| local_iso(used_departure_epoch));

        let (avg_distance_km, avg_duration_min) = averages(&solution.routes);
        let summary = PlanSummary {
            total_students: students.len(),
            buses_used: solution.buses_used,
            bus_count: params.bus_count,
            objective: params.objective,
            defaulted_departure_time,
            departure_time,
            max_speed_kmh: params.max_speed_kmh,
            fallback_speed_kmh: params.fallback_speed_kmh,
            fuel_consumption_lper100: params.fuel_l_per_100km,
            avg_distance_km,
            avg_duration_min,
            total_fuel_liters: round_to(solution.total_fuel_liters, 2),
            weight_duration: hybrid_weight(&params),
        };

        info!(
            "Planned {} students on {} buses ({} fallback pairs)",
            summary.total_students, summary.buses_used, build.fallback_pairs
        );

        Ok(OptimizeResponse {
            summary,
            routes: solution.routes,
            diagnostics: Diagnostics {
                matrix_points,
                used_departure_epoch: Some(used_departure_epoch),
                fallback_pairs: build.fallback_pairs,
            },
        })
    }
}

fn hybrid_weight(params: &OptimizeParams) -> Option<f64> {
    (params.objective == Objective::Hybrid).then_some(params.weight_duration)
}

/// Mean of the already rounded per-route figures
fn averages(routes: &[RouteSummary]) -> (f64, f64) {
    if routes.is_empty() {
        return (0.0, 0.0);
    }
    let count = routes.len() as f64;
    let distance: f64 = routes.iter().map(|r| r.total_distance_km).sum();
    let duration: f64 = routes.iter().map(|r| r.total_duration_min).sum();
    (round_to(distance / count, 2), round_to(duration / count, 1))
}

fn empty_response(params: &OptimizeParams, defaulted_departure_time: bool) -> OptimizeResponse {
    let departure_time = params
        .departure_time
        .clone()
        .unwrap_or_else(|| local_iso(Utc::now().timestamp()));

    OptimizeResponse {
        summary: PlanSummary {
            total_students: 0,
            buses_used: 0,
            bus_count: params.bus_count,
            objective: params.objective,
            defaulted_departure_time,
            departure_time,
            max_speed_kmh: params.max_speed_kmh,
            fallback_speed_kmh: params.fallback_speed_kmh,
            fuel_consumption_lper100: params.fuel_l_per_100km,
            avg_distance_km: 0.0,
            avg_duration_min: 0.0,
            total_fuel_liters: 0.0,
            weight_duration: hybrid_weight(params),
        },
        routes: Vec::new(),
        diagnostics: Diagnostics {
            matrix_points: 1,
            used_departure_epoch: None,
            fallback_pairs: 0,
        },
    }
}
