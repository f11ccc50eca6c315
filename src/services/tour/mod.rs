//! Closed-tour construction for one bus
//!
//! A cluster is turned into a cluster-local cost matrix for the chosen
//! objective, handed to a [`TourSolver`], and the returned order is walked
//! against the real distance and duration matrices to produce a route.

mod adapter;
mod config;
mod local_search;
mod pragmatic;

use std::sync::Arc;

use anyhow::{bail, Result};
use tracing::debug;

pub use config::SolverConfig;
pub use local_search::LocalSearchTourSolver;
pub use pragmatic::PragmaticTourSolver;

use crate::error::PlanError;
use crate::services::geo::kmh_to_mps;
use crate::services::routing::DistanceTimeMatrices;
use crate::types::{round_to, Objective, Point, RouteStop, RouteSummary};

/// A closed visiting order over local indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tour {
    /// `[0]` for a lone depot, otherwise `[0, .., 0]`
    pub order: Vec<usize>,
    /// Sum of arc costs along `order`
    pub cost: u64,
}

impl Tour {
    pub fn from_order(order: Vec<usize>, cost: &[Vec<u64>]) -> Self {
        let cost = tour_cost(&order, cost);
        Self { order, cost }
    }

    /// Starts and ends at 0 and visits every other index exactly once
    pub fn is_closed_over(&self, size: usize) -> bool {
        if size == 1 {
            return self.order == [0];
        }
        if self.order.len() != size + 1
            || self.order.first() != Some(&0)
            || self.order.last() != Some(&0)
        {
            return false;
        }
        let mut seen = vec![false; size];
        for &index in &self.order[1..size] {
            if index == 0 || index >= size || seen[index] {
                return false;
            }
            seen[index] = true;
        }
        true
    }
}

pub fn tour_cost(order: &[usize], cost: &[Vec<u64>]) -> u64 {
    order
        .windows(2)
        .map(|arc| cost[arc[0]][arc[1]])
        .fold(0u64, u64::saturating_add)
}

/// Tours that need no search: a lone depot or a single student
pub fn trivial_tour(cost: &[Vec<u64>]) -> Option<Tour> {
    match cost.len() {
        1 => Some(Tour {
            order: vec![0],
            cost: 0,
        }),
        2 => Some(Tour::from_order(vec![0, 1, 0], cost)),
        _ => None,
    }
}

/// Closed-tour search over a square non-negative cost matrix
pub trait TourSolver: Send + Sync {
    fn solve(&self, cost: &[Vec<u64>]) -> Result<Tour>;

    fn name(&self) -> &'static str;
}

/// Which solver the planner uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolverBackend {
    #[default]
    Pragmatic,
    Local,
}

impl SolverBackend {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "pragmatic" | "vrp" => Some(SolverBackend::Pragmatic),
            "local" => Some(SolverBackend::Local),
            _ => None,
        }
    }
}

pub fn create_tour_solver(backend: SolverBackend, config: SolverConfig) -> Arc<dyn TourSolver> {
    match backend {
        SolverBackend::Pragmatic => Arc::new(PragmaticTourSolver::new(config)),
        SolverBackend::Local => Arc::new(LocalSearchTourSolver::new(config.time_budget())),
    }
}

/// Objective-specific cost matrix for one cluster
pub fn cost_matrix(
    objective: Objective,
    sub: &DistanceTimeMatrices,
    weight_duration: f64,
    v_ref_kmh: f64,
) -> Vec<Vec<u64>> {
    match objective {
        Objective::Distance => sub.distances.clone(),
        Objective::Duration => sub.durations.clone(),
        Objective::Hybrid => {
            let w = weight_duration.clamp(0.0, 1.0);
            let v_ref_mps = kmh_to_mps(v_ref_kmh).max(1e-6);
            (0..sub.size)
                .map(|i| {
                    (0..sub.size)
                        .map(|j| {
                            if i == j {
                                return 0;
                            }
                            let distance_secs = sub.distance(i, j) as f64 / v_ref_mps;
                            (w * sub.duration(i, j) as f64 + (1.0 - w) * distance_secs)
                                .round_ties_even() as u64
                        })
                        .collect()
                })
                .collect()
        }
    }
}

/// Per-request knobs shared by every route
#[derive(Debug, Clone)]
pub struct RouteParams {
    pub objective: Objective,
    pub weight_duration: f64,
    pub v_ref_kmh: f64,
    pub fuel_l_per_100km: f64,
    pub capacity: usize,
}

/// A route plus the unrounded figures the fleet search sums
#[derive(Debug, Clone)]
pub struct BuiltRoute {
    pub route: RouteSummary,
    pub cost: u64,
    pub fuel_liters: f64,
}

pub struct TourBuilder {
    solver: Arc<dyn TourSolver>,
}

impl TourBuilder {
    pub fn new(solver: Arc<dyn TourSolver>) -> Self {
        Self { solver }
    }

    pub fn solver_name(&self) -> &'static str {
        self.solver.name()
    }

    /// Route for one cluster of student indices, `None` when empty.
    ///
    /// `points` and `matrices` are in global order: depot at 0, student `i`
    /// at `i + 1`.
    pub fn build(
        &self,
        bus_id: usize,
        cluster: &[usize],
        points: &[Point],
        matrices: &DistanceTimeMatrices,
        params: &RouteParams,
    ) -> Result<Option<BuiltRoute>, PlanError> {
        if cluster.is_empty() {
            return Ok(None);
        }

        let gidx: Vec<usize> = std::iter::once(0)
            .chain(cluster.iter().map(|&i| i + 1))
            .collect();
        let sub = matrices.submatrix(&gidx);
        let cost = cost_matrix(params.objective, &sub, params.weight_duration, params.v_ref_kmh);

        let tour = self
            .solver
            .solve(&cost)
            .map_err(|e| PlanError::Solver(format!("{:#}", e)))?;
        if !tour.is_closed_over(sub.size) {
            return Err(PlanError::Solver(format!(
                "{} returned an invalid tour {:?} for {} points",
                self.solver.name(),
                tour.order,
                sub.size
            )));
        }

        let (total_distance, total_duration) = tour
            .order
            .windows(2)
            .fold((0u64, 0u64), |(dist, dur), arc| {
                (
                    dist.saturating_add(sub.distance(arc[0], arc[1])),
                    dur.saturating_add(sub.duration(arc[0], arc[1])),
                )
            });

        let distance_km = total_distance as f64 / 1000.0;
        let fuel_liters = distance_km * (params.fuel_l_per_100km / 100.0);

        debug!(
            "Bus {}: {} students, cost {} via {}",
            bus_id,
            cluster.len(),
            tour.cost,
            self.solver.name()
        );

        let stops = tour
            .order
            .iter()
            .map(|&k| RouteStop::from_point(&points[gidx[k]], k))
            .collect();

        Ok(Some(BuiltRoute {
            route: RouteSummary {
                bus_id,
                stops,
                total_distance_km: round_to(distance_km, 2),
                total_duration_min: round_to(total_duration as f64 / 60.0, 1),
                used_seats: cluster.len(),
                capacity: params.capacity,
                fuel_liters: round_to(fuel_liters, 2),
                objective_cost: tour.cost,
            },
            cost: tour.cost,
            fuel_liters,
        }))
    }
}

/// Every index but the depot must appear in a solver's order exactly once
pub(crate) fn close_tour(visits: Vec<usize>, cost: &[Vec<u64>]) -> Result<Tour> {
    let mut order = Vec::with_capacity(visits.len() + 2);
    order.push(0);
    order.extend(visits);
    order.push(0);

    let tour = Tour::from_order(order, cost);
    if !tour.is_closed_over(cost.len()) {
        bail!("tour {:?} does not visit all {} points once", tour.order, cost.len());
    }
    Ok(tour)
}
