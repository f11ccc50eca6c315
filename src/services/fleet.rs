//! Fleet size search
//!
//! Tries 1, 2, .. buses, clusters and routes each size, and keeps the
//! cheapest plan after a small per-bus bias so ties go to fewer buses. Stops
//! early once larger fleets keep failing to improve.

use tracing::{debug, info};

use crate::defaults::BUS_PENALTY_EQUIV_SEC;
use crate::error::{CapacityError, PlanError};
use crate::services::clustering::{Clusterer, Clusters};
use crate::services::routing::DistanceTimeMatrices;
use crate::services::tour::{RouteParams, TourBuilder};
use crate::types::{Coordinates, Point, RouteSummary};

/// When to give up on larger fleets
#[derive(Debug, Clone, Copy)]
pub struct StallPolicy {
    /// Consecutive non-improving sizes tolerated
    pub window: usize,
    /// Biased-cost drop a size needs to count as an improvement
    pub min_improvement: u64,
}

impl Default for StallPolicy {
    fn default() -> Self {
        Self {
            window: 2,
            min_improvement: 0,
        }
    }
}

/// The winning fleet size
#[derive(Debug, Clone)]
pub struct FleetSolution {
    pub routes: Vec<RouteSummary>,
    pub clusters: Clusters,
    pub buses_used: usize,
    /// Raw summed tour cost
    pub total_cost: u64,
    /// Cost plus the per-bus bias, the value sizes compete on
    pub biased_cost: u64,
    pub total_fuel_liters: f64,
}

pub struct FleetSearch {
    clusterer: Clusterer,
    builder: TourBuilder,
    stall: StallPolicy,
}

impl FleetSearch {
    pub fn new(clusterer: Clusterer, builder: TourBuilder) -> Self {
        Self {
            clusterer,
            builder,
            stall: StallPolicy::default(),
        }
    }

    pub fn with_stall_policy(mut self, stall: StallPolicy) -> Self {
        self.stall = stall;
        self
    }

    /// Best plan over fleet sizes 1..=min(requested, max(1, students)).
    ///
    /// `points` holds the depot then every student, matching `matrices`.
    pub fn search(
        &self,
        students: &[Coordinates],
        points: &[Point],
        matrices: &DistanceTimeMatrices,
        requested_buses: usize,
        params: &RouteParams,
    ) -> Result<FleetSolution, PlanError> {
        let max_buses = requested_buses.min(students.len().max(1)).max(1);
        let mut best: Option<FleetSolution> = None;
        let mut last_capacity_error: Option<CapacityError> = None;
        let mut stall_runs = 0;

        for buses in 1..=max_buses {
            let clusters = match self.clusterer.cluster(students, buses, params.capacity) {
                Ok(clusters) => clusters,
                Err(e) => {
                    debug!("Skipping {} buses: {}", buses, e);
                    last_capacity_error = Some(e);
                    continue;
                }
            };

            let trial = self.evaluate(clusters, points, matrices, params)?;
            debug!(
                "{} buses: {} routes, cost {} (biased {})",
                buses,
                trial.buses_used,
                trial.total_cost,
                trial.biased_cost
            );

            let improves = match &best {
                None => true,
                Some(current) => {
                    trial.biased_cost.saturating_add(self.stall.min_improvement)
                        < current.biased_cost
                }
            };

            if improves {
                best = Some(trial);
                stall_runs = 0;
            } else {
                stall_runs += 1;
                let best_buses = best.as_ref().map_or(1, |b| b.buses_used.max(1));
                if stall_runs >= self.stall.window && buses >= best_buses {
                    debug!("No improvement for {} sizes, stopping at {} buses", stall_runs, buses);
                    break;
                }
            }
        }

        match best {
            Some(best) => {
                info!(
                    "Chose {} of {} buses, cost {}",
                    best.buses_used, requested_buses, best.total_cost
                );
                Ok(best)
            }
            None => Err(last_capacity_error
                .unwrap_or(CapacityError {
                    students: students.len(),
                    buses: max_buses,
                    capacity: params.capacity,
                })
                .into()),
        }
    }

    fn evaluate(
        &self,
        clusters: Clusters,
        points: &[Point],
        matrices: &DistanceTimeMatrices,
        params: &RouteParams,
    ) -> Result<FleetSolution, PlanError> {
        let mut routes = Vec::new();
        let mut total_cost = 0u64;
        let mut total_fuel_liters = 0.0;

        for (index, cluster) in clusters.iter().enumerate() {
            if let Some(built) = self.builder.build(index + 1, cluster, points, matrices, params)? {
                total_cost = total_cost.saturating_add(built.cost);
                total_fuel_liters += built.fuel_liters;
                routes.push(built.route);
            }
        }

        let buses_used = routes.len();
        let biased_cost = total_cost.saturating_add(BUS_PENALTY_EQUIV_SEC * buses_used as u64);

        Ok(FleetSolution {
            routes,
            clusters,
            buses_used,
            total_cost,
            biased_cost,
            total_fuel_liters,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::services::geo::haversine_rounded_m;
    use crate::services::tour::LocalSearchTourSolver;
    use crate::types::Objective;

    fn search() -> FleetSearch {
        let solver = Arc::new(LocalSearchTourSolver::new(Duration::from_secs(1)));
        FleetSearch::new(Clusterer::new(), TourBuilder::new(solver))
    }

    fn params(capacity: usize) -> RouteParams {
        RouteParams {
            objective: Objective::Duration,
            weight_duration: 0.7,
            v_ref_kmh: 60.0,
            fuel_l_per_100km: 6.0,
            capacity,
        }
    }

    /// Straight-line matrices at 36 km/h (10 m/s)
    fn world(school: Coordinates, students: &[Coordinates]) -> (Vec<Point>, DistanceTimeMatrices) {
        let mut points = vec![Point::new("School", school)];
        points.extend(students.iter().map(|&c| Point::unnamed(c)));

        let n = points.len();
        let mut matrices = DistanceTimeMatrices::zeroed(n);
        for i in 0..n {
            for j in 0..n {
                let d = haversine_rounded_m(&points[i].coordinates, &points[j].coordinates);
                matrices.distances[i][j] = d;
                matrices.durations[i][j] = d / 10;
            }
        }
        (points, matrices)
    }

    #[test]
    fn test_nearby_students_share_one_bus() {
        let school = Coordinates::new(24.70, 46.60);
        let students = [
            Coordinates::new(24.701, 46.601),
            Coordinates::new(24.702, 46.600),
            Coordinates::new(24.700, 46.602),
        ];
        let (points, matrices) = world(school, &students);

        let solution = search()
            .search(&students, &points, &matrices, 3, &params(10))
            .unwrap();

        assert_eq!(solution.buses_used, 1);
        assert_eq!(solution.routes.len(), 1);
        assert_eq!(solution.biased_cost, solution.total_cost + 60);
    }

    #[test]
    fn test_equal_raw_cost_goes_to_fewer_buses() {
        // students on opposite sides of the school; driving between them
        // passes the school, so one loop costs the same as two out-and-backs
        let school = Coordinates::new(24.70, 46.60);
        let students = [Coordinates::new(24.71, 46.60), Coordinates::new(24.69, 46.60)];
        let mut points = vec![Point::new("School", school)];
        points.extend(students.iter().map(|&c| Point::unnamed(c)));

        let legs = vec![vec![0, 100, 100], vec![100, 0, 200], vec![100, 200, 0]];
        let matrices = DistanceTimeMatrices {
            distances: legs.clone(),
            durations: legs,
            size: 3,
        };
        let fleet = search();

        let split = Clusterer::new().cluster(&students, 2, 10).unwrap();
        let two_buses = fleet.evaluate(split, &points, &matrices, &params(10)).unwrap();
        assert_eq!(two_buses.buses_used, 2);
        assert_eq!(two_buses.total_cost, 400);

        let solution = fleet
            .search(&students, &points, &matrices, 2, &params(10))
            .unwrap();

        assert_eq!(solution.buses_used, 1);
        assert_eq!(solution.total_cost, 400);
        assert_eq!(solution.biased_cost, 460);
    }

    #[test]
    fn test_capacity_forces_more_buses() {
        let school = Coordinates::new(24.70, 46.60);
        let students: Vec<Coordinates> = (0..5)
            .map(|i| Coordinates::new(24.71 + i as f64 * 0.001, 46.61))
            .collect();
        let (points, matrices) = world(school, &students);

        let solution = search()
            .search(&students, &points, &matrices, 4, &params(2))
            .unwrap();

        assert!(solution.buses_used >= 3);
        let seated: usize = solution.routes.iter().map(|r| r.used_seats).sum();
        assert_eq!(seated, 5);
        assert!(solution.routes.iter().all(|r| r.used_seats <= 2));
    }

    #[test]
    fn test_no_feasible_size_is_capacity_error() {
        let school = Coordinates::new(24.70, 46.60);
        let students: Vec<Coordinates> = (0..5)
            .map(|i| Coordinates::new(24.71 + i as f64 * 0.001, 46.61))
            .collect();
        let (points, matrices) = world(school, &students);

        let err = search()
            .search(&students, &points, &matrices, 2, &params(2))
            .unwrap_err();

        assert!(matches!(
            err,
            PlanError::Capacity(CapacityError {
                students: 5,
                buses: 2,
                capacity: 2
            })
        ));
    }

    #[test]
    fn test_far_apart_groups_split_across_buses() {
        // two neighbourhoods on opposite sides of the school, 20 km out
        let school = Coordinates::new(24.70, 46.60);
        let students = [
            Coordinates::new(24.88, 46.60),
            Coordinates::new(24.52, 46.60),
            Coordinates::new(24.881, 46.601),
            Coordinates::new(24.521, 46.601),
        ];
        let (points, matrices) = world(school, &students);

        let solution = search()
            .search(&students, &points, &matrices, 2, &params(2))
            .unwrap();

        assert_eq!(solution.buses_used, 2);
        for route in &solution.routes {
            assert_eq!(route.stops.first().unwrap().name, "School");
            assert_eq!(route.stops.last().unwrap().name, "School");
        }
    }

    #[test]
    fn test_bus_ids_follow_cluster_index() {
        let school = Coordinates::new(24.70, 46.60);
        let students = [Coordinates::new(24.80, 46.60), Coordinates::new(24.60, 46.60)];
        let (points, matrices) = world(school, &students);

        let solution = search()
            .search(&students, &points, &matrices, 2, &params(1))
            .unwrap();

        let ids: Vec<usize> = solution.routes.iter().map(|r| r.bus_id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_stall_window_stops_early() {
        // one tight blob: every extra bus only adds cost
        let school = Coordinates::new(24.70, 46.60);
        let students: Vec<Coordinates> = (0..8)
            .map(|i| {
                Coordinates::new(
                    24.75 + (i % 3) as f64 * 0.0005,
                    46.65 + (i / 3) as f64 * 0.0005,
                )
            })
            .collect();
        let (points, matrices) = world(school, &students);

        let solution = search()
            .with_stall_policy(StallPolicy {
                window: 1,
                min_improvement: 0,
            })
            .search(&students, &points, &matrices, 8, &params(10))
            .unwrap();

        assert_eq!(solution.buses_used, 1);
    }
}
