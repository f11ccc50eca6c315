//! Nearest-neighbour construction with 2-opt improvement
//!
//! Deterministic, dependency-free fallback to the metaheuristic. Handles
//! asymmetric matrices: a 2-opt move reverses the inner segment, so the
//! reversed arcs are priced in their new direction.

use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use tracing::debug;

use super::{close_tour, trivial_tour, Tour, TourSolver};

pub struct LocalSearchTourSolver {
    time_budget: Duration,
}

impl LocalSearchTourSolver {
    pub fn new(time_budget: Duration) -> Self {
        Self { time_budget }
    }
}

impl TourSolver for LocalSearchTourSolver {
    fn solve(&self, cost: &[Vec<u64>]) -> Result<Tour> {
        if cost.is_empty() {
            bail!("cannot build a tour over an empty cost matrix");
        }
        if let Some(tour) = trivial_tour(cost) {
            return Ok(tour);
        }

        let deadline = Instant::now() + self.time_budget;
        let initial = nearest_neighbor(cost);
        let improved = two_opt(initial, cost, deadline);

        let tour = close_tour(improved[1..improved.len() - 1].to_vec(), cost)?;
        debug!("Local search tour over {} points, cost {}", cost.len(), tour.cost);
        Ok(tour)
    }

    fn name(&self) -> &'static str {
        "local-search"
    }
}

/// Closed tour `[0, .., 0]` always taking the cheapest unvisited point,
/// lowest index on ties
fn nearest_neighbor(cost: &[Vec<u64>]) -> Vec<usize> {
    let n = cost.len();
    let mut visited = vec![false; n];
    let mut route = Vec::with_capacity(n + 1);

    visited[0] = true;
    route.push(0);
    let mut current = 0;

    for _ in 1..n {
        let mut best_next = None;
        let mut best_cost = u64::MAX;

        for j in 1..n {
            if !visited[j] && (best_next.is_none() || cost[current][j] < best_cost) {
                best_cost = cost[current][j];
                best_next = Some(j);
            }
        }

        if let Some(next) = best_next {
            visited[next] = true;
            route.push(next);
            current = next;
        }
    }

    route.push(0);
    route
}

/// First-improvement 2-opt until no move helps or the deadline passes
fn two_opt(mut route: Vec<usize>, cost: &[Vec<u64>], deadline: Instant) -> Vec<usize> {
    let last = route.len() - 1;
    let c = |a: usize, b: usize| cost[a][b] as i128;

    'search: loop {
        // forward[k] / backward[k]: cost of route[0..=k] walked forwards / in reverse
        let mut forward = vec![0i128; route.len()];
        let mut backward = vec![0i128; route.len()];
        for k in 1..route.len() {
            forward[k] = forward[k - 1] + c(route[k - 1], route[k]);
            backward[k] = backward[k - 1] + c(route[k], route[k - 1]);
        }

        for i in 1..last {
            if Instant::now() >= deadline {
                break 'search;
            }
            for j in (i + 1)..last {
                let removed = c(route[i - 1], route[i])
                    + c(route[j], route[j + 1])
                    + (forward[j] - forward[i]);
                let added = c(route[i - 1], route[j])
                    + c(route[i], route[j + 1])
                    + (backward[j] - backward[i]);

                if added < removed {
                    route[i..=j].reverse();
                    continue 'search;
                }
            }
        }
        break;
    }

    route
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::tour::tour_cost;

    fn solver() -> LocalSearchTourSolver {
        LocalSearchTourSolver::new(Duration::from_secs(2))
    }

    fn symmetric(points: &[(f64, f64)]) -> Vec<Vec<u64>> {
        points
            .iter()
            .map(|a| {
                points
                    .iter()
                    .map(|b| {
                        (((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt() * 100.0).round() as u64
                    })
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_single_point_is_degenerate_tour() {
        let tour = solver().solve(&[vec![0]]).unwrap();
        assert_eq!(tour.order, vec![0]);
        assert_eq!(tour.cost, 0);
    }

    #[test]
    fn test_empty_matrix_fails() {
        assert!(solver().solve(&[]).is_err());
    }

    #[test]
    fn test_square_corners_visit_perimeter() {
        // depot at the origin corner, students on the other three
        let cost = symmetric(&[(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (1.0, 0.0)]);

        let tour = solver().solve(&cost).unwrap();

        assert!(tour.is_closed_over(4));
        assert_eq!(tour.cost, 400);
        assert_eq!(tour.cost, tour_cost(&tour.order, &cost));
    }

    #[test]
    fn test_two_opt_never_worse_than_greedy() {
        let points = [(0.0, 0.0), (1.0, 0.1), (2.0, 0.0), (2.0, 1.0), (1.0, 0.9), (0.0, 1.0), (1.0, 1.6)];
        let cost = symmetric(&points);

        let nn = nearest_neighbor(&cost);
        let tour = solver().solve(&cost).unwrap();

        assert!(tour.is_closed_over(points.len()));
        assert!(tour.cost <= tour_cost(&nn, &cost));
    }

    #[test]
    fn test_asymmetric_costs_respect_direction() {
        // going round 0 -> 1 -> 2 -> 3 -> 0 is cheap, the other way is not
        let mut cost = vec![vec![100u64; 4]; 4];
        for i in 0..4 {
            cost[i][i] = 0;
            cost[i][(i + 1) % 4] = 1;
        }

        let tour = solver().solve(&cost).unwrap();

        assert_eq!(tour.order, vec![0, 1, 2, 3, 0]);
        assert_eq!(tour.cost, 4);
    }

    #[test]
    fn test_two_opt_reverses_bad_segment() {
        let cost = symmetric(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0)]);
        let far = Instant::now() + Duration::from_secs(5);

        let route = two_opt(vec![0, 2, 1, 3, 0], &cost, far);

        assert_eq!(tour_cost(&route, &cost), 600);
    }

    #[test]
    fn test_solution_is_deterministic() {
        let points: Vec<(f64, f64)> = (0..15)
            .map(|i| ((i * 7 % 11) as f64, (i * 5 % 13) as f64))
            .collect();
        let cost = symmetric(&points);

        assert_eq!(solver().solve(&cost).unwrap(), solver().solve(&cost).unwrap());
    }
}
