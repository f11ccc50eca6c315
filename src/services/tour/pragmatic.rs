//! vrp-pragmatic tour solver integration.

use std::io::BufWriter;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::debug;
use vrp_cli::extensions::solve::config::{create_builder_from_config, Config, TerminationConfig};
use vrp_core::solver::Solver;
use vrp_pragmatic::format::problem::{Matrix, PragmaticProblem, Problem};
use vrp_pragmatic::format::solution::{
    write_pragmatic, PragmaticOutputType, Solution as PragmaticSolution,
};

use super::adapter::{build_cost_matrix, build_tour_problem, job_index, DEFAULT_PROFILE};
use super::{close_tour, trivial_tour, SolverConfig, Tour, TourSolver};

/// Single-vehicle closed tour via the vrp-core metaheuristic
pub struct PragmaticTourSolver {
    config: SolverConfig,
}

impl PragmaticTourSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }
}

impl TourSolver for PragmaticTourSolver {
    fn solve(&self, cost: &[Vec<u64>]) -> Result<Tour> {
        if cost.is_empty() {
            bail!("cannot build a tour over an empty cost matrix");
        }
        if let Some(tour) = trivial_tour(cost) {
            return Ok(tour);
        }
        solve_pragmatic(cost, &self.config)
    }

    fn name(&self) -> &'static str {
        "vrp-pragmatic"
    }
}

pub fn solve_pragmatic(cost: &[Vec<u64>], config: &SolverConfig) -> Result<Tour> {
    let problem_json = build_tour_problem(cost.len());
    let problem_format: Problem = serde_json::from_value(problem_json)
        .context("Failed to deserialize pragmatic problem")?;

    let matrix: Matrix = build_cost_matrix(cost, DEFAULT_PROFILE);
    let core_problem = (problem_format, vec![matrix])
        .read_pragmatic()
        .context("Failed to build core problem from pragmatic format")?;

    let core_problem = Arc::new(core_problem);
    let solver_config = build_solver_config(core_problem.clone(), config)?;

    let solution = Solver::new(core_problem.clone(), solver_config)
        .solve()
        .context("Failed to solve tour with vrp-pragmatic")?;

    let pragmatic = write_pragmatic_solution(core_problem.as_ref(), &solution)?;
    let visits = visit_order(&pragmatic)?;

    let tour = close_tour(visits, cost)?;
    debug!("vrp-pragmatic tour over {} points, cost {}", cost.len(), tour.cost);
    Ok(tour)
}

fn build_solver_config(
    problem: Arc<vrp_core::models::Problem>,
    config: &SolverConfig,
) -> Result<vrp_core::rosomaxa::evolution::EvolutionConfig<
    vrp_core::solver::RefinementContext,
    vrp_core::models::GoalContext,
    vrp_core::construction::heuristics::InsertionContext,
>> {
    let config = Config {
        termination: Some(TerminationConfig {
            max_time: Some(config.max_time_seconds as usize),
            max_generations: Some(config.max_generations),
            variation: None,
        }),
        evolution: None,
        hyper: None,
        environment: None,
        telemetry: None,
        output: None,
    };

    let builder = create_builder_from_config(problem, Vec::new(), &config)
        .context("Failed to create solver builder")?;

    builder.build().context("Failed to build solver configuration")
}

fn write_pragmatic_solution(
    problem: &vrp_core::models::Problem,
    solution: &vrp_core::models::Solution,
) -> Result<PragmaticSolution> {
    let mut writer = BufWriter::new(Vec::new());
    write_pragmatic(problem, solution, PragmaticOutputType::default(), &mut writer)
        .context("Failed to serialize pragmatic solution")?;

    let bytes = writer.into_inner().context("Failed to flush solution writer")?;
    let json = String::from_utf8(bytes).context("Solution is not valid UTF-8")?;
    let parsed: PragmaticSolution = serde_json::from_str(&json)
        .context("Failed to parse pragmatic solution JSON")?;

    Ok(parsed)
}

/// Local indices in visiting order, depot excluded
fn visit_order(solution: &PragmaticSolution) -> Result<Vec<usize>> {
    if let Some(unassigned) = solution.unassigned.as_ref().filter(|jobs| !jobs.is_empty()) {
        let ids: Vec<&str> = unassigned.iter().map(|job| job.job_id.as_str()).collect();
        bail!("Solver left stops unassigned: {}", ids.join(", "));
    }

    let Some(tour) = solution.tours.first() else {
        bail!("Solver returned no tour");
    };

    let mut visits = Vec::new();
    for stop in &tour.stops {
        for activity in stop.activities() {
            if activity.activity_type == "departure" || activity.activity_type == "arrival" {
                continue;
            }
            let index = job_index(&activity.job_id)
                .with_context(|| format!("Unknown job '{}' in solution", activity.job_id))?;
            visits.push(index);
        }
    }

    Ok(visits)
}
