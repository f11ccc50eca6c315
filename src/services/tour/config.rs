//! Tour solver configuration

use std::time::Duration;

/// Search budget for one closed tour
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Maximum solving time in seconds
    pub max_time_seconds: u32,
    /// Maximum generations for the metaheuristic
    pub max_generations: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_time_seconds: 8,
            max_generations: 3000,
        }
    }
}

impl SolverConfig {
    pub fn new(max_time_seconds: u32, max_generations: usize) -> Self {
        Self {
            max_time_seconds,
            max_generations,
        }
    }

    /// Default generation cap with a custom time budget
    pub fn with_time_limit(max_time_seconds: u32) -> Self {
        Self {
            max_time_seconds: max_time_seconds.max(1),
            ..Self::default()
        }
    }

    /// Fast configuration for interactive use
    /// - Quick response time (~5 seconds)
    pub fn fast() -> Self {
        Self {
            max_time_seconds: 5,
            max_generations: 500,
        }
    }

    /// Instant configuration for very fast response
    /// - Minimal solve time (~2 seconds)
    /// - May not find the optimal tour
    pub fn instant() -> Self {
        Self {
            max_time_seconds: 2,
            max_generations: 200,
        }
    }

    pub fn time_budget(&self) -> Duration {
        Duration::from_secs(u64::from(self.max_time_seconds))
    }
}
