//! Error taxonomy
//!
//! `TransportError` stays inside the services: every remote failure is
//! absorbed by a fallback. `PlanError` is what callers of the planning
//! operations see.

use thiserror::Error;

/// Failure of a remote call (Google web services, link expansion)
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned HTTP {0}")]
    Status(u16),

    /// Non-OK top-level status in an otherwise well-formed reply
    #[error("upstream status {status}: {message}")]
    Api { status: String, message: String },

    #[error("malformed upstream response: {0}")]
    Decode(String),
}

/// Returned by the clusterer when seats cannot cover every student
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Too many students ({students}) for {buses} buses with {capacity} seats each")]
pub struct CapacityError {
    pub students: usize,
    pub buses: usize,
    pub capacity: usize,
}

/// Errors surfaced by the planning operations
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("{0}")]
    Validation(String),

    #[error("Missing coordinates for student '{name}'. Provide an address or a Google Maps link.")]
    UnresolvedStudent { name: String },

    #[error(transparent)]
    Capacity(#[from] CapacityError),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    ExpandFailed(String),

    /// The tour solver gave no tour for a well-formed matrix
    #[error("tour solver failed: {0}")]
    Solver(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl PlanError {
    /// HTTP-style status hint for whatever transport wraps the planner
    pub fn status_code(&self) -> u16 {
        match self {
            PlanError::Validation(_)
            | PlanError::UnresolvedStudent { .. }
            | PlanError::Capacity(_)
            | PlanError::ExpandFailed(_) => 400,
            PlanError::NotFound(_) => 404,
            PlanError::Solver(_) | PlanError::Internal(_) => 500,
        }
    }
}
