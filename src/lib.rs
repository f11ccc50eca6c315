//! School bus route planning
//!
//! Resolves pasted student locations, builds traffic-aware matrices, splits
//! students across buses under a seat limit, and orders each bus's stops.

pub mod config;
pub mod defaults;
pub mod error;
pub mod services;
pub mod types;

pub use config::Config;
pub use error::PlanError;
pub use services::planner::Planner;
