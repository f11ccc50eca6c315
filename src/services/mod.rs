//! Business logic services

pub mod cache;
pub mod clustering;
pub mod fleet;
pub mod geo;
pub mod http;
pub mod planner;
pub mod resolver;
pub mod routing;
pub mod tour;
