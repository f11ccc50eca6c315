//! Type definitions

pub mod point;
pub mod request;
pub mod response;

pub use point::*;
pub use request::*;
pub use response::*;
