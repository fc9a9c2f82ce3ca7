//! Safety core for a personal-safety walking companion.
//!
//! Scores how risky a spot is from community reports, ranks a safest and a
//! fastest route, and runs guardian mode: a single tracked trip with
//! periodic check-ins that alerts trusted contacts when one is missed.

pub mod api;
pub mod clock;
pub mod config;
pub mod contacts;
pub mod error;
pub mod graph;
pub mod guardian;
pub mod models;
pub mod paths;
pub mod reports;
pub mod routes;
pub mod safety;

pub use error::{Result, SafetyError};
