pub mod alerts;
pub mod analysis;
pub mod config;
pub mod error;
pub mod generator;
pub mod metrics;
pub mod period;
pub mod roster;
pub mod snapshot;
pub mod web;

pub use error::{Error, Result};
