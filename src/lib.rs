pub mod api;
pub mod config;
pub mod error;
pub mod ingest;
pub mod messaging;
pub mod metrics;
pub mod models;
pub mod query;
pub mod state;

pub use error::{AppError, Result};
