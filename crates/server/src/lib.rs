//! HTTP API and schedules of the drought-index pipeline service.

pub mod api;
pub mod metrics;
pub mod scheduler;
pub mod state;
