//! Raster publishing to a map server.
//!
//! The precipitation raster and one drought-index raster per scale are
//! uploaded as coverage stores into a single workspace, each with a named
//! style.

mod config;
mod error;
mod geoserver;
mod stage;
mod traits;

pub use config::PublishConfig;
pub use error::PublishError;
pub use geoserver::GeoServerPublisher;
pub use stage::PublishStage;
pub use traits::RasterPublisher;
