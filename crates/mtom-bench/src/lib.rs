pub mod analytics;
pub mod config;
pub mod episode;
pub mod logging;
pub mod telemetry;
pub mod trace;
