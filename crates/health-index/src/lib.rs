pub mod config;
pub mod error;
pub mod loader;
pub mod rollup;
pub mod scoring;
pub mod service;
pub mod telemetry;
