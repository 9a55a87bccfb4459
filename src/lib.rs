//! OpenTSDB push exporter for in-process metric registries.
//!
//! This crate is a scheduled export adapter, not a metrics engine: counters,
//! gauges, histograms, meters and timers (and their statistics) live in an
//! external registry that the exporter reads through the capability traits in
//! [`registry`]. On every tick of a fixed flush interval the exporter opens a
//! short-lived TCP connection to the collector, renders each metric into
//! OpenTSDB `put` lines, and closes the connection.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use opentsdb_export::{Exporter, ExporterConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ExporterConfig::new("tsdb.internal", 4242)
//!         .with_prefix("app.web")
//!         .with_tag("dc", "eu-west");
//!     let exporter = Exporter::new(config, registry);
//!
//!     let shutdown = CancellationToken::new();
//!     tokio::spawn(async move { exporter.run(shutdown).await });
//! }
//! ```

pub mod config;
pub mod exporter;
pub mod registry;

mod format;
mod hostname;

pub use config::{ConfigError, ExporterConfig, WriteErrorPolicy};
pub use exporter::{ExportError, Exporter};
pub use registry::{
    Counter, Gauge, GaugeFloat64, Histogram, HistogramSnapshot, Meter, MeterSnapshot, Metric,
    Registry, Timer, TimerSnapshot,
};
