//! Read-only collaborator interface to the metrics registry.
//!
//! The exporter does not own any metric state. Counters, gauges, histograms,
//! meters and timers live elsewhere in the process; this module defines the
//! capability traits through which the exporter reads them, plus the closed
//! [`Metric`] sum type the registry hands out during iteration.
//!
//! Histogram/meter/timer statistics (percentiles, rates, moving averages) are
//! computed by the metric implementation, not here. Snapshots are immutable at
//! the moment of read, so a concurrent update cannot tear a single metric's
//! view mid-format.

use std::fmt;
use std::sync::Arc;

/// A key-unique mapping from metric name to metric value.
///
/// Iteration order is whatever the backing store provides; callers must not
/// assume it is sorted or stable across calls.
pub trait Registry: Send + Sync {
    /// Invoke `f` once per registered `(name, metric)` pair.
    fn each(&self, f: &mut dyn FnMut(&str, &Metric));
}

/// A monotonically increasing count.
pub trait Counter: Send + Sync {
    fn count(&self) -> i64;
}

/// An instantaneous integer value.
pub trait Gauge: Send + Sync {
    fn value(&self) -> i64;
}

/// An instantaneous floating-point value.
pub trait GaugeFloat64: Send + Sync {
    fn value(&self) -> f64;
}

/// A distribution of integer observations.
pub trait Histogram: Send + Sync {
    /// Take an immutable point-in-time copy of the distribution.
    fn snapshot(&self) -> Box<dyn HistogramSnapshot>;
}

/// A rate-of-events meter.
pub trait Meter: Send + Sync {
    /// Take an immutable point-in-time copy of the rates.
    fn snapshot(&self) -> Box<dyn MeterSnapshot>;
}

/// A duration histogram combined with a throughput meter.
///
/// Durations are tracked at nanosecond resolution; the exporter scales them
/// to the configured reporting unit at format time.
pub trait Timer: Send + Sync {
    /// Take an immutable point-in-time copy of durations and rates.
    fn snapshot(&self) -> Box<dyn TimerSnapshot>;
}

/// Point-in-time statistics of a histogram.
pub trait HistogramSnapshot {
    fn count(&self) -> i64;
    fn min(&self) -> i64;
    fn max(&self) -> i64;
    fn mean(&self) -> f64;
    fn std_dev(&self) -> f64;

    /// Values at the requested quantiles, one per entry in `quantiles`,
    /// in the same order.
    fn percentiles(&self, quantiles: &[f64]) -> Vec<f64>;
}

/// Point-in-time statistics of a meter.
pub trait MeterSnapshot {
    fn count(&self) -> i64;
    /// One-minute exponentially-weighted moving average rate.
    fn rate1(&self) -> f64;
    /// Five-minute moving average rate.
    fn rate5(&self) -> f64;
    /// Fifteen-minute moving average rate.
    fn rate15(&self) -> f64;
    /// Mean rate since the meter was created.
    fn rate_mean(&self) -> f64;
}

/// Point-in-time statistics of a timer: the union of the histogram and
/// meter snapshot shapes.
pub trait TimerSnapshot: HistogramSnapshot {
    fn rate1(&self) -> f64;
    fn rate5(&self) -> f64;
    fn rate15(&self) -> f64;
    fn rate_mean(&self) -> f64;
}

/// A metric value as handed out by the registry during iteration.
///
/// The variant set is closed: anything the registry stores that does not fit
/// one of the known kinds shows up as [`Metric::Unknown`] and is skipped by
/// the formatter without producing lines or errors.
#[derive(Clone)]
pub enum Metric {
    Counter(Arc<dyn Counter>),
    Gauge(Arc<dyn Gauge>),
    GaugeFloat64(Arc<dyn GaugeFloat64>),
    Histogram(Arc<dyn Histogram>),
    Meter(Arc<dyn Meter>),
    Timer(Arc<dyn Timer>),
    Unknown,
}

impl Metric {
    /// Static label for the variant, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Counter(_) => "counter",
            Self::Gauge(_) => "gauge",
            Self::GaugeFloat64(_) => "gauge_f64",
            Self::Histogram(_) => "histogram",
            Self::Meter(_) => "meter",
            Self::Timer(_) => "timer",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Debug for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Metric").field(&self.kind()).finish()
    }
}
