//! Wire-format rendering for the OpenTSDB `put` protocol.
//!
//! Every exported observation is one ASCII line:
//!
//! ```text
//! put <prefix>.<name>.<suffix> <unix-seconds> <value> host=<hostname> <k1>=<v1> <k2>=<v2>
//! ```
//!
//! The `prefix.` part is omitted when no prefix is configured, and the tag
//! field is omitted when no tags are configured. Integer-valued fields print
//! as integers; derived statistics (means, standard deviations, percentiles,
//! rates) print with exactly two decimal digits; raw float gauge readings
//! print with six decimal digits.

use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Write as _;

use crate::registry::Metric;

/// Quantiles requested from histogram and timer snapshots, paired with
/// [`PERCENTILE_SUFFIXES`] by index.
pub(crate) const EXPORT_QUANTILES: [f64; 5] = [0.5, 0.75, 0.95, 0.99, 0.999];

const PERCENTILE_SUFFIXES: [&str; 5] = [
    "50-percentile",
    "75-percentile",
    "95-percentile",
    "99-percentile",
    "999-percentile",
];

/// Per-cycle constants shared by every line of one flush: all metrics in a
/// cycle report the same timestamp, hostname and tag string.
pub(crate) struct LineContext<'a> {
    pub prefix: &'a str,
    pub timestamp: i64,
    pub hostname: &'a str,
    pub tags: &'a str,
}

/// Render the tag mapping as space-joined `key=value` tokens.
///
/// BTreeMap iteration gives a sorted, deterministic order, so the rendered
/// string is stable across calls.
pub(crate) fn render_tags(tags: &BTreeMap<String, String>) -> String {
    tags.iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn put_line(out: &mut String, ctx: &LineContext<'_>, name: &str, suffix: &str, value: fmt::Arguments<'_>) {
    out.push_str("put ");
    if !ctx.prefix.is_empty() {
        out.push_str(ctx.prefix);
        out.push('.');
    }
    // fmt::Write to a String is infallible.
    let _ = write!(
        out,
        "{}.{} {} {} host={}",
        name, suffix, ctx.timestamp, value, ctx.hostname
    );
    if !ctx.tags.is_empty() {
        out.push(' ');
        out.push_str(ctx.tags);
    }
    out.push('\n');
}

/// Append the `put` lines for one metric to `out`, dispatching on its kind.
///
/// Histograms, meters and timers are snapshotted exactly once per call.
/// Timer durations (min/max/mean/std-dev/percentiles) are scaled by
/// `duration_unit_ns`; rate fields are not. Unrecognized variants emit
/// nothing.
pub(crate) fn format_metric(
    out: &mut String,
    ctx: &LineContext<'_>,
    name: &str,
    metric: &Metric,
    duration_unit_ns: i64,
) {
    match metric {
        Metric::Counter(c) => {
            put_line(out, ctx, name, "count", format_args!("{}", c.count()));
        }
        Metric::Gauge(g) => {
            put_line(out, ctx, name, "value", format_args!("{}", g.value()));
        }
        Metric::GaugeFloat64(g) => {
            put_line(out, ctx, name, "value", format_args!("{:.6}", g.value()));
        }
        Metric::Histogram(h) => {
            let s = h.snapshot();
            let ps = s.percentiles(&EXPORT_QUANTILES);
            put_line(out, ctx, name, "count", format_args!("{}", s.count()));
            put_line(out, ctx, name, "min", format_args!("{}", s.min()));
            put_line(out, ctx, name, "max", format_args!("{}", s.max()));
            put_line(out, ctx, name, "mean", format_args!("{:.2}", s.mean()));
            put_line(out, ctx, name, "std-dev", format_args!("{:.2}", s.std_dev()));
            for (suffix, p) in PERCENTILE_SUFFIXES.iter().zip(ps) {
                put_line(out, ctx, name, suffix, format_args!("{:.2}", p));
            }
        }
        Metric::Meter(m) => {
            let s = m.snapshot();
            put_line(out, ctx, name, "count", format_args!("{}", s.count()));
            put_line(out, ctx, name, "one-minute", format_args!("{:.2}", s.rate1()));
            put_line(out, ctx, name, "five-minute", format_args!("{:.2}", s.rate5()));
            put_line(out, ctx, name, "fifteen-minute", format_args!("{:.2}", s.rate15()));
            put_line(out, ctx, name, "mean", format_args!("{:.2}", s.rate_mean()));
        }
        Metric::Timer(t) => {
            let s = t.snapshot();
            let ps = s.percentiles(&EXPORT_QUANTILES);
            let unit = duration_unit_ns.max(1);
            let unit_f = unit as f64;
            put_line(out, ctx, name, "count", format_args!("{}", s.count()));
            put_line(out, ctx, name, "min", format_args!("{}", s.min() / unit));
            put_line(out, ctx, name, "max", format_args!("{}", s.max() / unit));
            put_line(out, ctx, name, "mean", format_args!("{:.2}", s.mean() / unit_f));
            put_line(
                out,
                ctx,
                name,
                "std-dev",
                format_args!("{:.2}", s.std_dev() / unit_f),
            );
            for (suffix, p) in PERCENTILE_SUFFIXES.iter().zip(ps) {
                put_line(out, ctx, name, suffix, format_args!("{:.2}", p / unit_f));
            }
            put_line(out, ctx, name, "one-minute", format_args!("{:.2}", s.rate1()));
            put_line(out, ctx, name, "five-minute", format_args!("{:.2}", s.rate5()));
            put_line(out, ctx, name, "fifteen-minute", format_args!("{:.2}", s.rate15()));
            put_line(out, ctx, name, "mean-rate", format_args!("{:.2}", s.rate_mean()));
        }
        Metric::Unknown => {
            tracing::trace!(metric = %name, "Skipping unrecognized metric kind");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{
        Counter, Gauge, GaugeFloat64, Histogram, HistogramSnapshot, Meter, MeterSnapshot, Timer,
        TimerSnapshot,
    };
    use std::sync::Arc;

    struct FixedCounter(i64);

    impl Counter for FixedCounter {
        fn count(&self) -> i64 {
            self.0
        }
    }

    struct FixedGauge(i64);

    impl Gauge for FixedGauge {
        fn value(&self) -> i64 {
            self.0
        }
    }

    struct FixedGaugeF64(f64);

    impl GaugeFloat64 for FixedGaugeF64 {
        fn value(&self) -> f64 {
            self.0
        }
    }

    #[derive(Clone)]
    struct FixedStats {
        count: i64,
        min: i64,
        max: i64,
        mean: f64,
        std_dev: f64,
        percentiles: Vec<f64>,
        rate1: f64,
        rate5: f64,
        rate15: f64,
        rate_mean: f64,
    }

    impl Default for FixedStats {
        fn default() -> Self {
            Self {
                count: 10,
                min: 1,
                max: 100,
                mean: 50.5,
                std_dev: 12.25,
                percentiles: vec![10.0, 20.0, 50.0, 90.0, 99.0],
                rate1: 1.5,
                rate5: 2.5,
                rate15: 3.5,
                rate_mean: 4.5,
            }
        }
    }

    impl HistogramSnapshot for FixedStats {
        fn count(&self) -> i64 {
            self.count
        }
        fn min(&self) -> i64 {
            self.min
        }
        fn max(&self) -> i64 {
            self.max
        }
        fn mean(&self) -> f64 {
            self.mean
        }
        fn std_dev(&self) -> f64 {
            self.std_dev
        }
        fn percentiles(&self, quantiles: &[f64]) -> Vec<f64> {
            assert_eq!(quantiles, &EXPORT_QUANTILES[..]);
            self.percentiles.clone()
        }
    }

    impl MeterSnapshot for FixedStats {
        fn count(&self) -> i64 {
            self.count
        }
        fn rate1(&self) -> f64 {
            self.rate1
        }
        fn rate5(&self) -> f64 {
            self.rate5
        }
        fn rate15(&self) -> f64 {
            self.rate15
        }
        fn rate_mean(&self) -> f64 {
            self.rate_mean
        }
    }

    impl TimerSnapshot for FixedStats {
        fn rate1(&self) -> f64 {
            self.rate1
        }
        fn rate5(&self) -> f64 {
            self.rate5
        }
        fn rate15(&self) -> f64 {
            self.rate15
        }
        fn rate_mean(&self) -> f64 {
            self.rate_mean
        }
    }

    struct FixedHistogram(FixedStats);

    impl Histogram for FixedHistogram {
        fn snapshot(&self) -> Box<dyn HistogramSnapshot> {
            Box::new(self.0.clone())
        }
    }

    struct FixedMeter(FixedStats);

    impl Meter for FixedMeter {
        fn snapshot(&self) -> Box<dyn MeterSnapshot> {
            Box::new(self.0.clone())
        }
    }

    struct FixedTimer(FixedStats);

    impl Timer for FixedTimer {
        fn snapshot(&self) -> Box<dyn TimerSnapshot> {
            Box::new(self.0.clone())
        }
    }

    fn ctx<'a>(prefix: &'a str, tags: &'a str) -> LineContext<'a> {
        LineContext {
            prefix,
            timestamp: 1700000000,
            hostname: "host1",
            tags,
        }
    }

    fn lines(metric: &Metric, context: &LineContext<'_>, unit_ns: i64) -> Vec<String> {
        let mut out = String::new();
        format_metric(&mut out, context, "reqs", metric, unit_ns);
        out.lines().map(str::to_owned).collect()
    }

    #[test]
    fn test_render_tags_one_token_per_entry() {
        let mut tags = BTreeMap::new();
        tags.insert("dc".to_string(), "eu-west".to_string());
        tags.insert("rack".to_string(), "r12".to_string());

        let rendered = render_tags(&tags);
        assert_eq!(rendered, "dc=eu-west rack=r12");
        // Stable across repeated calls.
        assert_eq!(rendered, render_tags(&tags));
    }

    #[test]
    fn test_render_tags_empty() {
        assert_eq!(render_tags(&BTreeMap::new()), "");
    }

    #[test]
    fn test_counter_line() {
        let metric = Metric::Counter(Arc::new(FixedCounter(42)));
        let out = lines(&metric, &ctx("app", "dc=eu-west"), 1);

        assert_eq!(
            out,
            vec!["put app.reqs.count 1700000000 42 host=host1 dc=eu-west"]
        );
    }

    #[test]
    fn test_gauge_lines() {
        let gauge = Metric::Gauge(Arc::new(FixedGauge(-7)));
        assert_eq!(
            lines(&gauge, &ctx("app", ""), 1),
            vec!["put app.reqs.value 1700000000 -7 host=host1"]
        );

        // A float gauge is a raw reading, not a derived statistic: it keeps
        // full six-decimal precision instead of the 2-decimal statistics
        // format.
        let gauge_f = Metric::GaugeFloat64(Arc::new(FixedGaugeF64(0.125)));
        assert_eq!(
            lines(&gauge_f, &ctx("app", ""), 1),
            vec!["put app.reqs.value 1700000000 0.125000 host=host1"]
        );
    }

    #[test]
    fn test_empty_prefix_has_no_leading_dot() {
        let metric = Metric::Counter(Arc::new(FixedCounter(1)));
        let out = lines(&metric, &ctx("", ""), 1);

        assert_eq!(out, vec!["put reqs.count 1700000000 1 host=host1"]);
    }

    #[test]
    fn test_histogram_emits_ten_lines_with_expected_values() {
        let metric = Metric::Histogram(Arc::new(FixedHistogram(FixedStats::default())));
        let out = lines(&metric, &ctx("app", ""), 1);

        assert_eq!(
            out,
            vec![
                "put app.reqs.count 1700000000 10 host=host1",
                "put app.reqs.min 1700000000 1 host=host1",
                "put app.reqs.max 1700000000 100 host=host1",
                "put app.reqs.mean 1700000000 50.50 host=host1",
                "put app.reqs.std-dev 1700000000 12.25 host=host1",
                "put app.reqs.50-percentile 1700000000 10.00 host=host1",
                "put app.reqs.75-percentile 1700000000 20.00 host=host1",
                "put app.reqs.95-percentile 1700000000 50.00 host=host1",
                "put app.reqs.99-percentile 1700000000 90.00 host=host1",
                "put app.reqs.999-percentile 1700000000 99.00 host=host1",
            ]
        );
    }

    #[test]
    fn test_meter_emits_five_lines() {
        let metric = Metric::Meter(Arc::new(FixedMeter(FixedStats::default())));
        let out = lines(&metric, &ctx("app", ""), 1);

        assert_eq!(
            out,
            vec![
                "put app.reqs.count 1700000000 10 host=host1",
                "put app.reqs.one-minute 1700000000 1.50 host=host1",
                "put app.reqs.five-minute 1700000000 2.50 host=host1",
                "put app.reqs.fifteen-minute 1700000000 3.50 host=host1",
                "put app.reqs.mean 1700000000 4.50 host=host1",
            ]
        );
    }

    #[test]
    fn test_timer_emits_fifteen_lines_with_unit_conversion() {
        // Nanosecond-resolution snapshot reported in milliseconds.
        let stats = FixedStats {
            count: 3,
            min: 5_000_000,
            max: 12_000_000,
            mean: 2_500_000.0,
            std_dev: 1_000_000.0,
            percentiles: vec![
                2_000_000.0,
                3_000_000.0,
                9_000_000.0,
                11_000_000.0,
                12_000_000.0,
            ],
            ..FixedStats::default()
        };
        let metric = Metric::Timer(Arc::new(FixedTimer(stats)));
        let out = lines(&metric, &ctx("app", ""), 1_000_000);

        assert_eq!(out.len(), 15);
        assert_eq!(out[1], "put app.reqs.min 1700000000 5 host=host1");
        assert_eq!(out[2], "put app.reqs.max 1700000000 12 host=host1");
        assert_eq!(out[3], "put app.reqs.mean 1700000000 2.50 host=host1");
        assert_eq!(out[4], "put app.reqs.std-dev 1700000000 1.00 host=host1");
        assert_eq!(out[5], "put app.reqs.50-percentile 1700000000 2.00 host=host1");
        // Rates pass through without unit conversion.
        assert_eq!(out[11], "put app.reqs.one-minute 1700000000 1.50 host=host1");
        assert_eq!(out[12], "put app.reqs.five-minute 1700000000 2.50 host=host1");
        assert_eq!(
            out[13],
            "put app.reqs.fifteen-minute 1700000000 3.50 host=host1"
        );
        assert_eq!(out[14], "put app.reqs.mean-rate 1700000000 4.50 host=host1");
    }

    #[test]
    fn test_timer_without_conversion_passes_values_through() {
        let metric = Metric::Timer(Arc::new(FixedTimer(FixedStats::default())));
        let out = lines(&metric, &ctx("app", ""), 1);

        assert_eq!(out[1], "put app.reqs.min 1700000000 1 host=host1");
        assert_eq!(out[3], "put app.reqs.mean 1700000000 50.50 host=host1");
    }

    #[test]
    fn test_unknown_metric_emits_nothing() {
        let out = lines(&Metric::Unknown, &ctx("app", "dc=eu-west"), 1);
        assert!(out.is_empty());
    }

    #[test]
    fn test_formatting_is_idempotent() {
        let metric = Metric::Histogram(Arc::new(FixedHistogram(FixedStats::default())));
        let context = ctx("app", "dc=eu-west");

        let mut first = String::new();
        format_metric(&mut first, &context, "reqs", &metric, 1);
        let mut second = String::new();
        format_metric(&mut second, &context, "reqs", &metric, 1);

        assert_eq!(first, second);
    }
}
