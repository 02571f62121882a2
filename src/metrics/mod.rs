//! In-process metrics rendered in the Prometheus text exposition format.
//!
//! Three metric kinds are supported, each keyed by a fixed list of label
//! names: [`Counter`], [`Gauge`] and [`Summary`] (count and sum only).
//! [`Metrics`] groups the series the service exports on `/metrics`.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt::Write;

use crate::events::{Event, EventHandler};

/// Label values identifying one series of a family.
type LabelValues = Vec<String>;

/// Metric family: a name, help text, label names, and one value per label set.
struct Family<V> {
    name: &'static str,
    help: &'static str,
    label_names: &'static [&'static str],
    series: Mutex<BTreeMap<LabelValues, V>>,
}

impl<V: Default> Family<V> {
    fn new(name: &'static str, help: &'static str, label_names: &'static [&'static str]) -> Self {
        let mut series = BTreeMap::new();
        // Unlabelled metrics are exported even before their first update.
        if label_names.is_empty() {
            series.insert(Vec::new(), V::default());
        }
        Self {
            name,
            help,
            label_names,
            series: Mutex::new(series),
        }
    }

    fn update<R>(&self, label_values: &[&str], f: impl FnOnce(&mut V) -> R) -> R {
        debug_assert_eq!(
            label_values.len(),
            self.label_names.len(),
            "wrong number of labels for {}",
            self.name
        );
        let key: LabelValues = label_values.iter().map(|v| v.to_string()).collect();
        let mut series = self.series.lock();
        f(series.entry(key).or_default())
    }

    fn read<R>(&self, label_values: &[&str], f: impl FnOnce(&V) -> R) -> Option<R> {
        let key: LabelValues = label_values.iter().map(|v| v.to_string()).collect();
        self.series.lock().get(&key).map(f)
    }

    fn header(&self, out: &mut String, kind: &str) {
        let _ = writeln!(out, "# HELP {} {}", self.name, self.help);
        let _ = writeln!(out, "# TYPE {} {}", self.name, kind);
    }

    fn labels(&self, values: &[String]) -> String {
        if values.is_empty() {
            return String::new();
        }
        let pairs: Vec<String> = self
            .label_names
            .iter()
            .zip(values)
            .map(|(name, value)| format!("{}=\"{}\"", name, escape_label_value(value)))
            .collect();
        format!("{{{}}}", pairs.join(","))
    }
}

fn escape_label_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out
}

/// Monotonically increasing count.
pub struct Counter(Family<f64>);

impl Counter {
    pub fn new(name: &'static str, help: &'static str, labels: &'static [&'static str]) -> Self {
        Self(Family::new(name, help, labels))
    }

    /// Increment the series for `labels` by one.
    pub fn inc(&self, labels: &[&str]) {
        self.inc_by(labels, 1.0);
    }

    pub fn inc_by(&self, labels: &[&str], amount: f64) {
        self.0.update(labels, |v| *v += amount);
    }

    /// Current value, or 0 if the series was never touched.
    pub fn get(&self, labels: &[&str]) -> f64 {
        self.0.read(labels, |v| *v).unwrap_or(0.0)
    }

    fn render(&self, out: &mut String) {
        self.0.header(out, "counter");
        for (labels, value) in self.0.series.lock().iter() {
            let _ = writeln!(out, "{}{} {}", self.0.name, self.0.labels(labels), value);
        }
    }
}

/// Value that can go up and down.
pub struct Gauge(Family<f64>);

impl Gauge {
    pub fn new(name: &'static str, help: &'static str, labels: &'static [&'static str]) -> Self {
        Self(Family::new(name, help, labels))
    }

    pub fn inc(&self, labels: &[&str]) {
        self.0.update(labels, |v| *v += 1.0);
    }

    pub fn dec(&self, labels: &[&str]) {
        self.0.update(labels, |v| *v -= 1.0);
    }

    pub fn set(&self, labels: &[&str], value: f64) {
        self.0.update(labels, |v| *v = value);
    }

    pub fn get(&self, labels: &[&str]) -> f64 {
        self.0.read(labels, |v| *v).unwrap_or(0.0)
    }

    fn render(&self, out: &mut String) {
        self.0.header(out, "gauge");
        for (labels, value) in self.0.series.lock().iter() {
            let _ = writeln!(out, "{}{} {}", self.0.name, self.0.labels(labels), value);
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct SummaryValue {
    count: u64,
    sum: f64,
}

/// Count and sum of observations, typically durations in seconds.
pub struct Summary(Family<SummaryValue>);

impl Summary {
    pub fn new(name: &'static str, help: &'static str, labels: &'static [&'static str]) -> Self {
        Self(Family::new(name, help, labels))
    }

    /// Record one observation.
    pub fn observe(&self, labels: &[&str], value: f64) {
        self.0.update(labels, |v| {
            v.count += 1;
            v.sum += value;
        });
    }

    /// Number of observations for `labels`.
    pub fn count(&self, labels: &[&str]) -> u64 {
        self.0.read(labels, |v| v.count).unwrap_or(0)
    }

    /// Sum of observations for `labels`.
    pub fn sum(&self, labels: &[&str]) -> f64 {
        self.0.read(labels, |v| v.sum).unwrap_or(0.0)
    }

    fn render(&self, out: &mut String) {
        self.0.header(out, "summary");
        for (labels, value) in self.0.series.lock().iter() {
            let labels = self.0.labels(labels);
            let _ = writeln!(out, "{}_count{} {}", self.0.name, labels, value.count);
            let _ = writeln!(out, "{}_sum{} {}", self.0.name, labels, value.sum);
        }
    }
}

/// Every series the service exports.
pub struct Metrics {
    /// Wall time of each HTTP request.
    pub request_duration: Summary,
    /// HTTP requests by final status code.
    pub request_count: Counter,
    /// HTTP requests currently being served.
    pub in_flight: Gauge,
    /// Time a prediction request spent waiting on the executor.
    pub model_latency: Summary,
    /// Prediction requests by outcome.
    pub predictions: Counter,
    /// Jobs accepted but not yet started.
    pub queue_depth: Gauge,
    /// Jobs finished by the worker, by outcome.
    pub jobs: Counter,
    /// Time the worker spent inside the model.
    pub job_duration: Summary,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            request_duration: Summary::new(
                "request_duration_seconds",
                "Time spent processing requests",
                &["method", "endpoint"],
            ),
            request_count: Counter::new(
                "request_total",
                "Total request count",
                &["method", "endpoint", "status"],
            ),
            in_flight: Gauge::new(
                "in_flight_requests",
                "Number of in-flight requests",
                &["method", "endpoint"],
            ),
            model_latency: Summary::new(
                "model_latency_seconds",
                "Time spent in model prediction",
                &["endpoint", "status"],
            ),
            predictions: Counter::new(
                "predictions_total",
                "Total prediction requests",
                &["endpoint", "status"],
            ),
            queue_depth: Gauge::new(
                "executor_queue_depth",
                "Jobs waiting for the executor worker",
                &[],
            ),
            jobs: Counter::new(
                "jobs_total",
                "Jobs finished by the executor worker",
                &["outcome"],
            ),
            job_duration: Summary::new(
                "job_duration_seconds",
                "Time the executor worker spent running jobs",
                &[],
            ),
        }
    }

    /// Render every family in the Prometheus text format.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.request_duration.render(&mut out);
        self.request_count.render(&mut out);
        self.in_flight.render(&mut out);
        self.model_latency.render(&mut out);
        self.predictions.render(&mut out);
        self.queue_depth.render(&mut out);
        self.jobs.render(&mut out);
        self.job_duration.render(&mut out);
        out
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Event handler that feeds worker events into [`Metrics`].
pub struct MetricsRecorder {
    metrics: std::sync::Arc<Metrics>,
}

impl MetricsRecorder {
    pub fn new(metrics: std::sync::Arc<Metrics>) -> Self {
        Self { metrics }
    }
}

#[async_trait]
impl EventHandler for MetricsRecorder {
    async fn handle(&self, event: &Event) {
        match event {
            Event::JobCompleted { duration, .. } => {
                self.metrics.jobs.inc(&["completed"]);
                self.metrics.job_duration.observe(&[], duration.as_secs_f64());
            }
            Event::JobFailed { duration, .. } => {
                self.metrics.jobs.inc(&["failed"]);
                self.metrics.job_duration.observe(&[], duration.as_secs_f64());
            }
            Event::JobStarted { .. } => {}
        }
    }
}
