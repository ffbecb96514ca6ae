//! Metric declarations for the vending controller link.
//!
//! Re-exports the `metrics` facade and declares every metric the driver
//! emits as a structured [`Metric`] constant, so names and label keys live
//! in one place. Nothing here installs a recorder; without one the facade
//! discards everything.
//!
//! # Example
//!
//! ```rust
//! use vmc_metrics::{metric_defs, LinkLabels};
//!
//! let labels = LinkLabels::new("/dev/ttyUSB0").with_operation("vend");
//! vmc_metrics::metrics::counter!(metric_defs::LINK_REQUESTS.name, &labels.to_labels()).increment(1);
//! ```

pub use metrics;

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

/// The kind of metric (counter, gauge, or histogram).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// A monotonically increasing counter.
    Counter,
    /// A gauge that can go up and down.
    Gauge,
    /// A histogram for recording distributions.
    Histogram,
}

impl MetricKind {
    /// Returns the kind as a lowercase string.
    pub const fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A metric declaration with its metadata.
///
/// ```rust
/// use vmc_metrics::{Metric, MetricKind};
/// use vmc_metrics::metrics::Unit;
///
/// const FRAMES: Metric = Metric::counter("vmc.example.frames")
///     .with_description("Frames seen")
///     .with_unit(Unit::Count)
///     .with_labels(&["port"]);
///
/// assert_eq!(FRAMES.kind, MetricKind::Counter);
/// ```
#[derive(Debug, Clone)]
pub struct Metric {
    /// The metric name (e.g., "vmc.link.requests").
    pub name: &'static str,
    /// The kind of metric (counter, gauge, histogram).
    pub kind: MetricKind,
    /// Human-readable description of the metric.
    pub description: &'static str,
    /// The unit of measurement (optional).
    pub unit: Option<Unit>,
    /// Expected label keys for this metric.
    pub labels: &'static [&'static str],
}

impl Metric {
    /// Creates a new counter metric with the given name.
    pub const fn counter(name: &'static str) -> Self {
        Self::with_kind(name, MetricKind::Counter)
    }

    /// Creates a new gauge metric with the given name.
    pub const fn gauge(name: &'static str) -> Self {
        Self::with_kind(name, MetricKind::Gauge)
    }

    /// Creates a new histogram metric with the given name.
    pub const fn histogram(name: &'static str) -> Self {
        Self::with_kind(name, MetricKind::Histogram)
    }

    const fn with_kind(name: &'static str, kind: MetricKind) -> Self {
        Self {
            name,
            kind,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    /// Sets the description for the metric.
    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Sets the unit for the metric.
    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Sets the expected label keys for the metric.
    pub const fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Registers this metric's description with the installed recorder.
    pub fn describe(&self) {
        match (self.kind, self.unit) {
            (MetricKind::Counter, Some(unit)) => {
                describe_counter!(self.name, unit, self.description);
            }
            (MetricKind::Counter, None) => {
                describe_counter!(self.name, self.description);
            }
            (MetricKind::Gauge, Some(unit)) => {
                describe_gauge!(self.name, unit, self.description);
            }
            (MetricKind::Gauge, None) => {
                describe_gauge!(self.name, self.description);
            }
            (MetricKind::Histogram, Some(unit)) => {
                describe_histogram!(self.name, unit, self.description);
            }
            (MetricKind::Histogram, None) => {
                describe_histogram!(self.name, self.description);
            }
        }
    }
}

/// All metric definitions for the link.
pub mod metric_defs {
    use super::{Metric, Unit};

    /// Labels present on every link metric.
    pub const LINK_LABELS: &[&str] = &["port"];

    /// Labels on per-operation metrics.
    pub const OPERATION_LABELS: &[&str] = &["port", "operation"];

    /// Requests written to the board.
    pub const LINK_REQUESTS: Metric = Metric::counter("vmc.link.requests")
        .with_description("Requests written to the controller board")
        .with_unit(Unit::Count)
        .with_labels(OPERATION_LABELS);

    /// Requests rejected because another was in flight.
    pub const LINK_REJECTED: Metric = Metric::counter("vmc.link.rejected")
        .with_description("Requests rejected while another was awaiting its reply")
        .with_unit(Unit::Count)
        .with_labels(OPERATION_LABELS);

    /// Requests that got no reply in time.
    pub const LINK_TIMEOUTS: Metric = Metric::counter("vmc.link.timeouts")
        .with_description("Requests that timed out waiting for a reply")
        .with_unit(Unit::Count)
        .with_labels(OPERATION_LABELS);

    /// Replies that failed length, checksum or status validation.
    pub const LINK_PROTOCOL_ERRORS: Metric = Metric::counter("vmc.link.protocol_errors")
        .with_description("Replies that failed frame validation")
        .with_unit(Unit::Count)
        .with_labels(OPERATION_LABELS);

    /// Replies reporting a mechanical or optical fault.
    pub const LINK_CONTROLLER_ERRORS: Metric = Metric::counter("vmc.link.controller_errors")
        .with_description("Replies carrying a board fault")
        .with_unit(Unit::Count)
        .with_labels(OPERATION_LABELS);

    /// Bytes received with no request outstanding.
    pub const LINK_UNSOLICITED_BYTES: Metric = Metric::counter("vmc.link.unsolicited_bytes")
        .with_description("Bytes received with no request outstanding")
        .with_unit(Unit::Bytes)
        .with_labels(LINK_LABELS);

    /// Time from write to complete reply.
    pub const LINK_ROUND_TRIP: Metric = Metric::histogram("vmc.link.round_trip_ms")
        .with_description("Time from request write to complete reply")
        .with_unit(Unit::Milliseconds)
        .with_labels(OPERATION_LABELS);

    /// 1 while a request awaits its reply, 0 when the link is idle.
    pub const LINK_BUSY: Metric = Metric::gauge("vmc.link.busy")
        .with_description("Whether a request is awaiting its reply")
        .with_labels(LINK_LABELS);

    /// All metrics, for registration.
    pub const ALL: &[&Metric] = &[
        &LINK_REQUESTS,
        &LINK_REJECTED,
        &LINK_TIMEOUTS,
        &LINK_PROTOCOL_ERRORS,
        &LINK_CONTROLLER_ERRORS,
        &LINK_UNSOLICITED_BYTES,
        &LINK_ROUND_TRIP,
        &LINK_BUSY,
    ];
}

/// Label set identifying one serial link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkLabels {
    /// Port path or bridge address.
    pub port: String,
    /// Operation name, for per-operation metrics.
    pub operation: Option<&'static str>,
}

impl LinkLabels {
    /// Labels for the given port.
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            operation: None,
        }
    }

    /// Copy of these labels scoped to one operation.
    pub fn with_operation(&self, operation: &'static str) -> Self {
        Self {
            port: self.port.clone(),
            operation: Some(operation),
        }
    }

    /// Converts the labels to the key/value form the `metrics` macros take.
    pub fn to_labels(&self) -> Vec<(&'static str, String)> {
        let mut labels = vec![("port", self.port.clone())];
        if let Some(operation) = self.operation {
            labels.push(("operation", operation.to_string()));
        }
        labels
    }
}

/// Describes all link metrics. Call once after installing a recorder.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}
