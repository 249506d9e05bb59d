//! Canonical metric record shared by the agent and the server.
//!
//! `MetricSample` doubles as the wire payload: optional fields are omitted
//! from JSON (never serialized as `null`) and timestamps travel as RFC 3339.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The two metric families the pipeline understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Monotonically accumulating integer delta.
    Counter,
    /// Point-in-time floating value, last writer wins.
    Gauge,
}

impl MetricKind {
    /// Lowercase wire/storage spelling of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = SampleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "counter" => Ok(MetricKind::Counter),
            "gauge" => Ok(MetricKind::Gauge),
            other => Err(SampleError::UnknownKind(other.to_string())),
        }
    }
}

/// Storage identity of a metric. Two metrics sharing a name but differing in
/// kind are distinct entities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetricId {
    /// Metric name.
    #[serde(rename = "id")]
    pub name: String,
    /// Metric kind.
    #[serde(rename = "type")]
    pub kind: MetricKind,
}

impl MetricId {
    /// Build an id from its parts.
    pub fn new(name: impl Into<String>, kind: MetricKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Validation failures for incoming samples.
#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    /// Name is empty after trimming whitespace.
    #[error("metric name is empty")]
    EmptyName,
    /// Kind string did not parse.
    #[error("unknown metric kind {0:?}")]
    UnknownKind(String),
    /// Counter sample without a delta.
    #[error("counter sample without delta")]
    MissingDelta,
    /// Gauge sample without a value.
    #[error("gauge sample without value")]
    MissingValue,
}

/// The canonical record exchanged between agent and server and kept in
/// storage. Exactly one of `delta`/`value` is populated, matching `kind`.
/// Timestamps are assigned by the server; the agent leaves them unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    /// Metric name.
    #[serde(rename = "id")]
    pub name: String,
    /// Metric kind.
    #[serde(rename = "type")]
    pub kind: MetricKind,
    /// Counter increment; present iff `kind` is counter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<i64>,
    /// Gauge reading; present iff `kind` is gauge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    /// First-insert time, server clock.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Last-write time, server clock.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl MetricSample {
    /// A counter sample carrying `delta`.
    pub fn counter(name: impl Into<String>, delta: i64) -> Self {
        Self {
            name: name.into(),
            kind: MetricKind::Counter,
            delta: Some(delta),
            value: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// A gauge sample carrying `value`.
    pub fn gauge(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            kind: MetricKind::Gauge,
            delta: None,
            value: Some(value),
            created_at: None,
            updated_at: None,
        }
    }

    /// Storage identity of this sample.
    pub fn id(&self) -> MetricId {
        MetricId::new(self.name.clone(), self.kind)
    }

    /// Check the name and kind/field consistency invariants.
    pub fn validate(&self) -> Result<(), SampleError> {
        if self.name.trim().is_empty() {
            return Err(SampleError::EmptyName);
        }
        match self.kind {
            MetricKind::Counter if self.delta.is_none() => Err(SampleError::MissingDelta),
            MetricKind::Gauge if self.value.is_none() => Err(SampleError::MissingValue),
            _ => Ok(()),
        }
    }

    /// Plain-text rendering of the numeric field, as served by
    /// `GET /value/{type}/{id}`. Gauges print the shortest round-trip form
    /// (`250.5`, not `250.50000`).
    pub fn render_value(&self) -> String {
        match self.kind {
            MetricKind::Counter => self.delta.unwrap_or(0).to_string(),
            MetricKind::Gauge => self.value.unwrap_or(0.0).to_string(),
        }
    }
}
