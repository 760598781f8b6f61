//! Destinations for observations produced by collectors.
//!
//! A sink only receives; it never feeds anything back to the collector. Sinks must
//! accept pushes from collectors running concurrently on different tasks.

use crate::collectors::metric::Observation;
use thiserror::Error;
use tokio::sync::mpsc;

pub mod prometheus_sink;
pub use self::prometheus_sink::PrometheusSink;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink is closed")]
    Closed,

    #[error("counter {name} cannot take value {value}")]
    InvalidCounterValue { name: String, value: f64 },

    #[error("metric {name} already registered as a {registered}")]
    KindMismatch {
        name: String,
        registered: &'static str,
    },

    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

pub trait MetricSink: Send + Sync {
    /// Accepts one observation.
    ///
    /// # Errors
    ///
    /// Returns a [`SinkError`] if the observation cannot be recorded.
    fn push(&self, observation: Observation) -> Result<(), SinkError>;
}

impl MetricSink for mpsc::UnboundedSender<Observation> {
    fn push(&self, observation: Observation) -> Result<(), SinkError> {
        self.send(observation).map_err(|_| SinkError::Closed)
    }
}
