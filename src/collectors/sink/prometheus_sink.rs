use crate::collectors::{
    metric::{Observation, ValueKind},
    sink::{MetricSink, SinkError},
};
use prometheus::{CounterVec, GaugeVec, Opts, Registry, TextEncoder};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

#[derive(Clone)]
enum Family {
    Gauge(GaugeVec),
    Counter(CounterVec),
}

impl Family {
    const fn kind(&self) -> ValueKind {
        match self {
            Self::Gauge(_) => ValueKind::Gauge,
            Self::Counter(_) => ValueKind::Counter,
        }
    }
}

/// Records observations into a `prometheus::Registry`.
///
/// Meant to live for a single scrape: a metric family is created and registered the
/// first time an observation with its name arrives, so families that no row
/// produced never show up in the exposition. Counters start at zero and take the
/// observed value, which is why a sink must not be reused across scrapes.
pub struct PrometheusSink {
    registry: Registry,
    families: Mutex<HashMap<String, Family>>,
}

impl Default for PrometheusSink {
    fn default() -> Self {
        Self::new(Registry::new())
    }
}

impl PrometheusSink {
    #[must_use]
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            families: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Renders everything in the underlying registry in the text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn encode(&self) -> Result<String, SinkError> {
        Ok(TextEncoder::new().encode_to_string(&self.registry.gather())?)
    }

    fn family(&self, observation: &Observation) -> Result<Family, SinkError> {
        // The lock only guards the map; it is never held across an await.
        let mut families = self
            .families
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(family) = families.get(&observation.name) {
            if family.kind() != observation.kind {
                return Err(SinkError::KindMismatch {
                    name: observation.name.clone(),
                    registered: match family.kind() {
                        ValueKind::Gauge => "gauge",
                        ValueKind::Counter => "counter",
                    },
                });
            }
            return Ok(family.clone());
        }

        let opts = Opts::new(observation.name.clone(), observation.help);
        let family = match observation.kind {
            ValueKind::Gauge => {
                let vec = GaugeVec::new(opts, observation.label_names)?;
                self.registry.register(Box::new(vec.clone()))?;
                Family::Gauge(vec)
            }
            ValueKind::Counter => {
                let vec = CounterVec::new(opts, observation.label_names)?;
                self.registry.register(Box::new(vec.clone()))?;
                Family::Counter(vec)
            }
        };

        families.insert(observation.name.clone(), family.clone());
        Ok(family)
    }
}

impl MetricSink for PrometheusSink {
    fn push(&self, observation: Observation) -> Result<(), SinkError> {
        let labels: Vec<&str> = observation
            .label_values
            .iter()
            .map(String::as_str)
            .collect();

        match self.family(&observation)? {
            Family::Gauge(vec) => {
                vec.get_metric_with_label_values(labels.as_slice())?
                    .set(observation.value);
            }
            Family::Counter(vec) => {
                if !ValueKind::Counter.accepts(observation.value) {
                    return Err(SinkError::InvalidCounterValue {
                        name: observation.name,
                        value: observation.value,
                    });
                }
                vec.get_metric_with_label_values(labels.as_slice())?
                    .inc_by(observation.value);
            }
        }

        Ok(())
    }
}
