//! Metric definitions, catalogs and the observations collectors emit.

use crate::collectors::version::ServerVersion;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// Joins non-empty name parts with `_`, e.g. `pg` + `stat_database` + `deadlocks`.
#[must_use]
pub fn fq_name(namespace: &str, subsystem: &str, name: &str) -> String {
    [namespace, subsystem, name]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("_")
}

/// Value semantics of an emitted metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Reflects current state.
    Gauge,
    /// Accumulates monotonically since the last reset.
    Counter,
}

impl ValueKind {
    /// Whether a metric of this kind can hold `value`.
    ///
    /// Counters only take finite, non-negative values.
    #[must_use]
    pub fn accepts(self, value: f64) -> bool {
        match self {
            Self::Gauge => true,
            Self::Counter => value.is_finite() && value >= 0.0,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gauge => f.write_str("gauge"),
            Self::Counter => f.write_str("counter"),
        }
    }
}

/// Wire type a column is decoded as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Text,
    Number,
    Timestamp,
}

/// A column of the source view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Column {
    pub name: &'static str,
    pub ty: ColumnType,
}

impl Column {
    #[must_use]
    pub const fn text(name: &'static str) -> Self {
        Self {
            name,
            ty: ColumnType::Text,
        }
    }

    #[must_use]
    pub const fn number(name: &'static str) -> Self {
        Self {
            name,
            ty: ColumnType::Number,
        }
    }

    #[must_use]
    pub const fn timestamp(name: &'static str) -> Self {
        Self {
            name,
            ty: ColumnType::Timestamp,
        }
    }
}

/// A decoded column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

/// What to do when a row has no value for a definition's column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MissingPolicy {
    /// Emit nothing for this metric in this row.
    Skip,
    /// Emit the given value instead.
    Default(f64),
}

/// Unit conversion applied when a value is emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    Identity,
    MillisToSeconds,
    /// Timestamp to seconds since the Unix epoch.
    EpochSeconds,
}

impl Conversion {
    /// Converts a decoded value to the emitted `f64`, or `None` if the value has a
    /// type this conversion cannot handle.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn apply(self, value: &Value) -> Option<f64> {
        match (self, value) {
            (Self::Identity, Value::Number(v)) => Some(*v),
            (Self::MillisToSeconds, Value::Number(v)) => Some(*v / 1000.0),
            (Self::EpochSeconds, Value::Timestamp(ts)) => Some(ts.timestamp() as f64),
            (Self::EpochSeconds, Value::Number(v)) => Some(*v),
            _ => None,
        }
    }
}

/// Immutable description of one metric derived from one source column.
#[derive(Debug, Clone)]
pub struct MetricDefinition {
    name: String,
    help: &'static str,
    kind: ValueKind,
    label_names: &'static [&'static str],
    column: Column,
    min_version: Option<ServerVersion>,
    missing: MissingPolicy,
    conversion: Conversion,
}

impl MetricDefinition {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        help: &'static str,
        kind: ValueKind,
        label_names: &'static [&'static str],
        column: Column,
    ) -> Self {
        Self {
            name: name.into(),
            help,
            kind,
            label_names,
            column,
            min_version: None,
            missing: MissingPolicy::Skip,
            conversion: Conversion::Identity,
        }
    }

    /// Only request the column from servers at or above `version`.
    #[must_use]
    pub fn since(mut self, version: ServerVersion) -> Self {
        self.min_version = Some(version);
        self
    }

    #[must_use]
    pub fn when_missing(mut self, policy: MissingPolicy) -> Self {
        self.missing = policy;
        self
    }

    #[must_use]
    pub fn converted(mut self, conversion: Conversion) -> Self {
        self.conversion = conversion;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn help(&self) -> &'static str {
        self.help
    }

    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        self.kind
    }

    #[must_use]
    pub const fn label_names(&self) -> &'static [&'static str] {
        self.label_names
    }

    #[must_use]
    pub const fn column(&self) -> Column {
        self.column
    }

    #[must_use]
    pub const fn min_version(&self) -> Option<ServerVersion> {
        self.min_version
    }

    #[must_use]
    pub const fn missing(&self) -> MissingPolicy {
        self.missing
    }

    #[must_use]
    pub const fn conversion(&self) -> Conversion {
        self.conversion
    }

    /// Whether the column can be requested from a server at `version`.
    ///
    /// Unknown versions only get ungated columns.
    #[must_use]
    pub fn available_for(&self, version: Option<&ServerVersion>) -> bool {
        match (self.min_version, version) {
            (None, _) => true,
            (Some(min), Some(detected)) => *detected >= min,
            (Some(_), None) => false,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("duplicate metric name '{0}'")]
    DuplicateName(String),

    #[error("metric '{0}' declares no labels")]
    NoLabels(String),
}

/// Validated, read-only set of metric definitions.
#[derive(Debug, Clone)]
pub struct Catalog {
    definitions: Vec<MetricDefinition>,
}

impl Catalog {
    /// Builds a catalog, rejecting duplicate names and empty label schemas.
    ///
    /// # Errors
    ///
    /// Returns a [`CatalogError`] describing the first invalid definition.
    pub fn new(definitions: Vec<MetricDefinition>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::with_capacity(definitions.len());

        for def in &definitions {
            if def.label_names.is_empty() {
                return Err(CatalogError::NoLabels(def.name.clone()));
            }
            if !seen.insert(def.name.as_str()) {
                return Err(CatalogError::DuplicateName(def.name.clone()));
            }
        }

        Ok(Self { definitions })
    }

    #[must_use]
    pub fn definitions(&self) -> &[MetricDefinition] {
        &self.definitions
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetricDefinition> {
        self.definitions.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&MetricDefinition> {
        self.definitions.iter().find(|d| d.name == name)
    }
}

/// One labeled sample destined for a sink.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub name: String,
    pub help: &'static str,
    pub kind: ValueKind,
    pub label_names: &'static [&'static str],
    pub label_values: Vec<String>,
    pub value: f64,
}

impl Observation {
    /// Pairs a definition with a value, or `None` if the label values do not match
    /// the definition's label schema.
    #[must_use]
    pub fn new(def: &MetricDefinition, value: f64, label_values: Vec<String>) -> Option<Self> {
        if label_values.len() != def.label_names.len() {
            return None;
        }

        Some(Self {
            name: def.name.clone(),
            help: def.help,
            kind: def.kind,
            label_names: def.label_names,
            label_values,
            value,
        })
    }

    /// Value of the label called `name`, if present.
    #[must_use]
    pub fn label(&self, name: &str) -> Option<&str> {
        self.label_names
            .iter()
            .position(|n| *n == name)
            .and_then(|idx| self.label_values.get(idx))
            .map(String::as_str)
    }
}
