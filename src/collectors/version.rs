//! Server version detection.
//!
//! Collectors gate optional columns on the detected server version. The version is
//! resolved once per scrape by [`ServerVersion::detect`]; when detection fails the
//! caller passes `None` and collectors fall back to the columns every supported
//! server exposes.

use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::PgPool;
use std::{fmt, str::FromStr};
use thiserror::Error;
use tracing::{debug, info_span, instrument};
use tracing_futures::Instrument as _;

#[allow(clippy::expect_used)]
static VERSION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:PostgreSQL\s+)?(\d+)(?:\.(\d+))?(?:\.(\d+))?").expect("valid version regex")
});

#[derive(Debug, Error)]
pub enum VersionError {
    #[error("failed to query server version: {0}")]
    Query(#[source] sqlx::Error),

    #[error("could not parse server version from '{0}'")]
    Parse(String),
}

/// A `major.minor.patch` server version, ordered component-wise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServerVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ServerVersion {
    #[must_use]
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parses a version string, tolerating missing components and trailing text.
    ///
    /// Accepts `"13"`, `"14.2"`, `"14.2.0"`, `"17beta1"`, `"16.1 (Debian 16.1-1)"` and
    /// the `"PostgreSQL 16.1 on x86_64..."` form returned by `version()`.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError::Parse`] if the input does not start with a number.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let trimmed = input.trim();
        let parse_err = || VersionError::Parse(trimmed.to_string());

        let captures = VERSION_REGEX.captures(trimmed).ok_or_else(parse_err)?;

        let component = |idx: usize| -> Result<u32, VersionError> {
            captures
                .get(idx)
                .map_or(Ok(0), |m| m.as_str().parse::<u32>())
                .map_err(|_| parse_err())
        };

        Ok(Self::new(component(1)?, component(2)?, component(3)?))
    }

    /// Converts a `server_version_num` value.
    ///
    /// From 10 onwards the number is `major * 10000 + minor` (`140002` is 14.2.0);
    /// older servers use `major * 10000 + minor * 100 + patch` (`90624` is 9.6.24).
    ///
    /// # Errors
    ///
    /// Returns [`VersionError::Parse`] for non-positive or out of range values.
    pub fn from_version_num(num: i64) -> Result<Self, VersionError> {
        let invalid = || VersionError::Parse(num.to_string());

        if num <= 0 {
            return Err(invalid());
        }

        let num = u32::try_from(num).map_err(|_| invalid())?;
        let major = num / 10_000;

        if major >= 10 {
            Ok(Self::new(major, num % 10_000, 0))
        } else {
            Ok(Self::new(major, (num / 100) % 100, num % 100))
        }
    }

    /// Detects the version of the server behind `pool`.
    ///
    /// Tries `SHOW server_version_num` first and falls back to parsing
    /// `SHOW server_version`.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError::Query`] if the server cannot be queried and
    /// [`VersionError::Parse`] if neither answer can be interpreted.
    #[instrument(skip(pool), level = "info", err, fields(db.system = "postgresql", otel.kind = "client"))]
    pub async fn detect(pool: &PgPool) -> Result<Self, VersionError> {
        let span = info_span!(
            "db.query",
            db.operation = "SHOW",
            db.statement = "SHOW server_version_num"
        );
        let version_num = sqlx::query_scalar::<_, String>("SHOW server_version_num")
            .fetch_one(pool)
            .instrument(span)
            .await
            .map_err(VersionError::Query)?;

        if let Ok(num) = version_num.trim().parse::<i64>()
            && let Ok(version) = Self::from_version_num(num)
        {
            return Ok(version);
        }

        debug!(%version_num, "unusable server_version_num; falling back to server_version");

        let span = info_span!(
            "db.query",
            db.operation = "SHOW",
            db.statement = "SHOW server_version"
        );
        let server_version = sqlx::query_scalar::<_, String>("SHOW server_version")
            .fetch_one(pool)
            .instrument(span)
            .await
            .map_err(VersionError::Query)?;

        Self::parse(&server_version)
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for ServerVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
