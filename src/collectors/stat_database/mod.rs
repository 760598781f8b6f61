use crate::collectors::{
    Collector,
    error::ScrapeError,
    metric::{Catalog, CatalogError, Observation},
    sink::MetricSink,
    source::StatSource,
    util::get_excluded_databases,
    version::ServerVersion,
};
use futures::{StreamExt, future::BoxFuture};
use std::sync::Arc;
use tracing::{debug, info_span, instrument};
use tracing_futures::Instrument as _;

pub mod catalog;
pub mod decoder;
pub mod emitter;
pub mod query;
pub mod selector;

use catalog::{IDENTITY_COLUMNS, VIEW};
use selector::ColumnSet;

/// Exposes `pg_stat_database` with the same names and labels as `postgres_exporter`.
///
/// **Metrics** (all labeled `{datid,datname}`):
/// - `pg_stat_database_numbackends` (gauge)
/// - `pg_stat_database_xact_commit`, `pg_stat_database_xact_rollback`
/// - `pg_stat_database_blks_read`, `pg_stat_database_blks_hit`
/// - `pg_stat_database_tup_{returned,fetched,inserted,updated,deleted}`
/// - `pg_stat_database_conflicts`, `pg_stat_database_temp_files`,
///   `pg_stat_database_temp_bytes`, `pg_stat_database_deadlocks`
/// - `pg_stat_database_blk_read_time`, `pg_stat_database_blk_write_time` (ms)
/// - `pg_stat_database_stats_reset` (epoch seconds, 0 if never reset)
/// - `pg_stat_database_active_time_seconds_total` (PG >= 14, seconds)
///
/// **Partial rows:**
/// - a row without `datid` or `datname` is dropped;
/// - a NULL (or unconvertible) value drops only that metric for that row;
/// - when the server version is unknown, only columns every version has are queried.
///
/// Observations are pushed to the sink only after the whole result has been read,
/// so a failed scrape pushes nothing.
#[derive(Clone)]
pub struct StatDatabaseCollector {
    catalog: &'static Catalog,
    excluded: Arc<[String]>,
}

impl Default for StatDatabaseCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl StatDatabaseCollector {
    /// Creates the collector, validating the metric catalog.
    ///
    /// Databases excluded through the CLI are skipped.
    ///
    /// # Errors
    ///
    /// Returns a [`CatalogError`] if the catalog is inconsistent.
    pub fn try_new() -> Result<Self, CatalogError> {
        Ok(Self {
            catalog: catalog::catalog()?,
            excluded: Arc::from(get_excluded_databases()),
        })
    }

    /// Creates a new `StatDatabaseCollector`
    ///
    /// # Panics
    ///
    /// Panics if the built-in catalog is invalid (caught by the catalog tests).
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        Self::try_new().expect("valid pg_stat_database catalog")
    }

    #[must_use]
    pub fn with_excluded_databases<I, S>(mut self, databases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded = databases.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub const fn catalog(&self) -> &'static Catalog {
        self.catalog
    }

    /// Columns requested from a server at `version`.
    #[must_use]
    pub fn columns(&self, version: Option<&ServerVersion>) -> ColumnSet {
        selector::select_columns(&IDENTITY_COLUMNS, self.catalog, version)
    }

    /// Query issued against a server at `version`.
    #[must_use]
    pub fn query(&self, version: Option<&ServerVersion>) -> String {
        query::build_query(VIEW, &self.columns(version))
    }

    async fn scan<S: StatSource>(
        &self,
        source: &S,
        columns: &ColumnSet,
        sql: &str,
    ) -> Result<Vec<Observation>, ScrapeError> {
        let mut rows = source.fetch(sql);
        let mut observations = Vec::new();
        let mut seen = 0usize;

        while let Some(next) = rows.next().await {
            let raw = next.map_err(|source| {
                if seen == 0 {
                    ScrapeError::Query(source)
                } else {
                    ScrapeError::RowStream { rows: seen, source }
                }
            })?;
            seen += 1;

            let Some(row) = decoder::decode_row(&raw, columns, &self.excluded)? else {
                continue;
            };

            emitter::emit_row(self.catalog, columns, &row, &mut observations)?;
        }

        drop(rows);

        debug!(
            rows = seen,
            observations = observations.len(),
            "scanned pg_stat_database"
        );

        Ok(observations)
    }
}

impl Collector for StatDatabaseCollector {
    fn name(&self) -> &'static str {
        "stat_database"
    }

    fn enabled_by_default(&self) -> bool {
        true
    }

    #[allow(refining_impl_trait)]
    #[instrument(
        skip(self, source, sink),
        level = "info",
        err,
        fields(collector = "stat_database", otel.kind = "internal")
    )]
    fn collect<'a, S: StatSource>(
        &'a self,
        source: &'a S,
        version: Option<&'a ServerVersion>,
        sink: &'a dyn MetricSink,
    ) -> BoxFuture<'a, Result<(), ScrapeError>> {
        Box::pin(async move {
            if version.is_none() {
                debug!("server version unknown, querying ungated columns only");
            }

            let columns = self.columns(version);
            let sql = query::build_query(VIEW, &columns);

            let span_q = info_span!(
                "db.query",
                otel.kind = "client",
                db.system = "postgresql",
                db.operation = "SELECT",
                db.statement = %sql,
                db.sql.table = "pg_stat_database"
            );

            let observations = self.scan(source, &columns, &sql).instrument(span_q).await?;

            let pushed = observations.len();
            for observation in observations {
                sink.push(observation)?;
            }

            debug!(observations = pushed, "pushed pg_stat_database metrics");
            Ok(())
        })
    }
}
