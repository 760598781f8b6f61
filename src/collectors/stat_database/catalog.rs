use crate::collectors::{
    metric::{
        Catalog, CatalogError, Column, Conversion, MetricDefinition, MissingPolicy, ValueKind,
        fq_name,
    },
    version::ServerVersion,
};
use once_cell::sync::OnceCell;

pub const NAMESPACE: &str = "pg";
pub const SUBSYSTEM: &str = "stat_database";
pub const VIEW: &str = "pg_stat_database";

pub const DATABASE_LABELS: [&str; 2] = ["datid", "datname"];

pub const DATID: Column = Column::text("datid");
pub const DATNAME: Column = Column::text("datname");

/// Columns every row needs before any metric can be labeled.
pub const IDENTITY_COLUMNS: [Column; 2] = [DATID, DATNAME];

/// `active_time` was added to `pg_stat_database` in `PostgreSQL` 14.
pub const ACTIVE_TIME_SINCE: ServerVersion = ServerVersion::new(14, 0, 0);

static CATALOG: OnceCell<Catalog> = OnceCell::new();

/// The process-wide `pg_stat_database` catalog, validated on first use.
///
/// # Errors
///
/// Returns a [`CatalogError`] if the definitions are inconsistent.
pub fn catalog() -> Result<&'static Catalog, CatalogError> {
    CATALOG.get_or_try_init(|| Catalog::new(definitions()))
}

fn db_metric(name: &str, help: &'static str, kind: ValueKind, column: Column) -> MetricDefinition {
    MetricDefinition::new(
        fq_name(NAMESPACE, SUBSYSTEM, name),
        help,
        kind,
        &DATABASE_LABELS,
        column,
    )
}

fn db_counter(column: &'static str, help: &'static str) -> MetricDefinition {
    db_metric(column, help, ValueKind::Counter, Column::number(column))
}

fn definitions() -> Vec<MetricDefinition> {
    vec![
        db_metric(
            "numbackends",
            "Number of backends currently connected to this database. This is the only column in this view that returns a value reflecting current state; all other columns return the accumulated values since the last reset.",
            ValueKind::Gauge,
            Column::number("numbackends"),
        ),
        db_counter(
            "xact_commit",
            "Number of transactions in this database that have been committed",
        ),
        db_counter(
            "xact_rollback",
            "Number of transactions in this database that have been rolled back",
        ),
        db_counter("blks_read", "Number of disk blocks read in this database"),
        db_counter(
            "blks_hit",
            "Number of times disk blocks were found already in the buffer cache, so that a read was not necessary (this only includes hits in the PostgreSQL buffer cache, not the operating system's file system cache)",
        ),
        db_counter(
            "tup_returned",
            "Number of rows returned by queries in this database",
        ),
        db_counter(
            "tup_fetched",
            "Number of rows fetched by queries in this database",
        ),
        db_counter(
            "tup_inserted",
            "Number of rows inserted by queries in this database",
        ),
        db_counter(
            "tup_updated",
            "Number of rows updated by queries in this database",
        ),
        db_counter(
            "tup_deleted",
            "Number of rows deleted by queries in this database",
        ),
        db_counter(
            "conflicts",
            "Number of queries canceled due to conflicts with recovery in this database. (Conflicts occur only on standby servers; see pg_stat_database_conflicts for details.)",
        ),
        db_counter(
            "temp_files",
            "Number of temporary files created by queries in this database. All temporary files are counted, regardless of why the temporary file was created (e.g., sorting or hashing), and regardless of the log_temp_files setting.",
        ),
        db_counter(
            "temp_bytes",
            "Total amount of data written to temporary files by queries in this database. All temporary files are counted, regardless of why the temporary file was created, and regardless of the log_temp_files setting.",
        ),
        db_counter("deadlocks", "Number of deadlocks detected in this database"),
        db_counter(
            "blk_read_time",
            "Time spent reading data file blocks by backends in this database, in milliseconds",
        ),
        db_counter(
            "blk_write_time",
            "Time spent writing data file blocks by backends in this database, in milliseconds",
        ),
        // A NULL stats_reset means the counters were never reset, reported as 0.
        db_metric(
            "stats_reset",
            "Time at which these statistics were last reset",
            ValueKind::Counter,
            Column::timestamp("stats_reset"),
        )
        .converted(Conversion::EpochSeconds)
        .when_missing(MissingPolicy::Default(0.0)),
        db_metric(
            "active_time_seconds_total",
            "Time spent executing SQL statements in this database, in seconds",
            ValueKind::Counter,
            Column::number("active_time"),
        )
        .since(ACTIVE_TIME_SINCE)
        .converted(Conversion::MillisToSeconds),
    ]
}
