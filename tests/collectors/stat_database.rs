use crate::memory::{Row, Table};
use anyhow::Result;
use pg_stat_exporter::collectors::{
    Collector, StatDatabaseCollector,
    error::ScrapeError,
    metric::{Observation, ValueKind},
    sink::PrometheusSink,
    version::ServerVersion,
};
use tokio::sync::mpsc;

async fn collect(table: &Table, version: Option<ServerVersion>) -> Result<Vec<Observation>, ScrapeError> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let collector = StatDatabaseCollector::new().with_excluded_databases(Vec::<String>::new());

    collector.collect(table, version.as_ref(), &tx).await?;
    drop(tx);

    let mut out = Vec::new();
    while let Some(observation) = rx.recv().await {
        out.push(observation);
    }
    Ok(out)
}

fn find<'a>(out: &'a [Observation], name: &str) -> &'a Observation {
    out.iter()
        .find(|o| o.name == name)
        .unwrap_or_else(|| panic!("{name} missing"))
}

#[tokio::test]
async fn test_pg13_full_row() -> Result<()> {
    let table = Table::new(vec![Row::full("12345", "appdb")]);

    let out = collect(&table, Some("13.0".parse()?)).await?;

    assert_eq!(out.len(), 17);
    assert!(out.iter().all(|o| o.name != "pg_stat_database_active_time_seconds_total"));
    assert!(out.iter().all(|o| o.label_names == ["datid", "datname"]));
    assert!(out.iter().all(|o| o.label_values == ["12345", "appdb"]));

    let query = table.last_query().unwrap();
    assert!(query.ends_with("FROM pg_stat_database;"));
    assert!(!query.contains("active_time"));
    Ok(())
}

#[tokio::test]
async fn test_pg14_adds_active_time_in_seconds() -> Result<()> {
    let table = Table::new(vec![
        Row::full("12345", "appdb").set("active_time", 4200.0),
    ]);

    let out = collect(&table, Some("14.2.0".parse()?)).await?;

    assert_eq!(out.len(), 18);
    let active = find(&out, "pg_stat_database_active_time_seconds_total");
    assert!((active.value - 4.2).abs() < 1e-9);
    assert_eq!(active.kind, ValueKind::Counter);
    assert!(table.last_query().unwrap().contains("active_time"));
    Ok(())
}

#[tokio::test]
async fn test_unknown_version_queries_ungated_columns() -> Result<()> {
    let table = Table::new(vec![Row::full("1", "appdb")]);

    let out = collect(&table, None).await?;

    assert_eq!(out.len(), 17);
    assert!(!table.last_query().unwrap().contains("active_time"));
    Ok(())
}

#[tokio::test]
async fn test_missing_identity_drops_only_that_row() -> Result<()> {
    let table = Table::new(vec![
        Row::full("0", "ignored").null("datname"),
        Row::full("7", "appdb"),
        Row::full("8", "ignored").null("datid"),
        Row::full("9", "other"),
    ]);

    let out = collect(&table, Some(ServerVersion::new(15, 4, 0))).await?;

    assert_eq!(out.len(), 36);
    assert!(out.iter().all(|o| o.label("datname") != Some("ignored")));
    Ok(())
}

#[tokio::test]
async fn test_null_value_drops_only_that_metric() -> Result<()> {
    let table = Table::new(vec![Row::full("1", "appdb").null("blk_read_time")]);

    let out = collect(&table, Some(ServerVersion::new(13, 0, 0))).await?;

    assert_eq!(out.len(), 16);
    assert!(out.iter().all(|o| o.name != "pg_stat_database_blk_read_time"));
    Ok(())
}

#[tokio::test]
async fn test_never_reset_stats_report_zero() -> Result<()> {
    let table = Table::new(vec![Row::full("1", "appdb").null("stats_reset")]);

    let out = collect(&table, Some(ServerVersion::new(13, 0, 0))).await?;

    assert_eq!(out.len(), 17);
    let reset = find(&out, "pg_stat_database_stats_reset");
    assert!(reset.value.abs() < f64::EPSILON);
    assert_eq!(reset.kind, ValueKind::Counter);
    Ok(())
}

#[tokio::test]
async fn test_stats_reset_is_unix_seconds() -> Result<()> {
    let table = Table::new(vec![Row::full("1", "appdb")]);

    let out = collect(&table, Some(ServerVersion::new(13, 0, 0))).await?;

    let reset = find(&out, "pg_stat_database_stats_reset");
    assert!((reset.value - 1_704_067_200.0).abs() < f64::EPSILON);
    Ok(())
}

#[tokio::test]
async fn test_query_failure_is_reported_and_emits_nothing() {
    let table = Table::unreachable("connection refused");
    let (tx, mut rx) = mpsc::unbounded_channel();

    let err = StatDatabaseCollector::new()
        .collect(&table, Some(&ServerVersion::new(16, 0, 0)), &tx)
        .await
        .unwrap_err();
    drop(tx);

    assert!(matches!(err, ScrapeError::Query(_)));
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn test_negative_counter_is_skipped_not_fatal() -> Result<()> {
    let table = Table::new(vec![
        Row::full("1", "appdb"),
        Row::full("2", "other").set("deadlocks", -1.0),
    ]);
    let sink = PrometheusSink::default();

    StatDatabaseCollector::new()
        .collect(&table, Some(&ServerVersion::new(13, 0, 0)), &sink)
        .await?;

    let text = sink.encode()?;
    assert!(text.contains(r#"pg_stat_database_deadlocks{datid="1",datname="appdb"} 10"#));
    assert!(!text.contains(r#"pg_stat_database_deadlocks{datid="2",datname="other"}"#));
    assert!(text.contains(r#"pg_stat_database_xact_commit{datid="2",datname="other"} 10"#));
    Ok(())
}

#[tokio::test]
async fn test_empty_view_emits_nothing() -> Result<()> {
    let out = collect(&Table::new(Vec::new()), Some(ServerVersion::new(16, 0, 0))).await?;
    assert!(out.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_prometheus_sink_exposition() -> Result<()> {
    let table = Table::new(vec![Row::full("12345", "appdb")]);
    let sink = PrometheusSink::default();

    StatDatabaseCollector::new()
        .collect(&table, Some(&ServerVersion::new(14, 0, 0)), &sink)
        .await?;

    let text = sink.encode()?;
    assert!(text.contains("# HELP pg_stat_database_numbackends Number of backends currently connected to this database."));
    assert!(text.contains("# TYPE pg_stat_database_numbackends gauge"));
    assert!(text.contains("# TYPE pg_stat_database_deadlocks counter"));
    assert!(text.contains(
        r#"pg_stat_database_active_time_seconds_total{datid="12345",datname="appdb"} 2.5"#
    ));
    Ok(())
}
