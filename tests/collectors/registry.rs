use crate::memory::{Row, Table};
use anyhow::Result;
use pg_stat_exporter::collectors::{
    COLLECTOR_NAMES, all_factories,
    config::CollectorConfig,
    registry::CollectorRegistry,
    version::ServerVersion,
};
use std::time::Duration;

fn registry() -> CollectorRegistry {
    CollectorRegistry::new(
        CollectorConfig::new()
            .with_enabled(&["stat_database".to_string()])
            .with_scrape_timeout(Duration::from_secs(2)),
    )
}

#[test]
fn test_stat_database_is_registered() {
    assert!(COLLECTOR_NAMES.contains(&"stat_database"));
    assert!(all_factories().contains_key("stat_database"));
    assert_eq!(registry().collector_names(), vec!["stat_database"]);
}

#[tokio::test]
async fn test_scrape_renders_collector_and_self_metrics() -> Result<()> {
    let table = Table::new(vec![Row::full("1", "appdb"), Row::full("2", "other")]);

    let text = registry()
        .collect_from(&table, Some(&ServerVersion::new(16, 2, 0)))
        .await?;

    assert!(text.contains(r#"pg_stat_database_xact_commit{datid="1",datname="appdb"} 10"#));
    assert!(text.contains(r#"pg_stat_database_xact_commit{datid="2",datname="other"} 10"#));
    assert!(text.contains("# TYPE pg_exporter_collector_scrape_duration_seconds histogram"));
    assert!(text.contains(r#"pg_exporter_collector_last_scrape_success{collector="stat_database"} 1"#));
    assert!(text.contains("# TYPE pg_up gauge"));
    Ok(())
}

#[tokio::test]
async fn test_failing_collector_is_counted_not_fatal() -> Result<()> {
    let reg = registry();
    let table = Table::unreachable("connection refused");

    reg.collect_from(&table, None).await?;
    let text = reg.collect_from(&table, None).await?;

    assert!(!text.contains("pg_stat_database_"));
    assert!(text.contains(r#"pg_exporter_collector_scrape_errors_total{collector="stat_database"} 2"#));
    assert!(text.contains(r#"pg_exporter_collector_last_scrape_success{collector="stat_database"} 0"#));
    Ok(())
}

#[tokio::test]
async fn test_no_collectors_still_renders_self_metrics() -> Result<()> {
    let reg = CollectorRegistry::new(CollectorConfig::new());
    assert!(reg.is_empty());

    let text = reg.collect_from(&Table::new(Vec::new()), None).await?;
    assert!(text.contains("pg_up"));
    Ok(())
}
