use crate::collectors::{
    Collector, CollectorType, all_factories,
    config::CollectorConfig,
    error::ScrapeError,
    scraper::ScrapeStats,
    sink::PrometheusSink,
    source::StatSource,
    version::{ServerVersion, VersionError},
};
use anyhow::{Context, Result};
use prometheus::{Registry, TextEncoder, proto::MetricFamily};
use sqlx::PgPool;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Enabled collectors plus the self-metrics that outlive a single scrape.
#[derive(Clone)]
pub struct CollectorRegistry {
    collectors: Vec<CollectorType>,
    stats: ScrapeStats,
    scrape_timeout: Duration,
}

impl CollectorRegistry {
    #[must_use]
    pub fn new(config: CollectorConfig) -> Self {
        let factories = all_factories();

        let mut names: Vec<&String> = config.enabled_collectors.iter().collect();
        names.sort();

        let collectors = names
            .into_iter()
            .filter_map(|name| factories.get(name.as_str()).map(|f| f()))
            .collect();

        Self {
            collectors,
            stats: ScrapeStats::new(),
            scrape_timeout: config.scrape_timeout,
        }
    }

    /// Runs one scrape against `pool` and renders the Prometheus text exposition.
    ///
    /// A failing collector is logged and counted; it does not fail the scrape.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be registered or encoded.
    #[instrument(skip(self, pool), level = "info", err)]
    pub async fn collect_all(&self, pool: &PgPool) -> Result<String> {
        let version = match ServerVersion::detect(pool).await {
            Ok(version) => {
                debug!(%version, "detected server version");
                self.stats.set_up(true);
                Some(version)
            }
            Err(e @ VersionError::Query(_)) => {
                warn!(error = %e, "PostgreSQL unreachable");
                self.stats.set_up(false);
                None
            }
            Err(e @ VersionError::Parse(_)) => {
                warn!(error = %e, "could not determine server version; version-gated metrics disabled");
                self.stats.set_up(true);
                None
            }
        };

        self.collect_from(pool, version.as_ref()).await
    }

    /// Runs every enabled collector against `source` into a fresh registry.
    ///
    /// Each collector writes into its own sink; only the families of collectors
    /// that finished successfully are rendered.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be registered or encoded.
    pub async fn collect_from<S: StatSource>(
        &self,
        source: &S,
        version: Option<&ServerVersion>,
    ) -> Result<String> {
        let registry = Registry::new();
        self.stats
            .register(&registry)
            .context("failed to register scrape metrics")?;

        let mut collected: Vec<MetricFamily> = Vec::new();

        for collector in &self.collectors {
            let timer = self.stats.start_scrape(collector.name());
            let sink = PrometheusSink::default();

            let result = tokio::time::timeout(
                self.scrape_timeout,
                collector.collect(source, version, &sink),
            )
            .await
            .unwrap_or(Err(ScrapeError::Timeout(self.scrape_timeout)));

            match result {
                Ok(()) => {
                    debug!(collector = collector.name(), "collected metrics");
                    collected.extend(sink.registry().gather());
                    timer.success();
                }
                Err(e) => {
                    warn!(collector = collector.name(), error = %e, "collector failed");
                    timer.error();
                }
            }
        }

        let mut families = registry.gather();
        families.extend(collected);
        families.sort_by(|a, b| a.name().cmp(b.name()));

        TextEncoder::new()
            .encode_to_string(&families)
            .context("failed to encode metrics")
    }

    #[must_use]
    pub fn collector_names(&self) -> Vec<&'static str> {
        self.collectors.iter().map(Collector::name).collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }

    #[must_use]
    pub const fn stats(&self) -> &ScrapeStats {
        &self.stats
    }
}
