use prometheus::{CounterVec, GaugeVec, HistogramOpts, HistogramVec, IntGauge, Opts, Registry};
use std::time::Instant;

/// Exporter self-metrics, kept across scrapes and registered into each per-scrape registry.
///
/// - `pg_up` (gauge): 1 if the server answered version detection, else 0
/// - `pg_exporter_collector_scrape_duration_seconds{collector}` (histogram)
/// - `pg_exporter_collector_scrape_errors_total{collector}` (counter)
/// - `pg_exporter_collector_last_scrape_success{collector}` (gauge, 1/0)
///
/// ```promql
/// # Failing collectors
/// sum by (collector) (rate(pg_exporter_collector_scrape_errors_total[5m])) > 0
/// ```
#[derive(Clone)]
pub struct ScrapeStats {
    up: IntGauge,
    scrape_duration_seconds: HistogramVec,
    scrape_errors_total: CounterVec,
    last_scrape_success: GaugeVec,
}

impl Default for ScrapeStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ScrapeStats {
    /// Creates a new `ScrapeStats`
    ///
    /// # Panics
    ///
    /// Panics if metric creation fails (should never happen with valid metric names)
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        let up = IntGauge::with_opts(Opts::new(
            "pg_up",
            "Whether the last scrape could reach PostgreSQL (1=up, 0=down)",
        ))
        .expect("pg_up");

        let scrape_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "pg_exporter_collector_scrape_duration_seconds",
                "Time spent scraping each collector in seconds",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            &["collector"],
        )
        .expect("pg_exporter_collector_scrape_duration_seconds");

        let scrape_errors_total = CounterVec::new(
            Opts::new(
                "pg_exporter_collector_scrape_errors_total",
                "Total number of scrape errors per collector",
            ),
            &["collector"],
        )
        .expect("pg_exporter_collector_scrape_errors_total");

        let last_scrape_success = GaugeVec::new(
            Opts::new(
                "pg_exporter_collector_last_scrape_success",
                "Whether the last scrape was successful (1=success, 0=failure)",
            ),
            &["collector"],
        )
        .expect("pg_exporter_collector_last_scrape_success");

        Self {
            up,
            scrape_duration_seconds,
            scrape_errors_total,
            last_scrape_success,
        }
    }

    /// Register all metrics with the registry
    ///
    /// # Errors
    ///
    /// Returns an error if any metric fails to register
    pub fn register(&self, registry: &Registry) -> prometheus::Result<()> {
        registry.register(Box::new(self.up.clone()))?;
        registry.register(Box::new(self.scrape_duration_seconds.clone()))?;
        registry.register(Box::new(self.scrape_errors_total.clone()))?;
        registry.register(Box::new(self.last_scrape_success.clone()))?;
        Ok(())
    }

    pub fn set_up(&self, up: bool) {
        self.up.set(i64::from(up));
    }

    #[must_use]
    pub fn up(&self) -> bool {
        self.up.get() == 1
    }

    /// Starts timing one collector run.
    #[must_use]
    pub fn start_scrape(&self, collector_name: &str) -> ScrapeTimer {
        ScrapeTimer {
            collector_name: collector_name.to_string(),
            start: Instant::now(),
            stats: self.clone(),
            finished: false,
        }
    }

    fn record_success(&self, collector_name: &str, duration: f64) {
        self.scrape_duration_seconds
            .with_label_values(&[collector_name])
            .observe(duration);

        self.last_scrape_success
            .with_label_values(&[collector_name])
            .set(1.0);
    }

    fn record_error(&self, collector_name: &str, duration: f64) {
        self.scrape_duration_seconds
            .with_label_values(&[collector_name])
            .observe(duration);

        self.scrape_errors_total
            .with_label_values(&[collector_name])
            .inc();

        self.last_scrape_success
            .with_label_values(&[collector_name])
            .set(0.0);
    }
}

/// Timer for one collector run; finished by [`ScrapeTimer::success`] or [`ScrapeTimer::error`].
///
/// A timer dropped unfinished (the scrape future was cancelled) counts as an error.
pub struct ScrapeTimer {
    collector_name: String,
    start: Instant,
    stats: ScrapeStats,
    finished: bool,
}

impl ScrapeTimer {
    pub fn success(mut self) {
        self.finished = true;
        let duration = self.start.elapsed().as_secs_f64();
        self.stats.record_success(&self.collector_name, duration);
    }

    pub fn error(mut self) {
        self.finished = true;
        let duration = self.start.elapsed().as_secs_f64();
        self.stats.record_error(&self.collector_name, duration);
    }
}

impl Drop for ScrapeTimer {
    fn drop(&mut self) {
        if !self.finished {
            let duration = self.start.elapsed().as_secs_f64();
            self.stats.record_error(&self.collector_name, duration);
        }
    }
}
