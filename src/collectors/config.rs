use std::collections::HashSet;
use std::time::Duration;

/// Upper bound for a single collector's run within one scrape.
pub const DEFAULT_SCRAPE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct CollectorConfig {
    pub enabled_collectors: HashSet<String>,
    pub scrape_timeout: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            enabled_collectors: HashSet::new(),
            scrape_timeout: DEFAULT_SCRAPE_TIMEOUT,
        }
    }
}

impl CollectorConfig {
    /// Create an empty config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable collectors by name
    #[must_use]
    pub fn with_enabled(mut self, collectors: &[String]) -> Self {
        self.enabled_collectors = collectors.iter().cloned().collect();
        self
    }

    #[must_use]
    pub const fn with_scrape_timeout(mut self, timeout: Duration) -> Self {
        self.scrape_timeout = timeout;
        self
    }

    /// Check if a collector is enabled
    #[must_use]
    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled_collectors.contains(name)
    }
}
