use crate::collectors::{
    error::ScrapeError, sink::MetricSink, source::StatSource, version::ServerVersion,
};
use std::collections::HashMap;
use std::future::Future;

#[macro_use]
mod register_macro;

pub trait Collector {
    fn name(&self) -> &'static str;

    fn enabled_by_default(&self) -> bool;

    /// Runs one collection cycle against `source`, pushing observations into `sink`.
    ///
    /// `version` is the server version detected for this scrape, `None` if unknown.
    fn collect<'a, S: StatSource>(
        &'a self,
        source: &'a S,
        version: Option<&'a ServerVersion>,
        sink: &'a dyn MetricSink,
    ) -> impl Future<Output = Result<(), ScrapeError>> + Send + 'a;
}

// Add new collectors here.
register_collectors! {
    stat_database => StatDatabaseCollector,
}

pub mod config;
pub mod error;
pub mod metric;
pub mod registry;
pub mod scraper;
pub mod sink;
pub mod source;
pub mod util;
pub mod version;

#[cfg(test)]
pub(crate) mod testing;
