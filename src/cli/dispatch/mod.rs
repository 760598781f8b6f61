use crate::{
    cli::actions::Action,
    collectors::{
        COLLECTOR_NAMES, Collector, all_factories,
        util::{get_excluded_databases, set_excluded_databases},
    },
};
use anyhow::{Result, anyhow};
use clap::ArgMatches;
use secrecy::SecretString;
use std::time::Duration;
use tracing::info;

/// Turns parsed arguments into an [`Action`].
///
/// # Errors
///
/// Returns an error if a required argument is missing.
pub fn handler(matches: &ArgMatches) -> Result<Action> {
    // Initialize global excluded database list once from CLI/env
    init_excluded_databases(matches);

    info!(excluded = ?get_excluded_databases(), "excluded databases");

    let port = matches
        .get_one::<u16>("port")
        .copied()
        .ok_or_else(|| anyhow!("Port is required. Please provide it using the --port flag."))?;

    // None means auto-detect
    let listen = matches.get_one::<String>("listen").cloned();

    let dsn = SecretString::from(
        matches
            .get_one::<String>("dsn")
            .cloned()
            .ok_or_else(|| anyhow!("DSN is required. Please provide it using the --dsn flag."))?,
    );

    let scrape_timeout = matches
        .get_one::<u64>("scrape-timeout")
        .copied()
        .map(Duration::from_secs)
        .ok_or_else(|| anyhow!("Scrape timeout is required. Please provide it using the --scrape-timeout flag."))?;

    Ok(Action::Run {
        port,
        listen,
        dsn,
        collectors: get_enabled_collectors(matches),
        scrape_timeout,
    })
}

fn init_excluded_databases(matches: &ArgMatches) {
    let excludes: Vec<String> = matches
        .get_many::<String>("exclude-databases")
        .map(|vals| vals.cloned().collect())
        .unwrap_or_default();

    set_excluded_databases(excludes);
}

#[must_use]
pub fn get_enabled_collectors(matches: &ArgMatches) -> Vec<String> {
    let factories = all_factories();

    COLLECTOR_NAMES
        .iter()
        .filter(|&name| {
            let enable_flag = format!("collector.{name}");
            let disable_flag = format!("no-collector.{name}");

            if matches.get_flag(&disable_flag) {
                return false;
            }

            if matches.get_flag(&enable_flag) {
                return true;
            }

            factories
                .get(name)
                .is_some_and(|factory| factory().enabled_by_default())
        })
        .map(|&name| name.to_string())
        .collect()
}
