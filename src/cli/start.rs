use crate::cli::{actions::Action, commands, dispatch::handler, telemetry};
use anyhow::Result;
use tracing::{Level, info};

/// Log level for the number of `-v` flags; `None` keeps errors only.
const fn log_level(verbose: u8) -> Option<Level> {
    match verbose {
        0 => None,
        1 => Some(Level::INFO),
        2 => Some(Level::DEBUG),
        _ => Some(Level::TRACE),
    }
}

/// Parses the command line, installs logging and resolves what to run.
///
/// # Errors
///
/// Returns an error if telemetry initialization or argument handling fails
pub fn start() -> Result<Action> {
    let matches = commands::new().get_matches();

    telemetry::init(log_level(matches.get_count("verbose")))?;

    let action = handler(&matches)?;
    log_action(&action);

    Ok(action)
}

fn log_action(action: &Action) {
    match action {
        Action::Run {
            port,
            listen,
            collectors,
            scrape_timeout,
            ..
        } => info!(
            port,
            listen = listen.as_deref().unwrap_or("auto"),
            collectors = %collectors.join(","),
            scrape_timeout_secs = scrape_timeout.as_secs(),
            "starting pg_stat_exporter"
        ),
    }
}
