//! Application initialization
//! Handles config loading, logging setup, and session construction

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::level_filters::LevelFilter;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;
use tt_trader::api::mask_account;
use tt_trader::trading::DryRunRecorder;
use tt_trader::{Config, Credentials, SessionClient, TradingMode};

use super::cli::Cli;

/// Everything a command needs
pub struct AppContext {
    pub config: Config,
    pub session: Arc<SessionClient>,
    pub credentials: Credentials,
    pub mode: TradingMode,
    pub recorder: Arc<DryRunRecorder>,
    pub auto_confirm: bool,
}

impl AppContext {
    /// Confirmation is skipped with `--auto` and in dry-run mode
    pub fn skip_confirm(&self) -> bool {
        self.auto_confirm || self.mode.is_dry_run()
    }
}

/// Initialize logging.
///
/// The CLI level wins, then the config level, then `RUST_LOG`, then `info`.
pub fn init_logging(cli_level: Option<&str>, config_level: Option<&str>) {
    let filter = match cli_level.or(config_level) {
        Some(level) => EnvFilter::default().add_directive(LevelFilter::from_level(parse_log_level(level)).into()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}

/// Parse log level string
pub fn parse_log_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Load configuration for this invocation
pub fn load_config(cli: &Cli) -> Result<Config> {
    let path = cli.config.as_deref();
    if cli.command.needs_session() {
        Config::resolve(path)
    } else {
        Config::resolve_unvalidated(path)
    }
}

/// Build the session client and run mode
pub fn init_context(cli: &Cli, config: Config) -> Result<AppContext> {
    let use_prod = cli.environment.map(|e| e.use_prod());
    let base_url = config.base_url(use_prod).to_string();
    let session = SessionClient::new(&base_url, &config.broker.account_number)
        .context("Failed to create HTTP client")?;

    let mode = TradingMode::from_flag(cli.dry_run);
    info!(
        "API: {} | Account: {} | Mode: {}",
        base_url,
        mask_account(&config.broker.account_number),
        if mode.is_dry_run() { "DRY RUN" } else { "LIVE" }
    );

    Ok(AppContext {
        credentials: config.credentials(),
        session: Arc::new(session),
        mode,
        recorder: Arc::new(DryRunRecorder::new()),
        auto_confirm: cli.auto,
        config,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("DEBUG"), Level::DEBUG);
        assert_eq!(parse_log_level("warning"), Level::WARN);
        assert_eq!(parse_log_level("bogus"), Level::INFO);
    }
}
