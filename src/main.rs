//! TT Trader - Main entry point
//!
//! Config files: tt-trader.toml, tt-trader.yaml, tt-trader.json, <config dir>/tt-trader/config.toml

mod app;

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tt_trader::{TradingError, VERSION};

use app::cli::{Cli, Commands};
use app::commands;
use app::init::{init_context, init_logging, load_config};

fn main() -> ExitCode {
    let cli = Cli::parse();
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };
    let code = runtime.block_on(run(cli));
    // An abandoned y/N prompt still holds a blocking stdin read
    runtime.shutdown_background();
    code
}

async fn run(cli: Cli) -> ExitCode {
    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            init_logging(cli.log_level.as_deref(), None);
            error!("❌ Configuration error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };
    init_logging(cli.log_level.as_deref(), config.log_level.as_deref());
    info!("Starting TT Trader v{}", VERSION);

    if !cli.command.needs_session() {
        let result = match cli.command {
            Commands::Plan(args) => commands::plan(&config, args),
            Commands::Occ(args) => commands::occ(args),
            _ => Ok(()),
        };
        return match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("❌ {}", e);
                ExitCode::FAILURE
            }
        };
    }

    let ctx = match init_context(&cli, config) {
        Ok(ctx) => ctx,
        Err(e) => {
            error!("❌ Startup failed: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Sweep(args) => commands::sweep(&ctx, args).await,
        Commands::Dca(args) => commands::dca(&ctx, args).await,
        Commands::RiskReversal(args) => commands::risk_reversal(&ctx, args).await,
        Commands::Track(args) => commands::track(&ctx, args).await,
        Commands::Plan(_) | Commands::Occ(_) => Ok(()),
    };

    // Trade outcomes are reported, never turned into an exit code
    if let Err(e) = result {
        if matches!(e, TradingError::Cancelled) {
            warn!("⚠️ Interrupted; session closed");
            return ExitCode::from(130);
        }
        report_error(&e);
    }

    if ctx.mode.is_dry_run() {
        info!("[DRY RUN] {} order(s) recorded, none sent", ctx.recorder.count());
    }
    info!("Done.");
    ExitCode::SUCCESS
}

fn report_error(e: &TradingError) {
    match e.category() {
        "AUTH" => error!("❌ Login failed: {}", e),
        "ORDER_REJECTED" => error!("❌ Order rejected: {}", e),
        "QUOTE" | "POSITION" => warn!("⚠️ Market data unavailable: {}", e),
        _ => error!("❌ {} [{}]", e, e.category()),
    }
}
