//! Command line definition

use clap::{Args, Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use std::path::PathBuf;
use tt_trader::strategy::ExpiryChoice;
use tt_trader::Side;

#[derive(Parser, Debug)]
#[command(name = "tt-trader", version)]
#[command(about = "Order placement, fill tracking and strategy flows for tastytrade", long_about = None)]
pub struct Cli {
    /// Config file (TOML, YAML or JSON)
    #[arg(long, global = true, env = "TT_TRADER_CONFIG")]
    pub config: Option<PathBuf>,

    /// API environment; overrides `broker.use_prod`
    #[arg(long = "env", value_enum, global = true)]
    pub environment: Option<ApiEnvironment>,

    /// Log orders instead of sending them
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(long, global = true)]
    pub auto: bool,

    /// trace, debug, info, warn or error
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ApiEnvironment {
    Prod,
    Sandbox,
}

impl ApiEnvironment {
    pub fn use_prod(self) -> bool {
        matches!(self, ApiEnvironment::Prod)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SideArg {
    Buy,
    Sell,
}

impl From<SideArg> for Side {
    fn from(side: SideArg) -> Self {
        match side {
            SideArg::Buy => Side::Buy,
            SideArg::Sell => Side::Sell,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InstrumentArg {
    Stock,
    Option,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sweep idle cash into (or out of) a money-market ETF
    Sweep(SweepArgs),
    /// Build a DCA plan and place it as one market order
    Dca(DcaArgs),
    /// Price a risk reversal and place the two-leg order
    RiskReversal(RiskReversalArgs),
    /// Print a DCA plan without logging in or ordering
    Plan(PlanArgs),
    /// Poll an existing order until it settles
    Track(TrackArgs),
    /// Build an OCC option symbol
    Occ(OccArgs),
}

impl Commands {
    /// Whether the command talks to the broker
    pub fn needs_session(&self) -> bool {
        !matches!(self, Commands::Plan(_) | Commands::Occ(_))
    }
}

#[derive(Args, Debug)]
pub struct SweepArgs {
    /// Sweep vehicle; defaults to `sweep.symbol`
    #[arg(long)]
    pub symbol: Option<String>,
}

#[derive(Args, Debug)]
pub struct DcaArgs {
    #[arg(long)]
    pub symbol: String,
    #[arg(long, value_enum, default_value = "buy")]
    pub side: SideArg,
    /// Entry price; defaults to spot times `dca.discount`
    #[arg(long)]
    pub entry: Option<Decimal>,
    #[arg(long)]
    pub capital: Option<Decimal>,
    #[arg(long)]
    pub steps: Option<u32>,
    /// Exit price for the P&L line
    #[arg(long)]
    pub exit: Option<Decimal>,
}

#[derive(Args, Debug)]
pub struct RiskReversalArgs {
    /// Underlying; defaults to `risk_reversal.default_symbol`
    #[arg(long)]
    pub symbol: Option<String>,
    /// buy is bullish (short put, long call), sell is bearish
    #[arg(long, value_enum, default_value = "buy")]
    pub side: SideArg,
    /// Strike to trade; defaults to the suggested strike
    #[arg(long)]
    pub strike: Option<Decimal>,
    /// Strikes to price instead of the window around the ITM strike
    #[arg(long, value_delimiter = ',')]
    pub strikes: Vec<Decimal>,
    /// Contracts
    #[arg(long)]
    pub quantity: Option<Decimal>,
    /// Net limit: positive for a credit, negative for a debit. Market if omitted.
    #[arg(long, allow_hyphen_values = true)]
    pub limit: Option<Decimal>,
    /// 0 = 0-DTE, 1 = 45..99 DTE, 2 = 100+ DTE
    #[arg(long)]
    pub expiry_choice: Option<ExpiryChoice>,
    /// Print the priced plan and exit without ordering
    #[arg(long)]
    pub exit: bool,
}

#[derive(Args, Debug)]
pub struct PlanArgs {
    #[arg(long)]
    pub symbol: String,
    #[arg(long, value_enum, default_value = "buy")]
    pub side: SideArg,
    #[arg(long, value_enum, default_value = "stock")]
    pub instrument: InstrumentArg,
    /// Entry price (premium per share for options)
    #[arg(long)]
    pub entry: Decimal,
    #[arg(long)]
    pub capital: Option<Decimal>,
    #[arg(long)]
    pub steps: Option<u32>,
    #[arg(long)]
    pub exit: Option<Decimal>,
}

#[derive(Args, Debug)]
pub struct TrackArgs {
    pub order_id: String,
    /// Quantity the order was placed for
    #[arg(long)]
    pub quantity: Decimal,
}

#[derive(Args, Debug)]
pub struct OccArgs {
    #[arg(long)]
    pub root: String,
    /// YYYY-MM-DD
    #[arg(long)]
    pub expiry: String,
    /// C or P
    #[arg(long = "type")]
    pub option_type: String,
    #[arg(long)]
    pub strike: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use rust_decimal_macros::dec;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "tt-trader", "risk-reversal", "--symbol", "TQQQ", "--side", "sell", "--limit", "-0.35",
            "--expiry-choice", "1", "--dry-run", "--env", "sandbox",
        ]);
        assert!(cli.dry_run);
        assert_eq!(cli.environment, Some(ApiEnvironment::Sandbox));
        match cli.command {
            Commands::RiskReversal(args) => {
                assert_eq!(args.side, SideArg::Sell);
                assert_eq!(args.limit, Some(dec!(-0.35)));
                assert_eq!(args.expiry_choice, Some(ExpiryChoice::Medium));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_offline_commands() {
        let cli = Cli::parse_from([
            "tt-trader", "occ", "--root", "SPY", "--expiry", "2025-12-19", "--type", "P", "--strike", "600",
        ]);
        assert!(!cli.command.needs_session());

        let cli = Cli::parse_from(["tt-trader", "track", "12345", "--quantity", "10"]);
        assert!(cli.command.needs_session());
    }
}
