//! Subcommand handlers
//! Prompting lives here; the library takes resolved parameters

use rust_decimal::Decimal;
use std::io::{self, Write};
use std::sync::Arc;
use tracing::{info, warn};
use tt_trader::strategy::calendar::now_eastern;
use tt_trader::strategy::dca::entry_from_spot;
use tt_trader::strategy::{
    build_plan, execute_dca, execute_risk_reversal, run_sweep, DcaPlan, MarketCalendar,
    RiskReversalOrder, SweepContext,
};
use tt_trader::trading::{build_occ_from_parts, get_spot_price, risk_reversal_request, track_order};
use tt_trader::{with_session, Config, FillOutcome, OrderHandle, OrderSubmitter, Side, TradingError};

use super::cli::{DcaArgs, InstrumentArg, OccArgs, PlanArgs, RiskReversalArgs, SweepArgs, TrackArgs};
use super::init::AppContext;

/// Ask on the terminal; anything but y/yes declines.
/// The read runs off the runtime thread so Ctrl-C can still close the session.
pub async fn confirm(prompt: String, skip: bool) -> bool {
    if skip {
        info!("{} [auto-confirmed]", prompt);
        return true;
    }
    let answer = tokio::task::spawn_blocking(move || {
        print!("{prompt} [y/N]: ");
        let _ = io::stdout().flush();
        let mut line = String::new();
        io::stdin().read_line(&mut line).map(|_| line)
    })
    .await;
    match answer {
        Ok(Ok(line)) => is_yes(&line),
        _ => false,
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn print_block(title: &str, lines: &[String]) {
    info!("{}", "=".repeat(70));
    info!("{}", title);
    info!("{}", "=".repeat(70));
    for line in lines {
        info!("{}", line);
    }
}

fn log_outcome(outcome: &FillOutcome) {
    let avg = outcome
        .average_price
        .map(|p| format!("${p:.4}"))
        .unwrap_or_else(|| "n/a".to_string());
    if outcome.is_filled() {
        info!(
            "✅ Order filled: {} @ {} after {} polls",
            outcome.filled_quantity, avg, outcome.polls
        );
    } else {
        warn!(
            "⚠️ Order ended as {} with {} filled (avg {}) after {} polls",
            outcome.status, outcome.filled_quantity, avg, outcome.polls
        );
    }
}

fn submitter(ctx: &AppContext, session: &Arc<tt_trader::SessionClient>) -> OrderSubmitter<tt_trader::SessionClient> {
    OrderSubmitter::new(Arc::clone(session), ctx.mode).with_recorder(Arc::clone(&ctx.recorder))
}

pub async fn sweep(ctx: &AppContext, args: SweepArgs) -> Result<(), TradingError> {
    let mut sweep = ctx.config.sweep.clone();
    if let Some(symbol) = args.symbol {
        sweep.symbol = symbol.trim().to_uppercase();
    }
    let calendar = MarketCalendar::new().with_holidays(sweep.extra_holidays.iter().copied());
    let skip = ctx.skip_confirm();

    let report = with_session(Arc::clone(&ctx.session), &ctx.credentials, |session| async move {
        let submitter = submitter(ctx, &session);
        let sweep_ctx = SweepContext {
            session: &session,
            credentials: &ctx.credentials,
            submitter: &submitter,
            calendar: &calendar,
            sweep: &sweep,
            tracker: &ctx.config.tracker,
            reconcile: &ctx.config.reconcile,
        };
        run_sweep(&sweep_ctx, now_eastern().naive_local(), |decision, price| {
            let action = decision
                .trade
                .map(|(side, qty)| format!("{side} {qty}"))
                .unwrap_or_default();
            let prompt = format!(
                "{} {} @ ~${:.4} ({})",
                action, sweep_ctx.sweep.symbol, price, decision.case
            );
            confirm(prompt, skip)
        })
        .await
    })
    .await?;

    if let Some(fill) = &report.fill {
        log_outcome(fill);
    }
    if let Some(verdict) = &report.verification {
        info!(
            "Reconciliation: {} (cash Δ ${:.2}, position Δ {})",
            verdict.label(),
            verdict.cash_change,
            verdict.position_change
        );
    }
    Ok(())
}

pub async fn dca(ctx: &AppContext, args: DcaArgs) -> Result<(), TradingError> {
    let side = Side::from(args.side);
    let capital = args.capital.unwrap_or(ctx.config.dca.capital);
    let steps = args.steps.unwrap_or(ctx.config.dca.steps);
    let skip = ctx.skip_confirm();

    with_session(Arc::clone(&ctx.session), &ctx.credentials, |session| async move {
        let entry = match args.entry {
            Some(entry) => entry,
            None => {
                let spot = get_spot_price(&*session, &args.symbol).await?;
                let entry = entry_from_spot(spot, ctx.config.dca.discount);
                info!("{} spot ${:.2}, entry at {} of spot: ${:.2}", args.symbol, spot, ctx.config.dca.discount, entry);
                entry
            }
        };
        let plan = DcaPlan::new(&args.symbol, side, entry, capital, steps, args.exit)?;
        print_block("DCA PLAN", &plan.describe());

        let prompt = format!("Place market order: {} {} {}?", side, plan.total_shares, plan.symbol);
        if !confirm(prompt, skip).await {
            info!("Order cancelled.");
            return Ok(());
        }
        let submitter = submitter(ctx, &session);
        if let Some(outcome) = execute_dca(&*session, &submitter, &plan, &ctx.config.tracker).await? {
            log_outcome(&outcome);
        }
        Ok(())
    })
    .await
}

pub async fn risk_reversal(ctx: &AppContext, args: RiskReversalArgs) -> Result<(), TradingError> {
    let defaults = &ctx.config.risk_reversal;
    let symbol = args.symbol.clone().unwrap_or_else(|| defaults.default_symbol.clone());
    let choice = args.expiry_choice.unwrap_or(defaults.expiry_choice);
    let direction = Side::from(args.side);
    let contracts = args.quantity.unwrap_or(defaults.default_quantity);
    let today = now_eastern().date_naive();
    let skip = ctx.skip_confirm();

    with_session(Arc::clone(&ctx.session), &ctx.credentials, |session| async move {
        let strikes = (!args.strikes.is_empty()).then_some(args.strikes.as_slice());
        let plan = build_plan(&*session, &symbol, choice, today, defaults.strike_radius, strikes).await?;
        print_block("RISK REVERSAL PLAN", &plan.describe());
        if args.exit {
            info!("Plan only, no order placed.");
            return Ok(());
        }

        let Some(strike) = args.strike.or(plan.suggested_strike) else {
            return Err(TradingError::QuoteUnavailable {
                symbol: plan.symbol.clone(),
                reason: "no strike to trade".to_string(),
            });
        };
        let order = RiskReversalOrder {
            strike,
            direction,
            contracts,
            limit: args.limit,
        };

        let submitter = submitter(ctx, &session);
        if ctx.mode.is_live() {
            let request = risk_reversal_request(&plan.symbol, plan.expiry, strike, direction, contracts, args.limit)?;
            match submitter.preview(&request).await {
                Ok(preview) => info!("Broker preview accepted: {}", preview),
                Err(e) => warn!("Broker preview failed: {}", e),
            }
        }

        let structure = match direction {
            Side::Buy => "bullish (short put / long call)",
            Side::Sell => "bearish (long put / short call)",
        };
        let price = match args.limit {
            Some(limit) if limit > Decimal::ZERO => format!("limit {limit:.2} credit"),
            Some(limit) => format!("limit {:.2} debit", limit.abs()),
            None => "market".to_string(),
        };
        let prompt = format!(
            "Place {} {} {} risk reversal @ ${} exp {} ({})?",
            contracts, plan.symbol, structure, strike, plan.expiry, price
        );
        if !confirm(prompt, skip).await {
            info!("Order cancelled.");
            return Ok(());
        }

        if let Some(outcome) = execute_risk_reversal(&*session, &submitter, &plan, &order, &ctx.config.tracker).await? {
            log_outcome(&outcome);
        }
        Ok(())
    })
    .await
}

pub async fn track(ctx: &AppContext, args: TrackArgs) -> Result<(), TradingError> {
    with_session(Arc::clone(&ctx.session), &ctx.credentials, |session| async move {
        let handle = OrderHandle::new(args.order_id.trim());
        info!("Tracking order {} for {}", handle, args.quantity);
        let outcome = track_order(&*session, handle, args.quantity, ctx.config.tracker.clone()).await;
        log_outcome(&outcome);
        Ok(())
    })
    .await
}

/// Planning only: no login, no order
pub fn plan(config: &Config, args: PlanArgs) -> Result<(), TradingError> {
    let side = Side::from(args.side);
    let capital = args.capital.unwrap_or(config.dca.capital);
    let steps = args.steps.unwrap_or(config.dca.steps);
    let plan = match args.instrument {
        InstrumentArg::Stock => DcaPlan::new(&args.symbol, side, args.entry, capital, steps, args.exit)?,
        InstrumentArg::Option => DcaPlan::for_options(&args.symbol, side, args.entry, capital, steps, args.exit)?,
    };
    print_block("POSITION PLAN", &plan.describe());
    info!("No orders placed. This is a PLAN only.");
    Ok(())
}

pub fn occ(args: OccArgs) -> Result<(), TradingError> {
    let symbol = build_occ_from_parts(&args.root, &args.expiry, &args.option_type, args.strike)?;
    println!("{symbol}");
    Ok(())
}
