//! Periodic status report built from the latest evaluation

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt::Write;

use super::engine::{EngineSettings, EngineState, SessionBaseline};
use crate::domain::ledger::{TradeRecord, TradeStatus};
use crate::domain::ports::CostBreakdown;
use crate::shared::types::{AssetPair, Strategy, VenuePair, VenueSlot, VenueValues};
use crate::shared::utils::percentage_change;

/// Borrowed engine context needed to label a report.
pub struct ReportContext<'a> {
    pub pair: &'a AssetPair,
    pub venues: &'a VenuePair,
    pub settings: &'a EngineSettings,
    pub executing: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PriceLine {
    pub venue: String,
    pub current: Option<Decimal>,
    pub start: Option<Decimal>,
    pub change_pct: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BalanceLine {
    pub asset: String,
    pub current: Option<Decimal>,
    pub baseline: Option<Decimal>,
    pub change_pct: Option<Decimal>,
}

impl BalanceLine {
    fn new(asset: impl Into<String>, current: Option<Decimal>, baseline: Option<Decimal>) -> Self {
        let change_pct = match (baseline, current) {
            (Some(old), Some(new)) => percentage_change(old, new),
            _ => None,
        };
        Self {
            asset: asset.into(),
            current,
            baseline,
            change_pct,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StrategyLine {
    pub strategy: Strategy,
    pub label: String,
    pub output: Option<Decimal>,
    pub net_profit: Option<Decimal>,
    pub profitable: bool,
}

/// Serializable view of the engine at one instant.
#[derive(Debug, Clone, Serialize)]
pub struct ReportSnapshot {
    pub pair_label: String,
    pub quote_symbol: String,
    pub amount_in: Decimal,
    pub min_profit_percent: Decimal,
    pub threshold: Decimal,
    pub simulate_only: bool,
    pub executing: bool,
    pub costs: CostBreakdown,
    pub baseline: Option<SessionBaseline>,
    pub balances: Vec<BalanceLine>,
    pub break_even_volume: Option<Decimal>,
    pub prices: VenueValues<PriceLine>,
    pub strategies: Vec<StrategyLine>,
    pub best: Option<Strategy>,
    pub trades: Vec<TradeRecord>,
    pub cycles: u64,
    pub evaluated_at: DateTime<Utc>,
}

impl ReportSnapshot {
    /// `None` until the first evaluation has completed.
    pub fn build(state: &EngineState, ctx: &ReportContext<'_>) -> Option<Self> {
        let result = state.last_result.as_ref()?;

        let price_line = |slot: VenueSlot| {
            let current = *result.pair_prices.get(slot);
            let start = *state.start_prices.get(slot);
            let change_pct = match (start, current) {
                (Some(old), Some(new)) => percentage_change(old, new),
                _ => None,
            };
            PriceLine {
                venue: ctx.venues.get(slot).name.clone(),
                current,
                start,
                change_pct,
            }
        };

        let strategies = Strategy::ALL
            .into_iter()
            .map(|strategy| {
                let net_profit = *result.strategy_net_profit.get(strategy);
                StrategyLine {
                    strategy,
                    label: strategy.describe(ctx.venues),
                    output: *result.leg_outputs.get(strategy),
                    net_profit,
                    profitable: net_profit.map_or(false, |net| net > result.min_profit_threshold),
                }
            })
            .collect();

        let base_price = result.pair_prices.first.or(result.pair_prices.second);
        let current = result.balances.as_ref();
        let baseline = state.baseline.as_ref().map(|b| &b.balances);
        let balances = vec![
            BalanceLine::new(
                ctx.pair.quote.symbol.clone(),
                current.map(|b| b.quote_amount),
                baseline.map(|b| b.quote_amount),
            ),
            BalanceLine::new(
                ctx.pair.base.symbol.clone(),
                current.map(|b| b.base_amount),
                baseline.map(|b| b.base_amount),
            ),
            BalanceLine::new(
                "SOL",
                current.map(|b| b.native_amount),
                baseline.map(|b| b.native_amount),
            ),
            BalanceLine::new(
                "Total value",
                current.map(|b| b.total_value(base_price)),
                state.baseline.as_ref().map(|b| b.total_value),
            ),
        ];

        Some(Self {
            pair_label: format!("{}/{}", ctx.pair.base.symbol, ctx.pair.quote.symbol),
            quote_symbol: ctx.pair.quote.symbol.clone(),
            amount_in: result.amount_in,
            min_profit_percent: ctx.settings.min_profit_percent,
            threshold: result.min_profit_threshold,
            simulate_only: ctx.settings.simulate_only,
            executing: ctx.executing,
            costs: result.costs.clone(),
            baseline: state.baseline.clone(),
            balances,
            break_even_volume: result.break_even_volume,
            prices: VenueValues::new(price_line(VenueSlot::First), price_line(VenueSlot::Second)),
            strategies,
            best: result.decision(),
            trades: state.ledger.recent(ctx.settings.recent_trades),
            cycles: state.cycles,
            evaluated_at: result.timestamp,
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Plain-text tables for the terminal.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let q = &self.quote_symbol;

        let mut flags = String::new();
        if self.simulate_only {
            flags.push_str(" [SIMULATE ONLY]");
        }
        if self.executing {
            flags.push_str(" [EXECUTING]");
        }
        let _ = writeln!(
            out,
            "=== {} spatial arbitrage{} === {}",
            self.pair_label,
            flags,
            self.evaluated_at.format("%H:%M:%S")
        );

        let _ = writeln!(out, "\n[Config]");
        let _ = writeln!(
            out,
            "  Amount in: {} {} | Min profit: {}% ({} {}) | Cycles: {}",
            self.amount_in, q, self.min_profit_percent, fmt_dec(self.threshold), q, self.cycles
        );

        let _ = writeln!(out, "\n[Fees]");
        let _ = writeln!(
            out,
            "  Network: {} {} ({} SOL) | Priority: {} {} ({} SOL)",
            fmt_dec(self.costs.network_cost),
            q,
            fmt_dec(self.costs.network_native),
            fmt_dec(self.costs.priority_cost),
            q,
            fmt_dec(self.costs.priority_native)
        );
        let _ = writeln!(
            out,
            "  Gas total: {} {} @ {} USD/SOL{} | Pool fees (in quotes): {} {}",
            fmt_dec(self.costs.total_cost),
            q,
            fmt_dec(self.costs.native_price_usd),
            if self.costs.fallback { " [fallback]" } else { "" },
            fmt_dec(self.costs.pool_fee_cost),
            q
        );

        let _ = writeln!(out, "\n[Balances]");
        let _ = writeln!(out, "  {:<12} {:>16} {:>16} {:>10}", "Asset", "Current", "Baseline", "Change");
        for line in &self.balances {
            let _ = writeln!(
                out,
                "  {:<12} {:>16} {:>16} {:>10}",
                line.asset,
                fmt_opt(line.current),
                fmt_opt(line.baseline),
                fmt_pct(line.change_pct)
            );
        }

        let _ = writeln!(out, "\n[Volume]");
        let _ = writeln!(
            out,
            "  Input: {} {} | Break-even: {}",
            self.amount_in,
            q,
            self.break_even_volume
                .map(|v| format!("{} {}", fmt_dec(v), q))
                .unwrap_or_else(|| "n/a".to_string())
        );

        let _ = writeln!(out, "\n[Prices] ({} per unit)", q);
        for line in [&self.prices.first, &self.prices.second] {
            let _ = writeln!(
                out,
                "  {:<12} {:>16} start {:>16} {:>10}",
                line.venue,
                fmt_opt(line.current),
                fmt_opt(line.start),
                fmt_pct(line.change_pct)
            );
        }

        let _ = writeln!(out, "\n[Strategies]");
        for line in &self.strategies {
            let marker = match (self.best == Some(line.strategy), line.profitable) {
                (true, _) => "<- EXECUTE",
                (false, true) => "profitable",
                _ => "",
            };
            let _ = writeln!(
                out,
                "  {:<34} out {:>14} net {:>14} {}",
                line.label,
                fmt_opt(line.output),
                fmt_opt(line.net_profit),
                marker
            );
        }

        let _ = writeln!(out, "\n[Transactions]");
        if self.trades.is_empty() {
            let _ = writeln!(out, "  (none)");
        }
        for trade in &self.trades {
            let status = match trade.status {
                TradeStatus::Success => "SUCCESS",
                TradeStatus::Failed => "FAILED",
            };
            let _ = write!(
                out,
                "  {} {:<2} {:<28} {:<8} vol {:>12} net {:>12} tx {}",
                trade.timestamp.format("%H:%M:%S"),
                trade.strategy,
                trade.order_label,
                status,
                fmt_dec(trade.input_volume),
                fmt_opt(trade.net_profit),
                trade.tx_id.as_deref().unwrap_or("-")
            );
            if let Some(reason) = &trade.fail_reason {
                let _ = write!(out, " ({})", reason);
            }
            if trade.needs_attention() {
                let _ = write!(out, " !! PARTIAL FAILURE - MANUAL INTERVENTION REQUIRED");
            }
            let _ = writeln!(out);
        }

        out
    }
}

fn fmt_dec(value: Decimal) -> String {
    value.round_dp(6).normalize().to_string()
}

fn fmt_opt(value: Option<Decimal>) -> String {
    value.map(fmt_dec).unwrap_or_else(|| "-".to_string())
}

fn fmt_pct(value: Option<Decimal>) -> String {
    match value {
        Some(pct) if pct >= Decimal::ZERO => format!("+{}%", pct.round_dp(2)),
        Some(pct) => format!("{}%", pct.round_dp(2)),
        None => "-".to_string(),
    }
}
