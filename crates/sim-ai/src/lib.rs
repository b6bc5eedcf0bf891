#![deny(warnings)]

//! Autopilot policies: which upgrade to buy next and when to prestige.
//!
//! Decisions are based on a steady-state income estimate, not on simulated
//! futures. The autopilot only ever buys what leaves enough credits to pay
//! for the next production cycle.

use std::fmt;
use std::str::FromStr;

use anyhow::bail;
use serde::{Deserialize, Serialize};
use sim_core::{EconomyConfig, GameState, SaleMode, UpgradeKind};
use sim_econ as econ;
use tracing::trace;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    /// Never buy anything.
    Hold,
    /// Buy the cheapest offered upgrade.
    Cheapest,
    /// Buy the upgrade that pays for itself soonest.
    #[default]
    BestReturn,
}

impl Policy {
    pub const ALL: [Policy; 3] = [Policy::Hold, Policy::Cheapest, Policy::BestReturn];

    pub fn name(&self) -> &'static str {
        match self {
            Policy::Hold => "hold",
            Policy::Cheapest => "cheapest",
            Policy::BestReturn => "best-return",
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Policy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        match Policy::ALL.into_iter().find(|p| p.name() == wanted) {
            Some(p) => Ok(p),
            None => bail!("unknown policy {s:?} (expected hold, cheapest or best-return)"),
        }
    }
}

/// Expected units finished per second, bonus output included.
pub fn production_rate(state: &GameState, cfg: &EconomyConfig) -> f64 {
    let per_cycle = econ::guaranteed_output(state, cfg) as f64
        + (econ::bonus_output_chance(state, cfg) / 100.0).min(1.0);
    per_cycle / econ::production_time(state, cfg)
}

/// Expected units the market absorbs per second with unlimited stock.
pub fn sale_capacity(state: &GameState, cfg: &EconomyConfig) -> f64 {
    match cfg.sale_mode {
        SaleMode::MultiAttempt => {
            let attempts = econ::guaranteed_sales(state, cfg) as f64
                + (econ::bonus_sale_chance(state, cfg) / 100.0).min(1.0);
            attempts * econ::sell_chance(state, cfg) / econ::sale_interval(state, cfg)
        }
        // every unit in stock gets a trial, so stock drains as fast as it builds
        SaleMode::PerUnit => f64::INFINITY,
    }
}

/// Steady-state credits per second: sales revenue minus production spend.
pub fn income_rate(state: &GameState, cfg: &EconomyConfig) -> f64 {
    let sold = production_rate(state, cfg).min(sale_capacity(state, cfg));
    sold * econ::sell_price(state, cfg)
        - econ::production_cost(state, cfg) / econ::production_time(state, cfg)
}

/// Seconds of extra income needed to recoup one level of `kind`.
///
/// `None` when the upgrade is not offered or does not raise income.
pub fn payback_seconds(state: &GameState, cfg: &EconomyConfig, kind: UpgradeKind) -> Option<f64> {
    let cost = econ::upgrade_cost(state, cfg, kind)?;
    let mut after = state.clone();
    *after.level_mut(kind) += 1;
    let gain = income_rate(&after, cfg) - income_rate(state, cfg);
    (gain > 0.0).then(|| cost / gain)
}

/// Offered and affordable while keeping the next production cycle funded.
fn within_budget(state: &GameState, cfg: &EconomyConfig, kind: UpgradeKind) -> Option<f64> {
    let cost = econ::upgrade_cost(state, cfg, kind)?;
    let mut after = state.clone();
    *after.level_mut(kind) += 1;
    let reserve = econ::production_cost(&after, cfg);
    (state.credits - cost >= reserve).then_some(cost)
}

/// The upgrade `policy` wants right now, if any.
pub fn next_purchase(
    state: &GameState,
    cfg: &EconomyConfig,
    policy: Policy,
) -> Option<UpgradeKind> {
    let candidates = UpgradeKind::ALL
        .into_iter()
        .filter_map(|kind| within_budget(state, cfg, kind).map(|cost| (kind, cost)));

    let pick = match policy {
        Policy::Hold => None,
        Policy::Cheapest => candidates
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(kind, _)| kind),
        Policy::BestReturn => candidates
            .filter_map(|(kind, _)| payback_seconds(state, cfg, kind).map(|p| (kind, p)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(kind, _)| kind),
    };
    trace!(%policy, ?pick, credits = state.credits, "autopilot decision");
    pick
}

/// Prestige once it would grant at least `min_gain` influence.
pub fn should_prestige(state: &GameState, cfg: &EconomyConfig, min_gain: u64) -> bool {
    min_gain > 0 && econ::prestige_gain(state, cfg) >= min_gain
}
