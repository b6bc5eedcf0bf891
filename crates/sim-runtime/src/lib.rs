#![deny(warnings)]

//! Simulation runtime: the tick engine, sale resolution, upgrades, milestones
//! and prestige, plus the render snapshot handed to front ends.
//!
//! All entry points take the state and the random source explicitly; nothing
//! here reads a clock or a global generator.

pub mod clock;
pub mod session;

pub use clock::FrameClock;
pub use session::{FrameReport, Session};

use rand::Rng;
use serde::Serialize;
use sim_core::{EconomyConfig, GameState, SaleMode, TimerReset, UpgradeKind};
use sim_econ as econ;
use tracing::{debug, info};

/// Something observable that happened during a tick.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SimEvent {
    /// A production cycle completed and was paid for.
    Produced { units: u64, cost: f64 },
    /// A production cycle completed but credits did not cover the cost.
    ProductionStalled { cost: f64, credits: f64 },
    /// A sale round sold at least one unit.
    Sold { units: u64, earnings: f64 },
    /// Lifetime sales reached a milestone.
    Milestone { index: usize, text: String },
}

/// Result of one [`advance`] call.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TickReport {
    pub events: Vec<SimEvent>,
    pub production_progress: f64,
    pub sale_progress: f64,
}

impl TickReport {
    /// Units sold during the tick.
    pub fn units_sold(&self) -> u64 {
        self.events
            .iter()
            .map(|e| match e {
                SimEvent::Sold { units, .. } => *units,
                _ => 0,
            })
            .sum()
    }

    /// Milestone announcements fired during the tick.
    pub fn milestones(&self) -> impl Iterator<Item = &str> {
        self.events.iter().filter_map(|e| match e {
            SimEvent::Milestone { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}

fn reset_timer(timer: &mut f64, threshold: f64, policy: TimerReset) {
    *timer = match policy {
        TimerReset::Zero => 0.0,
        TimerReset::Carry => (*timer - threshold).max(0.0),
    };
}

/// Advance a state by `elapsed` seconds, returning the new state.
pub fn advance<R: Rng + ?Sized>(
    mut state: GameState,
    cfg: &EconomyConfig,
    elapsed: f64,
    rng: &mut R,
) -> (GameState, TickReport) {
    let report = advance_in_place(&mut state, cfg, elapsed, rng);
    (state, report)
}

/// Advance a state in place by `elapsed` seconds.
///
/// Production runs before sales. A zero, negative or non-finite delta leaves
/// the state untouched and draws nothing from `rng`.
pub fn advance_in_place<R: Rng + ?Sized>(
    state: &mut GameState,
    cfg: &EconomyConfig,
    elapsed: f64,
    rng: &mut R,
) -> TickReport {
    let mut report = TickReport::default();
    if elapsed.is_finite() && elapsed > 0.0 {
        production_phase(state, cfg, elapsed, rng, &mut report.events);
        sale_phase(state, cfg, elapsed, rng, &mut report.events);
    }
    report.production_progress =
        econ::progress_percent(state.production_timer, econ::production_time(state, cfg));
    report.sale_progress =
        econ::progress_percent(state.sale_timer, econ::sale_interval(state, cfg));
    report
}

/// Accumulate production time and run at most one cycle.
pub fn production_phase<R: Rng + ?Sized>(
    state: &mut GameState,
    cfg: &EconomyConfig,
    elapsed: f64,
    rng: &mut R,
    events: &mut Vec<SimEvent>,
) {
    state.production_timer += elapsed;
    let threshold = econ::production_time(state, cfg);
    if state.production_timer < threshold {
        return;
    }
    reset_timer(&mut state.production_timer, threshold, cfg.timer_reset);

    let cost = econ::production_cost(state, cfg);
    if state.credits < cost {
        debug!(cost, credits = state.credits, "production stalled");
        events.push(SimEvent::ProductionStalled {
            cost,
            credits: state.credits,
        });
        return;
    }
    state.credits -= cost;
    let mut units = econ::guaranteed_output(state, cfg);
    if econ::trial(rng, econ::bonus_output_chance(state, cfg) / 100.0) {
        units += 1;
    }
    state.inventory += units;
    debug!(units, cost, inventory = state.inventory, "produced");
    events.push(SimEvent::Produced { units, cost });
}

/// Accumulate sale time and resolve at most one sale round.
pub fn sale_phase<R: Rng + ?Sized>(
    state: &mut GameState,
    cfg: &EconomyConfig,
    elapsed: f64,
    rng: &mut R,
    events: &mut Vec<SimEvent>,
) {
    state.sale_timer += elapsed;
    let threshold = econ::sale_interval(state, cfg);
    if state.sale_timer < threshold {
        return;
    }
    reset_timer(&mut state.sale_timer, threshold, cfg.timer_reset);
    resolve_sales(state, cfg, rng, events);
}

/// Run one sale round against the current inventory. Returns units sold.
pub fn resolve_sales<R: Rng + ?Sized>(
    state: &mut GameState,
    cfg: &EconomyConfig,
    rng: &mut R,
    events: &mut Vec<SimEvent>,
) -> u64 {
    if state.inventory == 0 {
        return 0;
    }
    let chance = econ::sell_chance(state, cfg);
    let sold = match cfg.sale_mode {
        SaleMode::MultiAttempt => {
            let mut attempts = econ::guaranteed_sales(state, cfg);
            if econ::trial(rng, econ::bonus_sale_chance(state, cfg) / 100.0) {
                attempts += 1;
            }
            let mut sold = 0;
            for _ in 0..attempts {
                if state.inventory == 0 {
                    break;
                }
                if econ::trial(rng, chance) {
                    state.inventory -= 1;
                    sold += 1;
                }
            }
            sold
        }
        SaleMode::PerUnit => {
            let sold = (0..state.inventory)
                .filter(|_| econ::trial(&mut *rng, chance))
                .count() as u64;
            state.inventory -= sold;
            sold
        }
    };

    if sold > 0 {
        let earnings = sold as f64 * econ::sell_price(state, cfg);
        state.credits += earnings;
        state.items_sold += sold;
        state.lifetime_sold += sold;
        debug!(sold, earnings, inventory = state.inventory, "sold");
        events.push(SimEvent::Sold {
            units: sold,
            earnings,
        });
    }
    if let Some(event) = check_milestone(state, cfg) {
        events.push(event);
    }
    sold
}

/// Advance past at most one reached milestone.
pub fn check_milestone(state: &mut GameState, cfg: &EconomyConfig) -> Option<SimEvent> {
    let milestone = cfg.milestones().get(state.milestone_index)?;
    if state.lifetime_sold < milestone.sold {
        return None;
    }
    let index = state.milestone_index;
    state.milestone_index += 1;
    info!(index, sold = state.lifetime_sold, text = %milestone.text, "milestone reached");
    Some(SimEvent::Milestone {
        index,
        text: milestone.text.clone(),
    })
}

/// Outcome of an upgrade purchase.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UpgradeOutcome {
    Purchased {
        kind: UpgradeKind,
        cost: f64,
        level: u32,
    },
    InsufficientFunds {
        kind: UpgradeKind,
        cost: f64,
        credits: f64,
    },
    /// The variant does not offer this upgrade.
    Unavailable { kind: UpgradeKind },
}

impl UpgradeOutcome {
    pub fn is_purchased(&self) -> bool {
        matches!(self, UpgradeOutcome::Purchased { .. })
    }
}

/// Buy one level of `kind` if affordable; otherwise leave the state untouched.
pub fn apply_upgrade(
    state: &mut GameState,
    cfg: &EconomyConfig,
    kind: UpgradeKind,
) -> UpgradeOutcome {
    let Some(cost) = econ::upgrade_cost(state, cfg, kind) else {
        return UpgradeOutcome::Unavailable { kind };
    };
    if state.credits < cost {
        return UpgradeOutcome::InsufficientFunds {
            kind,
            cost,
            credits: state.credits,
        };
    }
    state.credits -= cost;
    let level = state.level_mut(kind);
    *level += 1;
    let level = *level;
    info!(%kind, level, cost, "upgrade purchased");
    UpgradeOutcome::Purchased { kind, cost, level }
}

/// Outcome of a prestige request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PrestigeOutcome {
    Prestiged { gain: u64, influence: u64 },
    /// Lifetime sales are too low to earn any influence.
    NothingToGain,
    /// The variant has no prestige.
    Unavailable,
}

/// Trade the current epoch's progress for influence.
///
/// Influence, tier, timers and the milestone index survive.
pub fn prestige(state: &mut GameState, cfg: &EconomyConfig) -> PrestigeOutcome {
    if cfg.prestige.is_none() {
        return PrestigeOutcome::Unavailable;
    }
    let gain = econ::prestige_gain(state, cfg);
    if gain == 0 {
        return PrestigeOutcome::NothingToGain;
    }
    state.influence += gain;
    state.credits = cfg.starting_credits;
    state.speed_level = 0;
    state.efficiency_level = 0;
    state.advertising_level = 0;
    state.logistics_level = 0;
    state.inventory = 0;
    state.items_sold = 0;
    state.lifetime_sold = 0;
    info!(gain, influence = state.influence, "prestige");
    PrestigeOutcome::Prestiged {
        gain,
        influence: state.influence,
    }
}

/// Fresh state, discarding everything including influence.
pub fn reset(cfg: &EconomyConfig) -> GameState {
    info!(variant = %cfg.name, "full reset");
    GameState::new(cfg)
}

/// Price of the next level of an offered upgrade.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct UpgradeQuote {
    pub kind: UpgradeKind,
    pub level: u32,
    pub cost: f64,
    pub affordable: bool,
}

/// Everything a front end needs to draw one frame: raw fields plus derived values.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SimSnapshot {
    pub variant: String,
    pub state: GameState,
    pub production_time: f64,
    pub production_cost: f64,
    pub sell_price: f64,
    pub profit_per_item: f64,
    pub efficiency_reduction: f64,
    pub demand: f64,
    pub sell_chance: f64,
    pub sale_interval: f64,
    pub guaranteed_output: u64,
    pub bonus_output_chance: f64,
    pub guaranteed_sales: u64,
    pub bonus_sale_chance: f64,
    pub prestige_gain: u64,
    pub next_influence_remaining: u64,
    pub production_progress: f64,
    pub sale_progress: f64,
    pub upgrades: Vec<UpgradeQuote>,
    pub market_mood: econ::MarketMood,
}

/// Capture the render surface for `state`.
pub fn snapshot(state: &GameState, cfg: &EconomyConfig) -> SimSnapshot {
    let production_time = econ::production_time(state, cfg);
    let sale_interval = econ::sale_interval(state, cfg);
    let upgrades = UpgradeKind::ALL
        .into_iter()
        .filter_map(|kind| {
            econ::upgrade_cost(state, cfg, kind).map(|cost| UpgradeQuote {
                kind,
                level: state.level(kind),
                cost,
                affordable: state.credits >= cost,
            })
        })
        .collect();
    SimSnapshot {
        variant: cfg.name.clone(),
        state: state.clone(),
        production_time,
        production_cost: econ::production_cost(state, cfg),
        sell_price: econ::sell_price(state, cfg),
        profit_per_item: econ::profit_per_item(state, cfg),
        efficiency_reduction: econ::efficiency_reduction(state, cfg),
        demand: econ::demand(state, cfg),
        sell_chance: econ::sell_chance(state, cfg),
        sale_interval,
        guaranteed_output: econ::guaranteed_output(state, cfg),
        bonus_output_chance: econ::bonus_output_chance(state, cfg),
        guaranteed_sales: econ::guaranteed_sales(state, cfg),
        bonus_sale_chance: econ::bonus_sale_chance(state, cfg),
        prestige_gain: econ::prestige_gain(state, cfg),
        next_influence_remaining: econ::next_influence_remaining(state, cfg),
        production_progress: econ::progress_percent(state.production_timer, production_time),
        sale_progress: econ::progress_percent(state.sale_timer, sale_interval),
        upgrades,
        market_mood: econ::market_mood(state, cfg),
    }
}
