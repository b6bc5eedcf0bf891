#![deny(warnings)]

//! Core domain models and invariants for DDC Industries.
//!
//! This crate defines the single mutable [`GameState`] record, the
//! [`EconomyConfig`] that parameterizes the three game variants, and
//! validation helpers to guarantee basic invariants.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Purchasable upgrade tracks. Each raises one level field of [`GameState`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeKind {
    /// Shortens the production cycle and raises output.
    Speed,
    /// Discounts the production cost.
    Efficiency,
    /// Raises demand, sell price and sale attempts.
    Advertising,
    /// Shortens the sale interval.
    Logistics,
    /// Raises the product tier (tiered variants only).
    Tier,
}

impl UpgradeKind {
    /// All kinds in display order.
    pub const ALL: [UpgradeKind; 5] = [
        UpgradeKind::Speed,
        UpgradeKind::Efficiency,
        UpgradeKind::Advertising,
        UpgradeKind::Logistics,
        UpgradeKind::Tier,
    ];

    /// Lowercase identifier, also accepted by [`FromStr`].
    pub fn name(&self) -> &'static str {
        match self {
            UpgradeKind::Speed => "speed",
            UpgradeKind::Efficiency => "efficiency",
            UpgradeKind::Advertising => "advertising",
            UpgradeKind::Logistics => "logistics",
            UpgradeKind::Tier => "tier",
        }
    }
}

impl fmt::Display for UpgradeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for UpgradeKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UpgradeKind::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::UnknownUpgrade(s.to_string()))
    }
}

/// The whole mutable state of one game.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    /// Currency balance (>= 0).
    pub credits: f64,
    pub speed_level: u32,
    pub efficiency_level: u32,
    pub advertising_level: u32,
    pub logistics_level: u32,
    pub tier: u32,
    /// Seconds accumulated towards the next production cycle.
    pub production_timer: f64,
    /// Seconds accumulated towards the next sale round.
    pub sale_timer: f64,
    /// Produced but unsold units.
    pub inventory: u64,
    /// Units sold in the current epoch.
    pub items_sold: u64,
    /// Units sold since the last full reset or prestige.
    pub lifetime_sold: u64,
    /// Prestige currency.
    pub influence: u64,
    /// Next milestone not yet announced.
    pub milestone_index: usize,
}

impl GameState {
    /// Fresh state for the given variant.
    pub fn new(cfg: &EconomyConfig) -> Self {
        Self {
            credits: cfg.starting_credits,
            speed_level: 0,
            efficiency_level: 0,
            advertising_level: 0,
            logistics_level: 0,
            tier: 0,
            production_timer: 0.0,
            sale_timer: 0.0,
            inventory: 0,
            items_sold: 0,
            lifetime_sold: 0,
            influence: 0,
            milestone_index: 0,
        }
    }

    /// Current level of an upgrade track.
    pub fn level(&self, kind: UpgradeKind) -> u32 {
        match kind {
            UpgradeKind::Speed => self.speed_level,
            UpgradeKind::Efficiency => self.efficiency_level,
            UpgradeKind::Advertising => self.advertising_level,
            UpgradeKind::Logistics => self.logistics_level,
            UpgradeKind::Tier => self.tier,
        }
    }

    /// Mutable access to the level field of an upgrade track.
    pub fn level_mut(&mut self, kind: UpgradeKind) -> &mut u32 {
        match kind {
            UpgradeKind::Speed => &mut self.speed_level,
            UpgradeKind::Efficiency => &mut self.efficiency_level,
            UpgradeKind::Advertising => &mut self.advertising_level,
            UpgradeKind::Logistics => &mut self.logistics_level,
            UpgradeKind::Tier => &mut self.tier,
        }
    }
}

/// Exponential cost curve: `base * growth^level`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CostCurve {
    pub base: f64,
    pub growth: f64,
}

impl CostCurve {
    pub const fn new(base: f64, growth: f64) -> Self {
        Self { base, growth }
    }

    /// Cost of buying the next level when `level` levels are owned.
    pub fn cost_at(&self, level: u32) -> f64 {
        self.base * self.growth.powf(f64::from(level))
    }
}

/// How the base value of one produced unit is derived.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum ProductionValue {
    /// `base * growth^(speed_level [+ influence])`.
    Scaling {
        base: f64,
        growth: f64,
        include_influence: bool,
    },
    /// `base * growth^tier`.
    Tiered { base: f64, growth: f64 },
}

/// Sale resolution rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleMode {
    /// A few attempts per round, each consuming one unit on success.
    MultiAttempt,
    /// One independent trial per unit in inventory.
    PerUnit,
}

/// What a timer holds right after its phase fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerReset {
    /// Drop any overshoot.
    Zero,
    /// Keep the overshoot beyond one threshold.
    Carry,
}

/// A one-shot announcement fired when lifetime sales reach `sold`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub sold: u64,
    pub text: String,
}

impl Milestone {
    pub fn new(sold: u64, text: &str) -> Self {
        Self {
            sold,
            text: text.to_string(),
        }
    }
}

/// Milestone and prestige capability of a variant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrestigeConfig {
    /// Gain is `floor(sqrt(lifetime_sold / sold_divisor))`.
    pub sold_divisor: f64,
    /// Strictly increasing thresholds.
    pub milestones: Vec<Milestone>,
}

/// Parameters of one game variant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EconomyConfig {
    pub name: String,
    /// Storage key the variant persists under.
    pub save_key: String,
    pub starting_credits: f64,
    pub base_production_time: f64,
    pub speed_time_decay: f64,
    pub production_value: ProductionValue,
    pub efficiency_discount: f64,
    /// Round production cost and sell price to whole credits.
    pub round_prices: bool,
    pub sell_markup: f64,
    pub advertising_price_bonus: f64,
    pub influence_price_bonus: f64,
    pub base_demand: f64,
    pub demand_growth: f64,
    /// Upper bound on demand; `None` lets demand grow without limit.
    pub demand_cap: Option<f64>,
    pub sell_chance_cap: f64,
    pub influence_chance_bonus: f64,
    pub base_sale_interval: f64,
    pub logistics_interval_decay: f64,
    /// Speed levels per extra guaranteed unit.
    pub output_step: u32,
    /// Bonus output chance in percent per speed level.
    pub bonus_output_per_level: f64,
    /// Advertising levels per extra guaranteed sale attempt.
    pub sales_step: u32,
    /// Bonus sale chance in percent per advertising level.
    pub bonus_sale_per_level: f64,
    /// Bonus sale chance in percent per influence point.
    pub bonus_sale_per_influence: f64,
    pub sale_mode: SaleMode,
    pub timer_reset: TimerReset,
    /// Upgrade tracks the variant offers.
    pub upgrades: BTreeMap<UpgradeKind, CostCurve>,
    pub autosave_interval_secs: f64,
    pub prestige: Option<PrestigeConfig>,
}

impl EconomyConfig {
    /// The richest variant: scaling value, milestones and prestige.
    pub fn industries() -> Self {
        Self {
            name: "DDC Industries".to_string(),
            save_key: "ddcIndustriesSave".to_string(),
            starting_credits: 1000.0,
            base_production_time: 7.0,
            speed_time_decay: 0.98,
            production_value: ProductionValue::Scaling {
                base: 50.0,
                growth: 1.12,
                include_influence: true,
            },
            efficiency_discount: 0.995,
            round_prices: true,
            sell_markup: 1.55,
            advertising_price_bonus: 0.002,
            influence_price_bonus: 0.003,
            base_demand: 45.0,
            demand_growth: 1.025,
            demand_cap: Some(95.0),
            sell_chance_cap: 0.99,
            influence_chance_bonus: 0.002,
            base_sale_interval: 4.0,
            logistics_interval_decay: 0.99,
            output_step: 12,
            bonus_output_per_level: 0.5,
            sales_step: 10,
            bonus_sale_per_level: 0.35,
            bonus_sale_per_influence: 0.25,
            sale_mode: SaleMode::MultiAttempt,
            timer_reset: TimerReset::Zero,
            upgrades: BTreeMap::from([
                (UpgradeKind::Speed, CostCurve::new(50.0, 1.85)),
                (UpgradeKind::Efficiency, CostCurve::new(120.0, 1.7)),
                (UpgradeKind::Advertising, CostCurve::new(200.0, 1.55)),
                (UpgradeKind::Logistics, CostCurve::new(100.0, 1.4)),
            ]),
            autosave_interval_secs: 5.0,
            prestige: Some(PrestigeConfig {
                sold_divisor: 50.0,
                milestones: vec![
                    Milestone::new(100, "Market recognition achieved."),
                    Milestone::new(500, "Demand surging across the club."),
                    Milestone::new(1000, "Regional dominance established."),
                    Milestone::new(5000, "Brand reputation skyrocketing."),
                    Milestone::new(10000, "Market domination achieved."),
                ],
            }),
        }
    }

    /// Tiered value, capped demand, multi-attempt sales.
    pub fn workshop() -> Self {
        Self {
            name: "DDC Workshop".to_string(),
            save_key: "ddcWorkshopSave".to_string(),
            starting_credits: 100.0,
            base_production_time: 5.0,
            speed_time_decay: 0.98,
            production_value: ProductionValue::Tiered {
                base: 8.0,
                growth: 1.55,
            },
            efficiency_discount: 0.995,
            round_prices: true,
            sell_markup: 1.6,
            advertising_price_bonus: 0.002,
            influence_price_bonus: 0.0,
            base_demand: 40.0,
            demand_growth: 1.03,
            demand_cap: Some(95.0),
            sell_chance_cap: 0.99,
            influence_chance_bonus: 0.0,
            base_sale_interval: 3.0,
            logistics_interval_decay: 0.99,
            output_step: 12,
            bonus_output_per_level: 0.5,
            sales_step: 10,
            bonus_sale_per_level: 0.35,
            bonus_sale_per_influence: 0.0,
            sale_mode: SaleMode::MultiAttempt,
            timer_reset: TimerReset::Carry,
            upgrades: BTreeMap::from([
                (UpgradeKind::Speed, CostCurve::new(25.0, 1.8)),
                (UpgradeKind::Advertising, CostCurve::new(60.0, 1.6)),
                (UpgradeKind::Logistics, CostCurve::new(40.0, 1.45)),
                (UpgradeKind::Tier, CostCurve::new(150.0, 2.2)),
            ]),
            autosave_interval_secs: 5.0,
            prestige: None,
        }
    }

    /// Tiered value, uncapped demand, per-unit sales.
    pub fn garage() -> Self {
        Self {
            name: "DDC Garage".to_string(),
            save_key: "ddcGarageSave".to_string(),
            starting_credits: 50.0,
            base_production_time: 6.0,
            speed_time_decay: 0.98,
            production_value: ProductionValue::Tiered {
                base: 8.0,
                growth: 1.55,
            },
            efficiency_discount: 0.995,
            round_prices: false,
            sell_markup: 1.5,
            advertising_price_bonus: 0.002,
            influence_price_bonus: 0.0,
            base_demand: 35.0,
            demand_growth: 1.04,
            demand_cap: None,
            sell_chance_cap: 0.99,
            influence_chance_bonus: 0.0,
            base_sale_interval: 5.0,
            logistics_interval_decay: 0.99,
            output_step: 12,
            bonus_output_per_level: 0.5,
            sales_step: 10,
            bonus_sale_per_level: 0.0,
            bonus_sale_per_influence: 0.0,
            sale_mode: SaleMode::PerUnit,
            timer_reset: TimerReset::Carry,
            upgrades: BTreeMap::from([
                (UpgradeKind::Speed, CostCurve::new(20.0, 1.75)),
                (UpgradeKind::Efficiency, CostCurve::new(45.0, 1.7)),
                (UpgradeKind::Advertising, CostCurve::new(50.0, 1.6)),
                (UpgradeKind::Tier, CostCurve::new(120.0, 2.3)),
            ]),
            autosave_interval_secs: 5.0,
            prestige: None,
        }
    }

    /// Look up a built-in variant by name.
    pub fn preset(name: &str) -> Result<Self, ValidationError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "industries" => Ok(Self::industries()),
            "workshop" => Ok(Self::workshop()),
            "garage" => Ok(Self::garage()),
            other => Err(ValidationError::UnknownPreset(other.to_string())),
        }
    }

    /// Cost curve of an offered upgrade track.
    pub fn upgrade_curve(&self, kind: UpgradeKind) -> Option<&CostCurve> {
        self.upgrades.get(&kind)
    }

    /// Milestone table, empty for variants without prestige.
    pub fn milestones(&self) -> &[Milestone] {
        self.prestige
            .as_ref()
            .map(|p| p.milestones.as_slice())
            .unwrap_or(&[])
    }
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self::industries()
    }
}

/// Names accepted by [`EconomyConfig::preset`].
pub const PRESET_NAMES: [&str; 3] = ["industries", "workshop", "garage"];

/// Validation errors for domain invariants.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// Numeric field must be finite.
    #[error("non-finite value for {0}")]
    NonFinite(&'static str),
    /// Field must be strictly positive.
    #[error("{0} must be > 0")]
    NonPositive(&'static str),
    /// Decay factor must lie in (0, 1].
    #[error("{0} must be within (0, 1]")]
    InvalidDecay(&'static str),
    /// Growth factor must be > 1 so costs strictly increase.
    #[error("cost growth for {0} must be > 1")]
    NonIncreasingCost(UpgradeKind),
    /// Probability cap must lie in (0, 1].
    #[error("sell chance cap must be within (0, 1]")]
    InvalidChanceCap,
    /// Milestone thresholds must be strictly increasing.
    #[error("milestone thresholds must be strictly increasing (at index {0})")]
    MilestoneOrder(usize),
    /// Milestone index past the end of the table.
    #[error("milestone index {index} exceeds table length {len}")]
    MilestoneIndexOutOfRange { index: usize, len: usize },
    /// Negative balance.
    #[error("credits must be >= 0")]
    NegativeCredits,
    #[error("unknown upgrade kind: {0}")]
    UnknownUpgrade(String),
    #[error("unknown preset: {0}")]
    UnknownPreset(String),
}

fn finite_positive(v: f64, field: &'static str) -> Result<(), ValidationError> {
    if !v.is_finite() {
        return Err(ValidationError::NonFinite(field));
    }
    if v <= 0.0 {
        return Err(ValidationError::NonPositive(field));
    }
    Ok(())
}

fn decay(v: f64, field: &'static str) -> Result<(), ValidationError> {
    if !v.is_finite() {
        return Err(ValidationError::NonFinite(field));
    }
    if v <= 0.0 || v > 1.0 {
        return Err(ValidationError::InvalidDecay(field));
    }
    Ok(())
}

/// Validate a variant configuration before running it.
pub fn validate_config(cfg: &EconomyConfig) -> Result<(), ValidationError> {
    if !cfg.starting_credits.is_finite() {
        return Err(ValidationError::NonFinite("starting_credits"));
    }
    if cfg.starting_credits < 0.0 {
        return Err(ValidationError::NegativeCredits);
    }
    finite_positive(cfg.base_production_time, "base_production_time")?;
    finite_positive(cfg.base_sale_interval, "base_sale_interval")?;
    finite_positive(cfg.base_demand, "base_demand")?;
    finite_positive(cfg.sell_markup, "sell_markup")?;
    finite_positive(cfg.autosave_interval_secs, "autosave_interval_secs")?;
    finite_positive(cfg.demand_growth, "demand_growth")?;
    decay(cfg.speed_time_decay, "speed_time_decay")?;
    decay(cfg.efficiency_discount, "efficiency_discount")?;
    decay(cfg.logistics_interval_decay, "logistics_interval_decay")?;
    match cfg.production_value {
        ProductionValue::Scaling { base, growth, .. }
        | ProductionValue::Tiered { base, growth } => {
            finite_positive(base, "production_value.base")?;
            finite_positive(growth, "production_value.growth")?;
        }
    }
    if let Some(cap) = cfg.demand_cap {
        finite_positive(cap, "demand_cap")?;
    }
    if !(cfg.sell_chance_cap > 0.0 && cfg.sell_chance_cap <= 1.0) {
        return Err(ValidationError::InvalidChanceCap);
    }
    if cfg.output_step == 0 {
        return Err(ValidationError::NonPositive("output_step"));
    }
    if cfg.sales_step == 0 {
        return Err(ValidationError::NonPositive("sales_step"));
    }
    for (kind, curve) in &cfg.upgrades {
        finite_positive(curve.base, "upgrade base cost")?;
        if !curve.growth.is_finite() {
            return Err(ValidationError::NonFinite("upgrade growth"));
        }
        if curve.growth <= 1.0 {
            return Err(ValidationError::NonIncreasingCost(*kind));
        }
    }
    if let Some(p) = &cfg.prestige {
        finite_positive(p.sold_divisor, "prestige.sold_divisor")?;
        for (i, pair) in p.milestones.windows(2).enumerate() {
            if pair[1].sold <= pair[0].sold {
                return Err(ValidationError::MilestoneOrder(i + 1));
            }
        }
    }
    Ok(())
}

/// Validate a state against its variant.
pub fn validate_state(state: &GameState, cfg: &EconomyConfig) -> Result<(), ValidationError> {
    if !state.credits.is_finite() {
        return Err(ValidationError::NonFinite("credits"));
    }
    if state.credits < 0.0 {
        return Err(ValidationError::NegativeCredits);
    }
    if !(state.production_timer.is_finite() && state.sale_timer.is_finite()) {
        return Err(ValidationError::NonFinite("timer"));
    }
    let len = cfg.milestones().len();
    if state.milestone_index > len {
        return Err(ValidationError::MilestoneIndexOutOfRange {
            index: state.milestone_index,
            len,
        });
    }
    Ok(())
}
