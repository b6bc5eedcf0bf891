#![deny(warnings)]

//! Economic models: pricing, yield and demand formulas for DDC Industries.
//!
//! Every function here is a pure mapping from `(GameState, EconomyConfig)`
//! to a number. The only randomness lives in [`trial`], which takes the
//! generator as a parameter.

use rand::Rng;
use serde::{Deserialize, Serialize};
use sim_core::{EconomyConfig, GameState, ProductionValue, UpgradeKind};

fn round_if(cfg: &EconomyConfig, v: f64) -> f64 {
    if cfg.round_prices {
        v.round()
    } else {
        v
    }
}

/// Seconds per production cycle: `base * decay^speed_level`.
pub fn production_time(state: &GameState, cfg: &EconomyConfig) -> f64 {
    cfg.base_production_time * cfg.speed_time_decay.powf(f64::from(state.speed_level))
}

/// Unrounded value of one unit before efficiency and markup.
pub fn base_production_value(state: &GameState, cfg: &EconomyConfig) -> f64 {
    match cfg.production_value {
        ProductionValue::Scaling {
            base,
            growth,
            include_influence,
        } => {
            let mut exp = f64::from(state.speed_level);
            if include_influence {
                exp += state.influence as f64;
            }
            base * growth.powf(exp)
        }
        ProductionValue::Tiered { base, growth } => base * growth.powf(f64::from(state.tier)),
    }
}

/// Credits spent per production cycle.
pub fn production_cost(state: &GameState, cfg: &EconomyConfig) -> f64 {
    let discounted = base_production_value(state, cfg)
        * cfg
            .efficiency_discount
            .powf(f64::from(state.efficiency_level));
    round_if(cfg, discounted)
}

/// Credits earned per unit sold.
pub fn sell_price(state: &GameState, cfg: &EconomyConfig) -> f64 {
    let price = base_production_value(state, cfg)
        * cfg.sell_markup
        * (1.0 + f64::from(state.advertising_level) * cfg.advertising_price_bonus)
        * (1.0 + state.influence as f64 * cfg.influence_price_bonus);
    round_if(cfg, price)
}

/// Margin per unit; negative when production costs more than it sells for.
pub fn profit_per_item(state: &GameState, cfg: &EconomyConfig) -> f64 {
    sell_price(state, cfg) - production_cost(state, cfg)
}

/// Fraction of the base value the efficiency track has shaved off, in [0,1).
pub fn efficiency_reduction(state: &GameState, cfg: &EconomyConfig) -> f64 {
    1.0 - cfg
        .efficiency_discount
        .powf(f64::from(state.efficiency_level))
}

/// Market demand in percent, capped where the variant has a cap.
pub fn demand(state: &GameState, cfg: &EconomyConfig) -> f64 {
    let raw = cfg.base_demand * cfg.demand_growth.powf(f64::from(state.advertising_level));
    match cfg.demand_cap {
        Some(cap) => raw.min(cap),
        None => raw,
    }
}

/// Probability that one sale trial succeeds, clamped to the variant's cap.
pub fn sell_chance(state: &GameState, cfg: &EconomyConfig) -> f64 {
    let chance = demand(state, cfg) / 100.0 + state.influence as f64 * cfg.influence_chance_bonus;
    chance.min(cfg.sell_chance_cap)
}

/// Seconds between sale rounds.
pub fn sale_interval(state: &GameState, cfg: &EconomyConfig) -> f64 {
    cfg.base_sale_interval
        * cfg
            .logistics_interval_decay
            .powf(f64::from(state.logistics_level))
}

/// Units produced per successful cycle before the bonus trial.
pub fn guaranteed_output(state: &GameState, cfg: &EconomyConfig) -> u64 {
    1 + u64::from(state.speed_level / cfg.output_step)
}

/// Chance in percent of one extra unit per cycle.
pub fn bonus_output_chance(state: &GameState, cfg: &EconomyConfig) -> f64 {
    f64::from(state.speed_level) * cfg.bonus_output_per_level
}

/// Sale attempts per round before the bonus trial.
pub fn guaranteed_sales(state: &GameState, cfg: &EconomyConfig) -> u64 {
    1 + u64::from(state.advertising_level / cfg.sales_step)
}

/// Chance in percent of one extra sale attempt per round.
pub fn bonus_sale_chance(state: &GameState, cfg: &EconomyConfig) -> f64 {
    f64::from(state.advertising_level) * cfg.bonus_sale_per_level
        + state.influence as f64 * cfg.bonus_sale_per_influence
}

/// Price of the next level of `kind`, or `None` if the variant does not offer it.
pub fn upgrade_cost(state: &GameState, cfg: &EconomyConfig, kind: UpgradeKind) -> Option<f64> {
    cfg.upgrade_curve(kind)
        .map(|curve| curve.cost_at(state.level(kind)))
}

/// Influence a prestige would grant right now; 0 without prestige support.
pub fn prestige_gain(state: &GameState, cfg: &EconomyConfig) -> u64 {
    match &cfg.prestige {
        Some(p) => (state.lifetime_sold as f64 / p.sold_divisor).sqrt().floor() as u64,
        None => 0,
    }
}

/// Lifetime sales still needed before the prestige gain grows by one.
pub fn next_influence_remaining(state: &GameState, cfg: &EconomyConfig) -> u64 {
    match &cfg.prestige {
        Some(p) => {
            let next = prestige_gain(state, cfg) + 1;
            let target = (next * next) as f64 * p.sold_divisor;
            (target - state.lifetime_sold as f64).max(0.0).ceil() as u64
        }
        None => 0,
    }
}

/// Phase progress in percent for display, clamped to 100.
pub fn progress_percent(timer: f64, threshold: f64) -> f64 {
    if threshold <= 0.0 {
        return 100.0;
    }
    (timer / threshold * 100.0).clamp(0.0, 100.0)
}

/// One Bernoulli draw: succeeds when a uniform draw in [0,1) is below `probability`.
pub fn trial<R: Rng + ?Sized>(rng: &mut R, probability: f64) -> bool {
    rng.gen::<f64>() < probability
}

/// Headline describing the market, first matching rule wins.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketMood {
    DemandSurging,
    MarketHungry,
    ProfitsBooming,
    CustomersHooked,
    Stable,
}

impl MarketMood {
    pub fn text(&self) -> &'static str {
        match self {
            MarketMood::DemandSurging => "Demand surging.",
            MarketMood::MarketHungry => "Market hungry.",
            MarketMood::ProfitsBooming => "Profits booming.",
            MarketMood::CustomersHooked => "Customers can't get enough.",
            MarketMood::Stable => "Market stable.",
        }
    }
}

pub fn market_mood(state: &GameState, cfg: &EconomyConfig) -> MarketMood {
    if demand(state, cfg) > 80.0 {
        MarketMood::DemandSurging
    } else if state.inventory == 0 {
        MarketMood::MarketHungry
    } else if state.credits > 100_000.0 {
        MarketMood::ProfitsBooming
    } else if sell_chance(state, cfg) > 0.95 {
        MarketMood::CustomersHooked
    } else {
        MarketMood::Stable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::mock::StepRng;

    fn fresh() -> (GameState, EconomyConfig) {
        let cfg = EconomyConfig::industries();
        (GameState::new(&cfg), cfg)
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn base_values_at_level_zero() {
        let (s, cfg) = fresh();
        assert!(close(production_time(&s, &cfg), 7.0));
        assert_eq!(production_cost(&s, &cfg), 50.0);
        // 50 * 1.55 = 77.5 rounds half up
        assert_eq!(sell_price(&s, &cfg), 78.0);
        assert_eq!(profit_per_item(&s, &cfg), 28.0);
        assert!(close(demand(&s, &cfg), 45.0));
        assert!(close(sell_chance(&s, &cfg), 0.45));
        assert!(close(sale_interval(&s, &cfg), 4.0));
        assert_eq!(guaranteed_output(&s, &cfg), 1);
        assert_eq!(guaranteed_sales(&s, &cfg), 1);
        assert_eq!(bonus_output_chance(&s, &cfg), 0.0);
        assert_eq!(bonus_sale_chance(&s, &cfg), 0.0);
        assert_eq!(prestige_gain(&s, &cfg), 0);
        assert_eq!(next_influence_remaining(&s, &cfg), 50);
    }

    #[test]
    fn upgrade_costs_follow_curves() {
        let (mut s, cfg) = fresh();
        assert_eq!(upgrade_cost(&s, &cfg, UpgradeKind::Speed), Some(50.0));
        assert_eq!(upgrade_cost(&s, &cfg, UpgradeKind::Efficiency), Some(120.0));
        assert_eq!(upgrade_cost(&s, &cfg, UpgradeKind::Advertising), Some(200.0));
        assert_eq!(upgrade_cost(&s, &cfg, UpgradeKind::Logistics), Some(100.0));
        assert_eq!(upgrade_cost(&s, &cfg, UpgradeKind::Tier), None);
        s.speed_level = 2;
        let c = upgrade_cost(&s, &cfg, UpgradeKind::Speed).unwrap();
        assert!(close(c, 50.0 * 1.85 * 1.85));
    }

    #[test]
    fn step_bonuses() {
        let (mut s, cfg) = fresh();
        s.speed_level = 12;
        s.advertising_level = 25;
        s.influence = 4;
        assert_eq!(guaranteed_output(&s, &cfg), 2);
        assert!(close(bonus_output_chance(&s, &cfg), 6.0));
        assert_eq!(guaranteed_sales(&s, &cfg), 3);
        assert!(close(bonus_sale_chance(&s, &cfg), 25.0 * 0.35 + 4.0 * 0.25));
    }

    #[test]
    fn influence_raises_value_price_and_chance() {
        let (mut s, cfg) = fresh();
        let before = (production_cost(&s, &cfg), sell_price(&s, &cfg), sell_chance(&s, &cfg));
        s.influence = 3;
        assert!(production_cost(&s, &cfg) > before.0);
        assert!(sell_price(&s, &cfg) > before.1);
        assert!(sell_chance(&s, &cfg) > before.2);
    }

    #[test]
    fn tiered_value_uses_tier_only() {
        let cfg = EconomyConfig::workshop();
        let mut s = GameState::new(&cfg);
        assert_eq!(production_cost(&s, &cfg), 8.0);
        s.speed_level = 10;
        assert_eq!(production_cost(&s, &cfg), 8.0);
        s.tier = 2;
        assert_eq!(production_cost(&s, &cfg), (8.0f64 * 1.55 * 1.55).round());
    }

    #[test]
    fn garage_keeps_fractional_prices() {
        let cfg = EconomyConfig::garage();
        let s = GameState::new(&cfg);
        assert!(close(sell_price(&s, &cfg), 12.0));
        let mut s = s;
        s.efficiency_level = 1;
        assert!(close(production_cost(&s, &cfg), 8.0 * 0.995));
    }

    #[test]
    fn uncapped_demand_grows_past_95() {
        let cfg = EconomyConfig::garage();
        let mut s = GameState::new(&cfg);
        s.advertising_level = 60;
        assert!(demand(&s, &cfg) > 95.0);
        assert!(close(sell_chance(&s, &cfg), 0.99));
    }

    #[test]
    fn prestige_gain_and_next_target() {
        let (mut s, cfg) = fresh();
        s.lifetime_sold = 50;
        assert_eq!(prestige_gain(&s, &cfg), 1);
        assert_eq!(next_influence_remaining(&s, &cfg), 150);
        s.lifetime_sold = 449;
        assert_eq!(prestige_gain(&s, &cfg), 2);
        assert_eq!(next_influence_remaining(&s, &cfg), 1);
        let garage = EconomyConfig::garage();
        assert_eq!(prestige_gain(&s, &garage), 0);
    }

    #[test]
    fn progress_is_clamped() {
        assert_eq!(progress_percent(2.0, 4.0), 50.0);
        assert_eq!(progress_percent(9.0, 4.0), 100.0);
        assert_eq!(progress_percent(0.0, 4.0), 0.0);
    }

    #[test]
    fn trial_with_forced_draws() {
        let mut zero = StepRng::new(0, 0);
        assert!(trial(&mut zero, 0.01));
        assert!(!trial(&mut zero, 0.0));
        let mut top = StepRng::new(u64::MAX, 0);
        assert!(!trial(&mut top, 0.99));
        assert!(trial(&mut top, 1.0));
    }

    #[test]
    fn mood_priorities() {
        let (mut s, cfg) = fresh();
        assert_eq!(market_mood(&s, &cfg), MarketMood::MarketHungry);
        s.inventory = 3;
        assert_eq!(market_mood(&s, &cfg), MarketMood::Stable);
        s.credits = 200_000.0;
        assert_eq!(market_mood(&s, &cfg), MarketMood::ProfitsBooming);
        s.advertising_level = 40;
        assert_eq!(market_mood(&s, &cfg), MarketMood::DemandSurging);
        assert_eq!(MarketMood::DemandSurging.text(), "Demand surging.");
    }

    proptest! {
        #[test]
        fn upgrade_costs_strictly_increase(level in 0u32..80) {
            let cfg = EconomyConfig::industries();
            let mut s = GameState::new(&cfg);
            for kind in UpgradeKind::ALL {
                if cfg.upgrade_curve(kind).is_none() {
                    continue;
                }
                *s.level_mut(kind) = level;
                let low = upgrade_cost(&s, &cfg, kind).unwrap();
                *s.level_mut(kind) = level + 1;
                let high = upgrade_cost(&s, &cfg, kind).unwrap();
                prop_assert!(high > low);
            }
        }

        #[test]
        fn caps_hold(adv in 0u32..500, influence in 0u64..1_000) {
            let cfg = EconomyConfig::industries();
            let mut s = GameState::new(&cfg);
            s.advertising_level = adv;
            s.influence = influence;
            prop_assert!(demand(&s, &cfg) <= 95.0);
            prop_assert!(sell_chance(&s, &cfg) <= 0.99);
        }

        #[test]
        fn production_time_shrinks_with_speed(speed in 0u32..200) {
            let cfg = EconomyConfig::industries();
            let mut s = GameState::new(&cfg);
            s.speed_level = speed;
            let t0 = production_time(&s, &cfg);
            s.speed_level = speed + 1;
            prop_assert!(production_time(&s, &cfg) < t0);
            prop_assert!(production_time(&s, &cfg) > 0.0);
        }
    }
}
