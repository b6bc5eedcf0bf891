#![deny(warnings)]

//! Headless HUD: an ECS schedule drives a game session and renders the
//! readouts a player would see, one frame at a time.

use anyhow::Result;
use bevy_ecs::prelude::*;
use persistence::MemoryStore;
use sim_core::{EconomyConfig, UpgradeKind};
use sim_runtime::{PrestigeOutcome, Session, SimSnapshot, UpgradeOutcome};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Resource)]
struct Game(Session<MemoryStore>);

/// Seconds fed to the next frame.
#[derive(Resource)]
struct FrameDelta(f64);

/// Player input queued between frames.
#[allow(dead_code)] // constructed only by tests until input wiring lands
#[derive(Clone, Copy, Debug, PartialEq)]
enum Action {
    Buy(UpgradeKind),
    Prestige,
}

#[derive(Resource, Default)]
struct PendingActions(Vec<Action>);

#[derive(Resource, Default)]
struct HudState {
    frames: u64,
    lines: Vec<String>,
    last_event: String,
}

/// Whole-number display with K/M/B suffixes above a thousand.
fn format_number(num: f64) -> String {
    if num >= 1e9 {
        format!("{:.2}B", num / 1e9)
    } else if num >= 1e6 {
        format!("{:.2}M", num / 1e6)
    } else if num >= 1e3 {
        format!("{:.2}K", num / 1e3)
    } else {
        format!("{}", num.floor() as i64)
    }
}

/// Like [`format_number`] but keeps precision for values below one.
fn format_small_number(num: f64) -> String {
    if num >= 1e3 {
        format_number(num)
    } else if num >= 1.0 {
        format!("{num:.2}")
    } else if num > 0.001 {
        format!("{num:.4}")
    } else if num > 0.0 {
        format!("{num:.2e}")
    } else {
        "0.0000".to_string()
    }
}

fn progress_bar(percent: f64) -> String {
    let filled = (percent / 5.0).round().clamp(0.0, 20.0) as usize;
    format!(
        "[{}{}] {:>3.0}%",
        "#".repeat(filled),
        ".".repeat(20 - filled),
        percent
    )
}

fn apply_actions_system(
    mut game: ResMut<Game>,
    mut pending: ResMut<PendingActions>,
    mut hud: ResMut<HudState>,
) {
    for action in pending.0.drain(..) {
        hud.last_event = match action {
            Action::Buy(kind) => match game.0.purchase(kind) {
                UpgradeOutcome::Purchased { kind, level, .. } => {
                    format!("Bought {kind} {level}.")
                }
                UpgradeOutcome::InsufficientFunds { kind, .. } => {
                    format!("Not enough credits for {kind}.")
                }
                UpgradeOutcome::Unavailable { kind } => format!("No {kind} upgrade here."),
            },
            Action::Prestige => match game.0.prestige() {
                PrestigeOutcome::Prestiged { gain, .. } => format!("Prestige! +{gain} influence."),
                PrestigeOutcome::NothingToGain => "Not enough sales to prestige.".to_string(),
                PrestigeOutcome::Unavailable => "No prestige here.".to_string(),
            },
        };
    }
}

fn advance_system(mut game: ResMut<Game>, delta: Res<FrameDelta>, mut hud: ResMut<HudState>) {
    let report = game.0.frame(delta.0);
    hud.frames += 1;
    if let Some(text) = report.tick.milestones().last() {
        hud.last_event = text.to_string();
    }
}

fn render_hud_system(game: Res<Game>, mut hud: ResMut<HudState>) {
    hud.lines = render_lines(&game.0.snapshot());
}

fn render_lines(snap: &SimSnapshot) -> Vec<String> {
    let s = &snap.state;
    let mut lines = vec![
        format!("== {} ==", snap.variant),
        format!("Credits: {}", format_number(s.credits)),
        format!("Inventory: {}", format_number(s.inventory as f64)),
        format!("Items sold: {}", format_number(s.items_sold as f64)),
        format!("Demand: {}", format_number(snap.demand)),
        format!("Production cost: {}", format_number(snap.production_cost)),
        format!("Sell price: {}", format_number(snap.sell_price)),
        format!("Profit/item: {}", format_number(snap.profit_per_item)),
        format!("Production time: {:.2}", snap.production_time),
        format!("Efficiency: {:.1}%", snap.efficiency_reduction * 100.0),
        format!("Sale interval: {:.2}", snap.sale_interval),
        format!(
            "Output: {} (+{:.1}%)",
            format_number(snap.guaranteed_output as f64),
            snap.bonus_output_chance
        ),
        format!(
            "Sale capacity: {} (+{:.1}%)",
            snap.guaranteed_sales, snap.bonus_sale_chance
        ),
        format!("Sell chance: {}", format_small_number(snap.sell_chance)),
        format!("Influence: {}", s.influence),
        format!("Prestige gain: {}", snap.prestige_gain),
        format!(
            "Next influence: {}",
            format_number(snap.next_influence_remaining as f64)
        ),
        format!("Produce {}", progress_bar(snap.production_progress)),
        format!("Sell    {}", progress_bar(snap.sale_progress)),
        snap.market_mood.text().to_string(),
    ];
    for quote in &snap.upgrades {
        lines.push(format!(
            "{} {}: Upgrade ({})",
            quote.kind,
            quote.level,
            format_number(quote.cost)
        ));
    }
    lines
}

fn build_world(session: Session<MemoryStore>, fps: u32) -> (World, Schedule) {
    let mut world = World::new();
    world.insert_resource(Game(session));
    world.insert_resource(FrameDelta(1.0 / f64::from(fps.max(1))));
    world.insert_resource(PendingActions::default());
    world.insert_resource(HudState::default());
    let mut schedule = Schedule::default();
    schedule.add_systems((apply_actions_system, advance_system, render_hud_system).chain());
    (world, schedule)
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let preset = std::env::args().nth(1).unwrap_or_else(|| "industries".to_string());
    let cfg = EconomyConfig::preset(&preset)?;
    let (mut world, mut schedule) =
        build_world(Session::open(cfg, MemoryStore::new(), 42), 60);
    // one simulated minute, no run loop
    for _ in 0..60 * 60 {
        schedule.run(&mut world);
    }
    let hud = world.resource::<HudState>();
    info!(frames = hud.frames, "headless run finished");
    for line in &hud.lines {
        println!("{line}");
    }
    if !hud.last_event.is_empty() {
        println!("> {}", hud.last_event);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_core::GameState;

    fn world_for(cfg: EconomyConfig) -> (World, Schedule) {
        build_world(Session::open(cfg, MemoryStore::new(), 7), 60)
    }

    #[test]
    fn number_formatting() {
        assert_eq!(format_number(999.7), "999");
        assert_eq!(format_number(1_500.0), "1.50K");
        assert_eq!(format_number(2_500_000.0), "2.50M");
        assert_eq!(format_number(3e9), "3.00B");
        assert_eq!(format_number(-2.5), "-3");
        assert_eq!(format_small_number(0.45), "0.4500");
        assert_eq!(format_small_number(12.5), "12.50");
        assert_eq!(format_small_number(0.0), "0.0000");
        assert_eq!(format_small_number(0.0005), "5.00e-4");
    }

    #[test]
    fn progress_bar_is_clamped() {
        assert!(progress_bar(0.0).starts_with(&format!("[{}]", ".".repeat(20))));
        assert!(progress_bar(100.0).starts_with("[####################]"));
        assert!(progress_bar(250.0).starts_with("[####################]"));
    }

    #[test]
    fn schedule_advances_and_renders() {
        let (mut world, mut schedule) = world_for(EconomyConfig::industries());
        for _ in 0..10 {
            schedule.run(&mut world);
        }
        let hud = world.resource::<HudState>();
        assert_eq!(hud.frames, 10);
        assert_eq!(hud.lines[0], "== DDC Industries ==");
        assert!(hud.lines.contains(&"Credits: 1.00K".to_string()));
        assert!(hud.lines.iter().any(|l| l == "speed 0: Upgrade (50)"));
        let session = &world.resource::<Game>().0;
        assert!(session.state().production_timer > 0.0);
    }

    #[test]
    fn queued_purchase_applies_before_the_frame() {
        let (mut world, mut schedule) = world_for(EconomyConfig::industries());
        world
            .resource_mut::<PendingActions>()
            .0
            .extend([Action::Buy(UpgradeKind::Speed), Action::Buy(UpgradeKind::Tier)]);
        schedule.run(&mut world);
        assert!(world.resource::<PendingActions>().0.is_empty());
        assert_eq!(world.resource::<HudState>().last_event, "No tier upgrade here.");
        let state = world.resource::<Game>().0.state().clone();
        assert_eq!(state.speed_level, 1);
        assert_eq!(state.credits, 950.0);
    }

    #[test]
    fn prestige_reports_gain() {
        let cfg = EconomyConfig::industries();
        let mut state = GameState::new(&cfg);
        state.lifetime_sold = 800;
        let (mut world, mut schedule) =
            build_world(Session::with_state(cfg, state, MemoryStore::new(), 1), 60);
        world.resource_mut::<PendingActions>().0.push(Action::Prestige);
        schedule.run(&mut world);
        assert_eq!(world.resource::<HudState>().last_event, "Prestige! +4 influence.");
        assert!(world
            .resource::<HudState>()
            .lines
            .contains(&"Influence: 4".to_string()));
    }

    #[test]
    fn milestone_text_becomes_last_event() {
        let cfg = EconomyConfig::industries();
        let mut state = GameState::new(&cfg);
        state.lifetime_sold = 99;
        state.inventory = 50;
        state.advertising_level = 40;
        let (mut world, mut schedule) =
            build_world(Session::with_state(cfg, state, MemoryStore::new(), 3), 60);
        for _ in 0..60 * 60 {
            schedule.run(&mut world);
        }
        assert_eq!(
            world.resource::<HudState>().last_event,
            "Market recognition achieved."
        );
    }

    #[test]
    fn garage_has_no_prestige() {
        let (mut world, mut schedule) = world_for(EconomyConfig::garage());
        world.resource_mut::<PendingActions>().0.push(Action::Prestige);
        schedule.run(&mut world);
        assert_eq!(world.resource::<HudState>().last_event, "No prestige here.");
    }
}
