#![deny(warnings)]

//! `ddc`: headless runner for the DDC idle economy.
//!
//! Simulates variants at a fixed frame rate, plays them in real time against
//! a save directory, and applies single player actions to a save.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use persistence::{FileStore, MemoryStore, SaveStore};
use serde::Serialize;
use sim_ai::Policy;
use sim_core::{validate_config, EconomyConfig, UpgradeKind, PRESET_NAMES};
use sim_runtime::{FrameClock, PrestigeOutcome, Session, SimEvent, SimSnapshot, UpgradeOutcome};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_SHA"),
    ", built ",
    env!("BUILD_DATE"),
    ")"
);

#[derive(Debug, Parser)]
#[command(name = "ddc", version, long_version = LONG_VERSION)]
#[command(about = "Run, inspect and play the DDC idle economy from the terminal")]
struct Cli {
    /// Built-in economy variant (industries, workshop, garage)
    #[arg(long, global = true, default_value = "industries")]
    preset: String,

    /// YAML economy config; takes precedence over --preset
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding save files
    #[arg(long, global = true)]
    save_dir: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fixed-step simulation; in memory unless --save-dir is given
    Simulate {
        /// Simulated seconds
        #[arg(long, default_value_t = 3600.0)]
        seconds: f64,
        /// Frames per simulated second
        #[arg(long, default_value_t = 60)]
        fps: u32,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Autopilot: hold, cheapest or best-return
        #[arg(long, default_value_t = Policy::BestReturn)]
        policy: Policy,
        /// Prestige whenever it would grant at least this much influence
        #[arg(long)]
        prestige_at: Option<u64>,
    },
    /// Play the saved game in real time at about 60 frames per second
    Run {
        #[arg(long, default_value_t = 60.0)]
        seconds: f64,
        /// Random seed; defaults to the current time
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Print the saved game
    Show,
    /// Buy one level of an upgrade in the saved game
    Buy { kind: UpgradeKind },
    /// Trade lifetime sales for influence in the saved game
    Prestige,
    /// Delete the saved game, influence included
    Reset {
        /// Confirm the wipe
        #[arg(long)]
        yes: bool,
    },
    /// Print the selected economy config as YAML
    Presets,
}

fn load_config(cli: &Cli) -> Result<EconomyConfig> {
    let cfg = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_yaml::from_str::<EconomyConfig>(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => EconomyConfig::preset(&cli.preset)?,
    };
    validate_config(&cfg).context("invalid economy config")?;
    Ok(cfg)
}

fn file_store(cli: &Cli) -> FileStore {
    let store = FileStore::new(
        cli.save_dir
            .clone()
            .unwrap_or_else(persistence::default_save_dir),
    );
    info!(dir = %store.dir().display(), "using save directory");
    store
}

struct SimOptions {
    seconds: f64,
    fps: u32,
    policy: Policy,
    prestige_at: Option<u64>,
}

#[derive(Debug, Default, Serialize)]
struct RunSummary {
    variant: String,
    policy: String,
    seconds: f64,
    frames: u64,
    produced: u64,
    sold: u64,
    earnings: f64,
    stalled_cycles: u64,
    purchases: u64,
    prestiges: u64,
    milestones: Vec<String>,
    autosaves: u64,
}

impl RunSummary {
    fn record(&mut self, events: &[SimEvent]) {
        for event in events {
            match event {
                SimEvent::Produced { units, .. } => self.produced += units,
                SimEvent::ProductionStalled { .. } => self.stalled_cycles += 1,
                SimEvent::Sold { units, earnings } => {
                    self.sold += units;
                    self.earnings += earnings;
                }
                SimEvent::Milestone { text, .. } => self.milestones.push(text.clone()),
            }
        }
    }
}

/// Drive `session` for `opts.seconds` at a fixed step, letting the autopilot act
/// before every frame.
fn simulate<S: SaveStore>(session: &mut Session<S>, opts: &SimOptions) -> Result<RunSummary> {
    if opts.fps == 0 {
        bail!("--fps must be at least 1");
    }
    if !(opts.seconds.is_finite() && opts.seconds >= 0.0) {
        bail!("--seconds must be a non-negative number");
    }
    let dt = 1.0 / f64::from(opts.fps);
    let frames = (opts.seconds * f64::from(opts.fps)).round() as u64;
    let mut summary = RunSummary {
        variant: session.config().name.clone(),
        policy: opts.policy.to_string(),
        seconds: frames as f64 * dt,
        frames,
        ..RunSummary::default()
    };

    for _ in 0..frames {
        while let Some(kind) =
            sim_ai::next_purchase(session.state(), session.config(), opts.policy)
        {
            if !session.purchase(kind).is_purchased() {
                break;
            }
            summary.purchases += 1;
        }
        if let Some(min_gain) = opts.prestige_at {
            if sim_ai::should_prestige(session.state(), session.config(), min_gain) {
                if let PrestigeOutcome::Prestiged { .. } = session.prestige() {
                    summary.prestiges += 1;
                }
            }
        }
        let report = session.frame(dt);
        summary.record(&report.tick.events);
        if report.saved {
            summary.autosaves += 1;
        }
    }
    info!(
        variant = %summary.variant,
        frames = summary.frames,
        sold = summary.sold,
        purchases = summary.purchases,
        "simulation finished"
    );
    Ok(summary)
}

async fn run_realtime(session: &mut Session<FileStore>, seconds: f64) -> Result<RunSummary> {
    let mut summary = RunSummary {
        variant: session.config().name.clone(),
        policy: "manual".to_string(),
        ..RunSummary::default()
    };
    let start = Instant::now();
    let mut clock = FrameClock::new();
    let mut ticker = tokio::time::interval(Duration::from_millis(16));
    while clock.total_secs < seconds {
        ticker.tick().await;
        let dt = clock.update(start.elapsed().as_secs_f64() * 1000.0);
        let report = session.frame(dt);
        for text in report.tick.milestones() {
            println!("{text}");
        }
        summary.record(&report.tick.events);
        if report.saved {
            summary.autosaves += 1;
        }
    }
    summary.frames = clock.frames;
    summary.seconds = clock.total_secs;
    if !session.save() {
        warn!("final save failed");
    }
    Ok(summary)
}

fn print_summary(summary: &RunSummary) {
    println!(
        "{} | {} | {:.0}s over {} frames",
        summary.variant, summary.policy, summary.seconds, summary.frames
    );
    println!(
        "produced {} | sold {} | earned {:.0} | stalled cycles {} | purchases {} | prestiges {} | autosaves {}",
        summary.produced,
        summary.sold,
        summary.earnings,
        summary.stalled_cycles,
        summary.purchases,
        summary.prestiges,
        summary.autosaves
    );
    for text in &summary.milestones {
        println!("milestone: {text}");
    }
}

fn print_snapshot(snap: &SimSnapshot) {
    let s = &snap.state;
    println!("== {} ==", snap.variant);
    println!(
        "credits {:.0} | inventory {} | sold {} (lifetime {}) | influence {}",
        s.credits, s.inventory, s.items_sold, s.lifetime_sold, s.influence
    );
    println!(
        "production {:.2}s, cost {:.2}, {} unit(s) +{:.1}% | efficiency -{:.1}%",
        snap.production_time,
        snap.production_cost,
        snap.guaranteed_output,
        snap.bonus_output_chance,
        snap.efficiency_reduction * 100.0
    );
    println!(
        "sales every {:.2}s, price {:.2}, profit {:.2}, {} attempt(s) +{:.1}% at {:.1}%",
        snap.sale_interval,
        snap.sell_price,
        snap.profit_per_item,
        snap.guaranteed_sales,
        snap.bonus_sale_chance,
        snap.sell_chance * 100.0
    );
    println!("demand {:.1}% | {}", snap.demand, snap.market_mood.text());
    println!(
        "prestige +{} influence | {} more sales to next",
        snap.prestige_gain, snap.next_influence_remaining
    );
    for quote in &snap.upgrades {
        println!(
            "  {:<12} lvl {:>3}  next {:.0}{}",
            quote.kind.name(),
            quote.level,
            quote.cost,
            if quote.affordable { "" } else { "  (can't afford)" }
        );
    }
}

fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce()) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        text();
    }
    Ok(())
}

/// `RUST_LOG` directives when set and valid, `info` otherwise.
fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

fn log_subscriber(filter: EnvFilter) -> impl tracing::Subscriber + Send + Sync {
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish()
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logging setup
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing::subscriber::set_global_default(log_subscriber(log_filter(directives.as_deref())))?;

    let cli = Cli::parse();
    let cfg = load_config(&cli)?;
    info!(variant = %cfg.name, command = ?cli.command, "starting ddc");

    match &cli.command {
        Command::Simulate {
            seconds,
            fps,
            seed,
            policy,
            prestige_at,
        } => {
            let opts = SimOptions {
                seconds: *seconds,
                fps: *fps,
                policy: *policy,
                prestige_at: *prestige_at,
            };
            let (summary, snap) = if cli.save_dir.is_some() {
                let mut session = Session::open(cfg, file_store(&cli), *seed);
                let summary = simulate(&mut session, &opts)?;
                session.save();
                (summary, session.snapshot())
            } else {
                let mut session = Session::open(cfg, MemoryStore::new(), *seed);
                (simulate(&mut session, &opts)?, session.snapshot())
            };
            let out = serde_json::json!({ "summary": &summary, "snapshot": &snap });
            emit(cli.json, &out, || {
                print_summary(&summary);
                print_snapshot(&snap);
            })?;
        }
        Command::Run { seconds, seed } => {
            let seed = seed.unwrap_or_else(|| chrono::Utc::now().timestamp_millis() as u64);
            let mut session = Session::open(cfg, file_store(&cli), seed);
            let summary = run_realtime(&mut session, *seconds).await?;
            emit(cli.json, &summary, || print_summary(&summary))?;
        }
        Command::Show => {
            let session = Session::open(cfg, file_store(&cli), 0);
            let snap = session.snapshot();
            emit(cli.json, &snap, || print_snapshot(&snap))?;
        }
        Command::Buy { kind } => {
            let mut session = Session::open(cfg, file_store(&cli), 0);
            let outcome = session.purchase(*kind);
            if outcome.is_purchased() && !session.save() {
                bail!("purchase made but the save could not be written");
            }
            emit(cli.json, &outcome, || match outcome {
                UpgradeOutcome::Purchased { kind, cost, level } => {
                    println!("bought {kind} level {level} for {cost:.0}")
                }
                UpgradeOutcome::InsufficientFunds {
                    kind,
                    cost,
                    credits,
                } => println!("{kind} costs {cost:.0}, you have {credits:.0}"),
                UpgradeOutcome::Unavailable { kind } => {
                    println!("{kind} is not offered by this variant")
                }
            })?;
        }
        Command::Prestige => {
            let mut session = Session::open(cfg, file_store(&cli), 0);
            let outcome = session.prestige();
            emit(cli.json, &outcome, || match outcome {
                PrestigeOutcome::Prestiged { gain, influence } => {
                    println!("+{gain} influence, {influence} total")
                }
                PrestigeOutcome::NothingToGain => println!("not enough lifetime sales to prestige"),
                PrestigeOutcome::Unavailable => println!("this variant has no prestige"),
            })?;
        }
        Command::Reset { yes } => {
            if !yes {
                bail!("reset wipes all progress including influence; pass --yes to confirm");
            }
            let mut session = Session::open(cfg, file_store(&cli), 0);
            session.reset();
            let snap = session.snapshot();
            emit(cli.json, &snap, || println!("{} reset", snap.variant))?;
        }
        Command::Presets => {
            if !cli.json {
                println!("# built-in presets: {}", PRESET_NAMES.join(", "));
            }
            let yaml = serde_yaml::to_string(&cfg)?;
            emit(cli.json, &cfg, || print!("{yaml}"))?;
        }
    }
    Ok(())
}
