//! A running game: one state, one variant, one seeded random source and one
//! save store, driven frame by frame by whatever host owns it.

use persistence::SaveStore;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use sim_core::{validate_state, EconomyConfig, GameState, UpgradeKind};
use tracing::{info, warn};

use crate::{PrestigeOutcome, SimSnapshot, TickReport, UpgradeOutcome};

/// Result of one [`Session::frame`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FrameReport {
    pub tick: TickReport,
    /// The autosave fired and the write succeeded.
    pub saved: bool,
}

pub struct Session<S: SaveStore> {
    cfg: EconomyConfig,
    state: GameState,
    rng: ChaCha8Rng,
    store: S,
    autosave_timer: f64,
}

impl<S: SaveStore> Session<S> {
    /// Resume the variant's saved game from `store`, or start fresh.
    pub fn open(cfg: EconomyConfig, store: S, seed: u64) -> Self {
        let state = persistence::load_state(&store, &cfg);
        info!(variant = %cfg.name, credits = state.credits, seed, "session opened");
        Self::with_state(cfg, state, store, seed)
    }

    /// Start from an explicit state; nothing is read from `store`.
    ///
    /// A state that fails [`validate_state`] is replaced by a fresh one.
    pub fn with_state(cfg: EconomyConfig, state: GameState, store: S, seed: u64) -> Self {
        let state = match validate_state(&state, &cfg) {
            Ok(()) => state,
            Err(e) => {
                warn!(variant = %cfg.name, error = %e, "invalid game state, starting fresh");
                GameState::new(&cfg)
            }
        };
        Self {
            cfg,
            state,
            rng: ChaCha8Rng::seed_from_u64(seed),
            store,
            autosave_timer: 0.0,
        }
    }

    /// Run one frame of `elapsed` seconds and autosave when due.
    pub fn frame(&mut self, elapsed: f64) -> FrameReport {
        let tick = crate::advance_in_place(&mut self.state, &self.cfg, elapsed, &mut self.rng);
        let mut saved = false;
        if elapsed.is_finite() && elapsed > 0.0 {
            self.autosave_timer += elapsed;
            if self.autosave_timer >= self.cfg.autosave_interval_secs {
                self.autosave_timer = 0.0;
                saved = self.save();
            }
        }
        FrameReport { tick, saved }
    }

    pub fn purchase(&mut self, kind: UpgradeKind) -> UpgradeOutcome {
        crate::apply_upgrade(&mut self.state, &self.cfg, kind)
    }

    /// Prestige and persist the result right away.
    pub fn prestige(&mut self) -> PrestigeOutcome {
        let outcome = crate::prestige(&mut self.state, &self.cfg);
        if matches!(outcome, PrestigeOutcome::Prestiged { .. }) {
            self.save();
        }
        outcome
    }

    /// Wipe everything. Callers confirm with the player before calling this.
    pub fn reset(&mut self) {
        if let Err(e) = persistence::delete_save(&mut self.store, &self.cfg) {
            warn!(error = %e, "could not delete save during reset");
        }
        self.state = crate::reset(&self.cfg);
        self.autosave_timer = 0.0;
        self.save();
    }

    /// Best-effort write of the current state; failures are logged, not raised.
    pub fn save(&mut self) -> bool {
        match persistence::save_state(&mut self.store, &self.cfg, &self.state) {
            Ok(()) => true,
            Err(e) => {
                warn!(key = %self.cfg.save_key, error = %e, "save failed");
                false
            }
        }
    }

    pub fn snapshot(&self) -> SimSnapshot {
        crate::snapshot(&self.state, &self.cfg)
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn config(&self) -> &EconomyConfig {
        &self.cfg
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Seconds accumulated towards the next autosave.
    pub fn autosave_timer(&self) -> f64 {
        self.autosave_timer
    }
}
