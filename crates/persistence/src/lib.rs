#![deny(warnings)]

//! Persistence layer: the flat save record and key-value save stores.
//!
//! The record mirrors what the browser build kept in local storage: one
//! JSON object per variant, camelCase keys, every field optional. Loading
//! never fails; any field that is missing or unreadable falls back to its
//! own default while the rest of the record is kept.

use chrono::{DateTime, Utc};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;
use serde_json::value::RawValue;
use sim_core::{EconomyConfig, GameState};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Format version written into every record.
pub const SAVE_VERSION: u32 = 1;

/// Errors raised by stores and record encoding.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    /// Record parsed as JSON but is not an object.
    #[error("save record is not a JSON object")]
    NotAnObject,
    #[error("invalid storage key: {0:?}")]
    InvalidKey(String),
}

/// Flat persisted snapshot of a [`GameState`]. Timers are not persisted.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credits: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed_level: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub efficiency_level: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advertising_level: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logistics_level: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inventory: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_sold: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lifetime_sold: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub influence: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub milestone_index: Option<usize>,
}

type RawFields = BTreeMap<String, Box<RawValue>>;

fn field<T: DeserializeOwned>(map: &RawFields, key: &str) -> Option<T> {
    let raw = map.get(key)?;
    match serde_json::from_str(raw.get()) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(key, error = %e, "ignoring unreadable save field");
            None
        }
    }
}

impl SaveRecord {
    /// Record holding every persisted field of `state`, stamped now.
    pub fn capture(state: &GameState) -> Self {
        Self {
            version: Some(SAVE_VERSION),
            saved_at: Some(Utc::now()),
            credits: Some(state.credits),
            speed_level: Some(state.speed_level),
            efficiency_level: Some(state.efficiency_level),
            advertising_level: Some(state.advertising_level),
            logistics_level: Some(state.logistics_level),
            tier: Some(state.tier),
            inventory: Some(state.inventory),
            items_sold: Some(state.items_sold),
            lifetime_sold: Some(state.lifetime_sold),
            influence: Some(state.influence),
            milestone_index: Some(state.milestone_index),
        }
    }

    /// Parse a stored record field by field.
    ///
    /// Only text that is not a JSON object is an error; a bad field is
    /// dropped on its own.
    pub fn parse(text: &str) -> Result<Self, PersistenceError> {
        // values stay raw so one out-of-range number only costs its own field
        let fields: RawFields = match serde_json::from_str(text) {
            Ok(fields) => fields,
            Err(e) => {
                return Err(match serde_json::from_str::<IgnoredAny>(text) {
                    Ok(_) => PersistenceError::NotAnObject,
                    Err(_) => e.into(),
                })
            }
        };
        Ok(Self {
            version: field(&fields, "version"),
            saved_at: field(&fields, "savedAt"),
            credits: field::<f64>(&fields, "credits").filter(|c| c.is_finite() && *c >= 0.0),
            speed_level: field(&fields, "speedLevel"),
            efficiency_level: field(&fields, "efficiencyLevel"),
            advertising_level: field(&fields, "advertisingLevel"),
            logistics_level: field(&fields, "logisticsLevel"),
            tier: field(&fields, "tier"),
            inventory: field(&fields, "inventory"),
            items_sold: field(&fields, "itemsSold"),
            lifetime_sold: field(&fields, "lifetimeSold"),
            influence: field(&fields, "influence"),
            milestone_index: field(&fields, "milestoneIndex"),
        })
    }

    pub fn to_json(&self) -> Result<String, PersistenceError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Build a state, defaulting each absent field independently.
    pub fn into_state(self, cfg: &EconomyConfig) -> GameState {
        let defaults = GameState::new(cfg);
        let milestones = cfg.milestones().len();
        GameState {
            credits: self.credits.unwrap_or(defaults.credits),
            speed_level: self.speed_level.unwrap_or(defaults.speed_level),
            efficiency_level: self.efficiency_level.unwrap_or(defaults.efficiency_level),
            advertising_level: self.advertising_level.unwrap_or(defaults.advertising_level),
            logistics_level: self.logistics_level.unwrap_or(defaults.logistics_level),
            tier: self.tier.unwrap_or(defaults.tier),
            inventory: self.inventory.unwrap_or(defaults.inventory),
            items_sold: self.items_sold.unwrap_or(defaults.items_sold),
            lifetime_sold: self.lifetime_sold.unwrap_or(defaults.lifetime_sold),
            influence: self.influence.unwrap_or(defaults.influence),
            milestone_index: self
                .milestone_index
                .filter(|i| *i <= milestones)
                .unwrap_or(defaults.milestone_index),
            ..defaults
        }
    }
}

/// String key-value storage, shaped like browser local storage.
pub trait SaveStore {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError>;
    fn write(&mut self, key: &str, value: &str) -> Result<(), PersistenceError>;
    fn remove(&mut self, key: &str) -> Result<(), PersistenceError>;
}

/// Volatile store for tests and headless front ends.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SaveStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.entries.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), PersistenceError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// One `<key>.json` file per key inside a directory.
#[derive(Clone, Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, PersistenceError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(PersistenceError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl SaveStore for FileStore {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir)?;
        // write-then-rename so a crash never leaves half a record
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), PersistenceError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Directory used for local saves when none is given.
pub fn default_save_dir() -> PathBuf {
    PathBuf::from("./saves")
}

/// Load the variant's state from `store`; never fails.
pub fn load_state<S: SaveStore + ?Sized>(store: &S, cfg: &EconomyConfig) -> GameState {
    match store.read(&cfg.save_key) {
        Ok(Some(text)) => match SaveRecord::parse(&text) {
            Ok(record) => {
                debug!(key = %cfg.save_key, "loaded save record");
                record.into_state(cfg)
            }
            Err(e) => {
                warn!(key = %cfg.save_key, error = %e, "corrupt save record, starting fresh");
                GameState::new(cfg)
            }
        },
        Ok(None) => {
            debug!(key = %cfg.save_key, "no save record, starting fresh");
            GameState::new(cfg)
        }
        Err(e) => {
            warn!(key = %cfg.save_key, error = %e, "could not read save, starting fresh");
            GameState::new(cfg)
        }
    }
}

/// Write `state` under the variant's key.
pub fn save_state<S: SaveStore + ?Sized>(
    store: &mut S,
    cfg: &EconomyConfig,
    state: &GameState,
) -> Result<(), PersistenceError> {
    let text = SaveRecord::capture(state).to_json()?;
    store.write(&cfg.save_key, &text)?;
    debug!(key = %cfg.save_key, credits = state.credits, "saved game");
    Ok(())
}

/// Remove the variant's record.
pub fn delete_save<S: SaveStore + ?Sized>(
    store: &mut S,
    cfg: &EconomyConfig,
) -> Result<(), PersistenceError> {
    store.remove(&cfg.save_key)?;
    info!(key = %cfg.save_key, "deleted save record");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::{Map, Value};

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("ddc-persistence-{}-{}", std::process::id(), name))
    }

    fn sample_state(cfg: &EconomyConfig) -> GameState {
        let mut s = GameState::new(cfg);
        s.credits = 4321.5;
        s.speed_level = 3;
        s.efficiency_level = 2;
        s.advertising_level = 7;
        s.logistics_level = 4;
        s.inventory = 11;
        s.items_sold = 90;
        s.lifetime_sold = 140;
        s.influence = 2;
        s.milestone_index = 1;
        s.production_timer = 3.5;
        s
    }

    #[test]
    fn missing_logistics_level_defaults_alone() {
        let cfg = EconomyConfig::industries();
        let text = r#"{"credits":2500,"speedLevel":4,"efficiencyLevel":1,"inventory":6,
            "itemsSold":30,"advertisingLevel":2,"influence":1,"lifetimeSold":80}"#;
        let s = SaveRecord::parse(text).unwrap().into_state(&cfg);
        assert_eq!(s.logistics_level, 0);
        assert_eq!(s.credits, 2500.0);
        assert_eq!(s.speed_level, 4);
        assert_eq!(s.efficiency_level, 1);
        assert_eq!(s.inventory, 6);
        assert_eq!(s.items_sold, 30);
        assert_eq!(s.advertising_level, 2);
        assert_eq!(s.influence, 1);
        assert_eq!(s.lifetime_sold, 80);
    }

    #[test]
    fn unreadable_fields_fall_back_individually() {
        let cfg = EconomyConfig::industries();
        let text = r#"{"credits":"lots","speedLevel":-2,"tier":1.5,"inventory":9,
            "milestoneIndex":99,"savedAt":"yesterday"}"#;
        let record = SaveRecord::parse(text).unwrap();
        assert!(record.saved_at.is_none());
        let s = record.into_state(&cfg);
        assert_eq!(s.credits, 1000.0);
        assert_eq!(s.speed_level, 0);
        assert_eq!(s.tier, 0);
        assert_eq!(s.inventory, 9);
        assert_eq!(s.milestone_index, 0);
    }

    #[test]
    fn out_of_range_number_costs_only_its_field() {
        let cfg = EconomyConfig::industries();
        let mut store = MemoryStore::new();
        store
            .write(
                &cfg.save_key,
                r#"{"credits":1e400,"speedLevel":7,"lifetimeSold":300,"inventory":1e3}"#,
            )
            .unwrap();
        let s = load_state(&store, &cfg);
        assert_eq!(s.credits, 1000.0);
        assert_eq!(s.speed_level, 7);
        assert_eq!(s.lifetime_sold, 300);
        assert_eq!(s.inventory, 0);

        let record = SaveRecord::parse(r#"{"credits":2.5e3,"influence":99999999999999999999999}"#)
            .unwrap();
        assert_eq!(record.credits, Some(2500.0));
        assert_eq!(record.influence, None);
    }

    #[test]
    fn negative_credits_are_rejected() {
        let cfg = EconomyConfig::industries();
        let s = SaveRecord::parse(r#"{"credits":-50}"#).unwrap().into_state(&cfg);
        assert_eq!(s.credits, 1000.0);
    }

    #[test]
    fn non_object_is_an_error_but_load_still_succeeds() {
        let cfg = EconomyConfig::industries();
        assert!(matches!(
            SaveRecord::parse("[1,2,3]"),
            Err(PersistenceError::NotAnObject)
        ));
        assert!(matches!(
            SaveRecord::parse("{not json"),
            Err(PersistenceError::Json(_))
        ));
        let mut store = MemoryStore::new();
        store.write(&cfg.save_key, "garbage").unwrap();
        assert_eq!(load_state(&store, &cfg), GameState::new(&cfg));
    }

    #[test]
    fn empty_store_gives_defaults() {
        let cfg = EconomyConfig::workshop();
        let store = MemoryStore::new();
        assert_eq!(load_state(&store, &cfg), GameState::new(&cfg));
    }

    #[test]
    fn save_then_load_keeps_persisted_fields() {
        let cfg = EconomyConfig::industries();
        let mut store = MemoryStore::new();
        let state = sample_state(&cfg);
        save_state(&mut store, &cfg, &state).unwrap();
        let loaded = load_state(&store, &cfg);
        assert_eq!(loaded.production_timer, 0.0);
        assert_eq!(
            loaded,
            GameState {
                production_timer: 0.0,
                ..state
            }
        );
    }

    #[test]
    fn record_uses_camel_case_keys() {
        let cfg = EconomyConfig::industries();
        let text = SaveRecord::capture(&sample_state(&cfg)).to_json().unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["speedLevel"], 3);
        assert_eq!(value["lifetimeSold"], 140);
        assert_eq!(value["version"], SAVE_VERSION);
        assert!(value.get("productionTimer").is_none());
    }

    #[test]
    fn variants_use_separate_keys() {
        let industries = EconomyConfig::industries();
        let garage = EconomyConfig::garage();
        let mut store = MemoryStore::new();
        save_state(&mut store, &industries, &sample_state(&industries)).unwrap();
        assert_eq!(load_state(&store, &garage), GameState::new(&garage));
        delete_save(&mut store, &industries).unwrap();
        assert_eq!(store.read(&industries.save_key).unwrap(), None);
    }

    #[test]
    fn file_store_roundtrip_and_remove() {
        let dir = temp_dir("roundtrip");
        let _ = fs::remove_dir_all(&dir);
        let cfg = EconomyConfig::industries();
        let mut store = FileStore::new(&dir);
        assert_eq!(store.read(&cfg.save_key).unwrap(), None);
        let state = sample_state(&cfg);
        save_state(&mut store, &cfg, &state).unwrap();
        assert!(dir.join("ddcIndustriesSave.json").exists());
        let loaded = load_state(&store, &cfg);
        assert_eq!(loaded.lifetime_sold, 140);
        delete_save(&mut store, &cfg).unwrap();
        delete_save(&mut store, &cfg).unwrap();
        assert_eq!(store.read(&cfg.save_key).unwrap(), None);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn file_store_rejects_path_like_keys() {
        let store = FileStore::new(temp_dir("keys"));
        assert!(matches!(
            store.read("../escape"),
            Err(PersistenceError::InvalidKey(_))
        ));
        assert!(store.read("").is_err());
    }

    proptest! {
        #[test]
        fn any_subset_of_fields_loads(credits in proptest::option::of(0u32..1_000_000_000),
                                      speed in proptest::option::of(0u32..500),
                                      sold in proptest::option::of(0u64..1_000_000)) {
            let cfg = EconomyConfig::industries();
            let mut map = Map::new();
            if let Some(c) = credits { map.insert("credits".into(), serde_json::json!(c)); }
            if let Some(v) = speed { map.insert("speedLevel".into(), serde_json::json!(v)); }
            if let Some(v) = sold { map.insert("lifetimeSold".into(), serde_json::json!(v)); }
            let text = Value::Object(map).to_string();
            let s = SaveRecord::parse(&text).unwrap().into_state(&cfg);
            prop_assert_eq!(s.credits, credits.map(f64::from).unwrap_or(1000.0));
            prop_assert_eq!(s.speed_level, speed.unwrap_or(0));
            prop_assert_eq!(s.lifetime_sold, sold.unwrap_or(0));
            prop_assert_eq!(s.logistics_level, 0);
        }
    }
}
