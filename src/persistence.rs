// Persistence of the journal snapshot and session record in named slots

use crate::models::User;
use crate::types::{AssetType, DailyJournal, MistakeType, SetupType, Snapshot, Trade};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Slot holding the default profile's snapshot
pub const STATE_SLOT: &str = "trading-journal-state";
/// Slot holding the logged-in user record
pub const USER_SLOT: &str = "trading-journal-user";

/// Snapshot slot for a user, or the shared default slot
pub fn state_slot_for(user_id: Option<&str>) -> String {
    match user_id {
        Some(id) => format!("{}-{}", STATE_SLOT, id),
        None => STATE_SLOT.to_string(),
    }
}

/// Durable key-value storage with whole-value overwrite semantics
pub trait SlotStore {
    fn read(&self, slot: &str) -> Result<Option<String>>;
    fn write(&self, slot: &str, data: &str) -> Result<()>;
    fn remove(&self, slot: &str) -> Result<()>;
}

impl<T: SlotStore + ?Sized> SlotStore for Arc<T> {
    fn read(&self, slot: &str) -> Result<Option<String>> {
        (**self).read(slot)
    }

    fn write(&self, slot: &str, data: &str) -> Result<()> {
        (**self).write(slot, data)
    }

    fn remove(&self, slot: &str) -> Result<()> {
        (**self).remove(slot)
    }
}

/// One JSON file per slot inside a data directory
#[derive(Debug, Clone)]
pub struct FileSlotStore {
    dir: PathBuf,
}

impl FileSlotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, slot: &str) -> PathBuf {
        self.dir.join(format!("{}.json", slot))
    }
}

impl SlotStore for FileSlotStore {
    fn read(&self, slot: &str) -> Result<Option<String>> {
        let path = self.path_for(slot);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read slot file {}", path.display()))?;
        Ok(Some(content))
    }

    fn write(&self, slot: &str, data: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create data directory {}", self.dir.display()))?;
        let path = self.path_for(slot);
        // Write beside the target and rename so a crash never leaves half a blob
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, data).with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &path).with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }

    fn remove(&self, slot: &str) -> Result<()> {
        let path = self.path_for(slot);
        if path.exists() {
            fs::remove_file(&path).with_context(|| format!("Failed to remove {}", path.display()))?;
        }
        Ok(())
    }
}

/// In-process slots; writes can be made to fail to mimic a full quota
#[derive(Debug, Default)]
pub struct MemorySlotStore {
    slots: Mutex<HashMap<String, String>>,
    reject_writes: AtomicBool,
}

impl MemorySlotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    /// Raw slot contents
    pub fn get(&self, slot: &str) -> Option<String> {
        self.slots.lock().ok()?.get(slot).cloned()
    }
}

impl SlotStore for MemorySlotStore {
    fn read(&self, slot: &str) -> Result<Option<String>> {
        let slots = self
            .slots
            .lock()
            .map_err(|_| anyhow::anyhow!("slot map poisoned"))?;
        Ok(slots.get(slot).cloned())
    }

    fn write(&self, slot: &str, data: &str) -> Result<()> {
        if self.reject_writes.load(Ordering::SeqCst) {
            anyhow::bail!("storage quota exceeded while writing slot {}", slot);
        }
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| anyhow::anyhow!("slot map poisoned"))?;
        slots.insert(slot.to_string(), data.to_string());
        Ok(())
    }

    fn remove(&self, slot: &str) -> Result<()> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| anyhow::anyhow!("slot map poisoned"))?;
        slots.remove(slot);
        Ok(())
    }
}

/// Lay `patch` over `base`: objects merge key by key, nulls keep the base
/// value, everything else replaces it.
fn overlay(base: &mut Value, patch: Value) {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => {
            for (key, value) in patch_map {
                match base_map.get_mut(&key) {
                    Some(slot) => overlay(slot, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (_, Value::Null) => {}
        (slot, value) => *slot = value,
    }
}

/// Fill per-trade fields older or hand-edited blobs may lack.
///
/// Older blobs carry only `financialResult`; it is mirrored into the twin
/// field. Leverage defaults to 1, trend position to `with`, and the creation
/// time to the entry time.
fn backfill_trades(value: &mut Value) {
    let Some(trades) = value.get_mut("trades").and_then(Value::as_array_mut) else {
        return;
    };
    for trade in trades.iter_mut().filter_map(Value::as_object_mut) {
        if !trade.contains_key("profitLossPercentage") {
            if let Some(result) = trade.get("financialResult").cloned() {
                trade.insert("profitLossPercentage".to_string(), result);
            }
        }
        trade
            .entry("leverage")
            .or_insert_with(|| Value::String("1".to_string()));
        trade
            .entry("trendPosition")
            .or_insert_with(|| Value::String("with".to_string()));
        if !trade.contains_key("createdAt") {
            if let Some(entry) = trade.get("entryTime").cloned() {
                trade.insert("createdAt".to_string(), entry);
            }
        }
    }
}

/// Journals without a creation time get midnight UTC of their date
fn backfill_journals(value: &mut Value) {
    let Some(journals) = value.get_mut("journals").and_then(Value::as_array_mut) else {
        return;
    };
    for journal in journals.iter_mut().filter_map(Value::as_object_mut) {
        if journal.contains_key("createdAt") {
            continue;
        }
        if let Some(date) = journal.get("date").and_then(Value::as_str) {
            let created = format!("{}T00:00:00Z", date);
            journal.insert("createdAt".to_string(), Value::String(created));
        }
    }
}

/// Drop the elements of `key` that still do not decode as `T`, keeping the rest
fn drop_undecodable<T: DeserializeOwned>(value: &mut Value, key: &str) {
    let Some(items) = value.get_mut(key).and_then(Value::as_array_mut) else {
        return;
    };
    let before = items.len();
    items.retain(|item| serde_json::from_value::<T>(item.clone()).is_ok());
    let dropped = before - items.len();
    if dropped > 0 {
        warn!("⚠️  Skipped {} unreadable {} entr{}", dropped, key, if dropped == 1 { "y" } else { "ies" });
    }
}

/// Loads and saves the whole snapshot in one slot
pub struct StatePersistence<S: SlotStore> {
    store: S,
    slot: String,
    defaults: Snapshot,
}

impl<S: SlotStore> StatePersistence<S> {
    pub fn new(store: S, slot: impl Into<String>) -> Self {
        Self {
            store,
            slot: slot.into(),
            defaults: Snapshot::default(),
        }
    }

    /// Snapshot used when nothing is stored, and source of back-filled fields
    pub fn with_defaults(mut self, defaults: Snapshot) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn slot(&self) -> &str {
        &self.slot
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Stored snapshot, or the defaults when the slot is empty or unreadable
    pub fn load(&self) -> Snapshot {
        match self.try_load() {
            Ok(Some(snapshot)) => {
                info!(
                    "📂 Loaded journal state from slot {} ({} trades, {} journals)",
                    self.slot,
                    snapshot.trades.len(),
                    snapshot.journals.len()
                );
                snapshot
            }
            Ok(None) => {
                info!("📂 No saved state in slot {}, starting from defaults", self.slot);
                self.defaults.clone()
            }
            Err(e) => {
                warn!("⚠️  Failed to load slot {}: {:#}; falling back to defaults", self.slot, e);
                self.defaults.clone()
            }
        }
    }

    pub fn try_load(&self) -> Result<Option<Snapshot>> {
        let Some(raw) = self.store.read(&self.slot)? else {
            return Ok(None);
        };
        let mut stored: Value = serde_json::from_str(&raw)
            .with_context(|| format!("Slot {} does not hold valid JSON", self.slot))?;
        if !stored.is_object() {
            anyhow::bail!("Slot {} does not hold a JSON object", self.slot);
        }
        backfill_trades(&mut stored);
        backfill_journals(&mut stored);

        let mut merged = serde_json::to_value(&self.defaults)?;
        overlay(&mut merged, stored);
        drop_undecodable::<Trade>(&mut merged, "trades");
        drop_undecodable::<DailyJournal>(&mut merged, "journals");
        drop_undecodable::<SetupType>(&mut merged, "setups");
        drop_undecodable::<MistakeType>(&mut merged, "mistakeTypes");
        drop_undecodable::<AssetType>(&mut merged, "assets");
        let snapshot = serde_json::from_value(merged)
            .with_context(|| format!("Slot {} does not hold a journal snapshot", self.slot))?;
        Ok(Some(snapshot))
    }

    /// Overwrite the slot; failures are logged and swallowed
    pub fn save(&self, snapshot: &Snapshot) {
        match self.try_save(snapshot) {
            Ok(()) => debug!("💾 Saved journal state to slot {}", self.slot),
            Err(e) => warn!("⚠️  Failed to save slot {}: {:#}", self.slot, e),
        }
    }

    pub fn try_save(&self, snapshot: &Snapshot) -> Result<()> {
        let json = serde_json::to_string(snapshot).context("Failed to serialize journal state")?;
        self.store.write(&self.slot, &json)
    }
}

/// The logged-in user record, kept in its own slot
pub struct SessionPersistence<S: SlotStore> {
    store: S,
    slot: String,
}

impl<S: SlotStore> SessionPersistence<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            slot: USER_SLOT.to_string(),
        }
    }

    /// Current user; unreadable contents count as logged out
    pub fn load(&self) -> Option<User> {
        let raw = match self.store.read(&self.slot) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!("⚠️  Failed to read session slot: {:#}", e);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!("⚠️  Ignoring malformed session record: {}", e);
                None
            }
        }
    }

    pub fn save(&self, user: &User) -> Result<()> {
        let json = serde_json::to_string(user).context("Failed to serialize session")?;
        self.store.write(&self.slot, &json)
    }

    pub fn clear(&self) -> Result<()> {
        self.store.remove(&self.slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserDirectory;
    use crate::reducer::{reduce, Command, ReduceContext};
    use crate::types::{Direction, JournalDraft, RiskSettings, TradeDraft, TrendPosition};
    use chrono::{Local, NaiveDate, TimeZone};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn populated() -> Snapshot {
        let ctx = ReduceContext::new(Local.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap());
        let entry = Local.with_ymd_and_hms(2024, 3, 15, 9, 41, 7).unwrap()
            + chrono::Duration::milliseconds(123);
        let closed = TradeDraft::new("EURUSD", "setup-breakout", Direction::Sell, entry, dec!(-37.125))
            .exit_time(entry + chrono::Duration::minutes(42))
            .leverage(dec!(2.5))
            .notes("chased the move")
            .mistake("mistake-fomo");
        let open = TradeDraft::new("BTCUSD", "setup-range", Direction::Buy, entry, dec!(0.1));
        let journal = JournalDraft {
            date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            error_review_completed: true,
            daily_comment: "Only A+ setups".into(),
            previous_day_goal_hit: Some(true),
        };
        let state = reduce(&Snapshot::default(), Command::AddTrade(closed), &ctx);
        let state = reduce(&state, Command::AddTrade(open), &ctx);
        reduce(&state, Command::AddJournal(journal), &ctx)
    }

    #[test]
    fn roundtrip_preserves_everything() {
        let persistence = StatePersistence::new(MemorySlotStore::new(), STATE_SLOT);
        let state = populated();
        persistence.try_save(&state).unwrap();

        let loaded = persistence.load();
        assert_eq!(loaded, state);
        assert!(loaded.trades[1].exit_time.is_none());
        assert_eq!(loaded.trades[0].entry_time, state.trades[0].entry_time);
        assert_eq!(loaded.daily_risk_used, state.daily_risk_used);
    }

    #[test]
    fn file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = StatePersistence::new(FileSlotStore::new(dir.path().join("data")), STATE_SLOT);
        let state = populated();
        persistence.save(&state);

        assert!(dir.path().join("data").join("trading-journal-state.json").exists());
        assert_eq!(persistence.load(), state);
    }

    #[test]
    fn missing_slot_returns_defaults() {
        let persistence = StatePersistence::new(MemorySlotStore::new(), STATE_SLOT);
        assert_eq!(persistence.load(), Snapshot::default());
        assert!(persistence.try_load().unwrap().is_none());
    }

    #[test]
    fn corrupt_slot_returns_defaults() {
        let store = MemorySlotStore::new();
        store.write(STATE_SLOT, "not valid json {{{").unwrap();
        let persistence = StatePersistence::new(store, STATE_SLOT);
        assert_eq!(persistence.load(), Snapshot::default());

        persistence.store().write(STATE_SLOT, "[1, 2, 3]").unwrap();
        assert_eq!(persistence.load(), Snapshot::default());
    }

    #[test]
    fn configured_defaults_apply_to_empty_slot() {
        let defaults = Snapshot::with_settings(RiskSettings::new(dec!(25000), dec!(1), dec!(1)));
        let persistence =
            StatePersistence::new(MemorySlotStore::new(), STATE_SLOT).with_defaults(defaults.clone());
        assert_eq!(persistence.load().risk_settings.initial_capital, dec!(25000));
    }

    #[test]
    fn partial_blob_is_backfilled() {
        let store = MemorySlotStore::new();
        store
            .write(
                STATE_SLOT,
                r#"{"riskSettings":{"initialCapital":"5000","dailyProfitTarget":"3","maxDailyRisk":"1"},
                    "setups":[{"id":"x","name":"Scalp"}]}"#,
            )
            .unwrap();
        let loaded = StatePersistence::new(store, STATE_SLOT).load();

        assert_eq!(loaded.risk_settings.initial_capital, dec!(5000));
        assert_eq!(loaded.risk_settings.daily_risk_limit, dec!(200));
        assert_eq!(loaded.setups.len(), 1);
        assert_eq!(loaded.mistake_types.len(), 5);
        assert!(loaded.trades.is_empty());
    }

    #[test]
    fn trade_missing_fields_is_backfilled_not_dropped() {
        let store = MemorySlotStore::new();
        store
            .write(
                STATE_SLOT,
                r#"{"riskSettings":{"initialCapital":"5000","dailyProfitTarget":"3","maxDailyRisk":"1"},
                    "trades":[
                      {"id":"t1","asset":"EURUSD","setupId":"setup-breakout","direction":"sell",
                       "trendPosition":"with","entryTime":"2024-03-15T09:00:00+00:00",
                       "financialResult":"40","profitLossPercentage":"40",
                       "createdAt":"2024-03-15T09:00:00+00:00"},
                      {"id":"t2","asset":"US30","setupId":"setup-range","direction":"buy",
                       "entryTime":"2024-03-15T10:00:00+00:00","financialResult":"-15",
                       "leverage":"3","createdAt":"2024-03-15T10:00:00+00:00"},
                      {"id":"t3","asset":"GBPUSD","direction":"sideways"}],
                    "journals":[{"id":"j1","date":"2024-03-15","errorReviewCompleted":true}]}"#,
            )
            .unwrap();
        let loaded = StatePersistence::new(store, STATE_SLOT).load();

        assert_eq!(loaded.risk_settings.initial_capital, dec!(5000));
        assert_eq!(loaded.trades.len(), 2);
        assert_eq!(loaded.trades[0].leverage, Decimal::ONE);
        assert_eq!(loaded.trades[1].trend_position, TrendPosition::With);
        assert_eq!(loaded.trades[1].leverage, dec!(3));
        assert_eq!(loaded.trades[1].profit_loss_percentage, dec!(-15));
        assert!(loaded.trade("t3").is_none());
        assert_eq!(loaded.journals.len(), 1);
        assert!(loaded.journals[0].error_review_completed);
    }

    #[test]
    fn legacy_trades_gain_percentage_field() {
        let store = MemorySlotStore::new();
        store
            .write(
                STATE_SLOT,
                r#"{"trades":[{"id":"t1","asset":"US30","setupId":"setup-range","direction":"buy",
                    "trendPosition":"against","entryTime":"2024-03-15T09:00:00+00:00",
                    "financialResult":-12.5,"leverage":1,"createdAt":"2024-03-15T09:00:00+00:00"}]}"#,
            )
            .unwrap();
        let loaded = StatePersistence::new(store, STATE_SLOT).load();

        assert_eq!(loaded.trades.len(), 1);
        assert_eq!(loaded.trades[0].financial_result, dec!(-12.5));
        assert_eq!(loaded.trades[0].profit_loss_percentage, dec!(-12.5));
        assert!(!loaded.trades[0].is_mistake);
    }

    #[test]
    fn failed_save_is_swallowed() {
        let store = Arc::new(MemorySlotStore::new());
        let persistence = StatePersistence::new(store.clone(), STATE_SLOT);
        store.set_reject_writes(true);

        persistence.save(&populated());
        assert!(store.get(STATE_SLOT).is_none());
        assert!(persistence.try_save(&populated()).is_err());
    }

    #[test]
    fn session_slot_roundtrip_and_clear() {
        let store = Arc::new(MemorySlotStore::new());
        let session = SessionPersistence::new(store.clone());
        assert!(session.load().is_none());

        let user = UserDirectory::mock()
            .authenticate("mentor@journal.local", "mentor123")
            .unwrap();
        session.save(&user).unwrap();
        assert_eq!(session.load(), Some(user));

        session.clear().unwrap();
        assert!(session.load().is_none());

        store.write(USER_SLOT, "garbage").unwrap();
        assert!(session.load().is_none());
    }

    #[test]
    fn per_user_slots() {
        assert_eq!(state_slot_for(None), "trading-journal-state");
        assert_eq!(state_slot_for(Some("u2")), "trading-journal-state-u2");
    }
}
