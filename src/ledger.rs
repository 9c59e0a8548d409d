//! HistoryLedger: bounded, most-recent-first log of successful generations.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::PlannerError;
use crate::spec::ProjectSpec;
use crate::storage::{Namespace, Storage};

pub const MAX_HISTORY_ENTRIES: usize = 50;

/// One generation: the spec it was built from and the plan that came back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRecord {
    pub id: String,
    pub spec: ProjectSpec,
    pub plan: String,
    pub timestamp: String,
}

pub type Clock = fn() -> DateTime<Utc>;

pub struct HistoryLedger {
    records: Vec<GenerationRecord>,
    storage: Arc<dyn Storage>,
    clock: Clock,
}

impl HistoryLedger {
    /// Read the persisted history. Missing or corrupt data yields an empty ledger.
    pub fn load(storage: Arc<dyn Storage>) -> Self {
        let records = load_records(storage.as_ref());
        Self {
            records,
            storage,
            clock: Utc::now,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Most recent first.
    pub fn records(&self) -> &[GenerationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&GenerationRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Record a generation at the front of the ledger, dropping the oldest
    /// entries beyond [`MAX_HISTORY_ENTRIES`].
    ///
    /// The id is the ISO-8601 timestamp; if that id is already taken a
    /// `#n` suffix is added so ids stay unique.
    pub fn append(&mut self, spec: ProjectSpec, plan: String) -> GenerationRecord {
        let timestamp = (self.clock)().to_rfc3339_opts(SecondsFormat::Millis, true);
        let id = self.unique_id(&timestamp);
        let record = GenerationRecord {
            id,
            spec,
            plan,
            timestamp,
        };

        self.records.insert(0, record.clone());
        self.records.truncate(MAX_HISTORY_ENTRIES);
        info!(record_id = %record.id, entries = self.records.len(), "generation recorded");
        self.persist();
        record
    }

    /// Drop the record with `id`. Returns `false` when no such record exists.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.records.len();
        self.records.retain(|r| r.id != id);
        if self.records.len() == before {
            debug!(record_id = id, "no history entry to remove");
            return false;
        }
        self.persist();
        true
    }

    /// Empty the ledger if `confirm` agrees. Returns whether it was cleared.
    pub fn clear(&mut self, confirm: impl FnOnce() -> bool) -> bool {
        if !confirm() {
            debug!("history clear not confirmed");
            return false;
        }
        let dropped = self.records.len();
        self.records.clear();
        info!(dropped, "history cleared");
        self.persist();
        true
    }

    fn unique_id(&self, base: &str) -> String {
        if self.get(base).is_none() {
            return base.to_owned();
        }
        (1..)
            .map(|n| format!("{base}#{n}"))
            .find(|candidate| self.get(candidate).is_none())
            .unwrap_or_else(|| base.to_owned())
    }

    fn persist(&self) {
        let json = match serde_json::to_string(&self.records) {
            Ok(s) => s,
            Err(e) => {
                warn!(namespace = %Namespace::History, err = %e, "failed to serialize history");
                return;
            }
        };
        if let Err(e) = self.storage.write(Namespace::History, &json) {
            warn!(
                namespace = %Namespace::History,
                err = %e,
                "history not persisted; keeping in-memory state"
            );
        }
    }
}

fn load_records(storage: &dyn Storage) -> Vec<GenerationRecord> {
    let raw = match storage.read(Namespace::History) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            warn!(err = %e, "failed to read history; starting empty");
            return Vec::new();
        }
    };

    let entries = match serde_json::from_str::<Vec<Value>>(&raw) {
        Ok(entries) => entries,
        Err(e) => {
            let err = PlannerError::PersistenceCorrupt {
                namespace: Namespace::History,
                detail: e.to_string(),
            };
            warn!(err = %err, "starting with empty history");
            return Vec::new();
        }
    };

    let mut records = Vec::with_capacity(entries.len().min(MAX_HISTORY_ENTRIES));
    for (index, entry) in entries.iter().enumerate() {
        match record_from_value(entry) {
            Ok(record) => records.push(record),
            Err(detail) => warn!(index, detail = %detail, "skipping malformed history entry"),
        }
    }
    if records.len() > MAX_HISTORY_ENTRIES {
        warn!(found = records.len(), "persisted history over capacity; truncating");
        records.truncate(MAX_HISTORY_ENTRIES);
    }
    records
}

/// Older records may predate newer spec fields, so the embedded spec is
/// merged over the default like the live spec is.
fn record_from_value(value: &Value) -> Result<GenerationRecord, String> {
    let text = |key: &str| -> Result<String, String> {
        value
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| format!("missing string field `{key}`"))
    };
    let id = text("id")?;
    let plan = text("plan")?;
    let timestamp = text("timestamp")?;
    let spec_value = value.get("spec").ok_or("missing field `spec`")?;
    let (spec, rejected) = ProjectSpec::from_persisted(spec_value)?;
    if !rejected.is_empty() {
        debug!(record_id = %id, ?rejected, "history entry spec had malformed fields");
    }
    Ok(GenerationRecord {
        id,
        spec,
        plan,
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use chrono::TimeZone;

    fn fixed_clock() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap()
    }

    fn empty() -> (Arc<MemoryStorage>, HistoryLedger) {
        let storage = Arc::new(MemoryStorage::new());
        let ledger = HistoryLedger::load(storage.clone());
        (storage, ledger)
    }

    fn stored_len(storage: &MemoryStorage) -> usize {
        let raw = storage.get(Namespace::History).expect("history written");
        serde_json::from_str::<Vec<Value>>(&raw).unwrap().len()
    }

    #[test]
    fn load_missing_or_corrupt_is_empty() {
        let (_, ledger) = empty();
        assert!(ledger.is_empty());

        let storage = Arc::new(MemoryStorage::new().with_record(Namespace::History, "{oops"));
        assert!(HistoryLedger::load(storage).is_empty());

        let storage = Arc::new(MemoryStorage::new().with_record(Namespace::History, "{}"));
        assert!(HistoryLedger::load(storage).is_empty());
    }

    #[test]
    fn load_read_failure_is_empty_and_appends_still_persist() {
        let storage = Arc::new(MemoryStorage::new().with_record(Namespace::History, "[]"));
        storage.set_fail_reads(true);

        let mut ledger = HistoryLedger::load(storage.clone());
        assert!(ledger.is_empty());

        ledger.append(ProjectSpec::default(), "fresh".into());
        assert_eq!(stored_len(&storage), 1);
    }

    #[test]
    fn load_read_failure_from_file_storage_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(Namespace::History.file_name())).unwrap();

        let storage = Arc::new(crate::storage::FileStorage::new(dir.path()));
        assert!(HistoryLedger::load(storage).is_empty());
    }

    #[test]
    fn append_prepends_and_persists() {
        let (storage, mut ledger) = empty();
        let first = ledger.append(ProjectSpec::default(), "plan one".into());
        let second = ledger.append(ProjectSpec::default(), "plan two".into());

        assert_eq!(ledger.records()[0].id, second.id);
        assert_eq!(ledger.records()[1].id, first.id);
        assert_eq!(stored_len(&storage), 2);

        let reloaded = HistoryLedger::load(storage);
        assert_eq!(reloaded.records(), ledger.records());
    }

    #[test]
    fn id_and_timestamp_are_iso_millis() {
        let (_, ledger) = empty();
        let mut ledger = ledger.with_clock(fixed_clock);
        let record = ledger.append(ProjectSpec::default(), "p".into());
        assert_eq!(record.id, "2025-03-14T09:26:53.000Z");
        assert_eq!(record.timestamp, record.id);
    }

    #[test]
    fn same_instant_appends_get_distinct_ids() {
        let (_, ledger) = empty();
        let mut ledger = ledger.with_clock(fixed_clock);
        let a = ledger.append(ProjectSpec::default(), "a".into());
        let b = ledger.append(ProjectSpec::default(), "b".into());
        let c = ledger.append(ProjectSpec::default(), "c".into());

        assert_eq!(a.id, "2025-03-14T09:26:53.000Z");
        assert_eq!(b.id, "2025-03-14T09:26:53.000Z#1");
        assert_eq!(c.id, "2025-03-14T09:26:53.000Z#2");
        assert_eq!(b.timestamp, a.timestamp);
    }

    #[test]
    fn fifty_one_appends_keep_fifty_most_recent() {
        let (storage, ledger) = empty();
        let mut ledger = ledger.with_clock(fixed_clock);
        for i in 0..51 {
            ledger.append(ProjectSpec::default(), format!("plan {i}"));
        }

        assert_eq!(ledger.len(), MAX_HISTORY_ENTRIES);
        assert_eq!(stored_len(&storage), MAX_HISTORY_ENTRIES);
        assert_eq!(ledger.records()[0].plan, "plan 50");
        assert_eq!(ledger.records()[49].plan, "plan 1");
        assert!(ledger.records().iter().all(|r| r.plan != "plan 0"));
    }

    #[test]
    fn remove_existing_and_missing() {
        let (storage, ledger) = empty();
        let mut ledger = ledger.with_clock(fixed_clock);
        let a = ledger.append(ProjectSpec::default(), "a".into());
        let b = ledger.append(ProjectSpec::default(), "b".into());

        let before = ledger.records().to_vec();
        assert!(!ledger.remove("no-such-id"));
        assert_eq!(ledger.records(), before.as_slice());

        assert!(ledger.remove(&a.id));
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.records()[0].id, b.id);
        assert_eq!(stored_len(&storage), 1);
    }

    #[test]
    fn clear_respects_confirmation() {
        let (storage, mut ledger) = empty();
        ledger.append(ProjectSpec::default(), "a".into());

        assert!(!ledger.clear(|| false));
        assert_eq!(ledger.len(), 1);

        assert!(ledger.clear(|| true));
        assert!(ledger.is_empty());
        assert_eq!(stored_len(&storage), 0);
    }

    #[test]
    fn write_failure_keeps_in_memory_records() {
        let (storage, mut ledger) = empty();
        storage.set_fail_writes(true);
        ledger.append(ProjectSpec::default(), "a".into());

        assert_eq!(ledger.len(), 1);
        assert!(storage.get(Namespace::History).is_none());
    }

    #[test]
    fn load_skips_malformed_entries_and_fills_spec_defaults() {
        let raw = r#"[
            {"id":"1","timestamp":"1","plan":"ok","spec":{"projectName":"Old"}},
            {"id":"2","plan":"no timestamp","spec":{}},
            "not an object"
        ]"#;
        let storage = Arc::new(MemoryStorage::new().with_record(Namespace::History, raw));
        let ledger = HistoryLedger::load(storage);

        assert_eq!(ledger.len(), 1);
        let record = ledger.get("1").unwrap();
        assert_eq!(record.spec.project_name, "Old");
        assert_eq!(record.spec.framework, ProjectSpec::default().framework);
    }

    #[test]
    fn load_truncates_oversized_history() {
        let entries: Vec<Value> = (0..60)
            .map(|i| {
                serde_json::json!({
                    "id": i.to_string(),
                    "timestamp": i.to_string(),
                    "plan": "p",
                    "spec": {},
                })
            })
            .collect();
        let raw = serde_json::to_string(&entries).unwrap();
        let storage = Arc::new(MemoryStorage::new().with_record(Namespace::History, raw));
        let ledger = HistoryLedger::load(storage);

        assert_eq!(ledger.len(), MAX_HISTORY_ENTRIES);
        assert_eq!(ledger.records()[0].id, "0");
    }
}
