//! Durable, append-only draw history.
//!
//! Two representations co-exist on disk: `info.json` (indexed records with
//! timestamps) is canonical, `dataset.json` (a flat array of group strings)
//! is a derived view rewritten on every append for the surrounding tools.
//! A well-formed but disagreeing pair surfaces `StorageCorrupt`; a malformed
//! file is recovered as empty and overwritten by the next append.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::group::Group;
use crate::logging::EventLog;
use crate::store::lock::{LockBudget, StoreLock};

/// Service tag stored on manually appended draws.
const MANUAL_SERVICE: &str = "manual";
/// Service tag stored on records synthesized from a legacy flat-only store.
const IMPORT_SERVICE: &str = "import";

/// One ingested draw as persisted in `info.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawRecord {
    /// Decimal draw index, kept as a string on the wire.
    pub draw: String,
    /// Space-separated group form, e.g. `"5 22 18 11"`.
    pub combination: String,
    /// ISO-8601 ingestion timestamp.
    pub timestamp: String,
    pub processed: bool,
    pub service_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct DrawIndexFile {
    current_draw: String,
    history: Vec<DrawRecord>,
}

/// The append-only dataset store (C1).
pub struct DatasetStore {
    info_path: PathBuf,
    flat_path: PathBuf,
    budget: LockBudget,
    log: EventLog,
}

impl DatasetStore {
    pub fn new(
        info_path: PathBuf,
        flat_path: PathBuf,
        budget: LockBudget,
        log: EventLog,
    ) -> Self {
        Self {
            info_path,
            flat_path,
            budget,
            log,
        }
    }

    pub fn from_config(config: &EngineConfig, log: EventLog) -> Self {
        Self::new(
            config.info_path(),
            config.dataset_path(),
            LockBudget::from_config(config),
            log,
        )
    }

    /// Returns the chronological group sequence; a missing store is empty.
    pub fn load(&self) -> EngineResult<Vec<Group>> {
        let _lock = StoreLock::acquire(&self.info_path, &self.budget)?;
        let state = self.snapshot()?;
        self.groups_of(&state)
    }

    /// Number of stored draws.
    pub fn size(&self) -> EngineResult<usize> {
        let _lock = StoreLock::acquire(&self.info_path, &self.budget)?;
        Ok(self.snapshot()?.history.len())
    }

    /// Validates and appends one group, assigning the next draw index.
    pub fn append(&self, group: Group) -> EngineResult<u64> {
        let _lock = StoreLock::acquire(&self.info_path, &self.budget)?;
        let mut state = self.snapshot()?;
        let index = last_index(&state).map_or(1, |last| last + 1);
        self.push_record(&mut state, index, group, MANUAL_SERVICE)?;
        Ok(index)
    }

    /// Appends one group at an explicit draw index.
    ///
    /// # Errors
    ///
    /// `DuplicateIndex` when the index is already stored, `IndexGap` when it
    /// skips past the expected successor.
    pub fn append_indexed(&self, index: u64, group: Group) -> EngineResult<()> {
        let _lock = StoreLock::acquire(&self.info_path, &self.budget)?;
        let mut state = self.snapshot()?;
        let expected = last_index(&state).map_or(1, |last| last + 1);
        if index < expected {
            return Err(EngineError::DuplicateIndex { index });
        }
        if index > expected {
            return Err(EngineError::IndexGap {
                expected,
                got: index,
            });
        }
        self.push_record(&mut state, index, group, MANUAL_SERVICE)
    }

    // ---- internals (caller holds the lock) ----

    fn push_record(
        &self,
        state: &mut DrawIndexFile,
        index: u64,
        group: Group,
        service_type: &str,
    ) -> EngineResult<()> {
        state.history.push(DrawRecord {
            draw: index.to_string(),
            combination: group.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            processed: false,
            service_type: service_type.to_string(),
        });
        state.current_draw = index.to_string();
        self.write_state(state)?;
        self.log.record(
            "dataset_append",
            &json!({ "draw": index, "combination": group.to_string() }),
        );
        Ok(())
    }

    /// Reads the canonical state, recovering malformed files as empty and
    /// synthesizing records when only the legacy flat view exists.
    fn snapshot(&self) -> EngineResult<DrawIndexFile> {
        let mut state = match self.read_json::<DrawIndexFile>(&self.info_path) {
            ReadOutcome::Value(state) => state,
            ReadOutcome::Missing | ReadOutcome::Corrupt => DrawIndexFile::default(),
        };

        if state.history.is_empty() {
            if let ReadOutcome::Value(flat) = self.read_json::<Vec<String>>(&self.flat_path) {
                state = synthesize_from_flat(&flat);
            }
        }
        Ok(state)
    }

    fn groups_of(&self, state: &DrawIndexFile) -> EngineResult<Vec<Group>> {
        let mut groups = Vec::with_capacity(state.history.len());
        for record in &state.history {
            match record.combination.parse::<Group>() {
                Ok(group) => groups.push(group),
                Err(err) => {
                    // Shape violation inside otherwise-parseable JSON: the
                    // store reads as empty and the next write replaces it.
                    self.log.note(
                        "dataset_recovered",
                        &format!("record '{}' is invalid: {err}", record.combination),
                    );
                    return Ok(Vec::new());
                }
            }
        }

        // The flat view, when present and well-formed, must agree.
        if let ReadOutcome::Value(flat) = self.read_json::<Vec<String>>(&self.flat_path) {
            let rendered: Vec<String> = groups.iter().map(|g| g.to_string()).collect();
            if !flat.is_empty() && flat != rendered {
                return Err(EngineError::storage_corrupt(
                    &self.flat_path,
                    "dataset view disagrees with the indexed history",
                ));
            }
        }
        Ok(groups)
    }

    fn write_state(&self, state: &DrawIndexFile) -> EngineResult<()> {
        if let Some(parent) = self.info_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let info = serde_json::to_string_pretty(state)
            .map_err(|err| EngineError::storage_corrupt(&self.info_path, err.to_string()))?;
        fs::write(&self.info_path, info)?;

        let flat: Vec<&str> = state
            .history
            .iter()
            .map(|r| r.combination.as_str())
            .collect();
        let flat_json = serde_json::to_string_pretty(&flat)
            .map_err(|err| EngineError::storage_corrupt(&self.flat_path, err.to_string()))?;
        fs::write(&self.flat_path, flat_json)?;
        Ok(())
    }

    fn read_json<T: for<'de> Deserialize<'de>>(&self, path: &Path) -> ReadOutcome<T> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(_) => return ReadOutcome::Missing,
        };
        match serde_json::from_str(&contents) {
            Ok(value) => ReadOutcome::Value(value),
            Err(err) => {
                self.log.note(
                    "dataset_recovered",
                    &format!("{} failed to parse: {err}", path.display()),
                );
                ReadOutcome::Corrupt
            }
        }
    }
}

enum ReadOutcome<T> {
    Value(T),
    Missing,
    Corrupt,
}

fn last_index(state: &DrawIndexFile) -> Option<u64> {
    state
        .history
        .last()
        .and_then(|record| record.draw.parse().ok())
}

fn synthesize_from_flat(flat: &[String]) -> DrawIndexFile {
    let timestamp = Utc::now().to_rfc3339();
    let history: Vec<DrawRecord> = flat
        .iter()
        .enumerate()
        .map(|(i, combination)| DrawRecord {
            draw: (i as u64 + 1).to_string(),
            combination: combination.clone(),
            timestamp: timestamp.clone(),
            processed: true,
            service_type: IMPORT_SERVICE.to_string(),
        })
        .collect();
    DrawIndexFile {
        current_draw: history.last().map(|r| r.draw.clone()).unwrap_or_default(),
        history,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &Path) -> DatasetStore {
        DatasetStore::new(
            dir.join("info.json"),
            dir.join("dataset.json"),
            LockBudget::default(),
            EventLog::disabled(),
        )
    }

    fn group(values: [u8; 4]) -> Group {
        Group::new(values).unwrap()
    }

    #[test]
    fn test_missing_store_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        assert!(store.load().unwrap().is_empty());
        assert_eq!(store.size().unwrap(), 0);
    }

    #[test]
    fn test_append_then_load_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        let appended = [group([1, 2, 3, 4]), group([5, 6, 7, 8]), group([9, 1, 2, 3])];
        for g in appended {
            store.append(g).unwrap();
        }

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 3);
        for (i, g) in appended.iter().enumerate() {
            assert_eq!(&loaded[i], g);
        }
    }

    #[test]
    fn test_append_writes_both_views() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.append(group([5, 22, 18, 11])).unwrap();

        let flat: Vec<String> =
            serde_json::from_str(&fs::read_to_string(dir.path().join("dataset.json")).unwrap())
                .unwrap();
        assert_eq!(flat, vec!["5 22 18 11".to_string()]);

        let info: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("info.json")).unwrap())
                .unwrap();
        assert_eq!(info["current_draw"], "1");
        assert_eq!(info["history"][0]["combination"], "5 22 18 11");
        assert_eq!(info["history"][0]["processed"], false);
    }

    #[test]
    fn test_append_indexed_enforces_succession() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.append_indexed(1, group([1, 2, 3, 4])).unwrap();
        store.append_indexed(2, group([5, 6, 7, 8])).unwrap();

        match store.append_indexed(2, group([9, 8, 7, 6])) {
            Err(EngineError::DuplicateIndex { index }) => assert_eq!(index, 2),
            other => panic!("expected DuplicateIndex, got {other:?}"),
        }
        match store.append_indexed(5, group([9, 8, 7, 6])) {
            Err(EngineError::IndexGap { expected, got }) => {
                assert_eq!(expected, 3);
                assert_eq!(got, 5);
            }
            other => panic!("expected IndexGap, got {other:?}"),
        }
        assert_eq!(store.size().unwrap(), 2);
    }

    #[test]
    fn test_flat_only_store_is_migrated_view() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("dataset.json"),
            r#"["1 2 3 4", "5 6 7 8"]"#,
        )
        .unwrap();
        let store = store(dir.path());

        let loaded = store.load().unwrap();
        assert_eq!(loaded, vec![group([1, 2, 3, 4]), group([5, 6, 7, 8])]);

        // The next append continues the synthesized index sequence.
        store.append(group([9, 1, 2, 3])).unwrap();
        let info: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("info.json")).unwrap())
                .unwrap();
        assert_eq!(info["current_draw"], "3");
    }

    #[test]
    fn test_malformed_info_reads_empty_and_is_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("info.json"), "{not json").unwrap();
        let store = store(dir.path());

        assert!(store.load().unwrap().is_empty());
        store.append(group([1, 2, 3, 4])).unwrap();
        assert_eq!(store.load().unwrap().len(), 1);
    }

    #[test]
    fn test_disagreeing_views_surface_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.append(group([1, 2, 3, 4])).unwrap();

        fs::write(dir.path().join("dataset.json"), r#"["9 8 7 6"]"#).unwrap();
        match store.load() {
            Err(EngineError::StorageCorrupt { .. }) => {}
            other => panic!("expected StorageCorrupt, got {other:?}"),
        }
    }
}
