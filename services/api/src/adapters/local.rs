//! services/api/src/adapters/local.rs
//!
//! The local device store: JSON-serialized record lists written to files
//! under fixed keys inside a configurable data directory. This is the
//! concrete implementation of the `LocalStore` port.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use devotion_core::domain::{CheckInRecord, DevotionRecord, ScripturePassage};
use devotion_core::ports::{LocalStore, PortError, PortResult};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

/// Fixed storage keys, kept as the file stems.
const KEY_DEVOTIONS: &str = "devotion-records";
const KEY_CHECKINS: &str = "checkin-records";

/// A `LocalStore` backed by JSON files in one directory.
#[derive(Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Reads and parses one list file. A missing file is an empty list; a
    /// corrupt file is treated as empty too (the record of last resort is
    /// the cloud copy), with a warning.
    async fn load_list<T: DeserializeOwned>(&self, key: &str) -> PortResult<Vec<T>> {
        let path = self.path_for(key);
        let raw = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(PortError::Unexpected(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )))
            }
        };
        match serde_json::from_slice(&raw) {
            Ok(list) => Ok(list),
            Err(e) => {
                warn!("Ignoring unparsable local store file {}: {e}", path.display());
                Ok(Vec::new())
            }
        }
    }

    async fn save_list<T: Serialize>(&self, key: &str, list: &[T]) -> PortResult<()> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            PortError::Unexpected(format!(
                "Failed to create local store dir {}: {e}",
                self.dir.display()
            ))
        })?;
        let path = self.path_for(key);
        let json = serde_json::to_vec_pretty(list)
            .map_err(|e| PortError::Unexpected(format!("Failed to serialize {key}: {e}")))?;
        write_atomically(&path, &json).await
    }
}

/// Writes via a sibling temp file and rename so a crash mid-write cannot
/// truncate the only local copy of the records.
async fn write_atomically(path: &Path, contents: &[u8]) -> PortResult<()> {
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, contents).await.map_err(|e| {
        PortError::Unexpected(format!("Failed to write {}: {e}", tmp.display()))
    })?;
    tokio::fs::rename(&tmp, path).await.map_err(|e| {
        PortError::Unexpected(format!("Failed to replace {}: {e}", path.display()))
    })
}

//=========================================================================================
// "Impure" Stored Record Structs
//=========================================================================================

#[derive(Serialize, Deserialize)]
struct StoredPassage {
    reference: String,
    text: String,
}

#[derive(Serialize, Deserialize)]
struct StoredDevotionRecord {
    id: Uuid,
    date: DateTime<Utc>,
    scripture: Vec<StoredPassage>,
    observation: String,
    application: String,
    prayer_text: String,
}

impl StoredDevotionRecord {
    fn from_domain(record: &DevotionRecord) -> Self {
        Self {
            id: record.id,
            date: record.date,
            scripture: record
                .scripture
                .iter()
                .map(|p| StoredPassage {
                    reference: p.reference.clone(),
                    text: p.text.clone(),
                })
                .collect(),
            observation: record.observation.clone(),
            application: record.application.clone(),
            prayer_text: record.prayer_text.clone(),
        }
    }

    fn to_domain(self) -> DevotionRecord {
        DevotionRecord {
            id: self.id,
            date: self.date,
            scripture: self
                .scripture
                .into_iter()
                .map(|p| ScripturePassage {
                    reference: p.reference,
                    text: p.text,
                })
                .collect(),
            observation: self.observation,
            application: self.application,
            prayer_text: self.prayer_text,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct StoredCheckIn {
    id: Uuid,
    date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mood: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<String>,
}

impl StoredCheckIn {
    fn from_domain(check_in: &CheckInRecord) -> Self {
        Self {
            id: check_in.id,
            date: check_in.date,
            mood: check_in.mood.clone(),
            note: check_in.note.clone(),
        }
    }

    fn to_domain(self) -> CheckInRecord {
        CheckInRecord {
            id: self.id,
            date: self.date,
            mood: self.mood,
            note: self.note,
        }
    }
}

//=========================================================================================
// `LocalStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl LocalStore for JsonFileStore {
    async fn load_devotion_records(&self) -> PortResult<Vec<DevotionRecord>> {
        let stored: Vec<StoredDevotionRecord> = self.load_list(KEY_DEVOTIONS).await?;
        Ok(stored.into_iter().map(StoredDevotionRecord::to_domain).collect())
    }

    async fn save_devotion_records(&self, records: &[DevotionRecord]) -> PortResult<()> {
        let stored: Vec<StoredDevotionRecord> = records
            .iter()
            .map(StoredDevotionRecord::from_domain)
            .collect();
        self.save_list(KEY_DEVOTIONS, &stored).await
    }

    async fn load_check_ins(&self) -> PortResult<Vec<CheckInRecord>> {
        let stored: Vec<StoredCheckIn> = self.load_list(KEY_CHECKINS).await?;
        Ok(stored.into_iter().map(StoredCheckIn::to_domain).collect())
    }

    async fn save_check_ins(&self, check_ins: &[CheckInRecord]) -> PortResult<()> {
        let stored: Vec<StoredCheckIn> =
            check_ins.iter().map(StoredCheckIn::from_domain).collect();
        self.save_list(KEY_CHECKINS, &stored).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> JsonFileStore {
        let dir = std::env::temp_dir().join(format!("devotion-local-{}", Uuid::new_v4()));
        JsonFileStore::new(dir)
    }

    #[tokio::test]
    async fn missing_files_read_as_empty_lists() {
        let store = temp_store();
        assert!(store.load_devotion_records().await.unwrap().is_empty());
        assert!(store.load_check_ins().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn devotion_records_survive_a_save_and_load() {
        let store = temp_store();
        let record = DevotionRecord {
            id: Uuid::new_v4(),
            date: Utc::now(),
            scripture: vec![ScripturePassage {
                reference: "Psalm 46:10".to_string(),
                text: "Be still, and know that I am God.".to_string(),
            }],
            observation: "stillness".to_string(),
            application: "pause before reacting".to_string(),
            prayer_text: "teach me to rest".to_string(),
        };
        store.save_devotion_records(&[record.clone()]).await.unwrap();

        let loaded = store.load_devotion_records().await.unwrap();
        assert_eq!(loaded, vec![record]);
    }

    #[tokio::test]
    async fn check_ins_keep_absent_optional_fields_absent() {
        let store = temp_store();
        let check_in = CheckInRecord {
            id: Uuid::new_v4(),
            date: Utc::now(),
            mood: Some("😊".to_string()),
            note: None,
        };
        store.save_check_ins(&[check_in.clone()]).await.unwrap();

        let raw = tokio::fs::read_to_string(store.path_for(KEY_CHECKINS))
            .await
            .unwrap();
        assert!(!raw.contains("note"));
        assert_eq!(store.load_check_ins().await.unwrap(), vec![check_in]);
    }

    #[tokio::test]
    async fn corrupt_file_reads_as_empty() {
        let store = temp_store();
        tokio::fs::create_dir_all(&store.dir).await.unwrap();
        tokio::fs::write(store.path_for(KEY_CHECKINS), b"{ not json")
            .await
            .unwrap();
        assert!(store.load_check_ins().await.unwrap().is_empty());
    }
}
