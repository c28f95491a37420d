//! services/api/src/sync.rs
//!
//! Orchestrates the local JSON store and the cloud store behind one pair of
//! load/save operations per record kind. The local store is always written
//! first so a cloud outage can never lose a record; cloud failures degrade
//! to local-only operation and are surfaced as a warning string for the
//! handlers to show the user.

use std::sync::Arc;

use devotion_core::domain::{CheckInRecord, DevotionRecord};
use devotion_core::merge::merge_by_day;
use devotion_core::ports::{CloudStore, LocalStore, PortResult};
use tracing::{info, warn};
use uuid::Uuid;

/// The result of a save: the list as it now stands, plus a user-visible
/// warning when the cloud half of the write failed.
#[derive(Debug)]
pub struct SyncOutcome<T> {
    pub records: Vec<T>,
    pub cloud_warning: Option<String>,
}

pub struct RecordSyncService {
    cloud: Arc<dyn CloudStore>,
    local: Arc<dyn LocalStore>,
}

impl RecordSyncService {
    pub fn new(cloud: Arc<dyn CloudStore>, local: Arc<dyn LocalStore>) -> Self {
        Self { cloud, local }
    }

    /// Loads check-ins. Signed in: fetch cloud, merge with local by calendar
    /// day, persist the merged list back to the local store, return it.
    /// A cloud failure falls back to the local list.
    pub async fn load_check_ins(&self, user_id: Option<Uuid>) -> PortResult<Vec<CheckInRecord>> {
        let local = self.local.load_check_ins().await?;
        let Some(uid) = user_id else {
            return Ok(sorted_by_date_desc(local));
        };

        match self.cloud.load_check_ins(uid).await {
            Ok(cloud) => {
                let merged = merge_by_day(&cloud, &local);
                if !merged.is_empty() {
                    if let Err(e) = self.local.save_check_ins(&merged).await {
                        warn!("Failed to persist merged check-ins locally: {e}");
                    }
                }
                info!(
                    cloud = cloud.len(),
                    local = local.len(),
                    merged = merged.len(),
                    "Check-ins reconciled"
                );
                Ok(merged)
            }
            Err(e) => {
                warn!("Cloud check-in load failed, using local records: {e}");
                Ok(sorted_by_date_desc(local))
            }
        }
    }

    /// Saves check-ins: local first, then pull the latest cloud list, merge,
    /// and write the merged list to both stores. Merging before the cloud
    /// write keeps two devices from overwriting each other's days.
    pub async fn save_check_ins(
        &self,
        check_ins: &[CheckInRecord],
        user_id: Option<Uuid>,
    ) -> PortResult<SyncOutcome<CheckInRecord>> {
        self.local.save_check_ins(check_ins).await?;
        let Some(uid) = user_id else {
            return Ok(SyncOutcome {
                records: check_ins.to_vec(),
                cloud_warning: None,
            });
        };

        let cloud_result = async {
            let cloud = self.cloud.load_check_ins(uid).await?;
            let merged = merge_by_day(&cloud, check_ins);
            self.cloud.replace_check_ins(uid, &merged).await?;
            Ok::<_, devotion_core::ports::PortError>(merged)
        }
        .await;

        match cloud_result {
            Ok(merged) => {
                if let Err(e) = self.local.save_check_ins(&merged).await {
                    warn!("Failed to persist merged check-ins locally: {e}");
                }
                Ok(SyncOutcome {
                    records: merged,
                    cloud_warning: None,
                })
            }
            Err(e) => {
                warn!("Cloud check-in sync failed, saved locally: {e}");
                Ok(SyncOutcome {
                    records: check_ins.to_vec(),
                    cloud_warning: Some(
                        "Cloud sync failed; your check-in was saved on this device only."
                            .to_string(),
                    ),
                })
            }
        }
    }

    /// Loads devotion records. Signed in, the cloud list wins outright, even
    /// when empty, so a deletion on another device is not resurrected from
    /// this device's local copy. Cloud errors fall back to local.
    pub async fn load_devotion_records(
        &self,
        user_id: Option<Uuid>,
    ) -> PortResult<Vec<DevotionRecord>> {
        if let Some(uid) = user_id {
            match self.cloud.load_devotion_records(uid).await {
                Ok(cloud) => {
                    info!(count = cloud.len(), "Loaded devotion records from cloud");
                    return Ok(sorted_by_date_desc(cloud));
                }
                Err(e) => {
                    warn!("Cloud devotion load failed, using local records: {e}");
                }
            }
        }
        Ok(sorted_by_date_desc(self.local.load_devotion_records().await?))
    }

    /// Saves devotion records: always local first, then replace the cloud
    /// list wholesale (that is also how deletions propagate).
    pub async fn save_devotion_records(
        &self,
        records: &[DevotionRecord],
        user_id: Option<Uuid>,
    ) -> PortResult<SyncOutcome<DevotionRecord>> {
        self.local.save_devotion_records(records).await?;
        let mut cloud_warning = None;
        if let Some(uid) = user_id {
            if let Err(e) = self.cloud.replace_devotion_records(uid, records).await {
                warn!("Cloud devotion sync failed, saved locally: {e}");
                cloud_warning = Some(
                    "Cloud sync failed; your devotion record was saved on this device only."
                        .to_string(),
                );
            }
        }
        Ok(SyncOutcome {
            records: records.to_vec(),
            cloud_warning,
        })
    }
}

fn sorted_by_date_desc<T: devotion_core::merge::DayKeyed>(mut records: Vec<T>) -> Vec<T> {
    records.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()));
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, Utc};
    use devotion_core::domain::{User, UserCredentials};
    use devotion_core::ports::PortError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeCloud {
        devotions: Mutex<Vec<DevotionRecord>>,
        check_ins: Mutex<Vec<CheckInRecord>>,
        fail: bool,
    }

    impl FakeCloud {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        fn check_result<T>(&self, value: T) -> PortResult<T> {
            if self.fail {
                Err(PortError::Unexpected("cloud unavailable".to_string()))
            } else {
                Ok(value)
            }
        }
    }

    #[async_trait]
    impl CloudStore for FakeCloud {
        async fn create_user_with_email(&self, _: &str, _: &str) -> PortResult<User> {
            unimplemented!("not exercised by sync tests")
        }
        async fn get_user_by_email(&self, _: &str) -> PortResult<UserCredentials> {
            unimplemented!("not exercised by sync tests")
        }
        async fn create_auth_session(
            &self,
            _: &str,
            _: Uuid,
            _: DateTime<Utc>,
        ) -> PortResult<()> {
            unimplemented!("not exercised by sync tests")
        }
        async fn validate_auth_session(&self, _: &str) -> PortResult<Uuid> {
            unimplemented!("not exercised by sync tests")
        }
        async fn delete_auth_session(&self, _: &str) -> PortResult<()> {
            unimplemented!("not exercised by sync tests")
        }

        async fn load_devotion_records(&self, _: Uuid) -> PortResult<Vec<DevotionRecord>> {
            self.check_result(self.devotions.lock().unwrap().clone())
        }
        async fn replace_devotion_records(
            &self,
            _: Uuid,
            records: &[DevotionRecord],
        ) -> PortResult<()> {
            self.check_result(())?;
            *self.devotions.lock().unwrap() = records.to_vec();
            Ok(())
        }
        async fn load_check_ins(&self, _: Uuid) -> PortResult<Vec<CheckInRecord>> {
            self.check_result(self.check_ins.lock().unwrap().clone())
        }
        async fn replace_check_ins(
            &self,
            _: Uuid,
            check_ins: &[CheckInRecord],
        ) -> PortResult<()> {
            self.check_result(())?;
            *self.check_ins.lock().unwrap() = check_ins.to_vec();
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeLocal {
        devotions: Mutex<Vec<DevotionRecord>>,
        check_ins: Mutex<Vec<CheckInRecord>>,
    }

    #[async_trait]
    impl LocalStore for FakeLocal {
        async fn load_devotion_records(&self) -> PortResult<Vec<DevotionRecord>> {
            Ok(self.devotions.lock().unwrap().clone())
        }
        async fn save_devotion_records(&self, records: &[DevotionRecord]) -> PortResult<()> {
            *self.devotions.lock().unwrap() = records.to_vec();
            Ok(())
        }
        async fn load_check_ins(&self) -> PortResult<Vec<CheckInRecord>> {
            Ok(self.check_ins.lock().unwrap().clone())
        }
        async fn save_check_ins(&self, check_ins: &[CheckInRecord]) -> PortResult<()> {
            *self.check_ins.lock().unwrap() = check_ins.to_vec();
            Ok(())
        }
    }

    fn check_in(date: DateTime<Utc>, note: &str) -> CheckInRecord {
        CheckInRecord {
            id: Uuid::new_v4(),
            date,
            mood: None,
            note: Some(note.to_string()),
        }
    }

    fn devotion(date: DateTime<Utc>) -> DevotionRecord {
        DevotionRecord {
            id: Uuid::new_v4(),
            date,
            scripture: vec![],
            observation: "obs".to_string(),
            application: String::new(),
            prayer_text: String::new(),
        }
    }

    fn service(cloud: FakeCloud, local: FakeLocal) -> (RecordSyncService, Arc<FakeLocal>) {
        let local = Arc::new(local);
        (
            RecordSyncService::new(Arc::new(cloud), local.clone()),
            local,
        )
    }

    #[tokio::test]
    async fn anonymous_check_in_load_is_local_only() {
        let local = FakeLocal::default();
        *local.check_ins.lock().unwrap() = vec![check_in(Utc::now(), "only here")];
        let (sync, _) = service(FakeCloud::failing(), local);

        let loaded = sync.load_check_ins(None).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].note.as_deref(), Some("only here"));
    }

    #[tokio::test]
    async fn signed_in_check_in_load_merges_and_persists_locally() {
        let now = Utc::now();
        let cloud = FakeCloud::default();
        *cloud.check_ins.lock().unwrap() = vec![check_in(now, "a longer note here")];
        let local = FakeLocal::default();
        *local.check_ins.lock().unwrap() =
            vec![check_in(now, "short"), check_in(now - Duration::days(1), "yesterday")];
        let (sync, local) = service(cloud, local);

        let loaded = sync.load_check_ins(Some(Uuid::new_v4())).await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].note.as_deref(), Some("a longer note here"));
        // The merged list replaced the local copy.
        assert_eq!(local.check_ins.lock().unwrap().clone(), loaded);
    }

    #[tokio::test]
    async fn check_in_load_falls_back_to_local_on_cloud_failure() {
        let local = FakeLocal::default();
        *local.check_ins.lock().unwrap() = vec![check_in(Utc::now(), "kept")];
        let (sync, _) = service(FakeCloud::failing(), local);

        let loaded = sync.load_check_ins(Some(Uuid::new_v4())).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].note.as_deref(), Some("kept"));
    }

    #[tokio::test]
    async fn check_in_save_merges_with_cloud_before_writing_back() {
        let now = Utc::now();
        let cloud = FakeCloud::default();
        *cloud.check_ins.lock().unwrap() = vec![check_in(now - Duration::days(2), "older day")];
        let (sync, local) = service(cloud, FakeLocal::default());

        let outcome = sync
            .save_check_ins(&[check_in(now, "today")], Some(Uuid::new_v4()))
            .await
            .unwrap();
        assert!(outcome.cloud_warning.is_none());
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(local.check_ins.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn check_in_save_survives_cloud_failure_with_warning() {
        let (sync, local) = service(FakeCloud::failing(), FakeLocal::default());

        let outcome = sync
            .save_check_ins(&[check_in(Utc::now(), "precious")], Some(Uuid::new_v4()))
            .await
            .unwrap();
        assert!(outcome.cloud_warning.is_some());
        assert_eq!(outcome.records.len(), 1);
        // Local write happened before the cloud attempt.
        assert_eq!(local.check_ins.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn signed_in_devotion_load_prefers_cloud_even_when_empty() {
        let local = FakeLocal::default();
        *local.devotions.lock().unwrap() = vec![devotion(Utc::now())];
        let (sync, _) = service(FakeCloud::default(), local);

        // Cloud list is empty and still wins: a deletion elsewhere must not
        // be resurrected from this device.
        let loaded = sync
            .load_devotion_records(Some(Uuid::new_v4()))
            .await
            .unwrap();
        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn devotion_load_falls_back_to_local_on_cloud_failure() {
        let local = FakeLocal::default();
        *local.devotions.lock().unwrap() = vec![devotion(Utc::now())];
        let (sync, _) = service(FakeCloud::failing(), local);

        let loaded = sync
            .load_devotion_records(Some(Uuid::new_v4()))
            .await
            .unwrap();
        assert_eq!(loaded.len(), 1);
    }

    #[tokio::test]
    async fn devotion_save_replaces_the_cloud_list() {
        let cloud = FakeCloud::default();
        *cloud.devotions.lock().unwrap() =
            vec![devotion(Utc::now() - Duration::days(3)), devotion(Utc::now())];
        let keep = devotion(Utc::now());
        let (sync, local) = service(cloud, FakeLocal::default());

        let outcome = sync
            .save_devotion_records(std::slice::from_ref(&keep), Some(Uuid::new_v4()))
            .await
            .unwrap();
        assert!(outcome.cloud_warning.is_none());
        assert_eq!(local.devotions.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn load_results_are_sorted_date_descending() {
        let now = Utc::now();
        let local = FakeLocal::default();
        *local.check_ins.lock().unwrap() = vec![
            check_in(now - Duration::days(2), "oldest"),
            check_in(now, "newest"),
            check_in(now - Duration::days(1), "middle"),
        ];
        let (sync, _) = service(FakeCloud::default(), local);

        let loaded = sync.load_check_ins(None).await.unwrap();
        assert_eq!(loaded[0].note.as_deref(), Some("newest"));
        assert_eq!(loaded[2].note.as_deref(), Some("oldest"));
    }
}
