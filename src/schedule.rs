/// Automatic backups: period computation, file naming and the firing guard
use std::cell::Cell;

use chrono::{DateTime, Utc};
use log::{debug, error, info};
use serde::Serialize;

use crate::backup;
use crate::clock::Clock;
use crate::error::Result;
use crate::repository::Repository;
use crate::settings::IntervalUnit;
use crate::storage::StorageArea;

/// Name of the periodic alarm that triggers automatic backups
pub const BACKUP_ALARM: &str = "tab-shelf-auto-backup";

const DEFAULT_PERIOD_MINUTES: f64 = 60.0;

/// Alarm period in minutes for a backup interval
///
/// Unrecognized units and non-positive values fall back to hourly.
pub fn compute_next_period(value: f64, unit: IntervalUnit) -> f64 {
    if !value.is_finite() || value <= 0.0 {
        return DEFAULT_PERIOD_MINUTES;
    }

    match unit {
        IntervalUnit::Hours => value * 60.0,
        IntervalUnit::Days => value * 1440.0,
        IntervalUnit::Weeks => value * 10080.0,
        IntervalUnit::Unrecognized => DEFAULT_PERIOD_MINUTES,
    }
}

/// e.g. "tab-shelf-backup-2024-03-14-090500.json"
pub fn backup_filename(at: DateTime<Utc>) -> String {
    format!("tab-shelf-backup-{}.json", at.format("%Y-%m-%d-%H%M%S"))
}

/// Destination for exported files (a download, in the browser)
#[allow(async_fn_in_trait)]
pub trait FileEmitter {
    async fn emit(&self, filename: &str, mime: &str, contents: &str) -> Result<()>;
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum BackupOutcome {
    Written { filename: String, groups: usize },
    Disabled,
    AlreadyRunning,
}

/// Runs scheduled backups one at a time
///
/// A firing that arrives while the previous one is still writing is skipped
/// rather than queued.
#[derive(Debug, Default)]
pub struct BackupScheduler {
    in_flight: Cell<bool>,
}

struct InFlight<'a>(&'a Cell<bool>);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl BackupScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.get()
    }

    /// Handle one alarm firing
    ///
    /// Failures are logged and returned; they leave no state behind, so the
    /// next firing starts fresh.
    pub async fn run<S, C, E>(&self, repository: &Repository<S, C>, emitter: &E) -> Result<BackupOutcome>
    where
        S: StorageArea,
        C: Clock,
        E: FileEmitter,
    {
        if self.in_flight.replace(true) {
            debug!("Backup already in progress, skipping this firing");
            return Ok(BackupOutcome::AlreadyRunning);
        }
        let _guard = InFlight(&self.in_flight);

        let result = self.write_backup(repository, emitter).await;
        match &result {
            Ok(BackupOutcome::Written { filename, groups }) => {
                info!("Automatic backup {} written with {} groups", filename, groups)
            }
            Ok(_) => {}
            Err(e) => error!("Automatic backup failed: {}", e),
        }
        result
    }

    async fn write_backup<S, C, E>(&self, repository: &Repository<S, C>, emitter: &E) -> Result<BackupOutcome>
    where
        S: StorageArea,
        C: Clock,
        E: FileEmitter,
    {
        let settings = repository.load_settings().await?;
        if !settings.backup.enabled {
            return Ok(BackupOutcome::Disabled);
        }

        let now = repository.now();
        let document = repository.export_backup().await?;
        let contents = backup::to_json(&document)?;
        let filename = backup_filename(now);

        emitter.emit(&filename, "application/json", &contents).await?;
        repository.record_backup(now).await?;

        Ok(BackupOutcome::Written {
            filename,
            groups: document.groups.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use chrono::TimeZone;
    use futures::executor::block_on;
    use serde_json::json;

    use crate::clock::FixedClock;
    use crate::error::ShelfError;
    use crate::storage::{MemoryStorage, StorageMap};
    use crate::tab_data::TabEntry;

    #[derive(Default)]
    struct RecordingEmitter {
        files: RefCell<Vec<(String, String)>>,
        fail: bool,
    }

    impl FileEmitter for RecordingEmitter {
        async fn emit(&self, filename: &str, _mime: &str, contents: &str) -> Result<()> {
            if self.fail {
                return Err(ShelfError::Store("download refused".to_string()));
            }
            self.files
                .borrow_mut()
                .push((filename.to_string(), contents.to_string()));
            Ok(())
        }
    }

    struct UnreadableStorage;

    impl StorageArea for UnreadableStorage {
        async fn get(&self, _keys: &[&str]) -> Result<StorageMap> {
            Err(ShelfError::Store("storage.local.get failed".to_string()))
        }

        async fn set(&self, _items: StorageMap) -> Result<()> {
            Ok(())
        }
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 14, 9, 5, 0).unwrap()
    }

    fn repository() -> Repository<MemoryStorage, FixedClock> {
        Repository::new(MemoryStorage::new(), FixedClock(fixed_now()))
    }

    #[test]
    fn test_compute_next_period() {
        assert_eq!(compute_next_period(2.0, IntervalUnit::Days), 2880.0);
        assert_eq!(compute_next_period(1.0, IntervalUnit::Hours), 60.0);
        assert_eq!(compute_next_period(3.0, IntervalUnit::Weeks), 30240.0);
        assert_eq!(compute_next_period(0.5, IntervalUnit::Hours), 30.0);
    }

    #[test]
    fn test_compute_next_period_fallbacks() {
        assert_eq!(compute_next_period(5.0, IntervalUnit::Unrecognized), 60.0);
        assert_eq!(compute_next_period(0.0, IntervalUnit::Days), 60.0);
        assert_eq!(compute_next_period(-2.0, IntervalUnit::Days), 60.0);
        assert_eq!(compute_next_period(f64::NAN, IntervalUnit::Days), 60.0);
    }

    #[test]
    fn test_backup_filename() {
        assert_eq!(backup_filename(fixed_now()), "tab-shelf-backup-2024-03-14-090500.json");
    }

    #[test]
    fn test_disabled_backup_writes_nothing() {
        let repo = repository();
        let emitter = RecordingEmitter::default();

        let outcome = block_on(BackupScheduler::new().run(&repo, &emitter)).unwrap();

        assert_eq!(outcome, BackupOutcome::Disabled);
        assert!(emitter.files.borrow().is_empty());
    }

    #[test]
    fn test_enabled_backup_emits_and_records() {
        let repo = repository();
        let emitter = RecordingEmitter::default();
        let scheduler = BackupScheduler::new();

        block_on(async {
            repo.update_backup_settings(&json!({"enabled": true})).await.unwrap();
            repo.save_group(vec![TabEntry::new("https://a.com", "A")]).await.unwrap();

            let outcome = scheduler.run(&repo, &emitter).await.unwrap();
            assert_eq!(
                outcome,
                BackupOutcome::Written {
                    filename: "tab-shelf-backup-2024-03-14-090500.json".to_string(),
                    groups: 1,
                }
            );

            let settings = repo.load_settings().await.unwrap();
            assert_eq!(settings.last_backup_timestamp, Some(fixed_now().timestamp_millis()));
        });

        let files = emitter.files.borrow();
        assert_eq!(files.len(), 1);
        let document = backup::decode_str(&files[0].1).unwrap();
        assert_eq!(document.groups.len(), 1);
        assert!(!scheduler.is_running());
    }

    #[test]
    fn test_overlapping_firing_is_skipped() {
        let repo = repository();
        let emitter = RecordingEmitter::default();
        let scheduler = BackupScheduler::new();
        scheduler.in_flight.set(true);

        let outcome = block_on(scheduler.run(&repo, &emitter)).unwrap();

        assert_eq!(outcome, BackupOutcome::AlreadyRunning);
        // The skipped firing must not clear the running firing's flag
        assert!(scheduler.is_running());
    }

    #[test]
    fn test_failed_backup_releases_guard() {
        let repo = repository();
        let emitter = RecordingEmitter {
            fail: true,
            ..RecordingEmitter::default()
        };
        let scheduler = BackupScheduler::new();

        block_on(async {
            repo.update_backup_settings(&json!({"enabled": true})).await.unwrap();
            assert!(scheduler.run(&repo, &emitter).await.is_err());

            let settings = repo.load_settings().await.unwrap();
            assert_eq!(settings.last_backup_timestamp, None);
        });

        assert!(!scheduler.is_running());
    }

    #[test]
    fn test_unreadable_settings_fail_the_firing() {
        let repo = Repository::new(UnreadableStorage, FixedClock(fixed_now()));
        let emitter = RecordingEmitter::default();
        let scheduler = BackupScheduler::new();

        let err = block_on(scheduler.run(&repo, &emitter)).unwrap_err();

        assert!(matches!(err, ShelfError::Store(_)));
        assert!(emitter.files.borrow().is_empty());
        assert!(!scheduler.is_running());
    }
}
