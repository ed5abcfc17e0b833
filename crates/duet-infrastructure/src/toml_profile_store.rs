//! TOML-directory implementation of the ProfileStore trait.
//!
//! One `<user_id>.toml` file per profile plus an `interactions.toml` ledger,
//! all under a single store directory. Writes are atomic (temporary file +
//! fsync + rename); multi-row operations take an exclusive `fs2` lock on a
//! lock file plus an in-process writer mutex, so `commit_pairing` performs
//! its compare-and-swap against rows no other writer can touch mid-flight.
//!
//! The directory is the durable source of truth: after a process restart
//! the session cache is empty and repopulates lazily from these files.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use duet_core::error::{DuetError, Result};
use duet_core::profile::{
    ChatStatus, InteractionRecord, ProfileStore, UserId, UserProfile, DISLIKE_SCORE,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::Write as IoWrite;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

const LEDGER_FILE: &str = "interactions.toml";
const LOCK_FILE: &str = "store.lock";

/// On-disk shape of the interaction ledger.
#[derive(Debug, Default, Serialize, Deserialize)]
struct InteractionLedger {
    #[serde(default)]
    records: Vec<InteractionRecord>,
}

/// Durable profile store over a directory of TOML files.
pub struct TomlProfileStore {
    root: PathBuf,
    // Serializes writers within this process; the fs2 lock below covers
    // other processes sharing the directory.
    writer: Mutex<()>,
}

impl TomlProfileStore {
    /// Opens (creating if needed) a store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            writer: Mutex::new(()),
        })
    }

    fn profile_path(&self, user_id: UserId) -> PathBuf {
        self.root.join(format!("{}.toml", user_id))
    }

    fn ledger_path(&self) -> PathBuf {
        self.root.join(LEDGER_FILE)
    }

    fn load_profile_at(path: &Path) -> Result<Option<UserProfile>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(None);
        }
        let profile = toml::from_str(&content).map_err(de_err)?;
        Ok(Some(profile))
    }

    fn load_profile_sync(&self, user_id: UserId) -> Result<Option<UserProfile>> {
        Self::load_profile_at(&self.profile_path(user_id))
    }

    /// Atomic write: temporary file in the same directory, fsync, rename.
    fn write_toml<T: Serialize>(&self, path: &Path, data: &T) -> Result<()> {
        let toml_string = toml::to_string_pretty(data).map_err(ser_err)?;

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| DuetError::io("path has no file name"))?;
        let tmp_path = self.root.join(format!(".{}.tmp", file_name));

        let mut tmp_file = File::create(&tmp_path)?;
        tmp_file.write_all(toml_string.as_bytes())?;
        tmp_file.sync_all()?;
        drop(tmp_file);

        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    fn save_profile_sync(&self, profile: &UserProfile) -> Result<()> {
        self.write_toml(&self.profile_path(profile.user_id), profile)
    }

    fn load_ledger(&self) -> Result<InteractionLedger> {
        let path = self.ledger_path();
        if !path.exists() {
            return Ok(InteractionLedger::default());
        }
        let content = fs::read_to_string(&path)?;
        if content.trim().is_empty() {
            return Ok(InteractionLedger::default());
        }
        toml::from_str(&content).map_err(de_err)
    }

    /// Load-mutate-save on a single profile row under the writer mutex.
    async fn update_profile<F>(&self, user_id: UserId, f: F) -> Result<()>
    where
        F: FnOnce(&mut UserProfile),
    {
        let _guard = self.writer.lock().await;
        let Some(mut profile) = self.load_profile_sync(user_id)? else {
            return Ok(());
        };
        f(&mut profile);
        self.save_profile_sync(&profile)
    }
}

fn de_err(e: toml::de::Error) -> DuetError {
    DuetError::Serialization {
        format: "TOML".to_string(),
        message: e.to_string(),
    }
}

fn ser_err(e: toml::ser::Error) -> DuetError {
    DuetError::Serialization {
        format: "TOML".to_string(),
        message: e.to_string(),
    }
}

/// RAII guard over an exclusive fs2 lock on the store's lock file.
struct StoreLock {
    _file: File,
}

impl StoreLock {
    fn acquire(root: &Path) -> Result<Self> {
        let lock_path = root.join(LOCK_FILE);
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        #[cfg(unix)]
        {
            use fs2::FileExt;
            file.lock_exclusive()
                .map_err(|e| DuetError::store(format!("failed to acquire store lock: {}", e)))?;
        }

        Ok(StoreLock { _file: file })
    }
}

#[async_trait]
impl ProfileStore for TomlProfileStore {
    async fn get_profile(&self, user_id: UserId) -> Result<Option<UserProfile>> {
        self.load_profile_sync(user_id)
    }

    async fn upsert_profile(
        &self,
        user_id: UserId,
        username: Option<String>,
        display_name: Option<String>,
    ) -> Result<UserProfile> {
        let _guard = self.writer.lock().await;
        let mut profile = self
            .load_profile_sync(user_id)?
            .unwrap_or_else(|| UserProfile::new(user_id));
        profile.username = username;
        profile.display_name = display_name;
        self.save_profile_sync(&profile)?;
        Ok(profile)
    }

    async fn save_profile(&self, profile: &UserProfile) -> Result<()> {
        let _guard = self.writer.lock().await;
        self.save_profile_sync(profile)
    }

    async fn set_status(&self, user_id: UserId, status: ChatStatus) -> Result<()> {
        self.update_profile(user_id, |p| {
            p.status = status;
            p.searching_since = match status {
                ChatStatus::Searching => Some(Utc::now()),
                _ => None,
            };
        })
        .await
    }

    async fn set_partner(&self, user_id: UserId, partner: Option<UserId>) -> Result<()> {
        self.update_profile(user_id, |p| p.partner_id = partner).await
    }

    async fn mark_searching(&self, user_id: UserId) -> Result<bool> {
        let _guard = self.writer.lock().await;
        let _lock = StoreLock::acquire(&self.root)?;
        let Some(mut profile) = self.load_profile_sync(user_id)? else {
            return Ok(false);
        };
        if profile.status == ChatStatus::Chatting {
            return Ok(false);
        }
        profile.status = ChatStatus::Searching;
        profile.searching_since = Some(Utc::now());
        self.save_profile_sync(&profile)?;
        Ok(true)
    }

    async fn cancel_if_searching(&self, user_id: UserId) -> Result<bool> {
        let _guard = self.writer.lock().await;
        let _lock = StoreLock::acquire(&self.root)?;
        let Some(mut profile) = self.load_profile_sync(user_id)? else {
            return Ok(false);
        };
        if profile.status != ChatStatus::Searching {
            return Ok(false);
        }
        profile.status = ChatStatus::Idle;
        profile.searching_since = None;
        self.save_profile_sync(&profile)?;
        Ok(true)
    }

    async fn query_candidates(&self, exclude: UserId) -> Result<Vec<UserProfile>> {
        let now = Utc::now();
        let mut candidates = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            // Profile files are named "<numeric id>.toml"; skip the ledger,
            // the lock file, and temporaries.
            let is_profile = path.extension().is_some_and(|ext| ext == "toml")
                && path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .is_some_and(|s| s.parse::<i64>().is_ok());
            if !is_profile {
                continue;
            }
            match Self::load_profile_at(&path) {
                Ok(Some(p))
                    if p.status == ChatStatus::Searching
                        && p.user_id != exclude
                        && !p.is_banned(now) =>
                {
                    candidates.push(p);
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable profile file");
                }
            }
        }
        // Directory order is arbitrary; sort so the scorer's first-seen
        // tie-break stays deterministic.
        candidates.sort_by_key(|p| p.user_id);
        Ok(candidates)
    }

    async fn commit_pairing(&self, a: UserId, b: UserId) -> Result<bool> {
        let _guard = self.writer.lock().await;
        let _lock = StoreLock::acquire(&self.root)?;

        // Compare-and-swap: re-read both rows under the lock.
        let Some(row_a) = self.load_profile_sync(a)? else {
            return Ok(false);
        };
        let Some(row_b) = self.load_profile_sync(b)? else {
            return Ok(false);
        };
        if row_a.status != ChatStatus::Searching || row_b.status != ChatStatus::Searching {
            return Ok(false);
        }

        let mut new_a = row_a.clone();
        new_a.status = ChatStatus::Chatting;
        new_a.partner_id = Some(b);
        new_a.searching_since = None;
        let mut new_b = row_b;
        new_b.status = ChatStatus::Chatting;
        new_b.partner_id = Some(a);
        new_b.searching_since = None;

        self.save_profile_sync(&new_a)?;
        if let Err(e) = self.save_profile_sync(&new_b) {
            // Never leave one side chatting while the other still searches.
            tracing::error!(a = %a, b = %b, error = %e, "pairing write failed, rolling back first row");
            self.save_profile_sync(&row_a)?;
            return Err(e);
        }
        Ok(true)
    }

    async fn clear_pairing(&self, a: UserId, b: UserId) -> Result<()> {
        let _guard = self.writer.lock().await;
        let _lock = StoreLock::acquire(&self.root)?;
        for user in [a, b] {
            if let Some(mut profile) = self.load_profile_sync(user)? {
                profile.status = ChatStatus::Idle;
                profile.partner_id = None;
                profile.searching_since = None;
                self.save_profile_sync(&profile)?;
            }
        }
        Ok(())
    }

    async fn increment_report_count(&self, user_id: UserId) -> Result<u32> {
        let _guard = self.writer.lock().await;
        let mut profile = self
            .load_profile_sync(user_id)?
            .unwrap_or_else(|| UserProfile::new(user_id));
        profile.report_count += 1;
        self.save_profile_sync(&profile)?;
        Ok(profile.report_count)
    }

    async fn set_banned_until(
        &self,
        user_id: UserId,
        until: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.update_profile(user_id, |p| p.banned_until = until).await
    }

    async fn record_interaction(&self, rater: UserId, target: UserId, score: i8) -> Result<()> {
        let _guard = self.writer.lock().await;
        let mut ledger = self.load_ledger()?;
        ledger.records.push(InteractionRecord {
            rater_id: rater,
            target_id: target,
            score,
            recorded_at: Utc::now(),
        });
        self.write_toml(&self.ledger_path(), &ledger)
    }

    async fn dislike_set(&self, rater: UserId) -> Result<HashSet<UserId>> {
        Ok(self
            .load_ledger()?
            .records
            .iter()
            .filter(|r| r.rater_id == rater && r.score == DISLIKE_SCORE)
            .map(|r| r.target_id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn searching(id: i64) -> UserProfile {
        let mut p = UserProfile::new(UserId(id));
        p.status = ChatStatus::Searching;
        p.searching_since = Some(Utc::now());
        p
    }

    #[tokio::test]
    async fn profile_round_trips_through_disk() {
        let dir = TempDir::new().unwrap();
        let store = TomlProfileStore::new(dir.path()).unwrap();

        let mut profile = UserProfile::new(UserId(42));
        profile.interests = ["music", "gaming"].iter().map(|s| s.to_string()).collect();
        profile.language = "Hindi".to_string();
        store.save_profile(&profile).await.unwrap();

        let loaded = store.get_profile(UserId(42)).await.unwrap().unwrap();
        assert_eq!(loaded, profile);
    }

    #[tokio::test]
    async fn upsert_twice_keeps_one_profile() {
        let dir = TempDir::new().unwrap();
        let store = TomlProfileStore::new(dir.path()).unwrap();

        store
            .upsert_profile(UserId(1), Some("a".into()), None)
            .await
            .unwrap();
        let updated = store
            .upsert_profile(UserId(1), Some("b".into()), Some("B".into()))
            .await
            .unwrap();
        assert_eq!(updated.username.as_deref(), Some("b"));

        let candidates = fs::read_dir(dir.path())
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .path()
                    .extension()
                    .is_some_and(|x| x == "toml")
            })
            .count();
        assert_eq!(candidates, 1);
    }

    #[tokio::test]
    async fn pairing_survives_a_reopen() {
        // A new store instance over the same directory models a restart.
        let dir = TempDir::new().unwrap();
        {
            let store = TomlProfileStore::new(dir.path()).unwrap();
            store.save_profile(&searching(1)).await.unwrap();
            store.save_profile(&searching(2)).await.unwrap();
            assert!(store.commit_pairing(UserId(1), UserId(2)).await.unwrap());
        }

        let reopened = TomlProfileStore::new(dir.path()).unwrap();
        let a = reopened.get_profile(UserId(1)).await.unwrap().unwrap();
        let b = reopened.get_profile(UserId(2)).await.unwrap().unwrap();
        assert_eq!(a.status, ChatStatus::Chatting);
        assert_eq!(a.partner_id, Some(UserId(2)));
        assert_eq!(b.partner_id, Some(UserId(1)));
    }

    #[tokio::test]
    async fn commit_pairing_cas_refuses_claimed_users() {
        let dir = TempDir::new().unwrap();
        let store = TomlProfileStore::new(dir.path()).unwrap();
        store.save_profile(&searching(1)).await.unwrap();
        store.save_profile(&searching(2)).await.unwrap();
        store.save_profile(&searching(3)).await.unwrap();

        assert!(store.commit_pairing(UserId(1), UserId(2)).await.unwrap());
        // User 2 is now chatting; a second claim must fail cleanly.
        assert!(!store.commit_pairing(UserId(3), UserId(2)).await.unwrap());
        let three = store.get_profile(UserId(3)).await.unwrap().unwrap();
        assert_eq!(three.status, ChatStatus::Searching);
        assert_eq!(three.partner_id, None);
    }

    #[tokio::test]
    async fn cancel_refuses_once_a_pairing_committed() {
        let dir = TempDir::new().unwrap();
        let store = TomlProfileStore::new(dir.path()).unwrap();
        store.save_profile(&searching(1)).await.unwrap();
        store.save_profile(&searching(2)).await.unwrap();
        assert!(store.commit_pairing(UserId(1), UserId(2)).await.unwrap());

        assert!(!store.cancel_if_searching(UserId(1)).await.unwrap());
        assert!(!store.mark_searching(UserId(1)).await.unwrap());
        let a = store.get_profile(UserId(1)).await.unwrap().unwrap();
        assert_eq!(a.status, ChatStatus::Chatting);
        assert_eq!(a.partner_id, Some(UserId(2)));

        store.clear_pairing(UserId(1), UserId(2)).await.unwrap();
        assert!(store.mark_searching(UserId(1)).await.unwrap());
        assert!(store.cancel_if_searching(UserId(1)).await.unwrap());
    }

    #[tokio::test]
    async fn candidates_ignore_the_ledger_and_lock_files() {
        let dir = TempDir::new().unwrap();
        let store = TomlProfileStore::new(dir.path()).unwrap();
        store.save_profile(&searching(1)).await.unwrap();
        store.save_profile(&searching(2)).await.unwrap();
        store
            .record_interaction(UserId(1), UserId(2), DISLIKE_SCORE)
            .await
            .unwrap();
        // Locking creates store.lock as a side effect.
        store.clear_pairing(UserId(7), UserId(8)).await.unwrap();

        let ids: Vec<UserId> = store
            .query_candidates(UserId(1))
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.user_id)
            .collect();
        assert_eq!(ids, vec![UserId(2)]);
    }

    #[tokio::test]
    async fn corrupt_profile_files_are_skipped_not_fatal() {
        let dir = TempDir::new().unwrap();
        let store = TomlProfileStore::new(dir.path()).unwrap();
        store.save_profile(&searching(1)).await.unwrap();
        store.save_profile(&searching(2)).await.unwrap();
        fs::write(dir.path().join("2.toml"), "not = [valid").unwrap();

        let ids: Vec<UserId> = store
            .query_candidates(UserId(99))
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.user_id)
            .collect();
        assert_eq!(ids, vec![UserId(1)]);
    }

    #[tokio::test]
    async fn ledger_accumulates_and_filters() {
        let dir = TempDir::new().unwrap();
        let store = TomlProfileStore::new(dir.path()).unwrap();
        store
            .record_interaction(UserId(1), UserId(2), DISLIKE_SCORE)
            .await
            .unwrap();
        store
            .record_interaction(UserId(1), UserId(2), DISLIKE_SCORE)
            .await
            .unwrap();
        store
            .record_interaction(UserId(1), UserId(3), 1)
            .await
            .unwrap();

        // Duplicate dislikes are history, not an error; the set collapses them.
        let dislikes = store.dislike_set(UserId(1)).await.unwrap();
        assert_eq!(dislikes, [UserId(2)].into_iter().collect());
        assert_eq!(store.load_ledger().unwrap().records.len(), 3);
    }
}
