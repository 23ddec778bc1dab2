// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-owner print status ledger: the cooldown lock.
//
// The ledger maps an owner to the time of their last print attempt. An owner
// is locked while that time lies less than the cooldown in the past. The
// file is small, so every mutation reloads it, edits the mapping and writes
// the whole thing back through a temp file + rename, which keeps a crash
// from leaving half a JSON document behind.
//
// Several processes share the file (a `watch` session running the sweep and
// any number of `print` invocations). Every reload-modify-persist runs under
// an exclusive advisory lock on the sidecar `<ledger>.lock`, so a mutation
// in one process is never overwritten by a stale copy in another.
//
// File format (compatible with earlier deployments):
//
//   { "J.Smith": { "last_print_time": "2026-10-18T09:12:44.123+00:00" } }

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use zeugnisdruck_core::error::{Result, ZeugnisError};

/// One owner's lock record as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// RFC 3339 on write; naive ISO-8601 (local time) accepted on read.
    pub last_print_time: String,
}

impl LedgerEntry {
    fn at(time: DateTime<Utc>) -> Self {
        Self {
            last_print_time: time.to_rfc3339(),
        }
    }

    /// Parsed timestamp, or `None` if the stored value is unreadable.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(&self.last_print_time) {
            return Some(dt.with_timezone(&Utc));
        }
        let naive = NaiveDateTime::parse_from_str(&self.last_print_time, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Exclusive lock on the ledger's sidecar file, released on drop.
struct WriterLock {
    file: File,
}

impl Drop for WriterLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn sidecar_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

/// File-backed cooldown ledger.
///
/// Not thread-safe by itself; share it through [`LedgerHandle`].
pub struct StatusLedger {
    path: PathBuf,
    lock_path: PathBuf,
    cooldown: Duration,
    entries: BTreeMap<String, LedgerEntry>,
}

impl StatusLedger {
    /// Open the ledger at `path`. A missing, empty, or corrupt file is an
    /// empty ledger.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>, cooldown: Duration) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries = read_entries(&path);
        debug!(entries = entries.len(), "status ledger opened");
        Self {
            lock_path: sidecar_path(&path),
            path,
            cooldown,
            entries,
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Block until this process is the only writer of the ledger file.
    fn writer_lock(&self) -> Result<WriterLock> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.lock_path)
            .map_err(|e| ZeugnisError::Ledger(format!("open {}: {e}", self.lock_path.display())))?;
        FileExt::lock_exclusive(&file)
            .map_err(|e| ZeugnisError::Ledger(format!("lock {}: {e}", self.lock_path.display())))?;
        Ok(WriterLock { file })
    }

    /// Pick up changes written by another process.
    pub fn reload(&mut self) {
        self.entries = read_entries(&self.path);
    }

    /// Owners currently holding an entry (expired or not), sorted.
    pub fn owners(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn last_print_time(&self, owner: &str) -> Option<DateTime<Utc>> {
        self.entries.get(owner).and_then(LedgerEntry::timestamp)
    }

    /// True while `now - last_print_time < cooldown`.
    pub fn is_blocked(&self, owner: &str, now: DateTime<Utc>) -> bool {
        self.remaining(owner, now).is_some()
    }

    /// Time left on the owner's lock, if locked.
    pub fn remaining(&self, owner: &str, now: DateTime<Utc>) -> Option<Duration> {
        let last = self.last_print_time(owner)?;
        let left = self.cooldown - (now - last);
        (left > Duration::zero()).then_some(left)
    }

    /// Write `last_print_time = now` for `owner`, unconditionally.
    #[instrument(skip(self, now))]
    pub fn acquire(&mut self, owner: &str, now: DateTime<Utc>) -> Result<()> {
        let _writer = self.writer_lock()?;
        self.reload();
        self.entries.insert(owner.to_owned(), LedgerEntry::at(now));
        self.persist()?;
        info!(owner, "print lock acquired");
        Ok(())
    }

    /// Check and acquire in one step. Returns `false`, leaving the ledger
    /// untouched, if the owner is still locked.
    #[instrument(skip(self, now))]
    pub fn try_acquire(&mut self, owner: &str, now: DateTime<Utc>) -> Result<bool> {
        let _writer = self.writer_lock()?;
        self.reload();
        if self.is_blocked(owner, now) {
            debug!(owner, "owner still inside cooldown");
            return Ok(false);
        }
        self.entries.insert(owner.to_owned(), LedgerEntry::at(now));
        self.persist()?;
        info!(owner, "print lock acquired");
        Ok(true)
    }

    /// Remove the owner's entry. Releasing an unlocked owner is a no-op.
    #[instrument(skip(self))]
    pub fn release(&mut self, owner: &str) -> Result<()> {
        let _writer = self.writer_lock()?;
        self.reload();
        if self.entries.remove(owner).is_none() {
            return Ok(());
        }
        self.persist()?;
        info!(owner, "print lock released");
        Ok(())
    }

    /// Drop the owner's entry if its cooldown has elapsed. Returns whether
    /// an entry was removed.
    #[instrument(skip(self, now))]
    pub fn reap_expired(&mut self, owner: &str, now: DateTime<Utc>) -> Result<bool> {
        let _writer = self.writer_lock()?;
        self.reload();
        if !self.entries.contains_key(owner) || self.is_blocked(owner, now) {
            return Ok(false);
        }
        self.entries.remove(owner);
        self.persist()?;
        debug!(owner, "expired print lock removed");
        Ok(true)
    }

    /// Drop every expired entry. Entries with unreadable timestamps count as
    /// expired. Returns the released owners.
    #[instrument(skip_all)]
    pub fn reap_all_expired(&mut self, now: DateTime<Utc>) -> Result<Vec<String>> {
        let _writer = self.writer_lock()?;
        self.reload();
        let expired: Vec<String> = self
            .entries
            .keys()
            .filter(|owner| !self.is_blocked(owner, now))
            .cloned()
            .collect();
        if expired.is_empty() {
            return Ok(expired);
        }
        for owner in &expired {
            self.entries.remove(owner);
        }
        self.persist()?;
        debug!(count = expired.len(), "expired print locks removed");
        Ok(expired)
    }

    /// Rewrite the ledger file atomically.
    fn persist(&self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let json = serde_json::to_vec_pretty(&self.entries)?;

        let mut temp = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| ZeugnisError::Ledger(format!("temp file in {}: {e}", dir.display())))?;
        temp.as_file_mut()
            .write_all(&json)
            .map_err(|e| ZeugnisError::Ledger(format!("write temp file: {e}")))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| ZeugnisError::Ledger(format!("sync temp file: {e}")))?;
        temp.persist(&self.path)
            .map_err(|e| ZeugnisError::Ledger(format!("replace {}: {e}", self.path.display())))?;
        Ok(())
    }
}

/// Read the mapping, treating every failure as an empty ledger.
fn read_entries(path: &Path) -> BTreeMap<String, LedgerEntry> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "status ledger unreadable, treating as empty");
            return BTreeMap::new();
        }
    };
    if content.trim().is_empty() {
        return BTreeMap::new();
    }
    serde_json::from_str(&content).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "status ledger corrupt, treating as empty");
        BTreeMap::new()
    })
}

/// Shared, serialised access to the ledger.
///
/// Every reader and writer (transaction engine, background sweep, CLI)
/// goes through the same mutex, so a check-and-acquire can never interleave
/// with another mutation inside this process. Other processes are kept out
/// by the sidecar file lock.
#[derive(Clone)]
pub struct LedgerHandle {
    inner: Arc<Mutex<StatusLedger>>,
}

impl LedgerHandle {
    pub fn new(ledger: StatusLedger) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ledger)),
        }
    }

    pub fn open(path: impl AsRef<Path>, cooldown: Duration) -> Self {
        Self::new(StatusLedger::open(path, cooldown))
    }

    fn lock(&self) -> Result<MutexGuard<'_, StatusLedger>> {
        self.inner
            .lock()
            .map_err(|_| ZeugnisError::Ledger("ledger lock poisoned".into()))
    }

    pub fn is_blocked(&self, owner: &str, now: DateTime<Utc>) -> Result<bool> {
        let mut ledger = self.lock()?;
        ledger.reload();
        Ok(ledger.is_blocked(owner, now))
    }

    pub fn remaining(&self, owner: &str, now: DateTime<Utc>) -> Result<Option<Duration>> {
        let mut ledger = self.lock()?;
        ledger.reload();
        Ok(ledger.remaining(owner, now))
    }

    pub fn last_print_time(&self, owner: &str) -> Result<Option<DateTime<Utc>>> {
        let mut ledger = self.lock()?;
        ledger.reload();
        Ok(ledger.last_print_time(owner))
    }

    pub fn acquire(&self, owner: &str, now: DateTime<Utc>) -> Result<()> {
        self.lock()?.acquire(owner, now)
    }

    pub fn try_acquire(&self, owner: &str, now: DateTime<Utc>) -> Result<bool> {
        self.lock()?.try_acquire(owner, now)
    }

    pub fn release(&self, owner: &str) -> Result<()> {
        self.lock()?.release(owner)
    }

    pub fn reap_expired(&self, owner: &str, now: DateTime<Utc>) -> Result<bool> {
        self.lock()?.reap_expired(owner, now)
    }

    pub fn reap_all_expired(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        self.lock()?.reap_all_expired(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger_in(dir: &tempfile::TempDir) -> StatusLedger {
        StatusLedger::open(dir.path().join("status.json"), Duration::minutes(10))
    }

    #[test]
    fn blocked_right_after_acquire_and_free_after_cooldown() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut ledger = ledger_in(&dir);
        let t0 = Utc::now();

        ledger.acquire("J.Smith", t0).expect("acquire");
        assert!(ledger.is_blocked("J.Smith", t0));
        assert!(ledger.is_blocked("J.Smith", t0 + Duration::minutes(9)));
        assert!(!ledger.is_blocked("J.Smith", t0 + Duration::minutes(10)));
        assert!(!ledger.is_blocked("K.Weber", t0));
    }

    #[test]
    fn release_unlocks_and_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut ledger = ledger_in(&dir);
        let now = Utc::now();

        ledger.acquire("J.Smith", now).expect("acquire");
        ledger.release("J.Smith").expect("release");
        assert!(!ledger.is_blocked("J.Smith", now));
        ledger.release("J.Smith").expect("second release is a no-op");
        ledger.release("never-locked").expect("release unknown owner");
    }

    #[test]
    fn try_acquire_refuses_locked_owner_without_touching_timestamp() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut ledger = ledger_in(&dir);
        let t0 = Utc::now() - Duration::minutes(3);

        ledger.acquire("J.Smith", t0).expect("acquire");
        let before = ledger.last_print_time("J.Smith");
        assert!(!ledger.try_acquire("J.Smith", Utc::now()).expect("try_acquire"));
        assert_eq!(ledger.last_print_time("J.Smith"), before);
    }

    #[test]
    fn try_acquire_takes_expired_lock() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut ledger = ledger_in(&dir);
        let now = Utc::now();

        ledger.acquire("J.Smith", now - Duration::minutes(11)).expect("acquire");
        assert!(ledger.try_acquire("J.Smith", now).expect("try_acquire"));
        assert!(ledger.is_blocked("J.Smith", now));
    }

    #[test]
    fn state_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let now = Utc::now();
        ledger_in(&dir).acquire("J.Smith", now).expect("acquire");

        let reopened = ledger_in(&dir);
        assert!(reopened.is_blocked("J.Smith", now + Duration::minutes(1)));
    }

    #[test]
    fn reap_expired_only_removes_elapsed_entries() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut ledger = ledger_in(&dir);
        let now = Utc::now();

        ledger.acquire("old", now - Duration::minutes(20)).expect("acquire");
        ledger.acquire("fresh", now).expect("acquire");

        assert!(!ledger.reap_expired("fresh", now).expect("reap"));
        assert!(ledger.reap_expired("old", now).expect("reap"));
        assert_eq!(ledger.owners(), vec!["fresh".to_string()]);
    }

    #[test]
    fn sweep_removes_all_expired() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut ledger = ledger_in(&dir);
        let now = Utc::now();

        ledger.acquire("a", now - Duration::minutes(30)).expect("acquire");
        ledger.acquire("b", now - Duration::minutes(15)).expect("acquire");
        ledger.acquire("c", now).expect("acquire");

        let released = ledger.reap_all_expired(now).expect("sweep");
        assert_eq!(released, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(ledger.owners(), vec!["c".to_string()]);
    }

    #[test]
    fn corrupt_and_empty_files_are_empty_ledgers() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("status.json");

        std::fs::write(&path, "{ not json").expect("write");
        let ledger = StatusLedger::open(&path, Duration::minutes(10));
        assert!(ledger.owners().is_empty());

        std::fs::write(&path, "   \n").expect("write");
        let mut ledger = StatusLedger::open(&path, Duration::minutes(10));
        assert!(ledger.owners().is_empty());

        // A corrupt file is replaced on the next write.
        ledger.acquire("J.Smith", Utc::now()).expect("acquire");
        let text = std::fs::read_to_string(&path).expect("read");
        assert!(text.contains("last_print_time"));
    }

    #[test]
    fn naive_timestamps_from_older_files_are_read() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("status.json");
        let naive = Local::now().naive_local().format("%Y-%m-%dT%H:%M:%S%.6f").to_string();
        std::fs::write(&path, format!(r#"{{"J.Smith": {{"last_print_time": "{naive}"}}}}"#))
            .expect("write");

        let ledger = StatusLedger::open(&path, Duration::minutes(10));
        assert!(ledger.is_blocked("J.Smith", Utc::now()));
    }

    #[test]
    fn handle_serialises_concurrent_acquires() {
        let dir = tempfile::tempdir().expect("tempdir");
        let handle = LedgerHandle::new(ledger_in(&dir));
        let now = Utc::now();

        let winners: usize = (0..8)
            .map(|_| {
                let h = handle.clone();
                std::thread::spawn(move || h.try_acquire("J.Smith", now).expect("try_acquire"))
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|t| t.join().expect("join") as usize)
            .sum();

        assert_eq!(winners, 1);
    }

    #[test]
    fn separate_handles_on_one_file_acquire_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let a = LedgerHandle::new(ledger_in(&dir));
        let b = LedgerHandle::new(ledger_in(&dir));

        for _ in 0..50 {
            a.release("J.Smith").expect("release");
            let now = Utc::now();
            let barrier = std::sync::Arc::new(std::sync::Barrier::new(2));
            let threads: Vec<_> = [a.clone(), b.clone()]
                .into_iter()
                .map(|h| {
                    let barrier = std::sync::Arc::clone(&barrier);
                    std::thread::spawn(move || {
                        barrier.wait();
                        h.try_acquire("J.Smith", now).expect("try_acquire")
                    })
                })
                .collect();
            let winners = threads
                .into_iter()
                .map(|t| t.join().expect("join"))
                .filter(|won| *won)
                .count();
            assert_eq!(winners, 1);
        }
    }

    #[test]
    fn sweep_in_another_handle_never_drops_a_fresh_lock() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine_side = LedgerHandle::new(ledger_in(&dir));
        let sweep_side = LedgerHandle::new(ledger_in(&dir));
        let stop = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));

        let sweeper = {
            let stop = std::sync::Arc::clone(&stop);
            std::thread::spawn(move || {
                while !stop.load(std::sync::atomic::Ordering::Relaxed) {
                    let old = Utc::now() - Duration::minutes(30);
                    sweep_side.acquire("K.Weber", old).expect("acquire");
                    sweep_side.reap_all_expired(Utc::now()).expect("sweep");
                }
            })
        };

        for _ in 0..200 {
            engine_side.release("J.Smith").expect("release");
            assert!(engine_side.try_acquire("J.Smith", Utc::now()).expect("try_acquire"));
            assert!(engine_side.is_blocked("J.Smith", Utc::now()).expect("ledger"));
        }
        stop.store(true, std::sync::atomic::Ordering::Relaxed);
        sweeper.join().expect("join");
    }

    #[test]
    fn lock_sidecar_sits_next_to_the_ledger() {
        assert_eq!(
            sidecar_path(Path::new("/srv/druck/print_status.json")),
            PathBuf::from("/srv/druck/print_status.json.lock")
        );
    }
}
