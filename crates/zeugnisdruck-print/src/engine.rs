// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Print transaction engine: move an owner's pending PDFs into the archive
// and print them, skipping blacklisted students.
//
// A transaction runs in this order:
//
//   1. check-and-acquire the owner's cooldown lock (locked -> abort, no effects)
//   2. printer availability (down -> release lock, abort, files untouched)
//   3. ensure `<archive_root>/<owner>/` exists
//   4. live re-scan of the owner's pending files (none -> release lock)
//   5. per file, in scan order: move, then blacklist check, then print
//   6. opportunistic reap of the owner's lock, completion event
//
// Per-file move and print failures never abort the loop; they are collected
// in the report. Every early exit after step 1 releases the lock.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use zeugnisdruck_bridge::OwnershipResolver;
use zeugnisdruck_core::error::{Result, ZeugnisError};
use zeugnisdruck_core::types::{
    ArchiveEntry, BlockedFile, EngineEvent, MoveFailure, OwnerBatch, ReprintReport, Selection,
    TransactionOutcome, TransactionReport, is_valid_owner,
};
use zeugnisdruck_store::audit::AuditAction;
use zeugnisdruck_store::{AuditLog, Blacklist, LedgerHandle};

use crate::archive;
use crate::gateway::PrinterGateway;
use crate::scanner;

/// Capacity of the engine event channel. Slow subscribers see `Lagged`
/// and simply refresh.
const EVENT_CAPACITY: usize = 64;

// ---------------------------------------------------------------------------
// File moves
// ---------------------------------------------------------------------------

/// Move `from` to `to`, replacing an existing file at `to`.
///
/// Falls back to copy + remove when source and archive live on different
/// filesystems.
fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    match std::fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::CrossesDevices => {
            copy_then_remove(from, to, |source| std::fs::remove_file(source))
        }
        Err(e) => Err(e),
    }
}

/// Cross-device half of [`move_file`]. If the source cannot be removed
/// after the copy, the copy is deleted again so the file stays in exactly
/// one place and a retry does not see it as a correction.
fn copy_then_remove<F>(from: &Path, to: &Path, remove_source: F) -> std::io::Result<()>
where
    F: FnOnce(&Path) -> std::io::Result<()>,
{
    std::fs::copy(from, to)?;
    if let Err(e) = remove_source(from) {
        if let Err(cleanup) = std::fs::remove_file(to) {
            warn!(target = %to.display(), error = %cleanup, "archive copy left behind");
        }
        return Err(e);
    }
    Ok(())
}

/// Run filesystem or ledger work on the blocking pool.
async fn off_runtime<T, F>(work: F) -> std::io::Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(std::io::Error::other)
}

/// A selection must name a file directly inside the owner's archive folder.
fn is_plain_filename(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Runs move-and-print transactions and archive reprints.
///
/// The blacklist, ledger, and folders are injected once at construction;
/// nothing is read from ambient state.
pub struct TransactionEngine<G, R> {
    source_dir: PathBuf,
    archive_root: PathBuf,
    blacklist: Arc<Blacklist>,
    ledger: LedgerHandle,
    gateway: G,
    resolver: R,
    audit: Option<Arc<Mutex<AuditLog>>>,
    events: broadcast::Sender<EngineEvent>,
}

impl<G, R> TransactionEngine<G, R>
where
    G: PrinterGateway,
    R: OwnershipResolver,
{
    pub fn new(
        source_dir: impl Into<PathBuf>,
        archive_root: impl Into<PathBuf>,
        blacklist: Arc<Blacklist>,
        ledger: LedgerHandle,
        gateway: G,
        resolver: R,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            source_dir: source_dir.into(),
            archive_root: archive_root.into(),
            blacklist,
            ledger,
            gateway,
            resolver,
            audit: None,
            events,
        }
    }

    /// Record every step in `audit`.
    pub fn with_audit(mut self, audit: Arc<Mutex<AuditLog>>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Publish events on an existing channel, e.g. one shared with the sweeper.
    pub fn with_events(mut self, events: broadcast::Sender<EngineEvent>) -> Self {
        self.events = events;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub fn event_sender(&self) -> broadcast::Sender<EngineEvent> {
        self.events.clone()
    }

    pub fn ledger(&self) -> &LedgerHandle {
        &self.ledger
    }

    pub fn blacklist(&self) -> &Blacklist {
        &self.blacklist
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    fn owner_folder(&self, owner: &str) -> PathBuf {
        self.archive_root.join(owner)
    }

    fn audit(
        &self,
        action: AuditAction,
        owner: &str,
        filename: Option<&str>,
        success: bool,
        details: Option<&str>,
    ) {
        let Some(audit) = &self.audit else {
            return;
        };
        let result = match audit.lock() {
            Ok(log) => log.record(action, owner, filename, success, details),
            Err(_) => Err(ZeugnisError::Database("audit log lock poisoned".into())),
        };
        if let Err(e) = result {
            warn!(error = %e, "audit entry not recorded");
        }
    }

    /// Give the lock back after an early exit. A failed release is logged;
    /// the entry then simply expires with the cooldown.
    async fn release_lock(&self, owner: &str, reason: &str) {
        let ledger = self.ledger.clone();
        let key = owner.to_owned();
        let released = match off_runtime(move || ledger.release(&key)).await {
            Ok(result) => result,
            Err(e) => Err(e.into()),
        };
        match released {
            Ok(()) => self.audit(AuditAction::LockReleased, owner, None, true, Some(reason)),
            Err(e) => {
                warn!(owner, error = %e, "lock release failed");
                self.audit(AuditAction::LockReleased, owner, None, false, Some(&e.to_string()));
            }
        }
    }

    fn finish(&self, owner: &str) {
        let _ = self.events.send(EngineEvent::TransactionFinished {
            owner: owner.to_owned(),
        });
    }

    // -- Read paths ----------------------------------------------------------

    /// Live pending batches of every owner.
    pub fn pending_batches(&self) -> Result<BTreeMap<String, OwnerBatch>> {
        scanner::scan(&self.source_dir, &self.archive_root, &self.resolver)
    }

    /// The whole archive, blacklisted entries flagged.
    pub fn archive(&self) -> Result<BTreeMap<String, Vec<ArchiveEntry>>> {
        archive::browse(&self.archive_root, &self.blacklist)
    }

    pub fn archive_entries(&self, owner: &str) -> Result<Vec<ArchiveEntry>> {
        archive::entries_for(&self.archive_root, owner, &self.blacklist)
    }

    /// Every archived file of `owner` that may be reprinted.
    pub fn select_all(&self, owner: &str) -> Result<Vec<Selection>> {
        Ok(self
            .archive_entries(owner)?
            .iter()
            .filter(|entry| !entry.blacklisted)
            .map(Selection::from)
            .collect())
    }

    /// Time left on the owner's cooldown, if locked.
    pub fn lock_remaining(&self, owner: &str) -> Result<Option<chrono::Duration>> {
        self.ledger.remaining(owner, Utc::now())
    }

    /// Operator override: drop the owner's lock immediately.
    #[instrument(skip(self))]
    pub fn unlock(&self, owner: &str) -> Result<()> {
        if !is_valid_owner(owner) {
            return Err(ZeugnisError::InvalidOwner(owner.to_owned()));
        }
        self.ledger.release(owner)?;
        self.audit(AuditAction::LockReleased, owner, None, true, Some("manual unlock"));
        info!("lock released by operator");
        Ok(())
    }

    // -- Transactions --------------------------------------------------------

    /// Move all of `owner`'s pending files into the archive and print them.
    ///
    /// `Err` is reserved for faults that stop the transaction as a whole
    /// (ledger not writable, source folder unreadable, archive folder not
    /// creatable). The lock is released before any such error is returned
    /// after it was taken.
    #[instrument(skip(self))]
    pub async fn move_and_print(&self, owner: &str) -> Result<TransactionOutcome> {
        if !is_valid_owner(owner) {
            return Err(ZeugnisError::InvalidOwner(owner.to_owned()));
        }

        let now = Utc::now();
        let ledger = self.ledger.clone();
        let key = owner.to_owned();
        let acquired = off_runtime(move || -> Result<Option<Option<chrono::Duration>>> {
            if ledger.try_acquire(&key, now)? {
                Ok(None)
            } else {
                ledger.remaining(&key, now).map(Some)
            }
        })
        .await??;
        if let Some(left) = acquired {
            let remaining_secs = left.map(|left| left.num_seconds()).unwrap_or_default();
            info!(remaining_secs, "owner locked, transaction refused");
            return Ok(TransactionOutcome::Locked { remaining_secs });
        }
        self.audit(AuditAction::LockAcquired, owner, None, true, None);

        if !self.gateway.check_availability().await {
            warn!("printer unreachable, nothing moved");
            self.audit(AuditAction::PrinterUnreachable, owner, None, false, None);
            self.release_lock(owner, "printer unreachable").await;
            self.finish(owner);
            return Ok(TransactionOutcome::PrinterUnreachable);
        }

        let folder = self.owner_folder(owner);
        let mkdir = folder.clone();
        let created = off_runtime(move || std::fs::create_dir_all(&mkdir)).await.and_then(|r| r);
        if let Err(e) = created {
            warn!(folder = %folder.display(), error = %e, "archive folder not creatable");
            self.release_lock(owner, "archive folder not creatable").await;
            self.finish(owner);
            return Err(e.into());
        }

        let batch = match scanner::scan_owner(&self.source_dir, &self.archive_root, &self.resolver, owner) {
            Ok(Some(batch)) => batch,
            Ok(None) => {
                info!("no pending files");
                self.release_lock(owner, "no pending files").await;
                self.finish(owner);
                return Ok(TransactionOutcome::NoPendingFiles);
            }
            Err(e) => {
                warn!(error = %e, "source folder scan failed");
                self.release_lock(owner, "scan failed").await;
                self.finish(owner);
                return Err(e);
            }
        };

        info!(files = batch.count(), corrections = batch.corrections(), "processing batch");
        let mut report = TransactionReport::new(owner);

        for file in &batch.files {
            let source = self.source_dir.join(&file.filename);
            let target = folder.join(&file.filename);

            let (from, to) = (source, target.clone());
            let moved = off_runtime(move || move_file(&from, &to)).await.and_then(|r| r);
            if let Err(e) = moved {
                warn!(filename = %file.filename, error = %e, "move failed");
                self.audit(AuditAction::Move, owner, Some(&file.filename), false, Some(&e.to_string()));
                report.failed_moves.push(MoveFailure {
                    filename: file.filename.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
            self.audit(
                AuditAction::Move,
                owner,
                Some(&file.filename),
                true,
                file.is_correction.then_some("correction"),
            );
            report.moved.push(file.filename.clone());

            if self
                .blacklist
                .is_blacklisted(&file.student.last_name, &file.student.first_name)
            {
                info!(filename = %file.filename, "student blacklisted, not printed");
                self.audit(AuditAction::Blocked, owner, Some(&file.filename), true, None);
                report.blocked.push(BlockedFile {
                    filename: file.filename.clone(),
                    student: file.student.clone(),
                });
                continue;
            }

            let printed = self.gateway.print(&target).await;
            self.audit(AuditAction::Print, owner, Some(&file.filename), printed, None);
            if printed {
                report.printed.push(file.filename.clone());
            } else {
                report.failed_prints.push(file.filename.clone());
            }
        }

        info!(
            transaction = %report.id,
            status = ?report.status(),
            moved = report.moved.len(),
            printed = report.printed.len(),
            blocked = report.blocked.len(),
            failed = report.failed_files().len(),
            "transaction finished"
        );

        let ledger = self.ledger.clone();
        let key = owner.to_owned();
        let reaped = match off_runtime(move || ledger.reap_expired(&key, Utc::now())).await {
            Ok(result) => result,
            Err(e) => Err(e.into()),
        };
        match reaped {
            Ok(true) => debug!("lock already expired, reaped"),
            Ok(false) => {}
            Err(e) => warn!(error = %e, "post-transaction reap failed"),
        }
        self.finish(owner);

        Ok(TransactionOutcome::Completed(report))
    }

    /// Reprint files that are already in `owner`'s archive folder.
    ///
    /// Blacklisted students are skipped and reported. The cooldown lock is
    /// neither checked nor touched.
    #[instrument(skip(self, selection), fields(count = selection.len()))]
    pub async fn print_selected_files(&self, owner: &str, selection: &[Selection]) -> Result<ReprintReport> {
        if !is_valid_owner(owner) {
            return Err(ZeugnisError::InvalidOwner(owner.to_owned()));
        }

        let folder = self.owner_folder(owner);
        let mut report = ReprintReport {
            owner: owner.to_owned(),
            ..ReprintReport::default()
        };

        for item in selection {
            if self
                .blacklist
                .is_blacklisted(&item.student.last_name, &item.student.first_name)
            {
                info!(filename = %item.filename, "student blacklisted, reprint skipped");
                self.audit(AuditAction::Blocked, owner, Some(&item.filename), true, Some("reprint"));
                report.blocked.push(BlockedFile {
                    filename: item.filename.clone(),
                    student: item.student.clone(),
                });
                continue;
            }

            if !is_plain_filename(&item.filename) {
                warn!(filename = %item.filename, "selection is not a plain filename");
                self.audit(AuditAction::Reprint, owner, Some(&item.filename), false, Some("invalid filename"));
                report.failed.push(item.filename.clone());
                continue;
            }

            let printed = self.gateway.print(&folder.join(&item.filename)).await;
            self.audit(AuditAction::Reprint, owner, Some(&item.filename), printed, None);
            if printed {
                report.printed.push(item.filename.clone());
            } else {
                report.failed.push(item.filename.clone());
            }
        }

        info!(
            printed = report.printed.len(),
            blocked = report.blocked.len(),
            failed = report.failed.len(),
            "reprint finished"
        );
        Ok(report)
    }
}
