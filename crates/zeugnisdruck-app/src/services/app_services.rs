// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Central service layer: builds every backend component from the loaded
// configuration and hands out shared references to the command handlers.
//
// The audit log (rusqlite) is `Send` but not `Sync`, so it is wrapped in
// `Arc<Mutex<>>` like the ledger handle. Every lock is held only for a
// single short SQLite statement or ledger rewrite.

use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use zeugnisdruck_bridge::{OwnershipResolver, resolver_for};
use zeugnisdruck_core::AppConfig;
use zeugnisdruck_core::error::{Result, ZeugnisError};
use zeugnisdruck_core::types::EngineEvent;
use zeugnisdruck_print::{CommandGateway, TransactionEngine, spawn_sweeper};
use zeugnisdruck_store::audit::AuditEntry;
use zeugnisdruck_store::{AuditLog, Blacklist, LedgerHandle};

pub type Engine = TransactionEngine<CommandGateway, Box<dyn OwnershipResolver>>;

/// Shared application services.
#[derive(Clone)]
pub struct AppServices {
    config: Arc<AppConfig>,
    engine: Arc<Engine>,
    audit_log: Arc<Mutex<AuditLog>>,
}

impl AppServices {
    /// Build all services. Call once at startup.
    ///
    /// The blacklist falls back to an empty list and the audit log to an
    /// in-memory database; neither stops the print queue from working.
    pub fn init(config: AppConfig) -> Result<Self> {
        let audit_log = match AuditLog::open(&config.audit_db_path) {
            Ok(log) => log,
            Err(e) => {
                warn!(error = %e, "audit database unavailable, using in-memory fallback");
                AuditLog::open_in_memory()?
            }
        };
        let resolver = resolver_for(&config);
        Ok(Self::with_parts(config, resolver, audit_log))
    }

    /// Assemble services around an explicit resolver and audit log.
    pub fn with_parts(config: AppConfig, resolver: Box<dyn OwnershipResolver>, audit_log: AuditLog) -> Self {
        let blacklist = Arc::new(Blacklist::load(&config.blacklist_path));
        let ledger = LedgerHandle::open(&config.ledger_path, config.cooldown());
        let audit_log = Arc::new(Mutex::new(audit_log));

        let engine = TransactionEngine::new(
            &config.source_dir,
            &config.archive_root,
            blacklist,
            ledger,
            CommandGateway::from_config(&config),
            resolver,
        )
        .with_audit(Arc::clone(&audit_log));

        info!(
            source = %config.source_dir.display(),
            archive = %config.archive_root.display(),
            printer = %config.printer_id,
            "app services initialised"
        );

        Self {
            config: Arc::new(config),
            engine: Arc::new(engine),
            audit_log,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.engine.subscribe()
    }

    /// Start the background expiry sweep on the engine's event channel.
    pub fn start_sweeper(&self) -> JoinHandle<()> {
        spawn_sweeper(
            self.engine.ledger().clone(),
            self.config.sweep_interval(),
            self.engine.event_sender(),
        )
    }

    // -- Audit ---------------------------------------------------------------

    pub fn recent_audit(&self, limit: u32) -> Result<Vec<AuditEntry>> {
        self.audit_log
            .lock()
            .map_err(|_| ZeugnisError::Database("audit log lock poisoned".into()))?
            .recent_entries(limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zeugnisdruck_bridge::CannedOwnership;

    fn config_in(dir: &tempfile::TempDir) -> AppConfig {
        let root = dir.path();
        std::fs::create_dir_all(root.join("eingang")).expect("mkdir");
        std::fs::write(root.join("blacklist.csv"), "Nachname;Vorname\nMeier;Jan\n").expect("write");
        let json = format!(
            r#"{{
                "printer_path": "Lehrerzimmer",
                "sumatra_path": "true",
                "status_file_path": "{}",
                "folder_path": "{}",
                "temp_folder": "{}",
                "blacklist_file": "{}"
            }}"#,
            root.join("status.json").display(),
            root.join("eingang").display(),
            root.join("archiv").display(),
            root.join("blacklist.csv").display(),
        );
        AppConfig::from_json(&json).expect("config")
    }

    #[test]
    fn services_wire_blacklist_and_folders() {
        let dir = tempfile::tempdir().expect("tempdir");
        let svc = AppServices::with_parts(
            config_in(&dir),
            Box::new(CannedOwnership::everyone("J.Smith")),
            AuditLog::open_in_memory().expect("audit"),
        );

        assert!(svc.engine().blacklist().is_blacklisted("Meier", "Jan"));
        assert!(svc.engine().pending_batches().expect("scan").is_empty());
        assert!(svc.recent_audit(10).expect("audit").is_empty());
    }

    #[test]
    fn unlock_is_audited() {
        let dir = tempfile::tempdir().expect("tempdir");
        let svc = AppServices::with_parts(
            config_in(&dir),
            Box::new(CannedOwnership::everyone("J.Smith")),
            AuditLog::open_in_memory().expect("audit"),
        );
        svc.engine()
            .ledger()
            .acquire("J.Smith", chrono::Utc::now())
            .expect("acquire");

        svc.engine().unlock("J.Smith").expect("unlock");

        let entries = svc.recent_audit(5).expect("audit");
        assert_eq!(entries[0].action, "lock_released");
        assert!(svc.engine().lock_remaining("J.Smith").expect("ledger").is_none());
    }
}
