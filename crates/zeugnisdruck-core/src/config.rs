// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.
//
// Loaded once at startup from a JSON file and passed by reference to every
// component that needs it. The key names used by the earlier deployment
// (`printer_path`, `sumatra_path`, `folder_path`, ...) are accepted as
// aliases so existing `config.json` files keep working.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ZeugnisError};
use crate::types::is_valid_owner;

/// Default config file name, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Persistent application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Printer identifier as known to the platform printer registry.
    #[serde(alias = "printer_path")]
    pub printer_id: String,
    /// External print utility, invoked as `<utility> -print-to <printer> <file>`.
    #[serde(alias = "sumatra_path")]
    pub print_utility: PathBuf,
    /// JSON file holding the per-owner cooldown ledger.
    #[serde(alias = "status_file_path")]
    pub ledger_path: PathBuf,
    /// Watched folder the teachers drop their PDFs into.
    #[serde(alias = "folder_path")]
    pub source_dir: PathBuf,
    /// Root of the per-owner archive (`<archive_root>/<owner>/`).
    #[serde(alias = "temp_folder")]
    pub archive_root: PathBuf,
    /// Semicolon-separated do-not-print list.
    #[serde(alias = "blacklist_file")]
    pub blacklist_path: PathBuf,
    /// Minimum time between two print transactions of the same owner.
    #[serde(alias = "timeout_minutes", default = "default_cooldown_minutes")]
    pub cooldown_minutes: u64,
    /// Upper bound for a single print utility invocation.
    #[serde(default = "default_print_timeout_secs")]
    pub print_timeout_secs: u64,
    /// How often the background sweep purges expired locks.
    #[serde(default = "default_interval_secs")]
    pub sweep_interval_secs: u64,
    /// How often the presentation layer re-scans the source folder.
    #[serde(default = "default_interval_secs")]
    pub refresh_interval_secs: u64,
    /// SQLite database for the audit trail.
    #[serde(default = "default_audit_db_path")]
    pub audit_db_path: PathBuf,
    /// Command (argv) that lists installed printers, one per line.
    #[serde(default = "default_printer_query")]
    pub printer_query: Vec<String>,
    /// Fixed owner table for installations where the file system cannot
    /// report a usable creator, e.g. a share written through one service
    /// account or a platform without a native lookup. Replaces the
    /// platform lookup when set.
    #[serde(default)]
    pub canned_owners: Option<CannedOwners>,
}

/// Owner table for [`AppConfig::canned_owners`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CannedOwners {
    /// Owner of every file without an entry in `files`.
    #[serde(default)]
    pub fallback: Option<String>,
    /// Owner per PDF filename.
    #[serde(default)]
    pub files: BTreeMap<String, String>,
}

impl CannedOwners {
    fn owners(&self) -> impl Iterator<Item = &String> {
        self.fallback.iter().chain(self.files.values())
    }
}

fn default_cooldown_minutes() -> u64 {
    10
}

fn default_print_timeout_secs() -> u64 {
    120
}

fn default_interval_secs() -> u64 {
    5
}

fn default_audit_db_path() -> PathBuf {
    PathBuf::from("audit.db")
}

#[cfg(windows)]
fn default_printer_query() -> Vec<String> {
    [
        "powershell",
        "-NoProfile",
        "-Command",
        "Get-Printer | Select-Object -ExpandProperty Name",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

#[cfg(not(windows))]
fn default_printer_query() -> Vec<String> {
    vec!["lpstat".into(), "-e".into()]
}

impl AppConfig {
    /// Read and validate the configuration file at `path`.
    ///
    /// Any failure here is fatal for the application: there is no sensible
    /// fallback for a missing printer or source folder.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .map_err(|e| ZeugnisError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json(&data)
    }

    /// Parse and validate a configuration from its JSON text.
    pub fn from_json(data: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(data)
            .map_err(|e| ZeugnisError::Config(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.printer_id.trim().is_empty() {
            return Err(ZeugnisError::Config("printer_id must not be empty".into()));
        }
        if self.print_timeout_secs == 0 {
            return Err(ZeugnisError::Config("print_timeout_secs must be > 0".into()));
        }
        if self.sweep_interval_secs == 0 || self.refresh_interval_secs == 0 {
            return Err(ZeugnisError::Config("intervals must be > 0".into()));
        }
        if self.printer_query.is_empty() {
            return Err(ZeugnisError::Config("printer_query must name a command".into()));
        }
        if let Some(canned) = &self.canned_owners {
            if canned.fallback.is_none() && canned.files.is_empty() {
                return Err(ZeugnisError::Config("canned_owners names no owner".into()));
            }
            if let Some(bad) = canned.owners().find(|o| !is_valid_owner(o)) {
                return Err(ZeugnisError::Config(format!("canned_owners: invalid owner {bad:?}")));
            }
        }
        Ok(())
    }

    pub fn cooldown(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.cooldown_minutes as i64)
    }

    pub fn print_timeout(&self) -> Duration {
        Duration::from_secs(self.print_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}
