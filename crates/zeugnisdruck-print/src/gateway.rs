// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer gateway: availability check and print submission through
// external commands.
//
// Printing is delegated to a PDF utility invoked as
// `<utility> -print-to <printer> <file>`. Availability is decided by asking
// the platform printer registry (`lpstat -e`, `Get-Printer`, ...) for its
// printer list and looking for the configured printer in the output.
// Neither operation ever returns an error: every failure is `false`.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use zeugnisdruck_core::AppConfig;

/// Timeout for the printer registry query.
const QUERY_TIMEOUT_SECS: u64 = 15;

/// Printer access as seen by the transaction engine.
pub trait PrinterGateway: Send + Sync {
    /// Whether the configured printer is currently known to the system.
    fn check_availability(&self) -> impl Future<Output = bool> + Send;

    /// Submit one file. `true` iff the print utility exited successfully.
    fn print(&self, path: &Path) -> impl Future<Output = bool> + Send;
}

/// Gateway backed by external commands.
#[derive(Debug, Clone)]
pub struct CommandGateway {
    utility: PathBuf,
    printer_id: String,
    query: Vec<String>,
    print_timeout: Duration,
    query_timeout: Duration,
}

impl CommandGateway {
    pub fn new(
        utility: impl Into<PathBuf>,
        printer_id: impl Into<String>,
        query: Vec<String>,
        print_timeout: Duration,
    ) -> Self {
        Self {
            utility: utility.into(),
            printer_id: printer_id.into(),
            query,
            print_timeout,
            query_timeout: Duration::from_secs(QUERY_TIMEOUT_SECS),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            &config.print_utility,
            &config.printer_id,
            config.printer_query.clone(),
            config.print_timeout(),
        )
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn printer_id(&self) -> &str {
        &self.printer_id
    }
}

/// Run a command to completion, killing it if it outlives `timeout`.
async fn run_with_timeout(command: &mut Command, timeout: Duration) -> Result<Output, String> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    match tokio::time::timeout(timeout, command.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(format!("launch failed: {e}")),
        Err(_) => Err(format!("timed out after {}s", timeout.as_secs_f32())),
    }
}

impl PrinterGateway for CommandGateway {
    #[instrument(skip(self), fields(printer = %self.printer_id))]
    async fn check_availability(&self) -> bool {
        let Some((program, args)) = self.query.split_first() else {
            warn!("no printer query command configured");
            return false;
        };

        let output = match run_with_timeout(Command::new(program).args(args), self.query_timeout).await {
            Ok(o) => o,
            Err(e) => {
                warn!(error = %e, "printer registry query failed");
                return false;
            }
        };
        if !output.status.success() {
            warn!(status = %output.status, "printer registry query exited with failure");
            return false;
        }

        let listing = String::from_utf8_lossy(&output.stdout);
        let found = listing.lines().any(|line| line.contains(&self.printer_id));
        if found {
            debug!("printer found in registry");
        } else {
            warn!("printer not in the list of available printers");
        }
        found
    }

    #[instrument(skip(self), fields(printer = %self.printer_id, file = %path.display()))]
    async fn print(&self, path: &Path) -> bool {
        let mut command = Command::new(&self.utility);
        command.arg("-print-to").arg(&self.printer_id).arg(path);

        match run_with_timeout(&mut command, self.print_timeout).await {
            Ok(output) if output.status.success() => {
                info!("print job submitted");
                true
            }
            Ok(output) => {
                warn!(
                    status = %output.status,
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "print utility reported failure"
                );
                false
            }
            Err(e) => {
                warn!(error = %e, "print utility did not complete");
                false
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".into(), "-c".into(), script.into()]
    }

    fn gateway(utility: &str, query: Vec<String>) -> CommandGateway {
        CommandGateway::new(utility, "Lehrerzimmer", query, Duration::from_secs(10))
    }

    #[tokio::test]
    async fn printer_listed_by_registry_is_available() {
        let gw = gateway("true", sh("printf 'Office\\nLehrerzimmer accepting requests\\n'"));
        assert!(gw.check_availability().await);
    }

    #[tokio::test]
    async fn printer_missing_from_registry_is_unavailable() {
        let gw = gateway("true", sh("printf 'Office\\n'"));
        assert!(!gw.check_availability().await);
    }

    #[tokio::test]
    async fn failing_or_missing_query_is_unavailable() {
        assert!(!gateway("true", sh("echo Lehrerzimmer; exit 3")).check_availability().await);
        assert!(!gateway("true", vec!["/nonexistent/lpstat".into()]).check_availability().await);
        assert!(!gateway("true", vec![]).check_availability().await);
    }

    #[tokio::test]
    async fn hanging_query_times_out() {
        let gw = gateway("true", sh("sleep 5; echo Lehrerzimmer"))
            .with_query_timeout(Duration::from_millis(100));
        assert!(!gw.check_availability().await);
    }

    #[tokio::test]
    async fn print_reports_exit_status() {
        let file = Path::new("/tmp/HJ_Meier_Jan.pdf");
        assert!(gateway("true", vec![]).print(file).await);
        assert!(!gateway("false", vec![]).print(file).await);
        assert!(!gateway("/nonexistent/SumatraPDF", vec![]).print(file).await);
    }

    #[tokio::test]
    async fn print_passes_printer_and_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = dir.path().join("fake-print.sh");
        let log = dir.path().join("args.txt");
        std::fs::write(
            &script,
            format!("#!/bin/sh\necho \"$@\" > '{}'\n", log.display()),
        )
        .expect("write script");
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))
                .expect("chmod");
        }

        let gw = CommandGateway::new(&script, "Lehrerzimmer", vec![], Duration::from_secs(10));
        assert!(gw.print(Path::new("/archiv/J.Smith/HJ_Meier_Jan.pdf")).await);
        let args = std::fs::read_to_string(&log).expect("read args");
        assert_eq!(args.trim(), "-print-to Lehrerzimmer /archiv/J.Smith/HJ_Meier_Jan.pdf");
    }
}
