// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Background expiry sweep.
//
// Wakes on a fixed interval, reloads the ledger and drops every lock whose
// cooldown has elapsed. Each pass takes the ledger's sidecar file lock, so
// it serialises with `print` runs in this and in other processes.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use zeugnisdruck_core::error::Result;
use zeugnisdruck_core::types::EngineEvent;
use zeugnisdruck_store::LedgerHandle;

/// One sweep pass. Returns the owners whose locks were dropped and
/// announces them when there are any.
pub fn sweep_once(ledger: &LedgerHandle, events: &broadcast::Sender<EngineEvent>) -> Result<Vec<String>> {
    let owners = ledger.reap_all_expired(Utc::now())?;
    if !owners.is_empty() {
        info!(?owners, "expired locks released");
        let _ = events.send(EngineEvent::LocksExpired {
            owners: owners.clone(),
        });
    }
    Ok(owners)
}

/// Spawn the periodic sweep on the current runtime.
///
/// The ledger does blocking file I/O, so each pass runs on the blocking
/// pool. Abort the returned handle to stop the sweep.
pub fn spawn_sweeper(
    ledger: LedgerHandle,
    interval: Duration,
    events: broadcast::Sender<EngineEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        debug!(interval_secs = interval.as_secs_f32(), "expiry sweep started");

        loop {
            ticker.tick().await;
            let ledger = ledger.clone();
            let events = events.clone();
            match tokio::task::spawn_blocking(move || sweep_once(&ledger, &events)).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => warn!(error = %e, "expiry sweep failed"),
                Err(e) => warn!(error = %e, "expiry sweep task panicked"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger_in(dir: &tempfile::TempDir) -> LedgerHandle {
        LedgerHandle::open(dir.path().join("print_status.json"), chrono::Duration::minutes(10))
    }

    #[test]
    fn sweep_drops_only_expired_locks() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ledger = ledger_in(&dir);
        let (tx, mut rx) = broadcast::channel(8);
        ledger
            .acquire("J.Smith", Utc::now() - chrono::Duration::minutes(11))
            .expect("acquire");
        ledger.acquire("K.Weber", Utc::now()).expect("acquire");

        let reaped = sweep_once(&ledger, &tx).expect("sweep");

        assert_eq!(reaped, vec!["J.Smith"]);
        assert!(ledger.is_blocked("K.Weber", Utc::now()).expect("ledger"));
        assert_eq!(
            rx.try_recv().expect("event"),
            EngineEvent::LocksExpired {
                owners: vec!["J.Smith".into()]
            }
        );
    }

    #[test]
    fn quiet_sweep_sends_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ledger = ledger_in(&dir);
        let (tx, mut rx) = broadcast::channel(8);

        assert!(sweep_once(&ledger, &tx).expect("sweep").is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn spawned_sweeper_reaps_in_the_background() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ledger = ledger_in(&dir);
        ledger
            .acquire("J.Smith", Utc::now() - chrono::Duration::minutes(30))
            .expect("acquire");
        let (tx, mut rx) = broadcast::channel(8);

        let handle = spawn_sweeper(ledger.clone(), Duration::from_millis(20), tx);
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("sweep in time")
            .expect("event");
        handle.abort();

        assert!(matches!(event, EngineEvent::LocksExpired { .. }));
        assert_eq!(ledger.last_print_time("J.Smith").expect("ledger"), None);
    }
}
