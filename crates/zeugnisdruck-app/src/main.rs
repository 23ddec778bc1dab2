// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Zeugnisdruck: report-card print queue.
//
// Entry point. Initialises logging, loads the configuration, builds the
// backend services and dispatches the requested command.

mod cli;
mod render;
mod services;

use std::collections::BTreeMap;
use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use zeugnisdruck_core::AppConfig;
use zeugnisdruck_core::error::Result;
use zeugnisdruck_core::notices::{
    OperatorNotice, Severity, notice_for_error, notice_for_outcome, notice_for_reprint,
};
use zeugnisdruck_core::types::Selection;

use cli::{Cli, Commands};
use services::app_services::AppServices;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        let _ = Cli::command().print_long_help();
        return ExitCode::SUCCESS;
    };

    let config = match AppConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "configuration not loaded");
            eprintln!("{}", render::notice(&notice_for_error(&e)));
            return ExitCode::FAILURE;
        }
    };

    let svc = match AppServices::init(config) {
        Ok(svc) => svc,
        Err(e) => {
            error!(error = %e, "service initialisation failed");
            eprintln!("{}", render::notice(&notice_for_error(&e)));
            return ExitCode::FAILURE;
        }
    };
    info!("Zeugnisdruck ready");

    match run(&svc, command).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("{}", render::notice(&notice_for_error(&e)));
            ExitCode::FAILURE
        }
    }
}

/// Errors exit with 1, warnings (blocked or partly failed) with 2.
fn exit_code(notice: &OperatorNotice) -> ExitCode {
    match notice.severity {
        Severity::Info => ExitCode::SUCCESS,
        Severity::Warning => ExitCode::from(2),
        Severity::Error => ExitCode::FAILURE,
    }
}

fn report(notice: &OperatorNotice) -> ExitCode {
    println!("{}", render::notice(notice));
    exit_code(notice)
}

async fn run(svc: &AppServices, command: Commands) -> Result<ExitCode> {
    let engine = svc.engine();
    match command {
        Commands::List => {
            print!("{}", pending_view(svc)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Print { owner } => {
            let outcome = engine.move_and_print(&owner).await?;
            Ok(report(&notice_for_outcome(&owner, &outcome)))
        }
        Commands::Archive { owner } => {
            let index = match owner {
                Some(owner) => {
                    let entries = engine.archive_entries(&owner)?;
                    BTreeMap::from([(owner, entries)])
                }
                None => engine.archive()?,
            };
            print!("{}", render::archive(&index));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Reprint { owner, files, all } => {
            let selection = if all {
                engine.select_all(&owner)?
            } else {
                files.into_iter().map(Selection::from_filename).collect()
            };
            if selection.is_empty() {
                println!("Nothing selected.");
                return Ok(ExitCode::SUCCESS);
            }
            let reprint = engine.print_selected_files(&owner, &selection).await?;
            Ok(report(&notice_for_reprint(&reprint)))
        }
        Commands::Unlock { owner } => {
            engine.unlock(&owner)?;
            println!("Lock for {owner} released.");
            Ok(ExitCode::SUCCESS)
        }
        Commands::History { limit } => {
            print!("{}", render::audit(&svc.recent_audit(limit)?));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Watch => watch(svc).await,
    }
}

fn pending_view(svc: &AppServices) -> Result<String> {
    let engine = svc.engine();
    let batches = engine.pending_batches()?;
    let mut locks = BTreeMap::new();
    for owner in batches.keys() {
        if let Some(left) = engine.lock_remaining(owner)? {
            locks.insert(owner.clone(), left);
        }
    }
    Ok(render::pending(&batches, &locks))
}

/// Redraw the pending list on every engine event and on the refresh timer
/// until Ctrl-C. The expiry sweep runs for as long as the view is open.
async fn watch(svc: &AppServices) -> Result<ExitCode> {
    let sweeper = svc.start_sweeper();
    let mut events = svc.subscribe();
    let mut ticker = tokio::time::interval(svc.config().refresh_interval());
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            event = events.recv() => match event {
                Ok(event) => debug!(?event, "engine event"),
                Err(RecvError::Lagged(missed)) => debug!(missed, "engine events dropped"),
                Err(RecvError::Closed) => break,
            },
            _ = &mut shutdown => break,
        }

        match pending_view(svc) {
            Ok(text) => print!("\x1b[2J\x1b[H{text}"),
            Err(e) => warn!(error = %e, "refresh failed"),
        }
    }

    sweeper.abort();
    info!("watch stopped");
    Ok(ExitCode::SUCCESS)
}
