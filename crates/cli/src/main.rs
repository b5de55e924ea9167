// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

#![deny(
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    clippy::style,
    clippy::correctness,
    clippy::all
)]
#![allow(clippy::multiple_crate_versions)]

use clap::{Parser, Subcommand};
use emp_vault_api::{
    BackupStatus, IntegrityAndRecoveryManager, RecordStore, ShutdownReport, StartupReport,
    StoreConfig, SwapState, migrate_attachment_layout,
};
use emp_vault_persistence::BOOTSTRAP_ADMIN;
use std::path::PathBuf;
use tracing::{error, info, warn};

/// Employee Vault - maintenance commands for the shared record store
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a JSON configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Data directory holding the database, photos and attachments.
    /// Ignored when `--config` is given.
    #[arg(short = 'D', long, default_value = ".")]
    data_dir: PathBuf,

    /// Overrides the database file location.
    #[arg(short, long)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run startup recovery and print the health report
    Check {
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Write a timestamped backup into the backup directory
    Backup {
        #[arg(short, long)]
        user: String,
    },
    /// Replace the database with a verified backup
    Restore {
        #[arg(short, long)]
        user: String,
        backup: PathBuf,
    },
    /// Sort loose attachments into the per-employee layout
    MigrateFiles,
    /// Exchange the sequence numbers of two employees
    Swap {
        #[arg(short, long)]
        user: String,
        first: String,
        second: String,
    },
    /// List employee records
    List {
        /// Include archived records.
        #[arg(short, long)]
        archived: bool,
        /// Print the records as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Create the initial administrator on an empty store
    BootstrapAdmin {
        #[arg(short, long)]
        pin: String,
    },
}

/// Builds the store configuration from the command line.
fn resolve_config(args: &Args) -> Result<StoreConfig, Box<dyn std::error::Error>> {
    let mut config: StoreConfig = match &args.config {
        Some(path) => StoreConfig::load(path)?,
        None => StoreConfig::for_data_dir(&args.data_dir),
    };
    if let Some(database) = &args.database {
        config.database_path.clone_from(database);
    }
    Ok(config)
}

fn log_startup(report: &StartupReport) {
    if let Some(fallback) = &report.restored_from {
        warn!("Database was damaged and has been restored from {}", fallback.display());
    }
    if !report.resumed.is_clean() {
        warn!(
            conflicts = report.resumed.conflicts.len(),
            failed = report.resumed.failed.len(),
            deferred = report.resumed.deferred,
            "Some interrupted file moves need attention"
        );
    }
    if report.expired_locks > 0 {
        info!("Removed {} expired edit locks", report.expired_locks);
    }
}

fn log_shutdown(report: &ShutdownReport) {
    match &report.backup {
        BackupStatus::Skipped => {}
        BackupStatus::Completed(path) => info!("Fallback copy written to {}", path.display()),
        BackupStatus::Failed(reason) => error!("Fallback copy failed: {}", reason),
        BackupStatus::TimedOut => warn!("Fallback copy abandoned after timeout"),
    }
}

fn run(store: &mut RecordStore, command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Check { json } => {
            let health = store.health_check()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&health)?);
            } else {
                for check in &health.checks {
                    let status: &str = if check.passed { "ok" } else { "FAILED" };
                    println!(
                        "{:<28} {:<6} {}",
                        check.name,
                        status,
                        check.details.as_deref().unwrap_or("")
                    );
                }
                println!("healthy: {}", health.healthy);
            }
        }
        Command::Backup { user } => {
            let outcome = store.backup_now(&user)?;
            println!("{}", outcome.path.display());
            for pruned in &outcome.pruned {
                info!("Pruned old backup {}", pruned.display());
            }
        }
        Command::Restore { user, backup } => {
            let outcome = store.restore_from_backup(&backup, &user)?;
            println!(
                "restored {} employees and {} users from {}",
                outcome.summary.employees,
                outcome.summary.users,
                outcome.source.display()
            );
            if let Some(set_aside) = &outcome.set_aside {
                info!("Previous database kept as {}", set_aside.display());
            }
        }
        Command::MigrateFiles => {
            let report = migrate_attachment_layout(store.config())?;
            println!(
                "folders prepared: {}, files moved: {}, photos copied: {}",
                report.folders_prepared, report.files_moved, report.photos_copied
            );
            for skipped in &report.skipped {
                warn!("Left in place: {}", skipped.display());
            }
        }
        Command::Swap {
            user,
            first,
            second,
        } => {
            let report = store.swap_identifiers(&first, &second, &user)?;
            println!(
                "{} -> {}, {} -> {}",
                report.old_ids.0, report.new_ids.0, report.old_ids.1, report.new_ids.1
            );
            if report.state == SwapState::PartiallyRecovered
                && let Some(warning) = &report.warning
            {
                warn!("{}", warning);
            }
        }
        Command::List { archived, json } => {
            let employees = store.list_employees(archived)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&employees)?);
            } else {
                for employee in &employees {
                    let marker: &str = if employee.is_archived() {
                        " (archived)"
                    } else {
                        ""
                    };
                    println!("{}  {}{}", employee.id, employee.details.name, marker);
                }
            }
        }
        Command::BootstrapAdmin { pin } => {
            if store.bootstrap_admin(&pin)? {
                println!("Created administrator '{BOOTSTRAP_ADMIN}'");
            } else {
                println!("Users already exist; nothing to do");
            }
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config: StoreConfig = resolve_config(&args)?;
    info!(
        mode = ?config.deployment_mode,
        "Using database at: {}",
        config.database_path.display()
    );

    let (mut store, startup) = IntegrityAndRecoveryManager::startup(config)?;
    log_startup(&startup);

    let result = run(&mut store, args.command);

    let shutdown: ShutdownReport = IntegrityAndRecoveryManager::shutdown(store);
    log_shutdown(&shutdown);

    result
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_data_dir_defaults_paths() {
        let args: Args = Args::try_parse_from(["emp-vault", "-D", "/srv/vault", "list"]).unwrap();
        let config: StoreConfig = resolve_config(&args).unwrap();

        assert_eq!(config.database_path, PathBuf::from("/srv/vault/employee_vault.db"));
        assert!(matches!(
            args.command,
            Command::List {
                archived: false,
                json: false
            }
        ));
    }

    #[test]
    fn test_database_flag_overrides_location() {
        let args: Args = Args::try_parse_from([
            "emp-vault",
            "--database",
            "/tmp/other.db",
            "check",
            "--json",
        ])
        .unwrap();
        let config: StoreConfig = resolve_config(&args).unwrap();

        assert_eq!(config.database_path, PathBuf::from("/tmp/other.db"));
        assert!(matches!(args.command, Command::Check { json: true }));
    }

    #[test]
    fn test_swap_requires_two_tokens() {
        let result = Args::try_parse_from(["emp-vault", "swap", "--user", "admin", "002"]);
        assert!(result.is_err());

        let args: Args =
            Args::try_parse_from(["emp-vault", "swap", "-u", "admin", "002", "003"]).unwrap();
        let Command::Swap {
            user,
            first,
            second,
        } = args.command
        else {
            panic!("expected swap");
        };
        assert_eq!(user, "admin");
        assert_eq!((first.as_str(), second.as_str()), ("002", "003"));
    }

    #[test]
    fn test_restore_takes_backup_path() {
        let args: Args = Args::try_parse_from([
            "emp-vault",
            "restore",
            "--user",
            "admin",
            "/srv/vault/backups/employee_vault_20260101_000000_000001.db",
        ])
        .unwrap();
        let Command::Restore { user, backup } = args.command else {
            panic!("expected restore");
        };
        assert_eq!(user, "admin");
        assert!(backup.ends_with("employee_vault_20260101_000000_000001.db"));
    }
}
