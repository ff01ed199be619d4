use std::error::Error;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use ledger::{AccountKind, Engine, NewAccount, SourceType};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};
use serde::Serialize;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "ledger_admin")]
#[command(about = "Admin utilities for the ledger (chart, integrity, sub-ledgers, periods)")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite:./ledger.db?mode=rwc")]
    database_url: String,

    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    /// Engine log level, written to stderr.
    #[arg(long, env = "LOG_LEVEL", default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Account(Account),
    /// Rebuild one account balance from the journal.
    Project {
        #[arg(long)]
        code: String,
    },
    /// Compare cached balances with the journal. Never writes.
    Verify,
    /// Rewrite cached balances and sub-ledgers from the journal.
    Resync,
    /// Void a posted entry with a reversing entry.
    Void {
        #[arg(long)]
        entry: Uuid,
        #[arg(long)]
        reason: String,
    },
    /// List the entries recorded for a source document.
    Entries {
        #[arg(long, value_parser = parse_source_type)]
        source_type: SourceType,
        #[arg(long)]
        source_id: String,
    },
    Subledger(Subledger),
    Period(Period),
    TrialBalance,
}

#[derive(Args, Debug)]
struct Account {
    #[command(subcommand)]
    command: AccountCommand,
}

#[derive(Subcommand, Debug)]
enum AccountCommand {
    Create(AccountCreateArgs),
    List,
}

#[derive(Args, Debug)]
struct AccountCreateArgs {
    #[arg(long)]
    code: String,
    #[arg(long)]
    name: String,
    #[arg(long, value_parser = parse_kind)]
    kind: AccountKind,
    /// Code of the parent header account.
    #[arg(long)]
    parent: Option<String>,
    #[arg(long)]
    header: bool,
}

#[derive(Args, Debug)]
struct Subledger {
    #[command(subcommand)]
    command: SubledgerCommand,
}

#[derive(Subcommand, Debug)]
enum SubledgerCommand {
    Create {
        #[arg(long)]
        name: String,
        /// Code of the leaf asset account to mirror.
        #[arg(long)]
        account: String,
    },
    /// Sync one sub-ledger, or all of them when no id is given.
    Sync {
        #[arg(long)]
        id: Option<Uuid>,
    },
    History {
        #[arg(long)]
        id: Uuid,
    },
}

#[derive(Args, Debug)]
struct Period {
    #[command(subcommand)]
    command: PeriodCommand,
}

#[derive(Subcommand, Debug)]
enum PeriodCommand {
    /// Close a date range into retained earnings.
    Close {
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Reopen the latest closed period, reversing its closing entry.
    Reopen {
        #[arg(long)]
        id: Uuid,
        #[arg(long)]
        reason: String,
    },
    List,
}

fn log_filter(level: &str) -> String {
    format!("ledger_admin={level},ledger={level},migration={level}")
}

fn parse_kind(raw: &str) -> Result<AccountKind, String> {
    AccountKind::try_from(raw).map_err(|err| err.to_string())
}

fn parse_source_type(raw: &str) -> Result<SourceType, String> {
    SourceType::try_from(raw).map_err(|err| err.to_string())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn Error + Send + Sync>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn connect_db(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(log_filter(&cli.log_level))
        .init();

    let db = connect_db(&cli.database_url).await?;
    let engine = Engine::builder().database(db).build().await?;

    match cli.command {
        Command::Account(Account {
            command: AccountCommand::Create(args),
        }) => {
            let mut new = if args.header {
                NewAccount::header(args.code, args.name, args.kind)
            } else {
                NewAccount::leaf(args.code, args.name, args.kind)
            };
            if let Some(parent) = args.parent {
                new = new.parent(parent);
            }
            let account = engine.create_account(new).await?;
            println!("created account: {} {} ({})", account.code, account.name, account.id);
        }
        Command::Account(Account {
            command: AccountCommand::List,
        }) => {
            let accounts = engine.accounts().await?;
            if cli.json {
                print_json(&accounts)?;
            } else {
                for account in accounts {
                    let marker = if account.is_header { "H" } else { " " };
                    println!(
                        "{marker} {:<8} {:<32} {:<10} {:>16}",
                        account.code,
                        account.name,
                        account.kind.as_str(),
                        account.balance
                    );
                }
            }
        }
        Command::Project { code } => {
            let account = engine.account_by_code(&code).await?;
            let projected = if account.is_header {
                engine.header_balance(account.id).await?
            } else {
                engine.project(account.id).await?
            };
            if cli.json {
                print_json(&serde_json::json!({
                    "code": account.code,
                    "cached": account.balance,
                    "projected": projected,
                }))?;
            } else {
                println!("{}: projected {projected}, cached {}", account.code, account.balance);
            }
        }
        Command::Verify => {
            let report = engine.verify_integrity().await?;
            if cli.json {
                print_json(&report)?;
            } else {
                for drift in &report.discrepancies {
                    println!(
                        "account {}: cached {} != projected {}",
                        drift.code, drift.cached, drift.projected
                    );
                }
                for drift in &report.subledger_discrepancies {
                    println!(
                        "sub-ledger {}: balance {} != projected {}",
                        drift.name, drift.balance, drift.projected
                    );
                }
                for entry in &report.unbalanced_entries {
                    println!("entry {entry} does not balance");
                }
                println!(
                    "{} accounts checked, {}",
                    report.accounts_checked,
                    if report.consistent {
                        "consistent"
                    } else {
                        "INCONSISTENT"
                    }
                );
            }
            if !report.consistent {
                std::process::exit(1);
            }
        }
        Command::Resync => {
            let summary = engine.resync().await?;
            if cli.json {
                print_json(&summary)?;
            } else {
                for correction in &summary.accounts.corrections {
                    println!(
                        "account {}: {} -> {}",
                        correction.code, correction.previous, correction.corrected
                    );
                }
                let changed = summary.subledgers.iter().filter(|s| s.changed()).count();
                println!(
                    "{} accounts corrected, {changed} sub-ledgers corrected",
                    summary.accounts.corrections.len()
                );
            }
        }
        Command::Void { entry, reason } => {
            let reversal = engine.void_entry(entry, &reason).await?;
            if cli.json {
                print_json(&reversal)?;
            } else {
                println!("voided {entry} with reversal {}", reversal.id);
            }
        }
        Command::Entries {
            source_type,
            source_id,
        } => {
            let entries = engine.entries_for_source(source_type, &source_id).await?;
            if cli.json {
                print_json(&entries)?;
            } else {
                for entry in entries {
                    println!(
                        "{} {} {:<10} {:<8} {}",
                        entry.id,
                        entry.entry_date,
                        entry.event_kind.as_str(),
                        entry.status.as_str(),
                        entry.total_debit()
                    );
                }
            }
        }
        Command::Subledger(Subledger { command }) => match command {
            SubledgerCommand::Create { name, account } => {
                let subledger = engine.create_subledger(&name, &account).await?;
                println!(
                    "created sub-ledger: {} ({}) balance {}",
                    subledger.name, subledger.id, subledger.balance
                );
            }
            SubledgerCommand::Sync { id } => {
                let synced = match id {
                    Some(id) => vec![engine.sync_subledger(id).await?],
                    None => engine.sync_all_subledgers().await?,
                };
                if cli.json {
                    print_json(&synced)?;
                } else {
                    for sync in synced {
                        println!("{}: {} -> {}", sync.subledger_id, sync.previous, sync.current);
                    }
                }
            }
            SubledgerCommand::History { id } => {
                let history = engine.subledger_history(id).await?;
                if cli.json {
                    print_json(&history)?;
                } else {
                    for row in history {
                        println!(
                            "{} {:<8} {} -> {}",
                            row.recorded_at, row.reason, row.previous_balance, row.new_balance
                        );
                    }
                }
            }
        },
        Command::Period(Period { command }) => match command {
            PeriodCommand::Close {
                from,
                to,
                description,
            } => {
                let period = engine.close_period(from, to, &description).await?;
                if cli.json {
                    print_json(&period)?;
                } else {
                    println!(
                        "closed {} to {} ({}): revenue {}, expense {}, net income {}",
                        period.start_date,
                        period.end_date,
                        period.id,
                        period.total_revenue,
                        period.total_expense,
                        period.net_income
                    );
                }
            }
            PeriodCommand::Reopen { id, reason } => {
                let period = engine.reopen_period(id, &reason).await?;
                if cli.json {
                    print_json(&period)?;
                } else {
                    println!("reopened {} to {}", period.start_date, period.end_date);
                }
            }
            PeriodCommand::List => {
                let periods = engine.periods().await?;
                if cli.json {
                    print_json(&periods)?;
                } else {
                    for period in periods {
                        println!(
                            "{} {} {} {:<6} {:>16} {}",
                            period.id,
                            period.start_date,
                            period.end_date,
                            if period.is_closed { "closed" } else { "open" },
                            period.net_income,
                            period.description
                        );
                    }
                }
            }
        },
        Command::TrialBalance => {
            let trial = engine.trial_balance().await?;
            if cli.json {
                print_json(&trial)?;
            } else {
                for row in &trial.rows {
                    println!(
                        "{:<8} {:<32} {:>16} {:>16} {:>16}",
                        row.code, row.name, row.total_debit, row.total_credit, row.balance
                    );
                }
                println!(
                    "{:<41} {:>16} {:>16}",
                    "TOTAL", trial.total_debit, trial.total_credit
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn log_level_defaults_to_warn_for_every_crate() {
        let cli = Cli::try_parse_from(["ledger_admin", "verify"]).unwrap();
        assert_eq!(cli.log_level, "warn");
        assert_eq!(
            log_filter(&cli.log_level),
            "ledger_admin=warn,ledger=warn,migration=warn"
        );

        let cli = Cli::try_parse_from(["ledger_admin", "--log-level", "debug", "verify"]).unwrap();
        assert_eq!(log_filter(&cli.log_level), "ledger_admin=debug,ledger=debug,migration=debug");
    }

    #[test]
    fn period_close_parses_dates() {
        let cli = Cli::try_parse_from([
            "ledger_admin",
            "period",
            "close",
            "--from",
            "2024-03-01",
            "--to",
            "2024-03-31",
        ])
        .unwrap();
        match cli.command {
            Command::Period(Period {
                command: PeriodCommand::Close { from, to, .. },
            }) => {
                assert_eq!(from, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
                assert_eq!(to, NaiveDate::from_ymd_opt(2024, 3, 31).unwrap());
            }
            other => panic!("unexpected command {other:?}"),
        }

        assert!(
            Cli::try_parse_from(["ledger_admin", "period", "close", "--from", "March", "--to", "2024-03-31"])
                .is_err()
        );
    }
}
