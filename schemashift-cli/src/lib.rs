//! Command-line surface for applications that embed `schemashift`.
//!
//! An application builds its [Migrator] and hands it over together with the
//! parsed [CliArgs]:
//!
//! ```no_run
//! use clap::Parser;
//! use schemashift::Migrator;
//! use schemashift_cli::CliArgs;
//!
//! fn migrator() -> Migrator {
//!     Migrator::new(vec![])
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     schemashift_cli::run_with_args(&migrator(), CliArgs::parse())
//! }
//! ```
//!
//! The database URL is read from `DATABASE_URL` unless `--database-url` is
//! given. `list` is the only command that works without one.

use std::error::Error as StdError;
use std::io::{self, Write};

use clap::{Parser, Subcommand};
use schemashift::{Connection, Migrator};

type CliResult = Result<(), Box<dyn StdError>>;

const NO_CONNECTION: &str = "this command needs a database connection";

#[derive(Debug, Parser)]
#[command(name = "schemashift", about = "Run schema migrations")]
pub struct CliArgs {
    /// Database to migrate, e.g. `sqlite://app.db` or `postgres://user@host/db`
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    pub database_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Commands {
    /// Show the current version and pending migrations
    Status,
    /// Apply pending migrations
    Upgrade {
        /// Stop after this version instead of applying everything
        #[arg(long)]
        target: Option<u32>,
    },
    /// Roll back to a version (0 reverts everything)
    Downgrade {
        /// Version to end at
        #[arg(long)]
        target: u32,
    },
    /// Show applied migrations
    History,
    /// Show what an upgrade or downgrade would run, without running it
    Preview {
        /// Preview a downgrade to this version instead of an upgrade
        #[arg(long)]
        downgrade_to: Option<u32>,
    },
    /// List every migration the application defines
    List,
}

/// Resolve the database URL from `args` and run the command.
pub fn run_with_args(migrator: &Migrator, args: CliArgs) -> CliResult {
    if args.command == Commands::List {
        return execute(migrator, None, &args.command, &mut io::stdout());
    }
    let database_url = args
        .database_url
        .clone()
        .ok_or("no database URL: set DATABASE_URL or pass --database-url")?;
    run(migrator, &database_url, args)
}

/// Connect to `database_url` and run the command.
pub fn run(migrator: &Migrator, database_url: &str, args: CliArgs) -> CliResult {
    let mut conn = schemashift::provider::open(database_url)?;
    execute(migrator, Some(&mut *conn), &args.command, &mut io::stdout())
}

/// Run `command`, writing human-readable output to `out`.
///
/// `conn` may be `None` only for [Commands::List].
pub fn execute<W: Write>(
    migrator: &Migrator,
    conn: Option<&mut dyn Connection>,
    command: &Commands,
    out: &mut W,
) -> CliResult {
    match command {
        Commands::List => list(migrator, out)?,
        Commands::Status => {
            let conn = conn.ok_or(NO_CONNECTION)?;
            let current = migrator.get_current_version(&mut *conn)?;
            let pending = migrator.preview_upgrade(&mut *conn)?;
            writeln!(out, "Current version: {}", current)?;
            if pending.is_empty() {
                writeln!(out, "Database is up to date.")?;
            } else {
                writeln!(out, "Pending migrations ({}):", pending.len())?;
                for m in pending {
                    writeln!(out, "  v{}: {}", m.version(), m.name())?;
                }
            }
        }
        Commands::Upgrade { target } => {
            let conn = conn.ok_or(NO_CONNECTION)?;
            let report = match target {
                Some(target) => migrator.upgrade_to(&mut *conn, *target)?,
                None => migrator.upgrade(&mut *conn)?,
            };
            if report.migrations_run.is_empty() && report.failing_migration.is_none() {
                writeln!(out, "No migrations to apply.")?;
            }
            for version in &report.migrations_run {
                writeln!(out, "Applied v{}", version)?;
            }
            if let Some(failure) = &report.failing_migration {
                return Err(format!(
                    "migration v{} ({}) failed: {}",
                    failure.migration().version(),
                    failure.migration().name(),
                    failure.error()
                )
                .into());
            }
        }
        Commands::Downgrade { target } => {
            let conn = conn.ok_or(NO_CONNECTION)?;
            let report = migrator.downgrade(&mut *conn, *target)?;
            if report.migrations_run.is_empty() && report.failing_migration.is_none() {
                writeln!(out, "No migrations to roll back.")?;
            }
            for version in &report.migrations_run {
                writeln!(out, "Rolled back v{}", version)?;
            }
            if let Some(failure) = &report.failing_migration {
                return Err(format!(
                    "rollback of v{} ({}) failed: {}",
                    failure.migration().version(),
                    failure.migration().name(),
                    failure.error()
                )
                .into());
            }
        }
        Commands::History => {
            let conn = conn.ok_or(NO_CONNECTION)?;
            let history = migrator.get_migration_history(&mut *conn)?;
            if history.is_empty() {
                writeln!(out, "No migrations applied.")?;
            }
            for applied in history {
                writeln!(
                    out,
                    "  v{}: {} (applied {})",
                    applied.version,
                    applied.name,
                    applied.applied_at.to_rfc3339()
                )?;
            }
        }
        Commands::Preview { downgrade_to } => {
            let conn = conn.ok_or(NO_CONNECTION)?;
            let (heading, plan) = match downgrade_to {
                Some(target) => ("roll back", migrator.preview_downgrade(&mut *conn, *target)?),
                None => ("apply", migrator.preview_upgrade(&mut *conn)?),
            };
            if plan.is_empty() {
                writeln!(out, "Nothing to {}.", heading)?;
            } else {
                writeln!(out, "Would {} ({}):", heading, plan.len())?;
                for m in plan {
                    writeln!(out, "  v{}: {}", m.version(), m.name())?;
                }
            }
        }
    }
    Ok(())
}

fn list<W: Write>(migrator: &Migrator, out: &mut W) -> CliResult {
    let migrations = migrator.migrations();
    if migrations.is_empty() {
        writeln!(out, "No migrations defined.")?;
        return Ok(());
    }
    writeln!(out, "Defined migrations ({}):", migrations.len())?;
    for m in migrations {
        writeln!(out, "  v{}: {}", m.version(), m.name())?;
        if let Some(description) = m.description() {
            writeln!(out, "      {}", description)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use schemashift::sql_migration;

    sql_migration!(CreateUsers, 1, "Create users",
        up: ["CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)"],
        down: ["DROP TABLE users"]);

    sql_migration!(AddEmail, 2, "Add email",
        up: ["ALTER TABLE users ADD COLUMN email TEXT"],
        down: ["ALTER TABLE users DROP COLUMN email"]);

    fn migrator() -> Migrator {
        Migrator::new(vec![Box::new(CreateUsers), Box::new(AddEmail)])
    }

    fn run_command(
        migrator: &Migrator,
        conn: &mut rusqlite::Connection,
        command: Commands,
    ) -> Result<String, String> {
        let mut out = Vec::new();
        execute(migrator, Some(conn), &command, &mut out).map_err(|e| e.to_string())?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn command_definition_is_consistent() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn parses_flags_and_subcommands() {
        let args = CliArgs::try_parse_from([
            "schemashift",
            "upgrade",
            "--target",
            "2",
            "--database-url",
            "sqlite::memory:",
        ])
        .unwrap();
        assert_eq!(args.database_url.as_deref(), Some("sqlite::memory:"));
        assert_eq!(args.command, Commands::Upgrade { target: Some(2) });

        let args = CliArgs::try_parse_from(["schemashift", "downgrade", "--target", "0"]).unwrap();
        assert_eq!(args.command, Commands::Downgrade { target: 0 });
        assert!(CliArgs::try_parse_from(["schemashift", "downgrade"]).is_err());
    }

    #[test]
    fn list_needs_no_connection() {
        let mut out = Vec::new();
        execute(&migrator(), None, &Commands::List, &mut out).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("Defined migrations (2):"));
        assert!(out.contains("v1: Create users"));

        for command in [
            Commands::Status,
            Commands::History,
            Commands::Downgrade { target: 0 },
        ] {
            let err = execute(&migrator(), None, &command, &mut Vec::new()).unwrap_err();
            assert!(err.to_string().contains("needs a database connection"));
        }
    }

    #[test]
    fn list_ignores_a_supplied_connection() {
        let mut conn = rusqlite::Connection::open_in_memory().unwrap();
        let out = run_command(&migrator(), &mut conn, Commands::List).unwrap();
        assert!(out.contains("v2: Add email"));
        assert!(conn.prepare("SELECT 1 FROM _schemashift_version_").is_err());
    }

    #[test]
    fn upgrade_status_and_history() {
        let migrator = migrator();
        let mut conn = rusqlite::Connection::open_in_memory().unwrap();

        let status = run_command(&migrator, &mut conn, Commands::Status).unwrap();
        assert!(status.contains("Current version: 0"));
        assert!(status.contains("Pending migrations (2):"));

        let out = run_command(&migrator, &mut conn, Commands::Upgrade { target: Some(1) }).unwrap();
        assert_eq!(out, "Applied v1\n");
        let out = run_command(&migrator, &mut conn, Commands::Upgrade { target: None }).unwrap();
        assert_eq!(out, "Applied v2\n");
        let out = run_command(&migrator, &mut conn, Commands::Upgrade { target: None }).unwrap();
        assert_eq!(out, "No migrations to apply.\n");

        let status = run_command(&migrator, &mut conn, Commands::Status).unwrap();
        assert!(status.contains("Database is up to date."));

        let history = run_command(&migrator, &mut conn, Commands::History).unwrap();
        assert!(history.contains("v1: Create users"));
        assert!(history.contains("v2: Add email"));
    }

    #[test]
    fn preview_and_downgrade() {
        let migrator = migrator();
        let mut conn = rusqlite::Connection::open_in_memory().unwrap();
        run_command(&migrator, &mut conn, Commands::Upgrade { target: None }).unwrap();

        let preview = run_command(
            &migrator,
            &mut conn,
            Commands::Preview {
                downgrade_to: Some(0),
            },
        )
        .unwrap();
        assert!(preview.contains("Would roll back (2):"));

        let out = run_command(&migrator, &mut conn, Commands::Downgrade { target: 0 }).unwrap();
        assert_eq!(out, "Rolled back v2\nRolled back v1\n");

        let preview =
            run_command(&migrator, &mut conn, Commands::Preview { downgrade_to: None }).unwrap();
        assert!(preview.contains("Would apply (2):"));
    }

    #[test]
    fn failing_migration_is_an_error() {
        sql_migration!(Broken, 1, "Broken", up: ["CREATE TABLE"]);
        let migrator = Migrator::new(vec![Box::new(Broken)]);
        let mut conn = rusqlite::Connection::open_in_memory().unwrap();

        let err = run_command(&migrator, &mut conn, Commands::Upgrade { target: None }).unwrap_err();
        assert!(err.starts_with("migration v1 (Broken) failed"));
    }
}
