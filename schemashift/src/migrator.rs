//! Sequencing and tracking of migrations.
//!
//! The [Migrator] keeps a ledger table (default `_schemashift_version_`) with
//! one row per applied migration. Before doing any work it checks that the
//! ledger agrees with the migrations it was given: every applied version must
//! still exist with an unchanged checksum, and applied versions must not have
//! gaps.
//!
//! ## Transaction Safety
//!
//! Where the engine supports transactional DDL (SQLite, PostgreSQL), each
//! migration and its ledger update run in one transaction, so a failing
//! migration leaves the database as it was after the last successful one.
//! MySQL commits every DDL statement implicitly; a migration that fails
//! midway there leaves its earlier statements applied and is not recorded in
//! the ledger, so it can be fixed and re-run.
//!
//! | Behavior | SQLite | MySQL | PostgreSQL |
//! |----------|--------|-------|------------|
//! | DDL in transactions | Fully supported | Causes implicit commit | Fully supported |
//! | Migration failure | Complete rollback | Partial DDL may persist | Complete rollback |

use std::time::{Duration, Instant};

use chrono::Utc;

use crate::adapter::{count, Adapter, SchemaAdapter};
use crate::core::{calculate_checksum, DEFAULT_VERSION_TABLE_NAME};
use crate::{
    AppliedMigration, Connection, Error, Migration, MigrationFailure, MigrationReport, Schema,
    Value,
};

type StartHook = Box<dyn Fn(u32, &str) + Send + Sync>;
type CompleteHook = Box<dyn Fn(u32, &str, Duration) + Send + Sync>;
type ErrorHook = Box<dyn Fn(u32, &str, &Error) + Send + Sync>;
type MessageHook = Box<dyn Fn(u32, &str) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Up,
    Down,
}

/// A row of the ledger table.
struct LedgerEntry {
    version: u32,
    name: String,
    applied_at: String,
    checksum: String,
}

/// The entrypoint for running a sequence of [Migration]s against any
/// supported [Connection].
/// Construct this struct with the list of all [Migration]s to be applied.
/// [Migration::version]s must be contiguous, greater than zero, and unique.
///
/// ```
/// use schemashift::{sql_migration, Migrator};
///
/// sql_migration!(CreateUsers, 1, "Create users",
///     up: ["CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)"],
///     down: ["DROP TABLE users"]);
///
/// let migrator = Migrator::new(vec![Box::new(CreateUsers)]);
/// let mut conn = rusqlite::Connection::open_in_memory().unwrap();
/// let report = migrator.upgrade(&mut conn).unwrap();
/// assert_eq!(report.migrations_run, vec![1]);
/// assert_eq!(migrator.get_current_version(&mut conn).unwrap(), 1);
/// ```
pub struct Migrator {
    migrations: Vec<Box<dyn Migration>>,
    schema_version_table_name: String,
    use_transactions: bool,
    on_migration_start: Option<StartHook>,
    on_migration_complete: Option<CompleteHook>,
    on_migration_error: Option<ErrorHook>,
    on_message: Option<MessageHook>,
}

// Manual Debug impl since closures don't implement Debug
impl std::fmt::Debug for Migrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migrator")
            .field("migrations", &self.migrations)
            .field("schema_version_table_name", &self.schema_version_table_name)
            .field("use_transactions", &self.use_transactions)
            .field("on_migration_start", &self.on_migration_start.is_some())
            .field(
                "on_migration_complete",
                &self.on_migration_complete.is_some(),
            )
            .field("on_migration_error", &self.on_migration_error.is_some())
            .field("on_message", &self.on_message.is_some())
            .finish()
    }
}

impl Migrator {
    /// Create a new Migrator, validating migration invariants.
    /// Returns an error if migrations are invalid.
    pub fn try_new(migrations: Vec<Box<dyn Migration>>) -> Result<Self, String> {
        let mut versions: Vec<u32> = migrations.iter().map(|m| m.version()).collect();
        versions.sort();

        for (i, &version) in versions.iter().enumerate() {
            if version == 0 {
                return Err("Migration version must be greater than 0, found version 0".to_string());
            }
            if i > 0 && versions[i - 1] == version {
                return Err(format!("Duplicate migration version found: {}", version));
            }
        }

        // Versions must be 1, 2, 3, ...
        if let Some(&first) = versions.first() {
            if first != 1 {
                return Err(format!(
                    "Migration versions must start at 1, found starting version: {}",
                    first
                ));
            }
            for (i, &version) in versions.iter().enumerate() {
                let expected = (i + 1) as u32;
                if version != expected {
                    return Err(format!(
                        "Migration versions must be contiguous. Expected version {}, found {}",
                        expected, version
                    ));
                }
            }
        }

        Ok(Self {
            migrations,
            schema_version_table_name: DEFAULT_VERSION_TABLE_NAME.to_string(),
            use_transactions: true,
            on_migration_start: None,
            on_migration_complete: None,
            on_migration_error: None,
            on_message: None,
        })
    }

    /// Create a new Migrator, panicking if migration metadata is invalid.
    /// For a non-panicking version, use `try_new`.
    pub fn new(migrations: Vec<Box<dyn Migration>>) -> Self {
        match Self::try_new(migrations) {
            Ok(migrator) => migrator,
            Err(err) => panic!("{}", err),
        }
    }

    /// Set a custom name for the schema version tracking table.
    /// Defaults to "_schemashift_version_".
    pub fn with_schema_version_table_name(mut self, name: impl Into<String>) -> Self {
        self.schema_version_table_name = name.into();
        self
    }

    /// Whether to wrap each migration in a transaction. Defaults to `true`.
    /// Has no effect on engines without transactional DDL.
    pub fn with_transactions(mut self, enabled: bool) -> Self {
        self.use_transactions = enabled;
        self
    }

    /// Set a callback to be invoked when a migration starts.
    /// The callback receives the migration version and name.
    pub fn on_migration_start<F>(mut self, callback: F) -> Self
    where
        F: Fn(u32, &str) + Send + Sync + 'static,
    {
        self.on_migration_start = Some(Box::new(callback));
        self
    }

    /// Set a callback to be invoked when a migration completes successfully.
    /// The callback receives the migration version, name, and duration.
    pub fn on_migration_complete<F>(mut self, callback: F) -> Self
    where
        F: Fn(u32, &str, Duration) + Send + Sync + 'static,
    {
        self.on_migration_complete = Some(Box::new(callback));
        self
    }

    /// Set a callback to be invoked when a migration fails.
    /// The callback receives the migration version, name, and error.
    pub fn on_migration_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(u32, &str, &Error) + Send + Sync + 'static,
    {
        self.on_migration_error = Some(Box::new(callback));
        self
    }

    /// Receive the text migrations pass to [Schema::message], together with
    /// the emitting migration's version. Without this hook messages are
    /// printed to stdout.
    pub fn on_message<F>(mut self, callback: F) -> Self
    where
        F: Fn(u32, &str) + Send + Sync + 'static,
    {
        self.on_message = Some(Box::new(callback));
        self
    }

    /// Get a reference to all migrations in this migrator.
    pub fn migrations(&self) -> &[Box<dyn Migration>] {
        &self.migrations
    }

    pub fn schema_version_table_name(&self) -> &str {
        &self.schema_version_table_name
    }

    /// Get the current migration version from the database.
    /// Returns 0 if no migrations have been applied.
    pub fn get_current_version(&self, conn: &mut dyn Connection) -> Result<u32, Error> {
        let adapter = Adapter::resolve(conn.engine())?;
        self.current_version(adapter, conn)
    }

    fn current_version(&self, adapter: Adapter, conn: &mut dyn Connection) -> Result<u32, Error> {
        if !adapter.table_exists(conn, &self.schema_version_table_name)? {
            return Ok(0);
        }
        let rows = conn.query(
            &format!(
                "SELECT COALESCE(MAX(version), 0) FROM {}",
                adapter.quote_ident(&self.schema_version_table_name)
            ),
            &[],
        )?;
        Ok(count(&rows) as u32)
    }

    /// Get the history of all migrations that have been applied to the database.
    /// Returns migrations in the order they were applied (by version number).
    /// Returns an empty vector if no migrations have been applied.
    pub fn get_migration_history(
        &self,
        conn: &mut dyn Connection,
    ) -> Result<Vec<AppliedMigration>, Error> {
        let adapter = Adapter::resolve(conn.engine())?;
        if !adapter.table_exists(conn, &self.schema_version_table_name)? {
            return Ok(vec![]);
        }

        self.read_ledger(adapter, conn)?
            .into_iter()
            .map(|entry| {
                let applied_at = chrono::DateTime::parse_from_rfc3339(&entry.applied_at)
                    .map_err(|e| Error::Generic(format!("Failed to parse datetime: {}", e)))?
                    .with_timezone(&Utc);
                Ok(AppliedMigration {
                    version: entry.version,
                    name: entry.name,
                    applied_at,
                    checksum: entry.checksum,
                })
            })
            .collect()
    }

    /// Preview which migrations would be applied by `upgrade()` without actually running them.
    /// Returns a list of migrations that would be executed, in the order they would run.
    pub fn preview_upgrade(&self, conn: &mut dyn Connection) -> Result<Vec<&dyn Migration>, Error> {
        let current_version = self.get_current_version(conn)?;

        let mut pending = self
            .migrations
            .iter()
            .map(|m| m.as_ref())
            .filter(|m| m.version() > current_version)
            .collect::<Vec<_>>();
        pending.sort_by_key(|m| m.version());

        Ok(pending)
    }

    /// Preview which migrations would be rolled back by `downgrade(target_version)` without actually running them.
    /// Returns a list of migrations that would be executed, in the order they would run (reverse order).
    pub fn preview_downgrade(
        &self,
        conn: &mut dyn Connection,
        target_version: u32,
    ) -> Result<Vec<&dyn Migration>, Error> {
        let current_version = self.get_current_version(conn)?;
        self.check_downgrade_target(target_version, current_version)?;
        Ok(self.rollback_plan(target_version, current_version))
    }

    /// Upgrade the database to a specific target version.
    ///
    /// This runs all pending migrations up to and including the target version.
    /// If the database is already at or beyond the target version, no migrations are run.
    pub fn upgrade_to(
        &self,
        conn: &mut dyn Connection,
        target_version: u32,
    ) -> Result<MigrationReport<'_>, Error> {
        if target_version > 0
            && !self
                .migrations
                .iter()
                .any(|m| m.version() == target_version)
        {
            return Err(Error::Generic(format!(
                "Target version {} does not exist in migration list",
                target_version
            )));
        }

        self.upgrade_internal(conn, Some(target_version))
    }

    /// Upgrade the database by running all pending migrations.
    pub fn upgrade(&self, conn: &mut dyn Connection) -> Result<MigrationReport<'_>, Error> {
        self.upgrade_internal(conn, None)
    }

    fn upgrade_internal(
        &self,
        conn: &mut dyn Connection,
        target_version: Option<u32>,
    ) -> Result<MigrationReport<'_>, Error> {
        let adapter = Adapter::resolve(conn.engine())?;

        let schema_version_table_existed =
            adapter.table_exists(conn, &self.schema_version_table_name)?;
        let schema_version_table_created = !schema_version_table_existed;

        if schema_version_table_existed {
            let ledger = self.read_ledger(adapter, conn)?;
            self.validate_ledger(&ledger)?;
        } else {
            #[cfg(feature = "tracing")]
            tracing::info!(
                "Creating migration tracking table: {}",
                self.schema_version_table_name
            );

            conn.execute(
                &format!(
                    "CREATE TABLE {} (
                        version INTEGER PRIMARY KEY NOT NULL,
                        name TEXT NOT NULL,
                        applied_at TEXT NOT NULL,
                        checksum TEXT NOT NULL
                    )",
                    adapter.quote_ident(&self.schema_version_table_name)
                ),
                &[],
            )?;
        }

        let current_version = self.current_version(adapter, conn)?;

        let mut migrations_sorted = self
            .migrations
            .iter()
            .map(|m| m.as_ref())
            .collect::<Vec<_>>();
        migrations_sorted.sort_by_key(|m| m.version());

        let mut migrations_run: Vec<u32> = Vec::new();
        let mut failing_migration: Option<MigrationFailure> = None;
        // All migrations applied by this call share one timestamp
        let batch_applied_at = Utc::now().to_rfc3339();

        #[cfg(feature = "tracing")]
        tracing::debug!(
            current_version = current_version,
            target_version = ?target_version,
            available_migrations = ?migrations_sorted.iter().map(|m| (m.version(), m.name())).collect::<Vec<_>>(),
            "Considering migrations to run"
        );

        for migration in migrations_sorted {
            let migration_version = migration.version();
            if target_version.is_some_and(|target| migration_version > target) {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    migration_version = migration_version,
                    "Skipping migration (beyond target version)"
                );
                break;
            }
            if migration_version <= current_version {
                continue;
            }

            match self.run_step(adapter, conn, migration, Direction::Up, &batch_applied_at) {
                Ok(()) => migrations_run.push(migration_version),
                Err(error) => {
                    failing_migration = Some(MigrationFailure { migration, error });
                    break;
                }
            }
        }

        Ok(MigrationReport {
            schema_version_table_existed,
            schema_version_table_created,
            migrations_run,
            failing_migration,
        })
    }

    /// Rollback migrations down to the specified target version.
    /// Pass `target_version = 0` to rollback all migrations.
    /// Returns a [MigrationReport] describing which migrations were rolled back.
    ///
    /// Rolling back a migration whose `down` is irreversible stops the
    /// downgrade there, reporting [Error::IrreversibleMigration].
    pub fn downgrade(
        &self,
        conn: &mut dyn Connection,
        target_version: u32,
    ) -> Result<MigrationReport<'_>, Error> {
        let adapter = Adapter::resolve(conn.engine())?;

        if !adapter.table_exists(conn, &self.schema_version_table_name)? {
            // No migrations have been applied yet
            return Ok(MigrationReport {
                schema_version_table_existed: false,
                schema_version_table_created: false,
                migrations_run: vec![],
                failing_migration: None,
            });
        }

        let ledger = self.read_ledger(adapter, conn)?;
        self.validate_ledger(&ledger)?;

        let current_version = self.current_version(adapter, conn)?;
        self.check_downgrade_target(target_version, current_version)?;

        let mut migrations_run: Vec<u32> = Vec::new();
        let mut failing_migration: Option<MigrationFailure> = None;

        for migration in self.rollback_plan(target_version, current_version) {
            match self.run_step(adapter, conn, migration, Direction::Down, "") {
                Ok(()) => migrations_run.push(migration.version()),
                Err(error) => {
                    failing_migration = Some(MigrationFailure { migration, error });
                    break;
                }
            }
        }

        Ok(MigrationReport {
            schema_version_table_existed: true,
            schema_version_table_created: false,
            migrations_run,
            failing_migration,
        })
    }

    fn check_downgrade_target(&self, target_version: u32, current_version: u32) -> Result<(), Error> {
        if target_version > current_version {
            return Err(Error::Generic(format!(
                "Cannot downgrade to version {} when current version is {}. Target must be <= current version.",
                target_version, current_version
            )));
        }
        Ok(())
    }

    fn rollback_plan(&self, target_version: u32, current_version: u32) -> Vec<&dyn Migration> {
        let mut plan = self
            .migrations
            .iter()
            .map(|m| m.as_ref())
            .filter(|m| m.version() > target_version && m.version() <= current_version)
            .collect::<Vec<_>>();
        plan.sort_by_key(|m| std::cmp::Reverse(m.version()));
        plan
    }

    /// Run one migration in `direction` and update the ledger, inside a
    /// transaction where that is possible. Hooks and tracing events fire here.
    fn run_step(
        &self,
        adapter: Adapter,
        conn: &mut dyn Connection,
        migration: &dyn Migration,
        direction: Direction,
        applied_at: &str,
    ) -> Result<(), Error> {
        let version = migration.version();
        let name = migration.name();

        #[cfg(feature = "tracing")]
        let _span = match direction {
            Direction::Up => tracing::info_span!("migration_up", version = version, name = %name),
            Direction::Down => {
                tracing::info_span!("migration_down", version = version, name = %name)
            }
        }
        .entered();

        #[cfg(feature = "tracing")]
        tracing::info!(
            direction = ?direction,
            "Starting migration"
        );

        if let Some(ref callback) = self.on_migration_start {
            callback(version, &name);
        }

        let transactional = self.use_transactions && adapter.supports_transactional_ddl();
        let started = Instant::now();

        let result = if transactional {
            self.apply_in_transaction(adapter, conn, migration, direction, applied_at)
        } else {
            self.apply(adapter, conn, migration, direction, applied_at)
        };

        match result {
            Ok(()) => {
                let duration = started.elapsed();

                #[cfg(feature = "tracing")]
                tracing::info!(
                    duration_ms = duration.as_millis(),
                    "Migration completed successfully"
                );

                if let Some(ref callback) = self.on_migration_complete {
                    callback(version, &name, duration);
                }
                Ok(())
            }
            Err(error) => {
                #[cfg(feature = "tracing")]
                tracing::error!(error = %error, "Migration failed");

                if let Some(ref callback) = self.on_migration_error {
                    callback(version, &name, &error);
                }
                Err(error)
            }
        }
    }

    fn apply_in_transaction(
        &self,
        adapter: Adapter,
        conn: &mut dyn Connection,
        migration: &dyn Migration,
        direction: Direction,
        applied_at: &str,
    ) -> Result<(), Error> {
        adapter.begin(conn)?;
        match self.apply(adapter, conn, migration, direction, applied_at) {
            Ok(()) => adapter.commit(conn),
            Err(error) => {
                if let Err(_rollback_error) = adapter.rollback(conn) {
                    #[cfg(feature = "tracing")]
                    tracing::error!(error = %_rollback_error, "Rollback failed");
                }
                Err(error)
            }
        }
    }

    /// Lend the connection to the migration, then record the outcome in the ledger.
    fn apply(
        &self,
        adapter: Adapter,
        conn: &mut dyn Connection,
        migration: &dyn Migration,
        direction: Direction,
        applied_at: &str,
    ) -> Result<(), Error> {
        let version = migration.version();
        let sink = self
            .on_message
            .as_ref()
            .map(|callback| move |text: &str| callback(version, text));

        {
            let mut schema = Schema::new(&mut *conn).for_migration(version, migration.name());
            if let Some(sink) = &sink {
                schema = schema.with_message_sink(sink);
            }
            match direction {
                Direction::Up => migration.up(&mut schema)?,
                Direction::Down => migration.down(&mut schema)?,
            }
        }

        match direction {
            Direction::Up => {
                adapter.insert(
                    conn,
                    &self.schema_version_table_name,
                    &[
                        ("version", Value::from(version)),
                        ("name", Value::from(migration.name())),
                        ("applied_at", Value::from(applied_at)),
                        ("checksum", Value::from(calculate_checksum(migration))),
                    ],
                )?;
            }
            Direction::Down => {
                let mut params = Vec::new();
                let sql = format!(
                    "DELETE FROM {} WHERE version = {}",
                    adapter.quote_ident(&self.schema_version_table_name),
                    adapter.bind_value(&Value::from(version), &mut params)
                );
                conn.execute(&sql, &params)?;
            }
        }
        Ok(())
    }

    fn read_ledger(
        &self,
        adapter: Adapter,
        conn: &mut dyn Connection,
    ) -> Result<Vec<LedgerEntry>, Error> {
        let rows = conn.query(
            &format!(
                "SELECT version, name, applied_at, checksum FROM {} ORDER BY version",
                adapter.quote_ident(&self.schema_version_table_name)
            ),
            &[],
        )?;

        rows.into_iter()
            .map(|row| {
                let text = |idx: usize| {
                    row.get(idx)
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .ok_or_else(|| {
                            Error::Generic(format!(
                                "Malformed row in {}: {:?}",
                                self.schema_version_table_name, row
                            ))
                        })
                };
                let version = row
                    .first()
                    .and_then(Value::as_i64)
                    .and_then(|v| u32::try_from(v).ok())
                    .ok_or_else(|| {
                        Error::Generic(format!(
                            "Malformed version in {}: {:?}",
                            self.schema_version_table_name, row
                        ))
                    })?;
                Ok(LedgerEntry {
                    version,
                    name: text(1)?,
                    applied_at: text(2)?,
                    checksum: text(3)?,
                })
            })
            .collect()
    }

    /// Verify checksums of applied migrations, and detect applied migrations
    /// missing from code or gaps in the applied versions.
    fn validate_ledger(&self, ledger: &[LedgerEntry]) -> Result<(), Error> {
        for entry in ledger {
            match self.migrations.iter().find(|m| m.version() == entry.version) {
                Some(migration) => {
                    let current_checksum = calculate_checksum(migration.as_ref());
                    if current_checksum != entry.checksum {
                        return Err(Error::Generic(format!(
                            "Migration {} checksum mismatch. Expected '{}' but found '{}'. \
                            Migration name in DB: '{}', current name: '{}'. \
                            This indicates the migration was modified after being applied.",
                            entry.version,
                            entry.checksum,
                            current_checksum,
                            entry.name,
                            migration.name()
                        )));
                    }
                }
                None => {
                    return Err(Error::Generic(format!(
                        "Migration {} ('{}') was previously applied but is no longer present in the migration list. \
                        Applied migrations cannot be removed from the codebase.",
                        entry.version, entry.name
                    )));
                }
            }
        }

        let applied_versions: Vec<u32> = ledger.iter().map(|e| e.version).collect();
        if let Some(&max_applied) = applied_versions.iter().max() {
            for expected_version in 1..=max_applied {
                if applied_versions.contains(&expected_version) {
                    continue;
                }
                if let Some(missing) = self
                    .migrations
                    .iter()
                    .find(|m| m.version() == expected_version)
                {
                    return Err(Error::Generic(format!(
                        "Migration {} ('{}') exists in code but was not applied, yet later migrations are already applied. \
                        This likely means migration {} was added after migration {} was already applied. \
                        Applied migrations: {:?}",
                        expected_version,
                        missing.name(),
                        expected_version,
                        max_applied,
                        applied_versions
                    )));
                }
            }
        }
        Ok(())
    }
}
