use crate::error::Error;
use crate::schema::Schema;
use chrono::Utc;
use sha2::{Digest, Sha256};

/// Represents a failure during a migration.
#[derive(Debug, PartialEq)]
pub struct MigrationFailure<'migration> {
    pub(crate) migration: &'migration dyn Migration,
    pub(crate) error: Error,
}

impl<'migration> MigrationFailure<'migration> {
    /// Get the migration that failed.
    pub fn migration(&self) -> &dyn Migration {
        self.migration
    }

    /// Get the error that caused the migration to fail.
    pub fn error(&self) -> &Error {
        &self.error
    }
}

/// A report of actions performed during an upgrade or downgrade.
#[derive(Debug, PartialEq)]
pub struct MigrationReport<'migration> {
    pub schema_version_table_existed: bool,
    pub schema_version_table_created: bool,
    /// Versions whose `up` (or `down`) completed, in execution order.
    pub migrations_run: Vec<u32>,
    pub failing_migration: Option<MigrationFailure<'migration>>,
}

/// Represents a migration that has been applied to the database.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedMigration {
    /// The version number of the migration.
    pub version: u32,
    /// The name of the migration.
    pub name: String,
    /// The timestamp when the migration was applied.
    pub applied_at: chrono::DateTime<Utc>,
    /// The checksum of the migration at the time it was applied.
    pub checksum: String,
}

pub(crate) const DEFAULT_VERSION_TABLE_NAME: &str = "_schemashift_version_";

/// A single versioned schema change.
///
/// `up` and `down` describe the change through the [Schema] façade, which
/// renders each step for whichever engine the migrator is connected to. The
/// `version` must be unique among all migrations supplied to a migrator, and
/// greater than 0. `name` and `description` only aid in debugging and
/// observability.
///
/// ```
/// use schemashift::{ColumnSpec, ColumnType, Error, Migration, Schema};
///
/// struct AddCategories;
///
/// impl Migration for AddCategories {
///     fn version(&self) -> u32 {
///         1
///     }
///
///     fn up(&self, schema: &mut Schema) -> Result<(), Error> {
///         schema
///             .create_table("categories")?
///             .create_column(
///                 "categories",
///                 ColumnSpec::new("title", ColumnType::Varchar).length(255).not_null(),
///             )?;
///         Ok(())
///     }
///
///     fn down(&self, schema: &mut Schema) -> Result<(), Error> {
///         schema.drop_table("categories")?;
///         Ok(())
///     }
/// }
/// ```
pub trait Migration {
    /// Returns the version number of this migration.
    ///
    /// # IMPORTANT WARNING
    ///
    /// **Once a migration has been applied to any database, its version number must NEVER be changed.**
    /// The version is used to track which migrations have been applied. Changing it will cause
    /// the migrator to fail validation with an error about missing or orphaned migrations.
    ///
    /// # Requirements
    ///
    /// - Must be greater than 0
    /// - Must be unique across all migrations
    /// - Must be contiguous (1, 2, 3, ... with no gaps)
    /// - Must be immutable once the migration is applied to any database
    fn version(&self) -> u32;

    /// Returns the name of this migration.
    ///
    /// **Once a migration has been applied, its name must not change**: it is
    /// part of the checksum recorded in the version table.
    ///
    /// Defaults to "Migration {version}".
    fn name(&self) -> String {
        format!("Migration {}", self.version())
    }

    /// Returns an optional description of what this migration does.
    /// Not used for tracking, so it can change at any time.
    fn description(&self) -> Option<&'static str> {
        None
    }

    /// Apply the change.
    ///
    /// Steps run in order and the first failing step aborts the migration.
    /// Whether earlier steps are undone depends on the engine: SQLite and
    /// PostgreSQL run each migration in a transaction, MySQL commits every
    /// DDL statement immediately.
    fn up(&self, schema: &mut Schema) -> Result<(), Error>;

    /// Revert the change made by [Migration::up].
    ///
    /// The default implementation marks the migration as terminal: it fails
    /// with [Error::IrreversibleMigration] and touches nothing.
    fn down(&self, schema: &mut Schema) -> Result<(), Error> {
        schema.stop()
    }
}

impl PartialEq for dyn Migration + '_ {
    fn eq(&self, other: &Self) -> bool {
        self.version() == other.version()
    }
}

impl std::fmt::Debug for dyn Migration + '_ {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migration")
            .field("version", &self.version())
            .field("name", &self.name())
            .finish()
    }
}

/// Calculate a checksum for a migration based on its version and name.
/// This is used to verify that migrations haven't been modified after being applied.
pub(crate) fn calculate_checksum(migration: &dyn Migration) -> String {
    let mut hasher = Sha256::new();
    hasher.update(migration.version().to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(migration.name().as_bytes());
    format!("{:x}", hasher.finalize())
}
