//! Migration test harness over an in-memory SQLite database.

use std::collections::BTreeMap;

use rusqlite::types::FromSql;
use serde::{Deserialize, Serialize};

use crate::{Error, Migrator};

/// Runs a [Migrator] against a private SQLite database and provides state
/// control and assertion helpers.
///
/// ```
/// use schemashift::testing::MigrationTestHarness;
/// use schemashift::{ColumnSpec, ColumnType, Error, Migration, Migrator, Schema};
///
/// struct CreateUsers;
/// impl Migration for CreateUsers {
///     fn version(&self) -> u32 { 1 }
///     fn up(&self, schema: &mut Schema) -> Result<(), Error> {
///         schema
///             .create_table("users")?
///             .create_column("users", ColumnSpec::new("name", ColumnType::Text))?;
///         Ok(())
///     }
///     fn down(&self, schema: &mut Schema) -> Result<(), Error> {
///         schema.drop_table("users")?;
///         Ok(())
///     }
/// }
///
/// # fn main() -> Result<(), Error> {
/// let mut harness = MigrationTestHarness::new(Migrator::new(vec![Box::new(CreateUsers)]));
/// harness.migrate_to(1)?;
/// harness.execute("INSERT INTO users (id, name) VALUES (1, 'alice')")?;
/// harness.assert_table_exists("users")?;
///
/// let name: String = harness.query_one("SELECT name FROM users WHERE id = 1")?;
/// assert_eq!(name, "alice");
/// # Ok(())
/// # }
/// ```
pub struct MigrationTestHarness {
    conn: rusqlite::Connection,
    migrator: Migrator,
}

/// Tables of a database, excluding SQLite internals and the version table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub tables: BTreeMap<String, TableSchema>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub columns: Vec<ColumnInfo>,
    /// Sorted by name.
    pub indexes: Vec<IndexInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub type_name: String,
    pub not_null: bool,
    pub default_value: Option<String>,
    pub primary_key: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub name: String,
    pub unique: bool,
    pub columns: Vec<String>,
}

fn failed(message: String) -> Error {
    Error::Generic(message)
}

impl MigrationTestHarness {
    /// Create a harness over a fresh in-memory database.
    ///
    /// Pass the same migrator the application uses, built by a shared
    /// function, so that tests of earlier migrations keep exercising exactly
    /// what production runs.
    pub fn new(migrator: Migrator) -> Self {
        match rusqlite::Connection::open_in_memory() {
            Ok(conn) => Self { conn, migrator },
            Err(e) => panic!("Failed to create in-memory test database: {}", e),
        }
    }

    /// Create a harness over an existing connection, e.g. a file database.
    pub fn with_connection(conn: rusqlite::Connection, migrator: Migrator) -> Self {
        Self { conn, migrator }
    }

    pub fn migrator(&self) -> &Migrator {
        &self.migrator
    }

    /// Migrate up or down to `target_version`. A failing migration is
    /// returned as the error.
    pub fn migrate_to(&mut self, target_version: u32) -> Result<(), Error> {
        if target_version > 0
            && !self
                .migrator
                .migrations()
                .iter()
                .any(|m| m.version() == target_version)
        {
            return Err(failed(format!(
                "Migration version {} does not exist. Available versions: {}",
                target_version,
                self.migrator
                    .migrations()
                    .iter()
                    .map(|m| m.version().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }

        let current = self.current_version()?;
        let report = if target_version > current {
            self.migrator.upgrade_to(&mut self.conn, target_version)?
        } else if target_version < current {
            self.migrator.downgrade(&mut self.conn, target_version)?
        } else {
            return Ok(());
        };

        match report.failing_migration {
            Some(failure) => Err(failure.error),
            None => Ok(()),
        }
    }

    pub fn migrate_up_one(&mut self) -> Result<(), Error> {
        let current = self.current_version()?;
        self.migrate_to(current + 1)
    }

    pub fn migrate_down_one(&mut self) -> Result<(), Error> {
        match self.current_version()? {
            0 => Err(failed(
                "Already at version 0, cannot migrate down".to_string(),
            )),
            current => self.migrate_to(current - 1),
        }
    }

    pub fn current_version(&mut self) -> Result<u32, Error> {
        self.migrator.get_current_version(&mut self.conn)
    }

    /// Execute a SQL statement, e.g. to seed test data.
    pub fn execute(&mut self, sql: &str) -> Result<(), Error> {
        self.conn.execute(sql, []).map_err(|e| Error::sql(sql, e))?;
        Ok(())
    }

    /// Query the first column of the first row.
    pub fn query_one<T: FromSql>(&mut self, sql: &str) -> Result<T, Error> {
        self.conn
            .query_row(sql, [], |row| row.get(0))
            .map_err(|e| Error::sql(sql, e))
    }

    /// Query the first column of every row.
    pub fn query_all<T: FromSql>(&mut self, sql: &str) -> Result<Vec<T>, Error> {
        let mut stmt = self.conn.prepare(sql).map_err(|e| Error::sql(sql, e))?;
        let rows = stmt
            .query_map([], |row| row.get(0))
            .and_then(|rows| rows.collect::<Result<Vec<T>, _>>())
            .map_err(|e| Error::sql(sql, e))?;
        Ok(rows)
    }

    pub fn table_exists(&mut self, table: &str) -> Result<bool, Error> {
        self.count_master("table", table).map(|n| n > 0)
    }

    pub fn index_exists(&mut self, index: &str) -> Result<bool, Error> {
        self.count_master("index", index).map(|n| n > 0)
    }

    /// Column names of `table`, in declaration order.
    pub fn column_names(&mut self, table: &str) -> Result<Vec<String>, Error> {
        Ok(self.columns(table)?.into_iter().map(|c| c.name).collect())
    }

    pub fn assert_table_exists(&mut self, table: &str) -> Result<(), Error> {
        if !self.table_exists(table)? {
            return Err(failed(format!("Table '{}' does not exist", table)));
        }
        Ok(())
    }

    pub fn assert_table_not_exists(&mut self, table: &str) -> Result<(), Error> {
        if self.table_exists(table)? {
            return Err(failed(format!("Table '{}' exists but should not", table)));
        }
        Ok(())
    }

    pub fn assert_column_exists(&mut self, table: &str, column: &str) -> Result<(), Error> {
        if !self.column_names(table)?.iter().any(|c| c == column) {
            return Err(failed(format!(
                "Column '{}' does not exist in table '{}'",
                column, table
            )));
        }
        Ok(())
    }

    pub fn assert_index_exists(&mut self, index: &str) -> Result<(), Error> {
        if !self.index_exists(index)? {
            return Err(failed(format!("Index '{}' does not exist", index)));
        }
        Ok(())
    }

    /// Capture every user table with its columns and indexes.
    pub fn capture_schema(&mut self) -> Result<SchemaSnapshot, Error> {
        let sql = "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' AND name != ?1";
        let names: Vec<String> = {
            let mut stmt = self.conn.prepare(sql).map_err(|e| Error::sql(sql, e))?;
            let rows = stmt
                .query_map([self.migrator.schema_version_table_name()], |row| row.get(0))
                .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
                .map_err(|e| Error::sql(sql, e))?;
            rows
        };

        let mut tables = BTreeMap::new();
        for name in names {
            let columns = self.columns(&name)?;
            let indexes = self.indexes(&name)?;
            tables.insert(name, TableSchema { columns, indexes });
        }
        Ok(SchemaSnapshot { tables })
    }

    /// Compare the current schema with `expected`, describing every difference.
    pub fn assert_schema_matches(&mut self, expected: &SchemaSnapshot) -> Result<(), Error> {
        let actual = self.capture_schema()?;
        if actual == *expected {
            return Ok(());
        }

        let mut differences = Vec::new();
        for name in expected.tables.keys() {
            if !actual.tables.contains_key(name) {
                differences.push(format!("  - Table '{}' is missing", name));
            }
        }
        for name in actual.tables.keys() {
            if !expected.tables.contains_key(name) {
                differences.push(format!("  - Unexpected table '{}' found", name));
            }
        }
        for (name, want) in &expected.tables {
            let Some(got) = actual.tables.get(name) else {
                continue;
            };
            if want.columns != got.columns {
                differences.push(format!(
                    "  - Table '{}' columns differ:\n    Expected: {:?}\n    Actual:   {:?}",
                    name, want.columns, got.columns
                ));
            }
            if want.indexes != got.indexes {
                differences.push(format!(
                    "  - Table '{}' indexes differ:\n    Expected: {:?}\n    Actual:   {:?}",
                    name, want.indexes, got.indexes
                ));
            }
        }

        Err(failed(format!(
            "Schema mismatch detected:\n{}",
            differences.join("\n")
        )))
    }

    /// The underlying connection, for anything the helpers do not cover.
    pub fn connection(&mut self) -> &mut rusqlite::Connection {
        &mut self.conn
    }

    fn count_master(&mut self, kind: &str, name: &str) -> Result<i64, Error> {
        let sql = "SELECT COUNT(*) FROM sqlite_master WHERE type = ?1 AND name = ?2";
        self.conn
            .query_row(sql, [kind, name], |row| row.get(0))
            .map_err(|e| Error::sql(sql, e))
    }

    fn columns(&mut self, table: &str) -> Result<Vec<ColumnInfo>, Error> {
        let sql = "SELECT name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?1)";
        let mut stmt = self.conn.prepare(sql).map_err(|e| Error::sql(sql, e))?;
        let columns = stmt
            .query_map([table], |row| {
                Ok(ColumnInfo {
                    name: row.get(0)?,
                    type_name: row.get(1)?,
                    not_null: row.get::<_, i64>(2)? != 0,
                    default_value: row.get(3)?,
                    primary_key: row.get::<_, i64>(4)? != 0,
                })
            })
            .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
            .map_err(|e| Error::sql(sql, e))?;
        Ok(columns)
    }

    fn indexes(&mut self, table: &str) -> Result<Vec<IndexInfo>, Error> {
        // origin 'c' excludes indexes SQLite creates implicitly for constraints
        let sql = "SELECT name, \"unique\" FROM pragma_index_list(?1) WHERE origin = 'c' ORDER BY name";
        let listed: Vec<(String, bool)> = {
            let mut stmt = self.conn.prepare(sql).map_err(|e| Error::sql(sql, e))?;
            let rows = stmt
                .query_map([table], |row| Ok((row.get(0)?, row.get::<_, i64>(1)? != 0)))
                .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
                .map_err(|e| Error::sql(sql, e))?;
            rows
        };

        let column_sql = "SELECT name FROM pragma_index_info(?1) ORDER BY seqno";
        let mut indexes = Vec::with_capacity(listed.len());
        for (name, unique) in listed {
            let columns = {
                let mut stmt = self
                    .conn
                    .prepare(column_sql)
                    .map_err(|e| Error::sql(column_sql, e))?;
                let rows = stmt
                    .query_map([&name], |row| row.get(0))
                    .and_then(|rows| rows.collect::<Result<Vec<String>, _>>())
                    .map_err(|e| Error::sql(column_sql, e))?;
                rows
            };
            indexes.push(IndexInfo {
                name,
                unique,
                columns,
            });
        }
        Ok(indexes)
    }
}
