//! The operation surface migrations are written against.
//!
//! A [Schema] binds one [Connection] and forwards every operation, with the
//! same arguments and in call order, to the [Adapter] matching the
//! connection's engine. It generates no SQL itself. The adapter is resolved on
//! first use and cached for the lifetime of the `Schema`; an unsupported engine
//! fails at that point, before any statement reaches the connection.

use std::fmt;

use crate::adapter::{Adapter, SchemaAdapter};
use crate::{ColumnSpec, Connection, Error, Row, Value};

/// The DDL/DML façade lent to [Migration::up](crate::Migration::up) and
/// [Migration::down](crate::Migration::down).
///
/// Schema-changing operations return `&mut Self` so that steps chain:
///
/// ```
/// use schemashift::{ColumnSpec, ColumnType, Error, Schema};
///
/// # fn main() -> Result<(), Error> {
/// let mut conn = rusqlite::Connection::open_in_memory().unwrap();
/// let mut schema = Schema::new(&mut conn);
/// schema
///     .create_table("categories")?
///     .create_column(
///         "categories",
///         ColumnSpec::new("title", ColumnType::Varchar).length(255).not_null(),
///     )?
///     .create_unique_index("categories", &["title"], None)?;
/// let inserted = schema.insert("categories", &[("title", "News".into())])?;
/// assert_eq!(inserted, 1);
/// # Ok(())
/// # }
/// ```
pub struct Schema<'c> {
    conn: &'c mut dyn Connection,
    adapter: Option<Adapter>,
    migration: Option<(u32, String)>,
    sink: Option<&'c dyn Fn(&str)>,
}

impl<'c> Schema<'c> {
    pub fn new(conn: &'c mut dyn Connection) -> Self {
        Self {
            conn,
            adapter: None,
            migration: None,
            sink: None,
        }
    }

    /// Identify the migration this schema is lent to, for [Schema::stop].
    pub fn for_migration(mut self, version: u32, name: impl Into<String>) -> Self {
        self.migration = Some((version, name.into()));
        self
    }

    /// Redirect [Schema::message] output away from stdout.
    pub fn with_message_sink(mut self, sink: &'c dyn Fn(&str)) -> Self {
        self.sink = Some(sink);
        self
    }

    /// The adapter for the bound connection's engine, resolved on first call.
    pub fn adapter(&mut self) -> Result<Adapter, Error> {
        match self.adapter {
            Some(adapter) => Ok(adapter),
            None => {
                let adapter = Adapter::resolve(self.conn.engine())?;
                self.adapter = Some(adapter);
                Ok(adapter)
            }
        }
    }

    /// Direct access to the bound connection.
    pub fn connection(&mut self) -> &mut dyn Connection {
        &mut *self.conn
    }

    /// Execute raw SQL. The statement is not escaped or checked in any way.
    pub fn query(&mut self, sql: &str) -> Result<&mut Self, Error> {
        let adapter = self.adapter()?;
        adapter.query(&mut *self.conn, sql)?;
        Ok(self)
    }

    /// Run a raw query and return its rows, for migrations that transform data.
    pub fn query_rows(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>, Error> {
        self.adapter()?;
        self.conn.query(sql, params)
    }

    pub fn create_table(&mut self, table: &str) -> Result<&mut Self, Error> {
        let adapter = self.adapter()?;
        adapter.create_table(&mut *self.conn, table)?;
        Ok(self)
    }

    pub fn drop_table(&mut self, table: &str) -> Result<&mut Self, Error> {
        let adapter = self.adapter()?;
        adapter.drop_table(&mut *self.conn, table)?;
        Ok(self)
    }

    pub fn create_column(&mut self, table: &str, column: ColumnSpec) -> Result<&mut Self, Error> {
        column.validate()?;
        let adapter = self.adapter()?;
        adapter.create_column(&mut *self.conn, table, &column)?;
        Ok(self)
    }

    pub fn drop_column(&mut self, table: &str, column: &str) -> Result<&mut Self, Error> {
        let adapter = self.adapter()?;
        adapter.drop_column(&mut *self.conn, table, column)?;
        Ok(self)
    }

    /// Create a unique index over `columns`. Without a name the index is
    /// called `{table}_{column...}_uniq`.
    pub fn create_unique_index(
        &mut self,
        table: &str,
        columns: &[&str],
        index_name: Option<&str>,
    ) -> Result<&mut Self, Error> {
        if columns.is_empty() {
            return Err(Error::invalid_argument(format!(
                "unique index on '{}' needs at least one column",
                table
            )));
        }
        let adapter = self.adapter()?;
        adapter.create_unique_index(&mut *self.conn, table, columns, index_name)?;
        Ok(self)
    }

    pub fn drop_unique_index(&mut self, table: &str, index_name: &str) -> Result<&mut Self, Error> {
        let adapter = self.adapter()?;
        adapter.drop_unique_index(&mut *self.conn, table, index_name)?;
        Ok(self)
    }

    /// Insert one row and return the affected-row count.
    pub fn insert(&mut self, table: &str, values: &[(&str, Value)]) -> Result<u64, Error> {
        if values.is_empty() {
            return Err(Error::invalid_argument(format!(
                "insert into '{}' needs at least one value",
                table
            )));
        }
        let adapter = self.adapter()?;
        adapter.insert(&mut *self.conn, table, values)
    }

    /// Update the rows matching `where_clause` (every row when `None` or
    /// blank) and return the affected-row count. The clause is raw SQL.
    pub fn update(
        &mut self,
        table: &str,
        bind: &[(&str, Value)],
        where_clause: Option<&str>,
    ) -> Result<u64, Error> {
        if bind.is_empty() {
            return Err(Error::invalid_argument(format!(
                "update of '{}' needs at least one value",
                table
            )));
        }
        let adapter = self.adapter()?;
        adapter.update(&mut *self.conn, table, bind, where_clause)
    }

    /// Report progress to the operator.
    pub fn message(&self, text: &str) {
        #[cfg(feature = "tracing")]
        tracing::info!(message = text, "Migration message");

        match self.sink {
            Some(sink) => sink(text),
            None => println!("{}", text),
        }
    }

    /// Refuse to go any further back. Used as the body of a terminal
    /// migration's `down`; always returns [Error::IrreversibleMigration].
    pub fn stop(&self) -> Result<(), Error> {
        let (version, name) = self
            .migration
            .clone()
            .unwrap_or_else(|| (0, "unnamed migration".to_string()));
        Err(Error::IrreversibleMigration { version, name })
    }
}

impl fmt::Debug for Schema<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("engine", &self.conn.engine())
            .field("adapter", &self.adapter)
            .field("migration", &self.migration)
            .field("sink", &self.sink.is_some())
            .finish()
    }
}
