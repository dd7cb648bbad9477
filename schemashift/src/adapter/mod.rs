//! Engine-specific translation of schema operations into SQL.
//!
//! Each engine has an adapter implementing the full [SchemaAdapter] operation
//! set. [Adapter] is the closed set of those adapters; [Adapter::resolve] picks
//! one from a connection's [EngineKind] with a plain match, so the supported
//! engines are known at compile time.
//!
//! Adapters hold no state. Every operation receives the connection it runs
//! against and blocks until the engine acknowledges the statement.

mod mysql;
mod postgres;
mod sqlite;

pub use mysql::MysqlAdapter;
pub use postgres::PostgresAdapter;
pub use sqlite::SqliteAdapter;

use crate::{ColumnSpec, Connection, EngineKind, Error, Value};

/// The operation set every engine adapter implements.
///
/// Operations an engine cannot express fail with
/// [Error::UnsupportedOperation]; no operation silently does nothing.
pub trait SchemaAdapter {
    fn engine(&self) -> EngineKind;

    /// Quote an identifier, doubling any embedded quote characters.
    fn quote_ident(&self, name: &str) -> String;

    /// Render `value` into a statement. Adapters using placeholders push the
    /// value onto `params` and return the placeholder.
    fn bind_value(&self, value: &Value, params: &mut Vec<Value>) -> String {
        params.push(value.clone());
        "?".to_string()
    }

    /// Render a value as a literal for use in DDL (column defaults).
    fn literal(&self, value: &Value) -> String {
        value.to_sql_literal(false)
    }

    /// The engine type for a column, including length and enum constraints.
    fn column_type_sql(&self, column: &ColumnSpec) -> String;

    /// Whether schema changes can be rolled back inside a transaction.
    fn supports_transactional_ddl(&self) -> bool;

    fn begin_sql(&self) -> &'static str {
        "BEGIN"
    }

    fn create_table_sql(&self, table: &str) -> String;

    /// Full column definition as used in `ALTER TABLE ... ADD COLUMN`.
    fn column_definition(&self, column: &ColumnSpec) -> String {
        let mut def = format!(
            "{} {}",
            self.quote_ident(column.name()),
            self.column_type_sql(column)
        );
        if column.is_not_null() {
            def.push_str(" NOT NULL");
        }
        if let Some(default) = column.get_default() {
            def.push_str(" DEFAULT ");
            def.push_str(&self.literal(default));
        }
        def
    }

    /// Execute raw SQL. The statement is passed through untouched.
    fn query(&self, conn: &mut dyn Connection, sql: &str) -> Result<u64, Error> {
        execute(conn, sql, &[])
    }

    fn create_table(&self, conn: &mut dyn Connection, table: &str) -> Result<(), Error> {
        execute(conn, &self.create_table_sql(table), &[])?;
        Ok(())
    }

    fn drop_table(&self, conn: &mut dyn Connection, table: &str) -> Result<(), Error> {
        let sql = format!("DROP TABLE {}", self.quote_ident(table));
        execute(conn, &sql, &[])?;
        Ok(())
    }

    fn create_column(
        &self,
        conn: &mut dyn Connection,
        table: &str,
        column: &ColumnSpec,
    ) -> Result<(), Error>;

    fn drop_column(
        &self,
        conn: &mut dyn Connection,
        table: &str,
        column: &str,
    ) -> Result<(), Error> {
        let sql = format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.quote_ident(table),
            self.quote_ident(column)
        );
        execute(conn, &sql, &[])?;
        Ok(())
    }

    fn create_unique_index(
        &self,
        conn: &mut dyn Connection,
        table: &str,
        columns: &[&str],
        index_name: Option<&str>,
    ) -> Result<(), Error> {
        let name = index_name
            .map(str::to_string)
            .unwrap_or_else(|| default_index_name(table, columns));
        let columns = columns
            .iter()
            .map(|c| self.quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "CREATE UNIQUE INDEX {} ON {} ({})",
            self.quote_ident(&name),
            self.quote_ident(table),
            columns
        );
        execute(conn, &sql, &[])?;
        Ok(())
    }

    fn drop_unique_index(
        &self,
        conn: &mut dyn Connection,
        table: &str,
        index_name: &str,
    ) -> Result<(), Error>;

    /// Insert one row, returning the number of affected rows.
    fn insert(
        &self,
        conn: &mut dyn Connection,
        table: &str,
        values: &[(&str, Value)],
    ) -> Result<u64, Error> {
        let mut params = Vec::with_capacity(values.len());
        let columns = values
            .iter()
            .map(|(column, _)| self.quote_ident(column))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = values
            .iter()
            .map(|(_, value)| self.bind_value(value, &mut params))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.quote_ident(table),
            columns,
            placeholders
        );
        execute(conn, &sql, &params)
    }

    /// Update rows matching `where_clause` (all rows when `None`), returning
    /// the number of affected rows. The clause is raw SQL.
    fn update(
        &self,
        conn: &mut dyn Connection,
        table: &str,
        bind: &[(&str, Value)],
        where_clause: Option<&str>,
    ) -> Result<u64, Error> {
        let mut params = Vec::with_capacity(bind.len());
        let assignments = bind
            .iter()
            .map(|(column, value)| {
                format!(
                    "{} = {}",
                    self.quote_ident(column),
                    self.bind_value(value, &mut params)
                )
            })
            .collect::<Vec<_>>()
            .join(", ");
        let mut sql = format!("UPDATE {} SET {}", self.quote_ident(table), assignments);
        if let Some(clause) = where_clause.filter(|c| !c.trim().is_empty()) {
            sql.push_str(" WHERE ");
            sql.push_str(clause);
        }
        execute(conn, &sql, &params)
    }

    fn table_exists(&self, conn: &mut dyn Connection, table: &str) -> Result<bool, Error>;

    fn begin(&self, conn: &mut dyn Connection) -> Result<(), Error> {
        execute(conn, self.begin_sql(), &[])?;
        Ok(())
    }

    fn commit(&self, conn: &mut dyn Connection) -> Result<(), Error> {
        execute(conn, "COMMIT", &[])?;
        Ok(())
    }

    fn rollback(&self, conn: &mut dyn Connection) -> Result<(), Error> {
        execute(conn, "ROLLBACK", &[])?;
        Ok(())
    }
}

/// The adapter for one of the supported engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adapter {
    Mysql(MysqlAdapter),
    Sqlite(SqliteAdapter),
    Postgres(PostgresAdapter),
}

impl Adapter {
    /// Select the adapter for `engine`. Engines outside MySQL, SQLite and
    /// PostgreSQL fail with [Error::UnsupportedEngine].
    pub fn resolve(engine: EngineKind) -> Result<Self, Error> {
        match engine {
            EngineKind::Mysql => Ok(Adapter::Mysql(MysqlAdapter)),
            EngineKind::Sqlite => Ok(Adapter::Sqlite(SqliteAdapter)),
            EngineKind::Postgres => Ok(Adapter::Postgres(PostgresAdapter)),
            EngineKind::Mssql | EngineKind::Oracle => Err(Error::UnsupportedEngine(engine)),
        }
    }

    fn dispatch(&self) -> &dyn SchemaAdapter {
        match self {
            Adapter::Mysql(a) => a as &dyn SchemaAdapter,
            Adapter::Sqlite(a) => a as &dyn SchemaAdapter,
            Adapter::Postgres(a) => a as &dyn SchemaAdapter,
        }
    }
}

impl SchemaAdapter for Adapter {
    fn engine(&self) -> EngineKind {
        self.dispatch().engine()
    }

    fn quote_ident(&self, name: &str) -> String {
        self.dispatch().quote_ident(name)
    }

    fn bind_value(&self, value: &Value, params: &mut Vec<Value>) -> String {
        self.dispatch().bind_value(value, params)
    }

    fn literal(&self, value: &Value) -> String {
        self.dispatch().literal(value)
    }

    fn column_type_sql(&self, column: &ColumnSpec) -> String {
        self.dispatch().column_type_sql(column)
    }

    fn supports_transactional_ddl(&self) -> bool {
        self.dispatch().supports_transactional_ddl()
    }

    fn begin_sql(&self) -> &'static str {
        self.dispatch().begin_sql()
    }

    fn create_table_sql(&self, table: &str) -> String {
        self.dispatch().create_table_sql(table)
    }

    fn column_definition(&self, column: &ColumnSpec) -> String {
        self.dispatch().column_definition(column)
    }

    fn query(&self, conn: &mut dyn Connection, sql: &str) -> Result<u64, Error> {
        self.dispatch().query(conn, sql)
    }

    fn create_table(&self, conn: &mut dyn Connection, table: &str) -> Result<(), Error> {
        self.dispatch().create_table(conn, table)
    }

    fn drop_table(&self, conn: &mut dyn Connection, table: &str) -> Result<(), Error> {
        self.dispatch().drop_table(conn, table)
    }

    fn create_column(
        &self,
        conn: &mut dyn Connection,
        table: &str,
        column: &ColumnSpec,
    ) -> Result<(), Error> {
        self.dispatch().create_column(conn, table, column)
    }

    fn drop_column(
        &self,
        conn: &mut dyn Connection,
        table: &str,
        column: &str,
    ) -> Result<(), Error> {
        self.dispatch().drop_column(conn, table, column)
    }

    fn create_unique_index(
        &self,
        conn: &mut dyn Connection,
        table: &str,
        columns: &[&str],
        index_name: Option<&str>,
    ) -> Result<(), Error> {
        self.dispatch()
            .create_unique_index(conn, table, columns, index_name)
    }

    fn drop_unique_index(
        &self,
        conn: &mut dyn Connection,
        table: &str,
        index_name: &str,
    ) -> Result<(), Error> {
        self.dispatch().drop_unique_index(conn, table, index_name)
    }

    fn insert(
        &self,
        conn: &mut dyn Connection,
        table: &str,
        values: &[(&str, Value)],
    ) -> Result<u64, Error> {
        self.dispatch().insert(conn, table, values)
    }

    fn update(
        &self,
        conn: &mut dyn Connection,
        table: &str,
        bind: &[(&str, Value)],
        where_clause: Option<&str>,
    ) -> Result<u64, Error> {
        self.dispatch().update(conn, table, bind, where_clause)
    }

    fn table_exists(&self, conn: &mut dyn Connection, table: &str) -> Result<bool, Error> {
        self.dispatch().table_exists(conn, table)
    }

    fn begin(&self, conn: &mut dyn Connection) -> Result<(), Error> {
        self.dispatch().begin(conn)
    }

    fn commit(&self, conn: &mut dyn Connection) -> Result<(), Error> {
        self.dispatch().commit(conn)
    }

    fn rollback(&self, conn: &mut dyn Connection) -> Result<(), Error> {
        self.dispatch().rollback(conn)
    }
}

/// Name used for a unique index created without an explicit name.
pub fn default_index_name(table: &str, columns: &[&str]) -> String {
    format!("{}_{}_uniq", table, columns.join("_"))
}

/// Run a statement the adapter generated.
pub(crate) fn execute(
    conn: &mut dyn Connection,
    sql: &str,
    params: &[Value],
) -> Result<u64, Error> {
    #[cfg(feature = "tracing")]
    tracing::debug!(sql = sql, params = params.len(), "Executing statement");

    conn.execute(sql, params)
}

/// Render the allowed values of an enum column as a SQL value list.
pub(crate) fn enum_value_list(column: &ColumnSpec) -> String {
    column
        .enum_values()
        .iter()
        .map(|v| crate::value::quote_literal(v))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Extract a `COUNT(*)` result.
pub(crate) fn count(rows: &[Vec<Value>]) -> i64 {
    rows.first()
        .and_then(|row| row.first())
        .and_then(Value::as_i64)
        .unwrap_or(0)
}
