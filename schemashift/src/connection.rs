//! The database handle migrations run against.
//!
//! The engine never opens connections itself: a [Connection] is handed to the
//! [Migrator](crate::Migrator), which lends it to each migration through a
//! [Schema](crate::Schema). Implementations are provided for
//! `rusqlite::Connection`, `mysql::Conn` and `postgres::Client` behind
//! their respective feature flags.

use std::fmt;

use crate::{Error, Value};

#[cfg(feature = "mysql")]
mod mysql;
#[cfg(feature = "postgres")]
mod postgres;
#[cfg(feature = "sqlite")]
mod sqlite;

/// A result row, one [Value] per selected column.
pub type Row = Vec<Value>;

/// The database engines a [Connection] can identify as.
///
/// Only MySQL, SQLite and PostgreSQL have adapters; connecting a migration to
/// any other engine fails with [Error::UnsupportedEngine].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineKind {
    Mysql,
    Sqlite,
    Postgres,
    Mssql,
    Oracle,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Mysql => "mysql",
            EngineKind::Sqlite => "sqlite",
            EngineKind::Postgres => "postgres",
            EngineKind::Mssql => "mssql",
            EngineKind::Oracle => "oracle",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An open database handle.
///
/// Statements block until the engine acknowledges them. Implementations map
/// engine failures to [Error::SqlExecution] carrying the failing SQL.
pub trait Connection {
    /// The engine behind this handle. Drives adapter selection.
    fn engine(&self) -> EngineKind;

    /// Execute a statement, returning the number of affected rows.
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, Error>;

    /// Run a query and collect its rows.
    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>, Error>;
}

impl<C: Connection + ?Sized> Connection for Box<C> {
    fn engine(&self) -> EngineKind {
        (**self).engine()
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, Error> {
        (**self).execute(sql, params)
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>, Error> {
        (**self).query(sql, params)
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;

    #[test]
    fn sqlite_connection_reports_engine_and_row_counts() {
        let mut conn = rusqlite::Connection::open_in_memory().unwrap();
        assert_eq!(Connection::engine(&conn), EngineKind::Sqlite);

        Connection::execute(&mut conn, "CREATE TABLE t (a INTEGER, b TEXT)", &[]).unwrap();
        let inserted = Connection::execute(
            &mut conn,
            "INSERT INTO t (a, b) VALUES (?, ?), (?, ?)",
            &[1.into(), "x".into(), 2.into(), Value::Null],
        )
        .unwrap();
        assert_eq!(inserted, 2);

        let rows = Connection::query(&mut conn, "SELECT a, b FROM t ORDER BY a", &[]).unwrap();
        assert_eq!(
            rows,
            vec![
                vec![Value::Int(1), Value::Text("x".to_string())],
                vec![Value::Int(2), Value::Null],
            ]
        );
    }

    #[test]
    fn sqlite_failures_carry_the_statement() {
        let mut conn = rusqlite::Connection::open_in_memory().unwrap();
        let err = Connection::execute(&mut conn, "DROP TABLE missing", &[]).unwrap_err();
        match err {
            Error::SqlExecution { sql, .. } => assert_eq!(sql, "DROP TABLE missing"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn boxed_connections_delegate() {
        let mut conn: Box<dyn Connection> =
            Box::new(rusqlite::Connection::open_in_memory().unwrap());
        assert_eq!(conn.engine(), EngineKind::Sqlite);
        assert_eq!(conn.query("SELECT 1", &[]).unwrap(), vec![vec![Value::Int(1)]]);
    }
}
