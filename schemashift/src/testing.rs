//! Testing utilities for migration development and verification.
//!
//! - [RecordingConnection] is an in-memory [Connection] that records every
//!   statement it receives instead of running it. It can impersonate any
//!   [EngineKind] and fail on a chosen statement, which makes it suitable for
//!   asserting the exact SQL an adapter emits.
//! - [MigrationTestHarness] (with the `sqlite` feature) runs a real
//!   [Migrator](crate::Migrator) against an in-memory SQLite database and
//!   provides state control and assertion helpers.

use std::collections::VecDeque;

use crate::{Connection, EngineKind, Error, Row, Value};

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::{ColumnInfo, IndexInfo, MigrationTestHarness, SchemaSnapshot, TableSchema};

/// A statement received by a [RecordingConnection].
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// A [Connection] that records statements instead of running them.
///
/// `execute` reports one affected row unless configured otherwise. `query`
/// returns the queued results in order, then empty result sets.
///
/// ```
/// use schemashift::testing::RecordingConnection;
/// use schemashift::{EngineKind, Schema};
///
/// let mut conn = RecordingConnection::new(EngineKind::Mysql);
/// Schema::new(&mut conn).drop_table("sessions").unwrap();
/// assert_eq!(conn.statements(), vec!["DROP TABLE `sessions`"]);
/// ```
#[derive(Debug)]
pub struct RecordingConnection {
    engine: EngineKind,
    executed: Vec<ExecutedStatement>,
    affected_rows: u64,
    results: VecDeque<Vec<Row>>,
    fail_on_statement: Option<usize>,
    fail_when_contains: Option<String>,
}

impl RecordingConnection {
    pub fn new(engine: EngineKind) -> Self {
        Self {
            engine,
            executed: Vec::new(),
            affected_rows: 1,
            results: VecDeque::new(),
            fail_on_statement: None,
            fail_when_contains: None,
        }
    }

    /// Fail the `n`th statement received (1-based). The failing statement is
    /// still recorded.
    pub fn fail_on_statement(mut self, n: usize) -> Self {
        self.fail_on_statement = Some(n);
        self
    }

    /// Fail every statement containing `pattern`.
    pub fn fail_when_contains(mut self, pattern: impl Into<String>) -> Self {
        self.fail_when_contains = Some(pattern.into());
        self
    }

    /// Affected-row count reported by `execute`.
    pub fn with_affected_rows(mut self, rows: u64) -> Self {
        self.affected_rows = rows;
        self
    }

    /// Queue a result set for the next `query` call.
    pub fn push_result(&mut self, rows: Vec<Row>) {
        self.results.push_back(rows);
    }

    pub fn executed(&self) -> &[ExecutedStatement] {
        &self.executed
    }

    /// SQL of every statement received, in order.
    pub fn statements(&self) -> Vec<String> {
        self.executed.iter().map(|s| s.sql.clone()).collect()
    }

    pub fn clear(&mut self) {
        self.executed.clear();
    }

    fn record(&mut self, sql: &str, params: &[Value]) -> Result<(), Error> {
        self.executed.push(ExecutedStatement {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        let nth = self.fail_on_statement == Some(self.executed.len());
        let matched = self
            .fail_when_contains
            .as_deref()
            .is_some_and(|pattern| sql.contains(pattern));
        if nth || matched {
            return Err(Error::sql(sql, "statement rejected by recording connection"));
        }
        Ok(())
    }
}

impl Connection for RecordingConnection {
    fn engine(&self) -> EngineKind {
        self.engine
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, Error> {
        self.record(sql, params)?;
        Ok(self.affected_rows)
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>, Error> {
        self.record(sql, params)?;
        Ok(self.results.pop_front().unwrap_or_default())
    }
}
