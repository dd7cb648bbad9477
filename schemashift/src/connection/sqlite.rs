use rusqlite::types::{Value as SqliteValue, ValueRef};

use super::{Connection, EngineKind, Row};
use crate::{Error, Value};

fn to_sqlite(value: &Value) -> SqliteValue {
    match value {
        Value::Null => SqliteValue::Null,
        Value::Int(i) => SqliteValue::Integer(*i),
        Value::Float(f) => SqliteValue::Real(*f),
        Value::Text(s) => SqliteValue::Text(s.clone()),
        Value::Bool(b) => SqliteValue::Integer(*b as i64),
    }
}

fn from_sqlite(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Text(String::from_utf8_lossy(b).into_owned()),
    }
}

impl Connection for rusqlite::Connection {
    fn engine(&self) -> EngineKind {
        EngineKind::Sqlite
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, Error> {
        let params = rusqlite::params_from_iter(params.iter().map(to_sqlite));
        let affected = rusqlite::Connection::execute(self, sql, params)
            .map_err(|e| Error::sql(sql, e))?;
        Ok(affected as u64)
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>, Error> {
        let mut stmt = self.prepare(sql).map_err(|e| Error::sql(sql, e))?;
        let column_count = stmt.column_count();
        let mut rows = stmt
            .query(rusqlite::params_from_iter(params.iter().map(to_sqlite)))
            .map_err(|e| Error::sql(sql, e))?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(|e| Error::sql(sql, e))? {
            let mut values = Vec::with_capacity(column_count);
            for i in 0..column_count {
                let value = row.get_ref(i).map_err(|e| Error::sql(sql, e))?;
                values.push(from_sqlite(value));
            }
            out.push(values);
        }
        Ok(out)
    }
}
