use mysql::prelude::Queryable;
use mysql::{Params, Value as MysqlValue};

use super::{Connection, EngineKind, Row};
use crate::{Error, Value};

fn to_mysql(value: &Value) -> MysqlValue {
    match value {
        Value::Null => MysqlValue::NULL,
        Value::Int(i) => MysqlValue::Int(*i),
        Value::Float(f) => MysqlValue::Double(*f),
        Value::Text(s) => MysqlValue::Bytes(s.clone().into_bytes()),
        Value::Bool(b) => MysqlValue::Int(*b as i64),
    }
}

fn from_mysql(value: MysqlValue) -> Value {
    match value {
        MysqlValue::NULL => Value::Null,
        MysqlValue::Int(i) => Value::Int(i),
        MysqlValue::UInt(u) => i64::try_from(u).map_or(Value::Text(u.to_string()), Value::Int),
        MysqlValue::Float(f) => Value::Float(f.into()),
        MysqlValue::Double(f) => Value::Float(f),
        MysqlValue::Bytes(bytes) => Value::Text(String::from_utf8_lossy(&bytes).into_owned()),
        // Temporal values come back in their textual SQL form.
        other => Value::Text(other.as_sql(true).trim_matches('\'').to_string()),
    }
}

fn to_params(params: &[Value]) -> Params {
    if params.is_empty() {
        Params::Empty
    } else {
        Params::Positional(params.iter().map(to_mysql).collect())
    }
}

impl Connection for mysql::Conn {
    fn engine(&self) -> EngineKind {
        EngineKind::Mysql
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, Error> {
        // DDL and transaction control go over the text protocol; not every
        // statement can be prepared.
        if params.is_empty() {
            self.query_drop(sql).map_err(|e| Error::sql(sql, e))?;
        } else {
            self.exec_drop(sql, to_params(params))
                .map_err(|e| Error::sql(sql, e))?;
        }
        Ok(self.affected_rows())
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>, Error> {
        let rows: Vec<mysql::Row> = if params.is_empty() {
            Queryable::query(self, sql).map_err(|e| Error::sql(sql, e))?
        } else {
            self.exec(sql, to_params(params))
                .map_err(|e| Error::sql(sql, e))?
        };
        Ok(rows
            .into_iter()
            .map(|row| row.unwrap().into_iter().map(from_mysql).collect())
            .collect())
    }
}
