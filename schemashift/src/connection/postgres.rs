use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use postgres::types::{FromSql, ToSql, Type};
use postgres::SimpleQueryMessage;

use super::{Connection, EngineKind, Row};
use crate::{Error, Value};

// Parameters bind with their natural Rust types (i64 → INT8, f64 → FLOAT8,
// String → TEXT). The Postgres adapter inlines literals instead, so that the
// server coerces values into each column's declared type.
fn to_postgres(value: &Value) -> Box<dyn ToSql + Sync> {
    match value {
        Value::Null => Box::new(None::<String>),
        Value::Int(i) => Box::new(*i),
        Value::Float(f) => Box::new(*f),
        Value::Text(s) => Box::new(s.clone()),
        Value::Bool(b) => Box::new(*b),
    }
}

/// Whether [from_postgres] can decode a column of type `ty`.
fn decodable(ty: &Type) -> bool {
    [
        Type::BOOL,
        Type::INT2,
        Type::INT4,
        Type::INT8,
        Type::OID,
        Type::FLOAT4,
        Type::FLOAT8,
        Type::DATE,
        Type::TIME,
        Type::TIMESTAMP,
        Type::TIMESTAMPTZ,
    ]
    .contains(ty)
        || <String as FromSql>::accepts(ty)
}

// Temporal values are returned in the same textual form the server prints.
fn from_postgres(row: &postgres::Row, idx: usize) -> Result<Value, postgres::Error> {
    let ty = row.columns()[idx].type_();
    let value = if *ty == Type::BOOL {
        row.try_get::<_, Option<bool>>(idx)?.map(Value::Bool)
    } else if *ty == Type::INT2 {
        row.try_get::<_, Option<i16>>(idx)?.map(|v| Value::Int(v.into()))
    } else if *ty == Type::INT4 {
        row.try_get::<_, Option<i32>>(idx)?.map(|v| Value::Int(v.into()))
    } else if *ty == Type::INT8 {
        row.try_get::<_, Option<i64>>(idx)?.map(Value::Int)
    } else if *ty == Type::OID {
        row.try_get::<_, Option<u32>>(idx)?.map(|v| Value::Int(v.into()))
    } else if *ty == Type::FLOAT4 {
        row.try_get::<_, Option<f32>>(idx)?.map(|v| Value::Float(v.into()))
    } else if *ty == Type::FLOAT8 {
        row.try_get::<_, Option<f64>>(idx)?.map(Value::Float)
    } else if *ty == Type::DATE {
        row.try_get::<_, Option<NaiveDate>>(idx)?
            .map(|v| Value::Text(v.to_string()))
    } else if *ty == Type::TIME {
        row.try_get::<_, Option<NaiveTime>>(idx)?
            .map(|v| Value::Text(v.to_string()))
    } else if *ty == Type::TIMESTAMP {
        row.try_get::<_, Option<NaiveDateTime>>(idx)?
            .map(|v| Value::Text(v.to_string()))
    } else if *ty == Type::TIMESTAMPTZ {
        row.try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map(|v| Value::Text(v.to_rfc3339()))
    } else {
        row.try_get::<_, Option<String>>(idx)?.map(Value::Text)
    };
    Ok(value.unwrap_or(Value::Null))
}

impl Connection for postgres::Client {
    fn engine(&self) -> EngineKind {
        EngineKind::Postgres
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, Error> {
        let boxed: Vec<Box<dyn ToSql + Sync>> = params.iter().map(to_postgres).collect();
        let refs: Vec<&(dyn ToSql + Sync)> = boxed.iter().map(|b| &**b).collect();
        postgres::Client::execute(self, sql, &refs).map_err(|e| Error::sql(sql, e))
    }

    /// Columns of other types (`NUMERIC`, `JSON`, `UUID`, ...) come back as
    /// text over the simple query protocol. That needs a statement without
    /// parameters; with parameters, cast such columns to `text`.
    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>, Error> {
        let statement = self.prepare(sql).map_err(|e| Error::sql(sql, e))?;
        let undecodable = statement
            .columns()
            .iter()
            .find(|c| !decodable(c.type_()));

        match undecodable {
            None => {
                let boxed: Vec<Box<dyn ToSql + Sync>> = params.iter().map(to_postgres).collect();
                let refs: Vec<&(dyn ToSql + Sync)> = boxed.iter().map(|b| &**b).collect();
                let rows = postgres::Client::query(self, &statement, &refs)
                    .map_err(|e| Error::sql(sql, e))?;
                rows.iter()
                    .map(|row| {
                        (0..row.len())
                            .map(|i| from_postgres(row, i).map_err(|e| Error::sql(sql, e)))
                            .collect::<Result<Row, Error>>()
                    })
                    .collect()
            }
            Some(_) if params.is_empty() => {
                let messages = self.simple_query(sql).map_err(|e| Error::sql(sql, e))?;
                Ok(messages
                    .iter()
                    .filter_map(|message| match message {
                        SimpleQueryMessage::Row(row) => Some(
                            (0..row.len())
                                .map(|i| row.get(i).map_or(Value::Null, Value::from))
                                .collect(),
                        ),
                        _ => None,
                    })
                    .collect())
            }
            Some(column) => Err(Error::sql(
                sql,
                format!(
                    "column '{}' has type {} which cannot be decoded with parameters bound; cast it to text",
                    column.name(),
                    column.type_()
                ),
            )),
        }
    }
}
