use super::{count, enum_value_list, execute, SchemaAdapter};
use crate::{ColumnSpec, ColumnType, Connection, EngineKind, Error, Value};

/// SQLite adapter. Requires SQLite 3.35 or later for `DROP COLUMN`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SqliteAdapter;

impl SchemaAdapter for SqliteAdapter {
    fn engine(&self) -> EngineKind {
        EngineKind::Sqlite
    }

    fn quote_ident(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn literal(&self, value: &Value) -> String {
        value.to_sql_literal(true)
    }

    fn column_type_sql(&self, column: &ColumnSpec) -> String {
        match column.column_type() {
            ColumnType::Int | ColumnType::BigInt => "INTEGER".to_string(),
            ColumnType::Float => "REAL".to_string(),
            ColumnType::Text | ColumnType::LongText => "TEXT".to_string(),
            ColumnType::Varchar => format!("VARCHAR({})", column.get_length().unwrap_or(255)),
            ColumnType::Enum => format!(
                "TEXT CHECK ({} IN ({}))",
                self.quote_ident(column.name()),
                enum_value_list(column)
            ),
            ColumnType::Date => "DATE".to_string(),
            ColumnType::DateTime => "DATETIME".to_string(),
            ColumnType::Time => "TIME".to_string(),
            ColumnType::Timestamp => "TIMESTAMP".to_string(),
        }
    }

    fn supports_transactional_ddl(&self) -> bool {
        true
    }

    fn create_table_sql(&self, table: &str) -> String {
        format!(
            "CREATE TABLE {} (\"id\" INTEGER PRIMARY KEY AUTOINCREMENT)",
            self.quote_ident(table)
        )
    }

    // SQLite refuses `ADD COLUMN ... NOT NULL` without a default, so existing
    // rows receive the type's zero value (the first allowed value for enums),
    // matching what MySQL does implicitly.
    fn column_definition(&self, column: &ColumnSpec) -> String {
        let mut def = format!(
            "{} {}",
            self.quote_ident(column.name()),
            self.column_type_sql(column)
        );
        if column.is_not_null() {
            def.push_str(" NOT NULL");
        }
        let implicit = match (column.get_default(), column.is_not_null()) {
            (Some(default), _) => Some(default.clone()),
            (None, true) => Some(match column.column_type() {
                ColumnType::Enum => column
                    .enum_values()
                    .first()
                    .map_or(Value::from(""), |v| Value::from(v.as_str())),
                other => other.zero_value(),
            }),
            (None, false) => None,
        };
        if let Some(default) = implicit {
            def.push_str(" DEFAULT ");
            def.push_str(&self.literal(&default));
        }
        def
    }

    fn create_column(
        &self,
        conn: &mut dyn Connection,
        table: &str,
        column: &ColumnSpec,
    ) -> Result<(), Error> {
        if column.is_primary_key() {
            return Err(Error::UnsupportedOperation {
                engine: EngineKind::Sqlite,
                operation: format!(
                    "adding primary key column '{}' to existing table '{}'",
                    column.name(),
                    table
                ),
            });
        }
        let sql = format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.quote_ident(table),
            self.column_definition(column)
        );
        execute(conn, &sql, &[])?;
        Ok(())
    }

    fn drop_unique_index(
        &self,
        conn: &mut dyn Connection,
        _table: &str,
        index_name: &str,
    ) -> Result<(), Error> {
        let sql = format!("DROP INDEX {}", self.quote_ident(index_name));
        execute(conn, &sql, &[])?;
        Ok(())
    }

    fn table_exists(&self, conn: &mut dyn Connection, table: &str) -> Result<bool, Error> {
        let rows = conn.query(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
            &[Value::from(table)],
        )?;
        Ok(count(&rows) > 0)
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::testing::RecordingConnection;

    fn columns(conn: &rusqlite::Connection, table: &str) -> Vec<String> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info({})", table))
            .unwrap();
        stmt.query_map([], |row| row.get::<_, String>(1))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn quotes_with_double_quotes() {
        assert_eq!(SqliteAdapter.quote_ident("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn primary_key_columns_are_unsupported_and_not_sent() {
        let mut conn = RecordingConnection::new(EngineKind::Sqlite);
        let err = SqliteAdapter
            .create_column(
                &mut conn,
                "users",
                &ColumnSpec::new("uid", ColumnType::Int).primary_key(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedOperation {
                engine: EngineKind::Sqlite,
                ..
            }
        ));
        assert!(conn.statements().is_empty());
    }

    #[test]
    fn not_null_without_default_gets_zero_default() {
        let adapter = SqliteAdapter;
        assert_eq!(
            adapter.column_definition(&ColumnSpec::new("age", ColumnType::Int).not_null()),
            "\"age\" INTEGER NOT NULL DEFAULT 0"
        );
        assert_eq!(
            adapter.column_definition(
                &ColumnSpec::new("state", ColumnType::Enum)
                    .values(["new", "done"])
                    .not_null()
            ),
            "\"state\" TEXT CHECK (\"state\" IN ('new', 'done')) NOT NULL DEFAULT 'new'"
        );
        assert_eq!(
            adapter.column_definition(&ColumnSpec::new("note", ColumnType::Text)),
            "\"note\" TEXT"
        );
    }

    #[test]
    fn column_round_trip_against_sqlite() {
        let mut conn = rusqlite::Connection::open_in_memory().unwrap();
        let adapter = SqliteAdapter;
        adapter.create_table(&mut conn, "users").unwrap();
        adapter
            .insert(&mut conn, "users", &[("id", 1.into())])
            .unwrap();
        let before = columns(&conn, "users");

        adapter
            .create_column(
                &mut conn,
                "users",
                &ColumnSpec::new("age", ColumnType::Int).not_null(),
            )
            .unwrap();
        assert_eq!(columns(&conn, "users"), vec!["id", "age"]);

        adapter.drop_column(&mut conn, "users", "age").unwrap();
        assert_eq!(columns(&conn, "users"), before);
    }

    #[test]
    fn enum_check_rejects_unknown_values() {
        let mut conn = rusqlite::Connection::open_in_memory().unwrap();
        let adapter = SqliteAdapter;
        adapter.create_table(&mut conn, "tasks").unwrap();
        adapter
            .create_column(
                &mut conn,
                "tasks",
                &ColumnSpec::new("state", ColumnType::Enum).values(["new", "done"]),
            )
            .unwrap();
        assert_eq!(
            adapter
                .insert(&mut conn, "tasks", &[("state", "done".into())])
                .unwrap(),
            1
        );
        let err = adapter
            .insert(&mut conn, "tasks", &[("state", "lost".into())])
            .unwrap_err();
        assert!(matches!(err, Error::SqlExecution { .. }));
    }

    #[test]
    fn table_exists_reflects_schema() {
        let mut conn = rusqlite::Connection::open_in_memory().unwrap();
        assert!(!SqliteAdapter.table_exists(&mut conn, "users").unwrap());
        SqliteAdapter.create_table(&mut conn, "users").unwrap();
        assert!(SqliteAdapter.table_exists(&mut conn, "users").unwrap());
    }
}
