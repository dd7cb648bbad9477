//! PostgreSQL adapter.
//!
//! Values are inlined as escaped literals rather than bound: an untyped
//! literal is coerced by the server into whatever type the target column has,
//! which a typed bind parameter is not. Booleans render as `'1'`/`'0'` so they
//! fit integer columns the way they do on MySQL and SQLite.

use super::{count, enum_value_list, execute, SchemaAdapter};
use crate::value::quote_literal;
use crate::{ColumnSpec, ColumnType, Connection, EngineKind, Error, Value};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostgresAdapter;

impl SchemaAdapter for PostgresAdapter {
    fn engine(&self) -> EngineKind {
        EngineKind::Postgres
    }

    fn quote_ident(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn bind_value(&self, value: &Value, _params: &mut Vec<Value>) -> String {
        self.literal(value)
    }

    // '1' and '0' are valid input for both BOOLEAN and the integer types.
    fn literal(&self, value: &Value) -> String {
        match value {
            Value::Bool(true) => "'1'".to_string(),
            Value::Bool(false) => "'0'".to_string(),
            other => other.to_sql_literal(false),
        }
    }

    fn column_type_sql(&self, column: &ColumnSpec) -> String {
        let length = column.get_length();
        match column.column_type() {
            ColumnType::Int => "INTEGER".to_string(),
            ColumnType::BigInt => "BIGINT".to_string(),
            ColumnType::Float => "REAL".to_string(),
            ColumnType::Text | ColumnType::LongText => "TEXT".to_string(),
            ColumnType::Varchar => format!("VARCHAR({})", length.unwrap_or(255)),
            ColumnType::Enum => format!(
                "VARCHAR({}) CHECK ({} IN ({}))",
                length.unwrap_or(255),
                self.quote_ident(column.name()),
                enum_value_list(column)
            ),
            ColumnType::Date => "DATE".to_string(),
            ColumnType::DateTime => "TIMESTAMP".to_string(),
            ColumnType::Time => "TIME".to_string(),
            ColumnType::Timestamp => "TIMESTAMP WITH TIME ZONE".to_string(),
        }
    }

    fn supports_transactional_ddl(&self) -> bool {
        true
    }

    fn create_table_sql(&self, table: &str) -> String {
        format!(
            "CREATE TABLE {} (\"id\" BIGSERIAL PRIMARY KEY)",
            self.quote_ident(table)
        )
    }

    fn create_column(
        &self,
        conn: &mut dyn Connection,
        table: &str,
        column: &ColumnSpec,
    ) -> Result<(), Error> {
        let mut sql = format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.quote_ident(table),
            self.column_definition(column)
        );
        if column.is_primary_key() {
            sql.push_str(" PRIMARY KEY");
        }
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
        let sql = format!(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = current_schema() AND table_name = {}",
            quote_literal(table)
        );
        let rows = conn.query(&sql, &[])?;
        Ok(count(&rows) > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingConnection;

    #[test]
    fn values_are_inlined_as_literals() {
        let mut conn = RecordingConnection::new(EngineKind::Postgres);
        PostgresAdapter
            .insert(
                &mut conn,
                "logs",
                &[
                    ("level", "o'clock".into()),
                    ("count", 3.into()),
                    ("seen", true.into()),
                    ("note", Value::Null),
                ],
            )
            .unwrap();
        PostgresAdapter
            .update(&mut conn, "logs", &[("count", 4.into())], Some("\"id\" = 1"))
            .unwrap();

        let executed = conn.executed();
        assert_eq!(
            executed[0].sql,
            r#"INSERT INTO "logs" ("level", "count", "seen", "note") VALUES ('o''clock', 3, '1', NULL)"#
        );
        assert!(executed[0].params.is_empty());
        assert_eq!(
            executed[1].sql,
            r#"UPDATE "logs" SET "count" = 4 WHERE "id" = 1"#
        );
    }

    #[test]
    fn emits_postgres_ddl() {
        let mut conn = RecordingConnection::new(EngineKind::Postgres);
        PostgresAdapter.create_table(&mut conn, "categories").unwrap();
        PostgresAdapter
            .create_column(
                &mut conn,
                "categories",
                &ColumnSpec::new("alias", ColumnType::Varchar)
                    .length(255)
                    .not_null()
                    .default_value(""),
            )
            .unwrap();
        PostgresAdapter
            .create_column(
                &mut conn,
                "categories",
                &ColumnSpec::new("created", ColumnType::Timestamp),
            )
            .unwrap();
        PostgresAdapter
            .create_unique_index(&mut conn, "categories", &["alias"], Some("idx_alias"))
            .unwrap();
        PostgresAdapter
            .drop_unique_index(&mut conn, "categories", "idx_alias")
            .unwrap();

        assert_eq!(
            conn.statements(),
            vec![
                r#"CREATE TABLE "categories" ("id" BIGSERIAL PRIMARY KEY)"#,
                r#"ALTER TABLE "categories" ADD COLUMN "alias" VARCHAR(255) NOT NULL DEFAULT ''"#,
                r#"ALTER TABLE "categories" ADD COLUMN "created" TIMESTAMP WITH TIME ZONE"#,
                r#"CREATE UNIQUE INDEX "idx_alias" ON "categories" ("alias")"#,
                r#"DROP INDEX "idx_alias""#,
            ]
        );
    }

    #[test]
    fn boolean_defaults_fit_integer_columns() {
        let mut conn = RecordingConnection::new(EngineKind::Postgres);
        PostgresAdapter
            .create_column(
                &mut conn,
                "crontab",
                &ColumnSpec::new("active", ColumnType::Int)
                    .length(1)
                    .default_value(true),
            )
            .unwrap();
        PostgresAdapter
            .create_column(
                &mut conn,
                "crontab",
                &ColumnSpec::new("paused", ColumnType::BigInt).default_value(false),
            )
            .unwrap();
        assert_eq!(
            conn.statements(),
            vec![
                r#"ALTER TABLE "crontab" ADD COLUMN "active" INTEGER DEFAULT '1'"#,
                r#"ALTER TABLE "crontab" ADD COLUMN "paused" BIGINT DEFAULT '0'"#,
            ]
        );
    }

    #[test]
    fn primary_key_columns_are_added_inline() {
        let mut conn = RecordingConnection::new(EngineKind::Postgres);
        PostgresAdapter
            .create_column(
                &mut conn,
                "slugs",
                &ColumnSpec::new("slug", ColumnType::Varchar).primary_key(),
            )
            .unwrap();
        assert_eq!(
            conn.statements(),
            vec![r#"ALTER TABLE "slugs" ADD COLUMN "slug" VARCHAR(255) PRIMARY KEY"#]
        );
    }
}
