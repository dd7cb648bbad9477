//! MySQL/MariaDB adapter.
//!
//! MySQL commits implicitly around every DDL statement, so a failing migration
//! may leave earlier statements applied regardless of any transaction.

use super::{count, enum_value_list, execute, SchemaAdapter};
use crate::{ColumnSpec, ColumnType, Connection, EngineKind, Error, Value};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MysqlAdapter;

impl SchemaAdapter for MysqlAdapter {
    fn engine(&self) -> EngineKind {
        EngineKind::Mysql
    }

    fn quote_ident(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn literal(&self, value: &Value) -> String {
        value.to_sql_literal(true)
    }

    fn column_type_sql(&self, column: &ColumnSpec) -> String {
        let length = column.get_length();
        match column.column_type() {
            ColumnType::Int => length.map_or("INT".to_string(), |l| format!("INT({})", l)),
            ColumnType::BigInt => {
                length.map_or("BIGINT".to_string(), |l| format!("BIGINT({})", l))
            }
            ColumnType::Float => "FLOAT".to_string(),
            ColumnType::Text => "TEXT".to_string(),
            ColumnType::LongText => "LONGTEXT".to_string(),
            ColumnType::Varchar => format!("VARCHAR({})", length.unwrap_or(255)),
            ColumnType::Enum => format!("ENUM({})", enum_value_list(column)),
            ColumnType::Date => "DATE".to_string(),
            ColumnType::DateTime => "DATETIME".to_string(),
            ColumnType::Time => "TIME".to_string(),
            ColumnType::Timestamp => "TIMESTAMP".to_string(),
        }
    }

    fn supports_transactional_ddl(&self) -> bool {
        false
    }

    fn begin_sql(&self) -> &'static str {
        "START TRANSACTION"
    }

    fn create_table_sql(&self, table: &str) -> String {
        format!(
            "CREATE TABLE {} (`id` BIGINT UNSIGNED NOT NULL AUTO_INCREMENT, PRIMARY KEY (`id`)) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4",
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
            sql.push_str(&format!(
                ", ADD PRIMARY KEY ({})",
                self.quote_ident(column.name())
            ));
        }
        execute(conn, &sql, &[])?;
        Ok(())
    }

    fn drop_unique_index(
        &self,
        conn: &mut dyn Connection,
        table: &str,
        index_name: &str,
    ) -> Result<(), Error> {
        let sql = format!(
            "DROP INDEX {} ON {}",
            self.quote_ident(index_name),
            self.quote_ident(table)
        );
        execute(conn, &sql, &[])?;
        Ok(())
    }

    fn table_exists(&self, conn: &mut dyn Connection, table: &str) -> Result<bool, Error> {
        let rows = conn.query(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = DATABASE() AND table_name = ?",
            &[Value::from(table)],
        )?;
        Ok(count(&rows) > 0)
    }
}
