//! MySQL integration tests against a shared testcontainer.
//!
//! Every test gets its own freshly created database.

use std::sync::OnceLock;

use mysql::prelude::Queryable;
use mysql::{Conn, Opts};
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::mysql::Mysql;
use uuid::Uuid;

/// The runtime owns the container; both live for the whole test run.
struct SharedMysql {
    _runtime: tokio::runtime::Runtime,
    _container: ContainerAsync<Mysql>,
    port: u16,
}

static MYSQL: OnceLock<SharedMysql> = OnceLock::new();

fn mysql_port() -> u16 {
    MYSQL
        .get_or_init(|| {
            let runtime = tokio::runtime::Runtime::new().expect("failed to create tokio runtime");
            let (container, port) = runtime.block_on(async {
                let container = Mysql::default()
                    .start()
                    .await
                    .expect("failed to start mysql container");
                let port = container
                    .get_host_port_ipv4(3306)
                    .await
                    .expect("failed to get mysql port");
                (container, port)
            });
            SharedMysql {
                _runtime: runtime,
                _container: container,
                port,
            }
        })
        .port
}

fn connect(db: &str) -> Conn {
    let url = format!("mysql://root@127.0.0.1:{}/{}", mysql_port(), db);
    Conn::new(Opts::from_url(&url).expect("parse mysql url")).expect("failed to connect to mysql")
}

/// Connect to a new, empty utf8mb4 database.
pub fn fresh_mysql_db() -> Conn {
    let mut admin = connect("test");
    let db_name = format!("test_{}", Uuid::new_v4().simple());
    admin
        .query_drop(format!(
            "CREATE DATABASE `{}` CHARACTER SET utf8mb4",
            db_name
        ))
        .expect("failed to create test database");
    drop(admin);

    connect(&db_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ColumnSpec, ColumnType, Connection, Error, Migration, Migrator, Schema, Value};

    struct CreateCrontab;
    impl Migration for CreateCrontab {
        fn version(&self) -> u32 {
            1
        }
        fn up(&self, schema: &mut Schema) -> Result<(), Error> {
            schema.create_table("crontab")?;
            for field in ["minute", "hour", "dayOfMonth", "month", "dayOfWeek"] {
                schema.create_column(
                    "crontab",
                    ColumnSpec::new(field, ColumnType::Varchar)
                        .length(50)
                        .not_null()
                        .default_value("*"),
                )?;
            }
            schema
                .create_column(
                    "crontab",
                    ColumnSpec::new("command", ColumnType::Text).not_null(),
                )?
                .create_column(
                    "crontab",
                    ColumnSpec::new("state", ColumnType::Enum).values(["active", "paused"]),
                )?;
            schema.insert(
                "crontab",
                &[("command", "cleanup".into()), ("state", "active".into())],
            )?;
            Ok(())
        }
        fn down(&self, schema: &mut Schema) -> Result<(), Error> {
            schema.drop_table("crontab")?;
            Ok(())
        }
    }

    struct BrokenSecondStep;
    impl Migration for BrokenSecondStep {
        fn version(&self) -> u32 {
            2
        }
        fn up(&self, schema: &mut Schema) -> Result<(), Error> {
            schema
                .create_column("crontab", ColumnSpec::new("position", ColumnType::Int))?
                .create_column("crontab", ColumnSpec::new("position", ColumnType::Int))?;
            Ok(())
        }
    }

    #[test]
    fn upgrade_and_downgrade() {
        let mut conn = fresh_mysql_db();
        let migrator = Migrator::new(vec![Box::new(CreateCrontab)]);

        let report = migrator.upgrade(&mut conn).unwrap();
        assert_eq!(report.migrations_run, vec![1]);
        assert_eq!(migrator.get_current_version(&mut conn).unwrap(), 1);

        let rows = Connection::query(
            &mut conn,
            "SELECT minute, command, state FROM crontab",
            &[],
        )
        .unwrap();
        assert_eq!(
            rows,
            vec![vec![
                Value::from("*"),
                Value::from("cleanup"),
                Value::from("active")
            ]]
        );

        migrator.downgrade(&mut conn, 0).unwrap();
        assert_eq!(migrator.get_current_version(&mut conn).unwrap(), 0);
    }

    #[test]
    fn failed_migration_leaves_earlier_ddl_applied() {
        let mut conn = fresh_mysql_db();
        let migrator = Migrator::new(vec![Box::new(CreateCrontab), Box::new(BrokenSecondStep)]);

        let report = migrator.upgrade(&mut conn).unwrap();
        assert_eq!(report.migrations_run, vec![1]);
        assert_eq!(report.failing_migration.unwrap().migration().version(), 2);
        assert_eq!(migrator.get_current_version(&mut conn).unwrap(), 1);

        let rows = Connection::query(&mut conn, "SHOW COLUMNS FROM crontab LIKE 'position'", &[])
            .unwrap();
        assert_eq!(rows.len(), 1);
    }
}
