//! Convenience macros for defining migrations.

/// Define a simple SQL-only migration.
///
/// This macro reduces boilerplate for migrations that consist of raw SQL
/// statements run through [`Schema::query`](crate::Schema::query).
///
/// # Basic Usage
///
/// ```
/// use schemashift::sql_migration;
///
/// sql_migration!(CreateUsersTable, 1, "Create users table",
///     up: "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
///     down: "DROP TABLE users"
/// );
/// ```
///
/// This expands to a unit struct `CreateUsersTable` implementing the
/// [`Migration`](crate::Migration) trait.
///
/// # Engine-Specific SQL
///
/// When engines require different SQL syntax, provide separate statements.
/// The statements for the engine of the connection the migration runs on are
/// picked at run time:
///
/// ```
/// use schemashift::sql_migration;
///
/// sql_migration!(CreateUsersTable, 1, "Create users table",
///     sqlite_up: "CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT)",
///     sqlite_down: "DROP TABLE users",
///     mysql_up: "CREATE TABLE users (id INT PRIMARY KEY AUTO_INCREMENT, name VARCHAR(255))",
///     mysql_down: "DROP TABLE users",
///     postgres_up: "CREATE TABLE users (id SERIAL PRIMARY KEY, name TEXT)",
///     postgres_down: "DROP TABLE users"
/// );
/// ```
///
/// # Terminal Migrations
///
/// Omit the `down` clauses for a migration that cannot be reverted:
///
/// ```
/// use schemashift::sql_migration;
///
/// sql_migration!(CreateUsersTable, 1, "Create users table",
///     up: "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)"
/// );
/// ```
///
/// Downgrading past such a migration fails with
/// [`Error::IrreversibleMigration`](crate::Error::IrreversibleMigration).
///
/// # Multiple Statements
///
/// For migrations with multiple SQL statements, use an array:
///
/// ```
/// use schemashift::sql_migration;
///
/// sql_migration!(InitialSchema, 1, "Create initial schema",
///     up: [
///         "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)",
///         "CREATE TABLE posts (id INTEGER PRIMARY KEY, user_id INTEGER, title TEXT)",
///         "CREATE INDEX idx_posts_user ON posts(user_id)"
///     ],
///     down: [
///         "DROP INDEX idx_posts_user",
///         "DROP TABLE posts",
///         "DROP TABLE users"
///     ]
/// );
/// ```
///
/// For migrations that create columns portably or transform data, implement
/// the [`Migration`](crate::Migration) trait directly instead.
#[macro_export]
macro_rules! sql_migration {
    // Shared up/down SQL (array of statements)
    ($name:ident, $version:expr, $migration_name:expr,
        up: [$($up_sql:expr),* $(,)?],
        down: [$($down_sql:expr),* $(,)?]
    ) => {
        $crate::__sql_migration_impl!($name, $version, $migration_name,
            sqlite_up: [$($up_sql),*],
            mysql_up: [$($up_sql),*],
            postgres_up: [$($up_sql),*]
            ;
            sqlite_down: [$($down_sql),*],
            mysql_down: [$($down_sql),*],
            postgres_down: [$($down_sql),*]
        );
    };

    // Shared up/down SQL (single statement)
    ($name:ident, $version:expr, $migration_name:expr,
        up: $up_sql:expr,
        down: $down_sql:expr
    ) => {
        $crate::__sql_migration_impl!($name, $version, $migration_name,
            sqlite_up: [$up_sql],
            mysql_up: [$up_sql],
            postgres_up: [$up_sql]
            ;
            sqlite_down: [$down_sql],
            mysql_down: [$down_sql],
            postgres_down: [$down_sql]
        );
    };

    // Shared up SQL only (array, terminal)
    ($name:ident, $version:expr, $migration_name:expr,
        up: [$($up_sql:expr),* $(,)?]
    ) => {
        $crate::__sql_migration_impl!($name, $version, $migration_name,
            sqlite_up: [$($up_sql),*],
            mysql_up: [$($up_sql),*],
            postgres_up: [$($up_sql),*]
        );
    };

    // Shared up SQL only (single statement, terminal)
    ($name:ident, $version:expr, $migration_name:expr,
        up: $up_sql:expr
    ) => {
        $crate::__sql_migration_impl!($name, $version, $migration_name,
            sqlite_up: [$up_sql],
            mysql_up: [$up_sql],
            postgres_up: [$up_sql]
        );
    };

    // Engine-specific SQL with down
    ($name:ident, $version:expr, $migration_name:expr,
        sqlite_up: $sqlite_up:expr,
        sqlite_down: $sqlite_down:expr,
        mysql_up: $mysql_up:expr,
        mysql_down: $mysql_down:expr,
        postgres_up: $postgres_up:expr,
        postgres_down: $postgres_down:expr
    ) => {
        $crate::__sql_migration_impl!($name, $version, $migration_name,
            sqlite_up: [$sqlite_up],
            mysql_up: [$mysql_up],
            postgres_up: [$postgres_up]
            ;
            sqlite_down: [$sqlite_down],
            mysql_down: [$mysql_down],
            postgres_down: [$postgres_down]
        );
    };

    // Engine-specific SQL, terminal
    ($name:ident, $version:expr, $migration_name:expr,
        sqlite_up: $sqlite_up:expr,
        mysql_up: $mysql_up:expr,
        postgres_up: $postgres_up:expr
    ) => {
        $crate::__sql_migration_impl!($name, $version, $migration_name,
            sqlite_up: [$sqlite_up],
            mysql_up: [$mysql_up],
            postgres_up: [$postgres_up]
        );
    };
}

/// Internal implementation macro. Without the down statements the migration
/// keeps the terminal default [`Migration::down`](crate::Migration::down).
#[macro_export]
#[doc(hidden)]
macro_rules! __sql_migration_impl {
    ($name:ident, $version:expr, $migration_name:expr,
        sqlite_up: [$($sqlite_up:expr),*],
        mysql_up: [$($mysql_up:expr),*],
        postgres_up: [$($postgres_up:expr),*]
        $(;
        sqlite_down: [$($sqlite_down:expr),*],
        mysql_down: [$($mysql_down:expr),*],
        postgres_down: [$($postgres_down:expr),*]
        )?
    ) => {
        pub struct $name;

        impl $crate::Migration for $name {
            fn version(&self) -> u32 {
                $version
            }

            fn name(&self) -> String {
                $migration_name.to_string()
            }

            fn up(&self, schema: &mut $crate::Schema) -> Result<(), $crate::Error> {
                $crate::__run_for_engine(
                    schema,
                    &[$($sqlite_up),*],
                    &[$($mysql_up),*],
                    &[$($postgres_up),*],
                )
            }

            $(
            fn down(&self, schema: &mut $crate::Schema) -> Result<(), $crate::Error> {
                $crate::__run_for_engine(
                    schema,
                    &[$($sqlite_down),*],
                    &[$($mysql_down),*],
                    &[$($postgres_down),*],
                )
            }
            )?
        }
    };
}

/// Run the statements written for the schema's engine, in order.
#[doc(hidden)]
pub fn __run_for_engine(
    schema: &mut crate::Schema,
    sqlite: &[&str],
    mysql: &[&str],
    postgres: &[&str],
) -> Result<(), crate::Error> {
    use crate::adapter::SchemaAdapter;

    let statements = match schema.adapter()?.engine() {
        crate::EngineKind::Mysql => mysql,
        crate::EngineKind::Postgres => postgres,
        _ => sqlite,
    };
    for sql in statements {
        schema.query(sql)?;
    }
    Ok(())
}
