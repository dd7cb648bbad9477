#![cfg_attr(docsrs, feature(doc_cfg))]
//! `schemashift` is a backend-agnostic schema migration library.
//!
//! Migrations are written once against the [Schema] façade: create and drop
//! tables, add and remove columns, manage unique indexes, insert and update
//! rows. The façade looks at the engine behind the connection it was handed
//! and forwards each step to a stateless [Adapter] that renders it in that
//! engine's dialect. The same migration runs unchanged on SQLite, MySQL and
//! PostgreSQL.
//!
//! A [Migrator] applies an ordered list of migrations and records each one in
//! a version table, so an application can bring its database up to date on
//! startup without any manual step.
//!
//! ```
//! use schemashift::{ColumnSpec, ColumnType, Error, Migration, Migrator, Schema, Value};
//!
//! struct CreateCategories;
//!
//! impl Migration for CreateCategories {
//!     fn version(&self) -> u32 {
//!         1
//!     }
//!
//!     fn up(&self, schema: &mut Schema) -> Result<(), Error> {
//!         schema
//!             .create_table("categories")?
//!             .create_column(
//!                 "categories",
//!                 ColumnSpec::new("title", ColumnType::Varchar).length(255).not_null(),
//!             )?
//!             .create_column(
//!                 "categories",
//!                 ColumnSpec::new("alias", ColumnType::Varchar).length(255).not_null(),
//!             )?
//!             .create_unique_index("categories", &["alias"], None)?;
//!         schema.insert(
//!             "categories",
//!             &[("title", Value::from("News")), ("alias", Value::from("news"))],
//!         )?;
//!         Ok(())
//!     }
//!
//!     fn down(&self, schema: &mut Schema) -> Result<(), Error> {
//!         schema.drop_table("categories")?;
//!         Ok(())
//!     }
//! }
//!
//! # fn main() -> Result<(), Error> {
//! let mut conn = rusqlite::Connection::open_in_memory().unwrap();
//! let migrator = Migrator::new(vec![Box::new(CreateCategories)]);
//! let report = migrator.upgrade(&mut conn)?;
//! assert_eq!(report.migrations_run, vec![1]);
//! assert_eq!(migrator.get_current_version(&mut conn)?, 1);
//! # Ok(())
//! # }
//! ```
//!
//! # Engines
//!
//! | Engine | Feature | Connection | Transactional DDL |
//! |--------|---------|------------|-------------------|
//! | SQLite | `sqlite` (default) | `rusqlite::Connection` | yes |
//! | MySQL | `mysql` | `mysql::Conn` | no |
//! | PostgreSQL | `postgres` | `postgres::Client` | yes |
//!
//! Connections reporting any other [EngineKind] fail with
//! [Error::UnsupportedEngine] before a single statement is issued.
//!
//! # Other features
//! - `tracing`: structured logging of every migration and statement.
//! - `testing`: [RecordingConnection](testing::RecordingConnection) and an
//!   in-memory SQLite [MigrationTestHarness](testing::MigrationTestHarness).

mod core;
pub use core::{AppliedMigration, Migration, MigrationFailure, MigrationReport};

mod error;
pub use error::{EngineError, Error};

#[macro_use]
mod macros;
#[doc(hidden)]
pub use macros::__run_for_engine;

pub mod adapter;
pub use adapter::{Adapter, SchemaAdapter};

mod column;
pub use column::{ColumnSpec, ColumnType};

pub mod connection;
pub use connection::{Connection, EngineKind, Row};

mod value;
pub use value::Value;

mod schema;
pub use schema::Schema;

mod migrator;
pub use migrator::Migrator;

pub mod provider;
pub use provider::DatabaseUrl;

#[cfg(any(test, feature = "testing"))]
#[cfg_attr(docsrs, doc(cfg(feature = "testing")))]
pub mod testing;

#[cfg(all(test, feature = "mysql"))]
pub(crate) mod test_mysql;

#[cfg(all(test, feature = "postgres"))]
pub(crate) mod test_postgres;
