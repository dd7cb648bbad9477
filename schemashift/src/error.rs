use crate::connection::EngineKind;

/// Error type for the schemashift crate.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    /// The connection reports an engine no adapter is available for.
    #[error("unsupported database engine: {0}")]
    UnsupportedEngine(EngineKind),
    /// A column type name outside the fixed set of column types.
    #[error("invalid column type '{0}'")]
    InvalidColumnType(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The engine rejected a statement. Carries the failing SQL for diagnosis.
    #[error("failed to execute `{sql}`: {source}")]
    SqlExecution { sql: String, source: EngineError },
    #[error("migration {version} ('{name}') is irreversible")]
    IrreversibleMigration { version: u32, name: String },
    /// The adapter's dialect cannot express the requested operation.
    #[error("{engine} does not support {operation}")]
    UnsupportedOperation {
        engine: EngineKind,
        operation: String,
    },
    /// A connection could not be opened from a database URL.
    #[error("failed to connect to {engine}: {source}")]
    ConnectionFailed {
        engine: EngineKind,
        source: EngineError,
    },
    #[error("{0}")]
    Generic(String),
}

impl Error {
    pub(crate) fn sql(sql: impl Into<String>, source: impl Into<EngineError>) -> Self {
        Self::SqlExecution {
            sql: sql.into(),
            source: source.into(),
        }
    }

    pub(crate) fn connection(engine: EngineKind, source: impl Into<EngineError>) -> Self {
        Self::ConnectionFailed {
            engine,
            source: source.into(),
        }
    }

    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

impl From<String> for Error {
    fn from(value: String) -> Self {
        Self::Generic(value)
    }
}

/// The engine-native error behind an [Error::SqlExecution].
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[cfg(feature = "sqlite")]
    #[error("{0}")]
    Rusqlite(#[from] rusqlite::Error),
    #[cfg(feature = "mysql")]
    #[error("{0}")]
    Mysql(String),
    #[cfg(feature = "postgres")]
    #[error("{0}")]
    Postgres(#[from] postgres::Error),
    #[error("{0}")]
    Other(String),
}

#[cfg(feature = "mysql")]
impl From<mysql::Error> for EngineError {
    fn from(value: mysql::Error) -> Self {
        Self::Mysql(value.to_string())
    }
}

impl From<String> for EngineError {
    fn from(value: String) -> Self {
        Self::Other(value)
    }
}

impl From<&str> for EngineError {
    fn from(value: &str) -> Self {
        Self::Other(value.to_string())
    }
}

// Manual PartialEq implementation because postgres::Error doesn't implement PartialEq
impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            #[cfg(feature = "sqlite")]
            (Self::Rusqlite(a), Self::Rusqlite(b)) => a == b,
            #[cfg(feature = "mysql")]
            (Self::Mysql(a), Self::Mysql(b)) => a == b,
            #[cfg(feature = "postgres")]
            (Self::Postgres(a), Self::Postgres(b)) => a.to_string() == b.to_string(),
            (Self::Other(a), Self::Other(b)) => a == b,
            _ => false,
        }
    }
}
