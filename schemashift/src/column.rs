use std::fmt;
use std::str::FromStr;

use crate::{Error, Value};

/// The abstract column types a migration may declare. Each adapter maps them
/// onto its engine's native types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Int,
    BigInt,
    Float,
    Text,
    LongText,
    Varchar,
    Enum,
    Date,
    DateTime,
    Time,
    Timestamp,
}

impl ColumnType {
    pub const ALL: [ColumnType; 11] = [
        ColumnType::Int,
        ColumnType::BigInt,
        ColumnType::Float,
        ColumnType::Text,
        ColumnType::LongText,
        ColumnType::Varchar,
        ColumnType::Enum,
        ColumnType::Date,
        ColumnType::DateTime,
        ColumnType::Time,
        ColumnType::Timestamp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Int => "int",
            ColumnType::BigInt => "bigint",
            ColumnType::Float => "float",
            ColumnType::Text => "text",
            ColumnType::LongText => "longtext",
            ColumnType::Varchar => "varchar",
            ColumnType::Enum => "enum",
            ColumnType::Date => "date",
            ColumnType::DateTime => "datetime",
            ColumnType::Time => "time",
            ColumnType::Timestamp => "timestamp",
        }
    }

    /// The value existing rows receive when a `NOT NULL` column is added
    /// without an explicit default.
    pub(crate) fn zero_value(&self) -> Value {
        match self {
            ColumnType::Int | ColumnType::BigInt => Value::Int(0),
            ColumnType::Float => Value::Float(0.0),
            ColumnType::Date => Value::from("0000-00-00"),
            ColumnType::DateTime | ColumnType::Timestamp => Value::from("0000-00-00 00:00:00"),
            ColumnType::Time => Value::from("00:00:00"),
            ColumnType::Text | ColumnType::LongText | ColumnType::Varchar | ColumnType::Enum => {
                Value::from("")
            }
        }
    }
}

impl FromStr for ColumnType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ColumnType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::InvalidColumnType(s.to_string()))
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Definition of a column to add to an existing table.
///
/// ```
/// use schemashift::{ColumnSpec, ColumnType};
///
/// let age = ColumnSpec::new("age", ColumnType::Int).not_null();
/// let status = ColumnSpec::parse("status", "enum")
///     .unwrap()
///     .values(["active", "disabled"])
///     .default_value("active");
/// assert_eq!(status.column_type(), ColumnType::Enum);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    name: String,
    column_type: ColumnType,
    length: Option<u32>,
    default: Option<Value>,
    not_null: bool,
    primary_key: bool,
    values: Vec<String>,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            length: None,
            default: None,
            not_null: false,
            primary_key: false,
            values: Vec::new(),
        }
    }

    /// Like [ColumnSpec::new], taking the type by its name (`"int"`,
    /// `"varchar"`, ...). Unknown names fail with [Error::InvalidColumnType].
    pub fn parse(name: impl Into<String>, column_type: &str) -> Result<Self, Error> {
        Ok(Self::new(name, column_type.parse()?))
    }

    pub fn length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Allowed values of an [ColumnType::Enum] column.
    pub fn values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    pub fn get_length(&self) -> Option<u32> {
        self.length
    }

    pub fn get_default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn is_not_null(&self) -> bool {
        self.not_null
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn enum_values(&self) -> &[String] {
        &self.values
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.name.trim().is_empty() {
            return Err(Error::invalid_argument("column name must not be empty"));
        }
        if self.length == Some(0) {
            return Err(Error::invalid_argument(format!(
                "column '{}' must have a length greater than 0",
                self.name
            )));
        }
        if let Some(Value::Float(f)) = &self.default {
            if !f.is_finite() {
                return Err(Error::invalid_argument(format!(
                    "column '{}' has a non-finite default {}",
                    self.name, f
                )));
            }
        }
        if self.column_type == ColumnType::Enum && self.values.is_empty() {
            return Err(Error::invalid_argument(format!(
                "enum column '{}' needs at least one allowed value",
                self.name
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_type_parses_from_its_name() {
        for t in ColumnType::ALL {
            assert_eq!(t.as_str().parse::<ColumnType>().unwrap(), t);
        }
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert_eq!(
            "integer".parse::<ColumnType>().unwrap_err(),
            Error::InvalidColumnType("integer".to_string())
        );
        assert_eq!(
            ColumnSpec::parse("age", "INT").unwrap_err(),
            Error::InvalidColumnType("INT".to_string())
        );
    }

    #[test]
    fn builder_records_every_attribute() {
        let spec = ColumnSpec::new("code", ColumnType::Varchar)
            .length(12)
            .default_value("none")
            .not_null()
            .primary_key();
        assert_eq!(spec.name(), "code");
        assert_eq!(spec.get_length(), Some(12));
        assert_eq!(spec.get_default(), Some(&Value::from("none")));
        assert!(spec.is_not_null());
        assert!(spec.is_primary_key());
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn validation_catches_malformed_specs() {
        assert!(matches!(
            ColumnSpec::new(" ", ColumnType::Int).validate(),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            ColumnSpec::new("name", ColumnType::Varchar).length(0).validate(),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            ColumnSpec::new("state", ColumnType::Enum).validate(),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn non_finite_defaults_are_rejected() {
        for f in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
            assert!(matches!(
                ColumnSpec::new("ratio", ColumnType::Float)
                    .default_value(f)
                    .validate(),
                Err(Error::InvalidArgument(_))
            ));
        }
        assert!(ColumnSpec::new("ratio", ColumnType::Float)
            .default_value(0.5)
            .validate()
            .is_ok());
    }
}
