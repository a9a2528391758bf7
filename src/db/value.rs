use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::{json, Value};
use sqlx::{Postgres, QueryBuilder};

use crate::db::crud::ModelError;
use crate::db::schema::ColumnDef;

/// Column types the models use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Serial,
    Integer,
    Float,
    Text,
    Varchar(u16),
    Boolean,
    Date,
    Timestamp,
}

impl SqlType {
    pub fn ddl(&self) -> String {
        match self {
            SqlType::Serial => "SERIAL".to_string(),
            SqlType::Integer => "INTEGER".to_string(),
            SqlType::Float => "DOUBLE PRECISION".to_string(),
            SqlType::Text => "TEXT".to_string(),
            SqlType::Varchar(len) => format!("VARCHAR({len})"),
            SqlType::Boolean => "BOOLEAN".to_string(),
            SqlType::Date => "DATE".to_string(),
            SqlType::Timestamp => "TIMESTAMPTZ".to_string(),
        }
    }

    fn expected(&self) -> &'static str {
        match self {
            SqlType::Serial | SqlType::Integer => "an integer",
            SqlType::Float => "a number",
            SqlType::Text | SqlType::Varchar(_) => "a string",
            SqlType::Boolean => "a boolean",
            SqlType::Date => "a date (YYYY-MM-DD)",
            SqlType::Timestamp => "an RFC 3339 timestamp",
        }
    }
}

/// A typed, nullable value bound into a query.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(Option<i32>),
    Float(Option<f64>),
    Text(Option<String>),
    Bool(Option<bool>),
    Date(Option<NaiveDate>),
    Timestamp(Option<DateTime<Utc>>),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        match self {
            FieldValue::Int(v) => v.is_none(),
            FieldValue::Float(v) => v.is_none(),
            FieldValue::Text(v) => v.is_none(),
            FieldValue::Bool(v) => v.is_none(),
            FieldValue::Date(v) => v.is_none(),
            FieldValue::Timestamp(v) => v.is_none(),
        }
    }

    /// Converts a JSON value into the column's type. `null` becomes a typed
    /// null; whether that is allowed is decided by the caller.
    pub fn from_json(column: &ColumnDef, value: &Value) -> Result<Self, ModelError> {
        let mismatch = || ModelError::TypeMismatch {
            column: column.name.to_string(),
            expected: column.sql_type.expected(),
        };

        let converted = match column.sql_type {
            SqlType::Serial | SqlType::Integer => FieldValue::Int(match value {
                Value::Null => None,
                Value::Number(n) => Some(
                    n.as_i64()
                        .and_then(|v| i32::try_from(v).ok())
                        .ok_or_else(mismatch)?,
                ),
                Value::String(s) => Some(s.trim().parse::<i32>().map_err(|_| mismatch())?),
                _ => return Err(mismatch()),
            }),
            SqlType::Float => FieldValue::Float(match value {
                Value::Null => None,
                Value::Number(n) => Some(n.as_f64().ok_or_else(mismatch)?),
                Value::String(s) => Some(s.trim().parse::<f64>().map_err(|_| mismatch())?),
                _ => return Err(mismatch()),
            }),
            SqlType::Text | SqlType::Varchar(_) => FieldValue::Text(match value {
                Value::Null => None,
                Value::String(s) => {
                    if let SqlType::Varchar(max) = column.sql_type {
                        if s.chars().count() > usize::from(max) {
                            return Err(ModelError::TooLong {
                                column: column.name.to_string(),
                                max,
                            });
                        }
                    }
                    Some(s.clone())
                }
                _ => return Err(mismatch()),
            }),
            SqlType::Boolean => FieldValue::Bool(match value {
                Value::Null => None,
                Value::Bool(b) => Some(*b),
                Value::String(s) => match s.as_str() {
                    "true" => Some(true),
                    "false" => Some(false),
                    _ => return Err(mismatch()),
                },
                _ => return Err(mismatch()),
            }),
            SqlType::Date => FieldValue::Date(match value {
                Value::Null => None,
                Value::String(s) => Some(
                    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| mismatch())?,
                ),
                _ => return Err(mismatch()),
            }),
            SqlType::Timestamp => FieldValue::Timestamp(match value {
                Value::Null => None,
                Value::String(s) => Some(
                    DateTime::parse_from_rfc3339(s.trim())
                        .map_err(|_| mismatch())?
                        .with_timezone(&Utc),
                ),
                _ => return Err(mismatch()),
            }),
        };

        Ok(converted)
    }

    /// Normalised JSON form, matching what the models' serde derives expect.
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Int(v) => json!(v),
            FieldValue::Float(v) => json!(v),
            FieldValue::Text(v) => json!(v),
            FieldValue::Bool(v) => json!(v),
            FieldValue::Date(v) => json!(v.as_ref().map(|d| d.format("%Y-%m-%d").to_string())),
            FieldValue::Timestamp(v) => {
                json!(v
                    .as_ref()
                    .map(|t| t.to_rfc3339_opts(SecondsFormat::Micros, true)))
            }
        }
    }

    pub(crate) fn push_bind(self, builder: &mut QueryBuilder<'_, Postgres>) {
        match self {
            FieldValue::Int(v) => builder.push_bind(v),
            FieldValue::Float(v) => builder.push_bind(v),
            FieldValue::Text(v) => builder.push_bind(v),
            FieldValue::Bool(v) => builder.push_bind(v),
            FieldValue::Date(v) => builder.push_bind(v),
            FieldValue::Timestamp(v) => builder.push_bind(v),
        };
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(Some(value.to_string()))
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(Some(value))
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Int(Some(value))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(Some(value))
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(Some(value))
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        FieldValue::Date(Some(value))
    }
}
