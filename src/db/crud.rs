//! CRUD mixin for table-backed models.
//!
//! A model declares its table metadata and how to read its surrogate key;
//! `Crud` then provides create/update/save/delete plus the lookups the
//! views need. Field maps arrive as JSON objects and are checked against
//! the table before anything reaches SQL.

use axum::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use sqlx::{postgres::PgRow, FromRow, PgConnection, PgPool, Postgres, QueryBuilder};

use crate::db::schema::Table;
use crate::db::value::FieldValue;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Fields must be a JSON object")]
    NotAnObject,
    #[error("Unknown column '{column}' on table '{table}'")]
    UnknownColumn { table: String, column: String },
    #[error("Column '{0}' cannot be changed")]
    ImmutableColumn(String),
    #[error("Column '{0}' cannot be null")]
    NullValue(String),
    #[error("Invalid value for column '{column}': expected {expected}")]
    TypeMismatch {
        column: String,
        expected: &'static str,
    },
    #[error("Value for column '{column}' is longer than {max} characters")]
    TooLong { column: String, max: u16 },
    #[error("Record has not been saved yet")]
    Unsaved,
    #[error("No row with id {id} in table '{table}'")]
    NotFound { table: String, id: i32 },
}

impl ModelError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, ModelError::Database(sqlx::Error::Database(e)) if e.is_unique_violation())
    }

    /// Name of the violated constraint, when the database reported one.
    pub fn constraint(&self) -> Option<&str> {
        match self {
            ModelError::Database(sqlx::Error::Database(e)) => e.constraint(),
            _ => None,
        }
    }

    /// Errors caused by the caller's input rather than the database.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ModelError::NotAnObject
                | ModelError::UnknownColumn { .. }
                | ModelError::ImmutableColumn(_)
                | ModelError::NullValue(_)
                | ModelError::TypeMismatch { .. }
                | ModelError::TooLong { .. }
        )
    }
}

/// Anything a caller may hand to `get_by_id`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RecordRef<'a> {
    Str(&'a str),
    Int(i64),
    Float(f64),
}

impl RecordRef<'_> {
    /// Strings must be all ASCII digits; floats are truncated. Anything
    /// else, or a value outside the key range, yields `None`.
    pub fn as_id(&self) -> Option<i32> {
        match *self {
            RecordRef::Str(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => {
                s.parse().ok()
            }
            RecordRef::Str(_) => None,
            RecordRef::Int(v) => i32::try_from(v).ok(),
            RecordRef::Float(v) if v.is_finite() => i32::try_from(v.trunc() as i64).ok(),
            RecordRef::Float(_) => None,
        }
    }
}

impl<'a> From<&'a str> for RecordRef<'a> {
    fn from(value: &'a str) -> Self {
        RecordRef::Str(value)
    }
}

impl<'a> From<&'a String> for RecordRef<'a> {
    fn from(value: &'a String) -> Self {
        RecordRef::Str(value.as_str())
    }
}

impl From<i32> for RecordRef<'_> {
    fn from(value: i32) -> Self {
        RecordRef::Int(i64::from(value))
    }
}

impl From<i64> for RecordRef<'_> {
    fn from(value: i64) -> Self {
        RecordRef::Int(value)
    }
}

impl From<f64> for RecordRef<'_> {
    fn from(value: f64) -> Self {
        RecordRef::Float(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: u32,
    pub size: u32,
}

impl Page {
    pub const MAX_SIZE: u32 = 500;

    pub fn new(number: u32, size: u32) -> Self {
        Self {
            number: number.max(1),
            size: size.clamp(1, Self::MAX_SIZE),
        }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.number - 1) * i64::from(self.size)
    }
}

pub trait Model:
    Serialize + DeserializeOwned + for<'r> FromRow<'r, PgRow> + Send + Sync + Unpin + 'static
{
    fn table() -> &'static Table;

    fn id(&self) -> Option<i32>;

    /// Runs before every `save`.
    fn before_save(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    Insert,
    Update,
}

fn column_values<M: Model>(
    fields: &Value,
    mode: WriteMode,
) -> Result<Vec<(&'static str, FieldValue)>, ModelError> {
    let Value::Object(map) = fields else {
        return Err(ModelError::NotAnObject);
    };
    let table = M::table();

    let mut values = Vec::with_capacity(map.len());
    for (name, raw) in map {
        let column = table
            .column(name)
            .ok_or_else(|| ModelError::UnknownColumn {
                table: table.name.to_string(),
                column: name.clone(),
            })?;

        if column.primary_key {
            match mode {
                WriteMode::Insert => continue,
                WriteMode::Update => return Err(ModelError::ImmutableColumn(name.clone())),
            }
        }

        let value = FieldValue::from_json(column, raw)?;
        if value.is_null() {
            if mode == WriteMode::Insert && column.default.is_some() {
                continue;
            }
            if !column.nullable {
                return Err(ModelError::NullValue(name.clone()));
            }
        }
        values.push((column.name, value));
    }

    Ok(values)
}

/// `INSERT ... RETURNING *`. The key is left to the sequence.
fn insert_query<M: Model>(
    values: Vec<(&'static str, FieldValue)>,
) -> QueryBuilder<'static, Postgres> {
    let table = M::table();

    let mut builder = QueryBuilder::new(format!("INSERT INTO {} ", table.name));
    if values.is_empty() {
        builder.push("DEFAULT VALUES");
    } else {
        let columns: Vec<&str> = values.iter().map(|(name, _)| *name).collect();
        builder.push(format!("({}) VALUES (", columns.join(", ")));
        for (i, (_, value)) in values.into_iter().enumerate() {
            if i > 0 {
                builder.push(", ");
            }
            value.push_bind(&mut builder);
        }
        builder.push(")");
    }

    builder.push(" RETURNING *");
    builder
}

/// `UPDATE ... WHERE pk = id RETURNING *`; no row comes back once the
/// record is gone.
fn update_query<M: Model>(
    id: i32,
    values: Vec<(&'static str, FieldValue)>,
) -> QueryBuilder<'static, Postgres> {
    let table = M::table();
    let pk = table.primary_key();

    let mut builder = QueryBuilder::new(format!("UPDATE {} SET ", table.name));
    if values.is_empty() {
        builder.push(format!("{pk} = {pk}"));
    }
    for (i, (name, value)) in values.into_iter().enumerate() {
        if i > 0 {
            builder.push(", ");
        }
        builder.push(format!("{name} = "));
        value.push_bind(&mut builder);
    }

    builder.push(format!(" WHERE {pk} = "));
    builder.push_bind(id);
    builder.push(" RETURNING *");
    builder
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn push_search_filter(
    builder: &mut QueryBuilder<'static, Postgres>,
    columns: &[&'static str],
    pattern: Option<&String>,
) {
    let Some(pattern) = pattern else {
        return;
    };
    if columns.is_empty() {
        return;
    }

    builder.push(" WHERE (");
    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            builder.push(" OR ");
        }
        builder.push(format!("{column}::text ILIKE "));
        builder.push_bind(pattern.clone());
    }
    builder.push(")");
}

fn resolve_column<M: Model>(name: &str) -> Result<&'static str, ModelError> {
    let table = M::table();
    table
        .column(name)
        .map(|column| column.name)
        .ok_or_else(|| ModelError::UnknownColumn {
            table: table.name.to_string(),
            column: name.to_string(),
        })
}

#[async_trait]
pub trait Crud: Model {
    /// Creates a record from named fields and commits it.
    async fn create(pool: &PgPool, fields: Value) -> Result<Self, ModelError> {
        let mut conn = pool.acquire().await?;
        Self::create_in(&mut conn, fields).await
    }

    /// Creates a record inside a caller-owned transaction.
    async fn create_in(conn: &mut PgConnection, fields: Value) -> Result<Self, ModelError> {
        let values = column_values::<Self>(&fields, WriteMode::Insert)?;
        let mut builder = insert_query::<Self>(values);
        let record = builder
            .build_query_as::<Self>()
            .fetch_one(&mut *conn)
            .await?;

        tracing::debug!(table = Self::table().name, id = ?record.id(), "Record created");
        Ok(record)
    }

    /// Sets fields in memory without touching the database.
    fn assign(&mut self, changes: Value) -> Result<(), ModelError> {
        let values = column_values::<Self>(&changes, WriteMode::Update)?;

        let mut current = serde_json::to_value(&*self)?;
        let Value::Object(map) = &mut current else {
            return Err(ModelError::NotAnObject);
        };
        for (name, value) in values {
            map.insert(name.to_string(), value.to_json());
        }

        *self = serde_json::from_value(current)?;
        Ok(())
    }

    /// Sets fields and commits the record.
    async fn update(&mut self, pool: &PgPool, changes: Value) -> Result<(), ModelError> {
        self.assign(changes)?;
        self.save(pool).await
    }

    /// Inserts or updates the record and commits.
    async fn save(&mut self, pool: &PgPool) -> Result<(), ModelError> {
        let mut tx = pool.begin().await?;
        self.save_in(&mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Inserts a new record or updates the stored one; the caller commits.
    /// The record is refreshed from the stored row, so ids and defaults are
    /// filled in. Updating a record whose row is gone fails with `NotFound`.
    async fn save_in(&mut self, conn: &mut PgConnection) -> Result<(), ModelError> {
        self.before_save();

        let current = serde_json::to_value(&*self)?;
        let values = column_values::<Self>(&current, WriteMode::Insert)?;
        *self = match self.id() {
            None => {
                insert_query::<Self>(values)
                    .build_query_as::<Self>()
                    .fetch_one(&mut *conn)
                    .await?
            }
            Some(id) => update_query::<Self>(id, values)
                .build_query_as::<Self>()
                .fetch_optional(&mut *conn)
                .await?
                .ok_or_else(|| ModelError::NotFound {
                    table: Self::table().name.to_string(),
                    id,
                })?,
        };

        tracing::debug!(table = Self::table().name, id = ?self.id(), "Record saved");
        Ok(())
    }

    async fn delete(self, pool: &PgPool) -> Result<(), ModelError> {
        let mut conn = pool.acquire().await?;
        self.delete_in(&mut conn).await
    }

    async fn delete_in(self, conn: &mut PgConnection) -> Result<(), ModelError> {
        let id = self.id().ok_or(ModelError::Unsaved)?;
        let table = Self::table();
        let sql = format!(
            "DELETE FROM {} WHERE {} = $1",
            table.name,
            table.primary_key()
        );
        sqlx::query(&sql).bind(id).execute(&mut *conn).await?;

        tracing::debug!(table = table.name, id, "Record deleted");
        Ok(())
    }

    /// Looks a record up by surrogate key. Ids that are not integers,
    /// floats or digit strings return `None` without querying.
    async fn get_by_id(
        pool: &PgPool,
        record_id: RecordRef<'_>,
    ) -> Result<Option<Self>, ModelError> {
        let Some(id) = record_id.as_id() else {
            return Ok(None);
        };
        let table = Self::table();
        let sql = format!(
            "SELECT * FROM {} WHERE {} = $1",
            table.name,
            table.primary_key()
        );

        Ok(sqlx::query_as::<_, Self>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await?)
    }

    async fn all(pool: &PgPool) -> Result<Vec<Self>, ModelError> {
        let table = Self::table();
        let sql = format!(
            "SELECT * FROM {} ORDER BY {}",
            table.name,
            table.primary_key()
        );

        Ok(sqlx::query_as::<_, Self>(&sql).fetch_all(pool).await?)
    }

    async fn find_by(
        pool: &PgPool,
        column: &str,
        value: FieldValue,
    ) -> Result<Option<Self>, ModelError> {
        let column = resolve_column::<Self>(column)?;
        let table = Self::table();

        let mut builder =
            QueryBuilder::new(format!("SELECT * FROM {} WHERE {column} = ", table.name));
        value.push_bind(&mut builder);
        builder.push(format!(" ORDER BY {} LIMIT 1", table.primary_key()));

        Ok(builder
            .build_query_as::<Self>()
            .fetch_optional(pool)
            .await?)
    }

    async fn filter_by(
        pool: &PgPool,
        column: &str,
        value: FieldValue,
    ) -> Result<Vec<Self>, ModelError> {
        let column = resolve_column::<Self>(column)?;
        let table = Self::table();

        let mut builder =
            QueryBuilder::new(format!("SELECT * FROM {} WHERE {column} = ", table.name));
        value.push_bind(&mut builder);
        builder.push(format!(" ORDER BY {}", table.primary_key()));

        Ok(builder.build_query_as::<Self>().fetch_all(pool).await?)
    }

    /// Case-insensitive substring search over `columns`, one page at a
    /// time. Returns the page and the total number of matches.
    async fn search(
        pool: &PgPool,
        columns: &[&str],
        term: Option<&str>,
        page: Page,
    ) -> Result<(Vec<Self>, i64), ModelError> {
        let columns = columns
            .iter()
            .map(|name| resolve_column::<Self>(name))
            .collect::<Result<Vec<_>, _>>()?;
        let pattern = term
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(|term| format!("%{}%", escape_like(term)));
        let table = Self::table();

        let mut count = QueryBuilder::new(format!("SELECT COUNT(*) FROM {}", table.name));
        push_search_filter(&mut count, &columns, pattern.as_ref());
        let total = count.build_query_scalar::<i64>().fetch_one(pool).await?;

        let mut select = QueryBuilder::new(format!("SELECT * FROM {}", table.name));
        push_search_filter(&mut select, &columns, pattern.as_ref());
        select.push(format!(" ORDER BY {} LIMIT ", table.primary_key()));
        select.push_bind(i64::from(page.size));
        select.push(" OFFSET ");
        select.push_bind(page.offset());
        let records = select.build_query_as::<Self>().fetch_all(pool).await?;

        Ok((records, total))
    }
}
