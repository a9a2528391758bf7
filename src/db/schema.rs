//! Table metadata declared by each model.
//!
//! The CRUD layer uses it to validate and type incoming fields, and
//! `create_all` turns it into `CREATE TABLE IF NOT EXISTS` statements for
//! fresh databases. Production schemas come from `migrations/`.

use crate::db::connection::{DatabaseError, DatabasePool};
use crate::db::value::SqlType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub table: &'static str,
    pub column: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub sql_type: SqlType,
    pub nullable: bool,
    pub unique: bool,
    pub primary_key: bool,
    pub default: Option<&'static str>,
    pub references: Option<ForeignKey>,
}

impl ColumnDef {
    /// A non-null column with no default.
    pub fn new(name: &'static str, sql_type: SqlType) -> Self {
        Self {
            name,
            sql_type,
            nullable: false,
            unique: false,
            primary_key: false,
            default: None,
            references: None,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// SQL expression used when an insert leaves the column out.
    pub fn default_sql(mut self, expression: &'static str) -> Self {
        self.default = Some(expression);
        self
    }

    pub fn references(mut self, table: &'static str, column: &'static str) -> Self {
        self.references = Some(ForeignKey { table, column });
        self
    }

    /// Points a foreign key at a column other than `id`.
    pub fn pk_name(mut self, column: &'static str) -> Self {
        if let Some(reference) = self.references.as_mut() {
            reference.column = column;
        }
        self
    }

    pub fn ddl(&self) -> String {
        let mut ddl = format!("{} {}", self.name, self.sql_type.ddl());
        if self.primary_key {
            ddl.push_str(" PRIMARY KEY");
            return ddl;
        }
        if !self.nullable {
            ddl.push_str(" NOT NULL");
        }
        if self.unique {
            ddl.push_str(" UNIQUE");
        }
        if let Some(default) = self.default {
            ddl.push_str(" DEFAULT ");
            ddl.push_str(default);
        }
        if let Some(reference) = &self.references {
            ddl.push_str(&format!(" REFERENCES {}({})", reference.table, reference.column));
        }
        ddl
    }
}

/// Surrogate integer primary key named `id`.
pub fn surrogate_pk() -> ColumnDef {
    ColumnDef {
        primary_key: true,
        ..ColumnDef::new("id", SqlType::Serial)
    }
}

/// Non-null integer column referencing `table_name(id)`.
///
/// ```
/// use tegenaria::db::reference_column;
///
/// let column = reference_column("user_id", "users").nullable();
/// assert_eq!(column.ddl(), "user_id INTEGER REFERENCES users(id)");
/// ```
pub fn reference_column(name: &'static str, table_name: &'static str) -> ColumnDef {
    ColumnDef::new(name, SqlType::Integer).references(table_name, "id")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub name: &'static str,
    pub columns: Vec<ColumnDef>,
}

impl Table {
    /// Table whose first column is the surrogate `id` key.
    pub fn with_surrogate_pk(name: &'static str, columns: Vec<ColumnDef>) -> Self {
        let mut all = Vec::with_capacity(columns.len() + 1);
        all.push(surrogate_pk());
        all.extend(columns);
        Self { name, columns: all }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn primary_key(&self) -> &'static str {
        self.columns
            .iter()
            .find(|column| column.primary_key)
            .map(|column| column.name)
            .unwrap_or("id")
    }

    pub fn create_statement(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(ColumnDef::ddl)
            .collect::<Vec<_>>()
            .join(",\n    ");
        format!("CREATE TABLE IF NOT EXISTS {} (\n    {}\n)", self.name, columns)
    }
}

/// Creates every table that does not exist yet, in the order given.
/// Referenced tables must come before the tables pointing at them.
pub async fn create_all(pool: &DatabasePool, tables: &[&Table]) -> Result<(), DatabaseError> {
    for table in tables {
        tracing::debug!("Creating table {} if missing", table.name);
        sqlx::query(&table.create_statement())
            .execute(pool)
            .await
            .map_err(DatabaseError::OperationFailed)?;
    }
    Ok(())
}
