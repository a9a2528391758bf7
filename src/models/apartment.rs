use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use std::sync::OnceLock;

use crate::db::{ColumnDef, Crud, Model, ModelError, SqlType, Table};

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Apartment {
    pub id: Option<i32>,
    pub url: String,
    pub active: bool,
    pub title: Option<String>,
    pub address: Option<String>,
    pub neighborhood: Option<String>,
    pub rent: Option<f64>,
    pub warm_rent: Option<f64>,
    pub size: Option<f64>,
    pub rooms: Option<f64>,
    pub availability: Option<NaiveDate>,
    pub description: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Apartment {
    pub fn new(url: &str) -> Self {
        Self {
            id: None,
            url: url.to_string(),
            active: true,
            title: None,
            address: None,
            neighborhood: None,
            rent: None,
            warm_rent: None,
            size: None,
            rooms: None,
            availability: None,
            description: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// Warm rent when known, otherwise the cold rent.
    pub fn monthly_cost(&self) -> Option<f64> {
        self.warm_rent.or(self.rent)
    }

    pub fn cost_per_square_meter(&self) -> Option<f64> {
        match (self.monthly_cost(), self.size) {
            (Some(cost), Some(size)) if size > 0.0 => Some(cost / size),
            _ => None,
        }
    }

    /// Newest active listings first.
    pub async fn latest_active(pool: &PgPool, limit: i64) -> Result<Vec<Apartment>, ModelError> {
        let apartments = sqlx::query_as::<_, Apartment>(
            r#"
            SELECT * FROM apartment
            WHERE active
            ORDER BY created_at DESC, id DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(apartments)
    }
}

impl Model for Apartment {
    fn table() -> &'static Table {
        static TABLE: OnceLock<Table> = OnceLock::new();
        TABLE.get_or_init(|| {
            Table::with_surrogate_pk(
                "apartment",
                vec![
                    ColumnDef::new("url", SqlType::Text).unique(),
                    ColumnDef::new("active", SqlType::Boolean).default_sql("TRUE"),
                    ColumnDef::new("title", SqlType::Text).nullable(),
                    ColumnDef::new("address", SqlType::Text).nullable(),
                    ColumnDef::new("neighborhood", SqlType::Text).nullable(),
                    ColumnDef::new("rent", SqlType::Float).nullable(),
                    ColumnDef::new("warm_rent", SqlType::Float).nullable(),
                    ColumnDef::new("size", SqlType::Float).nullable(),
                    ColumnDef::new("rooms", SqlType::Float).nullable(),
                    ColumnDef::new("availability", SqlType::Date).nullable(),
                    ColumnDef::new("description", SqlType::Text).nullable(),
                    ColumnDef::new("created_at", SqlType::Timestamp).default_sql("NOW()"),
                    ColumnDef::new("updated_at", SqlType::Timestamp).default_sql("NOW()"),
                ],
            )
        })
    }

    fn id(&self) -> Option<i32> {
        self.id
    }

    fn before_save(&mut self) {
        self.updated_at = Some(Utc::now());
    }
}

impl Crud for Apartment {}
