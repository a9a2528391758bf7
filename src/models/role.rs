use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::sync::OnceLock;

use crate::db::{reference_column, ColumnDef, Crud, Model, SqlType, Table};

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Role {
    pub id: Option<i32>,
    pub name: String,
    pub user_id: Option<i32>,
}

impl Model for Role {
    fn table() -> &'static Table {
        static TABLE: OnceLock<Table> = OnceLock::new();
        TABLE.get_or_init(|| {
            Table::with_surrogate_pk(
                "roles",
                vec![
                    ColumnDef::new("name", SqlType::Varchar(80)),
                    reference_column("user_id", "users").nullable(),
                ],
            )
        })
    }

    fn id(&self) -> Option<i32> {
        self.id
    }
}

impl Crud for Role {}
