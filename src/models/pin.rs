use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::sync::OnceLock;

use crate::db::{ColumnDef, Crud, Model, SqlType, Table};

/// A place the user cares about (work, friends, gym) that apartments are
/// compared against.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Pin {
    pub id: Option<i32>,
    pub address: String,
    pub name: Option<String>,
    pub active: bool,
}

impl Pin {
    pub fn new(address: &str, name: Option<&str>) -> Self {
        Self {
            id: None,
            address: address.to_string(),
            name: name.map(str::to_string),
            active: true,
        }
    }

    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.address)
    }
}

impl Model for Pin {
    fn table() -> &'static Table {
        static TABLE: OnceLock<Table> = OnceLock::new();
        TABLE.get_or_init(|| {
            Table::with_surrogate_pk(
                "pin",
                vec![
                    ColumnDef::new("address", SqlType::Text).unique(),
                    ColumnDef::new("name", SqlType::Varchar(100)).nullable(),
                    ColumnDef::new("active", SqlType::Boolean).default_sql("TRUE"),
                ],
            )
        })
    }

    fn id(&self) -> Option<i32> {
        self.id
    }
}

impl Crud for Pin {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_pin_is_unsaved_and_active() {
        let pin = Pin::new("Alexanderplatz 1, Berlin", Some("Work"));
        assert_eq!(pin.id(), None);
        assert!(pin.active);
        assert_eq!(pin.label(), "Work");
        assert_eq!(Pin::new("Kastanienallee 5", None).label(), "Kastanienallee 5");
    }

    #[test]
    fn test_pin_table() {
        let table = Pin::table();
        assert_eq!(table.name, "pin");
        assert_eq!(table.primary_key(), "id");
        assert!(table.column("address").unwrap().unique);
    }
}
