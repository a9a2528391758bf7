pub mod connection;
pub mod crud;
pub mod schema;
pub mod value;

pub use connection::{
    create_connection_pool, health_check, run_migrations, DatabaseError, DatabasePool,
};
pub use crud::{Crud, Model, ModelError, Page, RecordRef};
pub use schema::{create_all, reference_column, surrogate_pk, ColumnDef, ForeignKey, Table};
pub use value::{FieldValue, SqlType};
