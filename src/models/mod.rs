pub mod apartment;
pub mod pin;
pub mod role;
pub mod user;

pub use apartment::Apartment;
pub use pin::Pin;
pub use role::Role;
pub use user::{LoginRequest, RegisterRequest, User, UserError, UserResponse};

use crate::db::{Model, Table};

/// Every model table, referenced tables first.
pub fn all_tables() -> [&'static Table; 4] {
    [User::table(), Role::table(), Apartment::table(), Pin::table()]
}
