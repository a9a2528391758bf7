pub mod errors;
pub mod health;
pub mod public;
pub mod user;

pub use errors::{handler_404, render_error, render_error_pages, AppError};
pub use health::health_check_handler;
pub use public::{about, home, login, logout, register};
pub use user::{me, members};
