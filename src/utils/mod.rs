pub mod responses;
pub mod templates;
pub mod validation;

pub use responses::{ApiErrorResponse, ApiResponse, ErrorCodes, ResponseBuilder};
pub use templates::{render, TemplateError};
pub use validation::{ValidationErrors, ValidationResult, Validator};
