use axum::{
    http::{header::CONTENT_TYPE, StatusCode},
    response::{Html, IntoResponse, Response},
};
use minijinja::context;

use crate::db::ModelError;
use crate::models::UserError;
use crate::utils::templates::{render, TemplateError};

/// Status codes that get a rendered error page.
pub const ERROR_PAGE_CODES: [StatusCode; 3] = [
    StatusCode::UNAUTHORIZED,
    StatusCode::NOT_FOUND,
    StatusCode::INTERNAL_SERVER_ERROR,
];

pub fn has_error_page(status: StatusCode) -> bool {
    ERROR_PAGE_CODES.contains(&status)
}

/// Renders `{code}.html` with that status. Codes without a page fall
/// back to 500.
pub fn render_error(status: StatusCode) -> Response {
    let code = if has_error_page(status) {
        status
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    let template = format!("{}.html", code.as_u16());

    match render(&template, context! {}) {
        Ok(body) => (code, Html(body)).into_response(),
        Err(e) => {
            tracing::error!("Failed to render error page {}: {}", template, e);
            (code, code.canonical_reason().unwrap_or("Error")).into_response()
        }
    }
}

/// Swaps bare error responses (no body type, or plain text from a
/// rejection or a caught panic) for the rendered page. JSON and HTML
/// bodies are left alone.
pub async fn render_error_pages(response: Response) -> Response {
    if !has_error_page(response.status()) {
        return response;
    }

    let replace = match response.headers().get(CONTENT_TYPE) {
        None => true,
        Some(value) => value
            .to_str()
            .map(|content_type| content_type.starts_with("text/plain"))
            .unwrap_or(false),
    };

    if replace {
        render_error(response.status())
    } else {
        response
    }
}

pub async fn handler_404() -> Response {
    render_error(StatusCode::NOT_FOUND)
}

/// Errors from HTML page handlers.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Not found")]
    NotFound,
    #[error("Model error: {0}")]
    Model(#[from] ModelError),
    #[error("User error: {0}")]
    User(#[from] UserError),
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        render_error(status)
    }
}
