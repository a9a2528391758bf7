use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Standard API response structure for successful operations
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    pub message: Option<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Standard error response structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    pub success: bool,
    pub error: ErrorDetails,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
    pub field_errors: Option<HashMap<String, Vec<String>>>,
}

/// Response builder for consistent API responses
pub struct ResponseBuilder;

impl ResponseBuilder {
    pub fn success<T: Serialize>(data: T) -> (StatusCode, Json<ApiResponse<T>>) {
        Self::success_with_status(StatusCode::OK, data)
    }

    pub fn success_with_status<T: Serialize>(
        status: StatusCode,
        data: T,
    ) -> (StatusCode, Json<ApiResponse<T>>) {
        (
            status,
            Json(ApiResponse {
                success: true,
                data,
                message: None,
                timestamp: chrono::Utc::now(),
            }),
        )
    }

    pub fn success_with_message<T: Serialize>(
        data: T,
        message: String,
    ) -> (StatusCode, Json<ApiResponse<T>>) {
        (
            StatusCode::OK,
            Json(ApiResponse {
                success: true,
                data,
                message: Some(message),
                timestamp: chrono::Utc::now(),
            }),
        )
    }

    pub fn error(
        status: StatusCode,
        code: &str,
        message: String,
    ) -> (StatusCode, Json<ApiErrorResponse>) {
        (
            status,
            Json(ApiErrorResponse {
                success: false,
                error: ErrorDetails {
                    code: code.to_string(),
                    message,
                    field_errors: None,
                },
                timestamp: chrono::Utc::now(),
            }),
        )
    }

    /// Create a validation error response
    pub fn validation_error(
        field_errors: HashMap<String, Vec<String>>,
    ) -> (StatusCode, Json<ApiErrorResponse>) {
        (
            StatusCode::BAD_REQUEST,
            Json(ApiErrorResponse {
                success: false,
                error: ErrorDetails {
                    code: ErrorCodes::VALIDATION_ERROR.to_string(),
                    message: "Request validation failed".to_string(),
                    field_errors: Some(field_errors),
                },
                timestamp: chrono::Utc::now(),
            }),
        )
    }

    pub fn not_found(resource: &str) -> (StatusCode, Json<ApiErrorResponse>) {
        Self::error(
            StatusCode::NOT_FOUND,
            ErrorCodes::RESOURCE_NOT_FOUND,
            format!("{resource} not found"),
        )
    }

    pub fn conflict(message: String) -> (StatusCode, Json<ApiErrorResponse>) {
        Self::error(StatusCode::CONFLICT, ErrorCodes::RESOURCE_CONFLICT, message)
    }

    pub fn internal_server_error(message: Option<String>) -> (StatusCode, Json<ApiErrorResponse>) {
        Self::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCodes::INTERNAL_ERROR,
            message.unwrap_or_else(|| "An internal server error occurred".to_string()),
        )
    }
}

/// Common error codes used throughout the API
pub struct ErrorCodes;

impl ErrorCodes {
    pub const VALIDATION_ERROR: &'static str = "VALIDATION_ERROR";
    pub const AUTHENTICATION_FAILED: &'static str = "AUTHENTICATION_FAILED";
    pub const RESOURCE_NOT_FOUND: &'static str = "RESOURCE_NOT_FOUND";
    pub const RESOURCE_CONFLICT: &'static str = "RESOURCE_CONFLICT";
    pub const INTERNAL_ERROR: &'static str = "INTERNAL_ERROR";
}

/// Helper functions for common response patterns
pub mod helpers {
    use super::*;

    #[derive(Debug, Clone, Serialize)]
    pub struct PaginatedResponse<T> {
        pub items: Vec<T>,
        pub total_count: i64,
        pub page: u32,
        pub page_size: u32,
        pub total_pages: u32,
    }

    impl<T> PaginatedResponse<T> {
        pub fn new(items: Vec<T>, total_count: i64, page: u32, page_size: u32) -> Self {
            let total_pages = ((total_count.max(0) as f64) / (page_size.max(1) as f64)).ceil() as u32;

            Self {
                items,
                total_count,
                page,
                page_size,
                total_pages,
            }
        }
    }

    /// Create success response for created resources
    pub fn created<T: Serialize>(data: T) -> (StatusCode, Json<ApiResponse<T>>) {
        ResponseBuilder::success_with_status(StatusCode::CREATED, data)
    }

    /// Create success response for updated resources
    pub fn updated<T: Serialize>(data: T) -> (StatusCode, Json<ApiResponse<T>>) {
        ResponseBuilder::success_with_message(data, "Resource updated successfully".to_string())
    }
}
