use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use store_admin_core::{FieldError, ValidationErrors};
use store_admin_storage::{CatalogError, OrderError};

#[derive(Debug, Serialize)]
struct ProblemDetails {
    #[serde(rename = "type")]
    problem_type: &'static str,
    title: &'static str,
    detail: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<FieldError>,
}

/// `application/problem+json` error body returned by every API handler.
#[derive(Debug)]
pub struct ProblemResponse {
    status: StatusCode,
    body: ProblemDetails,
}

impl ProblemResponse {
    pub fn new<S: Into<String>>(status: StatusCode, problem_type: &'static str, detail: S) -> Self {
        Self {
            status,
            body: ProblemDetails {
                problem_type,
                title: status.canonical_reason().unwrap_or("error"),
                detail: detail.into(),
                errors: Vec::new(),
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthenticated", "Unauthenticated")
    }

    pub fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN, "unauthorized", "Unauthorized")
    }

    pub fn not_found(what: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", format!("{what} not found"))
    }

    /// Logs `err` and hides it behind a generic 500.
    pub fn internal(err: impl std::fmt::Display) -> Self {
        error!(stage = "api", error = %err, "request failed");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "Internal error",
        )
    }
}

impl From<ValidationErrors> for ProblemResponse {
    fn from(errors: ValidationErrors) -> Self {
        let mut problem = Self::new(StatusCode::BAD_REQUEST, "invalid_input", errors.to_string());
        problem.body.errors = errors.errors().to_vec();
        problem
    }
}

impl From<CatalogError> for ProblemResponse {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound => Self::not_found("Record"),
            CatalogError::Conflict => Self::new(
                StatusCode::CONFLICT,
                "conflict",
                "Record is still in use by other records",
            ),
            CatalogError::InvalidReference(what) => Self::new(
                StatusCode::BAD_REQUEST,
                "invalid_reference",
                format!("Unknown {what} for this store"),
            ),
            CatalogError::Database(err) => Self::internal(err),
        }
    }
}

impl From<OrderError> for ProblemResponse {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::NotFound => Self::not_found("Order"),
            OrderError::UnknownProduct => Self::new(
                StatusCode::BAD_REQUEST,
                "invalid_reference",
                "Unknown product for this store",
            ),
            OrderError::Database(err) => Self::internal(err),
        }
    }
}

impl IntoResponse for ProblemResponse {
    fn into_response(self) -> Response {
        let mut response = Json(self.body).into_response();
        *response.status_mut() = self.status;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/problem+json"),
        );
        response
    }
}
