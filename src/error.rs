//! error.rs
//!
//! The error taxonomy shared by every handler and the reservation service.
//! Validation failures map to 4xx responses; unexpected storage faults are
//! logged and surfaced as plain 500s.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("row {row}, seat {seat} is outside the hall grid ({rows} rows x {seats_in_row} seats)")]
    OutOfBounds {
        row: i32,
        seat: i32,
        rows: i32,
        seats_in_row: i32,
    },

    #[error("seat (row {row}, seat {seat}) is already taken for performance {performance_id}")]
    SeatTaken {
        performance_id: i64,
        row: i32,
        seat: i32,
    },

    #[error("a reservation must contain at least one ticket")]
    EmptyBatch,

    #[error("authentication required")]
    Unauthorized,

    #[error("admin privileges required")]
    Forbidden,

    #[error("{0}")]
    BadRequest(String),

    #[error("database error")]
    Database(#[from] sqlx::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::OutOfBounds { .. } => StatusCode::BAD_REQUEST,
            ApiError::SeatTaken { .. } => StatusCode::CONFLICT,
            ApiError::EmptyBatch => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = if let ApiError::Database(ref e) = self {
            tracing::error!("database error: {:?}", e);
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_map_to_4xx() {
        assert_eq!(
            ApiError::NotFound("performance").status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::OutOfBounds { row: 6, seat: 1, rows: 5, seats_in_row: 10 }.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::SeatTaken { performance_id: 1, row: 1, seat: 1 }.status(),
            StatusCode::CONFLICT
        );
        assert_eq!(ApiError::EmptyBatch.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn storage_faults_are_server_errors() {
        assert_eq!(
            ApiError::Database(sqlx::Error::RowNotFound).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn out_of_bounds_message_names_the_grid() {
        let err = ApiError::OutOfBounds { row: 6, seat: 1, rows: 5, seats_in_row: 10 };
        assert_eq!(
            err.to_string(),
            "row 6, seat 1 is outside the hall grid (5 rows x 10 seats)"
        );
    }
}
