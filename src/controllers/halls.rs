use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::controllers::page_window;
use crate::error::ApiError;
use crate::middleware::{AdminUser, AuthUser};
use crate::models::TheatreHall;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/theatre_halls", get(list_halls).post(create_hall))
}

#[derive(Debug, Deserialize)]
struct HallsQuery {
    page: Option<u32>,
    #[serde(rename = "pageSize")]
    page_size: Option<u32>,
}

#[derive(Debug, Serialize)]
struct HallResponse {
    id: i64,
    name: String,
    rows: i32,
    seats_in_row: i32,
    capacity: i64,
}

impl From<TheatreHall> for HallResponse {
    fn from(hall: TheatreHall) -> Self {
        let capacity = hall.capacity();
        HallResponse {
            id: hall.id,
            name: hall.name,
            rows: hall.rows,
            seats_in_row: hall.seats_in_row,
            capacity,
        }
    }
}

// GET /api/theatre_halls
async fn list_halls(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Query(params): Query<HallsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (limit, offset) = page_window(params.page, params.page_size);

    let halls = sqlx::query_as::<_, TheatreHall>(
        "SELECT * FROM theatre_halls ORDER BY id LIMIT $1 OFFSET $2",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.db.pool)
    .await?;

    let payload: Vec<HallResponse> = halls.into_iter().map(HallResponse::from).collect();
    Ok(Json(payload))
}

// POST /api/theatre_halls (admin)
#[derive(Debug, Deserialize, Validate)]
struct CreateHallRequest {
    #[validate(length(min = 1, max = 65))]
    name: String,
    #[validate(range(min = 1))]
    rows: i32,
    #[validate(range(min = 1))]
    seats_in_row: i32,
}

async fn create_hall(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(req): Json<CreateHallRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let hall = sqlx::query_as::<_, TheatreHall>(
        "INSERT INTO theatre_halls (name, rows, seats_in_row)
         VALUES ($1, $2, $3)
         RETURNING *",
    )
    .bind(&req.name)
    .bind(req.rows)
    .bind(req.seats_in_row)
    .fetch_one(&state.db.pool)
    .await?;

    Ok((StatusCode::CREATED, Json(HallResponse::from(hall))))
}
