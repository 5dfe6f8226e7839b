use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::controllers::page_window;
use crate::error::ApiError;
use crate::middleware::{AdminUser, AuthUser};
use crate::models::Genre;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/genres", get(list_genres).post(create_genre))
        .route("/genres/{id}", get(get_genre))
}

#[derive(Debug, Deserialize)]
struct GenresQuery {
    page: Option<u32>,
    #[serde(rename = "pageSize")]
    page_size: Option<u32>,
}

// GET /api/genres
async fn list_genres(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Query(params): Query<GenresQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (limit, offset) = page_window(params.page, params.page_size);

    let genres = sqlx::query_as::<_, Genre>(
        "SELECT * FROM genres ORDER BY id LIMIT $1 OFFSET $2",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.db.pool)
    .await?;

    Ok(Json(genres))
}

// GET /api/genres/{id}
async fn get_genre(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let genre = sqlx::query_as::<_, Genre>("SELECT * FROM genres WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db.pool)
        .await?
        .ok_or(ApiError::NotFound("genre"))?;

    Ok(Json(genre))
}

// POST /api/genres (admin)
#[derive(Debug, Deserialize, Validate)]
struct CreateGenreRequest {
    #[validate(length(min = 1, max = 65))]
    name: String,
}

async fn create_genre(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(req): Json<CreateGenreRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let genre = sqlx::query_as::<_, Genre>(
        "INSERT INTO genres (name) VALUES ($1) RETURNING *",
    )
    .bind(&req.name)
    .fetch_one(&state.db.pool)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            ApiError::BadRequest("a genre with this name already exists".to_string())
        }
        _ => ApiError::Database(e),
    })?;

    Ok((StatusCode::CREATED, Json(genre)))
}
