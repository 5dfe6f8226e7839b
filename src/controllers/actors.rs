use axum::{
    extract::{Path, Query, State},
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
use crate::models::Actor;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/actors", get(list_actors).post(create_actor))
        .route("/actors/{id}", get(get_actor))
}

#[derive(Debug, Deserialize)]
struct ActorsQuery {
    page: Option<u32>,
    #[serde(rename = "pageSize")]
    page_size: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ActorResponse {
    id: i64,
    first_name: String,
    last_name: String,
    full_name: String,
}

impl From<Actor> for ActorResponse {
    fn from(actor: Actor) -> Self {
        let full_name = actor.full_name();
        ActorResponse {
            id: actor.id,
            first_name: actor.first_name,
            last_name: actor.last_name,
            full_name,
        }
    }
}

// GET /api/actors
async fn list_actors(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Query(params): Query<ActorsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (limit, offset) = page_window(params.page, params.page_size);

    let actors = sqlx::query_as::<_, Actor>(
        "SELECT * FROM actors ORDER BY id LIMIT $1 OFFSET $2",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.db.pool)
    .await?;

    let payload: Vec<ActorResponse> = actors.into_iter().map(ActorResponse::from).collect();
    Ok(Json(payload))
}

// GET /api/actors/{id}
async fn get_actor(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = sqlx::query_as::<_, Actor>("SELECT * FROM actors WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db.pool)
        .await?
        .ok_or(ApiError::NotFound("actor"))?;

    Ok(Json(ActorResponse::from(actor)))
}

// POST /api/actors (admin)
#[derive(Debug, Deserialize, Validate)]
struct CreateActorRequest {
    #[validate(length(min = 1, max = 65))]
    first_name: String,
    #[validate(length(min = 1, max = 65))]
    last_name: String,
}

async fn create_actor(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(req): Json<CreateActorRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let actor = sqlx::query_as::<_, Actor>(
        "INSERT INTO actors (first_name, last_name) VALUES ($1, $2) RETURNING *",
    )
    .bind(&req.first_name)
    .bind(&req.last_name)
    .fetch_one(&state.db.pool)
    .await?;

    Ok((StatusCode::CREATED, Json(ActorResponse::from(actor))))
}
