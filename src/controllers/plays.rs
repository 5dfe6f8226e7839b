//! plays.rs
//!
//! Catalog endpoints for plays: filtered listing, detail with nested actors and
//! genres, admin creation with its many-to-many sets, and image upload.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::controllers::{page_window, parse_id_list};
use crate::error::ApiError;
use crate::middleware::{AdminUser, AuthUser};
use crate::models::{Actor, Genre, Play};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/plays", get(list_plays).post(create_play))
        .route("/plays/{id}", get(get_play))
        .route("/plays/{id}/upload-image", post(upload_image))
}

/* ---------- helpers ---------- */

async fn play_exists(pool: &sqlx::PgPool, play_id: i64) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM plays WHERE id = $1)")
        .bind(play_id)
        .fetch_one(pool)
        .await
}

// Genre names and actor full names per play, for the list view
async fn related_names(
    pool: &sqlx::PgPool,
    play_ids: &[i64],
) -> Result<(BTreeMap<i64, Vec<String>>, BTreeMap<i64, Vec<String>>), ApiError> {
    let genre_rows = sqlx::query(
        "SELECT pg.play_id, g.name
         FROM play_genres pg
         JOIN genres g ON g.id = pg.genre_id
         WHERE pg.play_id = ANY($1)
         ORDER BY g.name",
    )
    .bind(play_ids)
    .fetch_all(pool)
    .await?;

    let actor_rows = sqlx::query(
        "SELECT pa.play_id, a.first_name || ' ' || a.last_name AS full_name
         FROM play_actors pa
         JOIN actors a ON a.id = pa.actor_id
         WHERE pa.play_id = ANY($1)
         ORDER BY a.last_name, a.first_name",
    )
    .bind(play_ids)
    .fetch_all(pool)
    .await?;

    let mut genres: BTreeMap<i64, Vec<String>> = BTreeMap::new();
    for row in genre_rows {
        genres
            .entry(row.get("play_id"))
            .or_default()
            .push(row.get("name"));
    }

    let mut actors: BTreeMap<i64, Vec<String>> = BTreeMap::new();
    for row in actor_rows {
        actors
            .entry(row.get("play_id"))
            .or_default()
            .push(row.get("full_name"));
    }

    Ok((genres, actors))
}

/* ---------- GET /api/plays ---------- */

#[derive(Debug, Deserialize)]
struct PlaysQuery {
    title: Option<String>,
    genres: Option<String>,
    actors: Option<String>,
    page: Option<u32>,
    #[serde(rename = "pageSize")]
    page_size: Option<u32>,
}

#[derive(Debug, Serialize)]
struct PlayListItem {
    id: i64,
    title: String,
    genres: Vec<String>,
    actors: Vec<String>,
}

async fn list_plays(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Query(params): Query<PlaysQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (limit, offset) = page_window(params.page, params.page_size);

    let genre_ids = params.genres.as_deref().map(parse_id_list).transpose()?;
    let actor_ids = params.actors.as_deref().map(parse_id_list).transpose()?;

    let mut q = String::from("SELECT * FROM plays p WHERE TRUE");
    let mut bind_idx = 1;
    if params.title.is_some() {
        q.push_str(&format!(" AND p.title ILIKE ${bind_idx}"));
        bind_idx += 1;
    }
    if genre_ids.is_some() {
        q.push_str(&format!(
            " AND EXISTS(SELECT 1 FROM play_genres pg WHERE pg.play_id = p.id AND pg.genre_id = ANY(${bind_idx}))"
        ));
        bind_idx += 1;
    }
    if actor_ids.is_some() {
        q.push_str(&format!(
            " AND EXISTS(SELECT 1 FROM play_actors pa WHERE pa.play_id = p.id AND pa.actor_id = ANY(${bind_idx}))"
        ));
        bind_idx += 1;
    }
    q.push_str(&format!(
        " ORDER BY p.title LIMIT ${bind_idx} OFFSET ${}",
        bind_idx + 1
    ));

    let mut dbq = sqlx::query_as::<_, Play>(&q);
    if let Some(title) = &params.title {
        dbq = dbq.bind(format!("%{title}%"));
    }
    if let Some(ids) = &genre_ids {
        dbq = dbq.bind(ids);
    }
    if let Some(ids) = &actor_ids {
        dbq = dbq.bind(ids);
    }

    let plays = dbq
        .bind(limit)
        .bind(offset)
        .fetch_all(&state.db.pool)
        .await?;

    let play_ids: Vec<i64> = plays.iter().map(|p| p.id).collect();
    let (mut genres, mut actors) = related_names(&state.db.pool, &play_ids).await?;

    let payload: Vec<PlayListItem> = plays
        .into_iter()
        .map(|play| PlayListItem {
            genres: genres.remove(&play.id).unwrap_or_default(),
            actors: actors.remove(&play.id).unwrap_or_default(),
            id: play.id,
            title: play.title,
        })
        .collect();

    Ok(Json(payload))
}

/* ---------- GET /api/plays/{id} ---------- */

#[derive(Debug, Serialize)]
struct PlayDetail {
    id: i64,
    title: String,
    description: String,
    actors: Vec<Actor>,
    genres: Vec<Genre>,
    image: Option<String>,
}

async fn get_play(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let play = sqlx::query_as::<_, Play>("SELECT * FROM plays WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db.pool)
        .await?
        .ok_or(ApiError::NotFound("play"))?;

    let actors = sqlx::query_as::<_, Actor>(
        "SELECT a.* FROM actors a
         JOIN play_actors pa ON pa.actor_id = a.id
         WHERE pa.play_id = $1
         ORDER BY a.last_name, a.first_name",
    )
    .bind(id)
    .fetch_all(&state.db.pool)
    .await?;

    let genres = sqlx::query_as::<_, Genre>(
        "SELECT g.* FROM genres g
         JOIN play_genres pg ON pg.genre_id = g.id
         WHERE pg.play_id = $1
         ORDER BY g.name",
    )
    .bind(id)
    .fetch_all(&state.db.pool)
    .await?;

    Ok(Json(PlayDetail {
        id: play.id,
        title: play.title,
        description: play.description,
        actors,
        genres,
        image: play.image,
    }))
}

/* ---------- POST /api/plays (admin) ---------- */

#[derive(Debug, Deserialize, Validate)]
struct CreatePlayRequest {
    #[validate(length(min = 1, max = 65))]
    title: String,
    #[validate(length(max = 255))]
    #[serde(default)]
    description: String,
    #[serde(default)]
    actor_ids: Vec<i64>,
    #[serde(default)]
    genre_ids: Vec<i64>,
}

async fn create_play(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(req): Json<CreatePlayRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let mut tx = state.db.pool.begin().await?;

    let play = sqlx::query_as::<_, Play>(
        "INSERT INTO plays (title, description) VALUES ($1, $2) RETURNING *",
    )
    .bind(&req.title)
    .bind(&req.description)
    .fetch_one(&mut *tx)
    .await?;

    for actor_id in &req.actor_ids {
        sqlx::query("INSERT INTO play_actors (play_id, actor_id) VALUES ($1, $2)")
            .bind(play.id)
            .bind(actor_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| fk_to_not_found(e, "actor"))?;
    }

    for genre_id in &req.genre_ids {
        sqlx::query("INSERT INTO play_genres (play_id, genre_id) VALUES ($1, $2)")
            .bind(play.id)
            .bind(genre_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| fk_to_not_found(e, "genre"))?;
    }

    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(play)))
}

fn fk_to_not_found(e: sqlx::Error, entity: &'static str) -> ApiError {
    if let sqlx::Error::Database(ref db) = e {
        if db.is_foreign_key_violation() {
            return ApiError::NotFound(entity);
        }
    }
    ApiError::Database(e)
}

/* ---------- POST /api/plays/{id}/upload-image (admin) ---------- */

#[derive(Debug, Serialize)]
struct UploadImageResponse {
    id: i64,
    image: String,
}

async fn upload_image(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<i64>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    if !play_exists(&state.db.pool, id).await? {
        return Err(ApiError::NotFound("play"));
    }

    let mut stored: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("invalid multipart body: {e}")))?
    {
        if field.name() != Some("image") {
            continue;
        }

        let extension = field
            .file_name()
            .and_then(|name| name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()))
            .unwrap_or_else(|| "bin".to_string());

        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("could not read image: {e}")))?;

        if data.is_empty() {
            return Err(ApiError::BadRequest("image file is empty".to_string()));
        }

        let file_name = format!("play-{id}-{}.{extension}", Uuid::new_v4().simple());
        let media_root = std::path::Path::new(&state.config.media.root);

        tokio::fs::create_dir_all(media_root).await.map_err(|e| {
            tracing::error!("could not create media root: {:?}", e);
            ApiError::BadRequest("could not store image".to_string())
        })?;
        tokio::fs::write(media_root.join(&file_name), &data)
            .await
            .map_err(|e| {
                tracing::error!("could not write image file: {:?}", e);
                ApiError::BadRequest("could not store image".to_string())
            })?;

        stored = Some(file_name);
        break;
    }

    let file_name = stored.ok_or_else(|| {
        ApiError::BadRequest("multipart field \"image\" is required".to_string())
    })?;

    sqlx::query("UPDATE plays SET image = $1 WHERE id = $2")
        .bind(&file_name)
        .bind(id)
        .execute(&state.db.pool)
        .await?;

    Ok((StatusCode::OK, Json(UploadImageResponse { id, image: file_name })))
}
