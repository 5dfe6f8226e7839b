//! performances.rs
//!
//! Performance endpoints: a filtered list annotated with remaining seat
//! availability, a detail view exposing the already-taken seats of the hall
//! grid, and admin create/update/delete.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::controllers::page_window;
use crate::error::ApiError;
use crate::middleware::{AdminUser, AuthUser};
use crate::models::{Performance, TheatreHall};
use crate::services::reservations::{taken_seats, tickets_available};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/performances", get(list_performances).post(create_performance))
        .route(
            "/performances/{id}",
            get(get_performance)
                .put(update_performance)
                .delete(delete_performance),
        )
}

/* ---------- helpers ---------- */

async fn play_exists(pool: &sqlx::PgPool, play_id: i64) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM plays WHERE id = $1)")
        .bind(play_id)
        .fetch_one(pool)
        .await
}

async fn hall_exists(pool: &sqlx::PgPool, hall_id: i64) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM theatre_halls WHERE id = $1)")
        .bind(hall_id)
        .fetch_one(pool)
        .await
}

/* ---------- GET /api/performances ---------- */

#[derive(Debug, Deserialize)]
struct PerformancesQuery {
    date: Option<String>,
    play: Option<i64>,
    page: Option<u32>,
    #[serde(rename = "pageSize")]
    page_size: Option<u32>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
struct PerformanceListItem {
    id: i64,
    show_time: NaiveDateTime,
    play_title: String,
    theatre_hall_name: String,
    theatre_hall_capacity: i64,
    tickets_available: i64,
}

async fn list_performances(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Query(params): Query<PerformancesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (limit, offset) = page_window(params.page, params.page_size);

    let date = params
        .date
        .as_deref()
        .map(|raw| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|_| ApiError::BadRequest(format!("invalid date filter: {raw:?}")))
        })
        .transpose()?;

    let mut q = String::from(
        "SELECT p.id, p.show_time,
                pl.title AS play_title,
                h.name AS theatre_hall_name,
                h.rows::BIGINT * h.seats_in_row::BIGINT AS theatre_hall_capacity,
                h.rows::BIGINT * h.seats_in_row::BIGINT - COUNT(t.id) AS tickets_available
         FROM performances p
         JOIN plays pl ON pl.id = p.play_id
         JOIN theatre_halls h ON h.id = p.theatre_hall_id
         LEFT JOIN tickets t ON t.performance_id = p.id
         WHERE TRUE",
    );
    let mut bind_idx = 1;
    if date.is_some() {
        q.push_str(&format!(" AND p.show_time::date = ${bind_idx}"));
        bind_idx += 1;
    }
    if params.play.is_some() {
        q.push_str(&format!(" AND p.play_id = ${bind_idx}"));
        bind_idx += 1;
    }
    q.push_str(&format!(
        " GROUP BY p.id, p.show_time, pl.title, h.name, h.rows, h.seats_in_row
          ORDER BY p.id LIMIT ${bind_idx} OFFSET ${}",
        bind_idx + 1
    ));

    let mut dbq = sqlx::query_as::<_, PerformanceListItem>(&q);
    if let Some(date) = date {
        dbq = dbq.bind(date);
    }
    if let Some(play_id) = params.play {
        dbq = dbq.bind(play_id);
    }

    let performances = dbq
        .bind(limit)
        .bind(offset)
        .fetch_all(&state.db.pool)
        .await?;

    Ok(Json(performances))
}

/* ---------- GET /api/performances/{id} ---------- */

#[derive(Debug, Serialize)]
struct SeatRef {
    row: i32,
    seat: i32,
}

#[derive(Debug, Serialize)]
struct PlaySummary {
    id: i64,
    title: String,
}

#[derive(Debug, Serialize)]
struct HallSummary {
    id: i64,
    name: String,
    rows: i32,
    seats_in_row: i32,
    capacity: i64,
}

#[derive(Debug, Serialize)]
struct PerformanceDetail {
    id: i64,
    show_time: NaiveDateTime,
    play: PlaySummary,
    theatre_hall: HallSummary,
    taken_seats: Vec<SeatRef>,
    tickets_available: i64,
}

async fn get_performance(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    #[derive(sqlx::FromRow)]
    struct DetailRow {
        id: i64,
        show_time: NaiveDateTime,
        play_id: i64,
        play_title: String,
        hall_id: i64,
        hall_name: String,
        rows: i32,
        seats_in_row: i32,
    }

    let row = sqlx::query_as::<_, DetailRow>(
        "SELECT p.id, p.show_time, pl.id AS play_id, pl.title AS play_title,
                h.id AS hall_id, h.name AS hall_name, h.rows, h.seats_in_row
         FROM performances p
         JOIN plays pl ON pl.id = p.play_id
         JOIN theatre_halls h ON h.id = p.theatre_hall_id
         WHERE p.id = $1",
    )
    .bind(id)
    .fetch_optional(&state.db.pool)
    .await?
    .ok_or(ApiError::NotFound("performance"))?;

    let taken: Vec<SeatRef> = taken_seats(&state.db.pool, id)
        .await?
        .into_iter()
        .map(|(row, seat)| SeatRef { row, seat })
        .collect();

    let available = tickets_available(&state.db.pool, id).await?;

    let hall = TheatreHall {
        id: row.hall_id,
        name: row.hall_name,
        rows: row.rows,
        seats_in_row: row.seats_in_row,
    };

    Ok(Json(PerformanceDetail {
        id: row.id,
        show_time: row.show_time,
        play: PlaySummary {
            id: row.play_id,
            title: row.play_title,
        },
        theatre_hall: HallSummary {
            id: hall.id,
            capacity: hall.capacity(),
            rows: hall.rows,
            seats_in_row: hall.seats_in_row,
            name: hall.name,
        },
        taken_seats: taken,
        tickets_available: available,
    }))
}

/* ---------- POST /api/performances (admin) ---------- */

#[derive(Debug, Deserialize)]
struct WritePerformanceRequest {
    play_id: i64,
    theatre_hall_id: i64,
    show_time: NaiveDateTime,
}

async fn check_references(
    pool: &sqlx::PgPool,
    req: &WritePerformanceRequest,
) -> Result<(), ApiError> {
    if !play_exists(pool, req.play_id).await? {
        return Err(ApiError::NotFound("play"));
    }
    if !hall_exists(pool, req.theatre_hall_id).await? {
        return Err(ApiError::NotFound("theatre hall"));
    }
    Ok(())
}

async fn create_performance(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(req): Json<WritePerformanceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    check_references(&state.db.pool, &req).await?;

    let performance = sqlx::query_as::<_, Performance>(
        "INSERT INTO performances (play_id, theatre_hall_id, show_time)
         VALUES ($1, $2, $3)
         RETURNING *",
    )
    .bind(req.play_id)
    .bind(req.theatre_hall_id)
    .bind(req.show_time)
    .fetch_one(&state.db.pool)
    .await?;

    Ok((StatusCode::CREATED, Json(performance)))
}

/* ---------- PUT /api/performances/{id} (admin) ---------- */

async fn update_performance(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<i64>,
    Json(req): Json<WritePerformanceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    check_references(&state.db.pool, &req).await?;

    let performance = sqlx::query_as::<_, Performance>(
        "UPDATE performances
         SET play_id = $1, theatre_hall_id = $2, show_time = $3
         WHERE id = $4
         RETURNING *",
    )
    .bind(req.play_id)
    .bind(req.theatre_hall_id)
    .bind(req.show_time)
    .bind(id)
    .fetch_optional(&state.db.pool)
    .await?
    .ok_or(ApiError::NotFound("performance"))?;

    Ok(Json(performance))
}

/* ---------- DELETE /api/performances/{id} (admin) ---------- */

async fn delete_performance(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let result = sqlx::query("DELETE FROM performances WHERE id = $1")
        .bind(id)
        .execute(&state.db.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("performance"));
    }

    Ok(StatusCode::NO_CONTENT)
}
