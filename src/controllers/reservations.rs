//! reservations.rs
//!
//! Owner-scoped reservation endpoints. Creation delegates to the reservation
//! service, which validates the whole ticket batch and writes it in one
//! transaction. A reservation belonging to another user reads as 404.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::Row;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::controllers::page_window;
use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::services::reservations::{create_reservation, TicketRequest};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/reservations", get(list_reservations).post(create))
        .route("/reservations/{id}", get(get_reservation).delete(delete_reservation))
}

#[derive(Debug, Serialize)]
struct TicketResponse {
    id: i64,
    row: i32,
    seat: i32,
    performance_id: i64,
}

#[derive(Debug, Serialize)]
struct ReservationResponse {
    id: i64,
    created_at: NaiveDateTime,
    tickets: Vec<TicketResponse>,
}

/* ---------- POST /api/reservations ---------- */

#[derive(Debug, Deserialize)]
struct CreateReservationRequest {
    tickets: Vec<TicketRequest>,
}

async fn create(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateReservationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let created = create_reservation(&state.db.pool, user.user_id, &req.tickets).await?;

    let response = ReservationResponse {
        id: created.reservation.id,
        created_at: created.reservation.created_at,
        tickets: created
            .tickets
            .into_iter()
            .map(|t| TicketResponse {
                id: t.id,
                row: t.row,
                seat: t.seat,
                performance_id: t.performance_id,
            })
            .collect(),
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/* ---------- GET /api/reservations ---------- */

#[derive(Debug, Deserialize)]
struct ReservationsQuery {
    page: Option<u32>,
    #[serde(rename = "pageSize")]
    page_size: Option<u32>,
}

async fn list_reservations(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(params): Query<ReservationsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (limit, offset) = page_window(params.page, params.page_size);

    let rows = sqlx::query(
        r#"
        SELECT r.id AS rid, r.created_at,
               t.id AS tid, t."row", t.seat, t.performance_id
        FROM (
            SELECT id, created_at FROM reservations
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
        ) r
        LEFT JOIN tickets t ON t.reservation_id = r.id
        ORDER BY r.created_at DESC, r.id DESC, t.id
        "#,
    )
    .bind(user.user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.db.pool)
    .await?;

    // Group ticket rows under their reservation, preserving query order
    let mut order: Vec<i64> = Vec::new();
    let mut map: BTreeMap<i64, ReservationResponse> = BTreeMap::new();
    for row in rows {
        let rid: i64 = row.get("rid");
        let entry = map.entry(rid).or_insert_with(|| {
            order.push(rid);
            ReservationResponse {
                id: rid,
                created_at: row.get("created_at"),
                tickets: Vec::new(),
            }
        });
        if let Ok(tid) = row.try_get::<i64, _>("tid") {
            entry.tickets.push(TicketResponse {
                id: tid,
                row: row.get("row"),
                seat: row.get("seat"),
                performance_id: row.get("performance_id"),
            });
        }
    }

    let payload: Vec<ReservationResponse> = order
        .into_iter()
        .filter_map(|rid| map.remove(&rid))
        .collect();

    Ok(Json(payload))
}

/* ---------- GET /api/reservations/{id} ---------- */

async fn get_reservation(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let reservation = sqlx::query(
        "SELECT id, created_at FROM reservations WHERE id = $1 AND user_id = $2",
    )
    .bind(id)
    .bind(user.user_id)
    .fetch_optional(&state.db.pool)
    .await?
    .ok_or(ApiError::NotFound("reservation"))?;

    let tickets = sqlx::query_as::<_, (i64, i32, i32, i64)>(
        r#"SELECT id, "row", seat, performance_id
           FROM tickets WHERE reservation_id = $1 ORDER BY id"#,
    )
    .bind(id)
    .fetch_all(&state.db.pool)
    .await?;

    Ok(Json(ReservationResponse {
        id: reservation.get("id"),
        created_at: reservation.get("created_at"),
        tickets: tickets
            .into_iter()
            .map(|(id, row, seat, performance_id)| TicketResponse {
                id,
                row,
                seat,
                performance_id,
            })
            .collect(),
    }))
}

/* ---------- DELETE /api/reservations/{id} ---------- */

// Tickets go with the reservation (ON DELETE CASCADE), freeing the seats
async fn delete_reservation(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let result = sqlx::query("DELETE FROM reservations WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user.user_id)
        .execute(&state.db.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("reservation"));
    }

    Ok(StatusCode::NO_CONTENT)
}
