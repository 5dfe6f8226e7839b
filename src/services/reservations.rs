//! reservations.rs
//!
//! Validation and persistence of ticket batches. A reservation bundles one or
//! more tickets and is written in a single transaction: every ticket is checked
//! against its performance's seating grid and the seats already sold, and any
//! failure rolls back the whole batch.
//!
//! The pre-checks here are an optimization; the unique constraint on
//! (performance_id, "row", seat) in the tickets table is the final word on
//! races between concurrent bookings.

use serde::Deserialize;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::{HashMap, HashSet};
use tracing::info;

use crate::error::ApiError;
use crate::models::{Reservation, Ticket};

#[derive(Debug, Clone, Deserialize)]
pub struct TicketRequest {
    pub row: i32,
    pub seat: i32,
    pub performance_id: i64,
}

// The row/seat dimensions of the hall a performance plays in
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct SeatGrid {
    pub rows: i32,
    pub seats_in_row: i32,
}

#[derive(Debug)]
pub struct CreatedReservation {
    pub reservation: Reservation,
    pub tickets: Vec<Ticket>,
}

/// Checks a single (row, seat) pair against the hall grid.
fn validate_seat(grid: SeatGrid, row: i32, seat: i32) -> Result<(), ApiError> {
    if row < 1 || row > grid.rows || seat < 1 || seat > grid.seats_in_row {
        return Err(ApiError::OutOfBounds {
            row,
            seat,
            rows: grid.rows,
            seats_in_row: grid.seats_in_row,
        });
    }
    Ok(())
}

/// Validates a batch in list order, fail-fast: bounds first, then collision
/// with already-sold seats. Accepted requests are added to the taken sets, so a
/// duplicate seat within the same batch is rejected as `SeatTaken` too.
fn validate_requests(
    requests: &[TicketRequest],
    grids: &HashMap<i64, SeatGrid>,
    taken: &mut HashMap<i64, HashSet<(i32, i32)>>,
) -> Result<(), ApiError> {
    for request in requests {
        let grid = grids
            .get(&request.performance_id)
            .copied()
            .ok_or(ApiError::NotFound("performance"))?;

        validate_seat(grid, request.row, request.seat)?;

        let seats = taken.entry(request.performance_id).or_default();
        if !seats.insert((request.row, request.seat)) {
            return Err(ApiError::SeatTaken {
                performance_id: request.performance_id,
                row: request.row,
                seat: request.seat,
            });
        }
    }
    Ok(())
}

async fn seat_grid(
    tx: &mut Transaction<'_, Postgres>,
    performance_id: i64,
) -> Result<SeatGrid, ApiError> {
    sqlx::query_as::<_, SeatGrid>(
        "SELECT h.rows, h.seats_in_row
         FROM performances p
         JOIN theatre_halls h ON h.id = p.theatre_hall_id
         WHERE p.id = $1",
    )
    .bind(performance_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(ApiError::NotFound("performance"))
}

fn map_ticket_insert_error(e: sqlx::Error, request: &TicketRequest) -> ApiError {
    // A concurrent booking committed first; the constraint violation is the
    // same rejection as the pre-check.
    if let sqlx::Error::Database(ref db) = e {
        if db.is_unique_violation() {
            return ApiError::SeatTaken {
                performance_id: request.performance_id,
                row: request.row,
                seat: request.seat,
            };
        }
    }
    ApiError::Database(e)
}

/// Creates a reservation owning one ticket per request, all inside one
/// transaction. Any validation or insert failure leaves no rows behind.
pub async fn create_reservation(
    pool: &PgPool,
    user_id: i64,
    requests: &[TicketRequest],
) -> Result<CreatedReservation, ApiError> {
    if requests.is_empty() {
        return Err(ApiError::EmptyBatch);
    }

    let mut tx = pool.begin().await?;

    let mut grids: HashMap<i64, SeatGrid> = HashMap::new();
    let mut taken: HashMap<i64, HashSet<(i32, i32)>> = HashMap::new();

    for request in requests {
        if grids.contains_key(&request.performance_id) {
            continue;
        }
        let grid = seat_grid(&mut tx, request.performance_id).await?;
        let seats = sqlx::query_as::<_, (i32, i32)>(
            r#"SELECT "row", seat FROM tickets WHERE performance_id = $1"#,
        )
        .bind(request.performance_id)
        .fetch_all(&mut *tx)
        .await?;

        grids.insert(request.performance_id, grid);
        taken.insert(request.performance_id, seats.into_iter().collect());
    }

    validate_requests(requests, &grids, &mut taken)?;

    let reservation = sqlx::query_as::<_, Reservation>(
        "INSERT INTO reservations (user_id) VALUES ($1)
         RETURNING id, user_id, created_at",
    )
    .bind(user_id)
    .fetch_one(&mut *tx)
    .await?;

    let mut tickets = Vec::with_capacity(requests.len());
    for request in requests {
        let ticket = sqlx::query_as::<_, Ticket>(
            r#"INSERT INTO tickets ("row", seat, performance_id, reservation_id)
               VALUES ($1, $2, $3, $4)
               RETURNING id, "row", seat, performance_id, reservation_id"#,
        )
        .bind(request.row)
        .bind(request.seat)
        .bind(request.performance_id)
        .bind(reservation.id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_ticket_insert_error(e, request))?;

        tickets.push(ticket);
    }

    tx.commit().await?;

    info!(
        "reservation {} created for user {} with {} ticket(s)",
        reservation.id,
        user_id,
        tickets.len()
    );

    Ok(CreatedReservation { reservation, tickets })
}

/// Seats already sold for a performance, ordered by row then seat. Duplicate
/// pairs cannot occur by the schema constraint.
pub async fn taken_seats(
    pool: &PgPool,
    performance_id: i64,
) -> Result<Vec<(i32, i32)>, ApiError> {
    let seats = sqlx::query_as::<_, (i32, i32)>(
        r#"SELECT "row", seat FROM tickets
           WHERE performance_id = $1
           ORDER BY "row", seat"#,
    )
    .bind(performance_id)
    .fetch_all(pool)
    .await?;

    Ok(seats)
}

/// Remaining free seats: hall capacity minus sold tickets.
pub async fn tickets_available(pool: &PgPool, performance_id: i64) -> Result<i64, ApiError> {
    sqlx::query_scalar::<_, i64>(
        "SELECT h.rows::BIGINT * h.seats_in_row::BIGINT - COUNT(t.id)
         FROM performances p
         JOIN theatre_halls h ON h.id = p.theatre_hall_id
         LEFT JOIN tickets t ON t.performance_id = p.id
         WHERE p.id = $1
         GROUP BY h.rows, h.seats_in_row",
    )
    .bind(performance_id)
    .fetch_optional(pool)
    .await?
    .ok_or(ApiError::NotFound("performance"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn grid(rows: i32, seats_in_row: i32) -> SeatGrid {
        SeatGrid { rows, seats_in_row }
    }

    fn request(performance_id: i64, row: i32, seat: i32) -> TicketRequest {
        TicketRequest { row, seat, performance_id }
    }

    fn one_grid(performance_id: i64, g: SeatGrid) -> HashMap<i64, SeatGrid> {
        HashMap::from([(performance_id, g)])
    }

    #[test]
    fn seat_within_grid_is_accepted() {
        assert!(validate_seat(grid(5, 10), 1, 1).is_ok());
        assert!(validate_seat(grid(5, 10), 5, 10).is_ok());
    }

    #[test]
    fn row_past_grid_is_out_of_bounds() {
        // 5x10 hall, row 6 does not exist
        let err = validate_seat(grid(5, 10), 6, 1).unwrap_err();
        assert!(matches!(err, ApiError::OutOfBounds { row: 6, seat: 1, .. }));
    }

    #[test]
    fn zero_and_negative_coordinates_are_out_of_bounds() {
        assert!(matches!(
            validate_seat(grid(5, 10), 0, 1),
            Err(ApiError::OutOfBounds { .. })
        ));
        assert!(matches!(
            validate_seat(grid(5, 10), 1, 0),
            Err(ApiError::OutOfBounds { .. })
        ));
        assert!(matches!(
            validate_seat(grid(5, 10), -3, 4),
            Err(ApiError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn single_seat_hall_rejects_second_booking() {
        let grids = one_grid(1, grid(1, 1));
        let mut taken = HashMap::new();

        assert!(validate_requests(&[request(1, 1, 1)], &grids, &mut taken).is_ok());

        // Same seat again, now present in the taken set
        let err = validate_requests(&[request(1, 1, 1)], &grids, &mut taken).unwrap_err();
        assert!(matches!(
            err,
            ApiError::SeatTaken { performance_id: 1, row: 1, seat: 1 }
        ));
    }

    #[test]
    fn duplicate_seat_within_one_batch_is_rejected() {
        let grids = one_grid(7, grid(5, 10));
        let mut taken = HashMap::new();

        let batch = [request(7, 2, 3), request(7, 2, 3)];
        let err = validate_requests(&batch, &grids, &mut taken).unwrap_err();
        assert!(matches!(err, ApiError::SeatTaken { row: 2, seat: 3, .. }));
    }

    #[test]
    fn batch_fails_fast_on_second_taken_ticket() {
        let grids = one_grid(1, grid(5, 10));
        let mut taken: HashMap<i64, HashSet<(i32, i32)>> =
            HashMap::from([(1, HashSet::from([(2, 2)]))]);

        let batch = [request(1, 1, 1), request(1, 2, 2), request(1, 3, 3)];
        let err = validate_requests(&batch, &grids, &mut taken).unwrap_err();
        assert!(matches!(err, ApiError::SeatTaken { row: 2, seat: 2, .. }));
    }

    #[test]
    fn bounds_are_checked_before_taken_seats() {
        // (6, 1) is both out of bounds and "taken"; bounds wins
        let grids = one_grid(1, grid(5, 10));
        let mut taken: HashMap<i64, HashSet<(i32, i32)>> =
            HashMap::from([(1, HashSet::from([(6, 1)]))]);

        let err = validate_requests(&[request(1, 6, 1)], &grids, &mut taken).unwrap_err();
        assert!(matches!(err, ApiError::OutOfBounds { .. }));
    }

    #[test]
    fn unknown_performance_in_batch_is_not_found() {
        let grids = one_grid(1, grid(5, 10));
        let mut taken = HashMap::new();

        let err = validate_requests(&[request(99, 1, 1)], &grids, &mut taken).unwrap_err();
        assert!(matches!(err, ApiError::NotFound("performance")));
    }

    #[test]
    fn batch_across_two_performances_tracks_seats_independently() {
        let mut grids = one_grid(1, grid(5, 10));
        grids.insert(2, grid(5, 10));
        let mut taken = HashMap::new();

        // Same (row, seat) on different performances is fine
        let batch = [request(1, 1, 1), request(2, 1, 1)];
        assert!(validate_requests(&batch, &grids, &mut taken).is_ok());
    }

    proptest! {
        #[test]
        fn any_coordinate_outside_the_grid_is_rejected(
            rows in 1i32..=50,
            seats_in_row in 1i32..=50,
            row in -100i32..=150,
            seat in -100i32..=150,
        ) {
            prop_assume!(row < 1 || row > rows || seat < 1 || seat > seats_in_row);

            let result = validate_seat(grid(rows, seats_in_row), row, seat);
            let rejected = matches!(result, Err(ApiError::OutOfBounds { .. }));
            prop_assert!(rejected, "expected OutOfBounds for row {} seat {}", row, seat);
        }

        #[test]
        fn any_coordinate_inside_the_grid_is_accepted(
            rows in 1i32..=50,
            seats_in_row in 1i32..=50,
        ) {
            // Every addressable seat of the grid validates
            let g = grid(rows, seats_in_row);
            prop_assert!(validate_seat(g, 1, 1).is_ok());
            prop_assert!(validate_seat(g, rows, seats_in_row).is_ok());
        }
    }
}
