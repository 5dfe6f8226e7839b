use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TheatreHall {
    pub id: i64,
    pub name: String,
    pub rows: i32,
    pub seats_in_row: i32,
}

impl TheatreHall {
    // Derived, never stored
    pub fn capacity(&self) -> i64 {
        self.rows as i64 * self.seats_in_row as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_is_rows_times_seats() {
        let hall = TheatreHall {
            id: 1,
            name: "Main".to_string(),
            rows: 5,
            seats_in_row: 10,
        };
        assert_eq!(hall.capacity(), 50);
    }
}
