pub mod actors;
pub mod genres;
pub mod halls;
pub mod performances;
pub mod plays;
pub mod reservations;
pub mod users;

use axum::Router;
use std::sync::Arc;

use crate::error::ApiError;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(users::routes())
        .merge(plays::routes())
        .merge(halls::routes())
        .merge(actors::routes())
        .merge(genres::routes())
        .merge(performances::routes())
        .merge(reservations::routes())
}

/* ---------- helpers shared by list endpoints ---------- */

// page/pageSize query params -> LIMIT/OFFSET
pub(crate) fn page_window(page: Option<u32>, page_size: Option<u32>) -> (i64, i64) {
    let page = page.unwrap_or(1).max(1) as i64;
    let page_size = page_size.unwrap_or(20).clamp(1, 50) as i64;
    (page_size, (page - 1) * page_size)
}

// Comma-separated id list ("1,2,3") from a filter query param
pub(crate) fn parse_id_list(raw: &str) -> Result<Vec<i64>, ApiError> {
    raw.split(',')
        .map(|part| {
            part.trim()
                .parse::<i64>()
                .map_err(|_| ApiError::BadRequest(format!("invalid id in filter: {part:?}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_window_defaults() {
        assert_eq!(page_window(None, None), (20, 0));
    }

    #[test]
    fn page_window_clamps_size_and_page() {
        assert_eq!(page_window(Some(0), Some(0)), (1, 0));
        assert_eq!(page_window(Some(3), Some(10)), (10, 20));
        assert_eq!(page_window(Some(1), Some(500)), (50, 0));
    }

    #[test]
    fn page_window_handles_huge_page_numbers() {
        // offset math must not wrap in u32
        let (limit, offset) = page_window(Some(u32::MAX), Some(50));
        assert_eq!(limit, 50);
        assert_eq!(offset, (u32::MAX as i64 - 1) * 50);
    }

    #[test]
    fn id_list_parses_and_trims() {
        assert_eq!(parse_id_list("1,2, 3").unwrap(), vec![1, 2, 3]);
        assert!(parse_id_list("1,x").is_err());
    }
}
