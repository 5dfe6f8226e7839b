use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::error::ApiError;

// Authenticated caller, resolved from an `Authorization: Token <key>` header.
// Read endpoints require this; write endpoints additionally require AdminUser.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    pub email: String,
    pub is_staff: bool,
}

#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

#[derive(sqlx::FromRow)]
struct TokenRow {
    user_id: i64,
    email: String,
    is_staff: bool,
}

// Tokens are stored as SHA-256 digests so a leaked table does not leak keys
pub fn token_digest(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl FromRequestParts<Arc<crate::AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<crate::AppState>,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        let key = auth_header
            .strip_prefix("Token ")
            .ok_or(ApiError::Unauthorized)?
            .trim();

        if key.is_empty() {
            return Err(ApiError::Unauthorized);
        }

        let row: Option<TokenRow> = sqlx::query_as(
            "SELECT u.id AS user_id, u.email, u.is_staff
             FROM auth_tokens t
             JOIN users u ON u.id = t.user_id
             WHERE t.token_digest = $1 AND u.is_active = true",
        )
        .bind(token_digest(key))
        .fetch_optional(&state.db.pool)
        .await?;

        let row = row.ok_or(ApiError::Unauthorized)?;

        Ok(AuthUser {
            user_id: row.user_id,
            email: row.email,
            is_staff: row.is_staff,
        })
    }
}

impl FromRequestParts<Arc<crate::AppState>> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<crate::AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_staff {
            return Err(ApiError::Forbidden);
        }
        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_digest_is_stable_hex() {
        let a = token_digest("some-opaque-key");
        let b = token_digest("some-opaque-key");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn different_keys_get_different_digests() {
        assert_ne!(token_digest("key-one"), token_digest("key-two"));
    }
}
