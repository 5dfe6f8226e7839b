//! users.rs
//!
//! Registration, token login and profile management. Login issues an opaque
//! token whose SHA-256 digest is stored in `auth_tokens`; the raw key is only
//! ever returned to the caller.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::error::ApiError;
use crate::middleware::{token_digest, AuthUser};
use crate::models::User;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/user/register", post(register))
        .route("/user/login", post(login))
        .route("/user/profile", get(profile).put(update_profile))
}

#[derive(Debug, Serialize)]
struct UserResponse {
    id: i64,
    email: String,
    first_name: String,
    last_name: String,
    is_staff: bool,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            is_staff: user.is_staff,
        }
    }
}

// POST /api/user/register
#[derive(Debug, Deserialize, Validate)]
struct RegisterRequest {
    #[validate(email)]
    email: String,
    #[validate(length(min = 5, message = "password must be at least 5 characters"))]
    password: String,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let password_hash = bcrypt::hash(&req.password, state.config.auth.bcrypt_cost)
        .map_err(|e| ApiError::BadRequest(format!("could not hash password: {e}")))?;

    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (email, password_hash, first_name, last_name)
         VALUES ($1, $2, $3, $4)
         RETURNING *",
    )
    .bind(&req.email)
    .bind(&password_hash)
    .bind(&req.first_name)
    .bind(&req.last_name)
    .fetch_one(&state.db.pool)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            ApiError::BadRequest("a user with this email already exists".to_string())
        }
        _ => ApiError::Database(e),
    })?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

// POST /api/user/login
#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    token: String,
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = User::find_by_email(&req.email, &state.db.pool)
        .await?
        .filter(|u| u.is_active && u.verify_password(&req.password))
        .ok_or(ApiError::Unauthorized)?;

    let token = Uuid::new_v4().simple().to_string();

    sqlx::query("INSERT INTO auth_tokens (token_digest, user_id) VALUES ($1, $2)")
        .bind(token_digest(&token))
        .bind(user.id)
        .execute(&state.db.pool)
        .await?;

    Ok((StatusCode::OK, Json(LoginResponse { token })))
}

// GET /api/user/profile
async fn profile(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(auth.user_id)
        .fetch_optional(&state.db.pool)
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    Ok(Json(UserResponse::from(user)))
}

// PUT /api/user/profile
#[derive(Debug, Deserialize, Validate)]
struct UpdateProfileRequest {
    #[validate(email)]
    email: Option<String>,
    #[validate(length(min = 5, message = "password must be at least 5 characters"))]
    password: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
}

async fn update_profile(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let password_hash = match &req.password {
        Some(password) => Some(
            bcrypt::hash(password, state.config.auth.bcrypt_cost)
                .map_err(|e| ApiError::BadRequest(format!("could not hash password: {e}")))?,
        ),
        None => None,
    };

    let user = sqlx::query_as::<_, User>(
        "UPDATE users
         SET email = COALESCE($1, email),
             password_hash = COALESCE($2, password_hash),
             first_name = COALESCE($3, first_name),
             last_name = COALESCE($4, last_name)
         WHERE id = $5
         RETURNING *",
    )
    .bind(&req.email)
    .bind(&password_hash)
    .bind(&req.first_name)
    .bind(&req.last_name)
    .bind(auth.user_id)
    .fetch_one(&state.db.pool)
    .await?;

    Ok(Json(UserResponse::from(user)))
}
