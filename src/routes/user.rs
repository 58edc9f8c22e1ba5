use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::db::user::PgUserRepository;
use crate::domain::user::UserStatus;
use crate::usecases::queries::ListOnlineUsers;
use crate::usecases::{FindUserQuery, PresenceUpdate, UserRepository};

use super::auth::AuthService;
use super::utils::{bearer_token, status_for, validate_auth_token};

#[derive(Clone)]
pub struct UserState {
    pub service: Arc<AuthService>,
    pub users: Arc<PgUserRepository>,
    pub online: Arc<ListOnlineUsers>,
}

// Full profile of the authenticated user, wallet and items included
async fn get_user(
    headers: HeaderMap,
    State(state): State<UserState>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user_id = match validate_auth_token(&headers, &state.service) {
        Ok(val) => val,
        Err(err) => {
            tracing::error!("Token validation failed");
            return Err((err, "Invalid token".to_string()));
        }
    };

    match state.users.find_by(FindUserQuery::by_id(user_id)).await {
        Ok(Some(user)) => Ok((StatusCode::OK, Json(user))),
        Ok(None) => {
            tracing::error!("User not found: {}", user_id);
            Err((StatusCode::NOT_FOUND, "User not found".to_string()))
        }
        Err(err) => {
            tracing::error!("Failed to load user {user_id}: {err}");
            Err((status_for(&err), "Failed to load user".to_string()))
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Deposit {
    pub amount: Decimal,
}

#[derive(Debug, Serialize)]
struct DepositResponse {
    balance: Decimal,
}

async fn deposit(
    headers: HeaderMap,
    State(state): State<UserState>,
    Json(payload): Json<Deposit>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user_id = match validate_auth_token(&headers, &state.service) {
        Ok(val) => val,
        Err(err) => {
            return Err((err, "Invalid token".to_string()));
        }
    };

    match state.users.deposit(user_id, payload.amount).await {
        Ok(balance) => {
            tracing::info!(user = %user_id, balance = %balance, "wallet balance updated");
            Ok((StatusCode::OK, Json(DepositResponse { balance })))
        }
        Err(err) => {
            tracing::error!("Failed to update wallet balance: {err}");
            Err((status_for(&err), err.to_string()))
        }
    }
}

// All currently online users except the caller
async fn online_users(
    headers: HeaderMap,
    State(state): State<UserState>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let token = match bearer_token(&headers) {
        Ok(token) => token,
        Err(err) => return Err((err, "Invalid token".to_string())),
    };

    match state.online.exec(token).await {
        Ok(users) => Ok((StatusCode::OK, Json(users))),
        Err(err) => {
            tracing::error!("Failed to list online users: {err}");
            Err((status_for(&err), err.to_string()))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PresenceBody {
    pub status: UserStatus,
    pub socket_id: Option<String>,
}

async fn update_presence(
    headers: HeaderMap,
    State(state): State<UserState>,
    Json(payload): Json<PresenceBody>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user_id = match validate_auth_token(&headers, &state.service) {
        Ok(val) => val,
        Err(err) => {
            return Err((err, "Invalid token".to_string()));
        }
    };

    let update = PresenceUpdate {
        status: payload.status,
        socket_id: payload.socket_id,
    };
    match state.users.update_presence(update, user_id).await {
        Ok(()) => {
            tracing::info!(user = %user_id, status = %payload.status.as_str(), "presence updated");
            Ok((StatusCode::OK, "Presence updated"))
        }
        Err(err) => {
            tracing::error!("Failed to update presence: {err}");
            Err((status_for(&err), err.to_string()))
        }
    }
}

pub fn user_routes(state: UserState) -> Router {
    Router::new()
        .route("/users/me", get(get_user))
        .route("/users/deposit", post(deposit))
        .route("/users/online", get(online_users))
        .route("/users/presence", put(update_presence))
        .with_state(state)
}
