use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::announcement::PgAnnouncementRepository;
use crate::db::user::PgUserRepository;
use crate::usecases::{FindUserQuery, UserRepository};

use super::auth::AuthService;
use super::utils::{status_for, validate_auth_token};

#[derive(Clone)]
pub struct AnnouncementState {
    pub service: Arc<AuthService>,
    pub announcements: Arc<PgAnnouncementRepository>,
    pub users: Arc<PgUserRepository>,
}

#[derive(Debug, Deserialize)]
pub struct PostAnnouncement {
    pub item_id: Uuid,
    pub value_per_item: Decimal,
    pub quantity_available: i32,
}

#[derive(Debug, Serialize)]
struct Created {
    id: Uuid,
}

async fn post_announcement(
    headers: HeaderMap,
    State(state): State<AnnouncementState>,
    Json(payload): Json<PostAnnouncement>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let owner_id = match validate_auth_token(&headers, &state.service) {
        Ok(val) => val,
        Err(err) => {
            return Err((err, "Invalid token".to_string()));
        }
    };

    match state
        .announcements
        .create(
            owner_id,
            payload.item_id,
            payload.value_per_item,
            payload.quantity_available,
        )
        .await
    {
        Ok(id) => Ok((StatusCode::CREATED, Json(Created { id }))),
        Err(err) => {
            tracing::error!("Failed to post announcement: {err}");
            Err((status_for(&err), err.to_string()))
        }
    }
}

async fn list_announcements(
    headers: HeaderMap,
    State(state): State<AnnouncementState>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if let Err(err) = validate_auth_token(&headers, &state.service) {
        return Err((err, "Invalid token".to_string()));
    }

    match state.announcements.list_open().await {
        Ok(list) => Ok((StatusCode::OK, Json(list))),
        Err(err) => {
            tracing::error!("Failed to list announcements: {err}");
            Err((status_for(&err), err.to_string()))
        }
    }
}

// catalog management is restricted to admins
async fn require_admin(
    headers: &HeaderMap,
    state: &AnnouncementState,
) -> Result<Uuid, (StatusCode, String)> {
    let user_id = match validate_auth_token(headers, &state.service) {
        Ok(val) => val,
        Err(err) => return Err((err, "Invalid token".to_string())),
    };

    match state.users.find_by(FindUserQuery::by_id(user_id)).await {
        Ok(Some(user)) if user.is_admin() => Ok(user_id),
        Ok(Some(_)) => {
            tracing::warn!(user = %user_id, "non-admin attempted catalog management");
            Err((StatusCode::FORBIDDEN, "Admin role required".to_string()))
        }
        Ok(None) => Err((StatusCode::NOT_FOUND, "User not found".to_string())),
        Err(err) => Err((status_for(&err), err.to_string())),
    }
}

async fn list_items(
    headers: HeaderMap,
    State(state): State<AnnouncementState>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if let Err(err) = validate_auth_token(&headers, &state.service) {
        return Err((err, "Invalid token".to_string()));
    }

    match state.announcements.list_items().await {
        Ok(items) => Ok((StatusCode::OK, Json(items))),
        Err(err) => {
            tracing::error!("Failed to list items: {err}");
            Err((status_for(&err), err.to_string()))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateItem {
    pub name: String,
}

async fn create_item(
    headers: HeaderMap,
    State(state): State<AnnouncementState>,
    Json(payload): Json<CreateItem>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require_admin(&headers, &state).await?;

    match state.announcements.create_item(&payload.name).await {
        Ok(id) => Ok((StatusCode::CREATED, Json(Created { id }))),
        Err(err) => {
            tracing::error!("Failed to create item: {err}");
            Err((status_for(&err), err.to_string()))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GrantItems {
    pub user_id: Uuid,
    pub item_id: Uuid,
    pub quantity: i32,
}

async fn grant_items(
    headers: HeaderMap,
    State(state): State<AnnouncementState>,
    Json(payload): Json<GrantItems>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let admin = require_admin(&headers, &state).await?;

    match state
        .announcements
        .grant_items(payload.user_id, payload.item_id, payload.quantity)
        .await
    {
        Ok(()) => {
            tracing::info!(
                admin = %admin,
                user = %payload.user_id,
                quantity = payload.quantity,
                "items granted"
            );
            Ok((StatusCode::OK, "Items granted"))
        }
        Err(err) => {
            tracing::error!("Failed to grant items: {err}");
            Err((status_for(&err), err.to_string()))
        }
    }
}

pub fn announcement_routes(state: AnnouncementState) -> Router {
    Router::new()
        .route(
            "/announcements",
            post(post_announcement).get(list_announcements),
        )
        .route("/items", post(create_item).get(list_items))
        .route("/items/grant", post(grant_items))
        .with_state(state)
}
