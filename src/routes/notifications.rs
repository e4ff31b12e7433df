use std::sync::Arc;

use crate::{
    app::AppState,
    domain::{errors::ApiError, session::Session, user::Notification},
    repository::notifications::{count_unread, get_notifications, mark_all_read, mark_read},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

#[derive(Deserialize)]
pub struct NotificationQuery {
    limit: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationsResponse {
    notifications: Vec<Notification>,
    unread: i64,
}

pub async fn get_user_notifications(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NotificationQuery>,
    Extension(session): Extension<Session>,
) -> Result<Json<NotificationsResponse>, ApiError> {
    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let pool = state.get_pool();
    let notifications = get_notifications(&pool, session.user_id(), limit).await?;
    let unread = count_unread(&pool, session.user_id()).await?;
    Ok(Json(NotificationsResponse {
        notifications,
        unread,
    }))
}

pub async fn mark_notification_read(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Extension(session): Extension<Session>,
) -> Result<StatusCode, ApiError> {
    mark_read(&state.get_pool(), session.user_id(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn mark_all_notifications_read(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Result<Json<Value>, ApiError> {
    let updated = mark_all_read(&state.get_pool(), session.user_id()).await?;
    Ok(Json(json!({ "updated": updated })))
}
