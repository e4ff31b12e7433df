use std::sync::Arc;

use crate::{
    app::AppState,
    domain::{
        errors::ApiError,
        profile::{merge, ProfileUpdate},
        session::Session,
        user::{PlanView, User, UserProfile},
    },
    repository::{
        notifications::{count_unread, get_notifications},
        plans::get_plans_for_user,
        users::{
            delete_user, fetch_users, get_referrals, get_user_by_id, get_user_by_referral_code,
            update_profile, FetchUserQuery,
        },
        Page,
    },
    sync::refresh_user,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

const PROFILE_NOTIFICATIONS: i64 = 20;

#[derive(Deserialize)]
pub struct QueryParams {
    email: Option<String>,
    page: Option<i64>,
    limit: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    has_next: bool,
    has_prev: bool,
    current_page: i64,
    total_pages: i64,
}

impl Pagination {
    fn new(page: &Page, count: i64) -> Self {
        let current_page = page.current();
        let total_pages = ((count + page.limit - 1) / page.limit).max(1);
        Self {
            has_next: current_page < total_pages,
            has_prev: current_page > 1,
            current_page,
            total_pages,
        }
    }
}

#[derive(Serialize)]
pub struct GetUsersResponse {
    users: Vec<User>,
    #[serde(flatten)]
    pagination: Pagination,
}

async fn load_profile(state: &AppState, user: User, now: OffsetDateTime) -> Result<UserProfile, ApiError> {
    let pool = state.get_pool();
    let plans = get_plans_for_user(&pool, user.id)
        .await?
        .into_iter()
        .map(|plan| PlanView::new(plan, now))
        .collect();
    let notifications = get_notifications(&pool, user.id, PROFILE_NOTIFICATIONS).await?;
    let unread_notifications = count_unread(&pool, user.id).await?;
    let mining_status = state.mining_timer().status(user.mining, now);

    Ok(UserProfile {
        user,
        plans,
        notifications,
        unread_notifications,
        mining_status,
    })
}

/// Returns the caller's dashboard after crediting anything that came due.
pub async fn get_authenticated_user(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Result<Json<UserProfile>, ApiError> {
    let now = OffsetDateTime::now_utc();
    let user = refresh_user(&state, &session.user, now).await?;
    Ok(Json(load_profile(&state, user, now).await?))
}

pub async fn update_authenticated_user(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<UserProfile>, ApiError> {
    let pool = state.get_pool();
    let now = OffsetDateTime::now_utc();

    let referrer = match &update.referral_code {
        Some(code) => get_user_by_referral_code(&pool, code).await?,
        None => None,
    };

    let expected_version = update.expected_version;
    let merged = merge(&session.user, update, referrer.as_ref())?;
    if !merged.is_noop() {
        update_profile(
            &pool,
            &merged,
            expected_version,
            state.config.rewards.referral_bonus,
            now,
        )
        .await?;
        tracing::info!("profile of {} updated", session.user.email);
    }

    let user = get_user_by_id(&pool, session.user_id())
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(load_profile(&state, user, now).await?))
}

pub async fn get_my_referrals(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Result<Json<Vec<User>>, ApiError> {
    let referrals = get_referrals(&state.get_pool(), session.user_id()).await?;
    Ok(Json(referrals))
}

pub async fn get_users(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QueryParams>,
    Extension(session): Extension<Session>,
) -> Result<Json<GetUsersResponse>, ApiError> {
    let pool = state.get_pool();
    let page = Page::new(query.page, query.limit);

    let query = FetchUserQuery {
        email: query.email,
        auth_user: session.user_id(),
        page,
    };

    let (users, count) = fetch_users(&pool, query).await?;

    Ok(Json(GetUsersResponse {
        users,
        pagination: Pagination::new(&page, count),
    }))
}

pub async fn remove_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Extension(session): Extension<Session>,
) -> Result<StatusCode, ApiError> {
    session.ensure_admin()?;
    if id == session.user_id() {
        return Err(ApiError::BadRequest("Admins cannot delete themselves".into()));
    }

    delete_user(&state.get_pool(), id).await?;
    tracing::info!("user {} deleted by {}", id, session.user.email);
    Ok(StatusCode::NO_CONTENT)
}
