use std::sync::Arc;

use crate::{
    app::AppState,
    domain::{
        errors::{ApiError, WorkflowError},
        events::{AppEvent, RequestProcessedEvent},
        requests::{Decision, DepositRequest, RequestStatus, WithdrawalRequest},
        session::Session,
    },
    repository::{
        plans::get_plan_offer,
        requests::{
            get_deposit_requests, get_withdrawal_requests, insert_deposit_request,
            insert_withdrawal_request, RequestFilter,
        },
        Page,
    },
    review::{review_deposit, review_withdrawal},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Deserialize)]
pub struct RequestQuery {
    status: Option<RequestStatus>,
    page: Option<i64>,
    limit: Option<i64>,
}

impl RequestQuery {
    fn into_filter(self, user_id: Option<Uuid>) -> RequestFilter {
        RequestFilter {
            user_id,
            status: self.status,
            page: Page::new(self.page, self.limit),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWithdrawalRequest {
    amount: Decimal,
    address: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDepositRequest {
    plan_id: Uuid,
    tx_reference: Option<String>,
}

pub async fn create_withdrawal(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Json(payload): Json<CreateWithdrawalRequest>,
) -> Result<(StatusCode, Json<WithdrawalRequest>), ApiError> {
    let request = WithdrawalRequest::open(
        &session.user,
        payload.amount,
        payload.address,
        state.config.rewards.min_withdrawal,
        OffsetDateTime::now_utc(),
    )?;

    insert_withdrawal_request(&state.get_pool(), &request).await?;
    tracing::info!(
        "withdrawal of {} requested by {}",
        request.amount,
        request.email
    );

    let _ = state
        .get_sender()
        .send(AppEvent::WithdrawalRequested(request.clone()));
    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn get_my_withdrawals(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RequestQuery>,
    Extension(session): Extension<Session>,
) -> Result<Json<Vec<WithdrawalRequest>>, ApiError> {
    let filter = query.into_filter(Some(session.user_id()));
    Ok(Json(get_withdrawal_requests(&state.get_pool(), filter).await?))
}

pub async fn create_deposit(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Json(payload): Json<CreateDepositRequest>,
) -> Result<(StatusCode, Json<DepositRequest>), ApiError> {
    let pool = state.get_pool();
    let offer = get_plan_offer(&pool, payload.plan_id)
        .await?
        .ok_or(WorkflowError::PlanUnavailable)?;

    let request = DepositRequest::open(
        &session.user,
        &offer,
        payload.tx_reference,
        OffsetDateTime::now_utc(),
    )?;

    insert_deposit_request(&pool, &request).await?;
    tracing::info!(
        "deposit of {} for {} requested by {}",
        request.amount,
        request.plan_name,
        request.email
    );

    let _ = state
        .get_sender()
        .send(AppEvent::DepositRequested(request.clone()));
    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn get_my_deposits(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RequestQuery>,
    Extension(session): Extension<Session>,
) -> Result<Json<Vec<DepositRequest>>, ApiError> {
    let filter = query.into_filter(Some(session.user_id()));
    Ok(Json(get_deposit_requests(&state.get_pool(), filter).await?))
}

pub async fn get_all_withdrawals(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RequestQuery>,
    Extension(session): Extension<Session>,
) -> Result<Json<Vec<WithdrawalRequest>>, ApiError> {
    session.ensure_admin()?;
    Ok(Json(
        get_withdrawal_requests(&state.get_pool(), query.into_filter(None)).await?,
    ))
}

pub async fn get_all_deposits(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RequestQuery>,
    Extension(session): Extension<Session>,
) -> Result<Json<Vec<DepositRequest>>, ApiError> {
    session.ensure_admin()?;
    Ok(Json(
        get_deposit_requests(&state.get_pool(), query.into_filter(None)).await?,
    ))
}

pub async fn approve_withdrawal(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Extension(session): Extension<Session>,
) -> Result<Json<WithdrawalRequest>, ApiError> {
    decide_withdrawal(&state, &session, id, Decision::Approve).await
}

pub async fn reject_withdrawal(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Extension(session): Extension<Session>,
) -> Result<Json<WithdrawalRequest>, ApiError> {
    decide_withdrawal(&state, &session, id, Decision::Reject).await
}

pub async fn approve_deposit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Extension(session): Extension<Session>,
) -> Result<Json<DepositRequest>, ApiError> {
    decide_deposit(&state, &session, id, Decision::Approve).await
}

pub async fn reject_deposit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Extension(session): Extension<Session>,
) -> Result<Json<DepositRequest>, ApiError> {
    decide_deposit(&state, &session, id, Decision::Reject).await
}

async fn decide_withdrawal(
    state: &AppState,
    session: &Session,
    id: Uuid,
    decision: Decision,
) -> Result<Json<WithdrawalRequest>, ApiError> {
    session.ensure_admin()?;
    let outcome = review_withdrawal(&state.get_pool(), id, decision, OffsetDateTime::now_utc()).await?;
    let request = outcome.request;

    tracing::info!(
        "withdrawal {} {:?} by {}",
        request.id,
        request.status,
        session.user.email
    );
    let _ = state
        .get_sender()
        .send(AppEvent::WithdrawalProcessed(RequestProcessedEvent {
            id: request.id,
            user_id: request.user_id,
            status: request.status,
        }));

    Ok(Json(request))
}

async fn decide_deposit(
    state: &AppState,
    session: &Session,
    id: Uuid,
    decision: Decision,
) -> Result<Json<DepositRequest>, ApiError> {
    session.ensure_admin()?;
    let outcome = review_deposit(&state.get_pool(), id, decision, OffsetDateTime::now_utc()).await?;
    let request = outcome.request;

    tracing::info!(
        "deposit {} {:?} by {}",
        request.id,
        request.status,
        session.user.email
    );
    let _ = state
        .get_sender()
        .send(AppEvent::DepositProcessed(RequestProcessedEvent {
            id: request.id,
            user_id: request.user_id,
            status: request.status,
        }));

    Ok(Json(request))
}
