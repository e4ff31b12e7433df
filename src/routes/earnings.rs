use std::sync::Arc;

use crate::{
    app::AppState,
    domain::{
        errors::{ApiError, DatabaseError},
        mining::{MiningSession, MiningStatus},
        session::Session,
    },
    repository::users::apply_mining_settlement,
    sync::{settle_mining, sync_earnings},
};
use axum::{extract::State, Extension, Json};
use rust_decimal::Decimal;
use serde::Serialize;
use time::OffsetDateTime;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    credited: Decimal,
    periods: i64,
    #[serde(with = "time::serde::rfc3339")]
    last_earnings_update: OffsetDateTime,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MiningResponse {
    #[serde(flatten)]
    status: MiningStatus,
    payout: i64,
}

pub async fn sync_user_earnings(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Result<Json<SyncResponse>, ApiError> {
    let accrual = sync_earnings(&state, &session.user, OffsetDateTime::now_utc()).await?;
    Ok(Json(SyncResponse {
        credited: accrual.credit,
        periods: accrual.periods,
        last_earnings_update: accrual.last_update,
    }))
}

pub async fn get_mining_status(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Result<Json<MiningResponse>, ApiError> {
    claim_mining(State(state), Extension(session)).await
}

/// Settles a finished session, paying its reward.
pub async fn claim_mining(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Result<Json<MiningResponse>, ApiError> {
    let now = OffsetDateTime::now_utc();
    let settlement = settle_mining(&state, &session.user, now).await?;
    Ok(Json(MiningResponse {
        status: state.mining_timer().status(settlement.session, now),
        payout: settlement.payout,
    }))
}

pub async fn start_mining(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Result<Json<MiningResponse>, ApiError> {
    let now = OffsetDateTime::now_utc();
    let timer = state.mining_timer();
    let settlement = timer.start(session.user.mining, now)?;

    if !apply_mining_settlement(&state.get_pool(), session.user_id(), &settlement).await? {
        return Err(DatabaseError::Conflict.into());
    }

    if let MiningSession::Mining { started_at } = settlement.session {
        tracing::info!("{} started mining at {}", session.user.email, started_at);
    }

    Ok(Json(MiningResponse {
        status: timer.status(settlement.session, now),
        payout: settlement.payout,
    }))
}
