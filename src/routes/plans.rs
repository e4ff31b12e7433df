use std::sync::Arc;

use crate::{
    app::AppState,
    domain::{errors::ApiError, session::Session, user::PlanOffer},
    repository::plans::{create_plan_offer, get_plan_offers, update_plan_offer},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanOfferPayload {
    name: String,
    price: Decimal,
    daily_rate: Decimal,
    duration_days: i32,
    is_active: Option<bool>,
}

impl PlanOfferPayload {
    fn into_offer(self, id: Uuid) -> Result<PlanOffer, ApiError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ApiError::BadRequest("Plan name is required".into()));
        }
        if self.price <= Decimal::ZERO || self.daily_rate < Decimal::ZERO {
            return Err(ApiError::BadRequest("Plan amounts must be positive".into()));
        }
        if self.duration_days <= 0 {
            return Err(ApiError::BadRequest("Plan duration must be at least one day".into()));
        }

        Ok(PlanOffer {
            id,
            name,
            price: self.price,
            daily_rate: self.daily_rate,
            duration_days: self.duration_days,
            is_active: self.is_active.unwrap_or(true),
        })
    }
}

pub async fn get_offers(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Result<Json<Vec<PlanOffer>>, ApiError> {
    // admins also see retired offers
    let offers = get_plan_offers(&state.get_pool(), !session.is_admin()).await?;
    Ok(Json(offers))
}

pub async fn create_offer(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Json(payload): Json<PlanOfferPayload>,
) -> Result<(StatusCode, Json<PlanOffer>), ApiError> {
    session.ensure_admin()?;
    let offer = payload.into_offer(Uuid::new_v4())?;
    create_plan_offer(&state.get_pool(), &offer).await?;
    tracing::info!("plan offer {} created by {}", offer.name, session.user.email);
    Ok((StatusCode::CREATED, Json(offer)))
}

pub async fn update_offer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Extension(session): Extension<Session>,
    Json(payload): Json<PlanOfferPayload>,
) -> Result<Json<PlanOffer>, ApiError> {
    session.ensure_admin()?;
    let offer = payload.into_offer(id)?;
    update_plan_offer(&state.get_pool(), &offer).await?;
    tracing::info!("plan offer {} updated by {}", offer.id, session.user.email);
    Ok(Json(offer))
}
