use sqlx::PgPool;
use uuid::Uuid;

use super::Tx;
use crate::domain::{
    errors::DatabaseError,
    model::{DbPlan, DbPlanOffer},
    user::{Plan, PlanOffer},
};

pub async fn get_plan_offers(
    pool: &PgPool,
    only_active: bool,
) -> Result<Vec<PlanOffer>, DatabaseError> {
    let offers = sqlx::query_as::<_, DbPlanOffer>(
        "select id, name, price, daily_rate, duration_days, is_active from plan_offers where (not $1 or is_active) order by price asc",
    )
    .bind(only_active)
    .fetch_all(pool)
    .await
    .map_err(|e| {
        tracing::error!("getting plan offers failed >>> {}", e);
        DatabaseError::ServerError
    })?;

    Ok(offers.into_iter().map(|o| o.into()).collect())
}

pub async fn get_plan_offer(pool: &PgPool, id: Uuid) -> Result<Option<PlanOffer>, DatabaseError> {
    let offer = sqlx::query_as::<_, DbPlanOffer>(
        "select id, name, price, daily_rate, duration_days, is_active from plan_offers where id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(|e| {
        tracing::error!("getting plan offer failed >>> {}", e);
        DatabaseError::ServerError
    })?;

    Ok(offer.map(|o| o.into()))
}

pub async fn create_plan_offer(pool: &PgPool, offer: &PlanOffer) -> Result<(), DatabaseError> {
    sqlx::query(
        "insert into plan_offers (id, name, price, daily_rate, duration_days, is_active) values ($1, $2, $3, $4, $5, $6)",
    )
    .bind(offer.id)
    .bind(&offer.name)
    .bind(offer.price)
    .bind(offer.daily_rate)
    .bind(offer.duration_days)
    .bind(offer.is_active)
    .execute(pool)
    .await
    .map_err(|e| {
        tracing::error!("creating plan offer failed >>> {}", e);
        DatabaseError::ServerError
    })?;

    Ok(())
}

pub async fn update_plan_offer(pool: &PgPool, offer: &PlanOffer) -> Result<(), DatabaseError> {
    let result = sqlx::query(
        "update plan_offers set name = $2, price = $3, daily_rate = $4, duration_days = $5, is_active = $6 where id = $1",
    )
    .bind(offer.id)
    .bind(&offer.name)
    .bind(offer.price)
    .bind(offer.daily_rate)
    .bind(offer.duration_days)
    .bind(offer.is_active)
    .execute(pool)
    .await
    .map_err(|e| {
        tracing::error!("updating plan offer failed >>> {}", e);
        DatabaseError::ServerError
    })?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound);
    }
    Ok(())
}

pub async fn get_plans_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Plan>, DatabaseError> {
    let plans = sqlx::query_as::<_, DbPlan>(
        "select * from plans where user_id = $1 order by started_at desc",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(|e| {
        tracing::error!("getting plans failed >>> {}", e);
        DatabaseError::ServerError
    })?;

    Ok(plans.into_iter().map(|p| p.into()).collect())
}

pub async fn insert_plan(tx: &mut Tx<'_>, plan: &Plan) -> Result<(), DatabaseError> {
    sqlx::query(
        "insert into plans (id, user_id, offer_id, name, principal, daily_rate, started_at, expires_at) values ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(plan.id)
    .bind(plan.user_id)
    .bind(plan.offer_id)
    .bind(&plan.name)
    .bind(plan.principal)
    .bind(plan.daily_rate)
    .bind(plan.started_at)
    .bind(plan.expires_at)
    .execute(tx)
    .await
    .map_err(|e| {
        tracing::error!("inserting plan failed >>> {}", e);
        DatabaseError::ServerError
    })?;

    Ok(())
}
