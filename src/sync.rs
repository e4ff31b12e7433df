//! Time-driven crediting: plan earnings accrual and mining settlement.
//!
//! Both run when a user reads their profile and, for accrual, from the
//! periodic sweep. Writes are compare-and-set against the state that was
//! read, so overlapping runs credit at most once.

use rust_decimal::Decimal;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    app::AppState,
    domain::{
        accrual::Accrual,
        errors::DatabaseError,
        events::{AppEvent, EarningsCreditedEvent},
        mining::Settlement,
        user::User,
    },
    repository::{
        plans::get_plans_for_user,
        users::{apply_accrual, apply_mining_settlement, get_earning_user_ids, get_user_by_id},
    },
};

/// Credits any plan earnings that came due since the user's last update.
/// Returns the credit this call actually applied.
pub async fn sync_earnings(
    state: &AppState,
    user: &User,
    now: OffsetDateTime,
) -> Result<Accrual, DatabaseError> {
    let pool = state.get_pool();
    let plans = get_plans_for_user(&pool, user.id).await?;
    let accrual = state
        .accrual_engine()
        .accrue_plans(user.last_earnings_update, now, &plans);

    let unchanged = Accrual {
        credit: Decimal::ZERO,
        periods: 0,
        last_update: user.last_earnings_update.unwrap_or(now),
    };

    if Some(accrual.last_update) == user.last_earnings_update {
        return Ok(unchanged);
    }

    if !apply_accrual(&pool, user.id, user.last_earnings_update, &accrual).await? {
        tracing::debug!("accrual for {} already applied by another check", user.id);
        return Ok(unchanged);
    }

    if accrual.credit > Decimal::ZERO {
        tracing::info!(
            "credited {} USDT to {} for {} period(s)",
            accrual.credit,
            user.id,
            accrual.periods
        );
        let _ = state
            .get_sender()
            .send(AppEvent::EarningsCredited(EarningsCreditedEvent {
                user_id: user.id,
                amount: accrual.credit,
                periods: accrual.periods,
            }));
    }

    Ok(accrual)
}

/// Pays out finished mining sessions and lifts expired cooldowns.
pub async fn settle_mining(
    state: &AppState,
    user: &User,
    now: OffsetDateTime,
) -> Result<Settlement, DatabaseError> {
    let settlement = state.mining_timer().settle(user.mining, now);
    if !settlement.changed() {
        return Ok(settlement);
    }

    if !apply_mining_settlement(&state.get_pool(), user.id, &settlement).await? {
        tracing::debug!("mining session for {} settled elsewhere", user.id);
        return Ok(Settlement {
            payout: 0,
            ..settlement
        });
    }

    if settlement.payout > 0 {
        tracing::info!("mining payout of {} coins to {}", settlement.payout, user.id);
    }
    Ok(settlement)
}

/// Brings a user's balances up to date and returns the fresh record.
pub async fn refresh_user(
    state: &AppState,
    user: &User,
    now: OffsetDateTime,
) -> Result<User, DatabaseError> {
    sync_earnings(state, user, now).await?;
    settle_mining(state, user, now).await?;

    get_user_by_id(&state.get_pool(), user.id)
        .await?
        .ok_or(DatabaseError::NotFound)
}

/// One pass of the periodic accrual check over every user with plans.
pub async fn run_accrual_sweep(
    state: &AppState,
    now: OffsetDateTime,
) -> Result<usize, DatabaseError> {
    let pool = state.get_pool();
    let ids: Vec<Uuid> = get_earning_user_ids(&pool).await?;
    let mut credited = 0;

    for id in ids {
        let Some(user) = get_user_by_id(&pool, id).await? else {
            continue;
        };
        match sync_earnings(state, &user, now).await {
            Ok(accrual) if accrual.credit > Decimal::ZERO => credited += 1,
            Ok(_) => {}
            Err(e) => tracing::error!("accrual sweep failed for {} >>> {:?}", id, e),
        }
    }

    Ok(credited)
}
