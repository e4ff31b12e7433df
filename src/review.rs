//! Persists administrator decisions on withdrawal and deposit requests.
//!
//! Each decision runs in one transaction holding row locks on the request
//! (and, for withdrawals, the owner). Any failure drops the transaction, so
//! the request stays pending and no balance, plan or notification is
//! written.

use rust_decimal::Decimal;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    domain::{
        errors::{ReviewError, WorkflowError},
        requests::{process_deposit, process_withdrawal, Decision, DepositOutcome, WithdrawalOutcome},
    },
    repository::{
        begin, commit,
        notifications::insert_notification,
        plans::insert_plan,
        requests::{lock_deposit_request, lock_withdrawal_request, set_request_status, RequestTable},
        users::{debit_earnings, lock_user},
    },
};

pub async fn review_withdrawal(
    pool: &PgPool,
    id: Uuid,
    decision: Decision,
    now: OffsetDateTime,
) -> Result<WithdrawalOutcome, ReviewError> {
    let mut tx = begin(pool).await?;

    let request = lock_withdrawal_request(&mut tx, id)
        .await?
        .ok_or(WorkflowError::NotFound)?;
    let owner = lock_user(&mut tx, request.user_id)
        .await?
        .ok_or(WorkflowError::NotFound)?;

    let outcome = process_withdrawal(request, &owner, decision, now)?;
    let request = &outcome.request;

    set_request_status(
        &mut tx,
        RequestTable::Withdrawals,
        request.id,
        request.status,
        request.processed_at,
    )
    .await?;
    if outcome.debit > Decimal::ZERO {
        debit_earnings(&mut tx, owner.id, outcome.debit).await?;
    }
    insert_notification(&mut tx, &outcome.notification).await?;
    commit(tx).await?;

    Ok(outcome)
}

pub async fn review_deposit(
    pool: &PgPool,
    id: Uuid,
    decision: Decision,
    now: OffsetDateTime,
) -> Result<DepositOutcome, ReviewError> {
    let mut tx = begin(pool).await?;

    let request = lock_deposit_request(&mut tx, id)
        .await?
        .ok_or(WorkflowError::NotFound)?;

    let outcome = process_deposit(request, decision, now)?;
    let request = &outcome.request;

    set_request_status(
        &mut tx,
        RequestTable::Deposits,
        request.id,
        request.status,
        request.processed_at,
    )
    .await?;
    if let Some(plan) = &outcome.plan {
        insert_plan(&mut tx, plan).await?;
    }
    insert_notification(&mut tx, &outcome.notification).await?;
    commit(tx).await?;

    Ok(outcome)
}
