use sqlx::{PgPool, Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{Page, Tx};
use crate::domain::{
    errors::DatabaseError,
    model::{DbDepositRequest, DbWithdrawalRequest},
    requests::{DepositRequest, RequestStatus, WithdrawalRequest},
};

pub struct RequestFilter {
    pub user_id: Option<Uuid>,
    pub status: Option<RequestStatus>,
    pub page: Page,
}

fn push_filter<'a>(builder: &mut QueryBuilder<'a, Postgres>, filter: &RequestFilter) {
    builder.push(" where true ");
    if let Some(user_id) = filter.user_id {
        builder.push(" and user_id = ");
        builder.push_bind(user_id);
    }
    if let Some(status) = filter.status {
        builder.push(" and status = ");
        builder.push_bind(status);
    }
    builder.push(" order by created_on desc limit ");
    builder.push_bind(filter.page.limit);
    builder.push(" offset ");
    builder.push_bind(filter.page.skip);
}

pub async fn insert_withdrawal_request(
    pool: &PgPool,
    request: &WithdrawalRequest,
) -> Result<(), DatabaseError> {
    sqlx::query(
        "insert into withdrawal_requests (id, user_id, email, amount, address, status, created_on) values ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(request.id)
    .bind(request.user_id)
    .bind(request.email.as_ref())
    .bind(request.amount)
    .bind(&request.address)
    .bind(request.status)
    .bind(request.created_on)
    .execute(pool)
    .await
    .map_err(|e| {
        tracing::error!("inserting withdrawal request failed >>> {}", e);
        DatabaseError::ServerError
    })?;

    Ok(())
}

pub async fn get_withdrawal_requests(
    pool: &PgPool,
    filter: RequestFilter,
) -> Result<Vec<WithdrawalRequest>, DatabaseError> {
    let mut builder = QueryBuilder::new("select * from withdrawal_requests ");
    push_filter(&mut builder, &filter);

    let requests = builder
        .build_query_as::<DbWithdrawalRequest>()
        .fetch_all(pool)
        .await
        .map_err(|e| {
            tracing::error!("getting withdrawal requests failed >>> {}", e);
            DatabaseError::ServerError
        })?;

    Ok(requests.into_iter().map(|r| r.into()).collect())
}

pub async fn lock_withdrawal_request(
    tx: &mut Tx<'_>,
    id: Uuid,
) -> Result<Option<WithdrawalRequest>, DatabaseError> {
    let request = sqlx::query_as::<_, DbWithdrawalRequest>(
        "select * from withdrawal_requests where id = $1 for update",
    )
    .bind(id)
    .fetch_optional(tx)
    .await
    .map_err(|e| {
        tracing::error!("locking withdrawal request failed >>> {}", e);
        DatabaseError::ServerError
    })?;

    Ok(request.map(|r| r.into()))
}

pub async fn insert_deposit_request(
    pool: &PgPool,
    request: &DepositRequest,
) -> Result<(), DatabaseError> {
    sqlx::query(
        "insert into deposit_requests (id, user_id, email, offer_id, plan_name, amount, daily_rate, duration_days, tx_reference, status, created_on) values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
    )
    .bind(request.id)
    .bind(request.user_id)
    .bind(request.email.as_ref())
    .bind(request.offer_id)
    .bind(&request.plan_name)
    .bind(request.amount)
    .bind(request.daily_rate)
    .bind(request.duration_days)
    .bind(request.tx_reference.as_deref())
    .bind(request.status)
    .bind(request.created_on)
    .execute(pool)
    .await
    .map_err(|e| {
        tracing::error!("inserting deposit request failed >>> {}", e);
        DatabaseError::ServerError
    })?;

    Ok(())
}

pub async fn get_deposit_requests(
    pool: &PgPool,
    filter: RequestFilter,
) -> Result<Vec<DepositRequest>, DatabaseError> {
    let mut builder = QueryBuilder::new("select * from deposit_requests ");
    push_filter(&mut builder, &filter);

    let requests = builder
        .build_query_as::<DbDepositRequest>()
        .fetch_all(pool)
        .await
        .map_err(|e| {
            tracing::error!("getting deposit requests failed >>> {}", e);
            DatabaseError::ServerError
        })?;

    Ok(requests.into_iter().map(|r| r.into()).collect())
}

pub async fn lock_deposit_request(
    tx: &mut Tx<'_>,
    id: Uuid,
) -> Result<Option<DepositRequest>, DatabaseError> {
    let request = sqlx::query_as::<_, DbDepositRequest>(
        "select * from deposit_requests where id = $1 for update",
    )
    .bind(id)
    .fetch_optional(tx)
    .await
    .map_err(|e| {
        tracing::error!("locking deposit request failed >>> {}", e);
        DatabaseError::ServerError
    })?;

    Ok(request.map(|r| r.into()))
}

/// Only a pending row can be moved, so a racing decision updates nothing.
pub async fn set_request_status(
    tx: &mut Tx<'_>,
    table: RequestTable,
    id: Uuid,
    status: RequestStatus,
    processed_at: Option<OffsetDateTime>,
) -> Result<(), DatabaseError> {
    let sql = format!(
        "update {} set status = $1, processed_at = $2 where id = $3 and status = 'pending'",
        table.name()
    );
    let result = sqlx::query(&sql)
        .bind(status)
        .bind(processed_at)
        .bind(id)
        .execute(tx)
        .await
        .map_err(|e| {
            tracing::error!("updating request status failed >>> {}", e);
            DatabaseError::ServerError
        })?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::Conflict);
    }
    Ok(())
}

#[derive(Clone, Copy, Debug)]
pub enum RequestTable {
    Withdrawals,
    Deposits,
}

impl RequestTable {
    fn name(self) -> &'static str {
        match self {
            Self::Withdrawals => "withdrawal_requests",
            Self::Deposits => "deposit_requests",
        }
    }
}
