use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{notifications::insert_notification, Page, Tx};
use crate::domain::{
    accrual::Accrual,
    errors::DatabaseError,
    fields::{Email, ReferralCode},
    mining::Settlement,
    model::DbUser,
    profile::MergedProfile,
    user::{NewUser, Notification, User},
};

const SELECT_USER: &str = "select a.*, (select count(*) from users as b where b.referred_by = a.id) as referrals from users as a ";

pub struct FetchUserQuery {
    pub email: Option<String>,
    pub auth_user: Uuid,
    pub page: Page,
}

pub async fn get_user_by_id(pool: &PgPool, id: Uuid) -> Result<Option<User>, DatabaseError> {
    let user = sqlx::query_as::<_, DbUser>(&format!("{SELECT_USER} where a.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| {
            tracing::error!("get user by id failed >>> {}", e);
            DatabaseError::ServerError
        })?;

    Ok(user.map(|u| u.into()))
}

pub async fn get_user_by_email(pool: &PgPool, email: &Email) -> Result<Option<User>, DatabaseError> {
    let user = sqlx::query_as::<_, DbUser>(&format!("{SELECT_USER} where a.email = $1"))
        .bind(email.as_ref())
        .fetch_optional(pool)
        .await
        .map_err(|e| {
            tracing::error!("get user by email failed >>> {}", e);
            DatabaseError::ServerError
        })?;

    Ok(user.map(|u| u.into()))
}

pub async fn get_user_by_referral_code(
    pool: &PgPool,
    referral_code: &ReferralCode,
) -> Result<Option<User>, DatabaseError> {
    let user = sqlx::query_as::<_, DbUser>(&format!("{SELECT_USER} where a.referral_code = $1"))
        .bind(referral_code.as_ref())
        .fetch_optional(pool)
        .await
        .map_err(|e| {
            tracing::error!("get user by referral code failed >>> {}", e);
            DatabaseError::ServerError
        })?;

    Ok(user.map(|u| u.into()))
}

/// Reads and row-locks a user for the rest of the transaction.
pub async fn lock_user(tx: &mut Tx<'_>, id: Uuid) -> Result<Option<User>, DatabaseError> {
    let user = sqlx::query_as::<_, DbUser>(&format!("{SELECT_USER} where a.id = $1 for update"))
        .bind(id)
        .fetch_optional(tx)
        .await
        .map_err(|e| {
            tracing::error!("locking user failed >>> {}", e);
            DatabaseError::ServerError
        })?;

    Ok(user.map(|u| u.into()))
}

/// Inserts the user and, when referred, credits the referrer and tells them.
pub async fn create_new_user(
    pool: &PgPool,
    user: &NewUser,
    referral_bonus: i64,
    now: OffsetDateTime,
) -> Result<(), DatabaseError> {
    let mut tx = super::begin(pool).await?;

    sqlx::query(
        "insert into users (id, email, coins, referral_code, applied_referral_code, referred_by, is_admin, created_on) values ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(user.id)
    .bind(user.email.as_ref())
    .bind(user.coins)
    .bind(user.referral_code.as_ref())
    .bind(user.applied_referral_code.as_ref().map(|c| c.inner()))
    .bind(user.referred_by)
    .bind(user.is_admin)
    .bind(now)
    .execute(&mut tx)
    .await
    .map_err(|e| {
        tracing::error!("creating user failed >>> {}", e);
        match e {
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                DatabaseError::Conflict
            }
            _ => DatabaseError::ServerError,
        }
    })?;

    if let Some(referrer) = user.referred_by {
        credit_referrer(&mut tx, referrer, &user.email, referral_bonus, now).await?;
    }

    super::commit(tx).await
}

async fn credit_referrer(
    tx: &mut Tx<'_>,
    referrer: Uuid,
    referred: &Email,
    bonus: i64,
    now: OffsetDateTime,
) -> Result<(), DatabaseError> {
    sqlx::query("update users set coins = coins + $1, version = version + 1 where id = $2")
        .bind(bonus)
        .bind(referrer)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("crediting referrer failed >>> {}", e);
            DatabaseError::ServerError
        })?;

    let notification = Notification::new(
        referrer,
        format!("{} joined with your referral code. You earned {} coins!", referred, bonus),
        now,
    );
    insert_notification(tx, &notification).await
}

/// Writes the columns a merged profile changed. `expected_version` turns the
/// write into a compare-and-set; without it the last write wins. A referral
/// is only written while none is stored.
pub async fn update_profile(
    pool: &PgPool,
    merged: &MergedProfile,
    expected_version: Option<i64>,
    referral_bonus: i64,
    now: OffsetDateTime,
) -> Result<(), DatabaseError> {
    let user = &merged.user;
    let mut builder = QueryBuilder::<Postgres>::new("update users set version = version + 1");

    if merged.address_changed {
        builder.push(", withdrawal_address = ");
        builder.push_bind(user.withdrawal_address.clone());
    }

    if let Some(referrer) = merged.new_referrer {
        builder.push(", applied_referral_code = ");
        builder.push_bind(user.applied_referral_code.as_ref().map(|c| c.inner()));
        builder.push(", referred_by = ");
        builder.push_bind(referrer);
    }

    builder.push(" where id = ");
    builder.push_bind(user.id);

    if let Some(version) = expected_version {
        builder.push(" and version = ");
        builder.push_bind(version);
    }

    if merged.new_referrer.is_some() {
        builder.push(" and applied_referral_code is null");
    }

    let mut tx = super::begin(pool).await?;
    let result = builder.build().execute(&mut tx).await.map_err(|e| {
        tracing::error!("updating profile failed >>> {}", e);
        DatabaseError::ServerError
    })?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::Conflict);
    }

    if let Some(referrer) = merged.new_referrer {
        credit_referrer(&mut tx, referrer, &user.email, referral_bonus, now).await?;
    }

    super::commit(tx).await
}

/// Credits plan earnings unless another check already moved the timestamp.
/// Returns whether this call applied the accrual.
pub async fn apply_accrual(
    pool: &PgPool,
    user_id: Uuid,
    previous: Option<OffsetDateTime>,
    accrual: &Accrual,
) -> Result<bool, DatabaseError> {
    let result = sqlx::query(
        "update users set earnings = earnings + $1, last_earnings_update = $2, version = version + 1 where id = $3 and last_earnings_update is not distinct from $4",
    )
    .bind(accrual.credit)
    .bind(accrual.last_update)
    .bind(user_id)
    .bind(previous)
    .execute(pool)
    .await
    .map_err(|e| {
        tracing::error!("applying accrual failed >>> {}", e);
        DatabaseError::ServerError
    })?;

    Ok(result.rows_affected() == 1)
}

/// Stores a settled mining session and pays out, guarded by the session the
/// settlement started from.
pub async fn apply_mining_settlement(
    pool: &PgPool,
    user_id: Uuid,
    settlement: &Settlement,
) -> Result<bool, DatabaseError> {
    let (started_at, cooldown_until) = settlement.session.to_columns();
    let (previous_started_at, previous_cooldown_until) = settlement.previous.to_columns();

    let result = sqlx::query(
        "update users set coins = coins + $1, mining_started_at = $2, mining_cooldown_until = $3, version = version + 1 where id = $4 and mining_started_at is not distinct from $5 and mining_cooldown_until is not distinct from $6",
    )
    .bind(settlement.payout)
    .bind(started_at)
    .bind(cooldown_until)
    .bind(user_id)
    .bind(previous_started_at)
    .bind(previous_cooldown_until)
    .execute(pool)
    .await
    .map_err(|e| {
        tracing::error!("applying mining settlement failed >>> {}", e);
        DatabaseError::ServerError
    })?;

    Ok(result.rows_affected() == 1)
}

pub async fn debit_earnings(
    tx: &mut Tx<'_>,
    user_id: Uuid,
    amount: Decimal,
) -> Result<(), DatabaseError> {
    sqlx::query(
        "update users set earnings = earnings - $1, version = version + 1 where id = $2 and earnings >= $1",
    )
    .bind(amount)
    .bind(user_id)
    .execute(tx)
    .await
    .map_err(|e| {
        tracing::error!("debiting earnings failed >>> {}", e);
        DatabaseError::ServerError
    })
    .and_then(|result| {
        if result.rows_affected() == 1 {
            Ok(())
        } else {
            Err(DatabaseError::Conflict)
        }
    })
}

pub async fn delete_user(pool: &PgPool, id: Uuid) -> Result<(), DatabaseError> {
    let result = sqlx::query("delete from users where id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| {
            tracing::error!("deleting user failed >>> {}", e);
            DatabaseError::ServerError
        })?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound);
    }
    Ok(())
}

pub async fn get_referrals(pool: &PgPool, referrer: Uuid) -> Result<Vec<User>, DatabaseError> {
    let users = sqlx::query_as::<_, DbUser>(&format!(
        "{SELECT_USER} where a.referred_by = $1 order by a.created_on desc"
    ))
    .bind(referrer)
    .fetch_all(pool)
    .await
    .map_err(|e| {
        tracing::error!("getting referrals failed >>> {}", e);
        DatabaseError::ServerError
    })?;

    Ok(users.into_iter().map(|u| u.into()).collect())
}

/// Ids of users with a plan that can still produce credit since their last
/// accrual.
pub async fn get_earning_user_ids(pool: &PgPool) -> Result<Vec<Uuid>, DatabaseError> {
    let ids = sqlx::query_scalar::<_, Uuid>(
        "select distinct u.id from users as u join plans as p on p.user_id = u.id where u.last_earnings_update is null or p.expires_at > u.last_earnings_update",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| {
        tracing::error!("getting earning users failed >>> {}", e);
        DatabaseError::ServerError
    })?;

    Ok(ids)
}

pub async fn fetch_users(
    pool: &PgPool,
    query: FetchUserQuery,
) -> Result<(Vec<User>, i64), DatabaseError> {
    tracing::info!("limit >>> {} offset >>> {}", query.page.limit, query.page.skip);
    let mut select_query = QueryBuilder::new(SELECT_USER);
    let builder = append_search_param_to_query(&mut select_query, &query, false, false);

    let mut count_query = QueryBuilder::new("select count(*) as count from users as a ");
    let count_builder = append_search_param_to_query(&mut count_query, &query, true, true);

    let users = builder
        .build_query_as::<DbUser>()
        .fetch_all(pool)
        .await
        .map_err(|e| {
            tracing::error!("getting list of user failed >>> {}", e);
            DatabaseError::ServerError
        })?;

    let count = count_builder.build().fetch_one(pool).await.map_err(|e| {
        tracing::error!("fetch total user count failed >>> {}", e);
        DatabaseError::ServerError
    })?;

    let users: Vec<User> = users.into_iter().map(|u| u.into()).collect();
    Ok((users, count.get("count")))
}

fn append_search_param_to_query<'a>(
    builder: &'a mut QueryBuilder<'a, Postgres>,
    query: &FetchUserQuery,
    skip_ordering: bool,
    skip_pagination: bool,
) -> &'a mut QueryBuilder<'a, Postgres> {
    builder.push(" where a.id != ");
    builder.push_bind(query.auth_user);

    if let Some(email) = &query.email {
        builder.push(" and a.email like ");
        builder.push_bind(format!("%{}%", email.to_lowercase()));
    }

    if !skip_ordering {
        builder.push(" order by a.created_on desc ");
    }

    if !skip_pagination {
        builder.push(" limit ");
        builder.push_bind(query.page.limit);

        builder.push(" offset ");
        builder.push_bind(query.page.skip);
    }

    builder
}
