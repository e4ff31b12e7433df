use sqlx::PgPool;
use uuid::Uuid;

use super::Tx;
use crate::domain::{errors::DatabaseError, model::DbNotification, user::Notification};

pub async fn insert_notification(
    tx: &mut Tx<'_>,
    notification: &Notification,
) -> Result<(), DatabaseError> {
    sqlx::query(
        "insert into notifications (id, user_id, message, is_read, created_on) values ($1, $2, $3, $4, $5)",
    )
    .bind(notification.id)
    .bind(notification.user_id)
    .bind(&notification.message)
    .bind(notification.read)
    .bind(notification.created_on)
    .execute(tx)
    .await
    .map_err(|e| {
        tracing::error!("inserting notification failed >>> {}", e);
        DatabaseError::ServerError
    })?;

    Ok(())
}

pub async fn get_notifications(
    pool: &PgPool,
    user_id: Uuid,
    limit: i64,
) -> Result<Vec<Notification>, DatabaseError> {
    let notifications = sqlx::query_as::<_, DbNotification>(
        "select * from notifications where user_id = $1 order by created_on desc limit $2",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(|e| {
        tracing::error!("getting notifications failed >>> {}", e);
        DatabaseError::ServerError
    })?;

    Ok(notifications.into_iter().map(|n| n.into()).collect())
}

pub async fn count_unread(pool: &PgPool, user_id: Uuid) -> Result<i64, DatabaseError> {
    sqlx::query_scalar::<_, i64>(
        "select count(*) from notifications where user_id = $1 and not is_read",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        tracing::error!("counting unread notifications failed >>> {}", e);
        DatabaseError::ServerError
    })
}

pub async fn mark_read(pool: &PgPool, user_id: Uuid, id: Uuid) -> Result<(), DatabaseError> {
    let result =
        sqlx::query("update notifications set is_read = true where id = $1 and user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await
            .map_err(|e| {
                tracing::error!("marking notification read failed >>> {}", e);
                DatabaseError::ServerError
            })?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound);
    }
    Ok(())
}

pub async fn mark_all_read(pool: &PgPool, user_id: Uuid) -> Result<u64, DatabaseError> {
    let result =
        sqlx::query("update notifications set is_read = true where user_id = $1 and not is_read")
            .bind(user_id)
            .execute(pool)
            .await
            .map_err(|e| {
                tracing::error!("marking notifications read failed >>> {}", e);
                DatabaseError::ServerError
            })?;

    Ok(result.rows_affected())
}
