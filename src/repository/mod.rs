use sqlx::{PgPool, Postgres, Transaction};

use crate::domain::errors::DatabaseError;

pub mod notifications;
pub mod plans;
pub mod requests;
pub mod users;

pub type Tx<'a> = Transaction<'a, Postgres>;

pub async fn begin(pool: &PgPool) -> Result<Tx<'static>, DatabaseError> {
    pool.begin().await.map_err(|e| {
        tracing::error!("starting transaction failed >>> {}", e);
        DatabaseError::ServerError
    })
}

pub async fn commit(tx: Tx<'_>) -> Result<(), DatabaseError> {
    tx.commit().await.map_err(|e| {
        tracing::error!("committing transaction failed >>> {}", e);
        DatabaseError::ServerError
    })
}

#[derive(Clone, Copy, Debug)]
pub struct Page {
    pub skip: i64,
    pub limit: i64,
}

impl Page {
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        let page = page.unwrap_or(1).max(1);
        let limit = limit.unwrap_or(10).clamp(1, 100);
        Self {
            skip: (page - 1) * limit,
            limit,
        }
    }

    pub fn current(&self) -> i64 {
        self.skip / self.limit + 1
    }
}

#[cfg(test)]
mod tests {
    use super::Page;

    #[test]
    fn page_defaults_and_bounds() {
        let page = Page::new(None, None);
        assert_eq!((page.skip, page.limit, page.current()), (0, 10, 1));

        let page = Page::new(Some(3), Some(20));
        assert_eq!((page.skip, page.limit, page.current()), (40, 20, 3));

        let page = Page::new(Some(0), Some(1000));
        assert_eq!((page.skip, page.limit), (0, 100));
    }
}
