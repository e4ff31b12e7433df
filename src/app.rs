use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::Duration,
};

use crate::{
    config::{Config, DatabaseConfig},
    domain::{accrual::AccrualEngine, events::AppEvent, mining::MiningTimer},
    routes::{
        auth::{authenticate, check_auth, require_admin},
        earnings::{claim_mining, get_mining_status, start_mining, sync_user_earnings},
        event::stream,
        health,
        notifications::{get_user_notifications, mark_all_notifications_read, mark_notification_read},
        plans::{create_offer, get_offers, update_offer},
        requests::{
            approve_deposit, approve_withdrawal, create_deposit, create_withdrawal,
            get_all_deposits, get_all_withdrawals, get_my_deposits, get_my_withdrawals,
            reject_deposit, reject_withdrawal,
        },
        user::{get_authenticated_user, get_my_referrals, get_users, remove_user, update_authenticated_user},
    },
    sync::run_accrual_sweep,
};
use axum::{
    middleware,
    routing::{delete, get, post, put},
    Extension, Router,
};
use sqlx::{postgres::PgPoolOptions, Pool, Postgres};
use time::OffsetDateTime;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tracing_subscriber::layer::SubscriberExt;

#[derive(Clone)]
pub struct Db(Pool<Postgres>);

impl Db {
    pub fn inner(&self) -> Pool<Postgres> {
        self.0.clone()
    }
}

#[derive(Clone)]
pub struct AppState {
    db_pool: Db,
    tx: broadcast::Sender<AppEvent>,
    pub config: Config,
}

impl AppState {
    pub fn get_pool(&self) -> Pool<Postgres> {
        self.db_pool.inner()
    }

    pub fn get_sender(&self) -> broadcast::Sender<AppEvent> {
        self.tx.clone()
    }

    pub fn accrual_engine(&self) -> AccrualEngine {
        self.config.rewards.accrual_engine()
    }

    pub fn mining_timer(&self) -> MiningTimer {
        self.config.rewards.mining_timer()
    }
}

pub struct Application;

impl Application {
    pub async fn build(config: Config) -> anyhow::Result<()> {
        Self::setup_tracing(&config.application.debug_mode)?;

        let db_pool = Self::get_pool(&config.database).await;
        sqlx::migrate!("./migrations").run(&db_pool.inner()).await?;

        let (tx, _rx) = broadcast::channel(100);
        let app_state = Arc::new(AppState {
            db_pool: db_pool.clone(),
            tx,
            config: config.clone(),
        });

        Self::spawn_accrual_sweep(app_state.clone());

        let admin = Router::new()
            .route("/users", get(get_users))
            .route("/users/:id", delete(remove_user))
            .route("/withdrawals", get(get_all_withdrawals))
            .route("/withdrawals/:id/approve", post(approve_withdrawal))
            .route("/withdrawals/:id/reject", post(reject_withdrawal))
            .route("/deposits", get(get_all_deposits))
            .route("/deposits/:id/approve", post(approve_deposit))
            .route("/deposits/:id/reject", post(reject_deposit))
            .route("/plans", post(create_offer))
            .route("/plans/:id", put(update_offer))
            .route("/stream", get(stream))
            .route_layer(middleware::from_fn(require_admin));

        let cors = CorsLayer::permissive();
        let app = Router::new()
            .route(
                "/users/me",
                get(get_authenticated_user).patch(update_authenticated_user),
            )
            .route("/referrals", get(get_my_referrals))
            .route("/earnings/sync", post(sync_user_earnings))
            .route("/mining", get(get_mining_status))
            .route("/mining/start", post(start_mining))
            .route("/mining/claim", post(claim_mining))
            .route("/plans", get(get_offers))
            .route("/notifications", get(get_user_notifications))
            .route("/notifications/read-all", post(mark_all_notifications_read))
            .route("/notifications/:id/read", post(mark_notification_read))
            .route("/withdrawals", get(get_my_withdrawals).post(create_withdrawal))
            .route("/deposits", get(get_my_deposits).post(create_deposit))
            .nest("/admin", admin)
            .route_layer(middleware::from_fn(check_auth))
            .route("/health", get(health))
            .route("/authenticate", post(authenticate))
            .with_state(app_state)
            .layer(Extension(db_pool.clone()))
            .layer(Extension(config.clone()))
            .layer(cors);

        let ip = config.application.host.parse::<IpAddr>()?;
        let addr = SocketAddr::new(ip, config.application.port);
        tracing::info!("listening on {}", addr.port());
        axum::Server::bind(&addr)
            .serve(app.into_make_service())
            .await?;

        Ok(())
    }

    fn setup_tracing(debug_mode: &str) -> anyhow::Result<()> {
        tracing_log::LogTracer::init()?;
        let subscriber = tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| debug_mode.into()),
            )
            .with(tracing_subscriber::fmt::layer());
        tracing::subscriber::set_global_default(subscriber)?;
        Ok(())
    }

    async fn get_pool(db_config: &DatabaseConfig) -> Db {
        let pool = PgPoolOptions::new()
            .acquire_timeout(std::time::Duration::from_secs(2))
            .connect_lazy_with(db_config.get_connect_options());
        Db(pool)
    }

    fn spawn_accrual_sweep(state: Arc<AppState>) {
        let period = Duration::from_secs(state.config.rewards.accrual_check_interval_secs.max(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                match run_accrual_sweep(&state, OffsetDateTime::now_utc()).await {
                    Ok(credited) => tracing::info!("accrual sweep credited {} user(s)", credited),
                    Err(e) => tracing::error!("accrual sweep failed >>> {:?}", e),
                }
            }
        });
    }
}
