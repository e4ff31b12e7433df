use rust_decimal::Decimal;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use serde_aux::field_attributes::deserialize_number_from_string;
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use time::Duration;

use crate::domain::{accrual::AccrualEngine, mining::MiningTimer, user::SIGNUP_BONUS};

#[derive(Deserialize, Clone)]
pub struct Config {
    pub application: ApplicationConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub rewards: RewardsConfig,
}

#[derive(Deserialize, Clone)]
pub struct ApplicationConfig {
    pub host: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    /// Default tracing filter when `RUST_LOG` is unset.
    pub debug_mode: String,
}

#[derive(Deserialize, Clone)]
pub struct DatabaseConfig {
    pub username: String,
    pub password: Secret<String>,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
    pub database_name: String,
    pub require_ssl: bool,
}

impl DatabaseConfig {
    pub fn get_connect_options(&self) -> PgConnectOptions {
        let ssl_mode = if self.require_ssl {
            PgSslMode::Require
        } else {
            PgSslMode::Prefer
        };

        PgConnectOptions::new()
            .host(&self.host)
            .username(&self.username)
            .password(self.password.expose_secret())
            .port(self.port)
            .ssl_mode(ssl_mode)
            .database(&self.database_name)
    }
}

#[derive(Deserialize, Clone)]
pub struct JwtConfig {
    pub secret: Secret<String>,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub exp: u64,
    pub iss: String,
}

#[derive(Deserialize, Clone)]
pub struct RewardsConfig {
    #[serde(
        default = "default_signup_bonus",
        deserialize_with = "deserialize_number_from_string"
    )]
    pub signup_bonus: i64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub referral_bonus: i64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub mining_duration_secs: i64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub mining_cooldown_secs: i64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub mining_reward: i64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub accrual_threshold_secs: i64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub accrual_check_interval_secs: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub min_withdrawal: Decimal,
    #[serde(default)]
    pub admin_emails: Vec<String>,
}

fn default_signup_bonus() -> i64 {
    SIGNUP_BONUS
}

impl RewardsConfig {
    pub fn accrual_engine(&self) -> AccrualEngine {
        AccrualEngine::new(Duration::seconds(self.accrual_threshold_secs))
    }

    pub fn mining_timer(&self) -> MiningTimer {
        MiningTimer::new(
            Duration::seconds(self.mining_duration_secs),
            Duration::seconds(self.mining_cooldown_secs),
            self.mining_reward,
        )
    }

    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails
            .iter()
            .any(|admin| admin.trim().eq_ignore_ascii_case(email))
    }
}

pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `local` or `production`.",
                other
            )),
        }
    }
}

/// Layers `base.yaml`, the `APP_ENVIRONMENT` file and `APP_*` variables.
pub fn get_config() -> Result<Config, config::ConfigError> {
    let base_path = std::env::current_dir().map_err(|e| config::ConfigError::Foreign(Box::new(e)))?;
    let config_directory = base_path.join("configuration");

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(config::ConfigError::Message)?;
    let environment_filename = format!("{}.yaml", environment.as_str());

    let settings = config::Config::builder()
        .add_source(config::File::from(config_directory.join("base.yaml")))
        .add_source(config::File::from(config_directory.join(environment_filename)))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Config>()
}
