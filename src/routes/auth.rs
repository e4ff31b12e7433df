use crate::{
    app::{AppState, Db},
    config::{Config, RewardsConfig},
    domain::{
        errors::{ApiError, DatabaseError},
        events::{AppEvent, NewReferralEvent},
        fields::{Email, ReferralCode},
        session::Session,
        user::{NewUser, User},
    },
    repository::users::{create_new_user, get_user_by_email, get_user_by_id, get_user_by_referral_code},
    utils::jwt::{decode_auth_token, generate_auth_token},
};
use axum::{
    extract::State,
    headers::{authorization::Bearer, Authorization},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Extension, Json, TypedHeader,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticateRequest {
    email: String,
    referral_code: Option<ReferralCode>,
}

#[derive(Serialize)]
pub struct AuthenticateResponse {
    token: String,
}

impl From<String> for AuthenticateResponse {
    fn from(token: String) -> Self {
        Self { token }
    }
}

/// Signs a user in, registering them on first sight.
pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AuthenticateRequest>,
) -> Result<Json<AuthenticateResponse>, ApiError> {
    let pool = state.get_pool();
    let email = Email::parse(&payload.email).ok_or(ApiError::InvalidEmail)?;
    tracing::info!("authenticating user >>> {}", email);

    if let Some(user) = get_user_by_email(&pool, &email).await? {
        let _ = state.get_sender().send(AppEvent::NewLogin(user.clone()));
        let token = generate_auth_token(user.id, &state.config.jwt)?;
        return Ok(Json(token.into()));
    }

    let referrer = match payload.referral_code {
        Some(code) => Some(
            get_user_by_referral_code(&pool, &code)
                .await?
                .ok_or(ApiError::InvalidReferralCode)?,
        ),
        None => None,
    };

    let rewards = &state.config.rewards;
    let registration = register(
        &pool,
        rewards,
        &email,
        referrer.as_ref(),
        || ReferralCode::new(&email),
        OffsetDateTime::now_utc(),
    )
    .await?;

    let user = match registration {
        Registration::Created(user) => user,
        Registration::Existing(user) => {
            let token = generate_auth_token(user.id, &state.config.jwt)?;
            return Ok(Json(token.into()));
        }
    };

    if let Some(referrer) = referrer {
        let _ = state
            .get_sender()
            .send(AppEvent::NewReferral(NewReferralEvent {
                referrer: referrer.id,
                referred_user: user.email.clone(),
                bonus: rewards.referral_bonus,
            }));
    }

    let _ = state.get_sender().send(AppEvent::NewRegister(user.clone()));
    let token = generate_auth_token(user.id, &state.config.jwt)?;
    Ok(Json(token.into()))
}

const MAX_CODE_ATTEMPTS: usize = 5;

#[derive(Debug)]
pub enum Registration {
    Created(User),
    /// Another request registered the email first.
    Existing(User),
}

/// Inserts a new user, drawing a fresh referral code from `next_code` when
/// the previous one is already taken.
pub async fn register(
    pool: &PgPool,
    rewards: &RewardsConfig,
    email: &Email,
    referrer: Option<&User>,
    mut next_code: impl FnMut() -> ReferralCode,
    now: OffsetDateTime,
) -> Result<Registration, ApiError> {
    for attempt in 1..=MAX_CODE_ATTEMPTS {
        let mut new_user = NewUser::new(email.clone(), next_code(), rewards.signup_bonus)
            .admin(rewards.is_admin_email(email.as_ref()));
        if let Some(referrer) = referrer {
            new_user = new_user.referred_by(referrer);
        }

        match create_new_user(pool, &new_user, rewards.referral_bonus, now).await {
            Ok(()) => {
                let user = get_user_by_id(pool, new_user.id)
                    .await?
                    .ok_or(ApiError::ServerError)?;
                return Ok(Registration::Created(user));
            }
            Err(DatabaseError::Conflict) => {
                if let Some(user) = get_user_by_email(pool, email).await? {
                    tracing::warn!("user {} registered concurrently", email);
                    return Ok(Registration::Existing(user));
                }
                tracing::warn!(
                    "referral code {} taken, retrying ({}/{})",
                    new_user.referral_code,
                    attempt,
                    MAX_CODE_ATTEMPTS
                );
            }
            Err(e) => return Err(e.into()),
        }
    }

    tracing::error!("no free referral code for {}", email);
    Err(ApiError::ServerError)
}

pub async fn check_auth<B>(
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request<B>,
    next: Next<B>,
) -> Response {
    let Some(TypedHeader(auth)) = auth else {
        return ApiError::AuthenticationError.into_response();
    };

    let config = match request.extensions().get::<Config>() {
        Some(c) => c,
        None => return (StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    };

    let user_id = decode_auth_token(auth.token(), &config.jwt)
        .ok()
        .and_then(|claims| Uuid::parse_str(&claims.sub).ok());

    let pool = match request.extensions().get::<Db>() {
        Some(s) => s.inner(),
        None => return (StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    };

    if let Some(user_id) = user_id {
        if let Ok(Some(user)) = get_user_by_id(&pool, user_id).await {
            request.extensions_mut().insert(Session::new(user));
            let response = next.run(request).await;
            return response;
        }
    }

    ApiError::AuthenticationError.into_response()
}

pub async fn require_admin<B>(
    Extension(session): Extension<Session>,
    request: Request<B>,
    next: Next<B>,
) -> Response {
    match session.ensure_admin() {
        Ok(()) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}
