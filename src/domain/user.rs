use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use super::{
    fields::{Email, ReferralCode},
    mining::{MiningSession, MiningStatus},
    model::{DbNotification, DbPlan, DbPlanOffer, DbUser},
};

pub const SIGNUP_BONUS: i64 = 200;

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: Email,
    pub coins: i64,
    pub earnings: Decimal,
    pub referral_code: ReferralCode,
    pub applied_referral_code: Option<ReferralCode>,
    pub referred_by: Option<Uuid>,
    pub withdrawal_address: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_earnings_update: Option<OffsetDateTime>,
    pub mining: MiningSession,
    pub is_admin: bool,
    pub referrals: i64,
    pub version: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_on: OffsetDateTime,
}

impl From<DbUser> for User {
    fn from(value: DbUser) -> Self {
        Self {
            id: value.id,
            email: Email::from_stored(value.email),
            coins: value.coins,
            earnings: value.earnings,
            referral_code: value.referral_code.into(),
            applied_referral_code: value.applied_referral_code.map(ReferralCode::from),
            referred_by: value.referred_by,
            withdrawal_address: value.withdrawal_address,
            last_earnings_update: value.last_earnings_update,
            mining: MiningSession::from_columns(
                value.mining_started_at,
                value.mining_cooldown_until,
            ),
            is_admin: value.is_admin,
            referrals: value.referrals.unwrap_or(0),
            version: value.version,
            created_on: value.created_on,
        }
    }
}

/// A user about to be inserted at sign-up.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: Uuid,
    pub email: Email,
    pub coins: i64,
    pub referral_code: ReferralCode,
    pub applied_referral_code: Option<ReferralCode>,
    pub referred_by: Option<Uuid>,
    pub is_admin: bool,
}

impl NewUser {
    pub fn new(email: Email, referral_code: ReferralCode, signup_bonus: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            email,
            coins: signup_bonus,
            referral_code,
            applied_referral_code: None,
            referred_by: None,
            is_admin: false,
        }
    }

    pub fn referred_by(mut self, referrer: &User) -> Self {
        self.applied_referral_code = Some(referrer.referral_code.clone());
        self.referred_by = Some(referrer.id);
        self
    }

    pub fn admin(mut self, is_admin: bool) -> Self {
        self.is_admin = is_admin;
        self
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PlanOffer {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub daily_rate: Decimal,
    pub duration_days: i32,
    pub is_active: bool,
}

impl From<DbPlanOffer> for PlanOffer {
    fn from(value: DbPlanOffer) -> Self {
        Self {
            id: value.id,
            name: value.name,
            price: value.price,
            daily_rate: value.daily_rate,
            duration_days: value.duration_days,
            is_active: value.is_active,
        }
    }
}

/// An active (or lapsed) subscription owned by a user.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: Uuid,
    pub user_id: Uuid,
    pub offer_id: Option<Uuid>,
    pub name: String,
    pub principal: Decimal,
    pub daily_rate: Decimal,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl Plan {
    pub fn is_active(&self, now: OffsetDateTime) -> bool {
        self.started_at <= now && now < self.expires_at
    }

    pub fn days_remaining(&self, now: OffsetDateTime) -> i64 {
        (self.expires_at - now).whole_days().max(0)
    }
}

impl From<DbPlan> for Plan {
    fn from(value: DbPlan) -> Self {
        Self {
            id: value.id,
            user_id: value.user_id,
            offer_id: value.offer_id,
            name: value.name,
            principal: value.principal,
            daily_rate: value.daily_rate,
            started_at: value.started_at,
            expires_at: value.expires_at,
        }
    }
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlanView {
    #[serde(flatten)]
    pub plan: Plan,
    pub active: bool,
    pub days_remaining: i64,
}

impl PlanView {
    pub fn new(plan: Plan, now: OffsetDateTime) -> Self {
        Self {
            active: plan.is_active(now),
            days_remaining: plan.days_remaining(now),
            plan,
        }
    }
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub message: String,
    pub read: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_on: OffsetDateTime,
}

impl Notification {
    pub fn new(user_id: Uuid, message: impl Into<String>, now: OffsetDateTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            message: message.into(),
            read: false,
            created_on: now,
        }
    }
}

impl From<DbNotification> for Notification {
    fn from(value: DbNotification) -> Self {
        Self {
            id: value.id,
            user_id: value.user_id,
            message: value.message,
            read: value.is_read,
            created_on: value.created_on,
        }
    }
}

/// Everything the dashboard shows for the signed-in user.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: User,
    pub plans: Vec<PlanView>,
    pub notifications: Vec<Notification>,
    pub unread_notifications: i64,
    pub mining_status: MiningStatus,
}

pub fn plan_expiry(started_at: OffsetDateTime, duration_days: i32) -> OffsetDateTime {
    started_at + Duration::days(i64::from(duration_days))
}
