use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use super::requests::RequestStatus;

#[derive(Serialize, Deserialize, FromRow)]
pub struct DbUser {
    pub id: Uuid,
    pub(crate) email: String,
    pub(crate) coins: i64,
    pub(crate) earnings: Decimal,
    pub(crate) referral_code: String,
    pub(crate) applied_referral_code: Option<String>,
    pub(crate) referred_by: Option<Uuid>,
    pub(crate) withdrawal_address: Option<String>,
    pub(crate) last_earnings_update: Option<OffsetDateTime>,
    pub(crate) mining_started_at: Option<OffsetDateTime>,
    pub(crate) mining_cooldown_until: Option<OffsetDateTime>,
    pub(crate) is_admin: bool,
    pub(crate) version: i64,
    pub(crate) referrals: Option<i64>,
    pub(crate) created_on: OffsetDateTime,
}

#[derive(Serialize, Deserialize, FromRow)]
pub struct DbPlanOffer {
    pub id: Uuid,
    pub(crate) name: String,
    pub(crate) price: Decimal,
    pub(crate) daily_rate: Decimal,
    pub(crate) duration_days: i32,
    pub(crate) is_active: bool,
}

#[derive(Serialize, Deserialize, FromRow)]
pub struct DbPlan {
    pub id: Uuid,
    pub(crate) user_id: Uuid,
    pub(crate) offer_id: Option<Uuid>,
    pub(crate) name: String,
    pub(crate) principal: Decimal,
    pub(crate) daily_rate: Decimal,
    pub(crate) started_at: OffsetDateTime,
    pub(crate) expires_at: OffsetDateTime,
}

#[derive(Serialize, Deserialize, FromRow)]
pub struct DbNotification {
    pub id: Uuid,
    pub(crate) user_id: Uuid,
    pub(crate) message: String,
    pub(crate) is_read: bool,
    pub(crate) created_on: OffsetDateTime,
}

#[derive(FromRow)]
pub struct DbWithdrawalRequest {
    pub id: Uuid,
    pub(crate) user_id: Uuid,
    pub(crate) email: String,
    pub(crate) amount: Decimal,
    pub(crate) address: String,
    pub(crate) status: RequestStatus,
    pub(crate) created_on: OffsetDateTime,
    pub(crate) processed_at: Option<OffsetDateTime>,
}

#[derive(FromRow)]
pub struct DbDepositRequest {
    pub id: Uuid,
    pub(crate) user_id: Uuid,
    pub(crate) email: String,
    pub(crate) offer_id: Uuid,
    pub(crate) plan_name: String,
    pub(crate) amount: Decimal,
    pub(crate) daily_rate: Decimal,
    pub(crate) duration_days: i32,
    pub(crate) tx_reference: Option<String>,
    pub(crate) status: RequestStatus,
    pub(crate) created_on: OffsetDateTime,
    pub(crate) processed_at: Option<OffsetDateTime>,
}
