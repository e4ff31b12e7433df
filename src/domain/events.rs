use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use super::{
    fields::Email,
    requests::{DepositRequest, RequestStatus, WithdrawalRequest},
    user::User,
};

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct NewReferralEvent {
    pub referrer: Uuid,
    pub referred_user: Email,
    pub bonus: i64,
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RequestProcessedEvent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: RequestStatus,
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct EarningsCreditedEvent {
    pub user_id: Uuid,
    pub amount: Decimal,
    pub periods: i64,
}

/// Broadcast to the admin live stream.
#[derive(Serialize, Clone, Debug)]
#[serde(tag = "type", content = "data")]
pub enum AppEvent {
    NewLogin(User),
    NewRegister(User),
    NewReferral(NewReferralEvent),
    WithdrawalRequested(WithdrawalRequest),
    DepositRequested(DepositRequest),
    WithdrawalProcessed(RequestProcessedEvent),
    DepositProcessed(RequestProcessedEvent),
    EarningsCredited(EarningsCreditedEvent),
}
