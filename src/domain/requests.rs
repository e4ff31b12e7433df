//! Withdrawal and deposit requests and the review workflow they share.
//!
//! A request starts `pending` and is moved exactly once to `approved` or
//! `rejected` by an administrator. Processing a request yields every change
//! it implies (status, balance debit or new plan, notification) as one
//! outcome so the caller can persist them in a single transaction.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{
    errors::WorkflowError,
    fields::Email,
    model::{DbDepositRequest, DbWithdrawalRequest},
    user::{plan_expiry, Notification, Plan, PlanOffer, User},
};

#[derive(Serialize, Deserialize, sqlx::Type, Clone, Copy, Debug, PartialEq, Eq)]
#[sqlx(type_name = "request_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}

impl RequestStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn decide(self, decision: Decision) -> Result<Self, WorkflowError> {
        if self.is_terminal() {
            return Err(WorkflowError::AlreadyProcessed);
        }

        Ok(match decision {
            Decision::Approve => Self::Approved,
            Decision::Reject => Self::Rejected,
        })
    }
}

pub trait Reviewable {
    fn status(&self) -> RequestStatus;
    fn mark(&mut self, status: RequestStatus, at: OffsetDateTime);
}

/// Moves a pending request to its terminal state. Terminal requests are left
/// untouched.
pub fn review<R: Reviewable>(
    request: &mut R,
    decision: Decision,
    now: OffsetDateTime,
) -> Result<RequestStatus, WorkflowError> {
    let next = request.status().decide(decision)?;
    request.mark(next, now);
    Ok(next)
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email: Email,
    pub amount: Decimal,
    pub address: String,
    pub status: RequestStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_on: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub processed_at: Option<OffsetDateTime>,
}

impl WithdrawalRequest {
    /// Validates a user's withdrawal against their current earnings.
    pub fn open(
        user: &User,
        amount: Decimal,
        address: Option<String>,
        min_withdrawal: Decimal,
        now: OffsetDateTime,
    ) -> Result<Self, WorkflowError> {
        if amount <= Decimal::ZERO || amount < min_withdrawal {
            return Err(WorkflowError::InvalidAmount);
        }
        if amount > user.earnings {
            return Err(WorkflowError::InsufficientBalance);
        }

        let address = [address, user.withdrawal_address.clone()]
            .into_iter()
            .flatten()
            .map(|a| a.trim().to_string())
            .find(|a| !a.is_empty())
            .ok_or(WorkflowError::MissingWithdrawalAddress)?;

        Ok(Self {
            id: Uuid::new_v4(),
            user_id: user.id,
            email: user.email.clone(),
            amount,
            address,
            status: RequestStatus::Pending,
            created_on: now,
            processed_at: None,
        })
    }
}

impl Reviewable for WithdrawalRequest {
    fn status(&self) -> RequestStatus {
        self.status
    }

    fn mark(&mut self, status: RequestStatus, at: OffsetDateTime) {
        self.status = status;
        self.processed_at = Some(at);
    }
}

impl From<DbWithdrawalRequest> for WithdrawalRequest {
    fn from(value: DbWithdrawalRequest) -> Self {
        Self {
            id: value.id,
            user_id: value.user_id,
            email: Email::from_stored(value.email),
            amount: value.amount,
            address: value.address,
            status: value.status,
            created_on: value.created_on,
            processed_at: value.processed_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WithdrawalOutcome {
    pub request: WithdrawalRequest,
    pub debit: Decimal,
    pub notification: Notification,
}

/// Approval debits the requester's earnings; the balance is checked again
/// because it may have moved since the request was opened.
pub fn process_withdrawal(
    mut request: WithdrawalRequest,
    owner: &User,
    decision: Decision,
    now: OffsetDateTime,
) -> Result<WithdrawalOutcome, WorkflowError> {
    if decision == Decision::Approve
        && !request.status.is_terminal()
        && owner.earnings < request.amount
    {
        return Err(WorkflowError::InsufficientBalance);
    }

    let status = review(&mut request, decision, now)?;
    let (debit, message) = match status {
        RequestStatus::Approved => (
            request.amount,
            format!(
                "Your withdrawal of {} USDT to {} has been approved.",
                request.amount, request.address
            ),
        ),
        _ => (
            Decimal::ZERO,
            format!("Your withdrawal of {} USDT was rejected.", request.amount),
        ),
    };

    Ok(WithdrawalOutcome {
        notification: Notification::new(request.user_id, message, now),
        request,
        debit,
    })
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DepositRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email: Email,
    pub offer_id: Uuid,
    pub plan_name: String,
    pub amount: Decimal,
    pub daily_rate: Decimal,
    pub duration_days: i32,
    pub tx_reference: Option<String>,
    pub status: RequestStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_on: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub processed_at: Option<OffsetDateTime>,
}

impl DepositRequest {
    /// Snapshots the offer so later catalog edits don't change what was bought.
    pub fn open(
        user: &User,
        offer: &PlanOffer,
        tx_reference: Option<String>,
        now: OffsetDateTime,
    ) -> Result<Self, WorkflowError> {
        if !offer.is_active || offer.duration_days <= 0 {
            return Err(WorkflowError::PlanUnavailable);
        }

        Ok(Self {
            id: Uuid::new_v4(),
            user_id: user.id,
            email: user.email.clone(),
            offer_id: offer.id,
            plan_name: offer.name.clone(),
            amount: offer.price,
            daily_rate: offer.daily_rate,
            duration_days: offer.duration_days,
            tx_reference: tx_reference.filter(|r| !r.trim().is_empty()),
            status: RequestStatus::Pending,
            created_on: now,
            processed_at: None,
        })
    }
}

impl Reviewable for DepositRequest {
    fn status(&self) -> RequestStatus {
        self.status
    }

    fn mark(&mut self, status: RequestStatus, at: OffsetDateTime) {
        self.status = status;
        self.processed_at = Some(at);
    }
}

impl From<DbDepositRequest> for DepositRequest {
    fn from(value: DbDepositRequest) -> Self {
        Self {
            id: value.id,
            user_id: value.user_id,
            email: Email::from_stored(value.email),
            offer_id: value.offer_id,
            plan_name: value.plan_name,
            amount: value.amount,
            daily_rate: value.daily_rate,
            duration_days: value.duration_days,
            tx_reference: value.tx_reference,
            status: value.status,
            created_on: value.created_on,
            processed_at: value.processed_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DepositOutcome {
    pub request: DepositRequest,
    pub plan: Option<Plan>,
    pub notification: Notification,
}

/// Approval activates the purchased plan from `now`.
pub fn process_deposit(
    mut request: DepositRequest,
    decision: Decision,
    now: OffsetDateTime,
) -> Result<DepositOutcome, WorkflowError> {
    let status = review(&mut request, decision, now)?;
    let (plan, message) = match status {
        RequestStatus::Approved => {
            let plan = Plan {
                id: Uuid::new_v4(),
                user_id: request.user_id,
                offer_id: Some(request.offer_id),
                name: request.plan_name.clone(),
                principal: request.amount,
                daily_rate: request.daily_rate,
                started_at: now,
                expires_at: plan_expiry(now, request.duration_days),
            };
            let message = format!(
                "Your deposit of {} USDT was approved. {} is now active for {} days.",
                request.amount, request.plan_name, request.duration_days
            );
            (Some(plan), message)
        }
        _ => (
            None,
            format!(
                "Your deposit of {} USDT for {} was rejected.",
                request.amount, request.plan_name
            ),
        ),
    };

    Ok(DepositOutcome {
        notification: Notification::new(request.user_id, message, now),
        request,
        plan,
    })
}
