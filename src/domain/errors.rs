use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

#[derive(Debug, PartialEq, Eq)]
pub enum DatabaseError {
    ServerError,
    NotFound,
    Conflict,
}

#[derive(Debug, PartialEq, Eq)]
pub enum WorkflowError {
    NotFound,
    AlreadyProcessed,
    InsufficientBalance,
    InvalidAmount,
    MissingWithdrawalAddress,
    PlanUnavailable,
}

#[derive(Debug, PartialEq, Eq)]
pub enum MiningError {
    AlreadyMining,
    CoolingDown { remaining_secs: i64 },
}

#[derive(Debug, PartialEq, Eq)]
pub enum ProfileError {
    StaleVersion,
    ReferralAlreadyApplied,
    SelfReferral,
    InvalidReferralCode,
}

/// Failure while persisting an administrator's decision.
#[derive(Debug, PartialEq, Eq)]
pub enum ReviewError {
    Workflow(WorkflowError),
    Database(DatabaseError),
}

impl From<WorkflowError> for ReviewError {
    fn from(value: WorkflowError) -> Self {
        Self::Workflow(value)
    }
}

impl From<DatabaseError> for ReviewError {
    fn from(value: DatabaseError) -> Self {
        Self::Database(value)
    }
}

#[derive(Debug)]
pub enum ApiError {
    InvalidReferralCode,
    InvalidEmail,
    ServerError,
    AuthenticationError,
    Forbidden,
    NotFound,
    Conflict(String),
    BadRequest(String),
}

impl From<DatabaseError> for ApiError {
    fn from(value: DatabaseError) -> Self {
        match value {
            DatabaseError::ServerError => Self::ServerError,
            DatabaseError::NotFound => Self::NotFound,
            DatabaseError::Conflict => Self::Conflict("Record was modified concurrently".into()),
        }
    }
}

impl From<WorkflowError> for ApiError {
    fn from(value: WorkflowError) -> Self {
        match value {
            WorkflowError::NotFound => Self::NotFound,
            WorkflowError::AlreadyProcessed => Self::Conflict("Request already processed".into()),
            WorkflowError::InsufficientBalance => Self::BadRequest("Insufficient balance".into()),
            WorkflowError::InvalidAmount => Self::BadRequest("Invalid amount".into()),
            WorkflowError::MissingWithdrawalAddress => {
                Self::BadRequest("Withdrawal address is required".into())
            }
            WorkflowError::PlanUnavailable => Self::BadRequest("Plan is not available".into()),
        }
    }
}

impl From<ReviewError> for ApiError {
    fn from(value: ReviewError) -> Self {
        match value {
            ReviewError::Workflow(e) => e.into(),
            ReviewError::Database(e) => e.into(),
        }
    }
}

impl From<MiningError> for ApiError {
    fn from(value: MiningError) -> Self {
        match value {
            MiningError::AlreadyMining => Self::Conflict("Mining session already running".into()),
            MiningError::CoolingDown { remaining_secs } => Self::Conflict(format!(
                "Mining is cooling down, try again in {} seconds",
                remaining_secs
            )),
        }
    }
}

impl From<ProfileError> for ApiError {
    fn from(value: ProfileError) -> Self {
        match value {
            ProfileError::StaleVersion => Self::Conflict("Profile was updated elsewhere".into()),
            ProfileError::ReferralAlreadyApplied => {
                Self::BadRequest("A referral code was already applied".into())
            }
            ProfileError::SelfReferral => {
                Self::BadRequest("You cannot apply your own referral code".into())
            }
            ProfileError::InvalidReferralCode => Self::InvalidReferralCode,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_message) = match self {
            Self::InvalidReferralCode => {
                (StatusCode::BAD_REQUEST, "Invalid referral code".to_string())
            }
            Self::InvalidEmail => (StatusCode::BAD_REQUEST, "Invalid email".to_string()),
            Self::ServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Something went wrong".to_string(),
            ),
            Self::AuthenticationError => {
                (StatusCode::UNAUTHORIZED, "Authentication failed".to_string())
            }
            Self::Forbidden => (StatusCode::FORBIDDEN, "Admin access required".to_string()),
            Self::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
            Self::Conflict(message) => (StatusCode::CONFLICT, message),
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}

#[derive(Debug)]
pub enum JWTError {
    GenerationFailed(jsonwebtoken::errors::ErrorKind),
    DecodeFailed(jsonwebtoken::errors::ErrorKind),
}

impl From<JWTError> for ApiError {
    fn from(_value: JWTError) -> Self {
        Self::AuthenticationError
    }
}
