use uuid::Uuid;

use super::{errors::ApiError, user::User};

/// The authenticated caller, resolved once per request by the auth layer and
/// handed to every handler explicitly.
#[derive(Clone, Debug)]
pub struct Session {
    pub user: User,
}

impl Session {
    pub fn new(user: User) -> Self {
        Self { user }
    }

    pub fn user_id(&self) -> Uuid {
        self.user.id
    }

    pub fn is_admin(&self) -> bool {
        self.user.is_admin
    }

    pub fn ensure_admin(&self) -> Result<(), ApiError> {
        if self.is_admin() {
            Ok(())
        } else {
            tracing::warn!("non-admin {} attempted an admin action", self.user.email);
            Err(ApiError::Forbidden)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        fields::{Email, ReferralCode},
        mining::MiningSession,
    };
    use rust_decimal::Decimal;
    use time::macros::datetime;

    fn session(is_admin: bool) -> Session {
        let email = Email::parse("ops@example.com").unwrap();
        Session::new(User {
            id: Uuid::new_v4(),
            referral_code: ReferralCode::new(&email),
            email,
            coins: 0,
            earnings: Decimal::ZERO,
            applied_referral_code: None,
            referred_by: None,
            withdrawal_address: None,
            last_earnings_update: None,
            mining: MiningSession::Idle,
            is_admin,
            referrals: 0,
            version: 1,
            created_on: datetime!(2024-01-01 00:00 UTC),
        })
    }

    #[test]
    fn only_admins_pass_the_admin_check() {
        assert!(session(true).ensure_admin().is_ok());
        assert!(matches!(
            session(false).ensure_admin(),
            Err(ApiError::Forbidden)
        ));
    }
}
