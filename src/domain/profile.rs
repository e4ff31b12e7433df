use serde::Deserialize;
use uuid::Uuid;

use super::{errors::ProfileError, fields::ReferralCode, user::User};

/// Partial update of the signed-in user's editable fields. Absent fields are
/// left as they are.
#[derive(Deserialize, Default, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub withdrawal_address: Option<String>,
    pub referral_code: Option<ReferralCode>,
    /// Rejects the update when the stored version moved on. Without it the
    /// last write wins.
    pub expected_version: Option<i64>,
}

/// The merged view of the user plus which columns the update touched. Only
/// touched columns are written, so a merge built from an older snapshot
/// never overwrites fields it did not change.
#[derive(Debug, Clone)]
pub struct MergedProfile {
    pub user: User,
    pub address_changed: bool,
    /// Set when this update applied a referral code for the first time.
    pub new_referrer: Option<Uuid>,
}

impl MergedProfile {
    pub fn is_noop(&self) -> bool {
        !self.address_changed && self.new_referrer.is_none()
    }
}

/// Folds `update` into `current`. `referrer` is the owner of
/// `update.referral_code`, if that code resolved.
pub fn merge(
    current: &User,
    update: ProfileUpdate,
    referrer: Option<&User>,
) -> Result<MergedProfile, ProfileError> {
    if let Some(expected) = update.expected_version {
        if expected != current.version {
            return Err(ProfileError::StaleVersion);
        }
    }

    let mut user = current.clone();
    let mut new_referrer = None;
    let mut address_changed = false;

    if let Some(address) = update.withdrawal_address {
        let address = address.trim().to_string();
        user.withdrawal_address = (!address.is_empty()).then_some(address);
        address_changed = true;
    }

    if let Some(code) = update.referral_code {
        if current.applied_referral_code.is_some() {
            return Err(ProfileError::ReferralAlreadyApplied);
        }
        if code == current.referral_code {
            return Err(ProfileError::SelfReferral);
        }
        let referrer = referrer
            .filter(|r| r.referral_code == code)
            .ok_or(ProfileError::InvalidReferralCode)?;
        if referrer.id == current.id {
            return Err(ProfileError::SelfReferral);
        }

        user.applied_referral_code = Some(code);
        user.referred_by = Some(referrer.id);
        new_referrer = Some(referrer.id);
    }

    user.version = current.version + 1;
    Ok(MergedProfile {
        user,
        address_changed,
        new_referrer,
    })
}
