use rand::{distributions::Uniform, prelude::Distribution};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(try_from = "String")]
pub struct Email(String);

impl Email {
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_lowercase();
        let (local, domain) = value.split_once('@')?;
        if local.is_empty() || !domain.contains('.') || domain.starts_with('.') {
            return None;
        }
        Some(Self(value))
    }

    /// Rows in `users` were validated on the way in.
    pub(crate) fn from_stored(value: String) -> Self {
        Self(value)
    }

    pub fn inner(&self) -> String {
        self.0.to_owned()
    }

    pub fn local_part(&self) -> &str {
        self.0.split('@').next().unwrap_or_default()
    }
}

impl TryFrom<String> for Email {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("{} is not a valid email", value))
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Shareable code a new user applies to credit whoever invited them.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(from = "String")]
pub struct ReferralCode(String);

impl ReferralCode {
    const PREFIX_LEN: usize = 3;

    pub fn new(email: &Email) -> Self {
        let mut prefix: String = email
            .local_part()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .take(Self::PREFIX_LEN)
            .collect::<String>()
            .to_uppercase();
        while prefix.len() < Self::PREFIX_LEN {
            prefix.push('X');
        }

        Self(format!("{}{}", prefix, Self::generate_referral_code_digit()))
    }

    pub fn inner(&self) -> String {
        self.0.to_owned()
    }

    fn generate_referral_code_digit() -> String {
        let mut rng = rand::thread_rng();
        let uni_sample = Uniform::from(1001..=9999);
        let code = uni_sample.sample(&mut rng);
        code.to_string()
    }
}

impl From<String> for ReferralCode {
    fn from(value: String) -> Self {
        Self(value.trim().to_uppercase())
    }
}

impl AsRef<str> for ReferralCode {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for ReferralCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iss: String,
    pub exp: usize,
}
