//! The account entity.

use std::str::FromStr;

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AuthError;

/// Paid-feature level of an account. Non-standard tiers carry a duration
/// after which the account reverts to [`SubscriptionTier::Standard`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionTier {
    #[serde(rename = "STANDARD")]
    Standard,
    #[serde(rename = "PREMIUM_1_MONTH")]
    Premium1Month,
    #[serde(rename = "PREMIUM_3_MONTHS")]
    Premium3Months,
    #[serde(rename = "PREMIUM_12_MONTHS")]
    Premium12Months,
}

impl SubscriptionTier {
    /// Wire/file name of the tier.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionTier::Standard => "STANDARD",
            SubscriptionTier::Premium1Month => "PREMIUM_1_MONTH",
            SubscriptionTier::Premium3Months => "PREMIUM_3_MONTHS",
            SubscriptionTier::Premium12Months => "PREMIUM_12_MONTHS",
        }
    }

    /// Duration granted by the tier, in calendar months. `None` for tiers
    /// without an expiry.
    pub fn duration_months(&self) -> Option<u32> {
        match self {
            SubscriptionTier::Standard => None,
            SubscriptionTier::Premium1Month => Some(1),
            SubscriptionTier::Premium3Months => Some(3),
            SubscriptionTier::Premium12Months => Some(12),
        }
    }

    /// Expiry instant for a purchase made at `now`.
    pub fn expiry_from(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.duration_months()
            .and_then(|m| now.checked_add_months(Months::new(m)))
    }
}

impl FromStr for SubscriptionTier {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, AuthError> {
        match s {
            "STANDARD" => Ok(SubscriptionTier::Standard),
            "PREMIUM_1_MONTH" => Ok(SubscriptionTier::Premium1Month),
            "PREMIUM_3_MONTHS" => Ok(SubscriptionTier::Premium3Months),
            "PREMIUM_12_MONTHS" => Ok(SubscriptionTier::Premium12Months),
            other => Err(AuthError::InvalidTier(other.to_string())),
        }
    }
}

/// A single account: identity, credential material, and subscription state.
///
/// The server never sees a plaintext password. `password_hash` and
/// `password_salt` are opaque client-derived strings; the salt is handed
/// back on `get_salt` so the client can reproduce its hash.
///
/// Equality and hashing are defined solely by `email`, which is the
/// store's unique natural key (case-sensitive, as stored).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub password_salt: String,
    pub credit: f64,
    pub subscription: SubscriptionTier,
    pub created_at: DateTime<Utc>,
    pub subscription_expire_at: Option<DateTime<Utc>>,
}

impl UserRecord {
    /// Create a fresh STANDARD account with zero credit.
    pub fn new(username: &str, email: &str, password_hash: &str, password_salt: &str) -> Self {
        UserRecord {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            password_salt: password_salt.to_string(),
            credit: 0.0,
            subscription: SubscriptionTier::Standard,
            created_at: Utc::now(),
            subscription_expire_at: None,
        }
    }

    /// Lazy expiry enforcement: once the expiry instant has passed, the
    /// record reverts to STANDARD and the expiry is cleared. Returns
    /// whether a downgrade happened.
    pub fn downgrade_if_expired(&mut self, now: DateTime<Utc>) -> bool {
        match self.subscription_expire_at {
            Some(expire_at) if now > expire_at => {
                self.subscription = SubscriptionTier::Standard;
                self.subscription_expire_at = None;
                true
            }
            _ => false,
        }
    }

    /// Credit only ever increases through an explicit top-up; non-positive
    /// amounts are rejected.
    pub fn add_credit(&mut self, amount: f64) -> bool {
        if amount > 0.0 {
            self.credit += amount;
            true
        } else {
            false
        }
    }

    /// Switch tier, stamping the expiry implied by the tier's duration.
    pub fn set_subscription(&mut self, tier: SubscriptionTier, now: DateTime<Utc>) {
        self.subscription = tier;
        self.subscription_expire_at = tier.expiry_from(now);
    }

    /// Replace credential material (new client-derived hash and salt).
    pub fn set_credentials(&mut self, password_hash: &str, password_salt: &str) {
        self.password_hash = password_hash.to_string();
        self.password_salt = password_salt.to_string();
    }

    /// Replace the display name; empty names are rejected.
    pub fn edit_username(&mut self, username: &str) -> bool {
        if username.is_empty() {
            return false;
        }
        self.username = username.to_string();
        true
    }
}

impl PartialEq for UserRecord {
    fn eq(&self, other: &Self) -> bool {
        self.email == other.email
    }
}

impl Eq for UserRecord {}

impl std::hash::Hash for UserRecord {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.email.hash(state);
    }
}
