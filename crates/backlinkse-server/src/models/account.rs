use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};

use super::{dates, is_valid_email, Validate};
use crate::error::{ApiError, ApiResult};
use crate::store::{Document, Exclusive};

// ── Payment methods ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardType {
    Visa,
    Mastercard,
    #[serde(rename = "American Express")]
    AmericanExpress,
    Discover,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethod {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub card_type: CardType,
    pub last4: String,
    pub expiry_month: u8,
    pub expiry_year: i32,
    #[serde(default)]
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for PaymentMethod {
    const COLLECTION: &'static str = "payment_methods";
    fn id(&self) -> &str {
        &self.id
    }
}

impl Exclusive for PaymentMethod {
    fn is_selected(&self) -> bool {
        self.is_default
    }
    fn set_selected(&mut self, selected: bool) {
        self.is_default = selected;
    }
    fn scope(&self) -> Option<&str> {
        Some(&self.user_id)
    }
}

impl Validate for PaymentMethod {
    fn validate(&self) -> ApiResult<()> {
        if self.last4.len() != 4 || !self.last4.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ApiError::validation("last4 must be exactly 4 digits"));
        }
        if !(1..=12).contains(&self.expiry_month) {
            return Err(ApiError::validation("Expiry month must be between 1 and 12"));
        }
        Ok(())
    }
}

impl PaymentMethod {
    pub fn is_expired_by(&self, year: i32) -> bool {
        self.expiry_year < year
    }
}

// ── Subscriptions ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BillingCycle {
    #[default]
    Monthly,
    Quarterly,
    Yearly,
}

impl BillingCycle {
    pub fn months(self) -> u32 {
        match self {
            Self::Monthly => 1,
            Self::Quarterly => 3,
            Self::Yearly => 12,
        }
    }

    pub fn next_billing(self, from: DateTime<Utc>) -> DateTime<Utc> {
        from.checked_add_months(Months::new(self.months()))
            .unwrap_or(from)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionStatus {
    #[default]
    Active,
    Cancelled,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub plan_name: String,
    pub price: f64,
    #[serde(default)]
    pub billing_cycle: BillingCycle,
    #[serde(default)]
    pub status: SubscriptionStatus,
    #[serde(with = "dates")]
    pub start_date: DateTime<Utc>,
    #[serde(with = "dates")]
    pub next_billing_date: DateTime<Utc>,
    #[serde(default, with = "dates::option", skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for Subscription {
    const COLLECTION: &'static str = "subscriptions";
    fn id(&self) -> &str {
        &self.id
    }
}

impl Validate for Subscription {
    fn validate(&self) -> ApiResult<()> {
        if self.plan_name.trim().is_empty() {
            return Err(ApiError::validation("Plan name is required"));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(ApiError::validation("Price cannot be negative"));
        }
        Ok(())
    }
}

impl Subscription {
    pub fn cancel(&mut self, now: DateTime<Utc>) {
        self.status = SubscriptionStatus::Cancelled;
        self.cancelled_at = Some(now);
        self.updated_at = now;
    }
}

// ── Team ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TeamRole {
    Owner,
    Admin,
    Editor,
    #[default]
    Viewer,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberStatus {
    #[default]
    Pending,
    Active,
    Inactive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub email: String,
    #[serde(default)]
    pub role: TeamRole,
    #[serde(default)]
    pub status: MemberStatus,
    pub invited_by: String,
    #[serde(with = "dates")]
    pub invited_at: DateTime<Utc>,
    #[serde(default, with = "dates::option", skip_serializing_if = "Option::is_none")]
    pub joined_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for TeamMember {
    const COLLECTION: &'static str = "team_members";
    fn id(&self) -> &str {
        &self.id
    }
}

impl Validate for TeamMember {
    fn validate(&self) -> ApiResult<()> {
        if !is_valid_email(&self.email) {
            return Err(ApiError::validation("Please provide a valid email address"));
        }
        if self.role == TeamRole::Owner {
            return Err(ApiError::validation("The Owner role cannot be assigned"));
        }
        Ok(())
    }
}

/// Up to two uppercase initials from a name or email local part.
pub fn initials(name: &str) -> String {
    let base = name.split('@').next().unwrap_or(name);
    let parts: Vec<&str> = base
        .split(|c: char| c.is_whitespace() || c == '.' || c == '_' || c == '-')
        .filter(|p| !p.is_empty())
        .collect();
    let letters: String = match parts.as_slice() {
        [] => String::new(),
        [only] => only.chars().take(2).collect(),
        [first, .., last] => first.chars().take(1).chain(last.chars().take(1)).collect(),
    };
    letters.to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn billing_cycle_rolls_months() {
        let jan31 = Utc.with_ymd_and_hms(2025, 1, 31, 9, 0, 0).unwrap();
        assert_eq!(
            BillingCycle::Monthly.next_billing(jan31),
            Utc.with_ymd_and_hms(2025, 2, 28, 9, 0, 0).unwrap()
        );
        assert_eq!(
            BillingCycle::Yearly.next_billing(jan31),
            Utc.with_ymd_and_hms(2026, 1, 31, 9, 0, 0).unwrap()
        );
    }

    #[test]
    fn initials_from_names_and_emails() {
        assert_eq!(initials("Jo Smith"), "JS");
        assert_eq!(initials("Mary Ann Lee"), "ML");
        assert_eq!(initials("jo"), "JO");
        assert_eq!(initials("sam.wise@shire.org"), "SW");
        assert_eq!(initials(""), "");
    }
}
