use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{is_valid_email, Validate};
use crate::error::{ApiError, ApiResult};
use crate::store::Document;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Moderator,
    #[default]
    User,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Moderator => "moderator",
            Self::User => "user",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored credential record. Never serialized into a response; handlers
/// expose [`Principal`] instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub is_suspended: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

impl Document for User {
    const COLLECTION: &'static str = "users";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Validate for User {
    fn validate(&self) -> ApiResult<()> {
        let len = self.name.trim().chars().count();
        if !(2..=50).contains(&len) {
            return Err(ApiError::validation(
                "Name must be between 2 and 50 characters",
            ));
        }
        if !is_valid_email(&self.email) {
            return Err(ApiError::validation("Please provide a valid email address"));
        }
        Ok(())
    }
}

/// Public-safe projection of a [`User`]: everything but the password hash.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub is_verified: bool,
    pub is_suspended: bool,
    pub is_active: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            is_verified: user.is_verified,
            is_suspended: user.is_suspended,
            is_active: user.is_active,
            is_deleted: user.is_deleted,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::new_id;

    fn user(name: &str, email: &str) -> User {
        let now = Utc::now();
        User {
            id: new_id(),
            name: name.into(),
            email: email.into(),
            password_hash: "$argon2id$stub".into(),
            role: Role::User,
            is_verified: false,
            is_suspended: false,
            is_active: true,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn principal_json_has_no_password_field() {
        let json = serde_json::to_value(Principal::from(&user("Jo", "jo@x.com"))).unwrap();
        let obj = json.as_object().unwrap();
        assert!(!obj.keys().any(|k| k.to_lowercase().contains("password")));
        assert_eq!(obj["role"], "user");
        assert_eq!(obj["isVerified"], false);
    }

    #[test]
    fn validates_name_length_and_email() {
        assert!(user("Jo", "jo@x.com").validate().is_ok());
        assert!(user("J", "jo@x.com").validate().is_err());
        assert!(user("Jo", "not-an-email").validate().is_err());
    }
}
