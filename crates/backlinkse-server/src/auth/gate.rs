use crate::error::ApiError;
use crate::models::{Principal, Role, User};
use crate::store::{is_valid_id, Store};

/// Why an otherwise authenticated account may not proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AccountRejection {
    #[error("Account is inactive or deleted. Please contact support.")]
    Closed,
    #[error("Account is suspended. Please contact support.")]
    Suspended,
    #[error("Account is pending verification. Please wait for admin approval.")]
    Unverified,
}

impl From<AccountRejection> for ApiError {
    fn from(rejection: AccountRejection) -> Self {
        ApiError::forbidden(rejection.to_string())
    }
}

/// Checks the lifecycle flags in a fixed order; the first failing one wins.
pub fn admit(user: &User) -> Result<Principal, AccountRejection> {
    if user.is_deleted || !user.is_active {
        return Err(AccountRejection::Closed);
    }
    if user.is_suspended {
        return Err(AccountRejection::Suspended);
    }
    if !user.is_verified {
        return Err(AccountRejection::Unverified);
    }
    Ok(Principal::from(user))
}

/// Load the token subject and run [`admit`] on it.
///
/// A subject that does not resolve to a user means the token itself is bad,
/// so it is a 401, never a 404.
pub fn admit_subject(store: &Store, subject: &str) -> Result<Principal, ApiError> {
    let user = if is_valid_id(subject) {
        store.get::<User>(subject)?
    } else {
        None
    };
    let Some(user) = user else {
        return Err(ApiError::unauthorized(
            "User not found. Token may be invalid.",
        ));
    };
    Ok(admit(&user)?)
}

pub fn authorize(principal: Option<&Principal>, allowed: &[Role]) -> Result<(), ApiError> {
    let Some(principal) = principal else {
        return Err(ApiError::unauthorized("Authentication required."));
    };
    if allowed.contains(&principal.role) {
        Ok(())
    } else {
        Err(ApiError::forbidden("Access denied. Insufficient permissions."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::db::tests::make_store;
    use crate::store::new_id;
    use axum::http::StatusCode;
    use chrono::Utc;

    fn user(verified: bool, suspended: bool, active: bool, deleted: bool) -> User {
        let now = Utc::now();
        User {
            id: new_id(),
            name: "Jo".into(),
            email: "jo@x.com".into(),
            password_hash: "h".into(),
            role: Role::User,
            is_verified: verified,
            is_suspended: suspended,
            is_active: active,
            is_deleted: deleted,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn flag_precedence_is_fixed() {
        use AccountRejection::*;
        let cases = [
            ((true, false, true, false), None),
            ((false, true, true, true), Some(Closed)),
            ((false, true, false, false), Some(Closed)),
            ((false, true, true, false), Some(Suspended)),
            ((true, true, true, false), Some(Suspended)),
            ((false, false, true, false), Some(Unverified)),
        ];
        for ((v, s, a, d), expected) in cases {
            assert_eq!(admit(&user(v, s, a, d)).err(), expected, "flags {v} {s} {a} {d}");
        }
    }

    #[test]
    fn rejections_are_forbidden_with_fixed_messages() {
        let err: ApiError = AccountRejection::Suspended.into();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(err.to_string(), "Account is suspended. Please contact support.");
    }

    #[test]
    fn unknown_subject_is_unauthorized() {
        let (store, _dir) = make_store();
        for subject in [new_id(), "garbage".to_owned()] {
            let err = admit_subject(&store, &subject).unwrap_err();
            assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(err.to_string(), "User not found. Token may be invalid.");
        }
    }

    #[test]
    fn admitted_subject_returns_public_projection() {
        let (store, _dir) = make_store();
        let mut jo = user(true, false, true, false);
        store.create_user(&mut jo).unwrap();
        let principal = admit_subject(&store, &jo.id).unwrap();
        assert_eq!(principal.id, jo.id);
        assert_eq!(principal.email, "jo@x.com");
    }

    #[test]
    fn role_gate_matrix() {
        let staff = [Role::Admin, Role::Moderator];
        let mut principal = Principal::from(&user(true, false, true, false));

        assert_eq!(
            authorize(None, &staff).unwrap_err().status(),
            StatusCode::UNAUTHORIZED
        );
        for (role, allowed) in [(Role::Admin, true), (Role::Moderator, true), (Role::User, false)] {
            principal.role = role;
            assert_eq!(authorize(Some(&principal), &staff).is_ok(), allowed, "{role}");
        }
        principal.role = Role::Moderator;
        let err = authorize(Some(&principal), &[Role::Admin]).unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(err.to_string(), "Access denied. Insufficient permissions.");
    }
}
