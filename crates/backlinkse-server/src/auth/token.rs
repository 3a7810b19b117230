use std::collections::HashSet;
use std::time::Duration;

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::clock::SharedClock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        })
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("{0} token secret is not configured")]
    MissingSecret(TokenKind),
    #[error("token is malformed or its signature is invalid")]
    Malformed,
    #[error("token has expired")]
    Expired,
}

impl TokenError {
    /// Short tag for structured logs.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MissingSecret(_) => "missing_secret",
            Self::Malformed => "malformed",
            Self::Expired => "expired",
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Claims {
    user_id: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

struct Signer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl Signer {
    fn new(secret: Option<&str>, ttl: Duration) -> Option<Self> {
        let secret = secret.filter(|s| !s.is_empty())?;
        Some(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        })
    }
}

/// Issues and verifies HS256 bearer tokens.
///
/// Access and refresh tokens are signed with distinct secrets, so one kind
/// never verifies as the other. Expiry is checked against the injected clock
/// rather than the library's own wall-clock check.
pub struct TokenService {
    access: Option<Signer>,
    refresh: Option<Signer>,
    clock: SharedClock,
}

impl TokenService {
    pub fn new(
        access_secret: Option<&str>,
        refresh_secret: Option<&str>,
        access_ttl: Duration,
        refresh_ttl: Duration,
        clock: SharedClock,
    ) -> Self {
        Self {
            access: Signer::new(access_secret, access_ttl),
            refresh: Signer::new(refresh_secret, refresh_ttl),
            clock,
        }
    }

    fn signer(&self, kind: TokenKind) -> Result<&Signer, TokenError> {
        match kind {
            TokenKind::Access => self.access.as_ref(),
            TokenKind::Refresh => self.refresh.as_ref(),
        }
        .ok_or(TokenError::MissingSecret(kind))
    }

    pub fn issue(&self, subject: &str, kind: TokenKind) -> Result<String, TokenError> {
        let signer = self.signer(kind)?;
        let iat = self.clock.now().timestamp();
        let ttl = i64::try_from(signer.ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = Claims {
            user_id: subject.to_owned(),
            iat,
            exp: iat.saturating_add(ttl),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &signer.encoding)
            .map_err(|_| TokenError::Malformed)
    }

    pub fn issue_pair(&self, subject: &str) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.issue(subject, TokenKind::Access)?,
            refresh_token: self.issue(subject, TokenKind::Refresh)?,
        })
    }

    /// Returns the subject id embedded in a valid, unexpired token.
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<String, TokenError> {
        let signer = self.signer(kind)?;
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims = HashSet::new();
        let data = decode::<Claims>(token, &signer.decoding, &validation)
            .map_err(|_| TokenError::Malformed)?;
        if data.claims.exp <= self.clock.now().timestamp() {
            return Err(TokenError::Expired);
        }
        Ok(data.claims.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    const DAY: Duration = Duration::from_secs(86_400);

    fn service() -> (TokenService, ManualClock) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap());
        let svc = TokenService::new(
            Some("access-secret"),
            Some("refresh-secret"),
            7 * DAY,
            30 * DAY,
            Arc::new(clock.clone()),
        );
        (svc, clock)
    }

    #[test]
    fn round_trip_returns_subject() {
        let (svc, _) = service();
        let token = svc.issue("user-1", TokenKind::Access).unwrap();
        assert_eq!(svc.verify(&token, TokenKind::Access).unwrap(), "user-1");
    }

    #[test]
    fn expires_after_ttl_on_injected_clock() {
        let (svc, clock) = service();
        let token = svc.issue("user-1", TokenKind::Access).unwrap();

        clock.advance(chrono::Duration::days(7) - chrono::Duration::seconds(1));
        assert!(svc.verify(&token, TokenKind::Access).is_ok());

        clock.advance(chrono::Duration::seconds(1));
        assert_eq!(
            svc.verify(&token, TokenKind::Access),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn refresh_ttl_is_independent() {
        let (svc, clock) = service();
        let pair = svc.issue_pair("user-1").unwrap();
        clock.advance(chrono::Duration::days(10));
        assert_eq!(
            svc.verify(&pair.access_token, TokenKind::Access),
            Err(TokenError::Expired)
        );
        assert_eq!(
            svc.verify(&pair.refresh_token, TokenKind::Refresh).unwrap(),
            "user-1"
        );
    }

    #[test]
    fn tampered_token_is_malformed() {
        let (svc, _) = service();
        let token = svc.issue("user-1", TokenKind::Access).unwrap();
        let mut bytes = token.into_bytes();
        let last = bytes.len() - 2;
        bytes[last] = if bytes[last] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(bytes).unwrap();
        assert_eq!(
            svc.verify(&tampered, TokenKind::Access),
            Err(TokenError::Malformed)
        );
        assert_eq!(
            svc.verify("not.a.jwt", TokenKind::Access),
            Err(TokenError::Malformed)
        );
    }

    #[test]
    fn kinds_do_not_cross_verify() {
        let (svc, _) = service();
        let pair = svc.issue_pair("user-1").unwrap();
        assert_eq!(
            svc.verify(&pair.refresh_token, TokenKind::Access),
            Err(TokenError::Malformed)
        );
        assert_eq!(
            svc.verify(&pair.access_token, TokenKind::Refresh),
            Err(TokenError::Malformed)
        );
    }

    #[test]
    fn missing_secret_is_a_configuration_error() {
        let clock = ManualClock::new(Utc::now());
        let svc = TokenService::new(Some("a"), Some(""), DAY, DAY, Arc::new(clock));
        assert_eq!(
            svc.issue("u", TokenKind::Refresh),
            Err(TokenError::MissingSecret(TokenKind::Refresh))
        );
        assert!(svc.issue("u", TokenKind::Access).is_ok());
    }
}
