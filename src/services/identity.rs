// Identity token verification
// The identity provider signs HS256 tokens with a shared secret; this service only verifies them.
// `issue_token` exists so local tooling and tests can mint tokens the same way.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

use crate::app_config::IdentityConfig;
use crate::models::NewUserProfile;

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("JWT encoding error: {0}")]
    EncodingError(String),
}

impl From<jsonwebtoken::errors::Error> for IdentityError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => IdentityError::TokenExpired,
            ErrorKind::InvalidToken
            | ErrorKind::InvalidSignature
            | ErrorKind::InvalidAudience
            | ErrorKind::InvalidIssuer
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_)
            | ErrorKind::MissingRequiredClaim(_) => IdentityError::InvalidToken,
            _ => IdentityError::EncodingError(err.to_string()),
        }
    }
}

/// Claims issued by the identity provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IdentityClaims {
    pub sub: String,
    #[serde(default)]
    pub anonymous: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub aud: String,
    pub iss: String,
    pub iat: u64,
    pub exp: u64,
}

/// A signed-in, non-anonymous caller
#[derive(Debug, Clone, PartialEq)]
pub struct SignedInUser {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

impl SignedInUser {
    pub fn profile(&self) -> NewUserProfile {
        NewUserProfile {
            id: self.uid.clone(),
            email: self.email.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

/// Who is calling. Anonymous identity-provider sessions are gated like guests.
#[derive(Debug, Clone, PartialEq)]
pub enum Identity {
    Guest,
    Anonymous { uid: String },
    SignedIn(SignedInUser),
}

impl Identity {
    pub fn signed_in(&self) -> Option<&SignedInUser> {
        match self {
            Identity::SignedIn(user) => Some(user),
            _ => None,
        }
    }

    /// Owner id for conversation storage; guests and anonymous sessions own nothing
    pub fn owner_uid(&self) -> Option<&str> {
        self.signed_in().map(|user| user.uid.as_str())
    }

    pub fn from_claims(claims: IdentityClaims) -> Self {
        if claims.anonymous {
            Identity::Anonymous { uid: claims.sub }
        } else {
            Identity::SignedIn(SignedInUser {
                uid: claims.sub,
                email: claims.email,
                display_name: claims.name,
            })
        }
    }
}

pub struct IdentityService {
    audience: String,
    issuer: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for IdentityService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityService")
            .field("audience", &self.audience)
            .field("issuer", &self.issuer)
            .field("keys", &"<redacted>")
            .finish()
    }
}

impl IdentityService {
    pub fn new(config: &IdentityConfig) -> Self {
        Self {
            audience: config.audience.clone(),
            issuer: config.issuer.clone(),
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        }
    }

    /// Verify signature, audience, issuer and expiry, with no leeway
    pub fn verify(&self, token: &str) -> Result<Identity, IdentityError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[self.audience.clone()]);
        validation.set_issuer(&[self.issuer.clone()]);
        validation.validate_exp = true;
        validation.leeway = 0;

        let token_data = decode::<IdentityClaims>(token, &self.decoding_key, &validation)?;
        if token_data.claims.sub.trim().is_empty() {
            return Err(IdentityError::InvalidToken);
        }

        Ok(Identity::from_claims(token_data.claims))
    }

    pub fn issue_token(
        &self,
        uid: &str,
        anonymous: bool,
        email: Option<&str>,
        ttl_secs: u64,
    ) -> Result<String, IdentityError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| IdentityError::EncodingError(e.to_string()))?
            .as_secs();

        let claims = IdentityClaims {
            sub: uid.to_string(),
            anonymous,
            email: email.map(str::to_string),
            name: None,
            aud: self.audience.clone(),
            iss: self.issuer.clone(),
            iat: now,
            exp: now + ttl_secs,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(secret: &str) -> IdentityService {
        IdentityService::new(&IdentityConfig {
            jwt_secret: secret.to_string(),
            audience: "moodgpt".to_string(),
            issuer: "moodgpt-identity".to_string(),
        })
    }

    #[test]
    fn test_signed_in_token() {
        let identity = service("test-identity-secret-at-least-32-chars");
        let token = identity
            .issue_token("uid-1", false, Some("a@b.c"), 3600)
            .expect("token");

        match identity.verify(&token).expect("valid") {
            Identity::SignedIn(user) => {
                assert_eq!(user.uid, "uid-1");
                assert_eq!(user.email.as_deref(), Some("a@b.c"));
            },
            other => panic!("unexpected identity {:?}", other),
        }
    }

    #[test]
    fn test_anonymous_token_has_no_owner() {
        let identity = service("test-identity-secret-at-least-32-chars");
        let token = identity.issue_token("anon-1", true, None, 3600).expect("token");
        let verified = identity.verify(&token).expect("valid");

        assert_eq!(verified, Identity::Anonymous { uid: "anon-1".to_string() });
        assert_eq!(verified.owner_uid(), None);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = service("test-identity-secret-at-least-32-chars")
            .issue_token("uid-1", false, None, 3600)
            .expect("token");
        let result = service("another-identity-secret-32-chars-long").verify(&token);
        assert!(matches!(result, Err(IdentityError::InvalidToken)));
    }

    #[test]
    fn test_garbage_rejected() {
        let result = service("test-identity-secret-at-least-32-chars").verify("not-a-jwt");
        assert!(matches!(result, Err(IdentityError::InvalidToken)));
    }
}
