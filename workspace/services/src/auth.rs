//! Token issuing and verification.
//!
//! Access and refresh tokens are HS256 JWTs signed with the same secret and
//! told apart by the `kind` claim, so one can never stand in for the other.

use std::fmt;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use model::entities::{role, user};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace, warn};

use crate::error::{Result, ServiceError};
use crate::password::verify_password;
use crate::roles::role_names_for_user;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims embedded in both token kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id as a string
    pub sub: String,
    pub username: String,
    pub roles: Vec<String>,
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

/// The authenticated caller as seen by services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i32,
    pub username: String,
    pub roles: Vec<String>,
}

impl Principal {
    pub fn has_role(&self, name: &str) -> bool {
        self.roles.iter().any(|r| r == name)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(role::ADMIN)
    }
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Signing material plus token lifetimes.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl fmt::Debug for TokenKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenKeys")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenKeys {
    pub fn new(secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    pub fn issue(&self, user: &user::Model, roles: &[String], kind: TokenKind) -> Result<String> {
        let now = Utc::now();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let claims = Claims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            roles: roles.to_vec(),
            kind,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ServiceError::Internal(format!("token signing failed: {e}")))
    }

    pub fn issue_pair(&self, user: &user::Model, roles: &[String]) -> Result<TokenPair> {
        Ok(TokenPair {
            access_token: self.issue(user, roles, TokenKind::Access)?,
            refresh_token: self.issue(user, roles, TokenKind::Refresh)?,
        })
    }

    /// Decodes a token, checking signature, expiry and kind.
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            debug!("Token rejected: {}", e);
            ServiceError::Unauthorized("Invalid or expired token".to_string())
        })?;
        if data.claims.kind != expected {
            debug!("Token kind {:?} where {:?} was expected", data.claims.kind, expected);
            return Err(ServiceError::Unauthorized("Wrong token type".to_string()));
        }
        Ok(data.claims)
    }
}

fn subject_id(claims: &Claims) -> Result<i32> {
    claims
        .sub
        .parse()
        .map_err(|_| ServiceError::Unauthorized("Malformed token subject".to_string()))
}

/// Resolves a bearer access token into the calling principal.
pub fn authenticate(keys: &TokenKeys, access_token: &str) -> Result<Principal> {
    let claims = keys.verify(access_token, TokenKind::Access)?;
    Ok(Principal {
        user_id: subject_id(&claims)?,
        username: claims.username,
        roles: claims.roles,
    })
}

/// Exchanges email and password for a fresh token pair.
#[instrument(skip(db, keys, password))]
pub async fn login(
    db: &DatabaseConnection,
    keys: &TokenKeys,
    email: &str,
    password: &str,
) -> Result<TokenPair> {
    trace!("Entering login function");

    let Some(account) = user::Entity::find()
        .filter(user::Column::Email.eq(email))
        .one(db)
        .await?
    else {
        warn!("Login attempt for unknown email {}", email);
        return Err(ServiceError::Unauthorized("User was not found".to_string()));
    };

    if !verify_password(&account.password_hash, password)? {
        warn!("Wrong password for user {}", account.id);
        return Err(ServiceError::Unauthorized("Invalid credentials".to_string()));
    }

    let roles = role_names_for_user(db, account.id).await?;
    info!("User {} logged in with roles {:?}", account.id, roles);
    keys.issue_pair(&account, &roles)
}

/// Rotates a refresh token. Roles are re-read so role changes take effect.
#[instrument(skip_all)]
pub async fn refresh(
    db: &DatabaseConnection,
    keys: &TokenKeys,
    refresh_token: &str,
) -> Result<TokenPair> {
    trace!("Entering refresh function");
    let claims = keys.verify(refresh_token, TokenKind::Refresh)?;
    let user_id = subject_id(&claims)?;

    let account = user::Entity::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::Unauthorized("User no longer exists".to_string()))?;

    let roles = role_names_for_user(db, account.id).await?;
    debug!("Refreshing tokens for user {}", account.id);
    keys.issue_pair(&account, &roles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{principal_for, setup_db, new_user};

    fn keys() -> TokenKeys {
        TokenKeys::new("test-secret", Duration::minutes(15), Duration::days(15))
    }

    #[tokio::test]
    async fn test_login_and_authenticate() {
        let db = setup_db().await;
        let account = new_user(&db, "login").await;

        let pair = login(&db, &keys(), &account.email, "password").await.unwrap();
        let principal = authenticate(&keys(), &pair.access_token).unwrap();
        assert_eq!(principal.user_id, account.id);
        assert_eq!(principal.roles, vec![role::USER.to_string()]);
    }

    #[tokio::test]
    async fn test_login_rejects_bad_credentials() {
        let db = setup_db().await;
        let account = new_user(&db, "badpass").await;

        let err = login(&db, &keys(), &account.email, "nope").await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));

        let err = login(&db, &keys(), "ghost@example.com", "password")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_refresh_token_is_not_an_access_token() {
        let db = setup_db().await;
        let account = new_user(&db, "kinds").await;
        let pair = login(&db, &keys(), &account.email, "password").await.unwrap();

        assert!(authenticate(&keys(), &pair.refresh_token).is_err());
        assert!(refresh(&db, &keys(), &pair.access_token).await.is_err());

        let rotated = refresh(&db, &keys(), &pair.refresh_token).await.unwrap();
        let principal = authenticate(&keys(), &rotated.access_token).unwrap();
        assert_eq!(principal, principal_for(&account, &[role::USER]));
    }

    #[test]
    fn test_expired_and_foreign_tokens_rejected() {
        let account = user::Model {
            id: 7,
            username: "old".to_string(),
            name: None,
            password_hash: String::new(),
            email: "old@example.com".to_string(),
            phone: None,
            tariff_id: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let short = TokenKeys::new("test-secret", Duration::minutes(-10), Duration::days(1));
        let expired = short.issue(&account, &[], TokenKind::Access).unwrap();
        assert!(authenticate(&keys(), &expired).is_err());

        let other = TokenKeys::new("other-secret", Duration::minutes(5), Duration::days(1));
        let forged = other.issue(&account, &[], TokenKind::Access).unwrap();
        assert!(authenticate(&keys(), &forged).is_err());
    }
}
