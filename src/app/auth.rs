use std::sync::Arc;

use anyhow::anyhow;
use pasetors::claims::{Claims, ClaimsValidationRules};
use pasetors::keys::SymmetricKey;
use pasetors::token::UntrustedToken;
use pasetors::{local, version4::V4, Local};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::app::users::PasswordHasher;
use crate::domain::user::User;
use crate::error::Result;
use crate::store::{Stores, UserStore};

const TOKEN_ISSUER: &str = "aperture";

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub access_token: String,
    pub expires_at: OffsetDateTime,
}

/// Stateless PASETO v4.local access tokens. The token carries the user id;
/// nothing is stored server-side.
#[derive(Clone)]
pub struct TokenService {
    key: [u8; 32],
    access_ttl_minutes: u64,
}

impl TokenService {
    pub fn new(key: [u8; 32], access_ttl_minutes: u64) -> Self {
        Self {
            key,
            access_ttl_minutes,
        }
    }

    pub fn issue(&self, user_id: Uuid) -> anyhow::Result<IssuedToken> {
        let duration = std::time::Duration::from_secs(self.access_ttl_minutes * 60);
        let mut claims = Claims::new_expires_in(&duration)?;
        claims.issuer(TOKEN_ISSUER)?;
        claims.audience(TOKEN_ISSUER)?;
        claims.subject(&user_id.to_string())?;

        let key = SymmetricKey::<V4>::from(&self.key)?;
        let access_token = local::encrypt(&key, &claims, None, None)?;
        let expires_at =
            OffsetDateTime::now_utc() + Duration::minutes(self.access_ttl_minutes as i64);

        Ok(IssuedToken {
            access_token,
            expires_at,
        })
    }

    /// None for anything other than a well-formed, unexpired token.
    pub fn verify(&self, token: &str) -> anyhow::Result<Option<Uuid>> {
        let key = SymmetricKey::<V4>::from(&self.key)?;
        let mut rules = ClaimsValidationRules::new();
        rules.validate_issuer_with(TOKEN_ISSUER);
        rules.validate_audience_with(TOKEN_ISSUER);

        let untrusted = match UntrustedToken::<Local, V4>::try_from(token) {
            Ok(token) => token,
            Err(_) => return Ok(None),
        };
        let trusted = match local::decrypt(&key, &untrusted, &rules, None, None) {
            Ok(token) => token,
            Err(_) => return Ok(None),
        };
        let claims = match trusted.payload_claims() {
            Some(claims) => claims,
            None => return Ok(None),
        };

        let subject = claims
            .get_claim("sub")
            .and_then(|value| value.as_str())
            .ok_or_else(|| anyhow!("missing sub claim"))?;
        Ok(Some(Uuid::parse_str(subject)?))
    }
}

#[derive(Clone)]
pub struct AuthService {
    stores: Stores,
    hasher: Arc<dyn PasswordHasher>,
    tokens: TokenService,
}

impl AuthService {
    pub fn new(stores: Stores, hasher: Arc<dyn PasswordHasher>, tokens: TokenService) -> Self {
        Self {
            stores,
            hasher,
            tokens,
        }
    }

    /// Username-or-email login. None on unknown identity or bad password;
    /// the two are indistinguishable to the caller.
    pub async fn login(
        &self,
        identifier: &str,
        password: &str,
    ) -> Result<Option<(User, IssuedToken)>> {
        let user = match self.stores.users.get_by_login(identifier).await? {
            Some(user) => user,
            None => return Ok(None),
        };
        if user.password_hash.is_empty() {
            return Ok(None);
        }
        if !self.hasher.verify(password, &user.password_hash)? {
            return Ok(None);
        }

        let token = self.tokens.issue(user.id)?;
        Ok(Some((user, token)))
    }
}
