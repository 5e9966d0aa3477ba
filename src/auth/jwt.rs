//! JWT token generation and verification.
//!
//! Both token kinds are Ed25519-signed and carry the user's id, email and
//! role. A `token_use` claim keeps a refresh token from being accepted where
//! an access token is expected and the other way round.

use std::collections::HashSet;
use std::sync::Arc;

use jwt_simple::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenUse {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TokenClaims {
    email: String,
    role: Role,
    token_use: TokenUse,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone)]
pub struct RefreshClaims {
    pub sub: String,
    pub email: String,
    pub role: Role,
    pub token_id: String,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum JwtKeyError {
    #[error("JWT_PRIVATE_KEY must be set")]
    Missing,
    #[error("JWT_PRIVATE_KEY must be valid base64")]
    Encoding,
    #[error("JWT_PRIVATE_KEY must be a valid Ed25519 key")]
    Key,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("invalid token: {0}")]
    Invalid(String),
    #[error("token was issued for {found:?} use, expected {expected:?}")]
    WrongUse { expected: TokenUse, found: TokenUse },
    #[error("refresh token has no token id")]
    MissingTokenId,
}

#[derive(Clone)]
pub struct JwtConfig {
    key_pair: Arc<Ed25519KeyPair>,
    public_key: Arc<Ed25519PublicKey>,
    pub access_token_expiry: i64,
    pub refresh_token_expiry: i64,
    pub remember_me_expiry: i64,
    pub leeway_secs: u64,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

impl JwtConfig {
    /// Expects JWT_PRIVATE_KEY env var (base64-encoded Ed25519 key).
    pub fn from_env(config: &crate::config::JwtConfig) -> Result<Self, JwtKeyError> {
        use base64::Engine;

        let private_key_b64 =
            std::env::var("JWT_PRIVATE_KEY").map_err(|_| JwtKeyError::Missing)?;

        let key_bytes = base64::engine::general_purpose::STANDARD
            .decode(private_key_b64.trim())
            .map_err(|_| JwtKeyError::Encoding)?;

        let key_pair = Ed25519KeyPair::from_bytes(&key_bytes).map_err(|_| JwtKeyError::Key)?;

        Ok(Self::from_key_pair(key_pair).with_settings(config))
    }

    pub fn from_key_pair(key_pair: Ed25519KeyPair) -> Self {
        let public_key = key_pair.public_key();
        Self {
            key_pair: Arc::new(key_pair),
            public_key: Arc::new(public_key),
            access_token_expiry: 900,
            refresh_token_expiry: 604_800,
            remember_me_expiry: 2_592_000,
            leeway_secs: 0,
            issuer: None,
            audience: None,
        }
    }

    pub fn with_settings(mut self, config: &crate::config::JwtConfig) -> Self {
        self.access_token_expiry = config.access_token_expiry_secs;
        self.refresh_token_expiry = config.refresh_token_expiry_secs;
        self.remember_me_expiry = config.remember_me_expiry_secs;
        self.leeway_secs = config.leeway_secs;
        self.issuer = config.issuer.clone();
        self.audience = config.audience.clone();
        self
    }

    pub fn generate_key_pair() -> (String, String) {
        use base64::Engine;

        let key_pair = Ed25519KeyPair::generate();
        let private_b64 = base64::engine::general_purpose::STANDARD.encode(key_pair.to_bytes());
        let public_b64 =
            base64::engine::general_purpose::STANDARD.encode(key_pair.public_key().to_bytes());
        (private_b64, public_b64)
    }

    pub fn public_key(&self) -> &Ed25519PublicKey {
        &self.public_key
    }

    /// Refresh lifetime in seconds, extended when the user asked to be remembered.
    pub fn refresh_lifetime(&self, remember_me: bool) -> i64 {
        if remember_me {
            self.remember_me_expiry
        } else {
            self.refresh_token_expiry
        }
    }

    fn sign(
        &self,
        user_id: &str,
        custom: TokenClaims,
        lifetime_secs: i64,
    ) -> Result<String, jwt_simple::Error> {
        let mut claims = jwt_simple::claims::Claims::with_custom_claims(
            custom,
            Duration::from_secs(lifetime_secs.max(0) as u64),
        )
        .with_subject(user_id);

        if let Some(issuer) = &self.issuer {
            claims = claims.with_issuer(issuer);
        }
        if let Some(audience) = &self.audience {
            claims = claims.with_audience(audience);
        }

        self.key_pair.sign(claims)
    }

    pub fn generate_access_token(
        &self,
        user_id: &str,
        email: &str,
        role: Role,
    ) -> Result<String, jwt_simple::Error> {
        self.sign(
            user_id,
            TokenClaims {
                email: email.to_string(),
                role,
                token_use: TokenUse::Access,
                token_id: None,
            },
            self.access_token_expiry,
        )
    }

    pub fn generate_refresh_token(
        &self,
        user_id: &str,
        email: &str,
        role: Role,
        remember_me: bool,
    ) -> Result<String, jwt_simple::Error> {
        self.sign(
            user_id,
            TokenClaims {
                email: email.to_string(),
                role,
                token_use: TokenUse::Refresh,
                token_id: Some(Uuid::new_v4().to_string()),
            },
            self.refresh_lifetime(remember_me),
        )
    }

    fn verify(
        &self,
        token: &str,
        expected: TokenUse,
    ) -> Result<JWTClaims<TokenClaims>, TokenError> {
        let mut options = VerificationOptions {
            time_tolerance: Some(Duration::from_secs(self.leeway_secs)),
            ..Default::default()
        };
        if let Some(issuer) = &self.issuer {
            options.allowed_issuers = Some(HashSet::from([issuer.clone()]));
        }
        if let Some(audience) = &self.audience {
            options.allowed_audiences = Some(HashSet::from([audience.clone()]));
        }

        let token_data = self
            .public_key
            .verify_token::<TokenClaims>(token, Some(options))
            .map_err(|e| TokenError::Invalid(e.to_string()))?;

        if token_data.custom.token_use != expected {
            return Err(TokenError::WrongUse {
                expected,
                found: token_data.custom.token_use,
            });
        }

        Ok(token_data)
    }

    pub fn verify_access_token(&self, token: &str) -> Result<Claims, TokenError> {
        let token_data = self.verify(token, TokenUse::Access)?;

        Ok(Claims {
            sub: token_data.subject.unwrap_or_default(),
            email: token_data.custom.email,
            role: token_data.custom.role,
            exp: token_data
                .expires_at
                .map(|t| t.as_secs() as i64)
                .unwrap_or(0),
            iat: token_data
                .issued_at
                .map(|t| t.as_secs() as i64)
                .unwrap_or(0),
        })
    }

    pub fn verify_refresh_token(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        let token_data = self.verify(token, TokenUse::Refresh)?;
        let token_id = token_data
            .custom
            .token_id
            .ok_or(TokenError::MissingTokenId)?;

        Ok(RefreshClaims {
            sub: token_data.subject.unwrap_or_default(),
            email: token_data.custom.email,
            role: token_data.custom.role,
            token_id,
            exp: token_data
                .expires_at
                .map(|t| t.as_secs() as i64)
                .unwrap_or(0),
            iat: token_data
                .issued_at
                .map(|t| t.as_secs() as i64)
                .unwrap_or(0),
        })
    }
}
