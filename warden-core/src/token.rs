//! Stateless access token issuance and verification
//!
//! Access tokens are compact HS256 JWTs. Verification is a pure function
//! of the token and the issuer's key material: signature, issuer,
//! audience, and expiry are checked and nothing is looked up in storage.
//! Revocation therefore rides on the short TTL (60 minutes by default)
//! and on the refresh token layer, which IS stateful.
//!
//! [`TokenIssuer::new`] materializes the encoding and decoding keys once.
//! A missing or undersized signing key fails construction, which is the
//! intended place for a deployment with broken configuration to die:
//! before it accepts a single request, not on the first login.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{
    Error,
    error::{CryptoError, TokenError, ValidationError},
    tenant::{TenantId, TenantRole},
    user::UserId,
};

/// Minimum HS256 key size. A shorter secret weakens the whole scheme, so
/// construction refuses it outright.
const MIN_SIGNING_KEY_BYTES: usize = 32;

/// Default access token lifetime.
pub const DEFAULT_ACCESS_TOKEN_TTL: Duration = Duration::minutes(60);

/// Claim names the issuer owns; caller-supplied extra claims with these
/// names are discarded rather than allowed to shadow the real values.
const RESERVED_CLAIMS: &[&str] = &[
    "sub",
    "email",
    "tenant_id",
    "tenant_role",
    "tenant_name",
    "jti",
    "iss",
    "aud",
    "iat",
    "exp",
];

/// Tenant claims stamped into an access token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantClaims {
    pub tenant_id: TenantId,
    pub tenant_role: TenantRole,
    pub tenant_name: Option<String>,
}

/// The claims carried by a verified access token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject: the user ID.
    pub sub: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<TenantId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_role: Option<TenantRole>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_name: Option<String>,
    /// Unique token ID, fresh per issuance.
    pub jti: String,
    pub iss: String,
    pub aud: String,
    /// Issued-at (seconds since epoch).
    pub iat: i64,
    /// Expiry (seconds since epoch).
    pub exp: i64,
    /// Additional caller-supplied claims.
    #[serde(flatten, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl AccessClaims {
    pub fn user_id(&self) -> UserId {
        UserId::new(&self.sub)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_default()
    }
}

/// An access token together with its decoded claims.
#[derive(Debug, Clone)]
pub struct IssuedAccessToken {
    pub token: String,
    pub claims: AccessClaims,
}

/// The token material handed back by a successful login or refresh.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub access_expires_at: DateTime<Utc>,
    /// Raw refresh secret; shown once, stored only as a hash.
    pub refresh_token: String,
}

/// Configuration for [`TokenIssuer`].
#[derive(Debug, Clone)]
pub struct TokenIssuerConfig {
    /// HS256 signing key, at least 32 bytes.
    pub signing_key: Vec<u8>,
    pub issuer: String,
    pub audience: String,
    pub ttl: Duration,
}

impl TokenIssuerConfig {
    pub fn new(
        signing_key: impl Into<Vec<u8>>,
        issuer: impl Into<String>,
        audience: impl Into<String>,
    ) -> Self {
        Self {
            signing_key: signing_key.into(),
            issuer: issuer.into(),
            audience: audience.into(),
            ttl: DEFAULT_ACCESS_TOKEN_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// Issues and verifies access tokens.
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    /// Build an issuer from configuration, materializing key objects once.
    ///
    /// Fails when the signing key is absent or under 32 bytes, or when
    /// issuer/audience are empty. Callers are expected to treat this as a
    /// startup failure.
    pub fn new(config: TokenIssuerConfig) -> Result<Self, Error> {
        if config.signing_key.len() < MIN_SIGNING_KEY_BYTES {
            return Err(Error::Crypto(CryptoError::JwtSigning(format!(
                "signing key must be at least {MIN_SIGNING_KEY_BYTES} bytes"
            ))));
        }
        if config.issuer.is_empty() {
            return Err(Error::Validation(ValidationError::MissingField(
                "token issuer is required".to_string(),
            )));
        }
        if config.audience.is_empty() {
            return Err(Error::Validation(ValidationError::MissingField(
                "token audience is required".to_string(),
            )));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&config.issuer]);
        validation.set_audience(&[&config.audience]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(&config.signing_key),
            decoding_key: DecodingKey::from_secret(&config.signing_key),
            validation,
            issuer: config.issuer,
            audience: config.audience,
            ttl: config.ttl,
        })
    }

    /// Issue an access token for a subject.
    pub fn issue(
        &self,
        subject: &UserId,
        email: &str,
        tenant: Option<&TenantClaims>,
    ) -> Result<IssuedAccessToken, Error> {
        self.issue_with_claims(subject, email, tenant, Map::new())
    }

    /// Issue an access token with additional custom claims.
    ///
    /// Every call gets a fresh `jti`, so two tokens for the same subject
    /// are always distinguishable. Extra claims using reserved names are
    /// dropped.
    pub fn issue_with_claims(
        &self,
        subject: &UserId,
        email: &str,
        tenant: Option<&TenantClaims>,
        extra: Map<String, Value>,
    ) -> Result<IssuedAccessToken, Error> {
        let now = Utc::now();
        let extra: Map<String, Value> = extra
            .into_iter()
            .filter(|(key, _)| !RESERVED_CLAIMS.contains(&key.as_str()))
            .collect();

        let claims = AccessClaims {
            sub: subject.as_str().to_string(),
            email: email.to_string(),
            tenant_id: tenant.map(|t| t.tenant_id.clone()),
            tenant_role: tenant.map(|t| t.tenant_role),
            tenant_name: tenant.and_then(|t| t.tenant_name.clone()),
            jti: Uuid::new_v4().to_string(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
            extra,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| Error::Crypto(CryptoError::JwtSigning(e.to_string())))?;

        Ok(IssuedAccessToken { token, claims })
    }

    /// Verify a token and return its claims.
    ///
    /// Checks signature, issuer, audience, and expiry. Pure: no storage
    /// access, usable on any request path at full rate.
    pub fn verify(&self, token: &str) -> Result<AccessClaims, Error> {
        decode::<AccessClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => Error::Token(TokenError::Expired),
                _ => Error::Token(TokenError::Malformed(e.to_string())),
            })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
