//! Key-pair JWT authentication for the Snowflake SQL API
//!
//! Tokens carry:
//! - `iss`: `<ACCOUNT>.<USER>.SHA256:<public key fingerprint>`
//! - `sub`: `<ACCOUNT>.<USER>`
//! - `iat` / `exp`: issue and expiry timestamps

use crate::credentials::PrivateKeyDer;
use crate::error::{Error, Result};
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::pkcs8::EncodePublicKey;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::debug;

/// Maximum token lifetime accepted by Snowflake is one hour
const TOKEN_LIFETIME_SECS: i64 = 59 * 60;

/// Refresh this long before expiry
const REFRESH_BUFFER_SECS: i64 = 5 * 60;

/// JWT claims for Snowflake authentication
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct SnowflakeClaims {
    pub iss: String,
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Cached token with expiration
#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn needs_refresh(&self) -> bool {
        Utc::now() + Duration::seconds(REFRESH_BUFFER_SECS) >= self.expires_at
    }
}

/// Generates and caches key-pair JWTs
pub struct KeyPairAuth {
    encoding_key: EncodingKey,
    issuer: String,
    subject: String,
    cached: RwLock<Option<CachedToken>>,
}

impl KeyPairAuth {
    /// Prepare auth for `user` in `account` from a PKCS#8 DER key
    pub fn new(account: &str, user: &str, private_key: &PrivateKeyDer) -> Result<Self> {
        let key = private_key.to_rsa_key()?;

        let public_der = key
            .to_public_key()
            .to_public_key_der()
            .map_err(|e| Error::credential(format!("Failed to encode public key: {e}")))?;
        let fingerprint = base64::engine::general_purpose::STANDARD
            .encode(Sha256::digest(public_der.as_bytes()));

        let account = normalize_account(account);
        let user = user.to_uppercase();
        let subject = format!("{account}.{user}");
        let issuer = format!("{subject}.SHA256:{fingerprint}");

        // jsonwebtoken signs with PKCS#1 DER
        let pkcs1 = key
            .to_pkcs1_der()
            .map_err(|e| Error::credential(format!("Failed to encode private key: {e}")))?;
        let encoding_key = EncodingKey::from_rsa_der(pkcs1.as_bytes());

        Ok(Self {
            encoding_key,
            issuer,
            subject,
            cached: RwLock::new(None),
        })
    }

    /// The `iss` claim
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// The `sub` claim
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Get a valid token, generating a new one when close to expiry
    pub async fn token(&self) -> Result<String> {
        {
            let cached = self.cached.read().await;
            if let Some(token) = cached.as_ref() {
                if !token.needs_refresh() {
                    return Ok(token.token.clone());
                }
            }
        }

        let mut cached = self.cached.write().await;
        if let Some(token) = cached.as_ref() {
            if !token.needs_refresh() {
                return Ok(token.token.clone());
            }
        }

        let fresh = self.generate()?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }

    fn generate(&self) -> Result<CachedToken> {
        let now = Utc::now();
        let expires_at = now + Duration::seconds(TOKEN_LIFETIME_SECS);

        let claims = SnowflakeClaims {
            iss: self.issuer.clone(),
            sub: self.subject.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
            .map_err(|e| Error::credential(format!("Failed to generate JWT: {e}")))?;

        debug!(expires_at = %expires_at, "Generated Snowflake JWT");
        Ok(CachedToken { token, expires_at })
    }
}

impl std::fmt::Debug for KeyPairAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPairAuth")
            .field("issuer", &self.issuer)
            .field("subject", &self.subject)
            .finish_non_exhaustive()
    }
}

/// Upper-case the account and drop any region/cloud suffix (`xy12345.us-east-1`)
fn normalize_account(account: &str) -> String {
    account
        .split('.')
        .next()
        .unwrap_or(account)
        .to_uppercase()
}
