//! Credential types and key conversion

use crate::error::{Error, Result};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey};
use rsa::RsaPrivateKey;
use secrecy::SecretString;
use std::fmt;

/// Access keys for the object store
#[derive(Debug, Clone)]
pub struct ObjectStoreCredentials {
    /// Access key id
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: SecretString,
    /// Bucket region
    pub region: String,
}

/// Unencrypted PKCS#8 DER private key bytes
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKeyDer(Vec<u8>);

impl PrivateKeyDer {
    /// Wrap raw DER bytes
    pub fn new(der: Vec<u8>) -> Self {
        Self(der)
    }

    /// Get the DER bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Decode back into an RSA key
    pub fn to_rsa_key(&self) -> Result<RsaPrivateKey> {
        RsaPrivateKey::from_pkcs8_der(&self.0)
            .map_err(|e| Error::credential(format!("Invalid PKCS#8 private key: {e}")))
    }
}

impl fmt::Debug for PrivateKeyDer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKeyDer([REDACTED; {} bytes])", self.0.len())
    }
}

/// Convert a PEM private key to unencrypted PKCS#8 DER
///
/// Accepts PKCS#8 (`BEGIN PRIVATE KEY`) and PKCS#1 (`BEGIN RSA PRIVATE KEY`).
/// Encrypted keys are rejected.
pub fn pem_to_pkcs8_der(pem: &str) -> Result<PrivateKeyDer> {
    let pem = pem.trim();

    if pem.contains("BEGIN ENCRYPTED PRIVATE KEY") {
        return Err(Error::credential(
            "Encrypted private keys are not supported. Decrypt with: \
             openssl pkcs8 -in encrypted.p8 -out decrypted.p8",
        ));
    }

    let key = if pem.contains("BEGIN RSA PRIVATE KEY") {
        RsaPrivateKey::from_pkcs1_pem(pem)
            .map_err(|e| Error::credential(format!("Failed to parse PKCS#1 private key: {e}")))?
    } else {
        RsaPrivateKey::from_pkcs8_pem(pem)
            .map_err(|e| Error::credential(format!("Failed to parse private key: {e}")))?
    };

    let der = key
        .to_pkcs8_der()
        .map_err(|e| Error::credential(format!("Failed to encode private key: {e}")))?;

    Ok(PrivateKeyDer(der.as_bytes().to_vec()))
}
