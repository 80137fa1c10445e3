//! Credential module
//!
//! Supplies object store keys and the warehouse private key to the pipeline.
//!
//! The `CredentialProvider` trait is the seam where alternative secret stores
//! plug in. Two providers ship with the crate: one reading the pipeline
//! configuration file, one reading environment variables.

mod provider;
mod types;

pub use provider::{ConfigCredentialProvider, CredentialProvider, EnvCredentialProvider};
pub use types::{pem_to_pkcs8_der, ObjectStoreCredentials, PrivateKeyDer};
