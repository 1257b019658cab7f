//! Server identity: the certificate + private key pair a service presents.
//!
//! - [`codec`]: PEM/DER parsing, PEM serialization and fingerprints
//! - [`issuer`]: self-signed RSA identities for when nothing else is usable
//! - [`shared`]: the process-wide fallback identity slot
//! - [`store`]: key-value configuration store the provisioner reads and writes
//! - [`provisioner`]: the configured → shared → generated fallback chain

pub mod codec;
pub mod issuer;
pub mod provisioner;
pub mod shared;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

pub use codec::{Certificate, CodecError, EncodingFormat, KeyAlgorithm, PrivateKey};
pub use issuer::{IssueError, IssuerOptions, SelfSignedIssuer, SignatureHash};
pub use provisioner::{
    load_identity, IdentityProvisioner, ProvisionError, ProvisionSource, ProvisionedIdentity,
};
pub use shared::{SharedIdentity, SharedIdentitySlot, SharedOrigin};
pub use store::{ConfigStore, JsonFileStore, MemoryConfigStore, StoreError};

use std::fmt;
use thiserror::Error;

/// Returned when a private key does not belong to the certificate it was paired with.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("private key does not match the certificate public key")]
pub struct IdentityMismatch;

/// A certificate together with the private key for its public key.
///
/// Construction through [`Identity::new`] is the only way to obtain one, so every
/// value of this type is key-matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    certificate: Certificate,
    key: PrivateKey,
}

impl Identity {
    pub fn new(certificate: Certificate, key: PrivateKey) -> Result<Self, IdentityMismatch> {
        if certificate.key_algorithm() != key.algorithm()
            || certificate.public_key() != key.public_key()
        {
            return Err(IdentityMismatch);
        }

        Ok(Self { certificate, key })
    }

    #[must_use]
    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    #[must_use]
    pub fn key(&self) -> &PrivateKey {
        &self.key
    }

    /// Generation tag carried in the subject common name, if this identity was auto-generated.
    #[must_use]
    pub fn generation_tag(&self) -> Option<GenerationTag> {
        self.certificate.generation_tag()
    }

    #[must_use]
    pub fn into_parts(self) -> (Certificate, PrivateKey) {
        (self.certificate, self.key)
    }
}

/// Marker placed in the common name of auto-generated certificates.
///
/// Each generation scheme gets its own tag. Tags listed as deprecated identify
/// certificates that must be rotated rather than reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenerationTag {
    /// First scheme (1024-bit keys, MD5 signatures).
    Legacy,
    V2,
}

impl GenerationTag {
    /// Tag stamped on newly generated certificates.
    pub const CURRENT: Self = Self::V2;

    pub const ALL: [Self; 2] = [Self::Legacy, Self::V2];

    #[must_use]
    pub const fn common_name(self) -> &'static str {
        match self {
            Self::Legacy => "Server Identity Autogenerated Certificate",
            Self::V2 => "Server Identity Autogenerated Certificate v2",
        }
    }

    #[must_use]
    pub const fn is_deprecated(self) -> bool {
        matches!(self, Self::Legacy)
    }

    #[must_use]
    pub fn from_common_name(common_name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|tag| tag.common_name() == common_name)
    }
}

impl fmt::Display for GenerationTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.common_name())
    }
}
