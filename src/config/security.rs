//! Process-wide TLS settings: the default server identity and the cipher floor.

use super::defaults::default_min_cipher_bits;
use serde::{Deserialize, Serialize};
use std::fmt;

/// TLS server configuration.
#[derive(Deserialize, Serialize, Clone)]
pub struct TlsServerConfig {
    /// PEM certificate used as the shared default identity. May also hold the key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_path: Option<String>,
    /// PEM private key for `certificate_path`. May also hold the certificate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key_path: Option<String>,
    /// Passphrase for an encrypted PKCS#8 private key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passphrase: Option<String>,
    /// Cipher suites weaker than this many bits are disabled.
    #[serde(default = "default_min_cipher_bits")]
    pub min_cipher_bits: u16,
}

impl TlsServerConfig {
    /// Whether either half of the default identity is configured.
    #[must_use]
    pub fn has_default_identity(&self) -> bool {
        non_blank(self.certificate_path.as_deref()).is_some()
            || non_blank(self.private_key_path.as_deref()).is_some()
    }
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl Default for TlsServerConfig {
    fn default() -> Self {
        Self {
            certificate_path: None,
            private_key_path: None,
            passphrase: None,
            min_cipher_bits: default_min_cipher_bits(),
        }
    }
}

impl fmt::Debug for TlsServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsServerConfig")
            .field("certificate_path", &self.certificate_path)
            .field("private_key_path", &self.private_key_path)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "<redacted>"))
            .field("min_cipher_bits", &self.min_cipher_bits)
            .finish()
    }
}
