//! Minimum cipher-strength policy for the TLS stack.
//!
//! The policy runs once at startup: the provider's suite list is filtered to
//! suites at or above the strength floor and the result is installed as the
//! process default. An empty result is fatal.

use std::fmt;
use std::sync::Arc;

use rustls::crypto::CryptoProvider;
use rustls::SupportedCipherSuite;
use thiserror::Error;
use tracing::{debug, info};

/// Lowest acceptable effective key strength.
pub const MIN_CIPHER_BITS: u16 = 128;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CipherPolicyError {
    #[error("no cipher suite offers at least {min_bits} bits of strength")]
    NoAcceptableCipher { min_bits: u16 },
    #[error("a process-wide TLS crypto provider is already installed")]
    AlreadyInstalled,
}

/// A cipher suite name and its effective key strength in bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherSuite {
    pub name: String,
    pub strength_bits: u16,
}

impl CipherSuite {
    #[must_use]
    pub fn new(name: impl Into<String>, strength_bits: u16) -> Self {
        Self {
            name: name.into(),
            strength_bits,
        }
    }

    /// Describe a rustls suite, deriving strength from the bulk cipher in its name.
    #[must_use]
    pub fn from_rustls(suite: &SupportedCipherSuite) -> Self {
        let name = format!("{:?}", suite.suite());
        let strength_bits = strength_from_name(&name);
        Self {
            name,
            strength_bits,
        }
    }
}

impl fmt::Display for CipherSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} bits)", self.name, self.strength_bits)
    }
}

fn strength_from_name(name: &str) -> u16 {
    let name = name.to_ascii_uppercase();
    if name.contains("AES_256") || name.contains("CHACHA20") {
        256
    } else if name.contains("AES_128") {
        128
    } else if name.contains("3DES") {
        112
    } else if name.contains("EXPORT") || name.contains("40") {
        40
    } else {
        0
    }
}

/// Keep the suites offering at least `min_bits`, in their original order.
pub fn harden(
    available: &[CipherSuite],
    min_bits: u16,
) -> Result<Vec<CipherSuite>, CipherPolicyError> {
    let selected: Vec<CipherSuite> = available
        .iter()
        .filter(|suite| {
            let keep = suite.strength_bits >= min_bits;
            if !keep {
                debug!(
                    suite = %suite.name,
                    bits = suite.strength_bits,
                    "Disabling weak cipher suite"
                );
            }
            keep
        })
        .cloned()
        .collect();

    if selected.is_empty() {
        return Err(CipherPolicyError::NoAcceptableCipher { min_bits });
    }
    Ok(selected)
}

/// Apply [`harden`] to a rustls provider's suite list.
pub fn hardened_provider(
    mut provider: CryptoProvider,
    min_bits: u16,
) -> Result<CryptoProvider, CipherPolicyError> {
    let described: Vec<CipherSuite> = provider
        .cipher_suites
        .iter()
        .map(CipherSuite::from_rustls)
        .collect();
    let selected = harden(&described, min_bits)?;

    provider
        .cipher_suites
        .retain(|suite| selected.iter().any(|s| s.name == format!("{:?}", suite.suite())));

    info!(
        enabled = provider.cipher_suites.len(),
        min_bits,
        "Cipher policy applied"
    );
    Ok(provider)
}

/// Install `provider` as the process default. Fails if one was installed before.
pub fn install_process_default(
    provider: CryptoProvider,
) -> Result<Arc<CryptoProvider>, CipherPolicyError> {
    provider
        .install_default()
        .map_err(|_| CipherPolicyError::AlreadyInstalled)?;
    CryptoProvider::get_default()
        .cloned()
        .ok_or(CipherPolicyError::AlreadyInstalled)
}
