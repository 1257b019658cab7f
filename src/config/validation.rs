//! Configuration validation functions.

use super::security::non_blank;
use super::Config;
use crate::security::cipher_policy::MIN_CIPHER_BITS;
use std::collections::HashSet;
use std::path::Path;

/// Reject configurations the provisioner cannot run with.
pub fn validate_config(config: &Config) -> anyhow::Result<()> {
    config
        .identity
        .issuer_options()
        .validate()
        .map_err(|err| anyhow::anyhow!("identity.key_bits: {err}"))?;

    if config.tls.min_cipher_bits < MIN_CIPHER_BITS {
        anyhow::bail!(
            "tls.min_cipher_bits is {}, but cipher suites weaker than {MIN_CIPHER_BITS} bits may not be enabled",
            config.tls.min_cipher_bits
        );
    }

    if config.identity.state_path.trim().is_empty() {
        anyhow::bail!("identity.state_path must not be empty");
    }

    if config.identity.servers.is_empty() {
        anyhow::bail!("identity.servers must list at least one server id");
    }
    let mut seen = HashSet::new();
    for id in &config.identity.servers {
        if id.trim().is_empty() {
            anyhow::bail!("identity.servers must not contain empty ids");
        }
        if !seen.insert(id.as_str()) {
            anyhow::bail!("identity.servers lists server {id} more than once");
        }
    }

    if config.tls.has_default_identity() {
        let cert_path = non_blank(config.tls.certificate_path.as_deref()).ok_or_else(|| {
            anyhow::anyhow!("tls.certificate_path must be set when tls.private_key_path is")
        })?;
        let key_path = non_blank(config.tls.private_key_path.as_deref()).ok_or_else(|| {
            anyhow::anyhow!("tls.private_key_path must be set when tls.certificate_path is")
        })?;

        if !Path::new(cert_path).exists() {
            anyhow::bail!("TLS certificate file not found at {cert_path}");
        }
        if !Path::new(key_path).exists() {
            anyhow::bail!("TLS private key file not found at {key_path}");
        }
    }

    Ok(())
}
