//! Self-signed issuance parameters and the per-server state file.

use super::defaults::{default_key_bits, default_servers, default_state_path};
use crate::identity::{IssuerOptions, SignatureHash};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IdentityConfig {
    /// RSA modulus size for generated keys.
    #[serde(default = "default_key_bits")]
    pub key_bits: usize,
    /// Hash used for the self-signature: "sha256" (default), "sha384" or "sha512".
    #[serde(default)]
    pub signature_hash: SignatureHash,
    /// JSON file holding each virtual server's certificate and key.
    #[serde(default = "default_state_path")]
    pub state_path: String,
    /// Virtual servers to provision, in order.
    #[serde(
        default = "default_servers",
        deserialize_with = "deserialize_server_ids"
    )]
    pub servers: Vec<String>,
}

impl IdentityConfig {
    #[must_use]
    pub fn issuer_options(&self) -> IssuerOptions {
        IssuerOptions {
            key_bits: self.key_bits,
            signature_hash: self.signature_hash,
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            key_bits: default_key_bits(),
            signature_hash: SignatureHash::default(),
            state_path: default_state_path(),
            servers: default_servers(),
        }
    }
}

// Server ids come back from env overrides as numbers (`1`) or arrays of numbers (`1,2`).
fn deserialize_server_ids<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    fn server_id<E: de::Error>(value: Value) -> Result<String, E> {
        match value {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(E::custom(format!(
                "server ids must be strings or numbers, found {other}"
            ))),
        }
    }

    match Value::deserialize(deserializer)? {
        Value::Array(items) => items.into_iter().map(server_id).collect(),
        other => server_id(other).map(|id| vec![id]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_ids_accept_numbers_and_scalars() {
        let config: IdentityConfig = serde_json::from_str(r#"{ "servers": [1, "2"] }"#).unwrap();
        assert_eq!(config.servers, vec!["1", "2"]);

        let config: IdentityConfig = serde_json::from_str(r#"{ "servers": 7 }"#).unwrap();
        assert_eq!(config.servers, vec!["7"]);

        assert!(serde_json::from_str::<IdentityConfig>(r#"{ "servers": [true] }"#).is_err());
    }

    #[test]
    fn test_issuer_options_follow_config() {
        let config: IdentityConfig =
            serde_json::from_str(r#"{ "key_bits": 3072, "signature_hash": "sha512" }"#).unwrap();
        let options = config.issuer_options();
        assert_eq!(options.key_bits, 3072);
        assert_eq!(options.signature_hash, SignatureHash::Sha512);
        assert_eq!(config.servers, vec!["1"]);
    }
}
