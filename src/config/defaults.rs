//! Default value functions for configuration fields.
//!
//! Used by serde's `#[serde(default = ...)]` attributes throughout the
//! configuration system, grouped by section.

use super::logging::LogFormat;
use crate::identity::issuer::DEFAULT_KEY_BITS;
use crate::security::cipher_policy::MIN_CIPHER_BITS;

// =============================================================================
// Logging Defaults
// =============================================================================

pub fn default_log_dir() -> String {
    "logs".to_string()
}

pub fn default_log_filename() -> String {
    "server-identity.log".to_string()
}

pub fn default_rotation() -> String {
    "daily".to_string()
}

pub const fn default_enable_file_logging() -> bool {
    false
}

pub const fn default_log_format() -> LogFormat {
    LogFormat::Text
}

// =============================================================================
// TLS Defaults
// =============================================================================

pub const fn default_min_cipher_bits() -> u16 {
    MIN_CIPHER_BITS
}

// =============================================================================
// Identity Defaults
// =============================================================================

pub const fn default_key_bits() -> usize {
    DEFAULT_KEY_BITS
}

pub fn default_state_path() -> String {
    "identity-state.json".to_string()
}

pub fn default_servers() -> Vec<String> {
    vec!["1".to_string()]
}
