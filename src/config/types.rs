//! Root configuration types.

use super::identity::IdentityConfig;
use super::logging::LoggingConfig;
use super::security::TlsServerConfig;
use serde::{Deserialize, Serialize};

/// Root configuration struct.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub tls: TlsServerConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
}
