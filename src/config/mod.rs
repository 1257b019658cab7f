//! Process configuration.
//!
//! JSON documents from several sources are merged over compiled defaults, then
//! individual fields are overridden from the environment. See [`load`].
//!
//! # Module Structure
//!
//! - [`crate::config::types`]: Root `Config` struct
//! - [`logging`]: Logging configuration
//! - [`security`]: Default TLS identity and cipher floor
//! - [`identity`]: Self-signed issuance parameters and per-server state
//! - [`crate::config::loader`]: Configuration loading functions
//! - [`crate::config::validation`]: Configuration validation functions
//! - [`crate::config::defaults`]: Default value functions

pub mod defaults;
pub mod identity;
pub mod loader;
pub mod logging;
pub mod security;
pub mod types;
pub mod validation;

pub use identity::IdentityConfig;

pub use loader::load;

pub use logging::{LogFormat, LogLevel, LoggingConfig};

pub use security::TlsServerConfig;

pub use types::Config;

pub use validation::validate_config;
