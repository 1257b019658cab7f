#![cfg_attr(not(test), deny(clippy::panic))]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

//! # Server Identity
//!
//! Makes sure a network service always starts with a usable TLS certificate and
//! matching private key: the one it was configured with, the process-wide shared
//! default, or a freshly generated self-signed identity that is written back to
//! its configuration. The certificate's SHA-256 fingerprint serves as the
//! service's identity token, and the TLS stack is restricted to cipher suites of
//! at least 128 bits.

/// Process configuration and environment overrides
pub mod config;

/// Certificates, keys and the provisioning fallback chain
pub mod identity;

/// Structured logging configuration
pub mod logging;

/// Cipher policy and rustls listener configuration
pub mod security;
