/// TLS stack hardening and listener wiring
///
/// - Minimum cipher-strength policy applied to the rustls crypto provider
/// - rustls server configuration built from a provisioned identity
pub mod cipher_policy;
pub mod tls;

pub use cipher_policy::{
    harden, hardened_provider, install_process_default, CipherPolicyError, CipherSuite,
    MIN_CIPHER_BITS,
};
pub use tls::{build_server_config, TlsSetupError};
