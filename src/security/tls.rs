use std::sync::Arc;

use rustls::crypto::CryptoProvider;
use rustls::ServerConfig as RustlsServerConfig;
use thiserror::Error;
use tracing::debug;

use crate::identity::Identity;

#[derive(Debug, Error)]
pub enum TlsSetupError {
    #[error("TLS is unavailable with the installed crypto provider: {0}")]
    TlsUnavailable(#[source] rustls::Error),
    #[error("TLS stack rejected the server identity: {0}")]
    InvalidIdentity(#[source] rustls::Error),
}

/// Build the listener configuration presenting `identity`.
///
/// Client certificates are not requested.
pub fn build_server_config(
    identity: &Identity,
    provider: Arc<CryptoProvider>,
) -> Result<RustlsServerConfig, TlsSetupError> {
    let cert_chain = vec![identity.certificate().der().clone()];
    let private_key = identity.key().to_rustls();

    let config = RustlsServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(TlsSetupError::TlsUnavailable)?
        .with_no_client_auth()
        .with_single_cert(cert_chain, private_key)
        .map_err(TlsSetupError::InvalidIdentity)?;

    debug!(
        common_name = identity.certificate().common_name().unwrap_or_default(),
        "TLS server configuration built"
    );
    Ok(config)
}
