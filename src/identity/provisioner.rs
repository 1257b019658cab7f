//! Identity selection at startup.
//!
//! Order of preference:
//! 1. the identity in the server's configuration store,
//! 2. the process-wide [`SharedIdentity`],
//! 3. a freshly generated self-signed identity, persisted back to the store.
//!
//! A shared identity that was generated in this process (rather than seeded from the
//! daemon-wide default) is also persisted to every store that falls back to it, so each
//! server keeps its fingerprint across restarts.
//!
//! Unusable configured material is never an error here: it is logged and the next
//! source is tried. Only a failure to generate is fatal.

use std::fmt;
use thiserror::Error;
use tracing::{debug, error, info, info_span, warn};

use super::codec::{self, Certificate, CodecError, EncodingFormat, PrivateKey};
use super::issuer::{IssueError, SelfSignedIssuer};
use super::shared::{SharedIdentity, SharedOrigin};
use super::store::{ConfigStore, CERTIFICATE_KEY, KEY_KEY, PASSPHRASE_KEY};
use super::{Identity, IdentityMismatch};

/// Where the active identity came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionSource {
    Configured,
    SharedFallback,
    Generated,
}

impl fmt::Display for ProvisionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Configured => "configured",
            Self::SharedFallback => "shared",
            Self::Generated => "generated",
        })
    }
}

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("failed to generate a self-signed server identity: {0}")]
    Generation(#[from] IssueError),
}

/// The identity a server instance runs with, plus its cached fingerprint.
#[derive(Debug, Clone)]
pub struct ProvisionedIdentity {
    identity: Identity,
    digest: String,
    source: ProvisionSource,
}

impl ProvisionedIdentity {
    fn new(identity: Identity, source: ProvisionSource) -> Self {
        let digest = codec::digest(identity.certificate());
        Self {
            identity,
            digest,
            source,
        }
    }

    #[must_use]
    pub fn active_certificate(&self) -> &Certificate {
        self.identity.certificate()
    }

    #[must_use]
    pub fn active_key(&self) -> &PrivateKey {
        self.identity.key()
    }

    /// Lowercase hex fingerprint of the active certificate.
    #[must_use]
    pub fn digest(&self) -> &str {
        &self.digest
    }

    #[must_use]
    pub fn source(&self) -> ProvisionSource {
        self.source
    }

    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }
}

#[derive(Debug, Error)]
enum KeyLoadError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Mismatch(#[from] IdentityMismatch),
}

/// Runs the fallback chain for server instances sharing one process.
#[derive(Debug, Clone)]
pub struct IdentityProvisioner {
    issuer: SelfSignedIssuer,
    shared: SharedIdentity,
}

impl IdentityProvisioner {
    #[must_use]
    pub fn new(issuer: SelfSignedIssuer, shared: SharedIdentity) -> Self {
        Self { issuer, shared }
    }

    #[must_use]
    pub fn shared(&self) -> &SharedIdentity {
        &self.shared
    }

    /// Select the identity for `server_id`, reading and possibly writing `store`.
    pub fn provision<S>(
        &self,
        server_id: &str,
        store: &mut S,
    ) -> Result<ProvisionedIdentity, ProvisionError>
    where
        S: ConfigStore + ?Sized,
    {
        let _span = info_span!("provision_identity", server_id).entered();

        let certificate = store.get_or(CERTIFICATE_KEY, "");
        let key = store.get_or(KEY_KEY, "");
        let passphrase = store.get_or(PASSPHRASE_KEY, "");

        if let Some(identity) =
            load_identity(certificate.as_bytes(), key.as_bytes(), passphrase.as_bytes())
        {
            return Ok(activate(identity, ProvisionSource::Configured));
        }

        if !certificate.is_empty() || !key.is_empty() {
            error!("Certificate specified, but failed to load");
        }

        let mut slot = self.shared.lock();
        if let Some(identity) = slot.get() {
            info!("Using shared default certificate");
            let identity = identity.clone();
            if slot.origin() == Some(SharedOrigin::Generated) {
                persist(store, &identity);
            }
            return Ok(activate(identity, ProvisionSource::SharedFallback));
        }

        info!("Generating new server certificate");
        let identity = self.issuer.generate()?;
        persist(store, &identity);
        if slot.publish(identity.clone()) {
            debug!("Published generated certificate as shared default");
        }
        drop(slot);

        Ok(activate(identity, ProvisionSource::Generated))
    }
}

fn activate(identity: Identity, source: ProvisionSource) -> ProvisionedIdentity {
    let provisioned = ProvisionedIdentity::new(identity, source);
    info!(
        %source,
        digest = provisioned.digest(),
        common_name = provisioned.active_certificate().common_name().unwrap_or_default(),
        not_after = %provisioned.active_certificate().not_after(),
        "Server certificate active"
    );
    provisioned
}

/// Build an identity from configured certificate and key text.
///
/// Either field may hold both parts. The certificate field is tried as a
/// certificate first, then the key field; the key is looked for in the key field
/// first, then the certificate field. Certificates stamped with a deprecated
/// [`GenerationTag`](super::GenerationTag) are discarded.
#[must_use]
pub fn load_identity(certificate: &[u8], key: &[u8], passphrase: &[u8]) -> Option<Identity> {
    let mut cert = None;

    if !certificate.is_empty() {
        match codec::parse_certificate(certificate, EncodingFormat::Pem) {
            Ok(parsed) => cert = accept_certificate(parsed),
            Err(err) => warn!(error = %err, "Failed to parse certificate"),
        }
    }

    if cert.is_none() && !key.is_empty() {
        if let Ok(parsed) = codec::parse_certificate(key, EncodingFormat::Pem) {
            cert = accept_certificate(parsed);
            if cert.is_some() {
                info!("Using certificate from key");
            }
        }
    }

    let cert = cert?;

    if !key.is_empty() {
        match pair_key(&cert, key, passphrase) {
            Ok(identity) => return Some(identity),
            Err(err) => warn!(error = %err, "Failed to parse key"),
        }
    }

    if !certificate.is_empty() {
        match pair_key(&cert, certificate, passphrase) {
            Ok(identity) => {
                info!("Using key from certificate");
                return Some(identity);
            }
            Err(err) => debug!(error = %err, "No usable key alongside certificate"),
        }
    }

    None
}

fn accept_certificate(certificate: Certificate) -> Option<Certificate> {
    match certificate.generation_tag() {
        Some(tag) if tag.is_deprecated() => {
            warn!(
                common_name = tag.common_name(),
                "Old autogenerated certificate is unusable for registration, invalidating it"
            );
            None
        }
        _ => Some(certificate),
    }
}

fn pair_key(
    certificate: &Certificate,
    bytes: &[u8],
    passphrase: &[u8],
) -> Result<Identity, KeyLoadError> {
    let key = codec::parse_key(
        bytes,
        EncodingFormat::Pem,
        certificate.key_algorithm(),
        passphrase,
    )?;
    Ok(Identity::new(certificate.clone(), key)?)
}

fn persist<S>(store: &mut S, identity: &Identity)
where
    S: ConfigStore + ?Sized,
{
    let certificate = identity.certificate().to_pem();
    let key = identity.key().to_pem();

    match store.set_many(&[(CERTIFICATE_KEY, certificate.as_str()), (KEY_KEY, key.as_str())]) {
        Ok(()) => debug!("Stored generated certificate and key"),
        Err(err) => error!(
            error = %err,
            "Failed to store generated certificate; a new one will be generated on next start"
        ),
    }
}
