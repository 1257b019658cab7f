use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};
use std::sync::OnceLock;

use super::{Identity, SelfSignedIssuer};

/// One RSA identity per test binary; generation is the slow part.
pub(crate) fn generated_identity() -> &'static Identity {
    static IDENTITY: OnceLock<Identity> = OnceLock::new();
    IDENTITY.get_or_init(|| {
        SelfSignedIssuer::default()
            .generate()
            .expect("self-signed generation should succeed")
    })
}

/// Self-signed ECDSA P-256 certificate and PKCS#8 key, both PEM.
pub(crate) fn ec_identity_pem(common_name: &str) -> (String, String) {
    let key_pair = KeyPair::generate().expect("ecdsa key generation should succeed");
    let mut params = CertificateParams::default();
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, common_name);
    params.distinguished_name = dn;
    let cert = params
        .self_signed(&key_pair)
        .expect("self-signing should succeed");
    (cert.pem(), key_pair.serialize_pem())
}
