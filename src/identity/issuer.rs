//! Self-signed identity generation.
//!
//! Used when neither the configured identity nor the shared default is usable.
//! Every call generates a fresh RSA key pair.

use pkcs8::der::asn1::Ia5StringRef;
use pkcs8::der::Encode;
use rand_core::OsRng;
use rcgen::{
    CertificateParams, CustomExtension, DistinguishedName, DnType, ExtendedKeyUsagePurpose, IsCa,
    KeyIdMethod, KeyPair, SerialNumber,
};
use rsa::pkcs8::EncodePrivateKey;
use rsa::RsaPrivateKey;
use rustls_pki_types::PrivatePkcs8KeyDer;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::debug;

use super::codec::{Certificate, PrivateKey};
use super::{GenerationTag, Identity};

pub const MIN_KEY_BITS: usize = 2048;
pub const MAX_KEY_BITS: usize = 8192;
pub const DEFAULT_KEY_BITS: usize = 2048;

/// Lifetime of a generated certificate.
pub const VALIDITY_DAYS: i64 = 365;

/// Netscape certificate comment (2.16.840.1.113730.1.13).
const NETSCAPE_COMMENT_OID: &[u64] = &[2, 16, 840, 1, 113_730, 1, 13];
const ISSUER_COMMENT: &str = concat!("Generated by ", env!("CARGO_PKG_NAME"));

/// Hash used for the RSA PKCS#1 v1.5 self-signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SignatureHash {
    #[default]
    Sha256,
    Sha384,
    Sha512,
}

impl SignatureHash {
    fn algorithm(self) -> &'static rcgen::SignatureAlgorithm {
        match self {
            Self::Sha256 => &rcgen::PKCS_RSA_SHA256,
            Self::Sha384 => &rcgen::PKCS_RSA_SHA384,
            Self::Sha512 => &rcgen::PKCS_RSA_SHA512,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssuerOptions {
    pub key_bits: usize,
    pub signature_hash: SignatureHash,
}

impl Default for IssuerOptions {
    fn default() -> Self {
        Self {
            key_bits: DEFAULT_KEY_BITS,
            signature_hash: SignatureHash::default(),
        }
    }
}

impl IssuerOptions {
    pub fn validate(&self) -> Result<(), IssueError> {
        if (MIN_KEY_BITS..=MAX_KEY_BITS).contains(&self.key_bits) {
            Ok(())
        } else {
            Err(IssueError::KeySize(self.key_bits))
        }
    }
}

#[derive(Debug, Error)]
pub enum IssueError {
    #[error("RSA key size {0} is outside the supported range {MIN_KEY_BITS}..={MAX_KEY_BITS}")]
    KeySize(usize),
    #[error("RSA key generation failed: {0}")]
    KeyGeneration(String),
    #[error("certificate signing failed: {0}")]
    Signing(#[from] rcgen::Error),
    #[error("failed to encode certificate extension: {0}")]
    Encoding(String),
    #[error("generated identity failed validation: {0}")]
    Validation(String),
}

/// Issues self-signed server identities stamped with a [`GenerationTag`].
#[derive(Debug, Clone, Default)]
pub struct SelfSignedIssuer {
    options: IssuerOptions,
}

impl SelfSignedIssuer {
    #[must_use]
    pub fn new(options: IssuerOptions) -> Self {
        Self { options }
    }

    #[must_use]
    pub fn options(&self) -> &IssuerOptions {
        &self.options
    }

    /// Generate a new key pair and a certificate signed by it.
    pub fn generate(&self) -> Result<Identity, IssueError> {
        self.options.validate()?;

        let pkcs8 = generate_rsa_pkcs8(self.options.key_bits)?;
        let key_pair = KeyPair::from_pkcs8_der_and_sign_algo(
            &PrivatePkcs8KeyDer::from(pkcs8.as_slice()),
            self.options.signature_hash.algorithm(),
        )?;

        let params = certificate_params(GenerationTag::CURRENT, OffsetDateTime::now_utc())?;
        let signed = params.self_signed(&key_pair)?;

        let certificate = Certificate::from_der(signed.der())
            .map_err(|err| IssueError::Validation(err.to_string()))?;
        let key = PrivateKey::from_pkcs8_der(&pkcs8)
            .map_err(|err| IssueError::Validation(err.to_string()))?;
        let identity =
            Identity::new(certificate, key).map_err(|err| IssueError::Validation(err.to_string()))?;

        debug!(
            key_bits = self.options.key_bits,
            signature_hash = ?self.options.signature_hash,
            not_after = %identity.certificate().not_after(),
            "Generated self-signed certificate"
        );

        Ok(identity)
    }
}

fn generate_rsa_pkcs8(bits: usize) -> Result<Vec<u8>, IssueError> {
    let key = RsaPrivateKey::new(&mut OsRng, bits)
        .map_err(|err| IssueError::KeyGeneration(err.to_string()))?;
    let document = key
        .to_pkcs8_der()
        .map_err(|err| IssueError::KeyGeneration(err.to_string()))?;
    Ok(document.as_bytes().to_vec())
}

fn certificate_params(
    tag: GenerationTag,
    now: OffsetDateTime,
) -> Result<CertificateParams, IssueError> {
    // X.509 times carry whole seconds only.
    let not_before = now.replace_nanosecond(0).unwrap_or(now);

    let mut distinguished_name = DistinguishedName::new();
    distinguished_name.push(DnType::CommonName, tag.common_name());

    let mut params = CertificateParams::default();
    params.distinguished_name = distinguished_name;
    params.serial_number = Some(SerialNumber::from(1u64));
    params.not_before = not_before;
    params.not_after = not_before + Duration::days(VALIDITY_DAYS);
    params.is_ca = IsCa::ExplicitNoCa;
    params.extended_key_usages = vec![
        ExtendedKeyUsagePurpose::ServerAuth,
        ExtendedKeyUsagePurpose::ClientAuth,
    ];
    params.key_identifier_method = KeyIdMethod::Sha256;
    params.custom_extensions = vec![CustomExtension::from_oid_content(
        NETSCAPE_COMMENT_OID,
        der_ia5_string(ISSUER_COMMENT)?,
    )];
    Ok(params)
}

fn der_ia5_string(text: &str) -> Result<Vec<u8>, IssueError> {
    Ia5StringRef::new(text)
        .and_then(|value| value.to_der())
        .map_err(|err| IssueError::Encoding(err.to_string()))
}
