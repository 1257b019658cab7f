//! Certificate and private key codec.
//!
//! Every parse entry point returns `Result` and never panics, whatever the input.
//! Callers decide whether a failure is fatal or just a reason to try the next source.

use chrono::{DateTime, Utc};
use pem::{EncodeConfig, LineEnding, Pem};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::EncodePrivateKey;
use rustls_pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;
use x509_parser::prelude::{FromDer, X509Certificate};

use super::GenerationTag;

const CERTIFICATE_TAG: &str = "CERTIFICATE";
const PKCS8_TAG: &str = "PRIVATE KEY";
const ENCRYPTED_PKCS8_TAG: &str = "ENCRYPTED PRIVATE KEY";
const PKCS1_TAG: &str = "RSA PRIVATE KEY";
const SEC1_TAG: &str = "EC PRIVATE KEY";

const OID_RSA_ENCRYPTION: &str = "1.2.840.113549.1.1.1";
const OID_EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";
const OID_ED25519: &str = "1.3.101.112";

/// Outer encoding of key material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingFormat {
    Pem,
    Der,
}

/// Public-key algorithm of a certificate or private key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyAlgorithm {
    Rsa,
    Ec,
    Ed25519,
}

impl KeyAlgorithm {
    fn from_oid(oid: &str) -> Option<Self> {
        match oid {
            OID_RSA_ENCRYPTION => Some(Self::Rsa),
            OID_EC_PUBLIC_KEY => Some(Self::Ec),
            OID_ED25519 => Some(Self::Ed25519),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rsa => "rsa",
            Self::Ec => "ec",
            Self::Ed25519 => "ed25519",
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a certificate or key could not be decoded.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("malformed PEM: {0}")]
    Pem(String),
    #[error("no CERTIFICATE block found")]
    NoCertificate,
    #[error("no private key block found")]
    NoPrivateKey,
    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),
    #[error("unexpected trailing data after certificate")]
    TrailingData,
    #[error("certificate validity period is out of range")]
    InvalidValidity,
    #[error("invalid private key: {0}")]
    InvalidKey(String),
    #[error("unsupported public key algorithm {0}")]
    UnsupportedAlgorithm(String),
    #[error("unsupported private key format: {0}")]
    UnsupportedKeyFormat(&'static str),
    #[error("expected a {expected} key, found {found}")]
    AlgorithmMismatch {
        expected: KeyAlgorithm,
        found: KeyAlgorithm,
    },
    #[error("private key is encrypted and no passphrase was given")]
    PassphraseRequired,
    #[error("failed to decrypt private key")]
    Decryption,
}

/// A parsed X.509 certificate.
#[derive(Clone, PartialEq, Eq)]
pub struct Certificate {
    der: CertificateDer<'static>,
    common_name: Option<String>,
    key_algorithm: KeyAlgorithm,
    public_key: Vec<u8>,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
}

impl Certificate {
    /// Decode a single DER certificate.
    pub fn from_der(der: &[u8]) -> Result<Self, CodecError> {
        let (rest, parsed) = X509Certificate::from_der(der)
            .map_err(|err| CodecError::InvalidCertificate(err.to_string()))?;
        if !rest.is_empty() {
            return Err(CodecError::TrailingData);
        }

        let spki = parsed.public_key();
        let oid = spki.algorithm.algorithm.to_id_string();
        let key_algorithm =
            KeyAlgorithm::from_oid(&oid).ok_or(CodecError::UnsupportedAlgorithm(oid))?;

        let common_name = parsed
            .subject()
            .iter_common_name()
            .next()
            .and_then(|attr| attr.as_str().ok())
            .map(str::to_owned);

        let validity = parsed.validity();
        let not_before = DateTime::<Utc>::from_timestamp(validity.not_before.timestamp(), 0)
            .ok_or(CodecError::InvalidValidity)?;
        let not_after = DateTime::<Utc>::from_timestamp(validity.not_after.timestamp(), 0)
            .ok_or(CodecError::InvalidValidity)?;

        Ok(Self {
            der: CertificateDer::from(der.to_vec()),
            common_name,
            key_algorithm,
            public_key: spki.subject_public_key.data.to_vec(),
            not_before,
            not_after,
        })
    }

    #[must_use]
    pub fn der(&self) -> &CertificateDer<'static> {
        &self.der
    }

    #[must_use]
    pub fn common_name(&self) -> Option<&str> {
        self.common_name.as_deref()
    }

    #[must_use]
    pub fn generation_tag(&self) -> Option<GenerationTag> {
        self.common_name().and_then(GenerationTag::from_common_name)
    }

    #[must_use]
    pub fn key_algorithm(&self) -> KeyAlgorithm {
        self.key_algorithm
    }

    /// Raw subject public key bits.
    #[must_use]
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    #[must_use]
    pub fn not_before(&self) -> DateTime<Utc> {
        self.not_before
    }

    #[must_use]
    pub fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }

    #[must_use]
    pub fn to_pem(&self) -> String {
        encode_block(CERTIFICATE_TAG, self.der.as_ref())
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("common_name", &self.common_name)
            .field("key_algorithm", &self.key_algorithm)
            .field("not_before", &self.not_before)
            .field("not_after", &self.not_after)
            .finish_non_exhaustive()
    }
}

/// A private key, normalized to unencrypted PKCS#8.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey {
    algorithm: KeyAlgorithm,
    pkcs8: Vec<u8>,
    public_key: Vec<u8>,
}

impl PrivateKey {
    /// Decode an unencrypted PKCS#8 key and derive its public half.
    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self, CodecError> {
        let info = pkcs8::PrivateKeyInfo::try_from(der)
            .map_err(|err| CodecError::InvalidKey(err.to_string()))?;
        let oid = info.algorithm.oid.to_string();
        let algorithm =
            KeyAlgorithm::from_oid(&oid).ok_or(CodecError::UnsupportedAlgorithm(oid))?;

        let key_pair = rcgen::KeyPair::try_from(der)
            .map_err(|err| CodecError::InvalidKey(err.to_string()))?;

        Ok(Self {
            algorithm,
            pkcs8: der.to_vec(),
            public_key: key_pair.public_key_raw().to_vec(),
        })
    }

    #[must_use]
    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    /// Raw public key bits, comparable with [`Certificate::public_key`].
    #[must_use]
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    #[must_use]
    pub fn pkcs8_der(&self) -> &[u8] {
        &self.pkcs8
    }

    #[must_use]
    pub fn to_rustls(&self) -> PrivateKeyDer<'static> {
        PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(self.pkcs8.clone()))
    }

    #[must_use]
    pub fn to_pem(&self) -> String {
        encode_block(PKCS8_TAG, &self.pkcs8)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// Parse the first certificate in `bytes`.
///
/// PEM input may hold several blocks (for example a certificate followed by its key);
/// only the first `CERTIFICATE` block is used.
pub fn parse_certificate(bytes: &[u8], format: EncodingFormat) -> Result<Certificate, CodecError> {
    match format {
        EncodingFormat::Der => Certificate::from_der(bytes),
        EncodingFormat::Pem => {
            let blocks = parse_blocks(bytes)?;
            let block = blocks
                .iter()
                .find(|block| block.tag() == CERTIFICATE_TAG)
                .ok_or(CodecError::NoCertificate)?;
            Certificate::from_der(block.contents())
        }
    }
}

/// Parse a private key of algorithm `hint` from `bytes`.
///
/// `passphrase` is only consulted for encrypted PKCS#8 keys and may be empty.
pub fn parse_key(
    bytes: &[u8],
    format: EncodingFormat,
    hint: KeyAlgorithm,
    passphrase: &[u8],
) -> Result<PrivateKey, CodecError> {
    let key = match format {
        EncodingFormat::Der => decode_der_key(bytes, hint, passphrase)?,
        EncodingFormat::Pem => decode_pem_key(bytes, passphrase)?,
    };

    if key.algorithm != hint {
        return Err(CodecError::AlgorithmMismatch {
            expected: hint,
            found: key.algorithm,
        });
    }

    Ok(key)
}

/// Lowercase hex SHA-256 over the certificate DER.
#[must_use]
pub fn digest(certificate: &Certificate) -> String {
    hex::encode(Sha256::digest(certificate.der.as_ref()))
}

fn parse_blocks(bytes: &[u8]) -> Result<Vec<Pem>, CodecError> {
    pem::parse_many(bytes).map_err(|err| CodecError::Pem(err.to_string()))
}

fn encode_block(tag: &str, contents: &[u8]) -> String {
    let block = Pem::new(tag, contents.to_vec());
    pem::encode_config(&block, EncodeConfig::new().set_line_ending(LineEnding::LF))
}

fn decode_pem_key(bytes: &[u8], passphrase: &[u8]) -> Result<PrivateKey, CodecError> {
    let mut last_error = CodecError::NoPrivateKey;

    for block in parse_blocks(bytes)? {
        let decoded = match block.tag() {
            PKCS8_TAG => PrivateKey::from_pkcs8_der(block.contents()),
            ENCRYPTED_PKCS8_TAG => decrypt_pkcs8(block.contents(), passphrase),
            PKCS1_TAG if block.headers().get("Proc-Type").is_some() => {
                Err(CodecError::UnsupportedKeyFormat("legacy encrypted PEM"))
            }
            PKCS1_TAG => decode_pkcs1(block.contents()),
            SEC1_TAG => Err(CodecError::UnsupportedKeyFormat("SEC1")),
            _ => continue,
        };

        match decoded {
            Ok(key) => return Ok(key),
            Err(err) => last_error = err,
        }
    }

    Err(last_error)
}

fn decode_der_key(
    der: &[u8],
    hint: KeyAlgorithm,
    passphrase: &[u8],
) -> Result<PrivateKey, CodecError> {
    let err = match PrivateKey::from_pkcs8_der(der) {
        Ok(key) => return Ok(key),
        Err(err) => err,
    };

    if hint == KeyAlgorithm::Rsa {
        if let Ok(key) = decode_pkcs1(der) {
            return Ok(key);
        }
    }

    if pkcs8::EncryptedPrivateKeyInfo::try_from(der).is_ok() {
        return decrypt_pkcs8(der, passphrase);
    }

    Err(err)
}

fn decode_pkcs1(der: &[u8]) -> Result<PrivateKey, CodecError> {
    let key = rsa::RsaPrivateKey::from_pkcs1_der(der)
        .map_err(|err| CodecError::InvalidKey(err.to_string()))?;
    let document = key
        .to_pkcs8_der()
        .map_err(|err| CodecError::InvalidKey(err.to_string()))?;
    PrivateKey::from_pkcs8_der(document.as_bytes())
}

fn decrypt_pkcs8(der: &[u8], passphrase: &[u8]) -> Result<PrivateKey, CodecError> {
    if passphrase.is_empty() {
        return Err(CodecError::PassphraseRequired);
    }

    let encrypted = pkcs8::EncryptedPrivateKeyInfo::try_from(der)
        .map_err(|err| CodecError::InvalidKey(err.to_string()))?;
    let document = encrypted
        .decrypt(passphrase)
        .map_err(|_| CodecError::Decryption)?;
    PrivateKey::from_pkcs8_der(document.as_bytes())
}
