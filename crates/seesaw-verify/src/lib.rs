//! Detached-signature verification for update artifacts.
//!
//! The scheme is fixed: 2048-bit RSA, PKCS#1 v1.5 padding over a SHA-256
//! digest, matching the key baked into the device image. Verification
//! operates on the artifact exactly as downloaded; nothing is decompressed
//! or reformatted first.
//!
//! Every signature-level failure (malformed signature, wrong key, altered
//! payload) collapses to [`SeesawError::VerificationFailed`]. A key file
//! that cannot be loaded is the operator's problem, not the update's, and
//! surfaces separately as [`SeesawError::InvalidKey`].

use std::fs;
use std::path::Path;

use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::pkcs8::DecodePublicKey;
use rsa::signature::Verifier;
use rsa::RsaPublicKey;
use seesaw_error::{Result, SeesawError};
use sha2::Sha256;

/// The fixed public key updates are signed against.
#[derive(Debug, Clone)]
pub struct UpdateKey {
    key: VerifyingKey<Sha256>,
}

impl UpdateKey {
    /// Load the key from a PEM file.
    ///
    /// Device images in the field carry either SubjectPublicKeyInfo
    /// (`BEGIN PUBLIC KEY`) or PKCS#1 (`BEGIN RSA PUBLIC KEY`) encodings;
    /// both are accepted.
    pub fn from_pem_file(path: &Path) -> Result<Self> {
        let pem = fs::read_to_string(path).map_err(|err| SeesawError::InvalidKey {
            path: path.to_owned(),
            detail: err.to_string(),
        })?;
        Self::from_pem(&pem).map_err(|detail| SeesawError::InvalidKey {
            path: path.to_owned(),
            detail,
        })
    }

    /// Parse a PEM-encoded RSA public key.
    pub fn from_pem(pem: &str) -> std::result::Result<Self, String> {
        let key = RsaPublicKey::from_public_key_pem(pem)
            .or_else(|spki_err| {
                RsaPublicKey::from_pkcs1_pem(pem).map_err(|_| spki_err.to_string())
            })?;
        Ok(Self {
            key: VerifyingKey::new(key),
        })
    }

    /// Verify `signature` over the exact bytes of `payload`.
    ///
    /// No side effects; the same three inputs always produce the same
    /// answer.
    pub fn verify(&self, payload: &[u8], signature: &[u8]) -> Result<()> {
        let signature =
            Signature::try_from(signature).map_err(|_| SeesawError::VerificationFailed)?;
        self.key
            .verify(payload, &signature)
            .map_err(|_| SeesawError::VerificationFailed)
    }

    /// Boolean form of [`verify`](Self::verify) for callers that only need
    /// the answer.
    #[must_use]
    pub fn is_valid(&self, payload: &[u8], signature: &[u8]) -> bool {
        self.verify(payload, signature).is_ok()
    }
}
