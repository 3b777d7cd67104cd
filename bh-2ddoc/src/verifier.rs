// Copyright (C) 2020-2026  The Blockhouse Technology Limited (TBTL).
//
// This program is free software: you can redistribute it and/or modify it
// under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or (at your
// option) any later version.
//
// This program is distributed in the hope that it will be useful, but
// WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public
// License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Verification of the ECDSA signature carried by a 2D-DOC.
//!
//! Signatures cover the header and message zones. They are stored base32
//! encoded in the signature zone, as the raw concatenation of `r` and `s`.
//! The public key comes from a [`CertificateDirectory`] as an uncompressed
//! SEC1 point, which is wrapped into a `SubjectPublicKeyInfo` before being
//! handed to [`openssl`].

use bherror::{
    traits::{ErrorContext as _, ForeignError as _, PropagateError as _},
    Error,
};
use openssl::{bn::BigNum, ec::EcKey, ecdsa::EcdsaSig, pkey::Public, sha::sha256};

use crate::{
    utils::base32::base32_decode, CertificateDirectory, CertificateRecord, DirectoryError,
    RetryPolicy, VerificationError, KEY_TYPE_EC,
};

type Result<T> = bherror::Result<T, VerificationError>;

/// Elliptic curves 2D-DOC certificates are issued on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedCurve {
    /// NIST P-256.
    Secp256r1,
    /// NIST P-384.
    Secp384r1,
    /// NIST P-521.
    Secp521r1,
}

impl NamedCurve {
    /// Resolves one of the names a curve goes by.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "prime256v1" | "P-256" | "secp256r1" => Some(Self::Secp256r1),
            "P-384" | "secp384r1" => Some(Self::Secp384r1),
            "P-521" | "secp521r1" => Some(Self::Secp521r1),
            _ => None,
        }
    }

    /// DER of the `SubjectPublicKeyInfo` up to and including the header of
    /// the `BIT STRING` which holds the point.
    fn spki_prefix(self) -> &'static [u8] {
        match self {
            Self::Secp256r1 => &[
                0x30, 0x59, 0x30, 0x13, 0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01,
                0x06, 0x08, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07, 0x03, 0x42, 0x00,
            ],
            Self::Secp384r1 => &[
                0x30, 0x76, 0x30, 0x10, 0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01,
                0x06, 0x05, 0x2b, 0x81, 0x04, 0x00, 0x22, 0x03, 0x62, 0x00,
            ],
            Self::Secp521r1 => &[
                0x30, 0x81, 0x9b, 0x30, 0x10, 0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02,
                0x01, 0x06, 0x05, 0x2b, 0x81, 0x04, 0x00, 0x23, 0x03, 0x81, 0x86, 0x00,
            ],
        }
    }

    /// Length of an uncompressed point, including the `0x04` tag.
    pub fn point_len(self) -> usize {
        match self {
            Self::Secp256r1 => 65,
            Self::Secp384r1 => 97,
            Self::Secp521r1 => 133,
        }
    }
}

/// Wraps an uncompressed SEC1 point into a DER `SubjectPublicKeyInfo`.
pub fn sec1_to_spki(curve: NamedCurve, point: &[u8]) -> Result<Vec<u8>> {
    if point.len() != curve.point_len() || point.first() != Some(&0x04) {
        return Err(Error::root(VerificationError::InvalidPublicKey)).ctx(|| {
            format!(
                "expected an uncompressed {curve:?} point of {} bytes",
                curve.point_len()
            )
        });
    }

    let prefix = curve.spki_prefix();
    let mut spki = Vec::with_capacity(prefix.len() + point.len());
    spki.extend_from_slice(prefix);
    spki.extend_from_slice(point);
    Ok(spki)
}

/// Base32 decodes the signature zone.
pub fn decode_signature(signature_zone: &[u8]) -> Result<Vec<u8>> {
    std::str::from_utf8(signature_zone)
        .ok()
        .and_then(base32_decode)
        .ok_or_else(|| Error::root(VerificationError::InvalidSignatureEncoding))
}

/// Verifies a raw `r || s` ECDSA-SHA256 `signature` over `signed_data` with
/// the key of `record`.
///
/// A signature which does not match is `Ok(false)`.
pub fn verify_signature(
    signed_data: &[u8],
    signature: &[u8],
    record: &CertificateRecord,
) -> Result<bool> {
    if record.key_type != KEY_TYPE_EC {
        return Err(Error::root(VerificationError::UnsupportedKeyType(
            record.key_type.clone(),
        )));
    }

    let public_key = public_key_from_record(record)?;

    if signature.is_empty() || signature.len() % 2 != 0 {
        return Err(Error::root(VerificationError::InvalidSignatureEncoding))
            .ctx(|| format!("signature of {} bytes cannot be split", signature.len()));
    }
    let (r, s) = signature.split_at(signature.len() / 2);
    let r = BigNum::from_slice(r).foreign_err(|| VerificationError::CryptoBackend)?;
    let s = BigNum::from_slice(s).foreign_err(|| VerificationError::CryptoBackend)?;
    let ecdsa_sig =
        EcdsaSig::from_private_components(r, s).foreign_err(|| VerificationError::CryptoBackend)?;

    let digest = sha256(signed_data);

    ecdsa_sig
        .verify(&digest, public_key.as_ref())
        .foreign_err(|| VerificationError::CryptoBackend)
}

fn public_key_from_record(record: &CertificateRecord) -> Result<EcKey<Public>> {
    let curve_name = record.key_curve_name.as_deref().unwrap_or_default();
    let curve = NamedCurve::from_name(curve_name)
        .ok_or_else(|| Error::root(VerificationError::UnsupportedCurve(curve_name.to_owned())))?;

    let spki = sec1_to_spki(curve, &record.public_key_bytes)?;

    EcKey::public_key_from_der(&spki)
        .foreign_err(|| VerificationError::InvalidPublicKey)
        .ctx(|| format!("certificate {}", record.serial_number))
}

/// Verifies 2D-DOC signatures against the keys of a [`CertificateDirectory`].
pub struct SignatureVerifier<D: CertificateDirectory> {
    directory: D,
    retry: RetryPolicy,
}

impl<D: CertificateDirectory> SignatureVerifier<D> {
    /// Creates a verifier looking certificates up in `directory`, retrying
    /// transient failures according to `retry`.
    pub fn new(directory: D, retry: RetryPolicy) -> Self {
        Self { directory, retry }
    }

    /// The underlying directory.
    pub fn directory(&self) -> &D {
        &self.directory
    }

    /// Looks the signing certificate up.
    ///
    /// Fails with [`VerificationError::CertificateNotFound`] when the
    /// directory has no such certificate and with
    /// [`VerificationError::DirectoryUnavailable`] when it could not answer.
    pub async fn resolve_certificate(
        &self,
        authority_id: &str,
        certificate_id: &str,
    ) -> Result<CertificateRecord> {
        let record = self
            .retry
            .run(
                || self.directory.lookup(authority_id, certificate_id),
                DirectoryError::is_retryable,
            )
            .await
            .with_err(|| VerificationError::DirectoryUnavailable)?;

        record.ok_or_else(|| {
            Error::root(VerificationError::CertificateNotFound {
                authority_id: authority_id.to_owned(),
                certificate_id: certificate_id.to_owned(),
            })
        })
    }

    /// Verifies that `signature_zone` holds a valid signature of
    /// `signed_data` by the certificate the identifiers select.
    pub async fn verify(
        &self,
        authority_id: &str,
        certificate_id: &str,
        signed_data: &[u8],
        signature_zone: &[u8],
    ) -> Result<bool> {
        let record = self
            .resolve_certificate(authority_id, certificate_id)
            .await?;
        let signature = decode_signature(signature_zone)?;

        let verified = verify_signature(signed_data, &signature, &record)?;
        tracing::debug!(
            authority_id,
            certificate_id,
            serial_number = %record.serial_number,
            verified,
            "signature checked"
        );
        Ok(verified)
    }
}
