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

use serde::Serialize;

/// Fatal errors raised while decoding a 2D-DOC payload.
#[derive(strum_macros::Display, Debug, PartialEq, Clone)]
pub enum DecodeError {
    /// The payload does not start with a well-formed header.
    #[strum(to_string = "Malformed header: {0}")]
    MalformedHeader(String),

    /// The header carries a version outside of the supported range.
    #[strum(to_string = "Unsupported 2D-DOC version {0}")]
    UnsupportedVersion(String),

    /// No boundary between the message and the signature could be found.
    #[strum(to_string = "Unable to split {0} bytes into message and signature zones")]
    ZoneSplit(usize),

    /// A textual payload holds a character which does not stand for a byte.
    #[strum(to_string = "Character `{0}` is outside of Latin-1")]
    NonLatin1Character(char),
}

impl bherror::BhError for DecodeError {}

/// Errors raised while verifying the signature of a decoded document.
///
/// None of these prevent the decoded fields from reaching the caller; they
/// are folded into [`VerificationOutcome::Failed`](crate::VerificationOutcome::Failed).
#[derive(strum_macros::Display, Debug, PartialEq, Eq, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum VerificationError {
    /// The directory has no certificate for the given identifiers.
    #[strum(to_string = "Certificate {certificate_id} of authority {authority_id} not found")]
    CertificateNotFound {
        /// Authority identifier from the header.
        authority_id: String,
        /// Certificate identifier from the header.
        certificate_id: String,
    },

    /// The directory could not be reached, even after retrying.
    #[strum(to_string = "Certificate directory unavailable")]
    DirectoryUnavailable,

    /// The certificate holds a key that is not an elliptic-curve key.
    #[strum(to_string = "Unsupported key type {0}")]
    UnsupportedKeyType(String),

    /// The certificate names a curve we have no key prefix for.
    #[strum(to_string = "Unsupported curve {0}")]
    UnsupportedCurve(String),

    /// The signature zone is not valid base32.
    #[strum(to_string = "Invalid signature encoding")]
    InvalidSignatureEncoding,

    /// The stored public key is not a valid uncompressed curve point.
    #[strum(to_string = "Invalid public key")]
    InvalidPublicKey,

    /// The cryptographic backend unexpectedly failed.
    #[strum(to_string = "Crypto backend failed")]
    CryptoBackend,
}

impl bherror::BhError for VerificationError {}

/// Errors returned by [`CertificateDirectory`](crate::CertificateDirectory)
/// implementations.
#[derive(strum_macros::Display, Debug, PartialEq, Clone)]
pub enum DirectoryError {
    /// Transient failure, worth retrying.
    #[strum(to_string = "Directory unavailable: {0}")]
    Unavailable(String),

    /// The directory answered with something we could not understand.
    #[strum(to_string = "Invalid directory response: {0}")]
    InvalidResponse(String),

    /// The request URL could not be built.
    #[strum(to_string = "Invalid directory URL: {0}")]
    InvalidUrl(String),

    /// The directory client could not be set up.
    #[strum(to_string = "Invalid directory configuration: {0}")]
    Configuration(String),
}

impl DirectoryError {
    /// Whether the failure is transient and the request may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl bherror::BhError for DirectoryError {}

/// Errors raised while turning X.509 certificates into
/// [`CertificateRecord`](crate::CertificateRecord)s.
#[derive(strum_macros::Display, Debug, PartialEq, Clone)]
pub enum CertificateError {
    /// The bytes are not a DER encoded X.509 certificate.
    #[strum(to_string = "Invalid certificate")]
    InvalidCertificate,

    /// The certificate holds a key type we cannot store.
    #[strum(to_string = "Unsupported key: {0}")]
    UnsupportedKey(String),

    /// The cryptographic backend unexpectedly failed.
    #[strum(to_string = "Crypto backend failed")]
    CryptoBackend,
}

impl bherror::BhError for CertificateError {}

/// Result type used for decoding.
pub type Result<T> = bherror::Result<T, DecodeError>;
