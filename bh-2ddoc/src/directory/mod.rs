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

//! Interface to the external certificate directory, which resolves the
//! authority and certificate identifiers of a header to a public key.
//!
//! * [`HttpCertificateDirectory`] queries the directory service over HTTP.
//! * [`InMemoryDirectory`] serves records loaded by the caller, e.g. with
//!   [`records_from_bundle`](crate::records_from_bundle).

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::DirectoryError;

mod http;
mod memory;

pub use http::{DirectoryConfig, HttpCertificateDirectory, HttpGetClient, ReqwestGetClient};
pub use memory::InMemoryDirectory;

/// Key type of elliptic-curve keys, the only ones 2D-DOC signatures use.
pub const KEY_TYPE_EC: &str = "EC";

/// A signing certificate as stored by the directory.
///
/// Elliptic-curve keys are stored as uncompressed SEC1 points, other keys in
/// whatever encoding the directory chose for them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRecord {
    /// Serial number of the certificate, upper-case hex.
    pub serial_number: String,
    /// Name of the trust service provider which issued it.
    pub provider_name: String,
    /// The public key bytes.
    #[serde(rename = "public_key", with = "base64_bytes")]
    pub public_key_bytes: Vec<u8>,
    /// `EC`, `RSA`, `Ed25519` or `Ed448`.
    pub key_type: String,
    /// Curve of elliptic-curve keys.
    #[serde(default)]
    pub key_curve_name: Option<String>,
    /// Start of the validity window.
    #[serde(default)]
    pub not_valid_before: Option<DateTime<Utc>>,
    /// End of the validity window.
    #[serde(default)]
    pub not_valid_after: Option<DateTime<Utc>>,
}

impl CertificateRecord {
    /// Whether `instant` falls within the validity window. Missing bounds are
    /// treated as open.
    pub fn is_valid_at(&self, instant: DateTime<Utc>) -> bool {
        self.not_valid_before.map_or(true, |start| start <= instant)
            && self.not_valid_after.map_or(true, |end| instant <= end)
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(
        bytes: &[u8],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

/// Trait that defines the interface of a certificate directory.
pub trait CertificateDirectory: Sync {
    /// Looks up the certificate of the given authority and certificate
    /// identifiers.
    ///
    /// Returns `Ok(None)` when the directory definitively has no such
    /// certificate. Errors for which [`DirectoryError::is_retryable`] holds
    /// are transient.
    fn lookup(
        &self,
        authority_id: &str,
        certificate_id: &str,
    ) -> impl Future<Output = bherror::Result<Option<CertificateRecord>, DirectoryError>> + Send;
}
