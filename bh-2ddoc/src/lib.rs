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

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! A `crate` for decoding and verifying French 2D-DOC barcodes.
//!
//! 2D-DOC is the standard used to seal the data printed on official
//! documents, such as tax notices and proofs of address, into a signed
//! barcode. This crate takes the payload a barcode reader extracted and
//! turns it into a [`ParsedDocument`]:
//!
//! 1. the header is decoded, for every wire format version from 1 to 4,
//!    including binary encoded version 4 headers ([`decode_header`]);
//! 2. the rest of the payload is split into message, signature and annex
//!    zones ([`split_zones`]);
//! 3. the message is tokenized against the [`FieldCatalog`] of the document
//!    type ([`tokenize`]), and every value is cleaned and formatted for
//!    display ([`FormattedField`]);
//! 4. optionally, the ECDSA signature is verified with the key of the
//!    signing certificate, looked up in a [`CertificateDirectory`]
//!    ([`SignatureVerifier`]).
//!
//! Decoding failures are errors, verification failures are not: a document
//! whose signature cannot be checked is still returned, with the reason in
//! its [`VerificationOutcome`].
//!
//! # Certificates
//!
//! The keys of the signing certificates come from a [`CertificateDirectory`].
//! [`HttpCertificateDirectory`] queries a directory service, while
//! [`InMemoryDirectory`] serves records loaded by the caller, e.g. from the
//! `.2ddoc` bundles published by trust service providers with
//! [`records_from_bundle`].
//!
//! # Example
//!
//! ```
//! use bh_2ddoc::{decode_str, DocumentCategory, VerificationOutcome};
//!
//! let document = decode_str("DC02FR00CA01016E016F0410JEAN\x1cMZXW6").unwrap();
//!
//! assert_eq!(document.header().authority_id(), "FR00");
//! assert_eq!(document.document_type().category, DocumentCategory::Tax);
//! assert_eq!(document.field("10").unwrap().formatted_value, "JEAN");
//! assert_eq!(document.verification(), &VerificationOutcome::NotAttempted);
//! ```
//!
//! Verifying the signature requires a directory:
//!
//! ```no_run
//! use bh_2ddoc::{Decoder, DirectoryConfig, HttpCertificateDirectory, SignatureVerifier};
//!
//! # async fn verify(payload: &[u8]) -> bherror::Result<(), bh_2ddoc::DirectoryError> {
//! let config: DirectoryConfig =
//!     serde_json::from_str(r#"{"base_url": "https://directory.example.com"}"#).unwrap();
//! let directory = HttpCertificateDirectory::from_config(&config)?;
//! let verifier = SignatureVerifier::new(directory, config.retry);
//!
//! let document = Decoder::new()
//!     .decode_and_verify(payload, &verifier)
//!     .await
//!     .unwrap();
//! println!("verified: {}", document.is_verified());
//! # Ok(())
//! # }
//! ```

mod catalog;
mod certificate;
mod directory;
mod doc_type;
mod document;
mod error;
mod format;
mod header;
mod retry;
mod tokenizer;
pub(crate) mod utils;
mod verifier;
mod zones;

pub use catalog::{
    CharClass, FieldCatalog, FieldLength, FieldSpec, SemanticType, FISCAL_NUMBER_1,
    FISCAL_NUMBER_2, SIGNATURE_MARKER, TAX_NOTICE_REFERENCE,
};
pub use certificate::{records_from_bundle, split_certificate_bundle};
pub use directory::{
    CertificateDirectory, CertificateRecord, DirectoryConfig, HttpCertificateDirectory,
    HttpGetClient, InMemoryDirectory, ReqwestGetClient, KEY_TYPE_EC,
};
pub use doc_type::{resolve_document_type, DocumentCategory, DocumentType};
pub use document::{
    decode, decode_str, DecodeWarning, Decoder, FailureReason, ParsedDocument,
    VerificationOutcome,
};
pub use error::{CertificateError, DecodeError, DirectoryError, Result, VerificationError};
pub use format::{clean_value, format_value, FormattedField};
pub use header::{
    decode_header, has_non_ascii_byte, Header, HeaderModeDiscriminator, LegacyHeader,
    NonAsciiDiscriminator, V3Header, V4Header, DEFAULT_COUNTRY_ID, DEFAULT_PERIMETER_ID,
    DOCUMENT_MARKER,
};
pub use retry::RetryPolicy;
pub use tokenizer::{tokenize, RawField, Tokens};
pub use verifier::{
    decode_signature, sec1_to_spki, verify_signature, NamedCurve, SignatureVerifier,
};
pub use zones::{
    message_separator, split_zones, SplitMethod, Zones, FALLBACK_SIGNATURE_LEN, FIELD_SEPARATOR,
    GROUP_SEPARATOR, RECORD_SEPARATOR, UNIT_SEPARATOR,
};
