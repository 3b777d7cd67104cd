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

//! Assembly of decoded documents, and the entry points of the crate.

use std::collections::BTreeMap;

use bherror::Error;
use serde::{Serialize, Serializer};

use crate::{
    decode_header, resolve_document_type, split_zones, tokenize, CertificateDirectory, DecodeError,
    DocumentType, FieldCatalog, FormattedField, Header, HeaderModeDiscriminator,
    NonAsciiDiscriminator, Result, SignatureVerifier, SplitMethod, Tokens, VerificationError,
};

/// Non-fatal anomaly met while decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecodeWarning {
    /// The field occurred more than once; the first value was kept.
    DuplicateField {
        /// Identifier of the repeated field.
        field_id: String,
    },
    /// The zones were split without a separator.
    TrailingSignatureFallback,
}

/// Why a verification failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The signature does not match the signed data.
    SignatureMismatch,
    /// The signature could not be checked.
    Error(VerificationError),
}

/// Result of verifying the signature of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VerificationOutcome {
    /// The signature is valid.
    Verified,
    /// The signature is invalid or could not be checked.
    Failed {
        /// The cause of the failure.
        reason: FailureReason,
    },
    /// No verification was requested.
    NotAttempted,
}

impl From<bherror::Result<bool, VerificationError>> for VerificationOutcome {
    fn from(result: bherror::Result<bool, VerificationError>) -> Self {
        match result {
            Ok(true) => Self::Verified,
            Ok(false) => Self::Failed {
                reason: FailureReason::SignatureMismatch,
            },
            Err(error) => Self::Failed {
                reason: FailureReason::Error(error.error),
            },
        }
    }
}

/// A decoded 2D-DOC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedDocument {
    header: Header,
    document_type: DocumentType,
    fields: BTreeMap<String, FormattedField>,
    #[serde(serialize_with = "serialize_lossy")]
    signature: Vec<u8>,
    annex: Option<BTreeMap<String, FormattedField>>,
    warnings: Vec<DecodeWarning>,
    split_method: SplitMethod,
    verification: VerificationOutcome,
}

fn serialize_lossy<S: Serializer>(
    bytes: &[u8],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(bytes))
}

impl ParsedDocument {
    /// The decoded header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// The resolved document type.
    pub fn document_type(&self) -> &DocumentType {
        &self.document_type
    }

    /// The fields of the message zone, keyed by identifier.
    pub fn fields(&self) -> &BTreeMap<String, FormattedField> {
        &self.fields
    }

    /// The field with the given identifier, if present.
    pub fn field(&self, field_id: &str) -> Option<&FormattedField> {
        self.fields.get(field_id)
    }

    /// The signature zone, still base32 encoded.
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// The unsigned fields of the annex, version 4 only.
    pub fn annex(&self) -> Option<&BTreeMap<String, FormattedField>> {
        self.annex.as_ref()
    }

    /// Anomalies met while decoding.
    pub fn warnings(&self) -> &[DecodeWarning] {
        &self.warnings
    }

    /// How the message and signature zones were told apart.
    pub fn split_method(&self) -> SplitMethod {
        self.split_method
    }

    /// Result of the signature verification.
    pub fn verification(&self) -> &VerificationOutcome {
        &self.verification
    }

    /// Whether the signature was verified successfully.
    pub fn is_verified(&self) -> bool {
        self.verification == VerificationOutcome::Verified
    }
}

/// Decodes 2D-DOC payloads, optionally verifying their signature.
///
/// The type parameter selects how version 4 headers are told to be binary.
#[derive(Debug, Default, Clone)]
pub struct Decoder<M: HeaderModeDiscriminator = NonAsciiDiscriminator> {
    discriminator: M,
}

impl Decoder {
    /// Decoder using the [`NonAsciiDiscriminator`].
    pub fn new() -> Self {
        Self::default()
    }
}

impl<M: HeaderModeDiscriminator> Decoder<M> {
    /// Decoder using the given discriminator.
    pub fn with_discriminator(discriminator: M) -> Self {
        Self { discriminator }
    }

    /// Decodes `payload` without verifying its signature.
    pub fn decode(&self, payload: &[u8]) -> Result<ParsedDocument> {
        self.decode_unverified(payload).map(|(document, _)| document)
    }

    /// Decodes `payload` and verifies its signature.
    ///
    /// Only decoding failures are errors; verification failures are reported
    /// in [`ParsedDocument::verification`].
    pub async fn decode_and_verify<D: CertificateDirectory>(
        &self,
        payload: &[u8],
        verifier: &SignatureVerifier<D>,
    ) -> Result<ParsedDocument> {
        let (mut document, signed_len) = self.decode_unverified(payload)?;

        let result = verifier
            .verify(
                document.header.authority_id(),
                document.header.certificate_id(),
                &payload[..signed_len],
                &document.signature,
            )
            .await;
        if let Err(error) = &result {
            tracing::debug!("signature verification failed: {error}");
        }

        document.verification = result.into();
        tracing::debug!(verification = ?document.verification, "document verified");
        Ok(document)
    }

    /// Returns the document along with the length of the signed prefix of
    /// `payload`.
    fn decode_unverified(&self, payload: &[u8]) -> Result<(ParsedDocument, usize)> {
        let header = decode_header(payload, &self.discriminator)?;

        let header_len = header.header_byte_length();
        let zones = split_zones(header.version(), &payload[header_len..])?;

        let document_type = resolve_document_type(header.perimeter_id(), header.document_type_id());
        let catalog = FieldCatalog::for_category(document_type.category);

        let mut warnings = Vec::new();
        if zones.method == SplitMethod::TrailingSignatureFallback {
            warnings.push(DecodeWarning::TrailingSignatureFallback);
        }

        let fields = format_fields(tokenize(zones.message, &catalog), &catalog, &mut warnings);
        let annex = zones.annex.map(|annex| {
            let catalog = FieldCatalog::complete();
            format_fields(tokenize(annex, &catalog), &catalog, &mut warnings)
        });

        let document = ParsedDocument {
            header,
            document_type,
            fields,
            signature: zones.signature.to_vec(),
            annex,
            warnings,
            split_method: zones.method,
            verification: VerificationOutcome::NotAttempted,
        };
        Ok((document, header_len + zones.message.len()))
    }
}

fn format_fields(
    tokens: Tokens,
    catalog: &FieldCatalog,
    warnings: &mut Vec<DecodeWarning>,
) -> BTreeMap<String, FormattedField> {
    warnings.extend(
        tokens
            .duplicates
            .into_iter()
            .map(|field_id| DecodeWarning::DuplicateField { field_id }),
    );

    tokens
        .fields
        .iter()
        .filter_map(|raw| {
            let spec = catalog.get(&raw.field_id)?;
            FormattedField::new(spec, raw)
        })
        .map(|field| (field.field_id.clone(), field))
        .collect()
}

/// Decodes `payload` with the default [`Decoder`], without verifying its
/// signature.
pub fn decode(payload: &[u8]) -> Result<ParsedDocument> {
    Decoder::new().decode(payload)
}

/// Decodes a payload handed over as text, e.g. by a barcode reader.
///
/// Each character stands for the payload byte of the same value, so binary
/// headers survive the trip through text. Characters above U+00FF are
/// rejected.
pub fn decode_str(payload: &str) -> Result<ParsedDocument> {
    let bytes = payload
        .chars()
        .map(|character| {
            u8::try_from(character)
                .map_err(|_| Error::root(DecodeError::NonLatin1Character(character)))
        })
        .collect::<Result<Vec<u8>>>()?;

    decode(&bytes)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;
    use crate::{
        header::tests::binary_v4_header, verifier::tests::TestKey, DecodeError, DocumentCategory,
        InMemoryDirectory, RetryPolicy, FALLBACK_SIGNATURE_LEN,
    };

    const HEADER: &[u8] = b"DC04FR000001271027110101FR";

    fn message() -> Vec<u8> {
        b"10JEAN DUPONT\x1d247500125PARIS\x1d26fr1D1234,56".to_vec()
    }

    fn signed_payload(key: &TestKey, message: &[u8]) -> Vec<u8> {
        let mut payload = HEADER.to_vec();
        payload.extend_from_slice(message);
        let zone = key.signature_zone(&payload);
        payload.push(0x1f);
        payload.extend(zone);
        payload
    }

    fn verifier(key: &TestKey) -> SignatureVerifier<InMemoryDirectory> {
        let mut directory = InMemoryDirectory::new();
        directory.insert("FR00", "0001", key.record());
        SignatureVerifier::new(directory, RetryPolicy::none())
    }

    #[test]
    fn test_decode_text_version_4() {
        let mut payload = [HEADER, &message()].concat();
        payload.extend(b"\x1fMZXW6");

        let document = decode(&payload).unwrap();

        assert_eq!(document.header().version(), 4);
        assert_eq!(document.header().authority_id(), "FR00");
        assert_eq!(document.document_type().category, DocumentCategory::ProofOfAddress);
        assert_eq!(document.field("10").unwrap().formatted_value, "JEAN DUPONT");
        assert_eq!(document.field("24").unwrap().formatted_value, "75001");
        assert_eq!(document.field("25").unwrap().formatted_value, "PARIS");
        assert_eq!(document.field("26").unwrap().formatted_value, "FR");
        assert_eq!(document.field("1D").unwrap().formatted_value, "1234,56 €");
        assert_eq!(document.fields().len(), 5);
        assert_eq!(document.signature(), b"MZXW6");
        assert_eq!(document.annex(), None);
        assert!(document.warnings().is_empty());
        assert_eq!(document.split_method(), SplitMethod::Separator);
        assert_eq!(document.verification(), &VerificationOutcome::NotAttempted);
    }

    #[test]
    fn test_decode_str() {
        let document = decode_str("DC02FR00CA01016E016F0410JEAN\x1cMZXW6").unwrap();

        assert_eq!(document.header().version(), 2);
        assert_eq!(document.document_type().category, DocumentCategory::Tax);
        assert_eq!(document.field("10").unwrap().value, "JEAN");
    }

    #[test]
    fn test_decode_str_binary_header() {
        let mut payload = binary_v4_header();
        payload.extend(b"10JEAN\x1fMZXW6");
        let text: String = payload.iter().copied().map(char::from).collect();
        assert!(text.len() > payload.len());

        let document = decode_str(&text).unwrap();

        assert!(document.header().is_binary());
        assert_eq!(document.header().authority_id(), "FR00");
        assert_eq!(document.header().certificate_id(), "AB12");
        assert_eq!(document.field("10").unwrap().value, "JEAN");
        assert_eq!(document.signature(), b"MZXW6");
    }

    #[test]
    fn test_decode_str_rejects_wide_characters() {
        let err = decode_str("DC02FR00CA01016E016F0410JEAN\u{20ac}\x1cMZXW6").unwrap_err();

        assert_eq!(err.error, DecodeError::NonLatin1Character('\u{20ac}'));
    }

    #[test]
    fn test_non_ascii_message_byte_keeps_text_header() {
        let text = "DC04FR000001271027110101FR10JOS\u{c9}\x1fMZXW6";

        let document = decode_str(text).unwrap();

        assert!(!document.header().is_binary());
        assert_eq!(document.header().authority_id(), "FR00");
        assert!(document.field("10").is_some());
    }

    #[test]
    fn test_duplicate_fields_are_reported() {
        let mut payload = HEADER.to_vec();
        payload.extend(b"10JEAN\x1d10PAUL\x1d\x1fMZXW6");

        let document = decode(&payload).unwrap();

        assert_eq!(document.field("10").unwrap().value, "JEAN");
        assert_eq!(
            document.warnings(),
            [DecodeWarning::DuplicateField {
                field_id: "10".to_owned()
            }]
        );
    }

    #[test]
    fn test_fallback_split_is_reported() {
        let mut payload = HEADER.to_vec();
        payload.extend(b"10JEAN");
        payload.extend([b'A'; FALLBACK_SIGNATURE_LEN]);

        let document = decode(&payload).unwrap();

        assert_eq!(document.split_method(), SplitMethod::TrailingSignatureFallback);
        assert_eq!(document.warnings(), [DecodeWarning::TrailingSignatureFallback]);
        assert_eq!(document.field("10").unwrap().value, "JEAN");
        assert_eq!(document.signature().len(), FALLBACK_SIGNATURE_LEN);
    }

    #[test]
    fn test_annex_fields() {
        let mut payload = HEADER.to_vec();
        payload.extend(b"10JEAN\x1fMZXW6\x1d4C03");

        let document = decode(&payload).unwrap();

        assert_eq!(document.signature(), b"MZXW6");
        let annex = document.annex().unwrap();
        assert_eq!(annex["4C"].formatted_value, "3");
    }

    #[test]
    fn test_binary_header() {
        let mut payload = binary_v4_header();
        payload.extend(b"10JEAN\x1fMZXW6");

        let document = decode(&payload).unwrap();

        assert!(document.header().is_binary());
        assert_eq!(document.document_type().category, DocumentCategory::Tax);
        assert_eq!(document.field("10").unwrap().value, "JEAN");
    }

    #[test]
    fn test_custom_discriminator() {
        let mut payload = HEADER.to_vec();
        payload.extend(b"10JEAN\x1fMZXW6");

        let text = Decoder::with_discriminator(|_: &[u8]| false)
            .decode(&payload)
            .unwrap();

        assert!(!text.header().is_binary());
    }

    #[test]
    fn test_decode_errors() {
        assert_matches!(
            decode(b"XX04").unwrap_err().error,
            DecodeError::MalformedHeader(_)
        );
        assert_matches!(
            decode(b"DC09FR0000012710271101").unwrap_err().error,
            DecodeError::UnsupportedVersion(_)
        );
        assert_matches!(
            decode(&[HEADER, b"10JEAN"].concat()).unwrap_err().error,
            DecodeError::ZoneSplit(6)
        );
    }

    #[tokio::test]
    async fn test_decode_and_verify() {
        let key = TestKey::generate();
        let payload = signed_payload(&key, &message());

        let document = Decoder::new()
            .decode_and_verify(&payload, &verifier(&key))
            .await
            .unwrap();

        assert!(document.is_verified());
        assert_eq!(document.fields().len(), 5);
    }

    #[tokio::test]
    async fn test_tampered_payload_fails_verification() {
        let key = TestKey::generate();
        let mut payload = signed_payload(&key, &message());
        // JEAN -> JEAM
        payload[HEADER.len() + 5] = b'M';

        let document = Decoder::new()
            .decode_and_verify(&payload, &verifier(&key))
            .await
            .unwrap();

        assert_eq!(
            document.verification(),
            &VerificationOutcome::Failed {
                reason: FailureReason::SignatureMismatch
            }
        );
        assert_eq!(document.field("10").unwrap().value, "JEAM DUPONT");
    }

    #[tokio::test]
    async fn test_non_ascii_tampering_fails_verification() {
        let key = TestKey::generate();
        let mut payload = signed_payload(&key, &message());
        payload[HEADER.len() + 5] = 0xc9;

        let document = Decoder::new()
            .decode_and_verify(&payload, &verifier(&key))
            .await
            .unwrap();

        assert!(!document.header().is_binary());
        assert_eq!(
            document.verification(),
            &VerificationOutcome::Failed {
                reason: FailureReason::SignatureMismatch
            }
        );
    }

    #[tokio::test]
    async fn test_verification_errors_keep_fields() {
        let key = TestKey::generate();
        let payload = signed_payload(&key, &message());
        let verifier = SignatureVerifier::new(InMemoryDirectory::new(), RetryPolicy::none());

        let document = Decoder::new()
            .decode_and_verify(&payload, &verifier)
            .await
            .unwrap();

        assert_matches!(
            document.verification(),
            VerificationOutcome::Failed {
                reason: FailureReason::Error(VerificationError::CertificateNotFound { .. })
            }
        );
        assert_eq!(document.fields().len(), 5);
    }

    #[tokio::test]
    async fn test_serialization() {
        let key = TestKey::generate();
        let payload = signed_payload(&key, &message());
        let verifier = SignatureVerifier::new(InMemoryDirectory::new(), RetryPolicy::none());

        let document = Decoder::new()
            .decode_and_verify(&payload, &verifier)
            .await
            .unwrap();
        let value = serde_json::to_value(&document).unwrap();

        assert_eq!(value["header"]["layout"], json!("v4_text"));
        assert_eq!(value["document_type"]["category"], json!("proof_of_address"));
        assert_eq!(value["fields"]["1D"]["formatted_value"], json!("1234,56 €"));
        assert_eq!(value["split_method"], json!("separator"));
        assert_eq!(
            value["verification"],
            json!({
                "status": "failed",
                "reason": {
                    "error": {
                        "kind": "certificate_not_found",
                        "detail": {"authority_id": "FR00", "certificate_id": "0001"},
                    },
                },
            })
        );
    }
}
