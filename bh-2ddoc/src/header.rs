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

//! Decoding of the fixed-position header which starts every 2D-DOC payload.
//!
//! | version | length | layout                                                               |
//! |---------|--------|----------------------------------------------------------------------|
//! | 1, 2    | 22     | `DC` version authority(4) certificate(4) issued(4) signed(4) type(2) |
//! | 3       | 24     | as above, then perimeter(2)                                          |
//! | 4 text  | 26     | as version 3, then country(2)                                        |
//! | 4 binary| 26     | `DC04` country(2, C40) authority(4, C40) certificate(4, C40)         |
//! |         |        | issued(3) signed(3) type(2) perimeter(2) reserved(2)                 |
//!
//! Text dates are four hex digits counting days since 2000-01-01, binary dates
//! are 3-byte big-endian integers packing `MMDDYYYY`.

use std::ops::Range;

use bherror::{
    traits::{ErrorContext as _, PropagateError as _},
    Error,
};
use chrono::NaiveDate;
use serde::Serialize;

use crate::{
    utils::{
        c40::decode_c40,
        date::{date_from_hex_days, date_from_packed},
    },
    DecodeError, Result,
};

/// Marker every payload starts with.
pub const DOCUMENT_MARKER: &[u8; 2] = b"DC";

/// Country of documents whose header does not carry one.
pub const DEFAULT_COUNTRY_ID: &str = "FR";

/// Perimeter of documents whose header does not carry one.
pub const DEFAULT_PERIMETER_ID: &str = "01";

const LEGACY_HEADER_LEN: usize = 22;
const V3_HEADER_LEN: usize = 24;
const V4_HEADER_LEN: usize = 26;

/// Decides whether a version 4 header is binary encoded.
///
/// Nothing in the payload states the encoding, so any implementation is a
/// heuristic; it is a trait so that callers can replace it.
pub trait HeaderModeDiscriminator {
    /// Returns `true` if the header of `payload` should be decoded as binary.
    fn is_binary(&self, payload: &[u8]) -> bool;
}

impl<F> HeaderModeDiscriminator for F
where
    F: Fn(&[u8]) -> bool,
{
    fn is_binary(&self, payload: &[u8]) -> bool {
        self(payload)
    }
}

/// The default [`HeaderModeDiscriminator`], see [`has_non_ascii_byte`].
#[derive(Debug, Default, Clone, Copy)]
pub struct NonAsciiDiscriminator;

impl HeaderModeDiscriminator for NonAsciiDiscriminator {
    fn is_binary(&self, payload: &[u8]) -> bool {
        has_non_ascii_byte(payload)
    }
}

/// Returns `true` if any byte lies outside of 7-bit ASCII.
pub fn has_non_ascii_byte(payload: &[u8]) -> bool {
    payload.iter().any(|byte| !byte.is_ascii())
}

/// Header of a version 1 or 2 document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegacyHeader {
    /// Either 1 or 2.
    pub version: u8,
    /// Identifier of the issuing authority.
    pub authority_id: String,
    /// Identifier of the signing certificate.
    pub certificate_id: String,
    /// Date the document was issued.
    pub issuance_date: NaiveDate,
    /// Date the document was signed.
    pub signature_date: NaiveDate,
    /// Code of the document type.
    pub document_type_id: String,
}

/// Header of a version 3 document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct V3Header {
    /// Identifier of the issuing authority.
    pub authority_id: String,
    /// Identifier of the signing certificate.
    pub certificate_id: String,
    /// Date the document was issued.
    pub issuance_date: NaiveDate,
    /// Date the document was signed.
    pub signature_date: NaiveDate,
    /// Code of the document type.
    pub document_type_id: String,
    /// Namespace of the document type code.
    pub perimeter_id: String,
}

/// Header of a version 4 document, text or binary encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct V4Header {
    /// Country of the issuing authority.
    pub country_id: String,
    /// Identifier of the issuing authority.
    pub authority_id: String,
    /// Identifier of the signing certificate.
    pub certificate_id: String,
    /// Date the document was issued.
    pub issuance_date: NaiveDate,
    /// Date the document was signed.
    pub signature_date: NaiveDate,
    /// Code of the document type.
    pub document_type_id: String,
    /// Namespace of the document type code.
    pub perimeter_id: String,
}

/// A decoded header, one variant per wire layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "layout", rename_all = "snake_case")]
pub enum Header {
    /// Versions 1 and 2.
    V1V2(LegacyHeader),
    /// Version 3.
    V3(V3Header),
    /// Version 4, text encoded.
    V4Text(V4Header),
    /// Version 4, binary encoded.
    V4Binary(V4Header),
}

impl Header {
    /// Wire format version, 1 to 4.
    pub fn version(&self) -> u8 {
        match self {
            Self::V1V2(header) => header.version,
            Self::V3(_) => 3,
            Self::V4Text(_) | Self::V4Binary(_) => 4,
        }
    }

    /// Number of payload bytes the header occupies.
    pub fn header_byte_length(&self) -> usize {
        match self {
            Self::V1V2(_) => LEGACY_HEADER_LEN,
            Self::V3(_) => V3_HEADER_LEN,
            Self::V4Text(_) | Self::V4Binary(_) => V4_HEADER_LEN,
        }
    }

    /// Whether the header was binary encoded.
    pub fn is_binary(&self) -> bool {
        matches!(self, Self::V4Binary(_))
    }

    /// Country of the issuing authority.
    pub fn country_id(&self) -> &str {
        match self {
            Self::V1V2(_) | Self::V3(_) => DEFAULT_COUNTRY_ID,
            Self::V4Text(header) | Self::V4Binary(header) => &header.country_id,
        }
    }

    /// Identifier of the issuing authority.
    pub fn authority_id(&self) -> &str {
        match self {
            Self::V1V2(header) => &header.authority_id,
            Self::V3(header) => &header.authority_id,
            Self::V4Text(header) | Self::V4Binary(header) => &header.authority_id,
        }
    }

    /// Identifier of the signing certificate.
    pub fn certificate_id(&self) -> &str {
        match self {
            Self::V1V2(header) => &header.certificate_id,
            Self::V3(header) => &header.certificate_id,
            Self::V4Text(header) | Self::V4Binary(header) => &header.certificate_id,
        }
    }

    /// Date the document was issued.
    pub fn issuance_date(&self) -> NaiveDate {
        match self {
            Self::V1V2(header) => header.issuance_date,
            Self::V3(header) => header.issuance_date,
            Self::V4Text(header) | Self::V4Binary(header) => header.issuance_date,
        }
    }

    /// Date the document was signed.
    pub fn signature_date(&self) -> NaiveDate {
        match self {
            Self::V1V2(header) => header.signature_date,
            Self::V3(header) => header.signature_date,
            Self::V4Text(header) | Self::V4Binary(header) => header.signature_date,
        }
    }

    /// Code of the document type.
    pub fn document_type_id(&self) -> &str {
        match self {
            Self::V1V2(header) => &header.document_type_id,
            Self::V3(header) => &header.document_type_id,
            Self::V4Text(header) | Self::V4Binary(header) => &header.document_type_id,
        }
    }

    /// Namespace of the document type code.
    pub fn perimeter_id(&self) -> &str {
        match self {
            Self::V1V2(_) => DEFAULT_PERIMETER_ID,
            Self::V3(header) => &header.perimeter_id,
            Self::V4Text(header) | Self::V4Binary(header) => &header.perimeter_id,
        }
    }
}

/// Decodes the header at the start of `payload`.
///
/// The `discriminator` is only consulted for version 4 payloads.
pub fn decode_header(
    payload: &[u8],
    discriminator: &impl HeaderModeDiscriminator,
) -> Result<Header> {
    if !payload.starts_with(DOCUMENT_MARKER) {
        return Err(Error::root(DecodeError::MalformedHeader(
            "missing `DC` marker".to_owned(),
        )));
    }

    let version = parse_version(payload)?;
    let header = match version {
        1 | 2 => {
            let reader = HeaderReader::new(payload, LEGACY_HEADER_LEN)?;
            Header::V1V2(LegacyHeader {
                version,
                authority_id: reader.text(4..8, "authority")?,
                certificate_id: reader.text(8..12, "certificate")?,
                issuance_date: reader.hex_date(12..16, "issuance date")?,
                signature_date: reader.hex_date(16..20, "signature date")?,
                document_type_id: reader.text(20..22, "document type")?,
            })
        }
        3 => {
            let reader = HeaderReader::new(payload, V3_HEADER_LEN)?;
            Header::V3(V3Header {
                authority_id: reader.text(4..8, "authority")?,
                certificate_id: reader.text(8..12, "certificate")?,
                issuance_date: reader.hex_date(12..16, "issuance date")?,
                signature_date: reader.hex_date(16..20, "signature date")?,
                document_type_id: reader.text(20..22, "document type")?,
                perimeter_id: reader.text(22..24, "perimeter")?,
            })
        }
        4 if discriminator.is_binary(payload) => match decode_v4_binary(payload) {
            Ok(header) => header,
            Err(error) => {
                tracing::warn!("binary version 4 header rejected, decoding as text: {error}");
                decode_v4_text(payload)?
            }
        },
        4 => decode_v4_text(payload)?,
        _ => {
            return Err(Error::root(DecodeError::UnsupportedVersion(
                version.to_string(),
            )))
        }
    };

    tracing::debug!(
        version = header.version(),
        authority_id = header.authority_id(),
        certificate_id = header.certificate_id(),
        "decoded 2D-DOC header"
    );

    Ok(header)
}

fn decode_v4_binary(payload: &[u8]) -> Result<Header> {
    let reader = HeaderReader::new(payload, V4_HEADER_LEN)?;
    Ok(Header::V4Binary(V4Header {
        country_id: reader.c40(4..6, "country")?.chars().take(2).collect(),
        authority_id: reader.c40(6..10, "authority")?,
        certificate_id: reader.c40(10..14, "certificate")?,
        issuance_date: reader.packed_date(14..17, "issuance date")?,
        signature_date: reader.packed_date(17..20, "signature date")?,
        document_type_id: reader.text(20..22, "document type")?,
        perimeter_id: reader.text(22..24, "perimeter")?,
    }))
}

fn decode_v4_text(payload: &[u8]) -> Result<Header> {
    let reader = HeaderReader::new(payload, V4_HEADER_LEN)?;
    Ok(Header::V4Text(V4Header {
        authority_id: reader.text(4..8, "authority")?,
        certificate_id: reader.text(8..12, "certificate")?,
        issuance_date: reader.hex_date(12..16, "issuance date")?,
        signature_date: reader.hex_date(16..20, "signature date")?,
        document_type_id: reader.text(20..22, "document type")?,
        perimeter_id: reader.text(22..24, "perimeter")?,
        country_id: reader.text(24..26, "country")?,
    }))
}

fn parse_version(payload: &[u8]) -> Result<u8> {
    let digits = payload.get(2..4).ok_or_else(|| {
        Error::root(DecodeError::MalformedHeader(
            "payload too short for a version".to_owned(),
        ))
    })?;

    if !digits.iter().all(u8::is_ascii_digit) {
        return Err(Error::root(DecodeError::UnsupportedVersion(
            String::from_utf8_lossy(digits).into_owned(),
        )));
    }

    Ok((digits[0] - b'0') * 10 + (digits[1] - b'0'))
}

/// Reads the fixed-position fields of a header of known length.
struct HeaderReader<'a> {
    header: &'a [u8],
}

impl<'a> HeaderReader<'a> {
    fn new(payload: &'a [u8], len: usize) -> Result<Self> {
        let header = payload.get(..len).ok_or_else(|| {
            Error::root(DecodeError::MalformedHeader(format!(
                "header is truncated, expected {len} bytes, got {}",
                payload.len()
            )))
        })?;

        Ok(Self { header })
    }

    fn malformed(name: &str) -> Error<DecodeError> {
        Error::root(DecodeError::MalformedHeader(format!("invalid {name}")))
    }

    fn text(&self, range: Range<usize>, name: &str) -> Result<String> {
        let bytes = &self.header[range];
        if !bytes.iter().all(u8::is_ascii_alphanumeric) {
            return Err(Self::malformed(name))
                .ctx(|| format!("found {:?}", String::from_utf8_lossy(bytes)));
        }

        // all bytes are ASCII
        Ok(bytes.iter().map(|byte| char::from(*byte)).collect())
    }

    fn hex_date(&self, range: Range<usize>, name: &str) -> Result<NaiveDate> {
        let hex = self.text(range, name)?;
        date_from_hex_days(&hex)
            .ok_or_else(|| Self::malformed(name))
            .ctx(|| format!("found {hex:?}"))
    }

    fn packed_date(&self, range: Range<usize>, name: &str) -> Result<NaiveDate> {
        let bytes = &self.header[range];
        let value = u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]);
        date_from_packed(value)
            .ok_or_else(|| Self::malformed(name))
            .ctx(|| format!("found packed value {value}"))
    }

    fn c40(&self, range: Range<usize>, name: &str) -> Result<String> {
        let decoded = decode_c40(&self.header[range])
            .with_err(|| DecodeError::MalformedHeader(format!("invalid {name}")))?;
        let trimmed = decoded.trim_end();
        if trimmed.is_empty() {
            return Err(Self::malformed(name)).ctx(|| "C40 value is blank");
        }

        Ok(trimmed.to_owned())
    }
}
