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

//! Ingestion of the signing certificates published by trust service
//! providers.
//!
//! Providers publish `.2ddoc` files, multipart bundles in which each part
//! holds one DER encoded X.509 certificate. The functions below turn those
//! into [`CertificateRecord`]s, extracting keys the way the directory stores
//! them: elliptic-curve keys as uncompressed SEC1 points, RSA keys as DER
//! `SubjectPublicKeyInfo`, EdDSA keys raw.

use std::collections::HashSet;

use bherror::{
    traits::{ErrorContext as _, ForeignError as _},
    Error,
};
use chrono::{DateTime, Utc};
use openssl::{
    asn1::{Asn1Time, Asn1TimeRef},
    bn::BigNumContext,
    ec::PointConversionForm,
    pkey::{Id, PKey, Public},
    x509::{X509Ref, X509},
};

use crate::{CertificateError, CertificateRecord, KEY_TYPE_EC};

type Result<T> = bherror::Result<T, CertificateError>;

const SECTION_END: &[u8] = b"--End";
const CONTENT_TYPE_HEADER: &[u8] = b"Content-Type: application/pkix-cert";

impl CertificateRecord {
    /// Builds the record of a DER encoded X.509 certificate issued by
    /// `provider_name`.
    pub fn from_der(provider_name: &str, der: &[u8]) -> Result<Self> {
        let certificate =
            X509::from_der(der).foreign_err(|| CertificateError::InvalidCertificate)?;
        Self::from_x509(provider_name, &certificate)
    }

    /// Builds the record of `certificate`, issued by `provider_name`.
    pub fn from_x509(provider_name: &str, certificate: &X509Ref) -> Result<Self> {
        let public_key = certificate
            .public_key()
            .foreign_err(|| CertificateError::InvalidCertificate)
            .ctx(|| "cannot read the public key")?;
        let (key_type, key_curve_name, public_key_bytes) = public_key_info(&public_key)?;

        Ok(Self {
            serial_number: serial_number(certificate)?,
            provider_name: provider_name.to_owned(),
            public_key_bytes,
            key_type,
            key_curve_name,
            not_valid_before: Some(to_date_time(certificate.not_before())?),
            not_valid_after: Some(to_date_time(certificate.not_after())?),
        })
    }
}

/// Returns the key type, curve name and stored bytes of `public_key`.
fn public_key_info(public_key: &PKey<Public>) -> Result<(String, Option<String>, Vec<u8>)> {
    match public_key.id() {
        Id::EC => {
            let ec_key = public_key
                .ec_key()
                .foreign_err(|| CertificateError::CryptoBackend)?;
            let group = ec_key.group();
            let curve_name = group
                .curve_name()
                .and_then(|nid| nid.short_name().ok())
                .ok_or_else(|| {
                    Error::root(CertificateError::UnsupportedKey(
                        "EC key on an unnamed curve".to_owned(),
                    ))
                })?;

            let mut ctx = BigNumContext::new().foreign_err(|| CertificateError::CryptoBackend)?;
            let point = ec_key
                .public_key()
                .to_bytes(group, PointConversionForm::UNCOMPRESSED, &mut ctx)
                .foreign_err(|| CertificateError::CryptoBackend)?;

            Ok((KEY_TYPE_EC.to_owned(), Some(curve_name.to_owned()), point))
        }
        Id::RSA => {
            let spki = public_key
                .public_key_to_der()
                .foreign_err(|| CertificateError::CryptoBackend)?;
            Ok(("RSA".to_owned(), None, spki))
        }
        id @ (Id::ED25519 | Id::ED448) => {
            let raw = public_key
                .raw_public_key()
                .foreign_err(|| CertificateError::CryptoBackend)?;
            let key_type = if id == Id::ED25519 { "Ed25519" } else { "Ed448" };
            Ok((key_type.to_owned(), None, raw))
        }
        id => Err(Error::root(CertificateError::UnsupportedKey(format!(
            "key type {}",
            id.as_raw()
        )))),
    }
}

/// Upper-case hex without leading zeros.
fn serial_number(certificate: &X509Ref) -> Result<String> {
    let hex = certificate
        .serial_number()
        .to_bn()
        .and_then(|serial| serial.to_hex_str())
        .foreign_err(|| CertificateError::CryptoBackend)?;

    let trimmed = hex.trim_start_matches('0');
    Ok(if trimmed.is_empty() { "0" } else { trimmed }.to_owned())
}

fn to_date_time(time: &Asn1TimeRef) -> Result<DateTime<Utc>> {
    let epoch = Asn1Time::from_unix(0).foreign_err(|| CertificateError::CryptoBackend)?;
    let diff = epoch
        .diff(time)
        .foreign_err(|| CertificateError::InvalidCertificate)?;

    DateTime::from_timestamp(i64::from(diff.days) * 86_400 + i64::from(diff.secs), 0)
        .ok_or_else(|| Error::root(CertificateError::InvalidCertificate))
        .ctx(|| format!("validity bound {time} out of range"))
}

/// Extracts the DER certificates of a `.2ddoc` bundle.
///
/// Sections end with `--End`; the certificate of a section follows its
/// `Content-Type: application/pkix-cert` header. Sections without such a
/// header are skipped.
pub fn split_certificate_bundle(content: &[u8]) -> Vec<Vec<u8>> {
    split_on(content, SECTION_END)
        .filter_map(|section| {
            let section = normalize_content_type(section);
            let start = find(&section, CONTENT_TYPE_HEADER)? + CONTENT_TYPE_HEADER.len();
            let body = trim_ascii_whitespace(&section[start..]);
            if body.is_empty() {
                return None;
            }
            // The last bytes of a certificate may be whitespace, so cut at
            // the DER length instead.
            let body = match der_length(body) {
                Some(len) if len <= body.len() => &body[..len],
                _ => body,
            };
            Some(body.to_vec())
        })
        .collect()
}

/// Builds the records of all certificates of a `.2ddoc` bundle.
///
/// Certificates which cannot be parsed are logged and skipped.
pub fn records_from_bundle(provider_name: &str, content: &[u8]) -> Vec<CertificateRecord> {
    let mut seen_keys = HashSet::new();
    let mut records = Vec::new();

    for (index, der) in split_certificate_bundle(content).into_iter().enumerate() {
        let record = match CertificateRecord::from_der(provider_name, &der) {
            Ok(record) => record,
            Err(error) => {
                tracing::warn!(provider_name, index, "skipping certificate: {error}");
                continue;
            }
        };

        if !seen_keys.insert(record.public_key_bytes.clone()) {
            tracing::warn!(
                provider_name,
                serial_number = %record.serial_number,
                "public key already used by another certificate of this provider"
            );
        }
        records.push(record);
    }

    tracing::debug!(
        provider_name,
        certificates = records.len(),
        unique_keys = seen_keys.len(),
        "certificate bundle loaded"
    );
    records
}

fn split_on<'a>(content: &'a [u8], separator: &'a [u8]) -> impl Iterator<Item = &'a [u8]> + 'a {
    let mut rest = Some(content);
    std::iter::from_fn(move || {
        let current = rest?;
        match find(current, separator) {
            Some(position) => {
                rest = Some(&current[position + separator.len()..]);
                Some(&current[..position])
            }
            None => {
                rest = None;
                Some(current)
            }
        }
    })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn normalize_content_type(section: &[u8]) -> Vec<u8> {
    const LOWER: &[u8] = b"Content-type";

    let mut normalized = section.to_vec();
    let mut offset = 0;
    while let Some(position) = find(&normalized[offset..], LOWER) {
        let start = offset + position;
        normalized[start + 8] = b'T';
        offset = start + LOWER.len();
    }
    normalized
}

fn trim_ascii_whitespace(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|byte| !byte.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|byte| !byte.is_ascii_whitespace())
        .map_or(start, |position| position + 1);
    &bytes[start..end]
}

/// Total length of the DER `SEQUENCE` at the start of `bytes`.
fn der_length(bytes: &[u8]) -> Option<usize> {
    if *bytes.first()? != 0x30 {
        return None;
    }
    let first = *bytes.get(1)? as usize;
    if first < 0x80 {
        return Some(2 + first);
    }

    let octets = first & 0x7f;
    if octets == 0 || octets > 4 {
        return None;
    }
    let len = bytes
        .get(2..2 + octets)?
        .iter()
        .fold(0usize, |len, &byte| (len << 8) | byte as usize);
    Some(2 + octets + len)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use openssl::{
        asn1::Asn1Integer,
        bn::BigNum,
        ec::{EcGroup, EcKey},
        hash::MessageDigest,
        nid::Nid,
        pkey::Private,
        rsa::Rsa,
        x509::X509NameBuilder,
    };

    use super::*;

    fn self_signed(key: &PKey<Private>, serial: u32) -> X509 {
        let mut name = X509NameBuilder::new().unwrap();
        name.append_entry_by_nid(Nid::COMMONNAME, "FR00").unwrap();
        let name = name.build();

        let serial = Asn1Integer::from_bn(&BigNum::from_u32(serial).unwrap()).unwrap();

        let mut builder = X509::builder().unwrap();
        builder.set_version(2).unwrap();
        builder.set_serial_number(&serial).unwrap();
        builder.set_subject_name(&name).unwrap();
        builder.set_issuer_name(&name).unwrap();
        builder.set_pubkey(key).unwrap();
        builder
            .set_not_before(&Asn1Time::from_unix(1_577_836_800).unwrap())
            .unwrap();
        builder
            .set_not_after(&Asn1Time::from_unix(1_893_456_000).unwrap())
            .unwrap();
        builder.sign(key, MessageDigest::sha256()).unwrap();
        builder.build()
    }

    fn ec_key() -> PKey<Private> {
        let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
        PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
    }

    fn bundle(certificates: &[&[u8]]) -> Vec<u8> {
        let mut content = b"MIME-Version: 1.0\r\n".to_vec();
        for (index, der) in certificates.iter().enumerate() {
            content.extend_from_slice(b"--Boundary\r\n");
            // Providers are inconsistent about the header case.
            if index % 2 == 0 {
                content.extend_from_slice(b"Content-Type: application/pkix-cert\r\n\r\n");
            } else {
                content.extend_from_slice(b"Content-type: application/pkix-cert\r\n\r\n");
            }
            content.extend_from_slice(der);
            content.extend_from_slice(b"\r\n--End\r\n");
        }
        content
    }

    #[test]
    fn test_ec_certificate_record() {
        let key = ec_key();
        let der = self_signed(&key, 0x0a1b).to_der().unwrap();

        let record = CertificateRecord::from_der("ANTS", &der).unwrap();

        assert_eq!(record.serial_number, "A1B");
        assert_eq!(record.provider_name, "ANTS");
        assert_eq!(record.key_type, KEY_TYPE_EC);
        assert_eq!(record.key_curve_name.as_deref(), Some("prime256v1"));
        assert_eq!(record.public_key_bytes.len(), 65);
        assert_eq!(record.public_key_bytes[0], 0x04);
        assert_eq!(
            record.not_valid_before,
            DateTime::from_timestamp(1_577_836_800, 0)
        );
        assert_eq!(
            record.not_valid_after,
            DateTime::from_timestamp(1_893_456_000, 0)
        );
    }

    #[test]
    fn test_rsa_certificate_record() {
        let key = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();
        let der = self_signed(&key, 1).to_der().unwrap();

        let record = CertificateRecord::from_der("ANTS", &der).unwrap();

        assert_eq!(record.key_type, "RSA");
        assert_eq!(record.key_curve_name, None);
        assert_eq!(record.public_key_bytes, key.public_key_to_der().unwrap());
    }

    #[test]
    fn test_invalid_certificate() {
        let err = CertificateRecord::from_der("ANTS", b"not a certificate").unwrap_err();

        assert_matches!(err.error, CertificateError::InvalidCertificate);
    }

    #[test]
    fn test_split_bundle() {
        let first = self_signed(&ec_key(), 1).to_der().unwrap();
        let second = self_signed(&ec_key(), 2).to_der().unwrap();

        let certificates = split_certificate_bundle(&bundle(&[&first, &second]));

        assert_eq!(certificates, vec![first, second]);
    }

    #[test]
    fn test_split_bundle_skips_sections_without_certificate() {
        let content = b"--Boundary\r\nContent-Type: text/plain\r\n\r\nhello\r\n--End\r\n\
            --Boundary\r\nContent-Type: application/pkix-cert\r\n\r\n\r\n--End";

        assert!(split_certificate_bundle(content).is_empty());
    }

    #[test]
    fn test_records_from_bundle() {
        let key = ec_key();
        let first = self_signed(&key, 1).to_der().unwrap();
        let renewed = self_signed(&key, 2).to_der().unwrap();

        let records = records_from_bundle("ANTS", &bundle(&[&first, b"garbage", &renewed]));

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].serial_number, "1");
        assert_eq!(records[1].serial_number, "2");
        assert_eq!(records[0].public_key_bytes, records[1].public_key_bytes);
    }

    #[test]
    fn test_der_length() {
        assert_eq!(der_length(&[0x30, 0x03, 1, 2, 3]), Some(5));
        assert_eq!(der_length(&[0x30, 0x81, 0x9b]), Some(158));
        assert_eq!(der_length(&[0x30, 0x82, 0x01, 0x00]), Some(260));
        assert_eq!(der_length(&[0x04, 0x01]), None);
        assert_eq!(der_length(&[0x30, 0x80]), None);
    }
}
