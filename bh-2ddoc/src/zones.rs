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

//! Splitting of the bytes following the header into the message, signature
//! and annex zones.

use bherror::{traits::ErrorContext as _, Error};
use serde::Serialize;

use crate::{DecodeError, Result};

/// Separates the message from the signature in version 4 payloads.
pub const UNIT_SEPARATOR: u8 = 0x1F;
/// Separates the message from the signature in payloads before version 4.
pub const FIELD_SEPARATOR: u8 = 0x1C;
/// Terminates variable length fields; separates the annex from the
/// signature.
pub const GROUP_SEPARATOR: u8 = 0x1D;
/// Terminates variable length fields.
pub const RECORD_SEPARATOR: u8 = 0x1E;

/// Length of the signature assumed when no separator is present.
pub const FALLBACK_SIGNATURE_LEN: usize = 128;

/// How the message and signature zones were told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitMethod {
    /// On the version's separator byte.
    Separator,
    /// No separator, so the last [`FALLBACK_SIGNATURE_LEN`] bytes were taken
    /// as the signature. Results relying on it are less trustworthy.
    TrailingSignatureFallback,
}

/// The zones of a payload, borrowed from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Zones<'a> {
    /// Encoded fields; signed together with the header.
    pub message: &'a [u8],
    /// Base32 encoded signature.
    pub signature: &'a [u8],
    /// Unsigned fields following the signature, version 4 only.
    pub annex: Option<&'a [u8]>,
    /// How `message` and `signature` were told apart.
    pub method: SplitMethod,
}

/// Returns the byte separating the message from the signature.
pub fn message_separator(version: u8) -> u8 {
    if version >= 4 {
        UNIT_SEPARATOR
    } else {
        FIELD_SEPARATOR
    }
}

/// Splits everything after the header of a `version` payload into zones.
pub fn split_zones(version: u8, remainder: &[u8]) -> Result<Zones<'_>> {
    let separator = message_separator(version);

    let (message, signature, method) =
        match remainder.iter().position(|byte| *byte == separator) {
            Some(index) => (
                &remainder[..index],
                &remainder[index + 1..],
                SplitMethod::Separator,
            ),
            None if remainder.len() >= FALLBACK_SIGNATURE_LEN => {
                let (message, signature) =
                    remainder.split_at(remainder.len() - FALLBACK_SIGNATURE_LEN);
                tracing::warn!(
                    message_len = message.len(),
                    "no zone separator found, assuming a trailing signature"
                );
                (message, signature, SplitMethod::TrailingSignatureFallback)
            }
            None => {
                return Err(Error::root(DecodeError::ZoneSplit(remainder.len())))
                    .ctx(|| format!("no separator 0x{separator:02X} found"));
            }
        };

    let (signature, annex) = match signature.iter().position(|byte| *byte == GROUP_SEPARATOR) {
        Some(index) if version >= 4 => {
            let annex = &signature[index + 1..];
            (&signature[..index], (!annex.is_empty()).then_some(annex))
        }
        _ => (signature, None),
    };

    Ok(Zones {
        message,
        signature,
        annex,
        method,
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn test_split_version_4_on_unit_separator() {
        let zones = split_zones(4, b"10JEAN\x1fSIGNATURE").unwrap();
        assert_eq!(zones.message, b"10JEAN");
        assert_eq!(zones.signature, b"SIGNATURE");
        assert_eq!(zones.annex, None);
        assert_eq!(zones.method, SplitMethod::Separator);
    }

    #[test]
    fn test_split_version_4_annex() {
        let zones = split_zones(4, b"10JEAN\x1fSIGNATURE\x1d24750000").unwrap();

        assert_eq!(zones.message, b"10JEAN");
        assert_eq!(zones.signature, b"SIGNATURE");
        assert_eq!(zones.annex, Some(&b"24750000"[..]));
    }

    #[test]
    fn test_split_version_4_empty_annex() {
        let zones = split_zones(4, b"10JEAN\x1fSIGNATURE\x1d").unwrap();

        assert_eq!(zones.signature, b"SIGNATURE");
        assert_eq!(zones.annex, None);
    }

    #[test]
    fn test_split_legacy_on_field_separator() {
        let zones = split_zones(2, b"10JEAN\x1cSIGNATURE\x1dMORE").unwrap();

        assert_eq!(zones.message, b"10JEAN");
        // No annex before version 4
        assert_eq!(zones.signature, b"SIGNATURE\x1dMORE");
        assert_eq!(zones.annex, None);
    }

    #[test]
    fn test_split_uses_first_separator() {
        let zones = split_zones(3, b"10A\x1c\x1cB").unwrap();

        assert_eq!(zones.message, b"10A");
        assert_eq!(zones.signature, b"\x1cB");
    }

    #[test]
    fn test_fallback_takes_trailing_signature() {
        let mut remainder = b"10JEAN".to_vec();
        remainder.extend([b'A'; FALLBACK_SIGNATURE_LEN]);

        let zones = split_zones(3, &remainder).unwrap();

        assert_eq!(zones.message, b"10JEAN");
        assert_eq!(zones.signature.len(), FALLBACK_SIGNATURE_LEN);
        assert_eq!(zones.method, SplitMethod::TrailingSignatureFallback);
    }

    #[test]
    fn test_fallback_exact_length_has_empty_message() {
        let remainder = [b'A'; FALLBACK_SIGNATURE_LEN];

        let zones = split_zones(1, &remainder).unwrap();

        assert!(zones.message.is_empty());
        assert_eq!(zones.signature, &remainder[..]);
    }

    #[test]
    fn test_too_short_without_separator() {
        let err = split_zones(4, b"10JEAN").unwrap_err();
        assert_matches!(err.error, DecodeError::ZoneSplit(6));

        let err = split_zones(4, &[b'A'; FALLBACK_SIGNATURE_LEN - 1]).unwrap_err();
        assert_matches!(err.error, DecodeError::ZoneSplit(_));
    }

    #[test]
    fn test_split_never_loses_bytes() {
        let remainder = b"10JEAN\x1fSIGNATURE\x1dANNEX";
        let zones = split_zones(4, remainder).unwrap();

        // message, separator, signature, separator, annex
        let total =
            zones.message.len() + 1 + zones.signature.len() + 1 + zones.annex.unwrap().len();
        assert_eq!(total, remainder.len());
    }
}
