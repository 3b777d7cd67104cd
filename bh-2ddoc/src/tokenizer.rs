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

//! Tokenization of a message zone into raw fields.

use std::collections::HashSet;

use serde::Serialize;

use crate::{
    clean_value,
    zones::{GROUP_SEPARATOR, RECORD_SEPARATOR},
    FieldCatalog, FieldLength, SIGNATURE_MARKER,
};

/// A field exactly as extracted from the message zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawField {
    /// Two character identifier.
    pub field_id: String,
    /// The extracted bytes, lossily converted to text.
    pub raw_value: String,
}

/// Output of [`tokenize`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Tokens {
    /// Fields in encounter order, each identifier at most once.
    pub fields: Vec<RawField>,
    /// Identifiers which occurred again after their first value was taken.
    pub duplicates: Vec<String>,
}

fn is_separator(byte: &u8) -> bool {
    *byte == GROUP_SEPARATOR || *byte == RECORD_SEPARATOR
}

/// Walks the `data` of a zone from left to right, extracting the fields
/// known to the `catalog`.
///
/// * Unknown identifiers advance the cursor by a single byte, so the scan
///   resynchronizes on corrupt data and ends within `data.len()` steps.
/// * A repeated identifier is skipped together with nothing but itself; the
///   first value wins.
/// * [`SIGNATURE_MARKER`] ends the scan.
/// * Fields whose value is empty once cleaned are dropped.
pub fn tokenize(data: &[u8], catalog: &FieldCatalog) -> Tokens {
    let mut tokens = Tokens::default();
    let mut seen = HashSet::new();
    let mut cursor = 0;

    while let Some(id_bytes) = data.get(cursor..cursor + 2) {
        let id = std::str::from_utf8(id_bytes).ok();
        if id == Some(SIGNATURE_MARKER) {
            break;
        }

        let Some(spec) = id.and_then(|id| catalog.get(id)) else {
            tracing::trace!(cursor, "skipping unknown field identifier");
            cursor += 1;
            continue;
        };

        let value_start = cursor + 2;
        if seen.contains(spec.id) {
            tracing::warn!(field_id = spec.id, "duplicate field, keeping the first value");
            tokens.duplicates.push(spec.id.to_owned());
            cursor = value_start;
            continue;
        }

        let (value_end, next) = value_bounds(data, value_start, spec.length);
        let raw_value = String::from_utf8_lossy(&data[value_start..value_end]).into_owned();

        if clean_value(spec, &raw_value).is_empty() {
            tracing::debug!(field_id = spec.id, "dropping empty field");
        } else {
            seen.insert(spec.id);
            tokens.fields.push(RawField {
                field_id: spec.id.to_owned(),
                raw_value,
            });
        }

        cursor = next;
    }

    tokens
}

/// Returns the end of the value starting at `start` and the position the
/// scan continues from.
fn value_bounds(data: &[u8], start: usize, length: FieldLength) -> (usize, usize) {
    match length {
        FieldLength::Fixed(len) => {
            let end = data.len().min(start + len);
            (end, end)
        }
        FieldLength::Variable { max } => {
            let limit = data.len().min(start + max);
            let end = data[start..limit]
                .iter()
                .position(is_separator)
                .map_or(limit, |offset| start + offset);
            let next = if data.get(end).is_some_and(is_separator) {
                end + 1
            } else {
                end
            };
            (end, next)
        }
    }
}
