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

use bherror::{traits::ErrorContext as _, Error};

use crate::{DecodeError, Result};

/// The basic C40 set. Indices `0..=2` are shift codes which we render as
/// padding.
const C40_ALPHABET: &[u8; 40] = b"    0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Largest value a triplet can hold (`39 * 1600 + 39 * 40 + 39`).
const MAX_TRIPLET_VALUE: u16 = 63_999;

/// Decodes C40 packed bytes, every 2-byte big-endian value yielding three
/// symbols (`value = c1 * 1600 + c2 * 40 + c3`).
///
/// Trailing padding is kept; callers trim as their field requires.
pub(crate) fn decode_c40(bytes: &[u8]) -> Result<String> {
    if bytes.len() % 2 != 0 {
        return Err(Error::root(DecodeError::MalformedHeader(
            "C40 data must have an even length".to_owned(),
        )))
        .ctx(|| format!("length was {}", bytes.len()));
    }

    let mut decoded = String::with_capacity(bytes.len() / 2 * 3);
    for pair in bytes.chunks_exact(2) {
        let value = u16::from_be_bytes([pair[0], pair[1]]);
        if value > MAX_TRIPLET_VALUE {
            return Err(Error::root(DecodeError::MalformedHeader(format!(
                "invalid C40 triplet value {value}"
            ))));
        }

        let symbols = [value / 1600, (value / 40) % 40, value % 40];
        decoded.extend(
            symbols
                .into_iter()
                .map(|symbol| char::from(C40_ALPHABET[usize::from(symbol)])),
        );
    }

    Ok(decoded)
}
