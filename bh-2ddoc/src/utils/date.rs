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

use chrono::{Days, NaiveDate};

/// Resolves a hex encoded number of days since 2000-01-01.
///
/// Returns [`None`] for anything other than 1 to 6 hex digits, or when the
/// resulting date is out of range.
pub(crate) fn date_from_hex_days(hex: &str) -> Option<NaiveDate> {
    if hex.is_empty() || hex.len() > 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }

    let days = u32::from_str_radix(hex, 16).ok()?;
    NaiveDate::from_ymd_opt(2000, 1, 1)?.checked_add_days(Days::new(days.into()))
}

/// Resolves a date packed as `month * 1_000_000 + day * 10_000 + year`.
pub(crate) fn date_from_packed(value: u32) -> Option<NaiveDate> {
    let month = value / 1_000_000;
    let day = (value / 10_000) % 100;
    let year = value % 10_000;

    NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, day)
}

/// Renders a date the way documents display it, `DD-MM-YYYY`.
pub(crate) fn display_date(date: NaiveDate) -> String {
    date.format("%d-%m-%Y").to_string()
}
