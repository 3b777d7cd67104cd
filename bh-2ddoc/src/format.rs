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

//! Cleaning and display formatting of raw field values.
//!
//! Both stages take the [`FieldSpec`] of the field explicitly.

use serde::Serialize;

use crate::{
    utils::date::{date_from_hex_days, date_from_packed, display_date},
    CharClass, FieldSpec, RawField, SemanticType,
};

/// Currency suffix of amounts.
const CURRENCY_SUFFIX: &str = " €";

/// A field ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormattedField {
    /// Two character identifier.
    pub field_id: String,
    /// Name of the field from the catalog.
    pub display_name: String,
    /// Semantic type from the catalog.
    pub semantic_type: SemanticType,
    /// The cleaned value, before formatting.
    pub value: String,
    /// The value as it should be displayed.
    pub formatted_value: String,
}

impl FormattedField {
    /// Cleans and formats a raw field.
    ///
    /// Returns [`None`] if nothing is left of the value after cleaning.
    pub fn new(spec: &FieldSpec, raw: &RawField) -> Option<Self> {
        let value = clean_value(spec, &raw.raw_value);
        if value.is_empty() {
            return None;
        }

        Some(Self {
            field_id: spec.id.to_owned(),
            display_name: spec.name.to_owned(),
            semantic_type: spec.semantic_type,
            formatted_value: format_value(spec, &value),
            value,
        })
    }
}

/// Strips control characters and restricts the value to the field's
/// [`CharClass`].
pub fn clean_value(spec: &FieldSpec, raw: &str) -> String {
    let stripped: String = raw.chars().filter(|c| !c.is_control()).collect();
    let stripped = stripped.trim();

    match spec.char_class {
        CharClass::PostalCode => stripped
            .chars()
            .filter(char::is_ascii_digit)
            .take(spec.length.max_len())
            .collect(),
        CharClass::Country => stripped.chars().take(2).collect::<String>().to_uppercase(),
        CharClass::Amount => stripped
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '-')
            .collect(),
        CharClass::Digits => stripped.chars().filter(char::is_ascii_digit).collect(),
        CharClass::Identifier => stripped
            .to_uppercase()
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect(),
        CharClass::FreeText => {
            let kept: String = stripped
                .to_uppercase()
                .chars()
                .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || *c == ' ' || *c == '/')
                .collect();
            collapse_whitespace(&kept.replace('/', " / "))
        }
        CharClass::Raw => stripped.to_owned(),
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Renders a cleaned value according to the field's [`SemanticType`].
///
/// Formatting never fails; values which cannot be interpreted are returned
/// unchanged.
pub fn format_value(spec: &FieldSpec, value: &str) -> String {
    match spec.semantic_type {
        SemanticType::FormattedDate => format_ddmmyyyy(value),
        SemanticType::Date => format_encoded_date(value),
        SemanticType::Year => value.to_owned(),
        SemanticType::Integer => value
            .parse::<i64>()
            .map(|number| number.to_string())
            .unwrap_or_else(|_| value.to_owned()),
        SemanticType::Amount => format!("{value}{CURRENCY_SUFFIX}"),
        SemanticType::String => match spec.grouping {
            Some(grouping) => group_characters(value, grouping),
            None => value.to_owned(),
        },
    }
}

/// `DDMMYYYY` to `DD-MM-YYYY`.
fn format_ddmmyyyy(value: &str) -> String {
    if value.len() != 8 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return value.to_owned();
    }

    format!("{}-{}-{}", &value[..2], &value[2..4], &value[4..])
}

/// Hex days or packed `MMDDYYYY` to `DD-MM-YYYY`.
fn format_encoded_date(value: &str) -> String {
    let date = if value.len() == 8 && value.bytes().all(|b| b.is_ascii_digit()) {
        value.parse().ok().and_then(date_from_packed)
    } else {
        date_from_hex_days(value)
    };

    date.map(display_date).unwrap_or_else(|| value.to_owned())
}

/// Splits the value into space separated clusters of the given sizes, if the
/// value has exactly the total size.
fn group_characters(value: &str, grouping: &[usize]) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() != grouping.iter().sum::<usize>() {
        return value.to_owned();
    }

    let mut start = 0;
    grouping
        .iter()
        .map(|len| {
            let cluster: String = chars[start..start + len].iter().collect();
            start += len;
            cluster
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FieldCatalog, FISCAL_NUMBER_1, TAX_NOTICE_REFERENCE};

    fn spec(id: &str) -> &'static FieldSpec {
        FieldCatalog::complete().get(id).unwrap()
    }

    #[test]
    fn test_formatted_date() {
        assert_eq!(format_value(spec("1C"), "25122024"), "25-12-2024");
        assert_eq!(format_value(spec("1C"), "2512202"), "2512202");
    }

    #[test]
    fn test_encoded_date() {
        assert_eq!(format_value(spec("4B"), "0000"), "01-01-2000");
        assert_eq!(format_value(spec("4B"), "0001"), "02-01-2000");
        assert_eq!(format_value(spec("4B"), "12252024"), "25-12-2024");
        assert_eq!(format_value(spec("4B"), "ZZZZ"), "ZZZZ");
    }

    #[test]
    fn test_amount() {
        assert_eq!(format_value(spec("1D"), "1234,56"), "1234,56 €");
    }

    #[test]
    fn test_year_passes_through() {
        assert_eq!(format_value(spec("45"), "2023"), "2023");
    }

    #[test]
    fn test_integer_strips_leading_zeros() {
        assert_eq!(format_value(spec("4C"), "003"), "3");
        assert_eq!(format_value(spec("4C"), "x"), "x");
    }

    #[test]
    fn test_fiscal_number_grouping() {
        assert_eq!(
            format_value(spec(FISCAL_NUMBER_1), "1234567890123"),
            "12 34 567 890 123"
        );
        assert_eq!(format_value(spec(FISCAL_NUMBER_1), "123"), "123");
    }

    #[test]
    fn test_tax_notice_reference_grouping() {
        assert_eq!(
            format_value(spec(TAX_NOTICE_REFERENCE), "1234567890123"),
            "12 34 5678901 23"
        );
    }

    #[test]
    fn test_plain_string_passes_through() {
        assert_eq!(format_value(spec("13"), "1234567890123"), "1234567890123");
    }

    #[test]
    fn test_clean_postal_code() {
        assert_eq!(clean_value(spec("24"), "75 0\x1d01X9"), "75001");
    }

    #[test]
    fn test_clean_country() {
        assert_eq!(clean_value(spec("26"), "fra"), "FR");
        assert_eq!(clean_value(spec("26"), " be"), "BE");
    }

    #[test]
    fn test_clean_amount() {
        assert_eq!(clean_value(spec("1D"), "-1 234,56EUR"), "-1234,56");
    }

    #[test]
    fn test_clean_free_text() {
        assert_eq!(
            clean_value(spec("10"), "  12 rue de la  Paix/bat A\x1e "),
            "12 RUE DE LA PAIX / BAT A"
        );
        assert_eq!(clean_value(spec("13"), "O'NEIL-SMITH"), "ONEILSMITH");
    }

    #[test]
    fn test_clean_identifier() {
        assert_eq!(clean_value(spec("18"), "ab-12 34"), "AB1234");
    }

    #[test]
    fn test_clean_raw_strips_controls_only() {
        assert_eq!(clean_value(spec("1E"), "+33 1\x1d23"), "+33 123");
    }

    #[test]
    fn test_formatted_field_drops_empty_value() {
        let raw = RawField {
            field_id: "24".to_owned(),
            raw_value: "ABCDE".to_owned(),
        };
        assert_eq!(FormattedField::new(spec("24"), &raw), None);
    }

    #[test]
    fn test_formatted_field() {
        let raw = RawField {
            field_id: "1D".to_owned(),
            raw_value: "42,10".to_owned(),
        };
        let field = FormattedField::new(spec("1D"), &raw).unwrap();

        assert_eq!(field.field_id, "1D");
        assert_eq!(field.display_name, "Montant TTC de la facture");
        assert_eq!(field.semantic_type, SemanticType::Amount);
        assert_eq!(field.value, "42,10");
        assert_eq!(field.formatted_value, "42,10 €");
    }
}
