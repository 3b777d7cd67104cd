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

//! The single table of field identifiers and the rules used to extract,
//! clean and display their values.

use std::collections::HashMap;

use serde::Serialize;

use crate::DocumentCategory;

/// How the raw value of a field is delimited in the message zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldLength {
    /// Exactly this many bytes, whatever they contain.
    Fixed(usize),
    /// Up to `max` bytes, terminated early by a separator.
    Variable {
        /// Upper bound on the length of the raw value.
        max: usize,
    },
}

impl FieldLength {
    /// Largest number of bytes the raw value may have.
    pub fn max_len(self) -> usize {
        match self {
            Self::Fixed(len) => len,
            Self::Variable { max } => max,
        }
    }
}

/// Semantic type of a field, which drives its display formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    /// `DDMMYYYY` digits.
    FormattedDate,
    /// Hex days since 2000-01-01, or a packed `MMDDYYYY` integer.
    Date,
    /// A year, kept as is.
    Year,
    /// A plain integer.
    Integer,
    /// A monetary amount in euros.
    Amount,
    /// Free text or identifier.
    String,
}

/// Characters a cleaned value may be made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharClass {
    /// Digits only, truncated to the field length.
    PostalCode,
    /// The first two characters, upper-cased.
    Country,
    /// Digits, `,` and `-`.
    Amount,
    /// Digits only.
    Digits,
    /// Upper-case letters and digits.
    Identifier,
    /// Upper-case letters, digits, space and `/`.
    FreeText,
    /// Anything but control characters.
    Raw,
}

/// Document families a field is defined for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldScope {
    Common,
    Tax,
}

/// Encoding and display rules of one field.
#[derive(Debug, PartialEq, Eq)]
pub struct FieldSpec {
    /// Two character identifier.
    pub id: &'static str,
    /// Display name.
    pub name: &'static str,
    /// Delimiting rule.
    pub length: FieldLength,
    /// Display formatting rule.
    pub semantic_type: SemanticType,
    /// Cleaning rule.
    pub char_class: CharClass,
    /// Digit clusters used to display identifiers, if any.
    pub grouping: Option<&'static [usize]>,
    scope: FieldScope,
}

const fn field(
    id: &'static str,
    name: &'static str,
    length: FieldLength,
    semantic_type: SemanticType,
    char_class: CharClass,
) -> FieldSpec {
    FieldSpec {
        id,
        name,
        length,
        semantic_type,
        char_class,
        grouping: None,
        scope: FieldScope::Common,
    }
}

const fn tax(spec: FieldSpec) -> FieldSpec {
    FieldSpec {
        scope: FieldScope::Tax,
        ..spec
    }
}

const fn grouped(spec: FieldSpec, grouping: &'static [usize]) -> FieldSpec {
    FieldSpec {
        grouping: Some(grouping),
        ..spec
    }
}

const fn var(max: usize) -> FieldLength {
    FieldLength::Variable { max }
}

const fn fixed(len: usize) -> FieldLength {
    FieldLength::Fixed(len)
}

/// Identifier which ends the message zone.
///
/// It is not a field: the tokenizer stops when it reads it.
pub const SIGNATURE_MARKER: &str = "SG";

/// Identifier of the tax notice reference, displayed as `2-2-7-2`.
pub const TAX_NOTICE_REFERENCE: &str = "44";
/// Identifier of the first declarant's fiscal number, displayed as
/// `2-2-3-3-3`.
pub const FISCAL_NUMBER_1: &str = "47";
/// Identifier of the second declarant's fiscal number.
pub const FISCAL_NUMBER_2: &str = "49";

const TAX_NOTICE_GROUPING: &[usize] = &[2, 2, 7, 2];
const FISCAL_NUMBER_GROUPING: &[usize] = &[2, 2, 3, 3, 3];

use CharClass as C;
use SemanticType as S;

#[rustfmt::skip]
static FIELDS: &[FieldSpec] = &[
    field("10", "Ligne 1 de l'adresse du bénéficiaire", var(38), S::String, C::FreeText),
    field("11", "Qualité et/ou titre du bénéficiaire", var(38), S::String, C::FreeText),
    field("12", "Prénom du bénéficiaire", var(38), S::String, C::FreeText),
    field("13", "Nom du bénéficiaire", var(38), S::String, C::FreeText),
    field("14", "Ligne 1 de l'adresse du destinataire", var(38), S::String, C::FreeText),
    field("15", "Qualité et/ou titre du destinataire", var(38), S::String, C::FreeText),
    field("16", "Prénom du destinataire", var(38), S::String, C::FreeText),
    field("17", "Nom du destinataire", var(38), S::String, C::FreeText),
    field("18", "Numéro de la facture", var(18), S::String, C::Identifier),
    field("19", "Numéro de client", var(18), S::String, C::Identifier),
    field("1A", "Numéro du contrat", var(18), S::String, C::Identifier),
    field("1B", "Identifiant du souscripteur", var(18), S::String, C::Identifier),
    field("1C", "Date d'effet du contrat", fixed(8), S::FormattedDate, C::Digits),
    field("1D", "Montant TTC de la facture", var(16), S::Amount, C::Amount),
    field("1E", "Téléphone du bénéficiaire", var(30), S::String, C::Raw),
    field("1F", "Téléphone du destinataire", var(30), S::String, C::Raw),
    field("20", "Ligne 2 de l'adresse du bénéficiaire", var(38), S::String, C::FreeText),
    field("21", "Ligne 3 de l'adresse du bénéficiaire", var(38), S::String, C::FreeText),
    field("22", "Ligne 4 de l'adresse du bénéficiaire", var(38), S::String, C::FreeText),
    field("23", "Ligne 5 de l'adresse du bénéficiaire", var(38), S::String, C::FreeText),
    field("24", "Code postal du bénéficiaire", fixed(5), S::String, C::PostalCode),
    field("25", "Localité du bénéficiaire", var(32), S::String, C::FreeText),
    field("26", "Pays du bénéficiaire", fixed(2), S::String, C::Country),
    field("27", "Ligne 2 de l'adresse du destinataire", var(38), S::String, C::FreeText),
    field("28", "Ligne 3 de l'adresse du destinataire", var(38), S::String, C::FreeText),
    field("29", "Ligne 4 de l'adresse du destinataire", var(38), S::String, C::FreeText),
    field("2A", "Ligne 5 de l'adresse du destinataire", var(38), S::String, C::FreeText),
    field("2B", "Code postal du destinataire", fixed(5), S::String, C::PostalCode),
    field("2C", "Localité du destinataire", var(32), S::String, C::FreeText),
    field("2D", "Pays du destinataire", fixed(2), S::String, C::Country),
    tax(field("41", "Revenu fiscal de référence", var(12), S::Amount, C::Amount)),
    tax(field("43", "Nombre de parts", var(5), S::String, C::Amount)),
    tax(grouped(
        field(TAX_NOTICE_REFERENCE, "Référence de l'avis d'impôt", fixed(13), S::String, C::Identifier),
        TAX_NOTICE_GROUPING,
    )),
    tax(field("45", "Année des revenus", fixed(4), S::Year, C::Digits)),
    tax(field("46", "Déclarant 1", var(38), S::String, C::FreeText)),
    tax(grouped(
        field(FISCAL_NUMBER_1, "Numéro fiscal du déclarant 1", fixed(13), S::String, C::Identifier),
        FISCAL_NUMBER_GROUPING,
    )),
    tax(field("48", "Déclarant 2", var(38), S::String, C::FreeText)),
    tax(grouped(
        field(FISCAL_NUMBER_2, "Numéro fiscal du déclarant 2", fixed(13), S::String, C::Identifier),
        FISCAL_NUMBER_GROUPING,
    )),
    tax(field("4A", "Date de mise en recouvrement", fixed(8), S::FormattedDate, C::Digits)),
    tax(field("4B", "Date d'établissement", fixed(4), S::Date, C::Identifier)),
    tax(field("4C", "Nombre de personnes à charge", var(3), S::Integer, C::Digits)),
];

lazy_static::lazy_static! {
    static ref FIELDS_BY_ID: HashMap<&'static str, &'static FieldSpec> =
        FIELDS.iter().map(|spec| (spec.id, spec)).collect();
}

/// View of the field table restricted to the fields a document may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldCatalog {
    include_tax_fields: bool,
}

impl FieldCatalog {
    /// Catalog with every known field.
    pub fn complete() -> Self {
        Self {
            include_tax_fields: true,
        }
    }

    /// Catalog for documents of the given category.
    ///
    /// Documents of an unknown category get the complete catalog, so that a
    /// classification miss never hides fields.
    pub fn for_category(category: DocumentCategory) -> Self {
        match category {
            DocumentCategory::ProofOfAddress => Self {
                include_tax_fields: false,
            },
            DocumentCategory::Tax | DocumentCategory::Unknown => Self::complete(),
        }
    }

    /// Looks up the rules of a field.
    pub fn get(&self, id: &str) -> Option<&'static FieldSpec> {
        FIELDS_BY_ID
            .get(id)
            .copied()
            .filter(|spec| self.include_tax_fields || spec.scope == FieldScope::Common)
    }

    /// Iterates over the fields of this catalog, in table order.
    pub fn iter(&self) -> impl Iterator<Item = &'static FieldSpec> + '_ {
        FIELDS
            .iter()
            .filter(|spec| self.include_tax_fields || spec.scope == FieldScope::Common)
    }
}
