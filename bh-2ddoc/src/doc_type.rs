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

//! Classification of documents by their `(perimeter, document type)` codes.

use std::collections::HashMap;

use serde::Serialize;

/// Broad family a document belongs to.
///
/// The category also scopes which fields of the
/// [`FieldCatalog`](crate::FieldCatalog) apply to the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentCategory {
    /// Utility bills and other proofs of address.
    ProofOfAddress,
    /// Documents issued by the tax administration.
    Tax,
    /// Codes we do not know about.
    Unknown,
}

/// Resolved type of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentType {
    /// Human readable name.
    pub name: String,
    /// Family of the document.
    pub category: DocumentCategory,
    /// Perimeter code from the header.
    pub perimeter_id: String,
    /// Document type code from the header.
    pub document_type_id: String,
}

impl DocumentType {
    /// The record returned for codes missing from the table. It keeps the raw
    /// codes for diagnostics.
    pub fn unknown(perimeter_id: &str, document_type_id: &str) -> Self {
        Self {
            name: format!("Type inconnu (périmètre {perimeter_id}, type {document_type_id})"),
            category: DocumentCategory::Unknown,
            perimeter_id: perimeter_id.to_owned(),
            document_type_id: document_type_id.to_owned(),
        }
    }

    /// Whether the codes were found in the table.
    pub fn is_known(&self) -> bool {
        self.category != DocumentCategory::Unknown
    }
}

type DocumentTypeTable =
    HashMap<&'static str, HashMap<&'static str, (&'static str, DocumentCategory)>>;

lazy_static::lazy_static! {
    /// Known document types, keyed by perimeter and then by document type.
    static ref DOCUMENT_TYPES: DocumentTypeTable = {
        use DocumentCategory::*;

        let ants: HashMap<_, _> = [
            ("00", ("Justificatif de domicile", ProofOfAddress)),
            ("01", ("Facture d'énergie", ProofOfAddress)),
            ("02", ("Facture de téléphonie", ProofOfAddress)),
            ("03", ("Facture d'accès à internet", ProofOfAddress)),
            ("04", ("Avis d'impôt sur le revenu", Tax)),
            ("05", ("Avis de taxe d'habitation", Tax)),
            ("06", ("Avis de taxe foncière", Tax)),
            ("07", ("Avis de situation déclarative à l'impôt sur le revenu", Tax)),
        ]
        .into_iter()
        .collect();

        [("01", ants)].into_iter().collect()
    };
}

/// Resolves the type of a document. Never fails; unmatched codes yield
/// [`DocumentType::unknown`].
pub fn resolve_document_type(perimeter_id: &str, document_type_id: &str) -> DocumentType {
    DOCUMENT_TYPES
        .get(perimeter_id)
        .and_then(|types| types.get(document_type_id))
        .map(|(name, category)| DocumentType {
            name: (*name).to_owned(),
            category: *category,
            perimeter_id: perimeter_id.to_owned(),
            document_type_id: document_type_id.to_owned(),
        })
        .unwrap_or_else(|| DocumentType::unknown(perimeter_id, document_type_id))
}
