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

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::{CertificateDirectory, CertificateRecord};
use crate::DirectoryError;

/// [`CertificateDirectory`] holding its records in memory.
///
/// Records are keyed by the authority and certificate identifiers which
/// 2D-DOC headers carry. Lookups never fail.
#[derive(Debug, Default, Clone)]
pub struct InMemoryDirectory {
    records: HashMap<(String, String), CertificateRecord>,
}

impl InMemoryDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `record` under the given identifiers, returning the record it
    /// replaced, if any.
    pub fn insert(
        &mut self,
        authority_id: impl Into<String>,
        certificate_id: impl Into<String>,
        record: CertificateRecord,
    ) -> Option<CertificateRecord> {
        self.records
            .insert((authority_id.into(), certificate_id.into()), record)
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the directory holds no record.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records issued by the named provider.
    pub fn by_provider<'a>(
        &'a self,
        provider_name: &'a str,
    ) -> impl Iterator<Item = &'a CertificateRecord> + 'a {
        self.records
            .values()
            .filter(move |record| record.provider_name == provider_name)
    }

    /// The record with the given serial number.
    pub fn by_serial(&self, serial_number: &str) -> Option<&CertificateRecord> {
        self.records
            .values()
            .find(|record| record.serial_number.eq_ignore_ascii_case(serial_number))
    }

    /// Records whose validity window contains `now`.
    pub fn currently_valid(
        &self,
        now: DateTime<Utc>,
    ) -> impl Iterator<Item = &CertificateRecord> + '_ {
        self.records
            .values()
            .filter(move |record| record.is_valid_at(now))
    }
}

impl CertificateDirectory for InMemoryDirectory {
    async fn lookup(
        &self,
        authority_id: &str,
        certificate_id: &str,
    ) -> bherror::Result<Option<CertificateRecord>, DirectoryError> {
        Ok(self
            .records
            .get(&(authority_id.to_owned(), certificate_id.to_owned()))
            .cloned())
    }
}
