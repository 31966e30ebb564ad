//! Aggregated result of one collection cycle.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::record::{Record, ResourceKind};

/// Note attached to a snapshot when a collector could not deliver records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: ResourceKind,
    pub message: String,
}

/// Records of every requested resource kind, captured in one cycle.
///
/// `records` holds an entry for each requested kind even when its collector
/// failed; in that case the list is empty and `diagnostics` explains why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub captured_at: NaiveDateTime,
    pub records: BTreeMap<ResourceKind, Vec<Record>>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Snapshot {
    /// Records of the given kind, empty when the kind was not requested.
    pub fn records_of(&self, kind: ResourceKind) -> &[Record] {
        self.records.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn diagnostic_for(&self, kind: ResourceKind) -> Option<&Diagnostic> {
        self.diagnostics.iter().find(|d| d.kind == kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = ResourceKind> + '_ {
        self.records.keys().copied()
    }

    pub fn total_records(&self) -> usize {
        self.records.values().map(Vec::len).sum()
    }

    pub fn is_complete(&self) -> bool {
        self.diagnostics.is_empty()
    }
}
