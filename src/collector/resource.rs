//! The interface every resource collector implements.

use crate::error::CollectError;
use crate::storage::model::{Record, ResourceKind};

/// Outcome of an addressed lookup.
///
/// A missing resource is an answer, not a failure: `NotFound` is returned
/// as `Ok` and only real collection problems surface as `CollectError`.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Found(Record),
    NotFound,
}

impl Lookup {
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    pub fn record(&self) -> Option<&Record> {
        match self {
            Lookup::Found(record) => Some(record),
            Lookup::NotFound => None,
        }
    }
}

impl From<Option<Record>> for Lookup {
    fn from(record: Option<Record>) -> Self {
        match record {
            Some(record) => Lookup::Found(record),
            None => Lookup::NotFound,
        }
    }
}

/// Queries one kind of host resource.
///
/// Implementations hold no state between calls; each call reads the host
/// afresh.
pub trait ResourceCollector: Send + Sync {
    /// The resource kind this collector reports on.
    fn kind(&self) -> ResourceKind;

    /// Lists every resource of this kind, in a stable order.
    fn list(&self) -> Result<Vec<Record>, CollectError>;

    /// Looks up one resource by its identifier and returns an enriched
    /// record.
    fn detail(&self, identifier: &str) -> Result<Lookup, CollectError>;
}
