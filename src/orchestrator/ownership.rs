//! Ownership table: which context fields a phase may write during merge-back

use crate::context::{ContextField, SharedContext};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnershipMap {
    owned: BTreeMap<String, BTreeSet<ContextField>>,
}

impl OwnershipMap {
    pub fn new(owned: BTreeMap<String, BTreeSet<ContextField>>) -> Self {
        Self { owned }
    }

    /// Fields a phase owns, or `None` if it has no entry
    pub fn fields_for(&self, phase: &str) -> Option<&BTreeSet<ContextField>> {
        self.owned.get(phase)
    }

    /// Phase that owns `field`, if any
    pub fn owner_of(&self, field: ContextField) -> Option<&str> {
        self.owned
            .iter()
            .find(|(_, fields)| fields.contains(&field))
            .map(|(phase, _)| phase.as_str())
    }

    pub fn phases(&self) -> impl Iterator<Item = &str> {
        self.owned.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.owned.is_empty()
    }

    /// Copy a phase's owned fields from its snapshot into the live context.
    ///
    /// Only fields the snapshot holds a non-empty value for are copied; every
    /// other field of `live` is left alone. Returns the fields written.
    pub fn merge_owned(
        &self,
        live: &mut SharedContext,
        snapshot: &SharedContext,
        phase: &str,
    ) -> Vec<ContextField> {
        let Some(fields) = self.fields_for(phase) else {
            tracing::warn!(phase, "no ownership entry, discarding snapshot");
            return Vec::new();
        };

        let mut written = Vec::new();
        for field in fields {
            if snapshot.is_field_empty(*field) {
                continue;
            }
            live.copy_field(snapshot, *field);
            written.push(*field);
        }
        tracing::debug!(phase, fields = ?written, "merged snapshot");
        written
    }
}

impl From<BTreeMap<String, BTreeSet<ContextField>>> for OwnershipMap {
    fn from(owned: BTreeMap<String, BTreeSet<ContextField>>) -> Self {
        Self::new(owned)
    }
}
