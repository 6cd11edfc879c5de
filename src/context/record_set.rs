//! RecordSet: an ordered list of records with derived lookup indexes
//!
//! The list is the only source of truth. `by_id` and `by_name` are rebuilt
//! after every mutation and are never serialized.

use super::record::Record;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Ordered records plus id/name indexes derived from them
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Record>", into = "Vec<Record>")]
pub struct RecordSet {
    records: Vec<Record>,
    by_id: HashMap<String, usize>,
    /// Lowercased name -> position of the first record with that name
    by_name: HashMap<String, usize>,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<Record>) -> Self {
        let mut set = Self {
            records,
            by_id: HashMap::new(),
            by_name: HashMap::new(),
        };
        set.rebuild_indexes();
        set
    }

    /// Append a record.
    ///
    /// A record whose id is already present replaces the existing one in place.
    pub fn push(&mut self, record: Record) {
        match self.by_id.get(&record.id) {
            Some(&idx) => self.records[idx] = record,
            None => self.records.push(record),
        }
        self.rebuild_indexes();
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = Record>) {
        for record in records {
            match self.records.iter().position(|r| r.id == record.id) {
                Some(idx) => self.records[idx] = record,
                None => self.records.push(record),
            }
        }
        self.rebuild_indexes();
    }

    /// Replace the whole contents
    pub fn replace_all(&mut self, records: Vec<Record>) {
        self.records = records;
        self.rebuild_indexes();
    }

    /// Remove a record by id, returning it
    pub fn remove(&mut self, id: &str) -> Option<Record> {
        let idx = *self.by_id.get(id)?;
        let removed = self.records.remove(idx);
        self.rebuild_indexes();
        Some(removed)
    }

    pub fn retain(&mut self, f: impl FnMut(&Record) -> bool) {
        self.records.retain(f);
        self.rebuild_indexes();
    }

    /// Mutate one record in place; indexes are rebuilt afterwards since the
    /// closure may change its id or name.
    pub fn update<F>(&mut self, id: &str, f: F) -> bool
    where
        F: FnOnce(&mut Record),
    {
        let Some(&idx) = self.by_id.get(id) else {
            return false;
        };
        f(&mut self.records[idx]);
        self.rebuild_indexes();
        true
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.rebuild_indexes();
    }

    pub fn get_by_id(&self, id: &str) -> Option<&Record> {
        self.by_id.get(id).map(|&idx| &self.records[idx])
    }

    /// Case-insensitive lookup by name
    pub fn get_by_name(&self, name: &str) -> Option<&Record> {
        self.by_name
            .get(&name.trim().to_lowercase())
            .map(|&idx| &self.records[idx])
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    /// Non-empty names in list order
    pub fn names(&self) -> Vec<String> {
        self.records
            .iter()
            .filter(|r| !r.name.is_empty())
            .map(|r| r.name.clone())
            .collect()
    }

    pub fn ids(&self) -> Vec<String> {
        self.records.iter().map(|r| r.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn rebuild_indexes(&mut self) {
        self.by_id.clear();
        self.by_name.clear();
        for (idx, record) in self.records.iter().enumerate() {
            self.by_id.entry(record.id.clone()).or_insert(idx);
            if !record.name.is_empty() {
                self.by_name
                    .entry(record.name.trim().to_lowercase())
                    .or_insert(idx);
            }
        }
    }
}

impl PartialEq for RecordSet {
    fn eq(&self, other: &Self) -> bool {
        self.records == other.records
    }
}

impl From<Vec<Record>> for RecordSet {
    fn from(records: Vec<Record>) -> Self {
        Self::from_records(records)
    }
}

impl From<RecordSet> for Vec<Record> {
    fn from(set: RecordSet) -> Self {
        set.records
    }
}

impl FromIterator<Record> for RecordSet {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self::from_records(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a RecordSet {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
