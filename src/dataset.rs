//! The dataset built over a run, and the aggregator that feeds parsed
//! records into it.

use crate::record::Record;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::HashMap;

/// Key of one dataset entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum DatasetKey {
    /// Arrival position, used when records are not grouped.
    Index(usize),
    /// Value of the grouping field.
    Group(String),
}

/// Records keyed by arrival index or group value, iterated in insertion order.
#[derive(Debug, Default)]
pub struct Dataset {
    entries: Vec<(DatasetKey, Record)>,
    groups: HashMap<String, usize>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Append a record under the next sequential index.
    pub fn push(&mut self, record: Record) {
        let key = DatasetKey::Index(self.entries.len());
        self.entries.push((key, record));
    }

    /// The record stored for a group value, if any.
    pub fn group_mut(&mut self, group: &str) -> Option<&mut Record> {
        let idx = *self.groups.get(group)?;
        self.entries.get_mut(idx).map(|(_, record)| record)
    }

    /// Insert the first record of a new group.
    pub fn insert_group(&mut self, group: String, record: Record) {
        self.groups.insert(group.clone(), self.entries.len());
        self.entries.push((DatasetKey::Group(group), record));
    }

    #[cfg(test)]
    pub fn get(&self, key: &DatasetKey) -> Option<&Record> {
        match key {
            DatasetKey::Index(idx) => self
                .entries
                .get(*idx)
                .filter(|(k, _)| k == key)
                .map(|(_, record)| record),
            DatasetKey::Group(group) => {
                let idx = *self.groups.get(group)?;
                self.entries.get(idx).map(|(_, record)| record)
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DatasetKey, &Record)> {
        self.entries.iter().map(|(key, record)| (key, record))
    }

    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.entries.iter().map(|(_, record)| record)
    }

    pub fn records_mut(&mut self) -> impl Iterator<Item = &mut Record> {
        self.entries.iter_mut().map(|(_, record)| record)
    }
}

impl Serialize for Dataset {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, record) in self.iter() {
            map.serialize_entry(key, record)?;
        }
        map.end()
    }
}

/// Errors raised while folding records into the dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregateError {
    /// The record has no field named after the grouping key.
    MissingKey { key: String },
}

impl std::fmt::Display for AggregateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregateError::MissingKey { key } => {
                write!(f, "record has no grouping field '{key}'")
            }
        }
    }
}

impl std::error::Error for AggregateError {}

/// Accumulates parsed records into a [`Dataset`].
///
/// Without a grouping key every record becomes its own entry. With one, all
/// records sharing the key field's value are merged into a single entry:
/// repeated fields turn into lists in arrival order.
pub struct Aggregator {
    group_key: Option<String>,
    dataset: Dataset,
}

impl Aggregator {
    pub fn new(group_key: Option<String>) -> Self {
        Self {
            group_key,
            dataset: Dataset::new(),
        }
    }

    /// Fold one parsed record into the dataset.
    pub fn add(&mut self, record: Record) -> Result<(), AggregateError> {
        let Some(key) = self.group_key.as_deref() else {
            self.dataset.push(record);
            return Ok(());
        };

        let group = match record.get(key) {
            Some(value) => value.to_string(),
            None => {
                return Err(AggregateError::MissingKey {
                    key: key.to_string(),
                })
            }
        };

        match self.dataset.group_mut(&group) {
            Some(existing) => existing.merge(record),
            None => self.dataset.insert_group(group, record),
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.dataset.len()
    }

    pub fn finish(self) -> Dataset {
        self.dataset
    }
}

/// Make sure the grouping key survives column filtering.
///
/// When both an explicit column list and a grouping key are given, the key is
/// prepended to the list unless it is already there. Run once, before any
/// line is parsed, since the list doubles as the parse-time allow-list.
pub fn prepare_columns(columns: Option<Vec<String>>, key: Option<&str>) -> Option<Vec<String>> {
    match (columns, key) {
        (Some(mut columns), Some(key)) if !columns.iter().any(|c| c == key) => {
            columns.insert(0, key.to_string());
            Some(columns)
        }
        (columns, _) => columns,
    }
}
