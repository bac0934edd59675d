//! The cumulative form record for one subject

use crate::schema::{Field, SCHEMA_VERSION};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Field values collected so far.
///
/// Unset fields are absent: setting a field to an empty string removes it.
/// Keys are [`Field`] variants, so names outside the schema cannot be written.
/// The record also remembers which fields were last written by a
/// review-surface edit rather than by extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredRecord", into = "StoredRecord")]
pub struct FormRecord {
    values: BTreeMap<Field, String>,
    manual: BTreeSet<Field>,
}

impl FormRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.values.get(&field).map(String::as_str)
    }

    pub fn is_set(&self, field: Field) -> bool {
        self.values.contains_key(&field)
    }

    /// Number of fields that hold a value
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Set fields in schema order
    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        self.values.iter().map(|(f, v)| (*f, v.as_str()))
    }

    /// Write a value coming from the conversation. Clears the manual mark.
    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        let value = value.into();
        self.manual.remove(&field);
        if value.is_empty() {
            self.values.remove(&field);
        } else {
            self.values.insert(field, value);
        }
    }

    /// Apply a review-surface edit. Surrounding whitespace is dropped and an
    /// empty value unsets the field.
    pub fn edit(&mut self, field: Field, value: &str) {
        let value = value.trim();
        if value.is_empty() {
            self.values.remove(&field);
            self.manual.remove(&field);
        } else {
            self.values.insert(field, value.to_string());
            self.manual.insert(field);
        }
    }

    /// Whether the current value was typed on the review surface
    pub fn is_manual(&self, field: Field) -> bool {
        self.manual.contains(&field)
    }

    /// Fields whose value differs between `self` and `other`
    pub fn changed_fields(&self, other: &FormRecord) -> Vec<Field> {
        Field::all()
            .filter(|f| self.get(*f) != other.get(*f))
            .collect()
    }
}

/// On-disk shape of a [`FormRecord`]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredRecord {
    #[serde(default)]
    schema_version: u32,
    #[serde(default)]
    fields: BTreeMap<String, String>,
    #[serde(default)]
    manual: Vec<String>,
}

impl From<FormRecord> for StoredRecord {
    fn from(record: FormRecord) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            fields: record
                .values
                .into_iter()
                .map(|(f, v)| (f.name().to_string(), v))
                .collect(),
            manual: record.manual.into_iter().map(|f| f.name().to_string()).collect(),
        }
    }
}

impl From<StoredRecord> for FormRecord {
    fn from(stored: StoredRecord) -> Self {
        let mut record = FormRecord::new();
        for (name, value) in stored.fields {
            match Field::from_name(&name) {
                Some(field) if !value.is_empty() => {
                    record.values.insert(field, value);
                }
                Some(_) => {}
                None => tracing::warn!(
                    "Dropping unknown field {:?} from stored form (schema v{})",
                    name,
                    stored.schema_version
                ),
            }
        }
        record.manual = stored
            .manual
            .iter()
            .filter_map(|name| Field::from_name(name))
            .filter(|f| record.values.contains_key(f))
            .collect();
        record
    }
}
