//! Backend boundaries for the document store and the wide-column store.
//!
//! Implementations must bound every call with a timeout and surface a timed
//! out call as a [`StoreError`]. Zero matches is an empty result, not an error.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::StoreError;

/// One document or item, keyed by attribute name.
pub type Record = Map<String, Value>;

/// Filter applied to a single field of a collection or table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Predicate {
    Equals { field: String, value: Value },
    EqualsIgnoreCase { field: String, value: String },
    EndsWith { field: String, suffix: String },
}

impl Predicate {
    pub fn equals(field: &str, value: impl Into<Value>) -> Self {
        Predicate::Equals {
            field: field.to_string(),
            value: value.into(),
        }
    }

    pub fn equals_ignore_case(field: &str, value: &str) -> Self {
        Predicate::EqualsIgnoreCase {
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    pub fn ends_with(field: &str, suffix: &str) -> Self {
        Predicate::EndsWith {
            field: field.to_string(),
            suffix: suffix.to_string(),
        }
    }

    pub fn field(&self) -> &str {
        match self {
            Predicate::Equals { field, .. }
            | Predicate::EqualsIgnoreCase { field, .. }
            | Predicate::EndsWith { field, .. } => field,
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        let Some(found) = record.get(self.field()) else {
            return false;
        };
        match self {
            Predicate::Equals { value, .. } => found == value,
            Predicate::EqualsIgnoreCase { value, .. } => found
                .as_str()
                .map(|text| text.to_lowercase() == value.to_lowercase())
                .unwrap_or(false),
            Predicate::EndsWith { suffix, .. } => found
                .as_str()
                .map(|text| text.ends_with(suffix.as_str()))
                .unwrap_or(false),
        }
    }
}

/// Equality condition on a partition or sort key attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyCondition {
    pub attribute: String,
    pub value: String,
}

impl KeyCondition {
    pub fn new(attribute: &str, value: impl Into<String>) -> Self {
        Self {
            attribute: attribute.to_string(),
            value: value.into(),
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        record
            .get(&self.attribute)
            .and_then(|value| value.as_str())
            .map(|value| value == self.value)
            .unwrap_or(false)
    }
}

pub trait DocumentStore: Send + Sync {
    fn find(&self, collection: &str, predicate: &Predicate) -> Result<Vec<Record>, StoreError>;
}

pub trait WideColumnStore: Send + Sync {
    /// Filtered scan of a whole table.
    fn find(&self, table: &str, predicate: &Predicate) -> Result<Vec<Record>, StoreError>;

    fn get_item(&self, table: &str, key: &KeyCondition) -> Result<Option<Record>, StoreError>;

    fn query(
        &self,
        table: &str,
        partition: &KeyCondition,
        sort: Option<&KeyCondition>,
    ) -> Result<Vec<Record>, StoreError>;

    /// Distinct values of `field`, in the order the store yields them.
    fn distinct(&self, table: &str, field: &str) -> Result<Vec<String>, StoreError>;
}

impl<T: DocumentStore + ?Sized> DocumentStore for Arc<T> {
    fn find(&self, collection: &str, predicate: &Predicate) -> Result<Vec<Record>, StoreError> {
        (**self).find(collection, predicate)
    }
}

impl<T: WideColumnStore + ?Sized> WideColumnStore for Arc<T> {
    fn find(&self, table: &str, predicate: &Predicate) -> Result<Vec<Record>, StoreError> {
        (**self).find(table, predicate)
    }

    fn get_item(&self, table: &str, key: &KeyCondition) -> Result<Option<Record>, StoreError> {
        (**self).get_item(table, key)
    }

    fn query(
        &self,
        table: &str,
        partition: &KeyCondition,
        sort: Option<&KeyCondition>,
    ) -> Result<Vec<Record>, StoreError> {
        (**self).query(table, partition, sort)
    }

    fn distinct(&self, table: &str, field: &str) -> Result<Vec<String>, StoreError> {
        (**self).distinct(table, field)
    }
}
