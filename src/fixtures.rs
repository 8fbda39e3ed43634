use std::collections::BTreeMap;
use std::fs;

use camino::Utf8Path;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{LookupError, StoreError};
use crate::store::{DocumentStore, KeyCondition, Predicate, Record, WideColumnStore};

/// In-memory document and wide-column store loaded from a JSON dump.
///
/// The dump has two maps, `documents` (collection name to documents) and
/// `tables` (table name to items). Unknown collections and tables read as
/// empty.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FixtureStore {
    #[serde(default)]
    documents: BTreeMap<String, Vec<Record>>,
    #[serde(default)]
    tables: BTreeMap<String, Vec<Record>>,
}

impl FixtureStore {
    pub fn load(path: &Utf8Path) -> Result<Self, LookupError> {
        let content = fs::read_to_string(path)
            .map_err(|_| LookupError::FixtureRead(path.as_std_path().to_path_buf()))?;
        let store = Self::from_json(&content)?;
        debug!(
            path = %path,
            collections = store.documents.len(),
            tables = store.tables.len(),
            "loaded store fixtures"
        );
        Ok(store)
    }

    pub fn from_json(content: &str) -> Result<Self, LookupError> {
        serde_json::from_str(content).map_err(|err| LookupError::FixtureParse(err.to_string()))
    }

    pub fn with_documents(mut self, collection: &str, rows: Vec<Value>) -> Self {
        self.documents
            .entry(collection.to_string())
            .or_default()
            .extend(objects(rows));
        self
    }

    pub fn with_items(mut self, table: &str, rows: Vec<Value>) -> Self {
        self.tables
            .entry(table.to_string())
            .or_default()
            .extend(objects(rows));
        self
    }

    fn table(&self, table: &str) -> &[Record] {
        self.tables.get(table).map(Vec::as_slice).unwrap_or_default()
    }
}

fn objects(rows: Vec<Value>) -> impl Iterator<Item = Record> {
    rows.into_iter().filter_map(|row| match row {
        Value::Object(map) => Some(map),
        _ => None,
    })
}

impl DocumentStore for FixtureStore {
    fn find(&self, collection: &str, predicate: &Predicate) -> Result<Vec<Record>, StoreError> {
        let rows = self
            .documents
            .get(collection)
            .map(Vec::as_slice)
            .unwrap_or_default();
        Ok(rows
            .iter()
            .filter(|row| predicate.matches(row))
            .cloned()
            .collect())
    }
}

impl WideColumnStore for FixtureStore {
    fn find(&self, table: &str, predicate: &Predicate) -> Result<Vec<Record>, StoreError> {
        Ok(self
            .table(table)
            .iter()
            .filter(|row| predicate.matches(row))
            .cloned()
            .collect())
    }

    fn get_item(&self, table: &str, key: &KeyCondition) -> Result<Option<Record>, StoreError> {
        Ok(self.table(table).iter().find(|row| key.matches(row)).cloned())
    }

    fn query(
        &self,
        table: &str,
        partition: &KeyCondition,
        sort: Option<&KeyCondition>,
    ) -> Result<Vec<Record>, StoreError> {
        Ok(self
            .table(table)
            .iter()
            .filter(|row| partition.matches(row))
            .filter(|row| sort.map(|sort| sort.matches(row)).unwrap_or(true))
            .cloned()
            .collect())
    }

    fn distinct(&self, table: &str, field: &str) -> Result<Vec<String>, StoreError> {
        let mut values: Vec<String> = Vec::new();
        for row in self.table(table) {
            let Some(value) = row.get(field).and_then(Value::as_str) else {
                continue;
            };
            if !values.iter().any(|seen| seen == value) {
                values.push(value.to_string());
            }
        }
        Ok(values)
    }
}
