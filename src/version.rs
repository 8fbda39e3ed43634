use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LookupError, StoreError};
use crate::store::{Predicate, WideColumnStore};

const VERSION_FIELD: &str = "dynamodb_version";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentCount {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub count: u64,
}

/// One published snapshot and the library counts it was built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionedSnapshot {
    pub version: String,
    pub components: BTreeMap<String, ComponentCount>,
}

/// Catalog contents plus the version a lookup would use.
#[derive(Debug, Clone, Serialize)]
pub struct VersionSummary {
    pub versions: Vec<String>,
    pub selected: String,
    pub snapshot: Option<VersionedSnapshot>,
}

/// Picks the published-data version to query from the version catalog.
pub struct VersionResolver<'a, W: WideColumnStore + ?Sized> {
    store: &'a W,
    catalog: &'a str,
}

impl<'a, W: WideColumnStore + ?Sized> VersionResolver<'a, W> {
    pub fn new(store: &'a W, catalog: &'a str) -> Self {
        Self { store, catalog }
    }

    pub fn versions(&self) -> Result<Vec<String>, StoreError> {
        self.store.distinct(self.catalog, VERSION_FIELD)
    }

    /// Returns the version to use; an empty string means the catalog is empty.
    ///
    /// With several versions and none requested, the first one the catalog
    /// yields wins. That is iteration order, not the newest version.
    pub fn resolve(&self, requested: &str) -> Result<String, StoreError> {
        let versions = self.versions()?;
        let version = match versions.as_slice() {
            [] => String::new(),
            [only] => only.clone(),
            [first, ..] if requested.is_empty() => first.clone(),
            _ => requested.to_string(),
        };
        debug!(
            catalog = self.catalog,
            available = versions.len(),
            requested,
            version = %version,
            "resolved published version"
        );
        Ok(version)
    }

    /// Like [`VersionResolver::resolve`], but an explicitly requested version
    /// must be present in the catalog.
    pub fn summarize(&self, requested: Option<&str>) -> Result<VersionSummary, LookupError> {
        let versions = self.versions().map_err(LookupError::Catalog)?;
        if let Some(requested) = requested
            && !versions.iter().any(|version| version == requested)
        {
            return Err(LookupError::VersionNotFound(requested.to_string()));
        }
        let selected = self
            .resolve(requested.unwrap_or_default())
            .map_err(LookupError::Catalog)?;
        let snapshot = if selected.is_empty() {
            None
        } else {
            self.snapshot(&selected).map_err(LookupError::Catalog)?
        };
        Ok(VersionSummary {
            versions,
            selected,
            snapshot,
        })
    }

    pub fn snapshot(&self, version: &str) -> Result<Option<VersionedSnapshot>, StoreError> {
        let rows = self
            .store
            .find(self.catalog, &Predicate::equals(VERSION_FIELD, version))?;
        let Some(row) = rows.into_iter().next() else {
            return Ok(None);
        };
        let components = match row.get("components") {
            Some(value) => serde_json::from_value(value.clone()).map_err(|err| {
                StoreError::Malformed {
                    table: self.catalog.to_string(),
                    message: err.to_string(),
                }
            })?,
            None => BTreeMap::new(),
        };
        Ok(Some(VersionedSnapshot {
            version: version.to_string(),
            components,
        }))
    }
}
