use std::path::PathBuf;

use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;

use crate::domain::KeyType;
use crate::pipeline::Step;

/// Failure raised by a backend adapter. Timeouts and dropped connections
/// are reported as `Http`, rejected queries as `Query`.
#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("request failed: {0}")]
    Http(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("malformed record in {table}: {message}")]
    Malformed { table: String, message: String },
}

#[derive(Debug, Error, Diagnostic)]
pub enum LookupError {
    #[error("invalid key type: {0}")]
    InvalidKeyType(String),

    #[error("{key} is not a valid {key_type}")]
    InvalidKey { key_type: KeyType, key: String },

    #[error("step {} ({step}) failed while querying {key_type} {key}: {source}", .step.stage())]
    Store {
        step: Step,
        key_type: KeyType,
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("failed to read fixture file at {0}")]
    FixtureRead(PathBuf),

    #[error("failed to parse fixture file: {0}")]
    FixtureParse(String),

    #[error("object storage client setup failed: {0}")]
    ObjectStorage(String),

    #[error("published version {0} was not found")]
    VersionNotFound(String),

    #[error("version catalog query failed: {0}")]
    Catalog(#[source] StoreError),
}

/// What a caller shows instead of a report when a lookup is aborted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub title: String,
    pub message: String,
}

impl LookupError {
    /// The pipeline step that failed, for store errors.
    pub fn step(&self) -> Option<Step> {
        match self {
            LookupError::Store { step, .. } => Some(*step),
            _ => None,
        }
    }

    pub fn report(&self) -> ErrorReport {
        let title = match self {
            LookupError::InvalidKeyType(_) => "Invalid key type".to_string(),
            LookupError::InvalidKey { key_type, .. } => format!("Invalid {key_type}"),
            LookupError::Store { key_type, key, .. } => format!("Error querying {key_type} {key}"),
            LookupError::ConfigRead(_) | LookupError::ConfigParse(_) => {
                "Invalid or missing configuration".to_string()
            }
            LookupError::FixtureRead(_) | LookupError::FixtureParse(_) => {
                "Could not load store fixtures".to_string()
            }
            LookupError::ObjectStorage(_) => "Could not connect to object storage".to_string(),
            LookupError::VersionNotFound(_) => "Version not found".to_string(),
            LookupError::Catalog(_) => "Could not query the version catalog".to_string(),
        };
        ErrorReport {
            title,
            message: self.to_string(),
        }
    }
}
