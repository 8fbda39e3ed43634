use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::LookupError;

const CONFIG_FILE: &str = "neuron-search.json";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub tables: TableNames,
    pub object_storage: ObjectStorageConfig,
}

/// Collection and table names for every store the lookup touches.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TableNames {
    pub sample: String,
    pub image: String,
    pub em_body: String,
    pub neuron_metadata: String,
    pub published_url: String,
    pub published_image: String,
    pub version_catalog: String,
    pub published_prefix: String,
    pub published_stacks: String,
    pub published_skeletons: String,
    pub custom_annotations: String,
    pub publishing_doi: String,
}

impl TableNames {
    pub fn published_versioned(&self, version: &str) -> String {
        format!("{}{}", self.published_prefix, version)
    }
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            sample: "sample".to_string(),
            image: "image".to_string(),
            em_body: "emBody".to_string(),
            neuron_metadata: "neuronMetadata".to_string(),
            published_url: "publishedURL".to_string(),
            published_image: "publishedLMImage".to_string(),
            version_catalog: "ddb_published_versioned".to_string(),
            published_prefix: "janelia-neuronbridge-published-".to_string(),
            published_stacks: "janelia-neuronbridge-published-stacks".to_string(),
            published_skeletons: "janelia-neuronbridge-published-skeletons".to_string(),
            custom_annotations: "janelia-neuronbridge-custom-annotations".to_string(),
            publishing_doi: "janelia-neuronbridge-publishing-doi".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObjectStorageConfig {
    pub endpoint: String,
    /// Prefix stripped from asset URLs before splitting bucket and key.
    pub url_prefix: String,
    pub timeout_secs: u64,
    pub max_concurrent_probes: usize,
}

impl Default for ObjectStorageConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://s3.amazonaws.com".to_string(),
            url_prefix: "https://s3.amazonaws.com/".to_string(),
            timeout_secs: 30,
            max_concurrent_probes: 8,
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `path`, else `neuron-search.json` in the working directory, else
    /// the user config directory, else the built-in defaults.
    pub fn resolve(path: Option<&Utf8Path>) -> Result<Config, LookupError> {
        let config_path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => Self::discover(),
        };
        let Some(config_path) = config_path else {
            debug!("no config file found, using defaults");
            return Ok(Config::default());
        };

        let content = fs::read_to_string(&config_path)
            .map_err(|_| LookupError::ConfigRead(config_path.clone().into_std_path_buf()))?;
        debug!(path = %config_path, "loaded config");
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Config, LookupError> {
        let config: Config =
            serde_json::from_str(content).map_err(|err| LookupError::ConfigParse(err.to_string()))?;
        if config.object_storage.max_concurrent_probes == 0 {
            return Err(LookupError::ConfigParse(
                "object_storage.max_concurrent_probes must be at least 1".to_string(),
            ));
        }
        if config.object_storage.timeout_secs == 0 {
            return Err(LookupError::ConfigParse(
                "object_storage.timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }

    fn discover() -> Option<Utf8PathBuf> {
        let local = Utf8PathBuf::from(CONFIG_FILE);
        if local.as_std_path().exists() {
            return Some(local);
        }
        ProjectDirs::from("", "", "neuron-search")
            .and_then(|dirs| Utf8PathBuf::from_path_buf(dirs.config_dir().join(CONFIG_FILE)).ok())
            .filter(|path| path.as_std_path().exists())
    }
}
