//! Existence checks for the files a published record points at.

use std::collections::HashMap;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ObjectStorageConfig;
use crate::error::LookupError;
use crate::s3::{ObjectStore, ProbeOutcome};
use crate::store::Record;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetReference {
    pub file_type: String,
    pub url: String,
}

impl AssetReference {
    pub fn new(file_type: &str, url: &str) -> Self {
        Self {
            file_type: file_type.to_string(),
            url: url.to_string(),
        }
    }

    /// Reads a `{file type: url}` manifest field. Non-string entries are skipped.
    pub fn from_manifest(record: &Record, field: &str) -> Vec<AssetReference> {
        let Some(Value::Object(manifest)) = record.get(field) else {
            return Vec::new();
        };
        manifest
            .iter()
            .filter_map(|(file_type, url)| {
                url.as_str()
                    .filter(|url| !url.is_empty())
                    .map(|url| AssetReference::new(file_type, url))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetErrorKind {
    None,
    NotFound,
    OtherError,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetCheckResult {
    pub file_type: String,
    pub rendered_key: String,
    pub url: String,
    pub found: bool,
    pub error_kind: AssetErrorKind,
    pub detail: Option<String>,
    /// The key was already probed earlier in this request.
    pub repeated: bool,
}

impl AssetCheckResult {
    fn from_outcome(
        reference: &AssetReference,
        key: &str,
        outcome: &ProbeOutcome,
        repeated: bool,
    ) -> Self {
        let (found, error_kind, detail) = match outcome {
            ProbeOutcome::Exists => (true, AssetErrorKind::None, None),
            ProbeOutcome::NotFound => (false, AssetErrorKind::NotFound, None),
            ProbeOutcome::Failed(message) => {
                (false, AssetErrorKind::OtherError, Some(message.clone()))
            }
        };
        Self {
            file_type: reference.file_type.clone(),
            rendered_key: key.to_string(),
            url: reference.url.clone(),
            found,
            error_kind,
            detail,
            repeated,
        }
    }
}

/// Outcomes of the probes already issued during one request, keyed by
/// (file type, storage key). Never shared between requests.
#[derive(Debug, Default)]
pub struct ExistenceCache {
    seen: HashMap<(String, String), ProbeOutcome>,
}

impl ExistenceCache {
    pub fn get(&self, file_type: &str, key: &str) -> Option<&ProbeOutcome> {
        self.seen.get(&(file_type.to_string(), key.to_string()))
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    fn record(&mut self, file_type: String, key: String, outcome: ProbeOutcome) {
        self.seen.insert((file_type, key), outcome);
    }
}

/// Bucket and key of an asset URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLocation {
    pub bucket: String,
    pub key: String,
}

enum Plan {
    Malformed,
    Known(ProbeOutcome),
    Probe { index: usize, repeated: bool },
}

pub struct AssetChecker<O: ObjectStore> {
    store: O,
    pool: ThreadPool,
    location: Regex,
}

impl<O: ObjectStore> AssetChecker<O> {
    pub fn new(store: O, config: &ObjectStorageConfig) -> Result<Self, LookupError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.max_concurrent_probes.max(1))
            .thread_name(|index| format!("asset-probe-{index}"))
            .build()
            .map_err(|err| LookupError::ObjectStorage(err.to_string()))?;
        // bucket names never contain ':', so an unprefixed absolute URL never
        // splits into a bucket and key
        let pattern = format!(
            r"^(?:{})?([^/:]+)/([^/].*)$",
            regex::escape(&config.url_prefix)
        );
        let location =
            Regex::new(&pattern).map_err(|err| LookupError::ObjectStorage(err.to_string()))?;
        Ok(Self {
            store,
            pool,
            location,
        })
    }

    pub fn store(&self) -> &O {
        &self.store
    }

    pub fn locate(&self, url: &str) -> Option<StorageLocation> {
        let captures = self.location.captures(url)?;
        Some(StorageLocation {
            bucket: captures[1].to_string(),
            key: captures[2].to_string(),
        })
    }

    /// Checks every reference, probing each (file type, key) pair at most once
    /// per cache. Results follow the order of `references`.
    pub fn check(
        &self,
        references: &[AssetReference],
        cache: &mut ExistenceCache,
    ) -> Vec<AssetCheckResult> {
        let mut probes: Vec<StorageLocation> = Vec::new();
        let mut scheduled: HashMap<(String, String), usize> = HashMap::new();
        let mut plans = Vec::with_capacity(references.len());

        for reference in references {
            let Some(location) = self.locate(&reference.url) else {
                plans.push((String::new(), Plan::Malformed));
                continue;
            };
            let slot = (reference.file_type.clone(), location.key.clone());
            let plan = if let Some(outcome) = cache.get(&slot.0, &slot.1) {
                Plan::Known(outcome.clone())
            } else if let Some(index) = scheduled.get(&slot) {
                Plan::Probe {
                    index: *index,
                    repeated: true,
                }
            } else {
                let index = probes.len();
                scheduled.insert(slot, index);
                probes.push(location.clone());
                Plan::Probe {
                    index,
                    repeated: false,
                }
            };
            plans.push((location.key, plan));
        }

        debug!(
            references = references.len(),
            probes = probes.len(),
            "checking assets"
        );
        let outcomes: Vec<ProbeOutcome> = self.pool.install(|| {
            probes
                .par_iter()
                .map(|location| {
                    self.store
                        .head(&location.bucket, &location.key.replace('+', " "))
                })
                .collect()
        });

        for ((file_type, key), index) in scheduled {
            cache.record(file_type, key, outcomes[index].clone());
        }

        references
            .iter()
            .zip(plans)
            .map(|(reference, (key, plan))| match plan {
                Plan::Malformed => {
                    warn!(url = %reference.url, "asset url has no bucket and key");
                    AssetCheckResult {
                        file_type: reference.file_type.clone(),
                        rendered_key: reference.url.clone(),
                        url: reference.url.clone(),
                        found: false,
                        error_kind: AssetErrorKind::OtherError,
                        detail: Some("url has no bucket and key".to_string()),
                        repeated: false,
                    }
                }
                Plan::Known(outcome) => {
                    AssetCheckResult::from_outcome(reference, &key, &outcome, true)
                }
                Plan::Probe { index, repeated } => {
                    AssetCheckResult::from_outcome(reference, &key, &outcomes[index], repeated)
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;

    #[derive(Default)]
    struct MockObjects {
        calls: Mutex<Vec<(String, String)>>,
    }

    impl ObjectStore for MockObjects {
        fn head(&self, bucket: &str, key: &str) -> ProbeOutcome {
            self.calls
                .lock()
                .unwrap()
                .push((bucket.to_string(), key.to_string()));
            if key.contains("missing") {
                ProbeOutcome::NotFound
            } else if key.contains("denied") {
                ProbeOutcome::Failed("status 403".to_string())
            } else {
                ProbeOutcome::Exists
            }
        }
    }

    fn checker() -> AssetChecker<MockObjects> {
        AssetChecker::new(MockObjects::default(), &ObjectStorageConfig::default()).unwrap()
    }

    #[test]
    fn locate_splits_bucket_and_key() {
        let checker = checker();
        let location = checker
            .locate("https://s3.amazonaws.com/janelia-flylight-imagery/Gen1/R10A06/a.h5j")
            .unwrap();
        assert_eq!(location.bucket, "janelia-flylight-imagery");
        assert_eq!(location.key, "Gen1/R10A06/a.h5j");
        assert!(checker.locate("no-slash").is_none());
    }

    #[test]
    fn urls_without_a_key_never_reach_storage() {
        let checker = checker();
        let mut cache = ExistenceCache::default();
        let references = vec![
            AssetReference::new("CDM", "https://s3.amazonaws.com/bucket-only"),
            AssetReference::new("CDM", "https://s3.amazonaws.com/bucket-only/"),
            AssetReference::new("CDM", "https://example.org/bucket/a.png"),
        ];
        let results = checker.check(&references, &mut cache);

        assert!(checker.store().calls.lock().unwrap().is_empty());
        assert!(
            results
                .iter()
                .all(|result| result.error_kind == AssetErrorKind::OtherError)
        );
        assert_eq!(
            results[0].rendered_key,
            "https://s3.amazonaws.com/bucket-only"
        );
        assert!(cache.is_empty());
    }

    #[test]
    fn plus_is_decoded_before_probing() {
        let checker = checker();
        let mut cache = ExistenceCache::default();
        let results = checker.check(
            &[AssetReference::new(
                "VisuallyLosslessStack",
                "https://s3.amazonaws.com/bucket/Gen1+MCFO/a.h5j",
            )],
            &mut cache,
        );
        assert!(results[0].found);
        assert_eq!(results[0].rendered_key, "Gen1+MCFO/a.h5j");
        let calls = checker.store().calls.lock().unwrap();
        assert_eq!(calls[0].1, "Gen1 MCFO/a.h5j");
    }

    #[test]
    fn outcomes_map_to_error_kinds_in_input_order() {
        let checker = checker();
        let mut cache = ExistenceCache::default();
        let references = vec![
            AssetReference::new("A", "https://s3.amazonaws.com/b/missing.png"),
            AssetReference::new("B", "https://s3.amazonaws.com/b/present.png"),
            AssetReference::new("C", "https://s3.amazonaws.com/b/denied.png"),
            AssetReference::new("D", "broken"),
        ];
        let results = checker.check(&references, &mut cache);
        let kinds: Vec<_> = results.iter().map(|result| result.error_kind).collect();
        assert_eq!(
            kinds,
            vec![
                AssetErrorKind::NotFound,
                AssetErrorKind::None,
                AssetErrorKind::OtherError,
                AssetErrorKind::OtherError,
            ]
        );
        assert_eq!(results[2].detail.as_deref(), Some("status 403"));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn cache_is_reused_across_batches() {
        let checker = checker();
        let mut cache = ExistenceCache::default();
        let reference = AssetReference::new("A", "https://s3.amazonaws.com/b/x.png");
        checker.check(std::slice::from_ref(&reference), &mut cache);
        let second = checker.check(std::slice::from_ref(&reference), &mut cache);
        assert!(second[0].repeated);
        assert!(second[0].found);
        assert_eq!(checker.store().calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn same_key_under_another_file_type_is_probed() {
        let checker = checker();
        let mut cache = ExistenceCache::default();
        checker.check(
            &[
                AssetReference::new("A", "https://s3.amazonaws.com/b/x.png"),
                AssetReference::new("B", "https://s3.amazonaws.com/b/x.png"),
            ],
            &mut cache,
        );
        assert_eq!(checker.store().calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn manifest_order_is_kept() {
        let record = json!({
            "uploaded": {
                "ZZ_Stack": "https://s3.amazonaws.com/b/stack.h5j",
                "AA_CDM": "https://s3.amazonaws.com/b/cdm.png",
                "MM_Thumbnail": "https://s3.amazonaws.com/b/thumb.jpg"
            }
        });
        let references = AssetReference::from_manifest(record.as_object().unwrap(), "uploaded");
        let file_types: Vec<&str> = references
            .iter()
            .map(|reference| reference.file_type.as_str())
            .collect();
        assert_eq!(file_types, vec!["ZZ_Stack", "AA_CDM", "MM_Thumbnail"]);

        let results = checker().check(&references, &mut ExistenceCache::default());
        let keys: Vec<&str> = results
            .iter()
            .map(|result| result.rendered_key.as_str())
            .collect();
        assert_eq!(keys, vec!["stack.h5j", "cdm.png", "thumb.jpg"]);
    }

    #[test]
    fn manifest_entries_become_references() {
        let record = json!({
            "files": {"CDM": "https://s3.amazonaws.com/b/cdm.png", "Empty": "", "Count": 3}
        });
        let references = AssetReference::from_manifest(record.as_object().unwrap(), "files");
        assert_eq!(
            references,
            vec![AssetReference::new("CDM", "https://s3.amazonaws.com/b/cdm.png")]
        );
    }
}
