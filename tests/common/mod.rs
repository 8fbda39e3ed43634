#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};

use neuron_search::config::Config;
use neuron_search::error::StoreError;
use neuron_search::fixtures::FixtureStore;
use neuron_search::resolver::{ProgressEvent, ProgressSink, Resolver};
use neuron_search::s3::{ObjectStore, ProbeOutcome};
use neuron_search::store::{DocumentStore, KeyCondition, Predicate, Record, WideColumnStore};

/// Fixture store that records every call and can fail one collection or table.
#[derive(Default)]
pub struct RecordingStore {
    inner: FixtureStore,
    failing: Option<String>,
    pub finds: Mutex<Vec<(String, Predicate)>>,
    pub queries: Mutex<Vec<(String, KeyCondition, Option<KeyCondition>)>>,
    pub gets: Mutex<Vec<(String, KeyCondition)>>,
}

impl RecordingStore {
    pub fn new(inner: FixtureStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    pub fn failing_on(mut self, name: &str) -> Self {
        self.failing = Some(name.to_string());
        self
    }

    fn guard(&self, name: &str) -> Result<(), StoreError> {
        match &self.failing {
            Some(failing) if failing == name => {
                Err(StoreError::Http("connection reset by peer".to_string()))
            }
            _ => Ok(()),
        }
    }

    pub fn predicates_for(&self, name: &str) -> Vec<Predicate> {
        self.finds
            .lock()
            .unwrap()
            .iter()
            .filter(|(collection, _)| collection == name)
            .map(|(_, predicate)| predicate.clone())
            .collect()
    }

    pub fn query_count(&self, name: &str) -> usize {
        self.queries_for(name).len()
    }

    pub fn queries_for(&self, name: &str) -> Vec<(KeyCondition, Option<KeyCondition>)> {
        self.queries
            .lock()
            .unwrap()
            .iter()
            .filter(|(table, _, _)| table == name)
            .map(|(_, partition, sort)| (partition.clone(), sort.clone()))
            .collect()
    }

    pub fn gets_for(&self, name: &str) -> Vec<KeyCondition> {
        self.gets
            .lock()
            .unwrap()
            .iter()
            .filter(|(table, _)| table == name)
            .map(|(_, key)| key.clone())
            .collect()
    }
}

impl DocumentStore for RecordingStore {
    fn find(&self, collection: &str, predicate: &Predicate) -> Result<Vec<Record>, StoreError> {
        self.finds
            .lock()
            .unwrap()
            .push((collection.to_string(), predicate.clone()));
        self.guard(collection)?;
        DocumentStore::find(&self.inner, collection, predicate)
    }
}

impl WideColumnStore for RecordingStore {
    fn find(&self, table: &str, predicate: &Predicate) -> Result<Vec<Record>, StoreError> {
        self.finds
            .lock()
            .unwrap()
            .push((table.to_string(), predicate.clone()));
        self.guard(table)?;
        WideColumnStore::find(&self.inner, table, predicate)
    }

    fn get_item(&self, table: &str, key: &KeyCondition) -> Result<Option<Record>, StoreError> {
        self.gets
            .lock()
            .unwrap()
            .push((table.to_string(), key.clone()));
        self.guard(table)?;
        self.inner.get_item(table, key)
    }

    fn query(
        &self,
        table: &str,
        partition: &KeyCondition,
        sort: Option<&KeyCondition>,
    ) -> Result<Vec<Record>, StoreError> {
        self.queries
            .lock()
            .unwrap()
            .push((table.to_string(), partition.clone(), sort.cloned()));
        self.guard(table)?;
        self.inner.query(table, partition, sort)
    }

    fn distinct(&self, table: &str, field: &str) -> Result<Vec<String>, StoreError> {
        self.guard(table)?;
        self.inner.distinct(table, field)
    }
}

/// Object store where everything exists unless listed as missing.
#[derive(Default)]
pub struct MockObjects {
    missing: HashSet<String>,
    pub calls: Mutex<Vec<(String, String)>>,
}

impl MockObjects {
    pub fn missing(keys: &[&str]) -> Self {
        Self {
            missing: keys.iter().map(|key| key.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl ObjectStore for MockObjects {
    fn head(&self, bucket: &str, key: &str) -> ProbeOutcome {
        self.calls
            .lock()
            .unwrap()
            .push((bucket.to_string(), key.to_string()));
        if self.missing.contains(key) {
            ProbeOutcome::NotFound
        } else {
            ProbeOutcome::Exists
        }
    }
}

#[derive(Default)]
pub struct CollectingSink {
    pub messages: Mutex<Vec<String>>,
}

impl ProgressSink for CollectingSink {
    fn event(&self, event: ProgressEvent) {
        self.messages.lock().unwrap().push(event.message);
    }
}

pub type TestResolver = Resolver<Arc<RecordingStore>, Arc<RecordingStore>, Arc<MockObjects>>;

pub fn resolver(
    store: RecordingStore,
    objects: MockObjects,
) -> (TestResolver, Arc<RecordingStore>, Arc<MockObjects>) {
    let store = Arc::new(store);
    let objects = Arc::new(objects);
    let resolver = Resolver::new(
        Arc::clone(&store),
        Arc::clone(&store),
        Arc::clone(&objects),
        Config::default(),
    )
    .unwrap();
    (resolver, store, objects)
}

/// A split line with one sample, two metadata rows, one published URL, one
/// published image and a DOI.
pub fn split_line_fixture() -> FixtureStore {
    FixtureStore::default()
        .with_documents(
            "sample",
            vec![json!({
                "_id": 2711777430u64,
                "slideCode": "20171212_61_C1",
                "line": "JRC_SS12345",
                "publishingName": "JRC_SS12345",
                "gender": "f",
                "dataSet": "flylight_split_screen",
                "releaseLabel": "Split-GAL4 Omnibus",
                "status": "Complete"
            })],
        )
        .with_items("neuronMetadata", vec![metadata("m1"), metadata("m2")])
        .with_items(
            "publishedURL",
            vec![json!({
                "sampleRef": "Sample#2711777430",
                "mipId": "m1",
                "alignmentSpace": "JRC2018_Unisex_20x_HR",
                "slideCode": "20171212_61_C1",
                "publishedName": "JRC_SS12345",
                "objective": "40x",
                "alpsRelease": "RELEASE_2024_01"
            })],
        )
        .with_items(
            "publishedLMImage",
            vec![json!({
                "name": "JRC_SS12345",
                "sampleRef": "Sample#2711777430",
                "slideCode": "20171212_61_C1",
                "area": "Brain",
                "tile": "brain",
                "objective": "40x",
                "alignmentSpace": "JRC2018_Unisex_20x_HR",
                "releaseName": "RELEASE_2024_01",
                "files": {"VisuallyLosslessStack": ""}
            })],
        )
        .with_items(
            "janelia-neuronbridge-publishing-doi",
            vec![json!({
                "name": "JRC_SS12345",
                "doi": [{
                    "citation": "Meissner et al. 2023",
                    "link": "https://doi.org/10.7554/eLife.80660"
                }]
            })],
        )
}

fn metadata(mip_id: &str) -> Value {
    json!({
        "sourceRefId": "Sample#2711777430",
        "mipId": mip_id,
        "alignmentSpace": "JRC2018_Unisex_20x_HR",
        "slideCode": "20171212_61_C1",
        "publishedName": "JRC_SS12345",
        "anatomicalArea": "Brain",
        "objective": "40x",
        "gender": "f",
        "datasetLabels": ["A", "B"]
    })
}
