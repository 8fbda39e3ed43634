//! Query shapes per key type and collection.
//!
//! `None` means the collection is not searched for that key type.

use serde_json::Value;

use crate::domain::KeyType;
use crate::store::Predicate;

const SAMPLE_REF_PREFIX: &str = "Sample#";

pub fn sample_ref(id: &str) -> String {
    format!("{SAMPLE_REF_PREFIX}{id}")
}

/// Drops the `Sample#` prefix used by references to samples.
pub fn strip_sample_ref(reference: &str) -> &str {
    reference
        .strip_prefix(SAMPLE_REF_PREFIX)
        .unwrap_or(reference)
}

fn numeric_id(id: &str) -> Value {
    id.parse::<u64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::from(id))
}

pub fn sample_filter(key_type: KeyType, key: &str) -> Option<Predicate> {
    match key_type {
        KeyType::PublishingName => Some(Predicate::equals_ignore_case("publishingName", key)),
        KeyType::SampleId => Some(Predicate::equals("_id", numeric_id(key))),
        KeyType::SlideCode => Some(Predicate::equals("slideCode", key)),
        _ => None,
    }
}

pub fn image_filter(key_type: KeyType, key: &str) -> Option<Predicate> {
    match key_type {
        KeyType::PublishingName => Some(Predicate::equals_ignore_case("publishingName", key)),
        KeyType::SampleId => Some(Predicate::equals("sampleRef", sample_ref(key))),
        KeyType::SlideCode => Some(Predicate::equals("slideCode", key)),
        _ => None,
    }
}

pub fn em_body_filter(key_type: KeyType, key: &str) -> Option<Predicate> {
    match key_type {
        KeyType::BodyId => Some(Predicate::equals("name", key)),
        KeyType::NeuronType => Some(Predicate::equals("neuronType", key)),
        KeyType::NeuronInstance => Some(Predicate::equals("neuronInstance", key)),
        _ => None,
    }
}

pub fn neuron_metadata_filter(key_type: KeyType, key: &str) -> Option<Predicate> {
    Some(match key_type {
        KeyType::PublishingName => Predicate::equals_ignore_case("publishedName", key),
        KeyType::SampleId => Predicate::equals("sourceRefId", sample_ref(key)),
        KeyType::SlideCode => Predicate::equals("slideCode", key),
        KeyType::NeuronType => Predicate::equals("neuronType", key),
        KeyType::NeuronInstance => Predicate::equals("neuronInstance", key),
        KeyType::BodyId => Predicate::equals("publishedName", key),
    })
}

/// Published names of EM bodies carry a dataset prefix, so body IDs match
/// on the `:<id>` suffix.
pub fn published_url_filter(key_type: KeyType, key: &str) -> Option<Predicate> {
    match key_type {
        KeyType::PublishingName => Some(Predicate::equals_ignore_case("publishedName", key)),
        KeyType::SampleId => Some(Predicate::equals("sampleRef", sample_ref(key))),
        KeyType::SlideCode => Some(Predicate::equals("slideCode", key)),
        KeyType::BodyId => Some(Predicate::ends_with("publishedName", &format!(":{key}"))),
        KeyType::NeuronType | KeyType::NeuronInstance => None,
    }
}

pub fn published_image_filter(key_type: KeyType, key: &str) -> Option<Predicate> {
    match key_type {
        KeyType::PublishingName => Some(Predicate::equals("name", key)),
        KeyType::SampleId => Some(Predicate::equals("sampleRef", sample_ref(key))),
        KeyType::SlideCode => Some(Predicate::equals("slideCode", key)),
        _ => None,
    }
}

/// Sort key for the versioned published table: the lower-cased key after
/// its last `:`.
pub fn versioned_search_key(key: &str) -> String {
    let lowered = key.to_lowercase();
    lowered
        .rsplit(':')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Partition key of the published-stacks table for one image.
pub fn stack_item_type(slide_code: &str, objective: &str, alignment_space: &str) -> String {
    [slide_code, objective, alignment_space]
        .join("-")
        .to_lowercase()
}
