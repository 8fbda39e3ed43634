use tracing::debug;

use crate::assets::AssetCheckResult;
use crate::domain::{KeyType, SearchKey};
use crate::pipeline::{Binding, Pipeline, SectionKind, Step};
use crate::report::{Row, Section};
use crate::store::Record;

/// How a single-valued finding is merged when several records offer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// The first candidate offered is kept, even if empty.
    FirstSeenWins,
    /// Empty candidates are ignored; the first non-empty one is kept.
    FirstNonEmptyWins,
}

impl MergePolicy {
    /// Offers `candidate` to `slot`. Returns true when the slot was filled.
    pub fn merge(self, slot: &mut Option<String>, candidate: Option<&str>) -> bool {
        if slot.is_some() {
            return false;
        }
        let accepted = match (self, candidate) {
            (_, None) => None,
            (MergePolicy::FirstSeenWins, Some(value)) => Some(value),
            (MergePolicy::FirstNonEmptyWins, Some(value)) => {
                Some(value).filter(|value| !value.is_empty())
            }
        };
        match accepted {
            Some(value) => {
                *slot = Some(value.to_string());
                true
            }
            None => false,
        }
    }
}

pub const RELEASE_POLICY: MergePolicy = MergePolicy::FirstNonEmptyWins;
pub const DISPLAY_KEY_POLICY: MergePolicy = MergePolicy::FirstNonEmptyWins;

/// Everything found so far for one lookup.
#[derive(Debug)]
pub struct ResolvedEntity {
    original: SearchKey,
    working_key: String,
    adopted_key: Option<String>,
    publishing_names: Vec<String>,
    release: Option<String>,
    sections: Vec<Section>,
    assets: Vec<AssetCheckResult>,
}

/// Owned contents of a finished [`ResolvedEntity`].
#[derive(Debug)]
pub struct EntityParts {
    pub key_type: KeyType,
    pub original_key: String,
    pub working_key: String,
    pub publishing_names: Vec<String>,
    pub release: Option<String>,
    pub sections: Vec<Section>,
    pub assets: Vec<AssetCheckResult>,
}

/// What one step may read, gathered through the bindings it declares.
/// Anything the step does not declare is left empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepInputs {
    pub key: Option<String>,
    pub publishing_names: Vec<String>,
    pub release: Option<String>,
}

impl StepInputs {
    pub fn key(&self) -> &str {
        self.key.as_deref().unwrap_or_default()
    }
}

impl ResolvedEntity {
    /// Starts with one empty section per section the pipeline declares.
    pub fn new(key: SearchKey, pipeline: &Pipeline) -> Self {
        let sections = pipeline
            .sections()
            .iter()
            .map(|kind| Section::new(*kind, key.key_type()))
            .collect();
        Self {
            working_key: key.value().to_string(),
            original: key,
            adopted_key: None,
            publishing_names: Vec::new(),
            release: None,
            sections,
            assets: Vec::new(),
        }
    }

    pub fn original(&self) -> &SearchKey {
        &self.original
    }

    pub fn key_type(&self) -> KeyType {
        self.original.key_type()
    }

    pub fn working_key(&self) -> &str {
        &self.working_key
    }

    pub fn publishing_names(&self) -> &[String] {
        &self.publishing_names
    }

    pub fn release(&self) -> Option<&str> {
        self.release.as_deref()
    }

    pub fn assets(&self) -> &[AssetCheckResult] {
        &self.assets
    }

    pub fn inputs_for(&self, step: Step) -> StepInputs {
        let mut inputs = StepInputs::default();
        for binding in step.inputs() {
            match binding {
                Binding::OriginalKey => inputs.key = Some(self.original.value().to_string()),
                Binding::WorkingKey => inputs.key = Some(self.working_key.clone()),
                Binding::PublishingNames => {
                    inputs.publishing_names = self.publishing_names.clone()
                }
                Binding::Release => inputs.release = self.release.clone(),
            }
        }
        inputs
    }

    /// Replaces the key later steps search with.
    pub fn substitute_working_key(&mut self, key: &str) {
        debug!(from = %self.working_key, to = key, "substituting working key");
        self.working_key = key.to_string();
    }

    /// Offers a canonical display key discovered in a store. Only the first
    /// non-empty candidate is adopted, and it becomes the working key.
    pub fn adopt_display_key(&mut self, candidate: Option<&str>) -> bool {
        if DISPLAY_KEY_POLICY.merge(&mut self.adopted_key, candidate) {
            let adopted = self.adopted_key.clone().unwrap_or_default();
            self.substitute_working_key(&adopted);
            return true;
        }
        false
    }

    pub fn adopt_release(&mut self, candidate: Option<&str>) -> bool {
        RELEASE_POLICY.merge(&mut self.release, candidate)
    }

    /// Records a publishing name once, keeping first-seen order.
    pub fn add_publishing_name(&mut self, name: &str) -> bool {
        if name.is_empty() || self.publishing_names.iter().any(|seen| seen == name) {
            return false;
        }
        self.publishing_names.push(name.to_string());
        true
    }

    pub fn section(&self, kind: SectionKind) -> Option<&Section> {
        self.sections.iter().find(|section| section.kind == kind)
    }

    /// Sections the pipeline did not declare are not reachable.
    pub fn section_mut(&mut self, kind: SectionKind) -> Option<&mut Section> {
        self.sections.iter_mut().find(|section| section.kind == kind)
    }

    pub fn set_source(&mut self, kind: SectionKind, source: &str) {
        if let Some(section) = self.section_mut(kind) {
            section.source = Some(source.to_string());
        }
    }

    pub fn push_record(&mut self, kind: SectionKind, record: &Record) {
        if let Some(section) = self.section_mut(kind) {
            section.push_record(record);
        }
    }

    pub fn push_row(&mut self, kind: SectionKind, row: Row) {
        if let Some(section) = self.section_mut(kind) {
            section.rows.push(row);
        }
    }

    pub fn push_assets(&mut self, kind: SectionKind, results: Vec<AssetCheckResult>) {
        if let Some(section) = self.section_mut(kind) {
            section.push_assets(&results);
        }
        self.assets.extend(results);
    }

    pub fn into_parts(self) -> EntityParts {
        EntityParts {
            key_type: self.original.key_type(),
            original_key: self.original.value().to_string(),
            working_key: self.working_key,
            publishing_names: self.publishing_names,
            release: self.release,
            sections: self.sections,
            assets: self.assets,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::domain::normalize;

    fn entity(key: &str, key_type: KeyType) -> ResolvedEntity {
        let key = normalize(key, key_type).unwrap();
        let pipeline = Pipeline::for_key_type(key_type);
        ResolvedEntity::new(key, &pipeline)
    }

    #[test]
    fn first_seen_keeps_empty_values() {
        let mut slot = None;
        assert!(MergePolicy::FirstSeenWins.merge(&mut slot, Some("")));
        assert!(!MergePolicy::FirstSeenWins.merge(&mut slot, Some("RELEASE_2024_01")));
        assert_eq!(slot.as_deref(), Some(""));
    }

    #[test]
    fn first_non_empty_skips_blanks() {
        let mut slot = None;
        assert!(!MergePolicy::FirstNonEmptyWins.merge(&mut slot, Some("")));
        assert!(!MergePolicy::FirstNonEmptyWins.merge(&mut slot, None));
        assert!(MergePolicy::FirstNonEmptyWins.merge(&mut slot, Some("RELEASE_2024_01")));
        assert!(!MergePolicy::FirstNonEmptyWins.merge(&mut slot, Some("RELEASE_2023_06")));
        assert_eq!(slot.as_deref(), Some("RELEASE_2024_01"));
    }

    #[test]
    fn publishing_names_are_a_set_in_insertion_order() {
        let mut entity = entity("5813105172", KeyType::BodyId);
        entity.add_publishing_name("hemibrain:v1.2.1:5813105172");
        entity.add_publishing_name("manc:v1.0:5813105172");
        entity.add_publishing_name("hemibrain:v1.2.1:5813105172");
        entity.add_publishing_name("");
        assert_eq!(
            entity.publishing_names(),
            ["hemibrain:v1.2.1:5813105172", "manc:v1.0:5813105172"]
        );
    }

    #[test]
    fn display_key_is_adopted_once() {
        let mut entity = entity("jrc_ss12345", KeyType::PublishingName);
        assert!(!entity.adopt_display_key(Some("")));
        assert!(entity.adopt_display_key(Some("JRC_SS12345")));
        assert!(!entity.adopt_display_key(Some("JRC_SS99999")));
        assert_eq!(entity.working_key(), "JRC_SS12345");
        assert_eq!(entity.original().value(), "jrc_ss12345");
    }

    #[test]
    fn steps_see_only_declared_bindings() {
        let mut entity = entity("20171212_61_c1", KeyType::SlideCode);
        entity.adopt_release(Some("RELEASE_2024_01"));
        entity.add_publishing_name("JRC_SS12345");
        entity.substitute_working_key("20171212_61_C9");

        let images = entity.inputs_for(Step::PublishedImages);
        assert_eq!(images.key(), "20171212_61_C9");
        assert_eq!(images.release.as_deref(), Some("RELEASE_2024_01"));
        assert!(images.publishing_names.is_empty());

        let urls = entity.inputs_for(Step::PublishedUrls);
        assert_eq!(urls.release, None);

        let annotations = entity.inputs_for(Step::CustomAnnotations);
        assert_eq!(annotations.key(), "20171212_61_C1");

        let dois = entity.inputs_for(Step::Dois);
        assert_eq!(dois.key, None);
        assert_eq!(dois.publishing_names, vec!["JRC_SS12345"]);
    }

    #[test]
    fn undeclared_sections_are_ignored() {
        let mut entity = entity("5813105172", KeyType::BodyId);
        entity.push_record(SectionKind::Samples, json!({"_id": 1}).as_object().unwrap());
        assert!(entity.section(SectionKind::Samples).is_none());
        assert_eq!(entity.into_parts().sections.len(), 7);
    }
}
