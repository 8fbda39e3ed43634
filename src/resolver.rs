use std::collections::HashSet;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, info};

use crate::assets::{AssetChecker, AssetReference, ExistenceCache};
use crate::config::Config;
use crate::domain::{KeyType, SearchKey};
use crate::entity::{DISPLAY_KEY_POLICY, ResolvedEntity, StepInputs};
use crate::error::{LookupError, StoreError};
use crate::pipeline::{Pipeline, SectionKind, Step};
use crate::query;
use crate::report::{Cell, Flag, Report, Row, field_text};
use crate::s3::ObjectStore;
use crate::store::{DocumentStore, KeyCondition, Predicate, Record, WideColumnStore};
use crate::version::VersionResolver;

const SEARCH_STRING: &str = "searchString";
const ALIGNED_STACK: &str = "VisuallyLosslessStack";

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Sink that drops every event.
pub struct Quiet;

impl ProgressSink for Quiet {
    fn event(&self, _event: ProgressEvent) {}
}

/// Resolves one key against every store and assembles the report.
///
/// Store handles are injected at construction and only read. Each call to
/// [`Resolver::resolve`] owns its own accumulator and existence cache.
pub struct Resolver<D: DocumentStore, W: WideColumnStore, O: ObjectStore> {
    documents: D,
    tables: W,
    checker: AssetChecker<O>,
    config: Config,
}

impl<D: DocumentStore, W: WideColumnStore, O: ObjectStore> Resolver<D, W, O> {
    pub fn new(documents: D, tables: W, objects: O, config: Config) -> Result<Self, LookupError> {
        let checker = AssetChecker::new(objects, &config.object_storage)?;
        Ok(Self {
            documents,
            tables,
            checker,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn versions(&self) -> VersionResolver<'_, W> {
        VersionResolver::new(&self.tables, &self.config.tables.version_catalog)
    }

    /// Entry point: validates `(key, key_type)` and runs the lookup.
    pub fn resolve(&self, key: &str, key_type: &str) -> Result<Report, LookupError> {
        self.resolve_with_progress(key, key_type, &Quiet)
    }

    pub fn resolve_with_progress(
        &self,
        key: &str,
        key_type: &str,
        sink: &dyn ProgressSink,
    ) -> Result<Report, LookupError> {
        let key_type: KeyType = key_type.parse()?;
        let key = SearchKey::normalize(key, key_type)?;
        self.resolve_key(key, sink)
    }

    pub fn resolve_key(
        &self,
        key: SearchKey,
        sink: &dyn ProgressSink,
    ) -> Result<Report, LookupError> {
        let pipeline = Pipeline::for_key_type(key.key_type());
        info!(key = key.value(), key_type = %key.key_type(), "resolving");
        let mut entity = ResolvedEntity::new(key, &pipeline);
        let mut cache = ExistenceCache::default();

        for step in pipeline.steps() {
            let started = Instant::now();
            self.run_step(*step, &mut entity, &mut cache)
                .map_err(|source| LookupError::Store {
                    step: *step,
                    key_type: entity.key_type(),
                    key: entity.working_key().to_string(),
                    source,
                })?;
            let rows: usize = step
                .sections()
                .iter()
                .filter_map(|kind| entity.section(*kind))
                .map(|section| section.rows.len())
                .sum();
            sink.event(ProgressEvent {
                message: format!("phase=Stage{}; {step} returned {rows} rows", step.stage()),
                elapsed: Some(started.elapsed()),
            });
        }

        debug!(
            probes = cache.len(),
            publishing_names = entity.publishing_names().len(),
            "lookup finished"
        );
        Ok(Report::assemble(entity))
    }

    fn run_step(
        &self,
        step: Step,
        entity: &mut ResolvedEntity,
        cache: &mut ExistenceCache,
    ) -> Result<(), StoreError> {
        let inputs = entity.inputs_for(step);
        match step {
            Step::PublishedVersioned => self.published_versioned(&inputs, entity),
            Step::Samples => self.samples(&inputs, entity),
            Step::Images => self.images(&inputs, entity),
            Step::EmBodies => self.em_bodies(&inputs, entity),
            Step::NeuronMetadata => self.neuron_metadata(&inputs, entity),
            Step::PublishedUrls => self.published_urls(&inputs, entity, cache),
            Step::PublishedImages => self.published_images(&inputs, entity, cache),
            Step::Skeletons => self.skeletons(&inputs, entity),
            Step::CustomAnnotations => self.custom_annotations(&inputs, entity),
            Step::Dois => self.dois(&inputs, entity),
        }
    }

    fn find_documents(
        &self,
        collection: &str,
        predicate: Option<Predicate>,
    ) -> Result<Vec<Record>, StoreError> {
        let Some(predicate) = predicate else {
            return Ok(Vec::new());
        };
        let rows = self.documents.find(collection, &predicate)?;
        debug!(collection, field = predicate.field(), rows = rows.len(), "document query");
        Ok(rows)
    }

    fn find_items(
        &self,
        table: &str,
        predicate: Option<Predicate>,
    ) -> Result<Vec<Record>, StoreError> {
        let Some(predicate) = predicate else {
            return Ok(Vec::new());
        };
        let rows = self.tables.find(table, &predicate)?;
        debug!(table, field = predicate.field(), rows = rows.len(), "table query");
        Ok(rows)
    }

    fn published_versioned(
        &self,
        inputs: &StepInputs,
        entity: &mut ResolvedEntity,
    ) -> Result<(), StoreError> {
        let version = self.versions().resolve("")?;
        if version.is_empty() {
            debug!("version catalog is empty, skipping published lookup");
            return Ok(());
        }
        let table = self.config.tables.published_versioned(&version);
        let search_key = query::versioned_search_key(inputs.key());
        let rows = self.tables.query(
            &table,
            &KeyCondition::new("itemType", SEARCH_STRING),
            Some(&KeyCondition::new("searchKey", search_key)),
        )?;
        entity.set_source(SectionKind::PublishedVersioned, &table);

        let mut name = None;
        for row in &rows {
            let row_name = field_text(row, "name");
            DISPLAY_KEY_POLICY.merge(&mut name, Some(row_name.as_str()));
            let body_ids: Vec<String> = match row.get("bodyIDs") {
                Some(Value::Array(ids)) => ids.iter().map(value_string).collect(),
                Some(other) => vec![value_string(other)],
                None => Vec::new(),
            };
            for body_id in body_ids {
                entity.push_row(
                    SectionKind::PublishedVersioned,
                    Row::new(vec![Cell::text(row_name.clone()), Cell::text(body_id)]),
                );
            }
        }
        if let Some(name) = name {
            entity.substitute_working_key(&name);
        }
        Ok(())
    }

    fn samples(&self, inputs: &StepInputs, entity: &mut ResolvedEntity) -> Result<(), StoreError> {
        let collection = &self.config.tables.sample;
        let rows = self.find_documents(
            collection,
            query::sample_filter(entity.key_type(), inputs.key()),
        )?;
        entity.set_source(SectionKind::Samples, collection);
        let mut discovered = None;
        for row in &rows {
            entity.push_record(SectionKind::Samples, row);
            let name = field_text(row, "publishingName");
            DISPLAY_KEY_POLICY.merge(&mut discovered, Some(name.as_str()));
        }
        if entity.key_type() == KeyType::PublishingName {
            entity.adopt_display_key(discovered.as_deref());
        }
        Ok(())
    }

    fn images(&self, inputs: &StepInputs, entity: &mut ResolvedEntity) -> Result<(), StoreError> {
        let collection = &self.config.tables.image;
        let rows = self.find_documents(
            collection,
            query::image_filter(entity.key_type(), inputs.key()),
        )?;
        entity.set_source(SectionKind::Images, collection);
        for mut row in rows {
            if let Some(Value::String(reference)) = row.get("sampleRef") {
                let stripped = query::strip_sample_ref(reference).to_string();
                row.insert("sampleRef".to_string(), Value::String(stripped));
            }
            entity.push_record(SectionKind::Images, &row);
        }
        Ok(())
    }

    fn em_bodies(
        &self,
        inputs: &StepInputs,
        entity: &mut ResolvedEntity,
    ) -> Result<(), StoreError> {
        let collection = &self.config.tables.em_body;
        let rows = self.find_documents(
            collection,
            query::em_body_filter(entity.key_type(), inputs.key()),
        )?;
        entity.set_source(SectionKind::EmBodies, collection);
        for row in &rows {
            entity.push_record(SectionKind::EmBodies, row);
        }
        Ok(())
    }

    fn neuron_metadata(
        &self,
        inputs: &StepInputs,
        entity: &mut ResolvedEntity,
    ) -> Result<(), StoreError> {
        let table = &self.config.tables.neuron_metadata;
        let rows = self.find_items(
            table,
            query::neuron_metadata_filter(entity.key_type(), inputs.key()),
        )?;
        entity.set_source(SectionKind::NeuronMetadata, table);
        for row in &rows {
            entity.push_record(SectionKind::NeuronMetadata, row);
        }
        Ok(())
    }

    fn published_urls(
        &self,
        inputs: &StepInputs,
        entity: &mut ResolvedEntity,
        cache: &mut ExistenceCache,
    ) -> Result<(), StoreError> {
        let table = &self.config.tables.published_url;
        let rows = self.find_items(
            table,
            query::published_url_filter(entity.key_type(), inputs.key()),
        )?;
        entity.set_source(SectionKind::PublishedUrls, table);
        entity.set_source(SectionKind::PublishedUrlAssets, table);

        let mut references = Vec::new();
        for row in &rows {
            entity.push_record(SectionKind::PublishedUrls, row);
            entity.adopt_release(row.get("alpsRelease").and_then(Value::as_str));
            entity.add_publishing_name(&field_text(row, "publishedName"));
            references.extend(AssetReference::from_manifest(row, "uploaded"));
        }
        if !references.is_empty() {
            let results = self.checker.check(&references, cache);
            entity.push_assets(SectionKind::PublishedUrlAssets, results);
        }
        Ok(())
    }

    fn published_images(
        &self,
        inputs: &StepInputs,
        entity: &mut ResolvedEntity,
        cache: &mut ExistenceCache,
    ) -> Result<(), StoreError> {
        let table = &self.config.tables.published_image;
        let rows = self.find_items(
            table,
            query::published_image_filter(entity.key_type(), inputs.key()),
        )?;
        entity.set_source(SectionKind::PublishedImages, table);
        entity.set_source(SectionKind::PublishedImageAssets, table);

        // A publishing name can span releases, so only narrower keys are
        // checked against the resolved release.
        let release = match entity.key_type() {
            KeyType::PublishingName => None,
            _ => inputs.release.clone(),
        };
        let columns = entity
            .section(SectionKind::PublishedImages)
            .map(|section| section.columns.clone())
            .unwrap_or_default();

        let mut references = Vec::new();
        let mut stack_keys: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for row in &rows {
            let cells = columns
                .iter()
                .map(|column| match column.as_str() {
                    "alignment" => Cell::text(if has_aligned_stack(row) { "Yes" } else { "No" }),
                    "releaseName" => {
                        let value = field_text(row, "releaseName");
                        match &release {
                            Some(release) if *release != value => {
                                Cell::flagged(value, Flag::ReleaseMismatch)
                            }
                            _ => Cell::text(value),
                        }
                    }
                    "sampleRef" => {
                        Cell::text(query::strip_sample_ref(&field_text(row, "sampleRef")))
                    }
                    other => Cell::text(field_text(row, other)),
                })
                .collect();
            entity.push_row(SectionKind::PublishedImages, Row::new(cells));
            references.extend(AssetReference::from_manifest(row, "files"));

            let item_type = query::stack_item_type(
                &field_text(row, "slideCode"),
                &field_text(row, "objective"),
                &field_text(row, "alignmentSpace"),
            );
            if seen.insert(item_type.clone()) {
                stack_keys.push(item_type);
            }
        }

        if !references.is_empty() {
            let results = self.checker.check(&references, cache);
            entity.push_assets(SectionKind::PublishedImageAssets, results);
        }

        let stacks = &self.config.tables.published_stacks;
        entity.set_source(SectionKind::PublishedStacks, stacks);
        for item_type in stack_keys {
            let items = self
                .tables
                .query(stacks, &KeyCondition::new("itemType", item_type.clone()), None)?;
            let Some(release) = items.first().map(|item| field_text(item, "releaseName")) else {
                continue;
            };
            if release.is_empty() {
                continue;
            }
            entity.push_row(
                SectionKind::PublishedStacks,
                Row::new(vec![Cell::text(item_type), Cell::text(release)]),
            );
        }
        Ok(())
    }

    fn skeletons(
        &self,
        inputs: &StepInputs,
        entity: &mut ResolvedEntity,
    ) -> Result<(), StoreError> {
        let table = &self.config.tables.published_skeletons;
        let Some(name) = inputs.publishing_names.first().cloned() else {
            debug!("no publishing name discovered, skipping skeletons");
            return Ok(());
        };
        let items = self
            .tables
            .query(table, &KeyCondition::new("publishedName", name), None)?;
        entity.set_source(SectionKind::Skeletons, table);
        let Some(item) = items.into_iter().next() else {
            return Ok(());
        };
        for (attribute, value) in &item {
            let text = value_string(value);
            let cell = if attribute.starts_with("skeleton") && !text.is_empty() {
                Cell::link(&text, &abbreviate_url(&text, &self.config.object_storage.url_prefix))
            } else {
                Cell::text(text)
            };
            entity.push_row(
                SectionKind::Skeletons,
                Row::new(vec![Cell::text(attribute.clone()), cell]),
            );
        }
        Ok(())
    }

    fn custom_annotations(
        &self,
        inputs: &StepInputs,
        entity: &mut ResolvedEntity,
    ) -> Result<(), StoreError> {
        let table = &self.config.tables.custom_annotations;
        let search_key = inputs.key().to_lowercase();
        let items = self.tables.query(
            table,
            &KeyCondition::new("entryType", SEARCH_STRING),
            Some(&KeyCondition::new("searchKey", search_key)),
        )?;
        entity.set_source(SectionKind::CustomAnnotations, table);
        let Some(item) = items.into_iter().next() else {
            return Ok(());
        };
        let Some(Value::Array(matches)) = item.get("matches") else {
            return Ok(());
        };
        for found in matches {
            if let Value::Object(found) = found {
                entity.push_record(SectionKind::CustomAnnotations, found);
            }
        }
        Ok(())
    }

    fn dois(&self, inputs: &StepInputs, entity: &mut ResolvedEntity) -> Result<(), StoreError> {
        let table = &self.config.tables.publishing_doi;
        if inputs.publishing_names.is_empty() {
            return Ok(());
        }
        entity.set_source(SectionKind::Dois, table);
        for name in &inputs.publishing_names {
            let Some(item) = self.tables.get_item(table, &KeyCondition::new("name", name))? else {
                continue;
            };
            let doi = item
                .get("doi")
                .and_then(Value::as_array)
                .and_then(|entries| entries.first())
                .and_then(Value::as_object);
            let citation = doi.map(|doi| field_text(doi, "citation")).unwrap_or_default();
            let link = doi.map(|doi| field_text(doi, "link")).unwrap_or_default();
            let link = if link.is_empty() {
                Cell::text("")
            } else {
                Cell::link(&link, &link)
            };
            entity.push_row(
                SectionKind::Dois,
                Row::new(vec![
                    Cell::text(field_text(&item, "name")),
                    Cell::text(citation),
                    link,
                ]),
            );
        }
        Ok(())
    }
}

fn has_aligned_stack(row: &Record) -> bool {
    row.get("files")
        .and_then(Value::as_object)
        .map(|files| files.contains_key(ALIGNED_STACK))
        .unwrap_or(false)
}

fn value_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Drops the storage endpoint and bucket from an asset URL for display.
fn abbreviate_url(url: &str, prefix: &str) -> String {
    url.strip_prefix(prefix)
        .and_then(|rest| rest.split_once('/'))
        .map(|(_, key)| key.to_string())
        .unwrap_or_else(|| url.to_string())
}
