//! Store-agnostic report: ordered sections of plain rows.
//!
//! Nothing here carries presentation markup. Links and warnings are typed
//! cells that a renderer decides how to show.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::assets::{AssetCheckResult, AssetErrorKind};
use crate::domain::{Family, KeyType};
use crate::entity::ResolvedEntity;
use crate::pipeline::SectionKind;
use crate::store::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Flag {
    /// The row belongs to a different release than the one resolved.
    ReleaseMismatch,
    AssetMissing,
    AssetError,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Cell {
    Text { value: String },
    Link { url: String, label: String },
    Flagged { value: String, flag: Flag },
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text {
            value: value.into(),
        }
    }

    pub fn link(url: &str, label: &str) -> Self {
        Cell::Link {
            url: url.to_string(),
            label: label.to_string(),
        }
    }

    pub fn flagged(value: impl Into<String>, flag: Flag) -> Self {
        Cell::Flagged {
            value: value.into(),
            flag,
        }
    }

    /// The cell's display text, without link targets or flags.
    pub fn value(&self) -> &str {
        match self {
            Cell::Text { value } | Cell::Flagged { value, .. } => value,
            Cell::Link { label, .. } => label,
        }
    }

    pub fn flag(&self) -> Option<Flag> {
        match self {
            Cell::Flagged { flag, .. } => Some(*flag),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Row {
    pub cells: Vec<Cell>,
}

impl Row {
    pub fn new(cells: Vec<Cell>) -> Self {
        Self { cells }
    }

    pub fn values(&self) -> Vec<&str> {
        self.cells.iter().map(Cell::value).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Alert {
    /// Some referenced files were not found in object storage.
    AssetsMissing,
    /// Some existence probes failed for other reasons.
    AssetErrors,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub kind: SectionKind,
    pub title: String,
    /// Collection or table the rows came from, once the step has run.
    pub source: Option<String>,
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub alerts: Vec<Alert>,
}

impl Section {
    pub fn new(kind: SectionKind, key_type: KeyType) -> Self {
        Self {
            kind,
            title: kind.label().to_string(),
            source: None,
            columns: columns_for(kind, key_type)
                .into_iter()
                .map(str::to_string)
                .collect(),
            rows: Vec::new(),
            alerts: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn push_record(&mut self, record: &Record) {
        let cells = self
            .columns
            .iter()
            .map(|column| Cell::text(field_text(record, column)))
            .collect();
        self.rows.push(Row::new(cells));
    }

    pub fn push_assets(&mut self, results: &[AssetCheckResult]) {
        for result in results {
            let key = match result.error_kind {
                AssetErrorKind::None => Cell::link(&result.url, &result.rendered_key),
                AssetErrorKind::NotFound => {
                    Cell::flagged(result.rendered_key.clone(), Flag::AssetMissing)
                }
                AssetErrorKind::OtherError => {
                    let detail = result.detail.as_deref().unwrap_or_default();
                    Cell::flagged(
                        format!("{} {detail}", result.rendered_key)
                            .trim_end()
                            .to_string(),
                        Flag::AssetError,
                    )
                }
            };
            self.rows
                .push(Row::new(vec![Cell::text(result.file_type.clone()), key]));
        }
        let missing = results
            .iter()
            .any(|result| result.error_kind == AssetErrorKind::NotFound);
        let errors = results
            .iter()
            .any(|result| result.error_kind == AssetErrorKind::OtherError);
        if missing && !self.alerts.contains(&Alert::AssetsMissing) {
            self.alerts.push(Alert::AssetsMissing);
        }
        if errors && !self.alerts.contains(&Alert::AssetErrors) {
            self.alerts.push(Alert::AssetErrors);
        }
    }
}

/// Column layout of a section. Layouts that differ between light and
/// electron microscopy depend on the key type.
pub fn columns_for(kind: SectionKind, key_type: KeyType) -> Vec<&'static str> {
    let em = key_type.family() == Family::Em;
    match kind {
        SectionKind::PublishedVersioned => vec!["name", "bodyID"],
        SectionKind::Samples => vec![
            "_id",
            "slideCode",
            "line",
            "publishingName",
            "gender",
            "dataSet",
            "releaseLabel",
            "status",
        ],
        SectionKind::Images => vec![
            "sampleRef",
            "slideCode",
            "line",
            "anatomicalArea",
            "tile",
            "objective",
            "gender",
            "dataSet",
            "name",
        ],
        SectionKind::EmBodies => vec![
            "_id",
            "name",
            "neuronType",
            "neuronInstance",
            "status",
            "statusLabel",
            "dataSetIdentifier",
        ],
        SectionKind::NeuronMetadata => published_columns(em),
        SectionKind::PublishedUrls => {
            let mut columns = published_columns(em);
            columns[0] = "sampleRef";
            match key_type {
                KeyType::SampleId | KeyType::SlideCode => {
                    if let Some(last) = columns.last_mut() {
                        *last = "alpsRelease";
                    }
                }
                KeyType::BodyId => columns.truncate(columns.len() - 3),
                _ => {}
            }
            columns
        }
        SectionKind::PublishedUrlAssets | SectionKind::PublishedImageAssets => {
            vec!["fileType", "key"]
        }
        SectionKind::PublishedImages => vec![
            "sampleRef",
            "slideCode",
            "name",
            "area",
            "tile",
            "objective",
            "releaseName",
            "alignment",
        ],
        SectionKind::PublishedStacks => vec!["itemType", "release"],
        SectionKind::Skeletons => vec!["key", "value"],
        SectionKind::CustomAnnotations => {
            vec!["annotation", "annotator", "region", "dataset", "line"]
        }
        SectionKind::Dois => vec!["publishingName", "citation", "link"],
    }
}

fn published_columns(em: bool) -> Vec<&'static str> {
    if em {
        vec![
            "sourceRefId",
            "mipId",
            "alignmentSpace",
            "publishedName",
            "neuronType",
            "neuronInstance",
            "datasetLabels",
        ]
    } else {
        vec![
            "sourceRefId",
            "mipId",
            "alignmentSpace",
            "slideCode",
            "publishedName",
            "anatomicalArea",
            "objective",
            "gender",
            "datasetLabels",
        ]
    }
}

/// Display text of a field; missing fields and nulls become an empty string.
pub fn field_text(record: &Record, field: &str) -> String {
    record.get(field).map(value_text).unwrap_or_default()
}

fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        Value::Array(items) => items
            .iter()
            .map(value_text)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(_) => value.to_string(),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub title: String,
    pub key_type: KeyType,
    /// The key the lookup settled on, after any substitution.
    pub key: String,
    pub original_key: String,
    pub release: Option<String>,
    pub publishing_names: Vec<String>,
    pub sections: Vec<Section>,
    pub assets: Vec<AssetCheckResult>,
    pub generated_at: DateTime<Utc>,
}

impl Report {
    pub fn assemble(entity: ResolvedEntity) -> Self {
        let parts = entity.into_parts();
        Self {
            title: format!("{} {}", parts.key_type, parts.working_key),
            key_type: parts.key_type,
            key: parts.working_key,
            original_key: parts.original_key,
            release: parts.release,
            publishing_names: parts.publishing_names,
            sections: parts.sections,
            assets: parts.assets,
            generated_at: Utc::now(),
        }
    }

    pub fn section(&self, kind: SectionKind) -> Option<&Section> {
        self.sections.iter().find(|section| section.kind == kind)
    }

    /// Sections that found at least one row, in display order.
    pub fn populated(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter().filter(|section| !section.is_empty())
    }
}
