//! Per key type lookup plans.
//!
//! Each key type runs a fixed, ordered list of steps. A step reads bindings
//! produced by the initial key or by earlier steps and writes rows into the
//! sections it declares. The sections a report carries depend only on the
//! key type.

use std::fmt;

use serde::Serialize;

use crate::domain::{Family, KeyType};

/// Values carried from one step to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Binding {
    /// The validated key as the caller supplied it.
    OriginalKey,
    /// The key later steps search with, possibly replaced by an earlier step.
    WorkingKey,
    PublishingNames,
    Release,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    PublishedVersioned,
    Samples,
    Images,
    EmBodies,
    NeuronMetadata,
    PublishedUrls,
    PublishedUrlAssets,
    PublishedImages,
    PublishedImageAssets,
    PublishedStacks,
    Skeletons,
    CustomAnnotations,
    Dois,
}

impl SectionKind {
    pub fn label(self) -> &'static str {
        match self {
            SectionKind::PublishedVersioned => "published versioned",
            SectionKind::Samples => "sample",
            SectionKind::Images => "image",
            SectionKind::EmBodies => "emBody",
            SectionKind::NeuronMetadata => "neuronMetadata",
            SectionKind::PublishedUrls => "publishedURL",
            SectionKind::PublishedUrlAssets => "publishedURL files uploaded to AWS S3",
            SectionKind::PublishedImages => "publishedLMImage",
            SectionKind::PublishedImageAssets => "publishedLMImage files uploaded to AWS S3",
            SectionKind::PublishedStacks => "published stacks",
            SectionKind::Skeletons => "published skeletons",
            SectionKind::CustomAnnotations => "custom annotations",
            SectionKind::Dois => "publishing DOIs",
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    PublishedVersioned,
    Samples,
    Images,
    EmBodies,
    NeuronMetadata,
    PublishedUrls,
    PublishedImages,
    Skeletons,
    CustomAnnotations,
    Dois,
}

impl Step {
    /// Position of the step in the six-stage lookup, starting at 1.
    pub fn stage(self) -> u8 {
        match self {
            Step::PublishedVersioned => 1,
            Step::Samples | Step::Images | Step::EmBodies => 2,
            Step::NeuronMetadata => 3,
            Step::PublishedUrls => 4,
            Step::PublishedImages | Step::Skeletons | Step::CustomAnnotations => 5,
            Step::Dois => 6,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Step::PublishedVersioned => "published-versioned",
            Step::Samples => "samples",
            Step::Images => "images",
            Step::EmBodies => "em-bodies",
            Step::NeuronMetadata => "neuron-metadata",
            Step::PublishedUrls => "published-urls",
            Step::PublishedImages => "published-images",
            Step::Skeletons => "skeletons",
            Step::CustomAnnotations => "custom-annotations",
            Step::Dois => "dois",
        }
    }

    pub fn inputs(self) -> &'static [Binding] {
        match self {
            Step::PublishedVersioned | Step::CustomAnnotations => &[Binding::OriginalKey],
            Step::Samples
            | Step::Images
            | Step::EmBodies
            | Step::NeuronMetadata
            | Step::PublishedUrls => &[Binding::WorkingKey],
            Step::PublishedImages => &[Binding::WorkingKey, Binding::Release],
            Step::Skeletons | Step::Dois => &[Binding::PublishingNames],
        }
    }

    pub fn outputs(self) -> &'static [Binding] {
        match self {
            Step::PublishedVersioned | Step::Samples => &[Binding::WorkingKey],
            Step::PublishedUrls => &[Binding::Release, Binding::PublishingNames],
            _ => &[],
        }
    }

    pub fn sections(self) -> &'static [SectionKind] {
        match self {
            Step::PublishedVersioned => &[SectionKind::PublishedVersioned],
            Step::Samples => &[SectionKind::Samples],
            Step::Images => &[SectionKind::Images],
            Step::EmBodies => &[SectionKind::EmBodies],
            Step::NeuronMetadata => &[SectionKind::NeuronMetadata],
            Step::PublishedUrls => &[SectionKind::PublishedUrls, SectionKind::PublishedUrlAssets],
            Step::PublishedImages => &[
                SectionKind::PublishedImages,
                SectionKind::PublishedImageAssets,
                SectionKind::PublishedStacks,
            ],
            Step::Skeletons => &[SectionKind::Skeletons],
            Step::CustomAnnotations => &[SectionKind::CustomAnnotations],
            Step::Dois => &[SectionKind::Dois],
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

const FLY_LIGHT_STEPS: &[Step] = &[
    Step::Samples,
    Step::Images,
    Step::NeuronMetadata,
    Step::PublishedUrls,
    Step::PublishedImages,
    Step::Dois,
];

const FLY_LIGHT_SECTIONS: &[SectionKind] = &[
    SectionKind::Samples,
    SectionKind::Images,
    SectionKind::NeuronMetadata,
    SectionKind::PublishedUrls,
    SectionKind::PublishedUrlAssets,
    SectionKind::PublishedImages,
    SectionKind::PublishedImageAssets,
    SectionKind::PublishedStacks,
    SectionKind::Dois,
];

const BODY_STEPS: &[Step] = &[
    Step::EmBodies,
    Step::NeuronMetadata,
    Step::PublishedUrls,
    Step::Skeletons,
    Step::CustomAnnotations,
    Step::Dois,
];

const BODY_SECTIONS: &[SectionKind] = &[
    SectionKind::EmBodies,
    SectionKind::NeuronMetadata,
    SectionKind::PublishedUrls,
    SectionKind::PublishedUrlAssets,
    SectionKind::Skeletons,
    SectionKind::CustomAnnotations,
    SectionKind::Dois,
];

const NEURON_STEPS: &[Step] = &[
    Step::PublishedVersioned,
    Step::EmBodies,
    Step::NeuronMetadata,
    Step::Dois,
];

// The versioned section is filled first but shown where the published URLs
// would be for other key types.
const NEURON_SECTIONS: &[SectionKind] = &[
    SectionKind::EmBodies,
    SectionKind::NeuronMetadata,
    SectionKind::PublishedVersioned,
    SectionKind::Dois,
];

#[derive(Debug, Clone, Copy)]
pub struct Pipeline {
    key_type: KeyType,
    steps: &'static [Step],
    sections: &'static [SectionKind],
}

impl Pipeline {
    pub fn for_key_type(key_type: KeyType) -> Self {
        let (steps, sections) = match key_type.family() {
            Family::FlyLight => (FLY_LIGHT_STEPS, FLY_LIGHT_SECTIONS),
            Family::Em if key_type.is_neuron_class() => (NEURON_STEPS, NEURON_SECTIONS),
            Family::Em => (BODY_STEPS, BODY_SECTIONS),
        };
        Self {
            key_type,
            steps,
            sections,
        }
    }

    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    pub fn steps(&self) -> &'static [Step] {
        self.steps
    }

    /// Sections in display order.
    pub fn sections(&self) -> &'static [SectionKind] {
        self.sections
    }

    pub fn declares(&self, section: SectionKind) -> bool {
        self.sections.contains(&section)
    }
}
