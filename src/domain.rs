use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LookupError;

/// The kind of identifier a caller is searching with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    #[serde(rename = "Publishing name")]
    PublishingName,
    #[serde(rename = "Sample")]
    SampleId,
    #[serde(rename = "Slide code")]
    SlideCode,
    #[serde(rename = "Body ID")]
    BodyId,
    #[serde(rename = "Neuron type")]
    NeuronType,
    #[serde(rename = "Neuron instance")]
    NeuronInstance,
}

/// Which side of the data a key type belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    /// Light microscopy lines, samples and slides.
    FlyLight,
    /// Electron microscopy bodies and neuron classes.
    Em,
}

impl KeyType {
    pub const ALL: [KeyType; 6] = [
        KeyType::PublishingName,
        KeyType::SampleId,
        KeyType::SlideCode,
        KeyType::BodyId,
        KeyType::NeuronType,
        KeyType::NeuronInstance,
    ];

    pub fn label(self) -> &'static str {
        match self {
            KeyType::PublishingName => "Publishing name",
            KeyType::SampleId => "Sample",
            KeyType::SlideCode => "Slide code",
            KeyType::BodyId => "Body ID",
            KeyType::NeuronType => "Neuron type",
            KeyType::NeuronInstance => "Neuron instance",
        }
    }

    pub fn alias(self) -> &'static str {
        match self {
            KeyType::PublishingName => "publishing-name",
            KeyType::SampleId => "sample-id",
            KeyType::SlideCode => "slide-code",
            KeyType::BodyId => "body-id",
            KeyType::NeuronType => "neuron-type",
            KeyType::NeuronInstance => "neuron-instance",
        }
    }

    pub fn family(self) -> Family {
        match self {
            KeyType::PublishingName | KeyType::SampleId | KeyType::SlideCode => Family::FlyLight,
            KeyType::BodyId | KeyType::NeuronType | KeyType::NeuronInstance => Family::Em,
        }
    }

    pub fn requires_numeric(self) -> bool {
        matches!(self, KeyType::SampleId | KeyType::BodyId)
    }

    pub fn is_neuron_class(self) -> bool {
        matches!(self, KeyType::NeuronType | KeyType::NeuronInstance)
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for KeyType {
    type Err = LookupError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        KeyType::ALL
            .into_iter()
            .find(|kind| kind.label() == trimmed || kind.alias() == trimmed)
            .ok_or_else(|| LookupError::InvalidKeyType(value.to_string()))
    }
}

/// A validated search key. Construct with [`SearchKey::normalize`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SearchKey {
    value: String,
    key_type: KeyType,
}

impl SearchKey {
    /// Validates `raw` against the format rules of `key_type`.
    ///
    /// Sample and body IDs must be all digits; every other type must not be,
    /// so a bare number is never ambiguous. The key is checked exactly as
    /// given. Slide codes are uppercased.
    pub fn normalize(raw: &str, key_type: KeyType) -> Result<Self, LookupError> {
        if is_numeric(raw) != key_type.requires_numeric() {
            return Err(LookupError::InvalidKey {
                key_type,
                key: raw.to_string(),
            });
        }
        let value = match key_type {
            KeyType::SlideCode => raw.to_uppercase(),
            _ => raw.to_string(),
        };
        Ok(Self { value, key_type })
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn key_type(&self) -> KeyType {
        self.key_type
    }
}

impl fmt::Display for SearchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.key_type, self.value)
    }
}

pub fn normalize(raw: &str, key_type: KeyType) -> Result<SearchKey, LookupError> {
    SearchKey::normalize(raw, key_type)
}

fn is_numeric(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|ch| ch.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_key_type_labels_and_aliases() {
        assert_eq!("Body ID".parse::<KeyType>().unwrap(), KeyType::BodyId);
        assert_eq!("sample-id".parse::<KeyType>().unwrap(), KeyType::SampleId);
        assert_eq!(
            "Neuron instance".parse::<KeyType>().unwrap(),
            KeyType::NeuronInstance
        );
        let err = "line".parse::<KeyType>().unwrap_err();
        assert_matches!(err, LookupError::InvalidKeyType(_));
    }

    #[test]
    fn slide_code_is_uppercased() {
        let key = normalize("20171212_61_c1", KeyType::SlideCode).unwrap();
        assert_eq!(key.value(), "20171212_61_C1");
    }

    #[test]
    fn empty_numeric_key_is_rejected() {
        for key_type in [KeyType::SampleId, KeyType::BodyId] {
            let err = normalize("", key_type).unwrap_err();
            assert_matches!(err, LookupError::InvalidKey { .. });
        }
    }

    #[test]
    fn families() {
        assert_eq!(KeyType::SampleId.family(), Family::FlyLight);
        assert_eq!(KeyType::NeuronType.family(), Family::Em);
        assert!(KeyType::NeuronInstance.is_neuron_class());
        assert!(!KeyType::BodyId.is_neuron_class());
    }
}
