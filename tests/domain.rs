use assert_matches::assert_matches;

use neuron_search::domain::{Family, KeyType, normalize};
use neuron_search::error::LookupError;

#[test]
fn every_key_type_parses_from_label_and_alias() {
    for key_type in KeyType::ALL {
        assert_eq!(key_type.label().parse::<KeyType>().unwrap(), key_type);
        assert_eq!(key_type.alias().parse::<KeyType>().unwrap(), key_type);
    }
}

#[test]
fn unknown_key_type_is_rejected() {
    let err = "Line".parse::<KeyType>().unwrap_err();
    assert_matches!(err, LookupError::InvalidKeyType(value) if value == "Line");
}

#[test]
fn numeric_types_accept_only_digits() {
    assert_eq!(normalize("12345", KeyType::SampleId).unwrap().value(), "12345");
    assert_matches!(
        normalize("12a45", KeyType::SampleId),
        Err(LookupError::InvalidKey { key_type: KeyType::SampleId, .. })
    );
    assert_matches!(
        normalize("5813105172", KeyType::PublishingName),
        Err(LookupError::InvalidKey { .. })
    );
}

#[test]
fn whitespace_is_not_a_digit() {
    assert_matches!(
        normalize(" 123", KeyType::BodyId),
        Err(LookupError::InvalidKey { key_type: KeyType::BodyId, key }) if key == " 123"
    );
    assert_matches!(
        normalize("12345 ", KeyType::SampleId),
        Err(LookupError::InvalidKey { .. })
    );
    let key = normalize(" 123 ", KeyType::PublishingName).unwrap();
    assert_eq!(key.value(), " 123 ");
}

#[test]
fn slide_code_normalization_is_idempotent() {
    for raw in ["20171212_61_c1", "20171212_61_C1"] {
        let once = normalize(raw, KeyType::SlideCode).unwrap();
        let twice = normalize(once.value(), KeyType::SlideCode).unwrap();
        assert_eq!(once, twice);
        assert_eq!(once.value(), "20171212_61_C1");
    }
}

#[test]
fn other_types_keep_their_case() {
    let key = normalize("jrc_ss12345", KeyType::PublishingName).unwrap();
    assert_eq!(key.value(), "jrc_ss12345");
    assert_eq!(key.to_string(), "Publishing name jrc_ss12345");
}

#[test]
fn families() {
    assert_eq!(KeyType::SlideCode.family(), Family::FlyLight);
    assert_eq!(KeyType::NeuronInstance.family(), Family::Em);
    assert!(KeyType::NeuronType.is_neuron_class());
    assert!(!KeyType::BodyId.is_neuron_class());
}
