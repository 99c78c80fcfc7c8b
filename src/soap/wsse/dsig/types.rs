//! Serde models of the `ds:SignedInfo` markup.
//!
//! Element names carry no prefix, the signature block declares the XMLDSig
//! namespace as default namespace.

use serde::Serialize;

/// XML element with an algorithm attribute
#[derive(Debug, Clone, Serialize)]
pub(crate) struct AlgorithmElement {
    #[serde(rename = "@Algorithm")]
    pub algorithm: String,
}

impl AlgorithmElement {
    pub fn new(algorithm: impl Into<String>) -> Self {
        Self {
            algorithm: algorithm.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct Transforms {
    #[serde(rename = "Transform")]
    pub transform: Vec<AlgorithmElement>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct Reference {
    #[serde(rename = "@URI")]
    pub uri: String,
    #[serde(rename = "Transforms")]
    pub transforms: Transforms,
    #[serde(rename = "DigestMethod")]
    pub digest_method: AlgorithmElement,
    #[serde(rename = "DigestValue")]
    pub digest_value: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SignedInfo {
    #[serde(rename = "CanonicalizationMethod")]
    pub canon_method: AlgorithmElement,
    #[serde(rename = "SignatureMethod")]
    pub signature_method: AlgorithmElement,
    #[serde(rename = "Reference")]
    pub references: Vec<Reference>,
}
