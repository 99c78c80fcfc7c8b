use std::fmt::Display;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("XML processing error: {0}")]
    Xml(String),

    #[error("XML serialization error: {0}")]
    Serialize(#[from] quick_xml::SeError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] crate::crypto::Error),

    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("Marker `{0}` not found in envelope")]
    MarkerNotFound(&'static str),

    #[error("Invalid XPath expression: {0}")]
    InvalidXPath(String),

    #[error("No element matches reference `{0}`")]
    ReferenceNotFound(String),

    #[error("Referenced element `{0}` has no Id attribute")]
    MissingId(String),

    #[error("Unsupported transform: {0}")]
    UnsupportedTransform(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Signing key has not been set")]
    MissingSigningKey,

    #[error("Signature has not been computed")]
    NotComputed,
}

impl Error {
    pub(crate) fn xml(err: impl Display) -> Self {
        Error::Xml(err.to_string())
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::xml(err)
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(err: std::string::FromUtf8Error) -> Self {
        Error::Utf8(err.utf8_error())
    }
}
