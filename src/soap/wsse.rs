//! WS-Security X.509 token profile signing for serialized SOAP envelopes.
//!
//! [`WsSecurityCert`] inserts a `wsse:Security` header (binary security token
//! and timestamp) into an envelope and signs the body and the timestamp with
//! an enveloped, exclusively canonicalized XML signature whose `KeyInfo`
//! points back at the token.

mod c14n;
mod cert;
mod dsig;
mod error;
mod generator;
mod splice;
mod template;
mod xml;

pub use cert::{TokenReferenceResolver, WsSecurityCert};
pub use dsig::{KeyInfoResolver, SignatureEngine, XmlSigner};
pub use error::Error;
pub use generator::{Timestamp, generate_created, generate_expires, generate_id};
pub use splice::{insert, insert_before};
pub use template::{Template, WsseTemplates};

pub type Result<T> = std::result::Result<T, Error>;

// Algorithm URIs used by the X.509 token profile signature
pub mod algorithms {
    // Digest algorithms
    pub const SHA256: &str = "http://www.w3.org/2001/04/xmlenc#sha256";

    // Signature algorithms
    pub const RSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";

    // Canonicalization algorithms
    pub const EXCLUSIVE_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";

    // Transform algorithms
    pub const ENVELOPED_SIGNATURE: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";
}

// Namespaces
pub mod ns {
    pub const WSSE: &str =
        "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd";
    pub const WSU: &str =
        "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd";
    pub const DS: &str = "http://www.w3.org/2000/09/xmldsig#";
}

// Token profile value types
pub mod token {
    pub const X509V3: &str =
        "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-x509-token-profile-1.0#X509v3";
    pub const BASE64_BINARY: &str = "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-soap-message-security-1.0#Base64Binary";
}
