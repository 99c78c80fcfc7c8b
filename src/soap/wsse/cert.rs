use secrecy::SecretString;
use std::sync::Arc;
use tracing::{debug, info};

use crate::soap::wsse::dsig::{KeyInfoResolver, SignatureEngine, XmlSigner};
use crate::soap::wsse::generator::{Timestamp, generate_id};
use crate::soap::wsse::template::WsseTemplates;
use crate::soap::wsse::{Result, algorithms, splice};

const SOAP_HEADER_END_TAG: &str = "</soap:Header>";
const SECURITY_END_TAG: &str = "</wsse:Security>";

const PEM_CERTIFICATE_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
const PEM_CERTIFICATE_END: &str = "-----END CERTIFICATE-----";

const TOKEN_ID_PREFIX: &str = "x509-";
const TIMESTAMP_XPATH: &str = "//*[name(.)='wsse:Security']/*[local-name(.)='Timestamp']";
const REFERENCE_TRANSFORMS: [&str; 2] = [
    algorithms::ENVELOPED_SIGNATURE,
    algorithms::EXCLUSIVE_C14N,
];

/// Resolves the signature's `KeyInfo` to a reference to the binary security token
pub struct TokenReferenceResolver {
    token_id: String,
    templates: Arc<WsseTemplates>,
}

impl TokenReferenceResolver {
    pub fn new(token_id: impl Into<String>, templates: Arc<WsseTemplates>) -> Self {
        Self {
            token_id: token_id.into(),
            templates,
        }
    }
}

impl KeyInfoResolver for TokenReferenceResolver {
    fn resolve_key_info(&self) -> Result<String> {
        self.templates
            .render_security_token_reference(&self.token_id)
    }
}

/// Security context signing SOAP envelopes with an X.509 certificate.
///
/// The token id is generated once and shared by the rendered
/// `BinarySecurityToken` and the signature's `KeyInfo` for every envelope
/// signed with this context. Key material is only parsed when signing.
pub struct WsSecurityCert<E: SignatureEngine = XmlSigner> {
    certificate_body: String,
    token_id: String,
    templates: Arc<WsseTemplates>,
    engine: E,
    timestamp: Option<Timestamp>,
}

impl WsSecurityCert<XmlSigner> {
    /// Create a context with the built-in header templates
    pub fn new(
        private_key_pem: impl AsRef<[u8]>,
        certificate_pem: impl AsRef<[u8]>,
        passphrase: impl Into<SecretString>,
    ) -> Result<Self> {
        let templates = Arc::new(WsseTemplates::new()?);
        Ok(Self::with_templates(
            private_key_pem,
            certificate_pem,
            passphrase,
            templates,
        ))
    }

    /// Create a context sharing templates compiled at application start
    pub fn with_templates(
        private_key_pem: impl AsRef<[u8]>,
        certificate_pem: impl AsRef<[u8]>,
        passphrase: impl Into<SecretString>,
        templates: Arc<WsseTemplates>,
    ) -> Self {
        Self::with_engine(
            XmlSigner::new(),
            private_key_pem,
            certificate_pem,
            passphrase,
            templates,
        )
    }
}

impl<E: SignatureEngine> WsSecurityCert<E> {
    /// Create a context signing with the given engine
    pub fn with_engine(
        mut engine: E,
        private_key_pem: impl AsRef<[u8]>,
        certificate_pem: impl AsRef<[u8]>,
        passphrase: impl Into<SecretString>,
        templates: Arc<WsseTemplates>,
    ) -> Self {
        let certificate_body = normalize_certificate(certificate_pem.as_ref());
        let token_id = format!("{TOKEN_ID_PREFIX}{}", generate_id());

        engine.set_signing_key(private_key_pem.as_ref(), passphrase.into());
        engine.set_key_info_resolver(Box::new(TokenReferenceResolver::new(
            token_id.clone(),
            templates.clone(),
        )));

        info!(
            "Created WS-Security context with token {token_id} ({} certificate bytes)",
            certificate_body.len()
        );

        Self {
            certificate_body,
            token_id,
            templates,
            engine,
            timestamp: None,
        }
    }

    /// Identifier of the binary security token
    pub fn token_id(&self) -> &str {
        &self.token_id
    }

    /// Base64 certificate embedded as the binary security token
    pub fn certificate_body(&self) -> &str {
        &self.certificate_body
    }

    /// Timestamp of the most recently processed envelope
    pub fn timestamp(&self) -> Option<&Timestamp> {
        self.timestamp.as_ref()
    }

    /// Add the security header to a serialized envelope and sign it.
    ///
    /// `envelope_prefix` is the namespace prefix the envelope uses for its
    /// `Body` element. The header is inserted before the first
    /// `</soap:Header>` and the signature before the first `</wsse:Security>`.
    pub fn post_process(&mut self, xml: &str, envelope_prefix: &str) -> Result<String> {
        let timestamp = Timestamp::now();
        let security_header = self.templates.render_security_header(
            &self.certificate_body,
            &timestamp.created,
            &timestamp.expires,
            &self.token_id,
        )?;
        self.timestamp = Some(timestamp);

        // The timestamp must be part of the text before it can be referenced
        let xml_with_security = splice::insert_before(&security_header, xml, SOAP_HEADER_END_TAG)?;

        let body_xpath = format!("//*[name(.)='{envelope_prefix}:Body']");
        self.engine
            .add_reference(&body_xpath, &REFERENCE_TRANSFORMS)?;
        self.engine
            .add_reference(TIMESTAMP_XPATH, &REFERENCE_TRANSFORMS)?;
        self.engine.compute_signature(&xml_with_security)?;

        debug!("Signed envelope with token {}", self.token_id);
        splice::insert_before(
            self.engine.signature_xml()?,
            &xml_with_security,
            SECURITY_END_TAG,
        )
    }
}

/// Strip the PEM armor and line breaks, leaving the base64 body
fn normalize_certificate(certificate_pem: &[u8]) -> String {
    String::from_utf8_lossy(certificate_pem)
        .replace(PEM_CERTIFICATE_BEGIN, "")
        .replace(PEM_CERTIFICATE_END, "")
        .replace(['\r', '\n'], "")
}
