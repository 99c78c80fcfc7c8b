//! Enveloped XML signature engine.
//!
//! References are selected with a small XPath subset, digested after their
//! transform chain and signed with RSA-SHA256 over the exclusively
//! canonicalized `SignedInfo`.

pub(crate) mod transforms;
mod types;
mod xpath;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::crypto::{HashAlg, rsa, rsa::RsaPrivateKey};
use crate::soap::wsse::xml::{Document, NsScope};
use crate::soap::wsse::{Error, Result, algorithms, c14n, ns};

use types::{AlgorithmElement, Reference, SignedInfo, Transforms};
use xpath::XPath;

/// Produces the content of the signature's `KeyInfo` element
pub trait KeyInfoResolver: Send + Sync {
    fn resolve_key_info(&self) -> Result<String>;
}

/// The operations the WS-Security layer needs from an XML signature engine
pub trait SignatureEngine {
    /// Set the PEM private key used to compute the signature value
    fn set_signing_key(&mut self, private_key_pem: &[u8], passphrase: SecretString);

    /// Set the resolver producing the `KeyInfo` content
    fn set_key_info_resolver(&mut self, resolver: Box<dyn KeyInfoResolver>);

    /// Register the elements selected by `xpath` for signing with the given transforms
    fn add_reference(&mut self, xpath: &str, transforms: &[&str]) -> Result<()>;

    /// Digest the registered references of `xml` and sign them.
    ///
    /// The registered references are consumed, the next computation starts
    /// from an empty reference list.
    fn compute_signature(&mut self, xml: &str) -> Result<()>;

    /// The `Signature` element produced by the last computation
    fn signature_xml(&self) -> Result<&str>;
}

struct SigningKey {
    pem: Vec<u8>,
    passphrase: SecretString,
}

struct ReferenceSpec {
    xpath: XPath,
    transforms: Vec<String>,
}

/// [`SignatureEngine`] producing RSA-SHA256 signatures with SHA-256 digests
#[derive(Default)]
pub struct XmlSigner {
    signing_key: Option<SigningKey>,
    key_info_resolver: Option<Box<dyn KeyInfoResolver>>,
    references: Vec<ReferenceSpec>,
    signature_xml: Option<String>,
}

impl XmlSigner {
    pub fn new() -> Self {
        Self::default()
    }

    fn reference(&self, doc: &Document, spec: &ReferenceSpec) -> Result<Vec<Reference>> {
        let selected = spec.xpath.select(doc);
        if selected.is_empty() {
            return Err(Error::ReferenceNotFound(spec.xpath.to_string()));
        }

        let mut references = Vec::with_capacity(selected.len());
        for index in selected {
            let element = doc.element(index);
            let id = element
                .id()
                .ok_or_else(|| Error::MissingId(element.name.clone()))?;

            let data = transforms::apply(doc, index, &spec.transforms, None)?;
            let digest = HashAlg::Sha256.hash(data.as_bytes())?;
            debug!("Digested reference #{id} ({} canonical bytes)", data.len());

            references.push(Reference {
                uri: format!("#{id}"),
                transforms: Transforms {
                    transform: spec
                        .transforms
                        .iter()
                        .map(AlgorithmElement::new)
                        .collect(),
                },
                digest_method: AlgorithmElement::new(algorithms::SHA256),
                digest_value: BASE64.encode(digest),
            });
        }
        Ok(references)
    }
}

impl SignatureEngine for XmlSigner {
    fn set_signing_key(&mut self, private_key_pem: &[u8], passphrase: SecretString) {
        self.signing_key = Some(SigningKey {
            pem: private_key_pem.to_vec(),
            passphrase,
        });
    }

    fn set_key_info_resolver(&mut self, resolver: Box<dyn KeyInfoResolver>) {
        self.key_info_resolver = Some(resolver);
    }

    fn add_reference(&mut self, xpath: &str, transforms: &[&str]) -> Result<()> {
        for transform in transforms {
            transforms::ensure_supported(transform)?;
        }
        self.references.push(ReferenceSpec {
            xpath: XPath::parse(xpath)?,
            transforms: transforms.iter().map(|t| t.to_string()).collect(),
        });
        Ok(())
    }

    fn compute_signature(&mut self, xml: &str) -> Result<()> {
        use quick_xml::se::to_string_with_root as xml_to_string;

        let specs = std::mem::take(&mut self.references);
        self.signature_xml = None;

        let key = self.signing_key.as_ref().ok_or(Error::MissingSigningKey)?;
        let private_key = RsaPrivateKey::from_pem(&key.pem, key.passphrase.expose_secret())?;

        let doc = Document::parse(xml)?;
        let mut references = Vec::new();
        for spec in &specs {
            references.extend(self.reference(&doc, spec)?);
        }

        let signed_info = SignedInfo {
            canon_method: AlgorithmElement::new(algorithms::EXCLUSIVE_C14N),
            signature_method: AlgorithmElement::new(algorithms::RSA_SHA256),
            references,
        };

        // SignedInfo is canonicalized in the scope of its Signature parent
        let signed_info_xml = xml_to_string("SignedInfo", &signed_info)?;
        let signature_scope = NsScope::from([(String::new(), ns::DS.to_string())]);
        let signed_info_c14n = c14n::canonicalize(&signed_info_xml, &signature_scope)?;

        let signature = rsa::sign(
            &private_key,
            signed_info_c14n.as_bytes(),
            HashAlg::Sha256,
        )?;

        let key_info = match &self.key_info_resolver {
            Some(resolver) => format!("<KeyInfo>{}</KeyInfo>", resolver.resolve_key_info()?),
            None => String::new(),
        };

        debug!(
            "Computed signature over {} references",
            signed_info.references.len()
        );
        self.signature_xml = Some(format!(
            r#"<Signature xmlns="{ds}">{signed_info_xml}<SignatureValue>{value}</SignatureValue>{key_info}</Signature>"#,
            ds = ns::DS,
            value = BASE64.encode(signature.as_bytes()),
        ));
        Ok(())
    }

    fn signature_xml(&self) -> Result<&str> {
        self.signature_xml.as_deref().ok_or(Error::NotComputed)
    }
}
