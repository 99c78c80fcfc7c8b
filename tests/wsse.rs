mod common;

use std::{collections::HashMap, sync::Arc};

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use openssl::x509::X509;
use quick_xml::{Reader, events::Event};
use regex::Regex;
use secrecy::SecretString;
use wsse_signer::{
    config::Config,
    soap::wsse::{
        self, Error, KeyInfoResolver, SignatureEngine, Template, WsSecurityCert, WsseTemplates,
    },
};

const ENVELOPE: &str = r#"<?xml version="1.0" encoding="utf-8"?><soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/" xmlns:wsu="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd"><soap:Header></soap:Header><soap:Body wsu:Id="_0"><GetQuote xmlns="urn:quotes"><Symbol>ACME</Symbol></GetQuote></soap:Body></soap:Envelope>"#;

/// Element paths (local names joined by `/`) in document order
fn element_paths(xml: &str) -> Vec<String> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<String> = Vec::new();
    let mut paths = Vec::new();

    loop {
        match reader.read_event().expect("output is well-formed") {
            Event::Start(e) => {
                stack.push(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
                paths.push(stack.join("/"));
            }
            Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                paths.push(format!("{}/{name}", stack.join("/")));
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }
    assert!(stack.is_empty(), "unbalanced output");
    paths
}

fn capture(xml: &str, pattern: &str) -> Vec<String> {
    Regex::new(pattern)
        .unwrap()
        .captures_iter(xml)
        .map(|cap| cap[1].to_string())
        .collect()
}

#[test]
fn test_signed_envelope_layout() {
    let identity = common::generate_identity("layout");
    let mut ctx = WsSecurityCert::new(&identity.key_pem, &identity.cert_pem, "").unwrap();

    let signed = ctx.post_process(ENVELOPE, "soap").unwrap();
    let paths = element_paths(&signed);

    let security = "Envelope/Header/Security";
    for expected in [
        format!("{security}/BinarySecurityToken"),
        format!("{security}/Timestamp"),
        format!("{security}/Timestamp/Created"),
        format!("{security}/Timestamp/Expires"),
        format!("{security}/Signature"),
        format!("{security}/Signature/SignedInfo"),
        format!("{security}/Signature/SignatureValue"),
        format!("{security}/Signature/KeyInfo/SecurityTokenReference/Reference"),
    ] {
        assert_eq!(
            paths.iter().filter(|p| **p == expected).count(),
            1,
            "expected exactly one {expected}"
        );
    }
    assert_eq!(
        paths.iter().filter(|p| p.ends_with("/Security")).count(),
        1
    );

    // Signature comes after the token and timestamp
    let position = |suffix: &str| paths.iter().position(|p| p.ends_with(suffix)).unwrap();
    assert!(position("Security/BinarySecurityToken") < position("Security/Timestamp"));
    assert!(position("Security/Timestamp") < position("Security/Signature"));
}

#[test]
fn test_references_point_at_body_and_timestamp() {
    let identity = common::generate_identity("references");
    let mut ctx = WsSecurityCert::new(&identity.key_pem, &identity.cert_pem, "").unwrap();
    let signed = ctx.post_process(ENVELOPE, "soap").unwrap();

    let uris = capture(&signed, r##"<Reference URI="#([^"]+)">"##);
    assert_eq!(uris, ["_0".to_string(), format!("TS-{}", ctx.token_id())]);

    let token_refs = capture(&signed, r##"<wsse:Reference URI="#([^"]+)""##);
    assert_eq!(token_refs, [ctx.token_id().to_string()]);

    let digests = capture(&signed, "<DigestValue>([^<]+)</DigestValue>");
    assert_eq!(digests.len(), 2);
    for digest in digests {
        assert_eq!(BASE64.decode(digest).unwrap().len(), 32);
    }

    let values = capture(&signed, "<SignatureValue>([^<]+)</SignatureValue>");
    assert_eq!(BASE64.decode(&values[0]).unwrap().len(), 256);
}

#[test]
fn test_binary_token_decodes_to_certificate() {
    let identity = common::generate_identity("token");
    let mut ctx = WsSecurityCert::new(&identity.key_pem, &identity.cert_pem, "").unwrap();
    let signed = ctx.post_process(ENVELOPE, "soap").unwrap();

    let token = capture(
        &signed,
        r#"<wsse:BinarySecurityToken [^>]*>([^<]+)</wsse:BinarySecurityToken>"#,
    );
    let der = BASE64.decode(&token[0]).unwrap();
    let embedded = X509::from_der(&der).unwrap();
    let expected = X509::from_pem(&identity.cert_pem).unwrap();
    assert_eq!(embedded.to_der().unwrap(), expected.to_der().unwrap());
}

#[test]
fn test_envelope_content_preserved() {
    let identity = common::generate_identity("preserve");
    let mut ctx = WsSecurityCert::new(&identity.key_pem, &identity.cert_pem, "").unwrap();
    let signed = ctx.post_process(ENVELOPE, "soap").unwrap();

    let (head, rest) = ENVELOPE.split_once("</soap:Header>").unwrap();
    assert!(signed.starts_with(head));
    assert!(signed.ends_with(&format!("</soap:Header>{rest}")));
}

#[test]
fn test_security_context_from_configuration() {
    let identity = common::generate_identity("config");
    let dir = tempfile::tempdir().unwrap();
    let key_path = dir.path().join("signing.key");
    let cert_path = dir.path().join("signing.crt");
    std::fs::write(&key_path, &identity.key_pem).unwrap();
    std::fs::write(&cert_path, &identity.cert_pem).unwrap();

    let overrides = HashMap::from([
        (
            "signing.private_key_path".to_string(),
            key_path.display().to_string(),
        ),
        (
            "signing.certificate_path".to_string(),
            cert_path.display().to_string(),
        ),
        ("signing.envelope_prefix".to_string(), "env".to_string()),
    ]);
    let config = Config::load_with_sources(Some(overrides)).unwrap();

    let envelope = ENVELOPE
        .replace("<soap:Body", r#"<env:Body xmlns:env="http://schemas.xmlsoap.org/soap/envelope/""#)
        .replace("</soap:Body>", "</env:Body>");
    let mut ctx = config.signing.security_context().unwrap();
    let signed = ctx
        .post_process(&envelope, &config.signing.envelope_prefix)
        .unwrap();
    assert!(signed.contains(r##"<Reference URI="#_0">"##));
}

#[test]
fn test_shared_templates_across_contexts() {
    let templates = Arc::new(WsseTemplates::new().unwrap());
    let alice = common::generate_identity("alice");
    let bob = common::generate_identity("bob");

    let mut first = WsSecurityCert::with_templates(
        &alice.key_pem,
        &alice.cert_pem,
        "",
        Arc::clone(&templates),
    );
    let mut second =
        WsSecurityCert::with_templates(&bob.key_pem, &bob.cert_pem, "", Arc::clone(&templates));
    assert_ne!(first.token_id(), second.token_id());

    let signed_first = first.post_process(ENVELOPE, "soap").unwrap();
    let signed_second = second.post_process(ENVELOPE, "soap").unwrap();
    assert!(signed_first.contains(first.token_id()));
    assert!(!signed_first.contains(second.token_id()));
    assert!(signed_second.contains(second.token_id()));
}

#[test]
fn test_contexts_sign_on_separate_threads() {
    let identity = Arc::new(common::generate_identity("threads"));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let identity = Arc::clone(&identity);
            std::thread::spawn(move || {
                let mut ctx =
                    WsSecurityCert::new(&identity.key_pem, &identity.cert_pem, "").unwrap();
                let signed = ctx.post_process(ENVELOPE, "soap").unwrap();
                (ctx.token_id().to_string(), signed)
            })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        let (id, signed) = handle.join().unwrap();
        assert!(signed.contains(&id));
        ids.push(id);
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 4);
}

struct FixedEngine {
    references: Vec<String>,
    key_info: Option<Box<dyn KeyInfoResolver>>,
    signature: Option<String>,
}

impl SignatureEngine for FixedEngine {
    fn set_signing_key(&mut self, _private_key_pem: &[u8], _passphrase: SecretString) {}

    fn set_key_info_resolver(&mut self, resolver: Box<dyn KeyInfoResolver>) {
        self.key_info = Some(resolver);
    }

    fn add_reference(&mut self, xpath: &str, _transforms: &[&str]) -> wsse::Result<()> {
        self.references.push(xpath.to_string());
        Ok(())
    }

    fn compute_signature(&mut self, _xml: &str) -> wsse::Result<()> {
        let key_info = match &self.key_info {
            Some(resolver) => resolver.resolve_key_info()?,
            None => String::new(),
        };
        self.signature = Some(format!(
            "<ds:Signature refs=\"{}\">{key_info}</ds:Signature>",
            self.references.len()
        ));
        self.references.clear();
        Ok(())
    }

    fn signature_xml(&self) -> wsse::Result<&str> {
        self.signature.as_deref().ok_or(Error::NotComputed)
    }
}

#[test]
fn test_custom_signature_engine() {
    let engine = FixedEngine {
        references: Vec::new(),
        key_info: None,
        signature: None,
    };
    let mut ctx = WsSecurityCert::with_engine(
        engine,
        b"unused",
        "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----\n",
        "",
        Arc::new(WsseTemplates::new().unwrap()),
    );

    let signed = ctx.post_process(ENVELOPE, "soap").unwrap();
    assert!(signed.contains(">MIIB</wsse:BinarySecurityToken>"));
    assert!(signed.contains(&format!(
        r##"<ds:Signature refs="2"><wsse:SecurityTokenReference><wsse:Reference URI="#{}""##,
        ctx.token_id()
    )));
    assert!(signed.contains("</ds:Signature></wsse:Security></soap:Header>"));
}

#[test]
fn test_templates_and_splicing() {
    let template = Template::compile("<a id=\"{{ id }}\">{{body}}</a>").unwrap();
    assert_eq!(template.placeholders().collect::<Vec<_>>(), ["id", "body"]);

    let rendered = template
        .render(&HashMap::from([("id", "x1"), ("body", "<b/>")]))
        .unwrap();
    assert_eq!(rendered, "<a id=\"x1\"><b/></a>");
    assert!(matches!(
        template.render(&HashMap::from([("id", "x1")])),
        Err(Error::Template(_))
    ));

    assert_eq!(
        wsse::insert_before(&rendered, "<r></r>", "</r>").unwrap(),
        "<r><a id=\"x1\"><b/></a></r>"
    );
    assert_eq!(wsse::insert("-", "ab", 1).as_deref(), Some("a-b"));
    assert_eq!(wsse::insert("-", "ab", 3), None);
    assert!(matches!(
        wsse::insert_before("x", "<r/>", "</r>"),
        Err(Error::MarkerNotFound("</r>"))
    ));
}

#[test]
fn test_generated_values() {
    let id_pattern = Regex::new("^[0-9a-f]{32}$").unwrap();
    let first = wsse::generate_id();
    assert!(id_pattern.is_match(&first));
    assert_ne!(first, wsse::generate_id());

    let date_pattern = Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}Z$").unwrap();
    assert!(date_pattern.is_match(&wsse::generate_created()));
    assert!(date_pattern.is_match(&wsse::generate_expires()));
    assert!(wsse::generate_expires() > wsse::generate_created());
}
