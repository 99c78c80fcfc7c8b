use std::collections::HashMap;

use crate::soap::wsse::{Error, Result};

const SECURITY_HEADER: &str = concat!(
    r#"<wsse:Security xmlns:wsse="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd" "#,
    r#"xmlns:wsu="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd" "#,
    r#"soap:mustUnderstand="1">"#,
    r#"<wsse:BinarySecurityToken "#,
    r#"EncodingType="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-soap-message-security-1.0#Base64Binary" "#,
    r#"ValueType="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-x509-token-profile-1.0#X509v3" "#,
    r#"wsu:Id="{{ id }}">{{ binary_token }}</wsse:BinarySecurityToken>"#,
    r#"<wsu:Timestamp wsu:Id="TS-{{ id }}">"#,
    r#"<wsu:Created>{{ created }}</wsu:Created>"#,
    r#"<wsu:Expires>{{ expires }}</wsu:Expires>"#,
    r#"</wsu:Timestamp>"#,
    r#"</wsse:Security>"#,
);

const SECURITY_TOKEN_REFERENCE: &str = concat!(
    r#"<wsse:SecurityTokenReference>"#,
    r##"<wsse:Reference URI="#{{ id }}" "##,
    r#"ValueType="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-x509-token-profile-1.0#X509v3"/>"#,
    r#"</wsse:SecurityTokenReference>"#,
);

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A markup template with `{{ name }}` placeholders.
///
/// Values are substituted verbatim, callers pass already escaped markup.
#[derive(Debug, Clone)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Parse the template source once
    pub fn compile(source: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut rest = source;

        while let Some(open) = rest.find("{{") {
            if open > 0 {
                segments.push(Segment::Literal(rest[..open].to_string()));
            }
            let after_open = &rest[open + 2..];
            let close = after_open.find("}}").ok_or_else(|| {
                Error::Template(format!("unterminated placeholder at `{}`", &rest[open..]))
            })?;
            let name = after_open[..close].trim();
            if name.is_empty() {
                return Err(Error::Template("empty placeholder name".into()));
            }
            segments.push(Segment::Placeholder(name.to_string()));
            rest = &after_open[close + 2..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }
        Ok(Self { segments })
    }

    /// Names of the placeholders in order of appearance
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Expand the template with the given values
    pub fn render(&self, values: &HashMap<&str, &str>) -> Result<String> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    let value = values.get(name.as_str()).ok_or_else(|| {
                        Error::Template(format!("no value for placeholder `{name}`"))
                    })?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

/// The templates used to build the WS-Security header markup
#[derive(Debug, Clone)]
pub struct WsseTemplates {
    security_header: Template,
    security_token_reference: Template,
}

impl WsseTemplates {
    /// Compile the built-in header and token reference templates
    pub fn new() -> Result<Self> {
        Ok(Self {
            security_header: Template::compile(SECURITY_HEADER)?,
            security_token_reference: Template::compile(SECURITY_TOKEN_REFERENCE)?,
        })
    }

    /// Render the `wsse:Security` element with the binary token and timestamp
    pub fn render_security_header(
        &self,
        binary_token: &str,
        created: &str,
        expires: &str,
        id: &str,
    ) -> Result<String> {
        let values = HashMap::from([
            ("binary_token", binary_token),
            ("created", created),
            ("expires", expires),
            ("id", id),
        ]);
        self.security_header.render(&values)
    }

    /// Render the `wsse:SecurityTokenReference` pointing at the token `id`
    pub fn render_security_token_reference(&self, id: &str) -> Result<String> {
        self.security_token_reference
            .render(&HashMap::from([("id", id)]))
    }
}
