use quick_xml::Reader;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use std::borrow::Cow;
use std::str;

use crate::soap::wsse::xml::{NsScope, declare};
use crate::soap::wsse::{Error, Result};

const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Exclusive XML Canonicalization (without comments) of an element subtree.
///
/// `inherited` holds the namespaces in scope at the subtree's parent, they are
/// rendered on the apex element when visibly utilized.
pub(crate) fn canonicalize(xml: impl AsRef<str>, inherited: &NsScope) -> Result<String> {
    let mut reader = Reader::from_str(xml.as_ref());
    reader.config_mut().trim_text(false);
    reader.config_mut().expand_empty_elements = true;

    let mut out = String::with_capacity(xml.as_ref().len());

    // Stack of declared namespace maps
    let mut ns_declared_stack = vec![inherited.clone()];
    // Stack of rendered namespace maps
    let mut ns_rendered_stack = vec![NsScope::new()];

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                handle_start(
                    &mut out,
                    &e,
                    &mut ns_declared_stack,
                    &mut ns_rendered_stack,
                )?;
            }
            Event::End(e) => {
                out.push_str("</");
                out.push_str(str::from_utf8(e.name().as_ref())?);
                out.push('>');
                ns_declared_stack.pop();
                ns_rendered_stack.pop();
            }
            Event::Text(e) => {
                let raw = e.into_inner();
                let normalized = normalize_line_endings(str::from_utf8(&raw)?);
                let text = unescape(&normalized).map_err(Error::xml)?;
                out.push_str(&escape_text_value(&text));
            }
            Event::CData(e) => {
                // CDATA is normalized to text content
                let raw = e.into_inner();
                let normalized = normalize_line_endings(str::from_utf8(&raw)?);
                out.push_str(&escape_text_value(&normalized));
            }
            Event::PI(e) => {
                let pi = normalize_line_endings(str::from_utf8(&e)?).into_owned();
                out.push_str("<?");
                match pi.split_once(char::is_whitespace) {
                    Some((target, data)) if !data.trim_start().is_empty() => {
                        out.push_str(target);
                        out.push(' ');
                        out.push_str(data.trim_start());
                    }
                    Some((target, _)) => out.push_str(target),
                    None => out.push_str(&pi),
                }
                out.push_str("?>");
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(out)
}

/// Normalize line endings to LF
fn normalize_line_endings(text: &str) -> Cow<'_, str> {
    if !text.contains('\r') {
        return Cow::Borrowed(text);
    }
    Cow::Owned(text.replace("\r\n", "\n").replace('\r', "\n"))
}

/// Attribute-value normalization of a raw value, before references are expanded
fn normalize_attribute_whitespace(raw: &str) -> String {
    normalize_line_endings(raw).replace(['\t', '\n'], " ")
}

/// Escape attribute value per C14N rules.
fn escape_attr_value(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + s.len() / 4);
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Escape text node value per C14N rules.
fn escape_text_value(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + s.len() / 4);
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(ch),
        }
    }
    out
}

fn prefix_of(qname: &str) -> &str {
    qname.split_once(':').map_or("", |(prefix, _)| prefix)
}

/// Handle a Start tag event: writes the start tag with canonicalized attributes & namespaces.
fn handle_start(
    out: &mut String,
    e: &BytesStart,
    ns_declared_stack: &mut Vec<NsScope>,
    ns_rendered_stack: &mut Vec<NsScope>,
) -> Result<()> {
    let mut current_declared = ns_declared_stack.last().cloned().unwrap_or_default();
    let ns_rendered = ns_rendered_stack.last().cloned().unwrap_or_default();

    // Separate namespace declarations from regular attributes
    let mut regular_attrs = vec![];
    for attr in e.attributes().with_checks(false) {
        let attr = attr.map_err(Error::xml)?;
        let key = str::from_utf8(attr.key.as_ref())?.to_string();
        let raw = normalize_attribute_whitespace(str::from_utf8(&attr.value)?);
        let value = unescape(&raw).map_err(Error::xml)?.into_owned();
        if key == "xmlns" {
            declare(&mut current_declared, "", &value);
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            declare(&mut current_declared, prefix, &value);
        } else {
            regular_attrs.push((key, value));
        }
    }

    let name = str::from_utf8(e.name().as_ref())?.to_string();

    // Determine visibly-utilized prefixes, the empty prefix stands for the default namespace
    let mut visibly_utilized = vec![prefix_of(&name).to_string()];
    for (key, _) in &regular_attrs {
        let prefix = prefix_of(key);
        // xml: prefix is never rendered as it's implicitly bound
        if !prefix.is_empty() && prefix != "xml" {
            visibly_utilized.push(prefix.to_string());
        }
    }
    visibly_utilized.sort();
    visibly_utilized.dedup();

    // Compute which namespace declarations to render
    let mut render_ns = Vec::new();
    for prefix in &visibly_utilized {
        let current_uri = current_declared.get(prefix);
        let rendered_uri = ns_rendered.get(prefix);
        match (current_uri, rendered_uri) {
            (Some(current), Some(rendered)) if current == rendered => {}
            (Some(current), _) => render_ns.push((prefix.clone(), current.clone())),
            // Undeclare a default namespace rendered by an output ancestor
            (None, Some(_)) if prefix.is_empty() => render_ns.push((String::new(), String::new())),
            (None, _) => {}
        }
    }

    let mut tag_start = format!("<{name}");

    // Namespace declarations are already in lexical prefix order
    for (prefix, uri) in &render_ns {
        if prefix.is_empty() {
            tag_start.push_str(" xmlns=\"");
        } else {
            tag_start.push_str(&format!(" xmlns:{prefix}=\""));
        }
        tag_start.push_str(&escape_attr_value(uri));
        tag_start.push('"');
    }

    // Sort attributes by namespace URI, then local name
    let mut attr_info = vec![];
    for (key, value) in &regular_attrs {
        let (ns_uri, local_name) = match key.split_once(':') {
            Some(("xml", local)) => (XML_NAMESPACE.to_string(), local.to_string()),
            Some((prefix, local)) => (
                current_declared.get(prefix).cloned().unwrap_or_default(),
                local.to_string(),
            ),
            None => (String::new(), key.clone()),
        };
        attr_info.push((ns_uri, local_name, key, value));
    }
    attr_info.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    for (_, _, key, value) in &attr_info {
        tag_start.push(' ');
        tag_start.push_str(key);
        tag_start.push_str("=\"");
        tag_start.push_str(&escape_attr_value(value));
        tag_start.push('"');
    }

    tag_start.push('>');
    out.push_str(&tag_start);

    ns_declared_stack.push(current_declared);

    let mut new_rendered = ns_rendered;
    for (prefix, uri) in render_ns {
        if uri.is_empty() {
            new_rendered.remove(&prefix);
        } else {
            new_rendered.insert(prefix, uri);
        }
    }
    ns_rendered_stack.push(new_rendered);
    Ok(())
}
