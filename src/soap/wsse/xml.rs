use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::collections::BTreeMap;
use std::ops::Range;
use std::str;

use crate::soap::wsse::{Error, Result};

/// In-scope namespace declarations, prefix (empty for default) to URI
pub(crate) type NsScope = BTreeMap<String, String>;

/// Attribute local names accepted as element identifiers
const ID_ATTRIBUTES: [&str; 3] = ["Id", "ID", "id"];

/// An element of a parsed document with its location in the source text
#[derive(Debug, Clone)]
pub(crate) struct Element {
    pub name: String,
    pub parent: Option<usize>,
    pub span: Range<usize>,
    pub attributes: Vec<(String, String)>,
    pub scope: NsScope,
}

impl Element {
    pub fn prefix(&self) -> &str {
        self.name.split_once(':').map_or("", |(prefix, _)| prefix)
    }

    pub fn local_name(&self) -> &str {
        self.name
            .split_once(':')
            .map_or(self.name.as_str(), |(_, local)| local)
    }

    #[cfg(test)]
    pub fn namespace(&self) -> Option<&str> {
        self.scope.get(self.prefix()).map(String::as_str)
    }

    /// Value of the first `Id`-like attribute, whatever its prefix
    pub fn id(&self) -> Option<&str> {
        self.attributes.iter().find_map(|(key, value)| {
            if key == "xmlns" || key.starts_with("xmlns:") {
                return None;
            }
            let local = key.split_once(':').map_or(key.as_str(), |(_, local)| local);
            ID_ATTRIBUTES.contains(&local).then_some(value.as_str())
        })
    }
}

/// Read-only element index over XML text.
///
/// Elements are stored in document order, spans are byte ranges of the
/// source covering the start tag through the end tag.
#[derive(Debug)]
pub(crate) struct Document<'a> {
    source: &'a str,
    root_scope: NsScope,
    elements: Vec<Element>,
}

impl<'a> Document<'a> {
    pub fn parse(source: &'a str) -> Result<Self> {
        Self::parse_in_scope(source, &NsScope::new())
    }

    /// Parse `source` as if it were nested in an element with `inherited` in scope
    pub fn parse_in_scope(source: &'a str, inherited: &NsScope) -> Result<Self> {
        let mut reader = Reader::from_str(source);
        reader.config_mut().trim_text(false);

        let mut doc = Self {
            source,
            root_scope: inherited.clone(),
            elements: Vec::new(),
        };
        let mut stack: Vec<usize> = Vec::new();

        loop {
            let start = reader.buffer_position() as usize;
            match reader.read_event()? {
                Event::Start(e) => {
                    let index = doc.open(&e, start, stack.last().copied())?;
                    stack.push(index);
                }
                Event::Empty(e) => {
                    let index = doc.open(&e, start, stack.last().copied())?;
                    doc.elements[index].span.end = reader.buffer_position() as usize;
                }
                Event::End(_) => {
                    let index = stack
                        .pop()
                        .ok_or_else(|| Error::xml("unexpected closing tag"))?;
                    doc.elements[index].span.end = reader.buffer_position() as usize;
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(&index) = stack.last() {
            return Err(Error::Xml(format!(
                "element `{}` is not closed",
                doc.elements[index].name
            )));
        }
        if doc.elements.is_empty() {
            return Err(Error::xml("document has no root element"));
        }
        Ok(doc)
    }

    fn open(&mut self, e: &BytesStart, start: usize, parent: Option<usize>) -> Result<usize> {
        let name = str::from_utf8(e.name().as_ref())?.to_string();
        let mut scope = match parent {
            Some(index) => self.elements[index].scope.clone(),
            None => self.root_scope.clone(),
        };

        let mut attributes = Vec::new();
        for attr in e.attributes() {
            let attr = attr.map_err(Error::xml)?;
            let key = str::from_utf8(attr.key.as_ref())?.to_string();
            let value = attr.unescape_value().map_err(Error::xml)?.into_owned();
            if key == "xmlns" {
                declare(&mut scope, "", &value);
            } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                declare(&mut scope, prefix, &value);
            }
            attributes.push((key, value));
        }

        self.elements.push(Element {
            name,
            parent,
            span: start..start,
            attributes,
            scope,
        });
        Ok(self.elements.len() - 1)
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn element(&self, index: usize) -> &Element {
        &self.elements[index]
    }

    /// Source text of the element including its start and end tags
    pub fn text(&self, index: usize) -> &'a str {
        &self.source[self.elements[index].span.clone()]
    }

    /// Namespaces in scope where the element starts, excluding its own declarations
    pub fn parent_scope(&self, index: usize) -> &NsScope {
        match self.elements[index].parent {
            Some(parent) => &self.elements[parent].scope,
            None => &self.root_scope,
        }
    }

    pub fn is_ancestor(&self, ancestor: usize, index: usize) -> bool {
        let mut current = self.elements[index].parent;
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.elements[parent].parent;
        }
        false
    }

    /// Index of the first element with the given local name and namespace
    #[cfg(test)]
    pub fn find(&self, local_name: &str, namespace: &str) -> Option<usize> {
        self.elements
            .iter()
            .position(|e| e.local_name() == local_name && e.namespace() == Some(namespace))
    }
}

pub(crate) fn declare(scope: &mut NsScope, prefix: &str, uri: &str) {
    if uri.is_empty() {
        scope.remove(prefix);
    } else {
        scope.insert(prefix.to_string(), uri.to_string());
    }
}
