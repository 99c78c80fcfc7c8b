//! The XPath subset used to select signature references.
//!
//! Supported: location paths made of `/*` and `//*` steps, each optionally
//! filtered by `[name(.)='qname']` or `[local-name(.)='name']`.

use std::fmt;

use crate::soap::wsse::xml::{Document, Element};
use crate::soap::wsse::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeTest {
    Any,
    Name(String),
    LocalName(String),
}

impl NodeTest {
    fn matches(&self, element: &Element) -> bool {
        match self {
            NodeTest::Any => true,
            NodeTest::Name(name) => element.name == *name,
            NodeTest::LocalName(name) => element.local_name() == name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    axis: Axis,
    test: NodeTest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct XPath {
    source: String,
    steps: Vec<Step>,
}

impl XPath {
    pub fn parse(expr: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidXPath(format!("{expr}: {reason}"));

        let mut steps = Vec::new();
        let mut rest = expr.trim();
        if rest.is_empty() {
            return Err(invalid("empty expression"));
        }

        while !rest.is_empty() {
            let axis = if let Some(r) = rest.strip_prefix("//") {
                rest = r;
                Axis::Descendant
            } else if let Some(r) = rest.strip_prefix('/') {
                rest = r;
                Axis::Child
            } else {
                return Err(invalid("expected `/` or `//`"));
            };

            rest = rest
                .strip_prefix('*')
                .ok_or_else(|| invalid("only `*` node tests are supported"))?;

            let test = match rest.strip_prefix('[') {
                Some(r) => {
                    let (test, r) = parse_predicate(r).ok_or_else(|| invalid("bad predicate"))?;
                    rest = r;
                    test
                }
                None => NodeTest::Any,
            };
            steps.push(Step { axis, test });
        }

        Ok(Self {
            source: expr.to_string(),
            steps,
        })
    }

    /// Indices of the selected elements in document order
    pub fn select(&self, doc: &Document) -> Vec<usize> {
        // `None` is the document node
        let mut context: Option<Vec<usize>> = None;

        for step in &self.steps {
            let selected = doc
                .elements()
                .iter()
                .enumerate()
                .filter(|(_, element)| step.test.matches(element))
                .filter(|(index, element)| match (&context, step.axis) {
                    (None, Axis::Child) => element.parent.is_none(),
                    (None, Axis::Descendant) => true,
                    (Some(nodes), Axis::Child) => {
                        element.parent.is_some_and(|parent| nodes.contains(&parent))
                    }
                    (Some(nodes), Axis::Descendant) => {
                        nodes.iter().any(|&node| doc.is_ancestor(node, *index))
                    }
                })
                .map(|(index, _)| index)
                .collect();
            context = Some(selected);
        }
        context.unwrap_or_default()
    }
}

impl fmt::Display for XPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Parse `name(.)='x']` or `local-name(.)='x']`, returning the remaining input
fn parse_predicate(input: &str) -> Option<(NodeTest, &str)> {
    let input = input.trim_start();
    let (local, rest) = if let Some(r) = input.strip_prefix("local-name(.)") {
        (true, r)
    } else if let Some(r) = input.strip_prefix("name(.)") {
        (false, r)
    } else {
        return None;
    };

    let rest = rest.trim_start().strip_prefix('=')?.trim_start();
    let quote = rest.chars().next().filter(|c| *c == '\'' || *c == '"')?;
    let rest = &rest[1..];
    let end = rest.find(quote)?;
    let literal = rest[..end].to_string();
    let rest = rest[end + 1..].trim_start().strip_prefix(']')?;

    let test = if local {
        NodeTest::LocalName(literal)
    } else {
        NodeTest::Name(literal)
    };
    Some((test, rest))
}
