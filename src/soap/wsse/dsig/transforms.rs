use std::ops::Range;

use crate::soap::wsse::xml::Document;
use crate::soap::wsse::{Error, Result, algorithms, c14n};

/// Check that a transform algorithm is one this engine implements
pub(crate) fn ensure_supported(algorithm: &str) -> Result<()> {
    match algorithm {
        algorithms::ENVELOPED_SIGNATURE | algorithms::EXCLUSIVE_C14N => Ok(()),
        alg => Err(Error::UnsupportedTransform(alg.to_string())),
    }
}

/// Run the transform chain over the element at `index` and return the octets to digest.
///
/// `signature` is the element index of the `Signature` holding the reference,
/// `None` while that signature is still being computed. When the chain does
/// not end in a canonicalization, exclusive canonicalization is applied last.
pub(crate) fn apply(
    doc: &Document,
    index: usize,
    transforms: &[String],
    signature: Option<usize>,
) -> Result<String> {
    let inherited = doc.parent_scope(index);
    let mut data = doc.text(index).to_string();
    let mut canonical = false;

    for transform in transforms {
        match transform.as_str() {
            algorithms::ENVELOPED_SIGNATURE => {
                // The node-set is gone once the data has been serialized
                if canonical {
                    return Err(Error::UnsupportedTransform(format!(
                        "{transform} after canonicalization"
                    )));
                }
                if let Some(span) = enveloping_span(doc, index, signature) {
                    data.replace_range(span, "");
                }
            }
            algorithms::EXCLUSIVE_C14N => {
                data = c14n::canonicalize(&data, inherited)?;
                canonical = true;
            }
            alg => return Err(Error::UnsupportedTransform(alg.to_string())),
        }
    }

    if !canonical {
        data = c14n::canonicalize(&data, inherited)?;
    }
    Ok(data)
}

/// Span of the enclosing signature relative to the element text, if it lies inside it
fn enveloping_span(doc: &Document, index: usize, signature: Option<usize>) -> Option<Range<usize>> {
    let signature = signature?;
    if !doc.is_ancestor(index, signature) {
        return None;
    }
    let offset = doc.element(index).span.start;
    let span = &doc.element(signature).span;
    Some(span.start - offset..span.end - offset)
}
