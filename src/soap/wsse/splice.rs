use crate::soap::wsse::{Error, Result};

/// Insert `fragment` into `text` at byte offset `position`.
///
/// The fragment is inserted verbatim, it must already be well-formed markup.
/// Returns `None` when `position` is past the end of `text` or not on a char
/// boundary.
pub fn insert(fragment: &str, text: &str, position: usize) -> Option<String> {
    text.is_char_boundary(position)
        .then(|| splice(fragment, text, position))
}

fn splice(fragment: &str, text: &str, position: usize) -> String {
    let mut out = String::with_capacity(text.len() + fragment.len());
    out.push_str(&text[..position]);
    out.push_str(fragment);
    out.push_str(&text[position..]);
    out
}

/// Insert `fragment` immediately before the first occurrence of `marker`.
///
/// Only the first occurrence is considered, an envelope embedding another
/// envelope with the same marker is spliced at the outermost textual match.
pub fn insert_before(fragment: &str, text: &str, marker: &'static str) -> Result<String> {
    let position = text.find(marker).ok_or(Error::MarkerNotFound(marker))?;
    Ok(splice(fragment, text, position))
}
