//! Resolving dotted key paths and printing what they point at.

use crate::{stringify, Dictionary, Entry, EntryValue, LookupError};
use tracing::debug;

/// Find the entry addressed by `key`.
///
/// `a.b.c` looks up `c` in sub-dictionary `b` of sub-dictionary `a`. A key
/// without dots is looked up directly in `dict`.
pub fn resolve<'a>(dict: &'a Dictionary, key: &str) -> Result<&'a Entry, LookupError> {
    let (path, terminal) = match key.rsplit_once('.') {
        None => {
            debug!(key = key, dictionary = dict.name().unwrap_or(""), "looking up");
            return dict.lookup_entry(key).ok_or_else(|| LookupError::KeyNotFound {
                key: key.to_string(),
                dictionary: dict.name().map(str::to_string),
            });
        }
        Some(split) => split,
    };

    let dict = descend(dict, path.split('.'))?;
    debug!(key = terminal, dictionary = dict.name().unwrap_or(""), "looking up");
    dict.lookup_entry(terminal)
        .ok_or_else(|| LookupError::KeyNotFoundInSubdict {
            key: terminal.to_string(),
            dictionary: dict.name().unwrap_or("").to_string(),
        })
}

/// Walk down through the sub-dictionaries named by `segments`.
fn descend<'a, 'k>(
    dict: &'a Dictionary,
    mut segments: impl Iterator<Item = &'k str>,
) -> Result<&'a Dictionary, LookupError> {
    segments.try_fold(dict, |current, segment| {
        current
            .sub_dict(segment)
            .ok_or_else(|| LookupError::SubdictNotFound(segment.to_string()))
    })
}

/// Text printed for a resolved entry: the first token of a value, or the
/// whole block of a sub-dictionary.
pub fn render(entry: &Entry) -> String {
    let mut output = String::new();
    match entry.value() {
        EntryValue::Stream(tokens) => {
            if let Some(token) = tokens.first() {
                stringify::token(token, &mut output);
            }
        }
        EntryValue::Dict(dict) => stringify::dictionary(dict, 0, &mut output),
    }
    output
}

/// Resolve `key` and render the entry it addresses.
pub fn lookup(dict: &Dictionary, key: &str) -> Result<String, LookupError> {
    resolve(dict, key).map(render)
}
