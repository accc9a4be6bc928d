//! Library for reading OpenFOAM dictionary files and looking up entries in them.
//!
//! ```text
//! FoamFile { version 2.0; format ascii; class dictionary; }
//!
//! PISO
//! {
//!     nCorrectors     2;
//! }
//! ```
//!
//! A dictionary maps keywords to entries. An entry is either a stream of
//! tokens terminated by `;` or a nested dictionary in braces.

use regex::Regex;
use std::fmt;
use std::path::Path;
use tracing::warn;

pub mod error;
mod lookup;
mod parse;
mod read;
mod stringify;

pub use error::{LookupError, ReadError};
pub use lookup::{lookup, render, resolve};
pub use read::InputMode;

/// A single lexical token of a stream entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// A bare word, like `uniform` or `div(phi,U)`.
    Word(String),
    /// A double-quoted string, unescaped.
    String(String),
    /// An integer.
    Label(Number<i64>),
    /// A floating point number, or an integer too large for a label.
    Scalar(Number<f64>),
    /// One of `( ) [ ] : , = + - * /`.
    Punctuation(char),
    /// A `$name` reference to another entry.
    Variable(String),
    /// A `#{ ... #}` block, kept exactly as written.
    Verbatim(String),
}

/// A number as read, with its value and the exact text it was written as.
///
/// Printing uses the text, so `1e-06` stays `1e-06` and values outside the
/// range of `T` still read back the same.
#[derive(Debug, Clone, PartialEq)]
pub struct Number<T> {
    value: T,
    text: String,
}

impl<T: Copy> Number<T> {
    pub fn new(value: T, text: &str) -> Number<T> {
        Number {
            value,
            text: text.to_string(),
        }
    }

    pub fn value(&self) -> T {
        self.value
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

impl From<i64> for Number<i64> {
    fn from(value: i64) -> Self {
        Number::new(value, &value.to_string())
    }
}

impl From<f64> for Number<f64> {
    /// Debug keeps a decimal point or exponent, so the text reads back as a scalar.
    fn from(value: f64) -> Self {
        Number::new(value, &format!("{:?}", value))
    }
}

/// A quoted keyword, compiled once into an anchored regular expression.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Option<Regex>,
}

impl Pattern {
    /// Compile `source`. An invalid expression is kept and only matches its
    /// own text.
    pub fn new(source: &str) -> Pattern {
        let regex = match Regex::new(&format!("^(?:{})$", source)) {
            Ok(regex) => Some(regex),
            Err(err) => {
                warn!(pattern = source, %err, "keyword is not a valid regular expression, matching it literally");
                None
            }
        };
        Pattern {
            source: source.to_string(),
            regex,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, key: &str) -> bool {
        match &self.regex {
            Some(regex) => regex.is_match(key),
            None => self.source == key,
        }
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Pattern) -> bool {
        self.source == other.source
    }
}

impl Eq for Pattern {}

/// The name of an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyword {
    /// A plain keyword that only matches itself.
    Word(String),
    /// A quoted keyword, matched as a regular expression against the whole key.
    Pattern(Pattern),
}

impl Keyword {
    /// A pattern keyword for the regular expression `source`.
    pub fn pattern(source: &str) -> Keyword {
        Keyword::Pattern(Pattern::new(source))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Keyword::Word(word) => word,
            Keyword::Pattern(pattern) => pattern.as_str(),
        }
    }

    pub fn is_pattern(&self) -> bool {
        matches!(self, Keyword::Pattern(_))
    }

    /// Does this keyword select `key`? Words compare literally, patterns must
    /// match the entire key.
    pub fn matches(&self, key: &str) -> bool {
        match self {
            Keyword::Word(word) => word == key,
            Keyword::Pattern(pattern) => pattern.is_match(key),
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut output = String::new();
        stringify::keyword(self, &mut output);
        f.write_str(&output)
    }
}

/// What an entry holds.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryValue {
    /// A token stream, the part between the keyword and the `;`.
    Stream(Vec<Token>),
    /// A nested dictionary.
    Dict(Dictionary),
}

/// A keyword with its value.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    keyword: Keyword,
    value: EntryValue,
}

impl Entry {
    pub fn new(keyword: Keyword, value: EntryValue) -> Entry {
        Entry { keyword, value }
    }

    /// Create a stream entry with a plain keyword.
    pub fn stream(keyword: &str, tokens: Vec<Token>) -> Entry {
        Entry::new(Keyword::Word(keyword.to_string()), EntryValue::Stream(tokens))
    }

    /// Create a sub-dictionary entry with a plain keyword.
    pub fn dict(keyword: &str, dict: Dictionary) -> Entry {
        Entry::new(Keyword::Word(keyword.to_string()), EntryValue::Dict(dict))
    }

    pub fn keyword(&self) -> &Keyword {
        &self.keyword
    }

    pub fn value(&self) -> &EntryValue {
        &self.value
    }

    pub fn is_stream(&self) -> bool {
        matches!(self.value, EntryValue::Stream(_))
    }

    pub fn is_dict(&self) -> bool {
        matches!(self.value, EntryValue::Dict(_))
    }

    /// The tokens of a stream entry.
    pub fn tokens(&self) -> Option<&[Token]> {
        match &self.value {
            EntryValue::Stream(tokens) => Some(tokens),
            EntryValue::Dict(_) => None,
        }
    }

    /// The dictionary of a sub-dictionary entry.
    pub fn as_dict(&self) -> Option<&Dictionary> {
        match &self.value {
            EntryValue::Dict(dict) => Some(dict),
            EntryValue::Stream(_) => None,
        }
    }
}

impl fmt::Display for Entry {
    /// Serialize an entry the way it appears inside a dictionary body.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut output = String::new();
        stringify::entry(self, 0, &mut output);
        f.write_str(output.trim_end_matches('\n'))
    }
}

/// An ordered collection of uniquely named entries.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    /// Name used in diagnostics: the file path for a top-level dictionary,
    /// `parent.keyword` for a nested one.
    name: String,
    entries: Vec<Entry>,
}

impl PartialEq for Dictionary {
    /// Dictionaries are equal when their entries are; names are only for diagnostics.
    fn eq(&self, other: &Dictionary) -> bool {
        self.entries == other.entries
    }
}

impl Dictionary {
    /// Create a new empty dictionary.
    pub fn new(name: &str) -> Dictionary {
        Dictionary {
            name: name.to_string(),
            entries: vec![],
        }
    }

    /// The dictionary's name, if it has one.
    pub fn name(&self) -> Option<&str> {
        if self.name.is_empty() {
            None
        } else {
            Some(&self.name)
        }
    }

    /// Rename this dictionary and every sub-dictionary below it.
    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
        for entry in self.entries.iter_mut() {
            if let EntryValue::Dict(dict) = &mut entry.value {
                dict.set_name(&scoped_name(name, entry.keyword.as_str()));
            }
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }

    pub fn keywords(&self) -> impl Iterator<Item = &Keyword> {
        self.entries.iter().map(|entry| &entry.keyword)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Is there an entry for `key`, either by name or by pattern?
    pub fn found(&self, key: &str) -> bool {
        self.lookup_entry(key).is_some()
    }

    /// Find the entry for `key`.
    ///
    /// A keyword spelled exactly like `key` wins. Otherwise patterns are
    /// tried, the most recently declared first.
    pub fn lookup_entry(&self, key: &str) -> Option<&Entry> {
        self.entries
            .iter()
            .find(|entry| entry.keyword.as_str() == key)
            .or_else(|| {
                self.entries
                    .iter()
                    .rev()
                    .filter(|entry| entry.keyword.is_pattern())
                    .find(|entry| entry.keyword.matches(key))
            })
    }

    /// Find the sub-dictionary for `key`, or `None` if the entry holds a value.
    pub fn sub_dict(&self, key: &str) -> Option<&Dictionary> {
        self.lookup_entry(key).and_then(Entry::as_dict)
    }

    /// Is `key` a sub-dictionary?
    pub fn is_dict(&self, key: &str) -> bool {
        self.sub_dict(key).is_some()
    }

    /// Add an entry unless one with the same keyword exists. Returns whether it was added.
    pub fn add(&mut self, entry: Entry) -> bool {
        if self.position(entry.keyword.as_str()).is_some() {
            return false;
        }
        let entry = self.adopt(entry);
        self.entries.push(entry);
        true
    }

    /// Add an entry, replacing one with the same keyword in place.
    pub fn set(&mut self, entry: Entry) {
        let entry = self.adopt(entry);
        match self.position(entry.keyword.as_str()) {
            Some(index) => self.entries[index] = entry,
            None => self.entries.push(entry),
        }
    }

    /// Add an entry, merging it into an existing sub-dictionary of the same
    /// keyword when both are dictionaries, and replacing it otherwise.
    pub fn merge_entry(&mut self, entry: Entry) {
        let index = match self.position(entry.keyword.as_str()) {
            Some(index) => index,
            None => {
                let entry = self.adopt(entry);
                self.entries.push(entry);
                return;
            }
        };
        let incoming = match entry.value {
            EntryValue::Dict(incoming) => incoming,
            value => return self.set(Entry::new(entry.keyword, value)),
        };
        if let EntryValue::Dict(existing) = &mut self.entries[index].value {
            existing.merge(incoming);
            return;
        }
        self.set(Entry::new(entry.keyword, EntryValue::Dict(incoming)));
    }

    /// Merge every entry of `other` into this dictionary.
    pub fn merge(&mut self, other: Dictionary) {
        for entry in other.entries {
            self.merge_entry(entry);
        }
    }

    /// Remove the entry named exactly `key`.
    pub fn remove(&mut self, key: &str) -> Option<Entry> {
        let index = self.position(key)?;
        Some(self.entries.remove(index))
    }

    /// Remove every entry whose keyword `pattern` matches.
    pub fn remove_matching(&mut self, pattern: &Keyword) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|entry| !pattern.matches(entry.keyword.as_str()));
        before - self.entries.len()
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.keyword.as_str() == key)
    }

    /// Give a sub-dictionary about to be stored here its scoped name.
    fn adopt(&self, mut entry: Entry) -> Entry {
        if let EntryValue::Dict(dict) = &mut entry.value {
            dict.set_name(&scoped_name(&self.name, entry.keyword.as_str()));
        }
        entry
    }
}

impl fmt::Display for Dictionary {
    /// Serialize a dictionary as a brace-delimited block that reads back to an
    /// equal dictionary.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut output = String::new();
        stringify::dictionary(self, 0, &mut output);
        f.write_str(&output)
    }
}

impl std::str::FromStr for Dictionary {
    type Err = ReadError;

    /// Parse an unnamed dictionary from a string. `#include` paths resolve
    /// against the current directory.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        read::read_str(s, "", Path::new("."))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut output = String::new();
        stringify::token(self, &mut output);
        f.write_str(&output)
    }
}

/// Name of the sub-dictionary `keyword` of a dictionary called `parent`.
pub(crate) fn scoped_name(parent: &str, keyword: &str) -> String {
    if parent.is_empty() {
        keyword.to_string()
    } else {
        format!("{}.{}", parent, keyword)
    }
}

/// Read and parse an unnamed dictionary from a byte stream.
pub fn read(input: impl std::io::Read) -> Result<Dictionary, ReadError> {
    read::read_stream(input, Path::new("."))
}

/// Read and parse a dictionary file. The dictionary is named after `path`.
pub fn read_file(path: impl AsRef<Path>) -> Result<Dictionary, ReadError> {
    read::read_file(path.as_ref())
}
