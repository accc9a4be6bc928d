//! Error types for reading dictionaries and looking up entries.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading a dictionary.
#[derive(Debug, Error)]
pub enum ReadError {
    /// An error occurred while reading data.
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The input was not valid text in its declared encoding.
    #[error("{0} is not valid {1} text")]
    Encoding(String, &'static str),

    /// The text does not follow the dictionary syntax.
    #[error("syntax error in {name} at line {line}, column {column}: {message}")]
    Syntax {
        name: String,
        line: usize,
        column: usize,
        message: String,
    },

    /// A keyword was defined twice while `#inputMode error` was active.
    #[error("duplicate entry {0} in {1}")]
    DuplicateEntry(String, String),

    /// A `$variable` did not resolve to any entry in scope.
    #[error("undefined variable ${0} in {1}")]
    UndefinedVariable(String, String),

    /// A `$variable` inside a value resolved to a sub-dictionary.
    #[error("variable ${0} in {1} refers to a dictionary, not a value")]
    NotAStream(String, String),

    /// A `$name` macro entry resolved to a plain value.
    #[error("macro ${0} in {1} refers to a value, not a dictionary")]
    NotADictionary(String, String),

    /// `#include` directives nested too deeply, usually an include cycle.
    #[error("#include nested more than {0} levels deep at {1}")]
    IncludeDepth(usize, PathBuf),

    #[error("unknown #inputMode {0}")]
    InvalidInputMode(String),
}

/// Errors produced by walking a dotted key path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// A non-terminal path segment is not a sub-dictionary.
    #[error("{0} sub-dictionary was not found.")]
    SubdictNotFound(String),

    /// A key without dots is absent. `dictionary` is the name of the
    /// dictionary that was searched, if it has one.
    #[error("Key {key} was not found{}.", in_dictionary(.dictionary))]
    KeyNotFound {
        key: String,
        dictionary: Option<String>,
    },

    /// The last segment of a dotted key is absent from the sub-dictionary
    /// the path led to.
    #[error("Key {key} was not found in {dictionary} dictionary.")]
    KeyNotFoundInSubdict { key: String, dictionary: String },
}

fn in_dictionary(dictionary: &Option<String>) -> String {
    match dictionary {
        Some(name) => format!(" in {}", name),
        None => String::new(),
    }
}
