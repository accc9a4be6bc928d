//! Turning parsed items into a [`Dictionary`]: directives, `$variables` and
//! duplicate keywords.

use crate::parse::{self, Directive, Item, RawValue};
use crate::{scoped_name, Dictionary, Entry, EntryValue, Keyword, ReadError, Token};
use encoding_rs::UTF_8;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

/// Nesting limit for `#include`, which also stops include cycles.
const MAX_INCLUDE_DEPTH: usize = 64;

/// How a keyword that is already present is handled, set with `#inputMode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// Merge sub-dictionaries, replace everything else. The default.
    Merge,
    /// Replace the existing entry.
    Overwrite,
    /// Keep the existing entry.
    Protect,
    /// Keep the existing entry and log a warning.
    Warn,
    /// Fail the read.
    Error,
}

impl Default for InputMode {
    fn default() -> Self {
        InputMode::Merge
    }
}

impl std::str::FromStr for InputMode {
    type Err = ReadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "merge" | "default" => Ok(InputMode::Merge),
            "overwrite" => Ok(InputMode::Overwrite),
            "protect" => Ok(InputMode::Protect),
            "warn" => Ok(InputMode::Warn),
            "error" => Ok(InputMode::Error),
            _ => Err(ReadError::InvalidInputMode(s.to_string())),
        }
    }
}

/// The dictionaries enclosing the one being read, innermost first.
struct Scope<'a> {
    dict: &'a Dictionary,
    parent: Option<&'a Scope<'a>>,
}

impl<'a> Scope<'a> {
    /// Resolve `a.b.c`: `a` is searched outwards from the innermost
    /// dictionary, `b` and `c` are looked up below it.
    fn lookup(&self, name: &str) -> Option<&'a Entry> {
        let mut segments = name.split('.');
        let first = segments.next()?;
        let mut entry = self.find(first)?;
        for segment in segments {
            entry = entry.as_dict()?.lookup_entry(segment)?;
        }
        Some(entry)
    }

    fn find(&self, key: &str) -> Option<&'a Entry> {
        let mut scope = Some(self);
        while let Some(current) = scope {
            if let Some(entry) = current.dict.lookup_entry(key) {
                return Some(entry);
            }
            scope = current.parent;
        }
        None
    }
}

struct Reader {
    mode: InputMode,
    depth: usize,
}

impl Reader {
    fn new() -> Reader {
        Reader {
            mode: InputMode::default(),
            depth: 0,
        }
    }

    /// Add the entries described by `items` to `dict`.
    ///
    /// `parent` is the scope enclosing `dict`; `base` is the directory
    /// `#include` paths are relative to.
    fn read_items(
        &mut self,
        items: Vec<Item>,
        dict: &mut Dictionary,
        parent: Option<&Scope>,
        base: &Path,
    ) -> Result<(), ReadError> {
        for item in items {
            match item {
                Item::Entry(keyword, RawValue::Stream(tokens)) => {
                    let tokens = {
                        let scope = Scope { dict: &*dict, parent };
                        expand(tokens, &scope)?
                    };
                    self.insert(dict, Entry::new(keyword, EntryValue::Stream(tokens)))?;
                }
                Item::Entry(keyword, RawValue::Dict(children)) => {
                    let mut child = Dictionary::new(&scoped_name(
                        dict.name().unwrap_or(""),
                        keyword.as_str(),
                    ));
                    {
                        let scope = Scope { dict: &*dict, parent };
                        self.read_items(children, &mut child, Some(&scope), base)?;
                    }
                    self.insert(dict, Entry::new(keyword, EntryValue::Dict(child)))?;
                }
                Item::Macro(name) => {
                    let source = {
                        let scope = Scope { dict: &*dict, parent };
                        match scope.lookup(&name) {
                            Some(entry) => match entry.as_dict() {
                                Some(source) => source.clone(),
                                None => return Err(not_found(ReadError::NotADictionary, &name, dict)),
                            },
                            None => return Err(not_found(ReadError::UndefinedVariable, &name, dict)),
                        }
                    };
                    trace!(%name, entries = source.len(), "expanding macro");
                    for entry in source.entries {
                        self.insert(dict, entry)?;
                    }
                }
                Item::Directive(directive) => self.directive(directive, dict, parent, base)?,
            }
        }
        Ok(())
    }

    fn directive(
        &mut self,
        directive: Directive,
        dict: &mut Dictionary,
        parent: Option<&Scope>,
        base: &Path,
    ) -> Result<(), ReadError> {
        match directive {
            Directive::InputMode(mode) => {
                self.mode = mode.parse()?;
                debug!(mode = ?self.mode, "input mode");
            }
            Directive::Remove(keywords) => {
                for keyword in &keywords {
                    let removed = match keyword {
                        Keyword::Word(key) => dict.remove(key).map_or(0, |_| 1),
                        Keyword::Pattern(_) => dict.remove_matching(keyword),
                    };
                    trace!(keyword = keyword.as_str(), removed, "#remove");
                }
            }
            Directive::Include { path, optional } => {
                let path = base.join(path);
                if optional && !path.exists() {
                    debug!(path = %path.display(), "skipping missing #includeIfPresent");
                    return Ok(());
                }
                if self.depth >= MAX_INCLUDE_DEPTH {
                    return Err(ReadError::IncludeDepth(MAX_INCLUDE_DEPTH, path));
                }
                debug!(path = %path.display(), "#include");
                let text = read_path(&path)?;
                let items = parse::items(&text, &path.display().to_string())?;
                self.depth += 1;
                let result = self.read_items(items, dict, parent, &directory_of(&path));
                self.depth -= 1;
                result?;
            }
        }
        Ok(())
    }

    /// Store `entry` in `dict` according to the current input mode.
    fn insert(&self, dict: &mut Dictionary, entry: Entry) -> Result<(), ReadError> {
        if !dict.entries().any(|e| e.keyword().as_str() == entry.keyword().as_str()) {
            dict.set(entry);
            return Ok(());
        }
        match self.mode {
            InputMode::Merge => dict.merge_entry(entry),
            InputMode::Overwrite => dict.set(entry),
            InputMode::Protect => {}
            InputMode::Warn => {
                warn!(
                    keyword = entry.keyword().as_str(),
                    dictionary = dict.name().unwrap_or("<stdin>"),
                    "ignoring duplicate entry"
                );
            }
            InputMode::Error => {
                return Err(ReadError::DuplicateEntry(
                    entry.keyword().as_str().to_string(),
                    dict.name().unwrap_or("<stdin>").to_string(),
                ))
            }
        }
        Ok(())
    }
}

fn not_found(error: fn(String, String) -> ReadError, name: &str, dict: &Dictionary) -> ReadError {
    error(name.to_string(), dict.name().unwrap_or("<stdin>").to_string())
}

/// Replace every `$variable` in `tokens` with the tokens it refers to.
fn expand(tokens: Vec<Token>, scope: &Scope) -> Result<Vec<Token>, ReadError> {
    let mut expanded = Vec::with_capacity(tokens.len());
    for token in tokens {
        let name = match token {
            Token::Variable(name) => name,
            token => {
                expanded.push(token);
                continue;
            }
        };
        match scope.lookup(&name).map(Entry::value) {
            Some(EntryValue::Stream(value)) => {
                trace!(%name, tokens = value.len(), "expanding variable");
                expanded.extend(value.iter().cloned());
            }
            Some(EntryValue::Dict(_)) => {
                return Err(not_found(ReadError::NotAStream, &name, scope.dict))
            }
            None => return Err(not_found(ReadError::UndefinedVariable, &name, scope.dict)),
        }
    }
    Ok(expanded)
}

fn directory_of(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Decode raw input bytes. UTF-8 unless a byte order mark says otherwise.
fn decode(bytes: &[u8], name: &str) -> Result<String, ReadError> {
    let (text, encoding, failed) = UTF_8.decode(bytes);
    if failed {
        return Err(ReadError::Encoding(name.to_string(), encoding.name()));
    }
    Ok(text.into_owned())
}

fn read_path(path: &Path) -> Result<String, ReadError> {
    let bytes = std::fs::read(path).map_err(|source| ReadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    decode(&bytes, &path.display().to_string())
}

/// Parse `text` into a dictionary called `name`.
pub fn read_str(text: &str, name: &str, base: &Path) -> Result<Dictionary, ReadError> {
    let items = parse::items(text, name)?;
    let mut dict = Dictionary::new(name);
    Reader::new().read_items(items, &mut dict, None, base)?;
    debug!(name, entries = dict.len(), "read dictionary");
    Ok(dict)
}

pub fn read_stream(mut input: impl Read, base: &Path) -> Result<Dictionary, ReadError> {
    let mut bytes = vec![];
    input
        .read_to_end(&mut bytes)
        .map_err(|source| ReadError::Io {
            path: PathBuf::from("<stdin>"),
            source,
        })?;
    let text = decode(&bytes, "<stdin>")?;
    read_str(&text, "", base)
}

pub fn read_file(path: &Path) -> Result<Dictionary, ReadError> {
    let text = read_path(path)?;
    read_str(&text, &path.display().to_string(), &directory_of(path))
}
