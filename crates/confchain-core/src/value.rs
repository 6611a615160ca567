//! Configuration value types
//!
//! A [`Value`] is a recursive tree of scalars, sequences, and mappings. The
//! internal configuration, the validated overlay, and the environment cache are
//! all `Value` trees addressed by dotted paths such as `database.host` or
//! `servers[0].name`.
//!
//! Path access never fails: a missing key, a missing intermediate, or a
//! segment that does not fit the container it is applied to all read as
//! `None`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A configuration value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
#[derive(Default)]
pub enum Value {
    /// Null value (present, but empty)
    #[default]
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Integer(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(String),
    /// Sequence of values
    Sequence(Vec<Value>),
    /// Mapping of string keys to values
    Mapping(IndexMap<String, Value>),
}

impl Value {
    /// An empty mapping, the usual root of a configuration tree
    pub fn empty_mapping() -> Self {
        Value::Mapping(IndexMap::new())
    }

    /// Check if this value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if this value is a sequence
    pub fn is_sequence(&self) -> bool {
        matches!(self, Value::Sequence(_))
    }

    /// Check if this value is a mapping
    pub fn is_mapping(&self) -> bool {
        matches!(self, Value::Mapping(_))
    }

    /// Get as boolean if this is a Bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as i64 if this is an Integer
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as f64 if this is a Float or Integer
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Get as str if this is a String
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as slice if this is a Sequence
    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(s) => Some(s),
            _ => None,
        }
    }

    /// Get as mapping if this is a Mapping
    pub fn as_mapping(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Mapping(m) => Some(m),
            _ => None,
        }
    }

    /// Loose truthiness: null, `false`, zero, NaN and the empty string are
    /// falsy; every other value, including empty containers, is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Integer(i) => *i != 0,
            Value::Float(f) => *f != 0.0 && !f.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Sequence(_) | Value::Mapping(_) => true,
        }
    }

    /// Get a value by path (e.g., "database.host" or "servers[0].name")
    ///
    /// A top-level key spelled exactly like `path` wins over the nested
    /// interpretation, so a literal `"database.host"` key is reachable.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        if let Value::Mapping(map) = self {
            if let Some(value) = map.get(path) {
                return Some(value);
            }
        }

        let segments = parse_path(path);
        if segments.is_empty() {
            return None;
        }

        segments
            .iter()
            .try_fold(self, |current, segment| current.child(segment))
    }

    /// Check whether a path holds a value (including `Null`)
    pub fn contains_path(&self, path: &str) -> bool {
        self.get_path(path).is_some()
    }

    /// Set a value at a path, creating intermediate containers as needed
    ///
    /// Intermediates that are scalars are replaced by a fresh mapping, or a
    /// sequence when the next segment is index 0. Writing one past the end of
    /// a sequence appends; writing further out turns it into a mapping keyed
    /// by decimal position, so existing elements stay reachable.
    pub fn set_path(&mut self, path: &str, value: Value) {
        if let Value::Mapping(map) = self {
            if let Some(slot) = map.get_mut(path) {
                *slot = value;
                return;
            }
        }

        let segments = parse_path(path);
        let Some((last, parents)) = segments.split_last() else {
            return;
        };

        let mut current = self;
        for (i, segment) in parents.iter().enumerate() {
            let slot = current.slot_mut(segment);
            if !(slot.is_mapping() || slot.is_sequence()) {
                *slot = match segments[i + 1] {
                    PathSegment::Index(0) => Value::Sequence(Vec::new()),
                    _ => Value::empty_mapping(),
                };
            }
            current = slot;
        }

        *current.slot_mut(last) = value;
    }

    /// Set a value at a path only if there is one; `None` never stores an
    /// explicit absence
    pub fn set_path_if_defined(&mut self, path: &str, value: Option<Value>) {
        if let Some(value) = value {
            self.set_path(path, value);
        }
    }

    /// Returns the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Sequence(_) => "sequence",
            Value::Mapping(_) => "mapping",
        }
    }

    /// Render the value as an environment variable string
    ///
    /// Scalars print plainly; sequences and mappings print as compact JSON.
    pub fn to_env_string(&self) -> String {
        match self {
            Value::Sequence(_) | Value::Mapping(_) => {
                serde_json::to_string(self).unwrap_or_else(|_| self.to_string())
            }
            _ => self.to_string(),
        }
    }

    fn child(&self, segment: &PathSegment) -> Option<&Value> {
        match (self, segment) {
            (Value::Mapping(map), PathSegment::Key(key)) => map.get(key.as_str()),
            (Value::Mapping(map), PathSegment::Index(idx)) => map.get(idx.to_string().as_str()),
            (Value::Sequence(seq), segment) => segment.as_index().and_then(|idx| seq.get(idx)),
            _ => None,
        }
    }

    /// Mutable slot for `segment`, converting `self` into a container that can
    /// hold it. New mapping entries start out as `Null`.
    ///
    /// A sequence only grows by appending. An index past the end turns the
    /// sequence into a mapping keyed by decimal position.
    fn slot_mut(&mut self, segment: &PathSegment) -> &mut Value {
        let index = segment.as_index();
        let fits = match (&*self, index) {
            (Value::Sequence(seq), Some(idx)) => idx <= seq.len(),
            (Value::Mapping(_), _) => true,
            _ => false,
        };
        if !fits {
            *self = match std::mem::take(self) {
                Value::Sequence(seq) => Value::Mapping(
                    seq.into_iter()
                        .enumerate()
                        .map(|(i, v)| (i.to_string(), v))
                        .collect(),
                ),
                _ => Value::empty_mapping(),
            };
            return self.slot_mut(segment);
        }
        match (self, index) {
            (Value::Sequence(seq), Some(idx)) => {
                if idx == seq.len() {
                    seq.push(Value::Null);
                }
                &mut seq[idx]
            }
            (Value::Mapping(map), _) => map.entry(segment.key()).or_insert(Value::Null),
            _ => unreachable!("slot_mut: container checked above"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Sequence(seq) => {
                write!(f, "[")?;
                for (i, v) in seq.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Value::Mapping(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Sequence(v.into_iter().map(Into::into).collect())
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(m: IndexMap<String, Value>) -> Self {
        Value::Mapping(m)
    }
}

/// A segment in a path expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// A key in a mapping (e.g., "database" in "database.host")
    Key(String),
    /// An index in a sequence (e.g., 0 in "servers[0]")
    Index(usize),
}

impl PathSegment {
    /// The segment as a mapping key
    fn key(&self) -> String {
        match self {
            PathSegment::Key(key) => key.clone(),
            PathSegment::Index(idx) => idx.to_string(),
        }
    }

    /// The segment as a sequence index, if it is numeric
    fn as_index(&self) -> Option<usize> {
        match self {
            PathSegment::Key(key) => key.parse().ok(),
            PathSegment::Index(idx) => Some(*idx),
        }
    }

    fn from_bracket(inner: &str) -> Self {
        let unquoted = inner
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .or_else(|| inner.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')));

        match unquoted {
            Some(key) => PathSegment::Key(key.to_string()),
            None => match inner.parse() {
                Ok(idx) => PathSegment::Index(idx),
                Err(_) => PathSegment::Key(inner.to_string()),
            },
        }
    }
}

/// Parse a path string into segments
///
/// Supports "key", "key.subkey", "key[0]", "key[0].subkey" and quoted
/// bracket keys ("key[\"a.b\"]"). Parsing never fails.
///
/// Empty keys between dots are kept, so `a..b`, `.a.b` and `a.b.` each
/// address a different slot than `a.b`. A dot right after a bracket only
/// separates.
pub fn parse_path(path: &str) -> Vec<PathSegment> {
    let mut segments = Vec::new();
    let mut current_key = String::new();
    let mut key_open = true;
    let mut chars = path.chars();

    while let Some(c) = chars.next() {
        match c {
            '.' => {
                if key_open || !current_key.is_empty() {
                    segments.push(PathSegment::Key(std::mem::take(&mut current_key)));
                }
                key_open = true;
            }
            '[' => {
                if !current_key.is_empty() {
                    segments.push(PathSegment::Key(std::mem::take(&mut current_key)));
                }
                let inner: String = chars.by_ref().take_while(|&c| c != ']').collect();
                if !inner.is_empty() {
                    segments.push(PathSegment::from_bracket(&inner));
                }
                key_open = false;
            }
            _ => current_key.push(c),
        }
    }

    if !current_key.is_empty() || path.ends_with('.') {
        segments.push(PathSegment::Key(current_key));
    }
    segments
}
