use std::fmt::Display;

use ahash::HashMap;

use crate::{
    core::error::UnknownNameError,
    names::generator::unique_name,
};

/// A key for looking up an entry in a [`NamedLog`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogKey {
    Name(String),
    Index(usize),
}

impl Display for LogKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Name(name) => write!(f, "{name}"),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

impl From<&str> for LogKey {
    fn from(value: &str) -> Self {
        match value.parse() {
            Ok(index) => Self::Index(index),
            Err(_) => Self::Name(value.to_owned()),
        }
    }
}

impl From<usize> for LogKey {
    fn from(value: usize) -> Self {
        Self::Index(value)
    }
}

/// An append-only log of entries, each given a generated name.
///
/// Unlike [`NameRegistry`][`crate::names::registry::NameRegistry`], entries do not know their own
/// name, so no reverse mapping is kept.
#[derive(Debug)]
pub struct NamedLog<T> {
    kind: &'static str,
    entries: Vec<T>,
    names: Vec<String>,
    indices: HashMap<String, usize>,
}

impl<T> NamedLog<T> {
    /// Creates a new log.
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: Vec::new(),
            names: Vec::new(),
            indices: HashMap::default(),
        }
    }

    /// Appends an entry, returning its index and generated name.
    pub fn push(&mut self, entry: T) -> (usize, String) {
        let name = unique_name(None, |name| self.indices.contains_key(name));
        let index = self.entries.len();
        self.entries.push(entry);
        self.names.push(name.clone());
        self.indices.insert(name.clone(), index);
        (index, name)
    }

    /// Looks up an entry by name or index.
    pub fn get<K>(&self, key: K) -> Result<&T, UnknownNameError>
    where
        K: Into<LogKey>,
    {
        let key = key.into();
        let index = match &key {
            LogKey::Name(name) => self.indices.get(name).cloned(),
            LogKey::Index(index) => Some(*index),
        };
        index
            .and_then(|index| self.entries.get(index))
            .ok_or_else(|| UnknownNameError::new(self.kind, key.to_string()))
    }

    /// All names, in arrival order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(|name| name.as_str())
    }

    /// All entries, in arrival order.
    pub fn entries(&self) -> &[T] {
        &self.entries
    }

    /// The most recent entry.
    pub fn last(&self) -> Option<&T> {
        self.entries.last()
    }

    /// The number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Checks if the log is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
