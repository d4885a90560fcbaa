use std::{
    collections::BTreeMap,
    fmt::Display,
    str::FromStr,
};

use ahash::{
    HashMap,
    HashSet,
};
use anyhow::Result;
use log::debug;

use crate::{
    core::error::{
        InvalidConfigError,
        UnknownNameError,
    },
    names::generator::{
        unique_name,
        validate_name,
    },
};

/// The identity of an entity within a single registry.
///
/// Handles are allocated sequentially and are never reused, even after the entity is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u64);

impl Handle {
    /// The raw value of the handle.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl FromStr for Handle {
    type Err = InvalidConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix('#')
            .and_then(|value| value.parse().ok())
            .map(Self)
            .ok_or_else(|| InvalidConfigError::new(format!("{s:?} is not a handle")))
    }
}

/// A key for looking up an entity in a [`NameRegistry`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Name(String),
    Handle(Handle),
}

impl Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Name(name) => write!(f, "{name}"),
            Self::Handle(handle) => write!(f, "{handle}"),
        }
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        match Handle::from_str(value) {
            Ok(handle) => Self::Handle(handle),
            Err(_) => Self::Name(value.to_owned()),
        }
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<&String> for Key {
    fn from(value: &String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<Handle> for Key {
    fn from(value: Handle) -> Self {
        Self::Handle(value)
    }
}

/// A registry of entities, each addressable by a unique name or by its handle.
///
/// Names are bound in both directions, so an entity's name can be recovered from its handle.
/// Removed names stay reserved for the lifetime of the registry.
#[derive(Debug)]
pub struct NameRegistry<T> {
    kind: &'static str,
    next_handle: u64,
    entries: BTreeMap<Handle, T>,
    names: HashMap<String, Handle>,
    handles: HashMap<Handle, String>,
    retired: HashSet<String>,
}

impl<T> NameRegistry<T> {
    /// Creates a new registry.
    ///
    /// `kind` describes the entities in error messages (e.g., "session").
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            next_handle: 1,
            entries: BTreeMap::new(),
            names: HashMap::default(),
            handles: HashMap::default(),
            retired: HashSet::default(),
        }
    }

    /// The kind of entity held by the registry.
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Registers a new entity, returning its handle and name.
    pub fn register(&mut self, entity: T, name: Option<String>) -> Result<(Handle, String)> {
        let (handle, name) = self.reserve(name)?;
        self.bind(handle, name.clone(), entity);
        Ok((handle, name))
    }

    /// Registers a new entity built from its own handle and name.
    pub fn register_with<F>(&mut self, name: Option<String>, make: F) -> Result<&T>
    where
        F: FnOnce(Handle, &str) -> T,
    {
        let (handle, name) = self.reserve(name)?;
        let entity = make(handle, &name);
        self.bind(handle, name, entity);
        self.entries
            .get(&handle)
            .ok_or_else(|| UnknownNameError::new(self.kind, handle.to_string()).into())
    }

    fn reserve(&mut self, name: Option<String>) -> Result<(Handle, String)> {
        if let Some(name) = &name {
            validate_name(name)?;
        }
        let name = unique_name(name, |name| self.is_taken(name));
        let handle = Handle(self.next_handle);
        self.next_handle += 1;
        Ok((handle, name))
    }

    fn bind(&mut self, handle: Handle, name: String, entity: T) {
        debug!("Registered {} {handle} with name {name}", self.kind);
        self.names.insert(name.clone(), handle);
        self.handles.insert(handle, name);
        self.entries.insert(handle, entity);
    }

    fn is_taken(&self, name: &str) -> bool {
        self.names.contains_key(name) || self.retired.contains(name)
    }

    fn resolve(&self, key: &Key) -> Option<Handle> {
        match key {
            Key::Name(name) => self.names.get(name).cloned(),
            Key::Handle(handle) => self.entries.contains_key(handle).then_some(*handle),
        }
    }

    /// Looks up an entity by name or handle.
    pub fn get<K>(&self, key: K) -> Result<&T, UnknownNameError>
    where
        K: Into<Key>,
    {
        let key = key.into();
        self.resolve(&key)
            .and_then(|handle| self.entries.get(&handle))
            .ok_or_else(|| UnknownNameError::new(self.kind, key.to_string()))
    }

    /// Checks if an entity exists for the name or handle.
    pub fn contains<K>(&self, key: K) -> bool
    where
        K: Into<Key>,
    {
        self.resolve(&key.into()).is_some()
    }

    /// The name bound to a handle.
    pub fn name_for(&self, handle: Handle) -> Option<&str> {
        self.handles.get(&handle).map(|name| name.as_str())
    }

    /// The handle bound to a name.
    pub fn handle_for(&self, name: &str) -> Option<Handle> {
        self.names.get(name).cloned()
    }

    /// All registered names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries
            .keys()
            .filter_map(|handle| self.name_for(*handle))
    }

    /// All registered entities, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (Handle, &str, &T)> {
        self.entries.iter().filter_map(|(handle, entity)| {
            self.name_for(*handle)
                .map(|name| (*handle, name, entity))
        })
    }

    /// Removes an entity.
    ///
    /// The entity's name is never handed out again.
    pub fn remove<K>(&mut self, key: K) -> Result<T, UnknownNameError>
    where
        K: Into<Key>,
    {
        let key = key.into();
        let handle = self
            .resolve(&key)
            .ok_or_else(|| UnknownNameError::new(self.kind, key.to_string()))?;
        if let Some(name) = self.handles.remove(&handle) {
            self.names.remove(&name);
            debug!("Removed {} {handle} with name {name}", self.kind);
            self.retired.insert(name);
        }
        self.entries
            .remove(&handle)
            .ok_or_else(|| UnknownNameError::new(self.kind, key.to_string()))
    }

    /// The number of registered entities.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Checks if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod registry_test {
    use std::str::FromStr;

    use ahash::HashSet;
    use regex::Regex;

    use crate::{
        core::error::UnknownNameError,
        names::registry::{
            Handle,
            Key,
            NameRegistry,
        },
    };

    #[test]
    fn generates_unique_names() {
        let pattern = Regex::new(r"^[A-Za-z][A-Za-z0-9]{7}$").unwrap();
        let mut registry = NameRegistry::new("thing");
        let mut names = HashSet::default();
        for i in 0..100 {
            let (_, name) = registry.register(i, None).unwrap();
            assert!(pattern.is_match(&name), "{name}");
            assert!(names.insert(name));
        }
        assert_eq!(registry.len(), 100);
    }

    #[test]
    fn looks_up_by_name_and_handle() {
        let mut registry = NameRegistry::new("thing");
        let (handle, name) = registry.register("a", Some("first".to_owned())).unwrap();
        assert_eq!(name, "first");
        assert_eq!(registry.get("first").unwrap(), &"a");
        assert_eq!(registry.get(handle).unwrap(), &"a");
        assert_eq!(registry.get(handle.to_string()).unwrap(), &"a");
        assert_eq!(registry.name_for(handle), Some("first"));
        assert_eq!(registry.handle_for("first"), Some(handle));
        assert!(registry.contains("first"));
        assert!(!registry.contains("second"));
    }

    #[test]
    fn fails_unknown_lookup() {
        let registry = NameRegistry::<u32>::new("thing");
        assert_matches::assert_matches!(registry.get("missing"), Err(UnknownNameError { .. }) => {});
        assert_matches::assert_matches!(registry.get("#12"), Err(err) => {
            assert_eq!(err.to_string(), "no thing named #12");
        });
    }

    #[test]
    fn regenerates_colliding_name() {
        let mut registry = NameRegistry::new("thing");
        registry.register(1, Some("same".to_owned())).unwrap();
        let (_, name) = registry.register(2, Some("same".to_owned())).unwrap();
        assert_ne!(name, "same");
        assert_eq!(name.len(), 5);
        assert_eq!(registry.get("same").unwrap(), &1);
        assert_eq!(registry.get(name.as_str()).unwrap(), &2);
    }

    #[test]
    fn never_reuses_removed_names() {
        let mut registry = NameRegistry::new("thing");
        let (handle, _) = registry.register(1, Some("gone".to_owned())).unwrap();
        assert_eq!(registry.remove("gone").unwrap(), 1);
        assert!(!registry.contains(handle));
        let (new_handle, name) = registry.register(2, Some("gone".to_owned())).unwrap();
        assert_ne!(name, "gone");
        assert_ne!(new_handle, handle);
    }

    #[test]
    fn rejects_invalid_names() {
        let mut registry = NameRegistry::new("thing");
        assert_matches::assert_matches!(registry.register(1, Some("a.b".to_owned())), Err(_));
        assert!(registry.is_empty());
    }

    #[test]
    fn builds_entity_with_its_identity() {
        let mut registry = NameRegistry::new("thing");
        let entity = registry
            .register_with(Some("named".to_owned()), |handle, name| {
                format!("{handle} {name}")
            })
            .unwrap();
        assert_eq!(entity, "#1 named");
    }

    #[test]
    fn lists_names_in_registration_order() {
        let mut registry = NameRegistry::new("thing");
        for name in ["c", "a", "b"] {
            registry.register((), Some(name.to_owned())).unwrap();
        }
        pretty_assertions::assert_eq!(registry.names().collect::<Vec<_>>(), vec!["c", "a", "b"]);
    }

    #[test]
    fn parses_keys() {
        assert_eq!(Key::from("#3"), Key::Handle(Handle::from_str("#3").unwrap()));
        assert_eq!(Key::from("abc"), Key::Name("abc".to_owned()));
        assert_eq!(Key::from("#abc"), Key::Name("#abc".to_owned()));
    }
}
