use std::sync::Arc;

use anyhow::Result;
use futures_util::lock::Mutex;

use crate::names::registry::{
    Handle,
    Key,
    NameRegistry,
};

/// A shared [`NameRegistry`] of reference-counted entities.
///
/// Every manager keeps its children in a directory. The lock is only held for registry
/// bookkeeping, never across protocol work.
#[derive(Debug)]
pub struct Directory<T> {
    registry: Mutex<NameRegistry<Arc<T>>>,
}

impl<T> Directory<T> {
    pub(crate) fn new(kind: &'static str) -> Self {
        Self {
            registry: Mutex::new(NameRegistry::new(kind)),
        }
    }

    /// Registers a new entity built from its own handle and name.
    pub(crate) async fn insert_with<F>(&self, name: Option<String>, make: F) -> Result<Arc<T>>
    where
        F: FnOnce(Handle, &str) -> T,
    {
        let mut registry = self.registry.lock().await;
        let entity = registry.register_with(name, |handle, name| Arc::new(make(handle, name)))?;
        Ok(entity.clone())
    }

    /// Looks up an entity by name or handle.
    pub async fn get<K>(&self, key: K) -> Result<Arc<T>>
    where
        K: Into<Key>,
    {
        let key = key.into();
        Ok(self.registry.lock().await.get(key)?.clone())
    }

    /// Checks if an entity exists for the name or handle.
    pub async fn contains<K>(&self, key: K) -> bool
    where
        K: Into<Key>,
    {
        let key = key.into();
        self.registry.lock().await.contains(key)
    }

    /// All names, in creation order.
    pub async fn names(&self) -> Vec<String> {
        self.registry
            .lock()
            .await
            .names()
            .map(|name| name.to_owned())
            .collect()
    }

    /// All entities with their handles and names, in creation order.
    pub async fn entries(&self) -> Vec<(Handle, String, Arc<T>)> {
        self.registry
            .lock()
            .await
            .iter()
            .map(|(handle, name, entity)| (handle, name.to_owned(), entity.clone()))
            .collect()
    }

    /// Removes an entity from the directory.
    ///
    /// The entity itself keeps running. Its name is never reused.
    pub async fn remove<K>(&self, key: K) -> Result<Arc<T>>
    where
        K: Into<Key>,
    {
        let key = key.into();
        Ok(self.registry.lock().await.remove(key)?)
    }

    /// The number of entities.
    pub async fn len(&self) -> usize {
        self.registry.lock().await.len()
    }

    /// Checks if the directory is empty.
    pub async fn is_empty(&self) -> bool {
        self.registry.lock().await.is_empty()
    }
}
