use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::path::PathBuf;

use log::debug;

use crate::error::{CitreeError, Result};

/// Values a loader can hand back "empty", which the cache refuses to store.
pub trait CacheValue {
    fn is_vacant(&self) -> bool {
        false
    }
}

impl CacheValue for PathBuf {
    fn is_vacant(&self) -> bool {
        self.as_os_str().is_empty()
    }
}

impl CacheValue for String {
    fn is_vacant(&self) -> bool {
        self.is_empty()
    }
}

impl<T> CacheValue for Vec<T> {
    fn is_vacant(&self) -> bool {
        self.is_empty()
    }
}

/// Key to value memoizer that loads missing entries on demand.
///
/// Not synchronized; wrap it in a mutex to share it.
pub struct ReadThroughCache<K, V> {
    entries: HashMap<K, V>,
}

impl<K, V> Default for ReadThroughCache<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K, V> ReadThroughCache<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone + CacheValue,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns the cached value, calling `loader` once on a miss and storing
    /// what it produced. An absent or vacant result is an error and leaves the
    /// cache untouched.
    pub fn get<F>(&mut self, key: &K, loader: F) -> Result<V>
    where
        F: FnOnce(&K) -> Result<Option<V>>,
    {
        if let Some(value) = self.entries.get(key) {
            debug!("Cache hit for {key:?}");
            return Ok(value.clone());
        }

        let value = loader(key)?
            .filter(|value| !value.is_vacant())
            .ok_or_else(|| CitreeError::CacheIntegrity(format!("{key:?}")))?;

        self.entries.insert(key.clone(), value.clone());
        Ok(value)
    }

    pub fn put(&mut self, key: K, value: V) {
        self.entries.insert(key, value);
    }

    pub fn delete(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter()
    }
}
