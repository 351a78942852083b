//! Shared execution context with heterogeneous, concurrently writable storage.

use dashmap::DashMap;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Type-safe context key wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextKey(String);

impl ContextKey {
    /// Creates a new ContextKey.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ContextKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ContextKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for ContextKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for ContextKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Key/value store shared by every node of a run.
///
/// Cloning an `ExecutionContext` clones the handle, not the data: all clones
/// read and write the same map. Concurrent writers to the same key race and
/// the last write wins; no value is ever torn.
///
/// # Examples
///
/// ```
/// use kumiki_core::ExecutionContext;
///
/// let ctx = ExecutionContext::new();
/// ctx.insert("user_id", 123u64);
/// ctx.insert("name", "Alice".to_string());
///
/// let shared = ctx.clone();
/// shared.insert("active", true);
///
/// assert_eq!(ctx.get::<u64>("user_id").as_deref(), Some(&123));
/// assert_eq!(ctx.get_cloned::<String>("name"), Some("Alice".to_string()));
/// assert_eq!(ctx.get::<bool>("active").as_deref(), Some(&true));
///
/// // Wrong type returns None
/// assert!(ctx.get::<String>("user_id").is_none());
/// ```
#[derive(Clone)]
pub struct ExecutionContext {
    data: Arc<DashMap<ContextKey, Arc<dyn Any + Send + Sync>>>,
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("keys", &self.keys())
            .finish()
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionContext {
    /// Creates a new empty context.
    pub fn new() -> Self {
        Self {
            data: Arc::new(DashMap::new()),
        }
    }

    /// Inserts a value with the given key, replacing any previous value.
    pub fn insert<T: Any + Send + Sync>(&self, key: impl Into<ContextKey>, value: T) {
        self.data.insert(key.into(), Arc::new(value));
    }

    /// Returns the value for the given key.
    ///
    /// Returns `None` if the key doesn't exist or the type doesn't match.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        let value = self.data.get(key).map(|entry| Arc::clone(entry.value()))?;
        value.downcast::<T>().ok()
    }

    /// Returns a clone of the value for the given key.
    pub fn get_cloned<T: Any + Send + Sync + Clone>(&self, key: &str) -> Option<T> {
        self.get::<T>(key).map(|value| T::clone(&value))
    }

    /// Removes the entry for the given key. Returns `true` if it existed.
    pub fn remove(&self, key: &str) -> bool {
        self.data.remove(key).is_some()
    }

    /// Returns `true` if the context contains a value for the given key.
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Returns a sorted snapshot of the keys currently stored.
    pub fn keys(&self) -> Vec<ContextKey> {
        let mut keys: Vec<ContextKey> = self
            .data
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        keys
    }

    /// Returns the number of entries in the context.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the context contains no entries.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` if both handles point at the same underlying store.
    pub fn same_as(&self, other: &ExecutionContext) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heterogeneous_storage() {
        let ctx = ExecutionContext::new();

        ctx.insert("int", 42i32);
        ctx.insert("string", "hello".to_string());
        ctx.insert("bool", true);

        assert_eq!(ctx.get::<i32>("int").as_deref(), Some(&42));
        assert_eq!(ctx.get_cloned::<String>("string"), Some("hello".to_string()));
        assert_eq!(ctx.get::<bool>("bool").as_deref(), Some(&true));

        // Wrong type returns None
        assert!(ctx.get::<String>("int").is_none());
    }

    #[test]
    fn test_clones_share_storage() {
        let ctx = ExecutionContext::new();
        let other = ctx.clone();
        other.insert("written_by_clone", 1u8);

        assert!(ctx.contains_key("written_by_clone"));
        assert!(ctx.same_as(&other));
        assert!(!ctx.same_as(&ExecutionContext::new()));
    }

    #[test]
    fn test_remove_and_keys() {
        let ctx = ExecutionContext::new();
        ctx.insert("b", 2u32);
        ctx.insert("a", 1u32);

        assert_eq!(ctx.keys(), vec![ContextKey::new("a"), ContextKey::new("b")]);
        assert!(ctx.remove("a"));
        assert!(!ctx.remove("a"));
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn test_concurrent_writers_keep_one_value() {
        let ctx = ExecutionContext::new();
        let handles: Vec<_> = (0..8u32)
            .map(|i| {
                let ctx = ctx.clone();
                std::thread::spawn(move || ctx.insert("shared", i))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let value = ctx.get_cloned::<u32>("shared").unwrap();
        assert!(value < 8);
    }

    #[test]
    fn test_context_key() {
        let key1 = ContextKey::new("test");
        let key2: ContextKey = "test".into();
        assert_eq!(key1, key2);
    }
}
