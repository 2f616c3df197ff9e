//! LemmingCache: typed facade over a key-value store

use tracing::debug;

use crate::deadline::Deadline;
use crate::error::{Error, Result};
use crate::model::Lemming;
use crate::redis_store::RedisStore;
use crate::store::KvStore;

/// Prefix of every lemming key
pub const KEY_PREFIX: &str = "lemming:";

/// Store key for the lemming called `name`
pub fn lemming_key(name: &str) -> String {
    format!("{}{}", KEY_PREFIX, name)
}

/// Stores and retrieves [`Lemming`]s as JSON, keyed by name
///
/// Values are written without expiry. Errors from the store are returned
/// as-is inside [`Error::Store`]; nothing is retried.
#[derive(Debug, Clone)]
pub struct LemmingCache<S = RedisStore> {
    store: S,
}

impl LemmingCache<RedisStore> {
    /// Create a cache backed by the Redis-compatible server at `address`
    ///
    /// Never fails; an unreachable or malformed address is reported by the
    /// first operation.
    pub fn new(address: impl Into<String>) -> Self {
        Self::with_store(RedisStore::new(address))
    }
}

impl<S: KvStore> LemmingCache<S> {
    /// Create a cache over any store
    pub fn with_store(store: S) -> Self {
        Self { store }
    }

    /// Underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Consume the cache, returning its store
    pub fn into_store(self) -> S {
        self.store
    }

    /// Store a lemming under `lemming:<name>`, replacing any previous one
    ///
    /// # Arguments
    /// * `lemming` - Lemming to persist
    /// * `deadline` - Deadline for the store write
    pub fn store_lemming(&self, lemming: &Lemming, deadline: Deadline) -> Result<()> {
        let data = serde_json::to_vec(lemming).map_err(Error::Serialization)?;
        let key = lemming_key(&lemming.name);

        debug!(%key, bytes = data.len(), "storing lemming");
        self.store.set(&key, &data, deadline)?;
        Ok(())
    }

    /// Fetch the lemming stored under `lemming:<name>`
    ///
    /// # Arguments
    /// * `name` - Lemming name, used verbatim in the key
    /// * `deadline` - Deadline for the store read
    ///
    /// # Returns
    /// * `Err(Error::NotFound)` - Nothing stored under that name
    pub fn get_lemming(&self, name: &str, deadline: Deadline) -> Result<Lemming> {
        let key = lemming_key(name);

        let data = match self.store.get(&key, deadline)? {
            Some(data) => data,
            None => {
                debug!(%key, "lemming not found");
                return Err(Error::NotFound(name.to_string()));
            }
        };

        debug!(%key, bytes = data.len(), "fetched lemming");
        serde_json::from_slice(&data).map_err(Error::Deserialization)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::memory::MemoryStore;
    use crate::model::Mood;
    use proptest::prelude::*;
    use std::time::Duration;

    fn memory_cache() -> LemmingCache<MemoryStore> {
        LemmingCache::with_store(MemoryStore::new())
    }

    fn mood_strategy() -> impl Strategy<Value = Mood> {
        prop_oneof![
            Just(Mood::Happy),
            Just(Mood::Sad),
            Just(Mood::Angry),
            Just(Mood::Bored),
        ]
    }

    #[test]
    fn test_key_format() {
        assert_eq!(lemming_key("Hodor"), "lemming:Hodor");
        assert_eq!(lemming_key(""), "lemming:");
        assert_eq!(lemming_key("a:b c"), "lemming:a:b c");
    }

    #[test]
    fn test_store_and_get() {
        let cache = memory_cache();
        let lem = Lemming::new("Hodor", Mood::Happy);

        cache.store_lemming(&lem, Deadline::none()).unwrap();
        let result = cache.get_lemming("Hodor", Deadline::none()).unwrap();

        assert_eq!(result, lem);
    }

    #[test]
    fn test_get_missing() {
        let cache = memory_cache();
        cache
            .store_lemming(&Lemming::new("Hodor", Mood::Happy), Deadline::none())
            .unwrap();

        let result = cache.get_lemming("NoSuchLemming", Deadline::none());
        assert!(matches!(result, Err(Error::NotFound(ref name)) if name == "NoSuchLemming"));
    }

    #[test]
    fn test_stored_bytes_are_json() {
        let cache = memory_cache();
        cache
            .store_lemming(&Lemming::new("Hodor", Mood::Happy), Deadline::none())
            .unwrap();

        let raw = cache.store().lookup("lemming:Hodor").unwrap();
        assert_eq!(raw, br#"{"Name":"Hodor","Mood":"Happy"}"#);
    }

    #[test]
    fn test_overwrite() {
        let cache = memory_cache();
        cache
            .store_lemming(&Lemming::new("Hodor", Mood::Happy), Deadline::none())
            .unwrap();
        cache
            .store_lemming(&Lemming::new("Hodor", Mood::Angry), Deadline::none())
            .unwrap();

        let result = cache.get_lemming("Hodor", Deadline::none()).unwrap();
        assert_eq!(result.mood, Mood::Angry);
        assert_eq!(cache.store().len(), 1);
    }

    #[test]
    fn test_corrupt_value() {
        let cache = memory_cache();
        cache.store().insert("lemming:Broken", b"not json".to_vec());

        let result = cache.get_lemming("Broken", Deadline::none());
        assert!(matches!(result, Err(Error::Deserialization(_))));
    }

    #[test]
    fn test_wrong_shape() {
        let cache = memory_cache();
        cache.store().insert("lemming:Odd", br#"{"Name":"Odd"}"#.to_vec());

        let result = cache.get_lemming("Odd", Deadline::none());
        assert!(matches!(result, Err(Error::Deserialization(_))));
    }

    #[test]
    fn test_store_error_passed_through() {
        let cache = memory_cache();
        let lem = Lemming::new("Hodor", Mood::Happy);

        let result = cache.store_lemming(&lem, Deadline::after(Duration::ZERO));
        assert!(matches!(
            result,
            Err(Error::Store(StoreError::DeadlineExceeded { op: "SET" }))
        ));
        assert!(cache.store().is_empty());
    }

    #[test]
    fn test_shared_store() {
        let store = MemoryStore::new();
        let writer = LemmingCache::with_store(store.clone());
        let reader = LemmingCache::with_store(&store);

        let lem = Lemming::new("Shared", Mood::Sad);
        writer.store_lemming(&lem, Deadline::none()).unwrap();

        assert_eq!(reader.get_lemming("Shared", Deadline::none()).unwrap(), lem);
    }

    #[test]
    fn test_boxed_store() {
        let cache: LemmingCache<Box<dyn KvStore>> =
            LemmingCache::with_store(Box::new(MemoryStore::new()));
        let lem = Lemming::new("Boxed", Mood::Bored);

        cache.store_lemming(&lem, Deadline::none()).unwrap();
        assert_eq!(cache.get_lemming("Boxed", Deadline::none()).unwrap(), lem);
    }

    proptest! {
        #[test]
        fn prop_roundtrip(name in ".*", mood in mood_strategy()) {
            let cache = memory_cache();
            let lem = Lemming::new(name.clone(), mood);

            cache.store_lemming(&lem, Deadline::none()).unwrap();
            prop_assert_eq!(cache.get_lemming(&name, Deadline::none()).unwrap(), lem);
        }

        #[test]
        fn prop_last_write_wins(name in "[a-zA-Z0-9]{1,16}", first in mood_strategy(), second in mood_strategy()) {
            let cache = memory_cache();
            cache.store_lemming(&Lemming::new(name.clone(), first), Deadline::none()).unwrap();
            cache.store_lemming(&Lemming::new(name.clone(), second), Deadline::none()).unwrap();

            let result = cache.get_lemming(&name, Deadline::none()).unwrap();
            prop_assert_eq!(result.mood, second);
        }

        #[test]
        fn prop_idempotent_store(name in "[a-zA-Z0-9]{1,16}", mood in mood_strategy()) {
            let once = memory_cache();
            let twice = memory_cache();
            let lem = Lemming::new(name.clone(), mood);

            once.store_lemming(&lem, Deadline::none()).unwrap();
            twice.store_lemming(&lem, Deadline::none()).unwrap();
            twice.store_lemming(&lem, Deadline::none()).unwrap();

            prop_assert_eq!(once.store().len(), twice.store().len());
            prop_assert_eq!(
                once.store().lookup(&lemming_key(&name)),
                twice.store().lookup(&lemming_key(&name))
            );
        }

        #[test]
        fn prop_key_isolation(a in "[a-z]{1,8}", b in "[A-Z]{1,8}", mood in mood_strategy()) {
            let cache = memory_cache();
            cache.store_lemming(&Lemming::new(a.clone(), mood), Deadline::none()).unwrap();

            let result = cache.get_lemming(&b, Deadline::none());
            prop_assert!(matches!(result, Err(Error::NotFound(_))));
            prop_assert_eq!(cache.get_lemming(&a, Deadline::none()).unwrap().mood, mood);
        }
    }
}
