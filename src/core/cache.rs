use parking_lot::RwLock;
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::core::decision_service::DecisionOutcome;
use crate::types::{AttributeValue, Attributes, DecideOptions};

struct CacheEntry<T> {
    value: T,
    expires_at: Instant,
    last_accessed: AtomicU64,
}

/// Thread-safe cache with TTL and LRU eviction.
///
/// Lookups take the read lock only; recency is tracked with a logical clock.
pub struct Cache<K, V> {
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
    clock: AtomicU64,
    max_size: usize,
    ttl: Duration,
}

impl<K: Eq + Hash + Clone, V: Clone> Cache<K, V> {
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock: AtomicU64::new(0),
            max_size,
            ttl,
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();

        {
            let entries = self.entries.read();
            match entries.get(key) {
                Some(entry) if now < entry.expires_at => {
                    entry.last_accessed.store(self.tick(), Ordering::Relaxed);
                    return Some(entry.value.clone());
                }
                Some(_) => {}
                None => return None,
            }
        }

        let mut entries = self.entries.write();
        if entries.get(key).is_some_and(|e| now >= e.expires_at) {
            entries.remove(key);
        }
        None
    }

    pub fn set(&self, key: K, value: V) {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + self.ttl,
            last_accessed: AtomicU64::new(self.tick()),
        };

        let mut entries = self.entries.write();
        entries.insert(key, entry);
        self.evict_if_needed(&mut entries);
    }

    pub fn remove(&self, key: &K) -> bool {
        self.entries.write().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn evict_if_needed(&self, entries: &mut HashMap<K, CacheEntry<V>>) {
        if entries.len() <= self.max_size {
            return;
        }

        let now = Instant::now();
        entries.retain(|_, entry| now < entry.expires_at);

        while entries.len() > self.max_size {
            let lru_key = entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_accessed.load(Ordering::Relaxed))
                .map(|(k, _)| k.clone());

            match lru_key {
                Some(key) => {
                    entries.remove(&key);
                }
                None => break,
            }
        }
    }
}

/// Identity of a memoized decision.
///
/// `generation` names the configuration publication, not the datafile revision, so a
/// swap that keeps the revision still misses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DecisionCacheKey {
    pub flag_key: String,
    pub fingerprint: u64,
    pub generation: u64,
    options: u8,
}

impl DecisionCacheKey {
    /// Only options that change the decision's content take part in the key.
    pub fn new(flag_key: &str, fingerprint: u64, generation: u64, options: DecideOptions) -> Self {
        Self {
            flag_key: flag_key.to_string(),
            fingerprint,
            generation,
            options: options.output_affecting().bits(),
        }
    }
}

/// Order-independent digest of a user's attributes and forced decisions.
pub fn fingerprint(attributes: &Attributes, forced_decisions: &HashMap<String, String>) -> u64 {
    let mut hasher = DefaultHasher::new();

    let sorted: BTreeMap<&String, &AttributeValue> = attributes.iter().collect();
    for (name, value) in sorted {
        name.hash(&mut hasher);
        match value {
            AttributeValue::Bool(b) => (0u8, *b).hash(&mut hasher),
            AttributeValue::Number(n) => (1u8, n.to_bits()).hash(&mut hasher),
            AttributeValue::String(s) => (2u8, s).hash(&mut hasher),
            AttributeValue::Null => 3u8.hash(&mut hasher),
        }
    }

    let forced: BTreeMap<&String, &String> = forced_decisions.iter().collect();
    forced.hash(&mut hasher);

    hasher.finish()
}

/// Per-context memo of decision outcomes.
pub type DecisionCache = Cache<DecisionCacheKey, DecisionOutcome>;
