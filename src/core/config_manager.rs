//! Holder of the current configuration snapshot.
//!
//! Readers clone the `Arc` and release the lock before evaluating, so a swap never
//! affects a decision that already started.

use parking_lot::RwLock;
use std::sync::Arc;

use crate::config::ProjectConfig;
use crate::error::Result;

/// Atomically swappable [`ProjectConfig`].
///
/// # Example
///
/// ```rust
/// use flagkit_engine::config::ProjectConfig;
/// use flagkit_engine::core::ConfigManager;
///
/// let initial = ProjectConfig::from_json(r#"{"revision": "1"}"#).unwrap();
/// let manager = ConfigManager::new(initial);
///
/// let before = manager.current();
/// manager.update_json(r#"{"revision": "2"}"#).unwrap();
///
/// assert_eq!(before.revision(), 1);
/// assert_eq!(manager.current().revision(), 2);
/// ```
pub struct ConfigManager {
    current: RwLock<Published>,
}

/// A snapshot and the publication that installed it.
struct Published {
    config: Arc<ProjectConfig>,
    generation: u64,
}

impl ConfigManager {
    pub fn new(config: ProjectConfig) -> Self {
        Self {
            current: RwLock::new(Published {
                config: Arc::new(config),
                generation: 0,
            }),
        }
    }

    /// The snapshot in effect right now.
    pub fn current(&self) -> Arc<ProjectConfig> {
        Arc::clone(&self.current.read().config)
    }

    /// The current snapshot together with its generation, read under one lock.
    ///
    /// Generations increase with every [`replace`](Self::replace), including swaps that
    /// keep the datafile revision.
    pub fn snapshot(&self) -> (Arc<ProjectConfig>, u64) {
        let current = self.current.read();
        (Arc::clone(&current.config), current.generation)
    }

    pub fn generation(&self) -> u64 {
        self.current.read().generation
    }

    pub fn revision(&self) -> u32 {
        self.current.read().config.revision()
    }

    /// Publishes `config` and returns the snapshot it replaced.
    pub fn replace(&self, config: ProjectConfig) -> Arc<ProjectConfig> {
        let to = config.revision();
        let (previous, generation) = {
            let mut current = self.current.write();
            let generation = current.generation + 1;
            let previous = std::mem::replace(
                &mut *current,
                Published {
                    config: Arc::new(config),
                    generation,
                },
            );
            (previous.config, generation)
        };
        tracing::info!(
            from = previous.revision(),
            to,
            generation,
            "Project configuration swapped"
        );
        previous
    }

    /// Parses and publishes a datafile. On failure the current snapshot stays in place.
    pub fn update_json(&self, content: &str) -> Result<Arc<ProjectConfig>> {
        let config = ProjectConfig::from_json(content)?;
        Ok(self.replace(config))
    }
}

impl std::fmt::Debug for ConfigManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigManager")
            .field("revision", &self.revision())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(revision: u32) -> ProjectConfig {
        ProjectConfig::from_json(&format!(r#"{{"revision": "{}"}}"#, revision)).unwrap()
    }

    #[test]
    fn test_replace_returns_previous() {
        let manager = ConfigManager::new(config(1));
        let previous = manager.replace(config(2));
        assert_eq!(previous.revision(), 1);
        assert_eq!(manager.revision(), 2);
    }

    #[test]
    fn test_held_snapshot_is_unaffected() {
        let manager = ConfigManager::new(config(1));
        let held = manager.current();
        manager.replace(config(5));
        assert_eq!(held.revision(), 1);
        assert_eq!(manager.current().revision(), 5);
    }

    #[test]
    fn test_generation_advances_on_same_revision() {
        let manager = ConfigManager::new(config(7));
        let (_, first) = manager.snapshot();
        manager.replace(config(7));
        let (snapshot, second) = manager.snapshot();

        assert_eq!(snapshot.revision(), 7);
        assert_eq!(first, 0);
        assert_eq!(second, 1);
        assert!(manager.update_json("not json").is_err());
        assert_eq!(manager.generation(), 1);
    }

    #[test]
    fn test_invalid_update_keeps_current() {
        let manager = ConfigManager::new(config(3));
        assert!(manager.update_json("not json").is_err());
        assert!(manager.update_json(r#"{"revision": "x"}"#).is_err());
        assert_eq!(manager.revision(), 3);
    }

    #[test]
    fn test_concurrent_readers_see_whole_snapshots() {
        let manager = Arc::new(ConfigManager::new(config(1)));
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let manager = Arc::clone(&manager);
                std::thread::spawn(move || {
                    for _ in 0..1_000 {
                        let snapshot = manager.current();
                        assert!(snapshot.revision() >= 1);
                    }
                })
            })
            .collect();

        for revision in 2..50 {
            manager.replace(config(revision));
        }
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(manager.revision(), 49);
    }
}
