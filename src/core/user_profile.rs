//! Sticky bucketing: remembers which variation a user saw in each experiment.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::Result;

/// A user's stored experiment assignments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: String,
    /// Experiment id → variation id.
    pub experiment_bucket_map: HashMap<String, String>,
}

impl UserProfile {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            experiment_bucket_map: HashMap::new(),
        }
    }

    pub fn variation_for(&self, experiment_id: &str) -> Option<&str> {
        self.experiment_bucket_map.get(experiment_id).map(String::as_str)
    }

    pub fn set_variation(&mut self, experiment_id: impl Into<String>, variation_id: impl Into<String>) {
        self.experiment_bucket_map
            .insert(experiment_id.into(), variation_id.into());
    }
}

/// Storage for user profiles. Failures surface as decision reasons, never as errors.
pub trait UserProfileService: Send + Sync {
    fn lookup(&self, user_id: &str) -> Result<Option<UserProfile>>;
    fn save(&self, profile: UserProfile) -> Result<()>;
}

/// Process-local profile store.
#[derive(Debug, Default)]
pub struct InMemoryUserProfileService {
    profiles: RwLock<HashMap<String, UserProfile>>,
}

impl InMemoryUserProfileService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.profiles.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.read().is_empty()
    }
}

impl UserProfileService for InMemoryUserProfileService {
    fn lookup(&self, user_id: &str) -> Result<Option<UserProfile>> {
        Ok(self.profiles.read().get(user_id).cloned())
    }

    fn save(&self, profile: UserProfile) -> Result<()> {
        self.profiles.write().insert(profile.user_id.clone(), profile);
        Ok(())
    }
}
