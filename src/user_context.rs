//! Per-user handle exposing the decide operations.

use std::collections::HashMap;

use crate::client::Client;
use crate::config::ProjectConfig;
use crate::core::{
    fingerprint, DecisionCache, DecisionCacheKey, DecisionOutcome, DecisionRequest, Event,
    MAX_EVENT_KEY_LENGTH,
};
use crate::error::{ErrorCode, FlagKitError, Result};
use crate::types::{AttributeValue, Attributes, DecideOption, DecideOptions, Decision};

/// A user bound to a [`Client`].
///
/// Decisions are memoized per context, keyed by flag, attribute fingerprint,
/// configuration generation and the options that shape the result. Changing
/// attributes or forced decisions empties the memo.
pub struct UserContext {
    client: Client,
    user_id: String,
    attributes: Attributes,
    forced_decisions: HashMap<String, String>,
    fingerprint: u64,
    cache: Option<DecisionCache>,
}

impl UserContext {
    pub(crate) fn new(client: Client, user_id: String, attributes: Attributes) -> Self {
        let options = client.options();
        let cache = options
            .cache_enabled
            .then(|| DecisionCache::new(options.max_cache_size, options.cache_ttl));
        let forced_decisions = HashMap::new();

        Self {
            fingerprint: fingerprint(&attributes, &forced_decisions),
            client,
            user_id,
            attributes,
            forced_decisions,
            cache,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<AttributeValue>) {
        self.attributes.insert(name.into(), value.into());
        self.invalidate();
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<AttributeValue> {
        let removed = self.attributes.remove(name);
        if removed.is_some() {
            self.invalidate();
        }
        removed
    }

    /// Forces `variation_key` for `flag_key`, bypassing every rule.
    pub fn set_forced_decision(&mut self, flag_key: impl Into<String>, variation_key: impl Into<String>) {
        self.forced_decisions
            .insert(flag_key.into(), variation_key.into());
        self.invalidate();
    }

    pub fn forced_decision(&self, flag_key: &str) -> Option<&str> {
        self.forced_decisions.get(flag_key).map(String::as_str)
    }

    pub fn remove_forced_decision(&mut self, flag_key: &str) -> bool {
        let removed = self.forced_decisions.remove(flag_key).is_some();
        if removed {
            self.invalidate();
        }
        removed
    }

    pub fn remove_all_forced_decisions(&mut self) {
        if !self.forced_decisions.is_empty() {
            self.forced_decisions.clear();
            self.invalidate();
        }
    }

    fn invalidate(&mut self) {
        self.fingerprint = fingerprint(&self.attributes, &self.forced_decisions);
        if let Some(cache) = &self.cache {
            cache.clear();
        }
    }

    /// Decides one flag. Never fails: problems are reported in `Decision::reasons`.
    pub fn decide(&self, flag_key: &str, options: impl Into<DecideOptions>) -> Decision {
        let options = self.merged(options.into());
        let (config, generation) = self.client.snapshot();
        self.decide_in(&config, generation, flag_key, options)
    }

    /// Decides each key against one configuration snapshot.
    pub fn decide_for_keys<I, S>(&self, flag_keys: I, options: impl Into<DecideOptions>) -> HashMap<String, Decision>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let options = self.merged(options.into());
        let (config, generation) = self.client.snapshot();

        flag_keys
            .into_iter()
            .map(|key| self.decide_in(&config, generation, key.as_ref(), options))
            .filter(|d| d.enabled || !options.contains(DecideOption::EnabledFlagsOnly))
            .map(|d| (d.flag_key.clone(), d))
            .collect()
    }

    /// Decides every flag in the current configuration.
    pub fn decide_all(&self, options: impl Into<DecideOptions>) -> HashMap<String, Decision> {
        let (config, generation) = self.client.snapshot();
        let keys: Vec<&str> = config.flags().iter().map(|f| f.key.as_str()).collect();
        let options = self.merged(options.into());

        keys.into_iter()
            .map(|key| self.decide_in(&config, generation, key, options))
            .filter(|d| d.enabled || !options.contains(DecideOption::EnabledFlagsOnly))
            .map(|d| (d.flag_key.clone(), d))
            .collect()
    }

    /// Records a conversion for `event_key`.
    pub fn track_event(
        &self,
        event_key: &str,
        tags: HashMap<String, serde_json::Value>,
    ) -> Result<()> {
        if event_key.is_empty() || event_key.len() > MAX_EVENT_KEY_LENGTH {
            tracing::warn!(event = event_key, "Invalid event key");
            return Err(FlagKitError::new(
                ErrorCode::EventInvalidKey,
                format!("Event key must be 1 to {} bytes", MAX_EVENT_KEY_LENGTH),
            ));
        }

        let config = self.client.config();
        let Some(definition) = config.event(event_key) else {
            tracing::warn!(event = event_key, "Event key is not in the datafile; not tracking");
            return Err(FlagKitError::new(
                ErrorCode::EventInvalidKey,
                format!("Event key \"{}\" is not in the datafile", event_key),
            ));
        };

        let event = Event::conversion(&config, &self.user_id, &self.attributes, definition, tags);
        self.client.dispatch(event);
        Ok(())
    }

    fn merged(&self, options: DecideOptions) -> DecideOptions {
        self.client.options().default_decide_options | options
    }

    fn decide_in(
        &self,
        config: &ProjectConfig,
        generation: u64,
        flag_key: &str,
        options: DecideOptions,
    ) -> Decision {
        let outcome = self.outcome(config, generation, flag_key, options);

        if !options.contains(DecideOption::DisableDecisionEvent) {
            if let Some(event) = Event::impression(config, &self.user_id, &self.attributes, &outcome) {
                self.client.dispatch(event);
            }
        }

        outcome.decision
    }

    fn outcome(
        &self,
        config: &ProjectConfig,
        generation: u64,
        flag_key: &str,
        options: DecideOptions,
    ) -> DecisionOutcome {
        let cache = self
            .cache
            .as_ref()
            .filter(|_| !options.contains(DecideOption::IgnoreCache));

        let key = cache.map(|_| DecisionCacheKey::new(flag_key, self.fingerprint, generation, options));

        if let (Some(cache), Some(key)) = (cache, key.as_ref()) {
            if let Some(hit) = cache.get(key) {
                tracing::debug!(flag = flag_key, user = %self.user_id, "Decision cache hit");
                return hit;
            }
        }

        let request = DecisionRequest {
            user_id: &self.user_id,
            attributes: &self.attributes,
            forced_decisions: &self.forced_decisions,
            options,
        };
        let outcome = self.client.decision_service().decide(config, flag_key, &request);

        if let (Some(cache), Some(key)) = (cache, key) {
            cache.set(key, outcome.clone());
        }
        outcome
    }
}

impl Clone for UserContext {
    /// The clone starts with an empty decision cache.
    fn clone(&self) -> Self {
        let mut context = Self::new(self.client.clone(), self.user_id.clone(), self.attributes.clone());
        context.forced_decisions = self.forced_decisions.clone();
        context.fingerprint = self.fingerprint;
        context
    }
}

impl std::fmt::Debug for UserContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserContext")
            .field("user_id", &self.user_id)
            .field("attributes", &self.attributes)
            .field("forced_decisions", &self.forced_decisions)
            .finish()
    }
}
