pub mod audience;
mod bucketer;
mod cache;
mod config;
mod config_manager;
mod decision_service;
mod event_queue;
mod user_profile;

pub use bucketer::{Bucketer, MurmurBucketer, HASH_SEED};
pub use cache::{fingerprint, Cache, DecisionCache, DecisionCacheKey};
pub use config::{
    ClientOptions, ClientOptionsBuilder, DEFAULT_CACHE_TTL, DEFAULT_EVENT_BATCH_SIZE,
    DEFAULT_EVENT_FLUSH_INTERVAL, DEFAULT_MAX_CACHE_SIZE, DEFAULT_MAX_EVENT_QUEUE_SIZE,
};
pub use config_manager::ConfigManager;
pub use decision_service::{DecisionOutcome, DecisionRequest, DecisionService};
pub use event_queue::{
    Event, EventDispatcher, EventKind, EventQueue, EventQueueConfig, EventQueueConfigBuilder,
    EventSendFuture, EventSender, DEFAULT_BATCH_SIZE, DEFAULT_FLUSH_INTERVAL_SECS,
    DEFAULT_MAX_QUEUE_SIZE, MAX_EVENT_KEY_LENGTH,
};
pub use user_profile::{InMemoryUserProfileService, UserProfile, UserProfileService};
