//! FlagKit decision engine
//!
//! Deterministic feature-flag and experiment decisions over an immutable project
//! configuration.
//!
//! # Quick Start
//!
//! ```
//! use flagkit_engine::{Attributes, Client, DecideOption, DecideOptions};
//!
//! let datafile = r#"{
//!     "revision": "1",
//!     "rollouts": [{
//!         "id": "r1",
//!         "experiments": [{
//!             "id": "rule1", "key": "everyone",
//!             "trafficAllocation": [{"entityId": "v1", "endOfRange": 10000}],
//!             "variations": [{"id": "v1", "key": "on"}]
//!         }]
//!     }],
//!     "featureFlags": [{"id": "f1", "key": "new_checkout", "rolloutId": "r1"}]
//! }"#;
//!
//! let client = Client::from_json(datafile)?;
//! let user = client.create_user_context("user-123", Attributes::new());
//!
//! let decision = user.decide("new_checkout", DecideOptions::empty());
//! assert!(decision.enabled);
//!
//! // Same result, no impression event.
//! let quiet = user.decide("new_checkout", DecideOption::DisableDecisionEvent);
//! assert_eq!(decision, quiet);
//! # Ok::<(), flagkit_engine::FlagKitError>(())
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod types;
pub mod utils;
mod client;
mod user_context;

// Re-exports from types module
pub use types::{
    AttributeValue, Attributes, DecideOption, DecideOptions, Decision, DecisionSource,
    OFF_VARIATION_KEY,
};

// Re-exports from error module
pub use error::{ErrorCode, FlagKitError, Result};

// Re-exports from config module
pub use config::{Datafile, ProjectConfig};

// Re-exports from core module
pub use crate::core::{
    Bucketer, ClientOptions, ClientOptionsBuilder, Event, EventDispatcher, EventKind, EventQueue,
    EventQueueConfig, EventSendFuture, EventSender, InMemoryUserProfileService, MurmurBucketer,
    UserProfile, UserProfileService,
};

// Re-exports from client module
pub use client::{Client, ClientBuilder, SDK_VERSION};
pub use user_context::UserContext;
