use std::sync::Arc;

use crate::config::ProjectConfig;
use crate::core::{
    Bucketer, ClientOptions, ConfigManager, DecisionService, Event, EventDispatcher, EventQueue,
    EventQueueConfig, EventSender, MurmurBucketer, UserProfileService,
};
use crate::error::Result;
use crate::types::Attributes;
use crate::user_context::UserContext;

pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

struct ClientInner {
    options: ClientOptions,
    config_manager: ConfigManager,
    decision_service: DecisionService,
    dispatcher: Arc<dyn EventDispatcher>,
    event_queue: Option<Arc<EventQueue>>,
}

/// Entry point of the engine. Cheap to clone; clones share configuration and event pipeline.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// Client with default options, murmur bucketing and an in-memory event queue.
    ///
    /// Events only leave the queue once [`start_event_delivery`](Self::start_event_delivery)
    /// runs. Until then a full queue drops its oldest events; set
    /// `ClientOptions::events_enabled` to false when nothing will deliver them.
    pub fn new(config: ProjectConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    /// Parses `datafile` and builds a client with default options.
    pub fn from_json(datafile: &str) -> Result<Self> {
        Self::new(ProjectConfig::from_json(datafile)?)
    }

    pub fn builder(config: ProjectConfig) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    /// Binds a user to this client.
    pub fn create_user_context(&self, user_id: impl Into<String>, attributes: Attributes) -> UserContext {
        UserContext::new(self.clone(), user_id.into(), attributes)
    }

    pub fn options(&self) -> &ClientOptions {
        &self.inner.options
    }

    /// The configuration snapshot currently in effect.
    pub fn config(&self) -> Arc<ProjectConfig> {
        self.inner.config_manager.current()
    }

    /// The current snapshot and its publication generation.
    pub(crate) fn snapshot(&self) -> (Arc<ProjectConfig>, u64) {
        self.inner.config_manager.snapshot()
    }

    pub fn revision(&self) -> u32 {
        self.inner.config_manager.revision()
    }

    /// Publishes a new configuration. Decisions already running keep their snapshot.
    pub fn update_config(&self, config: ProjectConfig) {
        self.inner.config_manager.replace(config);
    }

    /// Parses and publishes a datafile; the current configuration survives a failure.
    pub fn update_config_json(&self, datafile: &str) -> Result<()> {
        self.inner.config_manager.update_json(datafile).map(|_| ())
    }

    /// The built-in event queue, absent when a custom dispatcher was supplied.
    pub fn event_queue(&self) -> Option<&Arc<EventQueue>> {
        self.inner.event_queue.as_ref()
    }

    /// Starts delivering queued events through `sender`. Requires a tokio runtime.
    pub fn start_event_delivery(&self, sender: EventSender) {
        match &self.inner.event_queue {
            Some(queue) => queue.start(sender),
            None => tracing::warn!("Custom event dispatcher in use; nothing to start"),
        }
    }

    /// Flushes and stops the built-in event queue.
    pub async fn close(&self) {
        if let Some(queue) = &self.inner.event_queue {
            queue.stop().await;
        }
    }

    pub(crate) fn decision_service(&self) -> &DecisionService {
        &self.inner.decision_service
    }

    pub(crate) fn dispatch(&self, event: Event) {
        if self.inner.options.events_enabled {
            self.inner.dispatcher.dispatch(event);
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("options", &self.inner.options)
            .field("revision", &self.revision())
            .finish()
    }
}

/// Builder for [`Client`].
pub struct ClientBuilder {
    config: ProjectConfig,
    options: ClientOptions,
    bucketer: Arc<dyn Bucketer>,
    user_profile_service: Option<Arc<dyn UserProfileService>>,
    dispatcher: Option<Arc<dyn EventDispatcher>>,
}

impl ClientBuilder {
    pub fn new(config: ProjectConfig) -> Self {
        Self {
            config,
            options: ClientOptions::default(),
            bucketer: Arc::new(MurmurBucketer::new()),
            user_profile_service: None,
            dispatcher: None,
        }
    }

    pub fn options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    pub fn bucketer(mut self, bucketer: Arc<dyn Bucketer>) -> Self {
        self.bucketer = bucketer;
        self
    }

    pub fn user_profile_service(mut self, service: Arc<dyn UserProfileService>) -> Self {
        self.user_profile_service = Some(service);
        self
    }

    /// Replaces the built-in event queue.
    pub fn event_dispatcher(mut self, dispatcher: Arc<dyn EventDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn build(self) -> Result<Client> {
        self.options.validate()?;

        let (dispatcher, event_queue) = match self.dispatcher {
            Some(dispatcher) => (dispatcher, None),
            None => {
                let queue = Arc::new(EventQueue::new(EventQueueConfig::from(&self.options)));
                (Arc::clone(&queue) as Arc<dyn EventDispatcher>, Some(queue))
            }
        };

        tracing::debug!(
            revision = self.config.revision(),
            flags = self.config.flags().len(),
            "Client created"
        );

        Ok(Client {
            inner: Arc::new(ClientInner {
                options: self.options,
                config_manager: ConfigManager::new(self.config),
                decision_service: DecisionService::new(self.bucketer, self.user_profile_service),
                dispatcher,
                event_queue,
            }),
        })
    }
}
