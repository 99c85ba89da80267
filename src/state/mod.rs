//! Shared application state and the pure round-protocol logic.

pub mod lifecycle;
pub mod scoring;
mod sse;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::{config::AppConfig, dao::session_store::SessionStore, generator::SnippetGenerator};

pub use self::sse::SseHub;

/// Shared handle to the application state, cloned cheaply across tasks.
pub type SharedState = Arc<AppState>;

/// Per-session SSE fan-out capacity.
const SSE_CAPACITY: usize = 16;

/// Central application state: store and generator handles, per-session SSE
/// hubs, and the registry of running host controller tasks.
pub struct AppState {
    config: AppConfig,
    store: Arc<dyn SessionStore>,
    generator: Arc<dyn SnippetGenerator>,
    hubs: DashMap<Uuid, Arc<SseHub>>,
    hosts: DashMap<Uuid, JoinHandle<()>>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`].
    pub fn new(
        config: AppConfig,
        store: Arc<dyn SessionStore>,
        generator: Arc<dyn SnippetGenerator>,
    ) -> SharedState {
        Arc::new(Self {
            config,
            store,
            generator,
            hubs: DashMap::new(),
            hosts: DashMap::new(),
        })
    }

    /// Immutable runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Handle to the session document store.
    pub fn store(&self) -> Arc<dyn SessionStore> {
        self.store.clone()
    }

    /// Handle to the snippet generator backend.
    pub fn generator(&self) -> Arc<dyn SnippetGenerator> {
        self.generator.clone()
    }

    /// SSE hub for one session, created lazily on first access.
    pub fn session_hub(&self, id: Uuid) -> Arc<SseHub> {
        self.hubs
            .entry(id)
            .or_insert_with(|| Arc::new(SseHub::new(SSE_CAPACITY)))
            .clone()
    }

    /// Whether a host controller task is currently registered for a session.
    pub fn host_running(&self, id: Uuid) -> bool {
        self.hosts.contains_key(&id)
    }

    /// Record the host controller task handle for a session.
    pub fn register_host(&self, id: Uuid, handle: JoinHandle<()>) {
        self.hosts.insert(id, handle);
    }

    /// Drop the host controller registration once the task has stopped.
    pub fn forget_host(&self, id: Uuid) {
        self.hosts.remove(&id);
    }
}
