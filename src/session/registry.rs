use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use crate::config::RenderSessionOpts;
use crate::foundation::core::PixelSize;
use crate::foundation::error::{PostError, PostResult};
use crate::session::{AsyncRenderContext, RenderSession};

/// Builds a fresh renderer for a new session.
pub type RendererFactory = Box<dyn Fn() -> Box<dyn AsyncRenderContext> + Send + Sync>;

/// A session shared between the host and whoever drives it.
pub type SharedSession = Arc<Mutex<RenderSession>>;

struct RendererEntry {
    name: String,
    factory: RendererFactory,
}

/// Render engines known to the host, keyed by engine id.
///
/// Built once at startup and handed to whatever needs to create sessions.
#[derive(Default)]
pub struct RendererRegistry {
    engines: RwLock<BTreeMap<Uuid, RendererEntry>>,
}

impl std::fmt::Debug for RendererRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let engines = self.engines.read();
        f.debug_map()
            .entries(engines.iter().map(|(id, e)| (id, &e.name)))
            .finish()
    }
}

impl RendererRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an engine. Fails if `engine_id` is taken.
    pub fn register(
        &self,
        engine_id: Uuid,
        name: impl Into<String>,
        factory: RendererFactory,
    ) -> PostResult<()> {
        let mut engines = self.engines.write();
        if engines.contains_key(&engine_id) {
            return Err(PostError::validation(format!(
                "render engine {engine_id} already registered"
            )));
        }
        engines.insert(
            engine_id,
            RendererEntry {
                name: name.into(),
                factory,
            },
        );
        Ok(())
    }

    /// Display name of an engine.
    pub fn name(&self, engine_id: Uuid) -> Option<String> {
        self.engines.read().get(&engine_id).map(|e| e.name.clone())
    }

    /// Registered engine ids.
    pub fn engine_ids(&self) -> Vec<Uuid> {
        self.engines.read().keys().copied().collect()
    }

    /// New idle renderer of the given engine.
    pub fn create(&self, engine_id: Uuid) -> Option<Box<dyn AsyncRenderContext>> {
        self.engines.read().get(&engine_id).map(|e| (e.factory)())
    }
}

/// Live sessions, keyed by session id.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, SharedSession>>,
}

impl SessionRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session for `engine_id` and track it.
    pub fn create_session(
        &self,
        renderers: &RendererRegistry,
        engine_id: Uuid,
        document: impl Into<String>,
        size: PixelSize,
        opts: RenderSessionOpts,
    ) -> PostResult<SharedSession> {
        let renderer = renderers
            .create(engine_id)
            .ok_or_else(|| PostError::session(format!("unknown render engine {engine_id}")))?;
        let session = RenderSession::new(engine_id, document, size, renderer, opts)?;
        Ok(self.insert(session))
    }

    /// Track an existing session.
    pub fn insert(&self, session: RenderSession) -> SharedSession {
        let id = session.id();
        let shared = Arc::new(Mutex::new(session));
        self.sessions.write().insert(id, Arc::clone(&shared));
        shared
    }

    /// Look up a session.
    pub fn get(&self, id: Uuid) -> Option<SharedSession> {
        self.sessions.read().get(&id).cloned()
    }

    /// Delete a session and stop tracking it.
    pub fn delete(&self, id: Uuid) -> Option<SharedSession> {
        let session = self.sessions.write().remove(&id)?;
        session.lock().delete();
        Some(session)
    }

    /// Ids of all tracked sessions.
    pub fn ids(&self) -> Vec<Uuid> {
        self.sessions.read().keys().copied().collect()
    }

    /// Number of tracked sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// No session is tracked.
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}
