//! Session registry: one authenticated automation context per session id
//!
//! Sessions are created lazily, reused idempotently, and closed explicitly.
//! The registry is owned by the job runner and passed down — there is no
//! process-global map, so two jobs can never share a session by accident.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::domain::errors::PipelineError;
use crate::domain::services::{DriverFactory, PageDriver};

/// One live session: a page driver plus its authentication state.
pub struct Session {
    id: String,
    driver: Arc<dyn PageDriver>,
    auth_ok: AtomicBool,
    login_attempts: AtomicU32,
    cookie_handled: AtomicBool,
}

impl Session {
    fn new(id: String, driver: Arc<dyn PageDriver>) -> Self {
        Self {
            id,
            driver,
            auth_ok: AtomicBool::new(false),
            login_attempts: AtomicU32::new(0),
            cookie_handled: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn driver(&self) -> &Arc<dyn PageDriver> {
        &self.driver
    }

    /// Run the login flow on this session. Failure is recorded, not fatal:
    /// the session stays usable for unauthenticated operations.
    pub async fn login(&self) -> bool {
        self.login_attempts.fetch_add(1, Ordering::SeqCst);
        let ok = match self.driver.login().await {
            Ok(ok) => ok,
            Err(e) => {
                warn!("⚠️  Login failed for session {}: {e}", self.id);
                false
            }
        };
        self.auth_ok.store(ok, Ordering::SeqCst);
        ok
    }

    pub fn auth_ok(&self) -> bool {
        self.auth_ok.load(Ordering::SeqCst)
    }

    /// How many times the login flow ran on this session.
    pub fn login_attempts(&self) -> u32 {
        self.login_attempts.load(Ordering::SeqCst)
    }

    /// Dismiss the cookie banner once per session, best-effort.
    pub async fn handle_cookie_banner_once(&self) {
        if !self.cookie_handled.swap(true, Ordering::SeqCst) {
            let _ = self.driver.dismiss_cookie_banner().await;
        }
    }

    pub async fn close(&self) {
        self.driver.close().await;
    }
}

/// Registry of live sessions keyed by an opaque session identifier.
pub struct SessionRegistry {
    factory: Arc<dyn DriverFactory>,
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new(factory: Arc<dyn DriverFactory>) -> Self {
        Self {
            factory,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Return the open session for `session_id`, constructing and
    /// initializing a new one (driver startup + one login attempt) if absent.
    pub async fn acquire(&self, session_id: &str) -> Result<Arc<Session>, PipelineError> {
        if let Some(session) = self.sessions.read().await.get(session_id) {
            return Ok(Arc::clone(session));
        }

        // The write lock covers construction so a concurrent acquire of the
        // same id cannot trigger a second login.
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get(session_id) {
            return Ok(Arc::clone(session));
        }

        info!("🔐 Opening session: {session_id}");
        let driver = self.factory.create().await?;
        let session = Arc::new(Session::new(session_id.to_string(), driver));
        session.login().await;

        sessions.insert(session_id.to_string(), Arc::clone(&session));
        Ok(session)
    }

    /// Close and evict a session. No-op if the id is already absent.
    pub async fn release(&self, session_id: &str) {
        let removed = self.sessions.write().await.remove(session_id);
        if let Some(session) = removed {
            session.close().await;
            info!("Closed session: {session_id}");
        }
    }

    /// Close every open session (used on cancellation).
    pub async fn release_all(&self) {
        let drained: Vec<Arc<Session>> = self.sessions.write().await.drain().map(|(_, s)| s).collect();
        for session in drained {
            session.close().await;
        }
    }

    pub async fn contains(&self, session_id: &str) -> bool {
        self.sessions.read().await.contains_key(session_id)
    }
}
