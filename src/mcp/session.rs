//! Session tracking for streaming transports.
//!
//! Sessions are identified by random UUIDs and move through
//! `created -> active -> expired`. Expiry is lazy: a session idle for longer
//! than the inactivity timeout is dropped the next time it is touched, or by
//! a periodic [`SessionManager::sweep`]. The stdio session lives as long as
//! the process and never expires.
//!
//! Lookups hand out a cloned [`Session`], so a sweep that removes a session
//! cannot pull it out from under a request that already validated it.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Default inactivity timeout (30 minutes).
pub const DEFAULT_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Source of the current time, injectable for tests.
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> Instant;
}

/// Wall clock backed by [`Instant::now`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: std::sync::Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: std::sync::Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Which adapter a session belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Stdio,
    Sse,
    Http,
}

impl TransportKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stdio => "stdio",
            Self::Sse => "sse",
            Self::Http => "http",
        }
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tracked connection.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub created_at: Instant,
    pub last_activity: Instant,
    pub kind: TransportKind,
    /// Channel feeding the connection's event stream (SSE only).
    outbound: Option<mpsc::Sender<String>>,
}

impl Session {
    pub fn outbound(&self) -> Option<&mpsc::Sender<String>> {
        self.outbound.as_ref()
    }

    fn is_idle(&self, now: Instant, timeout: Duration) -> bool {
        self.kind != TransportKind::Stdio
            && now.saturating_duration_since(self.last_activity) >= timeout
    }
}

/// Session-level rejections, reported before any JSON-RPC parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Unknown session: {0}")]
    Unknown(String),

    #[error("Session expired: {0}")]
    Expired(String),
}

/// The set of live sessions.
#[derive(Debug)]
pub struct SessionManager {
    sessions: RwLock<HashMap<String, Session>>,
    clock: Arc<dyn Clock>,
    inactivity_timeout: Duration,
}

impl SessionManager {
    pub fn new(inactivity_timeout: Duration) -> Self {
        Self::with_clock(inactivity_timeout, Arc::new(SystemClock))
    }

    pub fn with_clock(inactivity_timeout: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            clock,
            inactivity_timeout,
        }
    }

    pub fn inactivity_timeout(&self) -> Duration {
        self.inactivity_timeout
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Session>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Session>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a new session.
    pub fn create(&self, kind: TransportKind) -> Session {
        self.insert(kind, None)
    }

    /// Start a new session whose replies are pushed through `outbound`.
    pub fn create_with_outbound(&self, kind: TransportKind, outbound: mpsc::Sender<String>) -> Session {
        self.insert(kind, Some(outbound))
    }

    fn insert(&self, kind: TransportKind, outbound: Option<mpsc::Sender<String>>) -> Session {
        let now = self.clock.now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            last_activity: now,
            kind,
            outbound,
        };
        self.write().insert(session.id.clone(), session.clone());
        tracing::info!(session = %session.id, transport = %kind, "session created");
        session
    }

    /// Record activity on a session and return a snapshot of it.
    ///
    /// # Errors
    ///
    /// [`SessionError::Unknown`] when no such session exists,
    /// [`SessionError::Expired`] when it had been idle too long; an expired
    /// session is removed on the spot.
    pub fn touch(&self, id: &str) -> Result<Session, SessionError> {
        let now = self.clock.now();
        let mut sessions = self.write();
        let Some(session) = sessions.get_mut(id) else {
            return Err(SessionError::Unknown(id.to_string()));
        };

        if session.is_idle(now, self.inactivity_timeout) {
            sessions.remove(id);
            tracing::info!(session = id, "session expired");
            return Err(SessionError::Expired(id.to_string()));
        }

        session.last_activity = now;
        Ok(session.clone())
    }

    /// Snapshot of a session without recording activity.
    pub fn get(&self, id: &str) -> Option<Session> {
        self.read().get(id).cloned()
    }

    /// Drop every session idle for at least `idle`; returns the removed ids.
    pub fn expire_older_than(&self, idle: Duration) -> Vec<String> {
        let now = self.clock.now();
        let mut sessions = self.write();
        let expired: Vec<String> = sessions
            .values()
            .filter(|session| session.is_idle(now, idle))
            .map(|session| session.id.clone())
            .collect();

        for id in &expired {
            sessions.remove(id);
            tracing::info!(session = %id, "session expired");
        }
        expired
    }

    /// Expire sessions past the configured inactivity timeout.
    pub fn sweep(&self) -> Vec<String> {
        self.expire_older_than(self.inactivity_timeout)
    }

    /// Close a session explicitly.
    pub fn remove(&self, id: &str) -> Option<Session> {
        let removed = self.write().remove(id);
        if removed.is_some() {
            tracing::info!(session = id, "session removed");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(DEFAULT_INACTIVITY_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> (SessionManager, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let sessions = SessionManager::with_clock(Duration::from_secs(1800), clock.clone());
        (sessions, clock)
    }

    #[test]
    fn test_touch_refreshes_activity() {
        let (sessions, clock) = manager();
        let session = sessions.create(TransportKind::Sse);

        clock.advance(Duration::from_secs(1000));
        let touched = sessions.touch(&session.id).unwrap();
        assert_eq!(touched.last_activity, session.last_activity + Duration::from_secs(1000));

        clock.advance(Duration::from_secs(1000));
        assert!(sessions.touch(&session.id).is_ok());
    }

    #[test]
    fn test_idle_session_expires_on_next_lookup() {
        let (sessions, clock) = manager();
        let session = sessions.create(TransportKind::Sse);

        clock.advance(Duration::from_secs(1801));
        assert_eq!(
            sessions.touch(&session.id).unwrap_err(),
            SessionError::Expired(session.id.clone())
        );
        assert!(sessions.get(&session.id).is_none());
        assert_eq!(
            sessions.touch(&session.id).unwrap_err(),
            SessionError::Unknown(session.id.clone())
        );
    }

    #[test]
    fn test_unknown_session_rejected() {
        let (sessions, _) = manager();
        assert!(matches!(sessions.touch("nope"), Err(SessionError::Unknown(_))));
    }

    #[test]
    fn test_sweep_keeps_stdio_and_active_sessions() {
        let (sessions, clock) = manager();
        let stdio = sessions.create(TransportKind::Stdio);
        let idle = sessions.create(TransportKind::Http);
        clock.advance(Duration::from_secs(1200));
        let busy = sessions.create(TransportKind::Sse);
        clock.advance(Duration::from_secs(700));

        let expired = sessions.sweep();
        assert_eq!(expired, vec![idle.id.clone()]);
        assert!(sessions.get(&stdio.id).is_some());
        assert!(sessions.get(&busy.id).is_some());
        assert_eq!(sessions.len(), 2);
    }

    #[test]
    fn test_snapshot_survives_removal() {
        let (sessions, _) = manager();
        let (tx, mut rx) = mpsc::channel(1);
        let session = sessions.create_with_outbound(TransportKind::Sse, tx);
        let snapshot = sessions.touch(&session.id).unwrap();

        assert!(sessions.remove(&session.id).is_some());
        assert!(sessions.remove(&session.id).is_none());

        snapshot.outbound().unwrap().try_send("late reply".into()).unwrap();
        assert_eq!(rx.try_recv().unwrap(), "late reply");
    }

    #[test]
    fn test_concurrent_touch_and_sweep() {
        let sessions = Arc::new(SessionManager::new(Duration::from_secs(60)));
        let ids: Vec<String> = (0..32).map(|_| sessions.create(TransportKind::Http).id).collect();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let sessions = sessions.clone();
                let ids = ids.clone();
                std::thread::spawn(move || {
                    for id in &ids {
                        sessions.touch(id).unwrap();
                        sessions.sweep();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(sessions.len(), 32);
    }
}
