//! Navigation session hosting
//!
//! A [`NavigationSession`] owns the single mutable [`NavigationState`] cell of
//! one report view. Transitions are serialized through the write lock, so no
//! two operations ever interleave on the same state. Each transition first
//! raises a loading flag and waits a short coalescing delay, letting rapid
//! repeated clicks settle into their final state.
//!
//! Report fetches are tagged with a [`FetchTicket`]; a response whose ticket
//! no longer matches the cursor is stale and must be discarded.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::config::defaults;
use crate::types::Timestamp;

use super::availability::NavigationView;
use super::navigation::{NavigationState, Transition};
use super::ordering::DayClock;

/// Tag identifying one report fetch issued for a cursor position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    pub seq: u64,
    pub at: Option<Timestamp>,
}

pub struct NavigationSession {
    state: RwLock<NavigationState>,
    /// Transitions started but not yet applied
    pending: AtomicUsize,
    fetch_seq: AtomicU64,
    delay: Duration,
    clock: Arc<dyn DayClock>,
}

impl NavigationSession {
    pub fn new(clock: Arc<dyn DayClock>, delay: Duration) -> Self {
        Self {
            state: RwLock::new(NavigationState::new()),
            pending: AtomicUsize::new(0),
            fetch_seq: AtomicU64::new(0),
            delay,
            clock,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.pending.load(Ordering::SeqCst) > 0
    }

    pub async fn state(&self) -> NavigationState {
        self.state.read().await.clone()
    }

    pub async fn current(&self) -> Option<Timestamp> {
        self.state.read().await.current()
    }

    pub async fn view(&self) -> NavigationView {
        let state = self.state.read().await;
        NavigationView::new(&state, self.clock.as_ref(), self.is_loading())
    }

    /// Apply a transition after the coalescing delay and return the new view.
    pub async fn apply(&self, transition: Transition) -> NavigationView {
        self.pending.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let view = {
            let mut state = self.state.write().await;
            let next = transition.apply(std::mem::take(&mut *state), self.clock.as_ref());
            *state = next;
            self.pending.fetch_sub(1, Ordering::SeqCst);
            NavigationView::new(&state, self.clock.as_ref(), self.is_loading())
        };

        debug!(
            transition = transition.name(),
            current = ?view.current_timestamp,
            history_len = view.history_len,
            "Navigation transition applied"
        );
        view
    }

    /// Record a timestamp resolved by a report fetch and move the cursor to
    /// it. Not a user interaction, so no coalescing delay.
    pub async fn observe(&self, ts: Timestamp) -> NavigationView {
        let mut state = self.state.write().await;
        *state = std::mem::take(&mut *state).go_to_timestamp(ts);
        NavigationView::new(&state, self.clock.as_ref(), self.is_loading())
    }

    /// Issue a ticket for a fetch at the current cursor.
    pub async fn begin_fetch(&self) -> FetchTicket {
        let seq = self.fetch_seq.fetch_add(1, Ordering::SeqCst) + 1;
        FetchTicket {
            seq,
            at: self.current().await,
        }
    }

    /// `true` when `ticket` is still the newest fetch and the cursor has not
    /// moved since it was issued.
    pub async fn complete_fetch(&self, ticket: FetchTicket) -> bool {
        let newest = self.fetch_seq.load(Ordering::SeqCst) == ticket.seq;
        newest && self.current().await == ticket.at
    }
}

/// Expiry bounds for a [`SessionRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    /// Untouched sessions older than this are dropped; zero disables expiry
    pub idle_timeout: Duration,
    /// At capacity, creating a session evicts the least recently used one
    pub max_sessions: usize,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(defaults::SESSION_IDLE_SECS),
            max_sessions: defaults::MAX_SESSIONS,
        }
    }
}

struct SessionEntry {
    session: Arc<NavigationSession>,
    /// Milliseconds since the registry epoch at last use
    touched_ms: AtomicU64,
}

/// Process-local registry of live sessions. Nothing is persisted.
///
/// Every lookup refreshes a session; sessions idle past the timeout are
/// dropped lazily on lookup, on create, and by [`prune_idle`](Self::prune_idle).
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, SessionEntry>>,
    clock: Arc<dyn DayClock>,
    delay: Duration,
    limits: SessionLimits,
    epoch: Instant,
}

impl SessionRegistry {
    pub fn new(clock: Arc<dyn DayClock>, delay: Duration, limits: SessionLimits) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            clock,
            delay,
            limits,
            epoch: Instant::now(),
        }
    }

    pub fn clock(&self) -> &Arc<dyn DayClock> {
        &self.clock
    }

    pub fn limits(&self) -> SessionLimits {
        self.limits
    }

    fn millis_at(&self, now: Instant) -> u64 {
        u64::try_from(now.saturating_duration_since(self.epoch).as_millis()).unwrap_or(u64::MAX)
    }

    fn is_idle(&self, entry: &SessionEntry, now_ms: u64) -> bool {
        if self.limits.idle_timeout.is_zero() {
            return false;
        }
        let idle = now_ms.saturating_sub(entry.touched_ms.load(Ordering::SeqCst));
        u128::from(idle) > self.limits.idle_timeout.as_millis()
    }

    pub async fn create(&self) -> (Uuid, Arc<NavigationSession>) {
        self.create_at(Instant::now()).await
    }

    pub async fn create_at(&self, now: Instant) -> (Uuid, Arc<NavigationSession>) {
        let id = Uuid::new_v4();
        let session = Arc::new(NavigationSession::new(self.clock.clone(), self.delay));
        let now_ms = self.millis_at(now);

        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, entry| !self.is_idle(entry, now_ms));
        while sessions.len() >= self.limits.max_sessions.max(1) {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, entry)| entry.touched_ms.load(Ordering::SeqCst))
                .map(|(id, _)| *id);
            match oldest {
                Some(evicted) => {
                    sessions.remove(&evicted);
                    debug!(id = %evicted, "Navigation session evicted at capacity");
                }
                None => break,
            }
        }
        sessions.insert(
            id,
            SessionEntry {
                session: session.clone(),
                touched_ms: AtomicU64::new(now_ms),
            },
        );
        debug!(%id, live = sessions.len(), "Navigation session created");
        (id, session)
    }

    pub async fn get(&self, id: &Uuid) -> Option<Arc<NavigationSession>> {
        self.get_at(id, Instant::now()).await
    }

    /// Look up a session and mark it used at `now`.
    pub async fn get_at(&self, id: &Uuid, now: Instant) -> Option<Arc<NavigationSession>> {
        let now_ms = self.millis_at(now);
        {
            let sessions = self.sessions.read().await;
            let entry = sessions.get(id)?;
            if !self.is_idle(entry, now_ms) {
                entry.touched_ms.fetch_max(now_ms, Ordering::SeqCst);
                return Some(entry.session.clone());
            }
        }
        let mut sessions = self.sessions.write().await;
        if sessions.get(id).is_some_and(|entry| self.is_idle(entry, now_ms)) {
            sessions.remove(id);
            debug!(%id, "Navigation session expired");
        }
        None
    }

    pub async fn remove(&self, id: &Uuid) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            debug!(%id, "Navigation session discarded");
        }
        removed
    }

    /// Drop every session idle past the timeout. Returns how many went.
    pub async fn prune_idle(&self) -> usize {
        self.prune_idle_at(Instant::now()).await
    }

    pub async fn prune_idle_at(&self, now: Instant) -> usize {
        let now_ms = self.millis_at(now);
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| !self.is_idle(entry, now_ms));
        let pruned = before - sessions.len();
        if pruned > 0 {
            debug!(pruned, live = sessions.len(), "Idle navigation sessions pruned");
        }
        pruned
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
