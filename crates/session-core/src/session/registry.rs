use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::errors::{Result, SessionError};
use crate::session::CallSession;
use crate::types::{CallId, CallState};

/// Bounded map of live call sessions, for hosts that run several
/// [`CallSession`]s side by side.
pub struct CallRegistry {
    calls: DashMap<CallId, Arc<CallSession>>,
    capacity: usize,
    // Serializes the capacity check with the insert
    admission: Mutex<()>,
}

impl CallRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            calls: DashMap::new(),
            capacity,
            admission: Mutex::new(()),
        }
    }

    /// Register a session under its call id.
    ///
    /// Fails with [`SessionError::Capacity`] when the registry is full.
    /// Re-registering an id already present replaces it.
    pub fn insert(&self, session: Arc<CallSession>) -> Result<CallId> {
        let _admission = self.admission.lock();
        let id = session.call_id();
        if !self.calls.contains_key(&id) && self.calls.len() >= self.capacity {
            return Err(SessionError::Capacity(format!(
                "{} calls registered, limit is {}",
                self.calls.len(),
                self.capacity
            )));
        }
        self.calls.insert(id, session);
        debug!("Registered call {}", id);
        Ok(id)
    }

    pub fn get(&self, id: &CallId) -> Option<Arc<CallSession>> {
        self.calls.get(id).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, id: &CallId) -> Option<Arc<CallSession>> {
        let _admission = self.admission.lock();
        self.calls.remove(id).map(|(_, session)| session)
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Ids of sessions with a call in progress
    pub fn active_calls(&self) -> Vec<CallId> {
        self.calls
            .iter()
            .filter(|entry| entry.value().state().is_in_progress())
            .map(|entry| *entry.key())
            .collect()
    }

    /// Drop sessions whose call has ended. Returns how many were removed.
    pub fn prune_finished(&self) -> usize {
        // Admission is held so an insert cannot land between the two counts
        let _admission = self.admission.lock();
        let before = self.calls.len();
        self.calls
            .retain(|_, session| !matches!(session.state(), CallState::Stopped));
        before.saturating_sub(self.calls.len())
    }
}
