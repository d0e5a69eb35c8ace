//! Process-wide map of live calls

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use super::session::{BufferSettings, SessionBinding, VoiceSession};

#[derive(Default)]
struct RegistryInner {
    sessions: HashMap<String, Arc<VoiceSession>>,
    /// provisional id -> real call id
    aliases: HashMap<String, String>,
}

impl RegistryInner {
    fn resolve<'a>(&'a self, call_id: &'a str) -> &'a str {
        self.aliases.get(call_id).map(String::as_str).unwrap_or(call_id)
    }
}

/// Concurrent call-id -> session registry.
///
/// Sessions created under a provisional id (`pending-<uuid>`) can be promoted
/// to the real call id once it is known; lookups by the provisional id keep
/// working through an alias table until the session is removed.
pub struct SessionRegistry {
    inner: RwLock<RegistryInner>,
    buffer_settings: BufferSettings,
}

impl SessionRegistry {
    pub fn new(buffer_settings: BufferSettings) -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
            buffer_settings,
        }
    }

    /// Return the session for `binding.call_id`, creating it if absent.
    ///
    /// An existing session is refreshed in place: its stream id, endpoints,
    /// sample rate and connection are replaced while history, parameters and
    /// greeting state are kept. The returned `bool` is `true` when a new
    /// session was created.
    pub fn get_or_create(&self, binding: SessionBinding) -> (Arc<VoiceSession>, bool) {
        let mut inner = self.inner.write();
        let key = inner.resolve(&binding.call_id).to_string();

        if let Some(existing) = inner.sessions.get(&key) {
            let existing = Arc::clone(existing);
            drop(inner);
            debug!(call_id = %key, connection_id = %binding.connection.id(), "Refreshing existing session");
            existing.refresh(SessionBinding {
                call_id: key,
                ..binding
            });
            return (existing, false);
        }

        info!(call_id = %key, connection_id = %binding.connection.id(), "Creating voice session");
        let session = Arc::new(VoiceSession::new(binding, self.buffer_settings));
        inner.sessions.insert(key, Arc::clone(&session));
        (session, true)
    }

    pub fn get(&self, call_id: &str) -> Option<Arc<VoiceSession>> {
        let inner = self.inner.read();
        inner.sessions.get(inner.resolve(call_id)).cloned()
    }

    /// Re-key a provisional session under its real call id.
    ///
    /// If a session already exists under `real_id` (reconnect) that session
    /// wins and the provisional one is shut down. Returns the session now
    /// registered under `real_id`, or `None` when `provisional_id` is unknown.
    pub fn promote(&self, provisional_id: &str, real_id: &str) -> Option<Arc<VoiceSession>> {
        if provisional_id == real_id {
            return self.get(real_id);
        }

        let mut inner = self.inner.write();
        let provisional = inner.sessions.remove(provisional_id)?;
        inner
            .aliases
            .insert(provisional_id.to_string(), real_id.to_string());

        if let Some(existing) = inner.sessions.get(real_id) {
            let existing = Arc::clone(existing);
            drop(inner);
            provisional.shutdown();
            info!(provisional_id, call_id = real_id, "Provisional session merged into existing call");
            return Some(existing);
        }

        provisional.set_call_id(real_id);
        inner
            .sessions
            .insert(real_id.to_string(), Arc::clone(&provisional));
        info!(provisional_id, call_id = real_id, "Promoted provisional session");
        Some(provisional)
    }

    /// Remove a session unconditionally, cancelling any in-flight work.
    pub fn remove(&self, call_id: &str) -> Option<Arc<VoiceSession>> {
        let mut inner = self.inner.write();
        let key = inner.resolve(call_id).to_string();
        let session = inner.sessions.remove(&key)?;
        inner.aliases.retain(|_, target| target != &key);
        drop(inner);

        session.shutdown();
        info!(call_id = %key, "Removed voice session");
        Some(session)
    }

    /// Remove a session only if it is still bound to `connection_id`.
    ///
    /// A connection closing after the call has reconnected elsewhere must not
    /// tear down the newer connection's session.
    pub fn remove_if_bound(&self, call_id: &str, connection_id: &str) -> Option<Arc<VoiceSession>> {
        let mut inner = self.inner.write();
        let key = inner.resolve(call_id).to_string();

        let bound = inner
            .sessions
            .get(&key)
            .is_some_and(|s| s.connection_id() == connection_id);
        if !bound {
            debug!(call_id = %key, connection_id, "Session rebound to another connection; keeping it");
            return None;
        }

        let session = inner.sessions.remove(&key)?;
        inner.aliases.retain(|_, target| target != &key);
        drop(inner);

        session.shutdown();
        info!(call_id = %key, connection_id, "Removed voice session on disconnect");
        Some(session)
    }

    pub fn len(&self) -> usize {
        self.inner.read().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::test_support::{binding, buffer_settings, handle};

    fn registry() -> SessionRegistry {
        SessionRegistry::new(buffer_settings())
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let registry = registry();
        let (c1, _rx1) = handle("conn-1");
        let (c2, _rx2) = handle("conn-2");

        let (first, created) = registry.get_or_create(binding("call-1", c1));
        assert!(created);
        first.claim_greeting();

        let (second, created) = registry.get_or_create(binding("call-1", c2));
        assert!(!created);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.connection_id(), "conn-2");
        assert!(second.greeting_sent());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_promote_provisional() {
        let registry = registry();
        let (c1, _rx) = handle("conn-1");
        let (session, _) = registry.get_or_create(binding("pending-abc", c1));

        let promoted = registry.promote("pending-abc", "CA42").unwrap();
        assert!(Arc::ptr_eq(&session, &promoted));
        assert_eq!(promoted.call_id(), "CA42");
        assert_eq!(registry.len(), 1);
        assert!(registry.get("CA42").is_some());
        // alias still resolves
        assert!(Arc::ptr_eq(&registry.get("pending-abc").unwrap(), &session));
    }

    #[test]
    fn test_promote_into_existing_call() {
        let registry = registry();
        let (c1, _rx1) = handle("conn-1");
        let (c2, _rx2) = handle("conn-2");
        let (existing, _) = registry.get_or_create(binding("CA42", c1));
        let (provisional, _) = registry.get_or_create(binding("pending-1", c2));

        let winner = registry.promote("pending-1", "CA42").unwrap();
        assert!(Arc::ptr_eq(&winner, &existing));
        assert!(!provisional.is_active());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_promote_unknown() {
        assert!(registry().promote("pending-missing", "CA1").is_none());
    }

    #[test]
    fn test_remove_cancels_and_drops_aliases() {
        let registry = registry();
        let (c1, _rx) = handle("conn-1");
        let (session, _) = registry.get_or_create(binding("pending-1", c1));
        registry.promote("pending-1", "CA1");
        let token = session.cancel_token();

        assert!(registry.remove("CA1").is_some());
        assert!(token.is_cancelled());
        assert!(registry.get("CA1").is_none());
        assert!(registry.get("pending-1").is_none());
        assert!(registry.is_empty());
        assert!(registry.remove("CA1").is_none());
    }

    #[test]
    fn test_remove_if_bound_respects_reconnect() {
        let registry = registry();
        let (c1, _rx1) = handle("conn-1");
        let (c2, _rx2) = handle("conn-2");
        registry.get_or_create(binding("CA1", c1));
        registry.get_or_create(binding("CA1", c2));

        assert!(registry.remove_if_bound("CA1", "conn-1").is_none());
        assert_eq!(registry.len(), 1);
        assert!(registry.remove_if_bound("CA1", "conn-2").is_some());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_get_or_create() {
        let registry = Arc::new(registry());
        let threads: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    let (c, _rx) = handle(&format!("conn-{i}"));
                    registry.get_or_create(binding("shared", c)).0
                })
            })
            .collect();
        let sessions: Vec<_> = threads.into_iter().map(|t| t.join().unwrap()).collect();
        assert!(sessions.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(registry.len(), 1);
    }
}
