use std::sync::Arc;

use dashmap::DashMap;

use crate::state::{game::SessionKey, session::SessionSlot};

/// Maps session keys to their independent session instances.
///
/// Entries are only ever inserted or swapped wholesale; no two sessions share state.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<SessionKey, Arc<SessionSlot>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the session registered under `key`, creating an idle one on first access.
    pub fn get_or_create(&self, key: &SessionKey) -> Arc<SessionSlot> {
        self.sessions
            .entry(key.clone())
            .or_insert_with(|| SessionSlot::new(key.clone()))
            .clone()
    }

    /// Return the session registered under `key` without creating one.
    pub fn get(&self, key: &SessionKey) -> Option<Arc<SessionSlot>> {
        self.sessions.get(key).map(|entry| entry.value().clone())
    }

    /// Replace `stale` with a fresh idle session, unless the key already moved on to another
    /// instance. The stale instance's round loop is cancelled either way.
    ///
    /// Returns whether the replacement happened.
    pub fn reset(&self, stale: &Arc<SessionSlot>) -> bool {
        stale.cancel_round();

        let Some(mut entry) = self.sessions.get_mut(stale.key()) else {
            return false;
        };
        if !Arc::ptr_eq(entry.value(), stale) {
            return false;
        }

        *entry.value_mut() = SessionSlot::new(stale.key().clone());
        true
    }

    /// Whether `slot` is still the instance registered under its key.
    pub fn is_current(&self, slot: &Arc<SessionSlot>) -> bool {
        self.sessions
            .get(slot.key())
            .is_some_and(|entry| Arc::ptr_eq(entry.value(), slot))
    }

    /// Snapshot every registered session.
    pub fn all(&self) -> Vec<Arc<SessionSlot>> {
        self.sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Number of registered sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session was ever referenced.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::session::RoundHandle;

    #[test]
    fn get_or_create_is_lazy_and_stable() {
        let registry = SessionRegistry::new();
        let key = SessionKey::from("guild-1");
        assert!(registry.get(&key).is_none());

        let first = registry.get_or_create(&key);
        let second = registry.get_or_create(&key);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn keys_are_isolated() {
        let registry = SessionRegistry::new();
        let a = registry.get_or_create(&SessionKey::from("a"));
        let b = registry.get_or_create(&SessionKey::from("b"));
        assert!(!Arc::ptr_eq(&a, &b));

        assert!(registry.reset(&a));
        assert!(Arc::ptr_eq(&b, &registry.get_or_create(&SessionKey::from("b"))));
    }

    #[test]
    fn reset_installs_fresh_instance_and_cancels_round() {
        let registry = SessionRegistry::new();
        let key = SessionKey::from("guild-1");
        let stale = registry.get_or_create(&key);
        let handle = RoundHandle::new();
        stale.install_round(handle.clone());

        assert!(registry.reset(&stale));
        assert!(handle.token.is_cancelled());

        let fresh = registry.get_or_create(&key);
        assert!(!Arc::ptr_eq(&stale, &fresh));
        assert!(fresh.live_round().is_none());
    }

    #[test]
    fn reset_of_an_already_replaced_instance_is_a_no_op() {
        let registry = SessionRegistry::new();
        let key = SessionKey::from("guild-1");
        let stale = registry.get_or_create(&key);
        assert!(registry.reset(&stale));
        let current = registry.get_or_create(&key);
        assert!(!registry.is_current(&stale));
        assert!(registry.is_current(&current));

        assert!(!registry.reset(&stale));
        assert!(Arc::ptr_eq(&current, &registry.get_or_create(&key)));
    }
}
