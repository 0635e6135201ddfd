//! Call-id to Bridge handle map, with resume support (C9).
//!
//! Grounded on `session-core/src/coordinator/registry.rs`'s
//! `InternalSessionRegistry`, reworked onto `dashmap::DashMap` (also used
//! directly elsewhere in the teacher's coordinator) for lock-free reads
//! under concurrent per-call writers.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::call::CallId;

/// A handle the registry hands back for a registered call. Kept generic
/// over what a "bridge handle" actually is so this module has no
/// dependency on the router itself.
pub type BridgeHandle<B> = Arc<B>;

#[derive(Default)]
struct RegistryStats {
    total_registered: std::sync::atomic::AtomicUsize,
    total_unregistered: std::sync::atomic::AtomicUsize,
}

/// Maps live call ids to their `Bridge` handle, supporting the telephony
/// peer's `session.resume` flow (spec.md §4.9): a call that reconnects
/// with the same id is handed back the same bridge rather than creating a
/// new one.
pub struct SessionRegistry<B> {
    calls: DashMap<CallId, BridgeHandle<B>>,
    stats: RegistryStats,
}

impl<B> Default for SessionRegistry<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> SessionRegistry<B> {
    pub fn new() -> Self {
        Self { calls: DashMap::new(), stats: RegistryStats::default() }
    }

    pub fn register(&self, id: CallId, bridge: BridgeHandle<B>) {
        self.stats.total_registered.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        debug!(call_id = %id, "registered bridge");
        self.calls.insert(id, bridge);
    }

    pub fn get(&self, id: &CallId) -> Option<BridgeHandle<B>> {
        self.calls.get(id).map(|entry| entry.value().clone())
    }

    /// Look up an existing bridge for a `session.resume` request.
    pub fn resume(&self, id: &CallId) -> Option<BridgeHandle<B>> {
        self.get(id)
    }

    pub fn unregister(&self, id: &CallId) -> Option<BridgeHandle<B>> {
        let removed = self.calls.remove(id).map(|(_, v)| v);
        if removed.is_some() {
            self.stats.total_unregistered.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            debug!(call_id = %id, "unregistered bridge");
        }
        removed
    }

    pub fn active_count(&self) -> usize {
        self.calls.len()
    }

    pub fn active_ids(&self) -> Vec<CallId> {
        self.calls.iter().map(|entry| entry.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_lookup() {
        let registry: SessionRegistry<u32> = SessionRegistry::new();
        registry.register(CallId::from("c1"), Arc::new(42));
        assert_eq!(*registry.get(&CallId::from("c1")).unwrap(), 42);
        assert_eq!(registry.active_count(), 1);
    }

    #[test]
    fn resume_finds_an_existing_call() {
        let registry: SessionRegistry<u32> = SessionRegistry::new();
        registry.register(CallId::from("c1"), Arc::new(7));
        assert!(registry.resume(&CallId::from("c1")).is_some());
        assert!(registry.resume(&CallId::from("missing")).is_none());
    }

    #[test]
    fn unregister_removes_and_returns() {
        let registry: SessionRegistry<u32> = SessionRegistry::new();
        registry.register(CallId::from("c1"), Arc::new(1));
        assert!(registry.unregister(&CallId::from("c1")).is_some());
        assert_eq!(registry.active_count(), 0);
        assert!(registry.unregister(&CallId::from("c1")).is_none());
    }
}
