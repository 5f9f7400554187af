//! Hover load cancellation
//!
//! Exactly one hover target is active at a time. Changing the target bumps a
//! generation counter and cancels the previous load's token; a load may only
//! commit results while its ticket still matches the active generation.

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::key::CacheKey;

/// Handle held by one in-flight load
#[derive(Debug, Clone)]
pub struct LoadTicket {
    generation: u64,
    token: CancellationToken,
}

impl LoadTicket {
    /// Resolves when the hover target changes or the coordinator shuts down
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}

#[derive(Default)]
struct ActiveState {
    generation: u64,
    key: Option<CacheKey>,
    /// Token of the in-flight load for `key`, if any
    loading: Option<CancellationToken>,
}

/// The currently hovered target and its load, if one is running
pub struct ActiveTarget {
    state: Mutex<ActiveState>,
    root: CancellationToken,
}

impl Default for ActiveTarget {
    fn default() -> Self {
        Self::new()
    }
}

impl ActiveTarget {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ActiveState::default()),
            root: CancellationToken::new(),
        }
    }

    /// Make `key` the active target without starting a load.
    /// Any load for a previous target is cancelled.
    pub fn activate(&self, key: Option<CacheKey>) {
        let mut state = self.state.lock();
        Self::supersede(&mut state);
        state.key = key;
    }

    /// Make `key` the active target and hand out a ticket for its load.
    ///
    /// Returns `None` when a load for the same key is already running, so
    /// repeated hover events do not restart work.
    pub fn begin_load(&self, key: &CacheKey) -> Option<LoadTicket> {
        let mut state = self.state.lock();
        if state.loading.is_some() && state.key.as_ref() == Some(key) {
            return None;
        }

        Self::supersede(&mut state);
        let token = self.root.child_token();
        state.key = Some(key.clone());
        state.loading = Some(token.clone());

        Some(LoadTicket {
            generation: state.generation,
            token,
        })
    }

    /// Run `commit` only if `ticket` still belongs to the active target.
    ///
    /// The check and the commit happen under one lock, so a concurrent target
    /// change either lands before (commit skipped) or after (commit done).
    pub fn commit<R>(&self, ticket: &LoadTicket, commit: impl FnOnce() -> R) -> Option<R> {
        let state = self.state.lock();
        if ticket.token.is_cancelled() || state.generation != ticket.generation {
            return None;
        }
        Some(commit())
    }

    /// Mark the ticket's load as done so the same key may load again later
    pub fn finish(&self, ticket: &LoadTicket) {
        let mut state = self.state.lock();
        if state.generation == ticket.generation {
            state.loading = None;
        }
    }

    pub fn is_loading(&self, key: &CacheKey) -> bool {
        let state = self.state.lock();
        state.loading.is_some() && state.key.as_ref() == Some(key)
    }

    pub fn active_key(&self) -> Option<CacheKey> {
        self.state.lock().key.clone()
    }

    /// Cancel every current and future load
    pub fn shutdown(&self) {
        self.root.cancel();
        Self::supersede(&mut self.state.lock());
    }

    fn supersede(state: &mut ActiveState) {
        state.generation += 1;
        state.key = None;
        if let Some(token) = state.loading.take() {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_target_invalidates_old_ticket() {
        let active = ActiveTarget::new();
        let first = active.begin_load(&CacheKey::from("a")).unwrap();
        let second = active.begin_load(&CacheKey::from("b")).unwrap();

        assert!(first.token.is_cancelled());
        assert_eq!(active.commit(&first, || 1), None);
        assert_eq!(active.commit(&second, || 2), Some(2));
    }

    #[test]
    fn test_same_key_does_not_restart_load() {
        let active = ActiveTarget::new();
        let key = CacheKey::from("a");
        let ticket = active.begin_load(&key).unwrap();

        assert!(active.begin_load(&key).is_none());
        assert!(active.is_loading(&key));

        active.finish(&ticket);
        assert!(!active.is_loading(&key));
        assert!(active.begin_load(&key).is_some());
    }

    #[test]
    fn test_activate_cancels_pending_load() {
        let active = ActiveTarget::new();
        let ticket = active.begin_load(&CacheKey::from("a")).unwrap();
        active.activate(Some(CacheKey::from("b")));

        assert!(active.commit(&ticket, || ()).is_none());
        assert_eq!(active.active_key(), Some(CacheKey::from("b")));
    }

    #[test]
    fn test_stale_finish_does_not_clear_newer_load() {
        let active = ActiveTarget::new();
        let old = active.begin_load(&CacheKey::from("a")).unwrap();
        let _new = active.begin_load(&CacheKey::from("b")).unwrap();

        active.finish(&old);
        assert!(active.is_loading(&CacheKey::from("b")));
    }

    #[test]
    fn test_shutdown_cancels_everything() {
        let active = ActiveTarget::new();
        let ticket = active.begin_load(&CacheKey::from("a")).unwrap();
        active.shutdown();

        assert!(active.commit(&ticket, || ()).is_none());
        let late = active.begin_load(&CacheKey::from("b")).unwrap();
        assert!(late.token.is_cancelled());
    }
}
