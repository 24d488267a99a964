//! Optimistic local edits.

use std::future::Future;
use tokio::sync::RwLock;

/// Writes `value` into the slot `lens` selects, then runs `request`. If the request fails the
/// slot gets its previous value back. The lock is not held while the request is in flight.
///
/// When `lens` finds nothing the request still runs and there is nothing to restore.
pub async fn apply<S, V, T, E, L, F, Fut>(state: &RwLock<S>, lens: L, value: V, request: F) -> Result<T, E>
where
    L: Fn(&mut S) -> Option<&mut V>,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let previous = {
        let mut guard = state.write().await;
        lens(&mut *guard).map(|slot| std::mem::replace(slot, value))
    };

    let outcome = request().await;
    if outcome.is_err() {
        if let Some(previous) = previous {
            let mut guard = state.write().await;
            if let Some(slot) = lens(&mut *guard) {
                *slot = previous;
            }
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq)]
    struct Toggle {
        id: u8,
        on: bool,
    }

    fn slot(items: &mut [Toggle], id: u8) -> Option<&mut bool> {
        items.iter_mut().find(|t| t.id == id).map(|t| &mut t.on)
    }

    #[tokio::test]
    async fn test_request_sees_new_value_and_success_keeps_it() {
        let state = Arc::new(RwLock::new(vec![Toggle { id: 1, on: false }]));
        let seen = apply(&*state, |items: &mut Vec<Toggle>| slot(items, 1), true, || {
            let state = state.clone();
            async move { Ok::<_, ()>(state.read().await[0].on) }
        })
        .await;
        assert_eq!(seen, Ok(true));
        assert!(state.read().await[0].on);
    }

    #[tokio::test]
    async fn test_failure_restores_previous_value() {
        let state = RwLock::new(vec![Toggle { id: 1, on: false }, Toggle { id: 2, on: true }]);
        let result: Result<(), &str> = apply(&state, |items: &mut Vec<Toggle>| slot(items, 2), false, || async { Err("offline") }).await;
        assert_eq!(result, Err("offline"));
        assert_eq!(*state.read().await, vec![Toggle { id: 1, on: false }, Toggle { id: 2, on: true }]);
    }

    #[tokio::test]
    async fn test_missing_slot_still_sends() {
        let state = RwLock::new(Vec::<Toggle>::new());
        let result: Result<u8, ()> = apply(&state, |items: &mut Vec<Toggle>| slot(items, 9), true, || async { Ok(7) }).await;
        assert_eq!(result, Ok(7));
        assert!(state.read().await.is_empty());
    }
}
