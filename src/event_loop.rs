//! Running asynchronous action results to completion on the current
//! thread, and collecting the failures nobody else handles.

use std::{cell::RefCell, rc::Rc};

use tokio::task::{LocalSet, JoinHandle};

use crate::{error::SprinkleError, methods::PendingResult, store::Store};

/// Where failures without a caller to return them to end up: they are
/// logged at error level and kept for inspection.
#[derive(Clone, Default)]
pub struct FailureLog(Rc<RefCell<Vec<SprinkleError>>>);

impl FailureLog {
    pub fn report(&self, origin: &str, e: SprinkleError) {
        log::error!("{}: {}", origin, e);
        self.0.borrow_mut().push(e);
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn take(&self) -> Vec<SprinkleError> {
        std::mem::take(&mut *self.0.borrow_mut())
    }
}

/// Pending method results are spawned here; when one resolves to a
/// result, it is committed to the store. There is no de-duplication
/// and no cancellation: results are committed in the order they
/// resolve.
pub struct EventLoop {
    local: LocalSet,
    store: Rc<dyn Store>,
    tasks: RefCell<Vec<JoinHandle<()>>>,
    failures: FailureLog,
}

impl EventLoop {
    pub fn new(store: Rc<dyn Store>) -> Self {
        EventLoop {
            local: LocalSet::new(),
            store,
            tasks: RefCell::new(Vec::new()),
            failures: FailureLog::default(),
        }
    }

    pub fn failures(&self) -> &FailureLog {
        &self.failures
    }

    /// Failures so far, removing them from the log.
    pub fn take_failures(&self) -> Vec<SprinkleError> {
        self.failures.take()
    }

    /// Number of spawned tasks not yet awaited by `run_until_idle`.
    pub fn pending(&self) -> usize {
        self.tasks.borrow().len()
    }

    /// Commit the result of `pending` once it resolves. `origin`
    /// describes the action for error messages.
    pub fn spawn(&self, origin: String, pending: PendingResult) {
        let store = self.store.clone();
        let failures = self.failures.clone();
        let handle = self.local.spawn_local(async move {
            let result = match pending.await {
                Ok(Some(r)) => store.commit(&r.path, r.value).map_err(SprinkleError::from),
                Ok(None) => Ok(()),
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                failures.report(&origin, e);
            }
        });
        self.tasks.borrow_mut().push(handle);
    }

    /// Drive all spawned tasks, including ones spawned meanwhile, to
    /// completion. Must be called from within a tokio runtime.
    pub async fn run_until_idle(&self) {
        loop {
            let handles = std::mem::take(&mut *self.tasks.borrow_mut());
            if handles.is_empty() {
                break
            }
            self.local.run_until(async {
                for handle in handles {
                    if let Err(e) = handle.await {
                        log::error!("action task panicked or was cancelled: {}", e);
                    }
                }
            }).await;
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::FutureExt;
    use serde_json::json;
    use tokio::sync::oneshot;
    use crate::{store::PathStore, methods::ActionResult, error::{NetworkError, SprinkleErrorKind}};

    fn event_loop() -> (Rc<PathStore>, EventLoop) {
        let store = Rc::new(PathStore::default());
        let el = EventLoop::new(store.clone());
        (store, el)
    }

    #[tokio::test]
    async fn t_commits_on_resolution() {
        let (store, el) = event_loop();
        el.spawn("test".into(), async {
            Ok(Some(ActionResult::new("a/b", json!(1))))
        }.boxed_local());
        el.spawn("nothing".into(), async { Ok(None) }.boxed_local());
        assert_eq!(el.pending(), 2);
        assert_eq!(store.retrieve("a/b"), None);
        el.run_until_idle().await;
        assert_eq!(el.pending(), 0);
        assert_eq!(store.retrieve("a/b"), Some(json!(1)));
        assert!(el.failures().is_empty());
    }

    #[tokio::test]
    async fn t_last_resolution_wins() {
        let (store, el) = event_loop();
        let (first_tx, first_rx) = oneshot::channel::<()>();
        let (second_tx, second_rx) = oneshot::channel::<()>();
        // the first action resolves only after the second one
        el.spawn("first".into(), async move {
            let _ = first_rx.await;
            Ok(Some(ActionResult::new("x", json!("first"))))
        }.boxed_local());
        el.spawn("second".into(), async move {
            let _ = second_rx.await;
            let _ = first_tx.send(());
            Ok(Some(ActionResult::new("x", json!("second"))))
        }.boxed_local());
        let _ = second_tx.send(());
        el.run_until_idle().await;
        assert_eq!(store.retrieve("x"), Some(json!("first")));
    }

    #[tokio::test]
    async fn t_failures_are_kept() {
        let (store, el) = event_loop();
        el.spawn("get /x".into(), async {
            Err(NetworkError::Status { method: "GET", url: "/x".into(), status: 404 }.into())
        }.boxed_local());
        el.run_until_idle().await;
        let failures = el.take_failures();
        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0].kind(), SprinkleErrorKind::Network(_)));
        assert!(el.failures().is_empty());
        assert_eq!(store.retrieve("x"), None);
    }
}
