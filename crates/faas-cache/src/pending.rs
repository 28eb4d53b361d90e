use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;

use faas_core::FunctionId;

/// Map from `FunctionId` to the in-flight load's broadcast sender, used for
/// request coalescing (spec.md §3 "Pending Load").
///
/// A singleflight leader/waiter split: the first caller for a key becomes
/// the leader and drives the load to completion; later callers for the same
/// key subscribe to the leader's broadcast and receive a clone of its
/// result.
pub(crate) struct PendingLoads<V, E> {
    inflight: Mutex<HashMap<FunctionId, broadcast::Sender<Result<V, E>>>>,
}

impl<V, E> PendingLoads<V, E>
where
    V: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    pub(crate) fn new() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Attempts to become the leader for `function_id`. Returns a
    /// [`LeaderGuard`] on success, or a receiver to await on if another load
    /// for this key is already in flight.
    pub(crate) fn try_join(
        self: &Arc<Self>,
        function_id: FunctionId,
    ) -> Result<LeaderGuard<V, E>, broadcast::Receiver<Result<V, E>>> {
        let mut inflight = self.inflight.lock();
        if let Some(sender) = inflight.get(&function_id) {
            Err(sender.subscribe())
        } else {
            let (tx, _rx) = broadcast::channel(1);
            inflight.insert(function_id.clone(), tx);
            Ok(LeaderGuard {
                function_id: Some(function_id),
                pending: Arc::clone(self),
            })
        }
    }

    fn complete(&self, function_id: &FunctionId, result: Result<V, E>) {
        let mut inflight = self.inflight.lock();
        if let Some(sender) = inflight.remove(function_id) {
            let _ = sender.send(result);
        }
    }

    fn cancel(&self, function_id: &FunctionId) {
        self.inflight.lock().remove(function_id);
    }
}

/// Held by the leader of a coalesced load. Dropping it without calling
/// [`LeaderGuard::complete`] removes the pending entry so waiters observe a
/// closed channel (mapped to `LoadCancelled`) rather than hanging forever —
/// the same guarantee any coalescing future's `Drop` impl must give a
/// leader that is aborted mid-flight.
pub(crate) struct LeaderGuard<V, E>
where
    V: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    function_id: Option<FunctionId>,
    pending: Arc<PendingLoads<V, E>>,
}

impl<V, E> LeaderGuard<V, E>
where
    V: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    pub(crate) fn complete(mut self, result: Result<V, E>) {
        if let Some(function_id) = self.function_id.take() {
            self.pending.complete(&function_id, result);
        }
    }
}

impl<V, E> Drop for LeaderGuard<V, E>
where
    V: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn drop(&mut self) {
        if let Some(function_id) = self.function_id.take() {
            self.pending.cancel(&function_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_caller_joins_as_waiter() {
        let pending: Arc<PendingLoads<u32, String>> = Arc::new(PendingLoads::new());
        let fid = FunctionId::from("f");

        let leader = pending.try_join(fid.clone()).expect("first caller leads");
        let waiter = pending.try_join(fid.clone());
        assert!(waiter.is_err());

        let mut receiver = waiter.unwrap_err();
        leader.complete(Ok(42));
        assert_eq!(receiver.recv().await.unwrap(), Ok(42));
    }

    #[tokio::test]
    async fn dropped_leader_without_completing_cancels_waiters() {
        let pending: Arc<PendingLoads<u32, String>> = Arc::new(PendingLoads::new());
        let fid = FunctionId::from("f");

        let leader = pending.try_join(fid.clone()).expect("first caller leads");
        let waiter = pending.try_join(fid.clone());
        let mut receiver = waiter.unwrap_err();

        drop(leader);

        assert!(receiver.recv().await.is_err());
    }

    #[tokio::test]
    async fn completed_key_allows_new_leader() {
        let pending: Arc<PendingLoads<u32, String>> = Arc::new(PendingLoads::new());
        let fid = FunctionId::from("f");

        let leader = pending.try_join(fid.clone()).unwrap();
        leader.complete(Ok(1));

        assert!(pending.try_join(fid).is_ok());
    }
}
