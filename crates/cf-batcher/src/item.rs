use cf_core::CoreError;
use uuid::Uuid;

/// Pending item in a batcher or priority queue.
/// `responder` is consumed exactly once, on resolve, reject, or queue drop.
pub(crate) struct QueuedItem<P, R> {
    pub(crate) id: Uuid,
    pub(crate) payload: P,
    pub(crate) priority: u8,
    pub(crate) queued_at_ms: i64,
    pub(crate) responder: tokio::sync::oneshot::Sender<Result<R, CoreError>>,
}

impl<P, R> QueuedItem<P, R> {
    pub(crate) fn fail(self, err: CoreError) {
        let _ = self.responder.send(Err(err));
    }
}
