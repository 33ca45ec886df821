use cf_core::Board;
use cf_core::Fingerprint;
use cf_core::PlayerColor;

/// Scheduled speculative compute. `priority`
/// is monotone in `derived_probability`; the active set dedups by
/// `(fingerprint, player)`.
#[derive(Clone, Debug)]
pub(crate) struct PrecomputeJob {
    pub(crate) board: Board,
    pub(crate) player: PlayerColor,
    pub(crate) depth: u8,
    pub(crate) priority: f32,
    pub(crate) derived_probability: f32,
    pub(crate) fingerprint: Fingerprint,
    pub(crate) queued_at_ms: i64,
}

/// Index of the lowest-priority job in the queue, ties broken toward the
/// most-recently-queued (so older, presumably-still-useful jobs survive).
pub(crate) fn lowest_priority_index(queue: &std::collections::VecDeque<PrecomputeJob>) -> Option<usize> {
    queue
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.priority.partial_cmp(&b.priority).unwrap_or(std::cmp::Ordering::Equal).then(b.queued_at_ms.cmp(&a.queued_at_ms)))
        .map(|(idx, _)| idx)
}

/// Index of the highest-priority job in the queue.
pub(crate) fn highest_priority_index(queue: &std::collections::VecDeque<PrecomputeJob>) -> Option<usize> {
    queue
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.priority.partial_cmp(&b.priority).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(idx, _)| idx)
}
