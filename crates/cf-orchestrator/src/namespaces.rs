/// Breaker/retry operation name for the strategy-selected compute call.
pub(crate) const AI_COMPUTE_OPERATION: &str = "ai-compute";

/// Cache namespace for direct (non-precomputed) move computations, kept as
/// a sibling of [`cf_precompute::PRECOMPUTE_NAMESPACE`] under the same
/// prefix so the two are easy to spot together in a namespace dump.
pub(crate) const DIRECT_NAMESPACE: &str = const_format::concatcp!(cf_precompute::PRECOMPUTE_NAMESPACE, "-direct");

/// Batcher name for `AnalyseBoards`.
pub(crate) const ANALYSE_BATCHER_NAME: &str = const_format::concatcp!(AI_COMPUTE_OPERATION, "-analyse");

/// Priority-queue name for single-move `GetMove` dispatch.
pub(crate) const GET_MOVE_QUEUE_NAME: &str = const_format::concatcp!(AI_COMPUTE_OPERATION, "-queue");
