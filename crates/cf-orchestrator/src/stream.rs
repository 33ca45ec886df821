use crate::pipeline::ComputePipeline;
use cf_core::Alternative;
use cf_core::MoveRequest;
use cf_core::MoveResponse;
use std::sync::Arc;

/// One frame of a `StreamAnalysis` sequence. Frames are produced in order;
/// `Complete` is always last.
#[derive(Clone, Debug)]
pub enum AnalysisUpdate {
    Progress { fraction: f32 },
    Variation { alternative: Alternative },
    Complete { response: MoveResponse },
}

/// Runs `request` through the compute pipeline while narrating progress,
/// returning a channel the caller can poll or drop. Dropping the receiver
/// before `Complete` is produced cancels the remaining work: the background
/// task's next `send` fails and it stops rather than finishing the compute
/// for no one.
pub(crate) fn stream_analysis(pipeline: Arc<ComputePipeline>, request: MoveRequest, deadline_ms: i64) -> tokio::sync::mpsc::Receiver<AnalysisUpdate> {
    let (tx, rx) = tokio::sync::mpsc::channel(8);
    tokio::spawn(async move {
        if tx.send(AnalysisUpdate::Progress { fraction: 0.0 }).await.is_err() {
            return;
        }

        let response = pipeline.run(&request.board, request.player, request.difficulty, deadline_ms, request.strategy_override).await;

        if tx.send(AnalysisUpdate::Progress { fraction: 0.8 }).await.is_err() {
            return;
        }
        for alternative in &response.alternatives {
            if tx.send(AnalysisUpdate::Variation { alternative: alternative.clone() }).await.is_err() {
                return;
            }
        }

        let _ = tx.send(AnalysisUpdate::Complete { response }).await;
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cf_breaker::RetryConfig;
    use cf_core::Alternative;
    use cf_core::Board;
    use cf_core::Clock;
    use cf_core::ComputeMove;
    use cf_core::ComputeOutcome;
    use cf_core::CoreError;
    use cf_core::EventBus;
    use cf_core::PlayerColor;
    use cf_core::SeededRandom;
    use cf_core::SystemClock;
    use cf_strategy::SelectorConfig;
    use cf_strategy::StrategySelector;

    struct StubCompute;
    #[async_trait]
    impl ComputeMove for StubCompute {
        async fn compute_move(&self, board: &Board, _player: PlayerColor, _strategy: cf_core::StrategyTag, _deadline_ms: i64) -> Result<ComputeOutcome, CoreError> {
            let column = board.legal_moves()[0];
            Ok(ComputeOutcome {
                column,
                score: 1.0,
                confidence: 0.8,
                alternatives: vec![Alternative { column, score: 0.5, reasoning: "runner-up".to_string() }],
            })
        }
    }

    fn pipeline() -> Arc<ComputePipeline> {
        Arc::new(ComputePipeline {
            cache: None,
            breaker: None,
            retry_config: RetryConfig::default(),
            selector: Arc::new(StrategySelector::new(SelectorConfig::default())),
            compute: Arc::new(StubCompute),
            opening_book: None,
            rng: Arc::new(SeededRandom::new(1)),
            clock: Arc::new(SystemClock),
            events: Arc::new(EventBus::default()),
        })
    }

    #[tokio::test]
    async fn emits_progress_variations_then_completes() {
        let pipeline = pipeline();
        let request = MoveRequest::new("g1", Board::empty(), PlayerColor::Red, 5);
        let deadline = pipeline.clock.now_millis() + 5_000;
        let mut rx = stream_analysis(pipeline, request, deadline);

        let mut saw_complete = false;
        while let Some(update) = rx.recv().await {
            if matches!(update, AnalysisUpdate::Complete { .. }) {
                saw_complete = true;
            }
        }
        assert!(saw_complete);
    }

    #[tokio::test]
    async fn dropping_the_receiver_does_not_panic_the_task() {
        let pipeline = pipeline();
        let request = MoveRequest::new("g1", Board::empty(), PlayerColor::Red, 5);
        let deadline = pipeline.clock.now_millis() + 5_000;
        let rx = stream_analysis(pipeline, request, deadline);
        drop(rx);
    }
}
