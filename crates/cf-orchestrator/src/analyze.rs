use crate::pipeline::ComputePipeline;
use cf_core::Board;
use cf_core::CoreError;
use cf_core::PlayerColor;

/// One board to analyse.
#[derive(Clone, Debug)]
pub struct AnalyseRequest {
    pub board: Board,
    pub player: PlayerColor,
    pub difficulty: u8,
    pub deadline_ms: i64,
    pub priority: u8,
}

/// `{bestMove, score}` for one analysed board.
#[derive(Clone, Copy, Debug)]
pub struct AnalyseResult {
    pub best_move: usize,
    pub score: f32,
}

/// Batch processor handed to the `AnalyseBoards` [`cf_batcher::NamedBatcher`]:
/// every board in the flushed batch runs the same compute pipeline as a
/// single `GetMove` call, concurrently.
pub(crate) async fn analyse_batch(pipeline: &ComputePipeline, items: Vec<AnalyseRequest>) -> Vec<Result<AnalyseResult, CoreError>> {
    let futures = items.into_iter().map(|item| async move {
        let response = pipeline.run(&item.board, item.player, item.difficulty, item.deadline_ms, None).await;
        Ok(AnalyseResult { best_move: response.column, score: response.confidence })
    });
    futures::future::join_all(futures).await
}
