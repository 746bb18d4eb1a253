//! Lazy SMP: several workers searching the same root and sharing one
//! transposition table.

use std::thread;

use kestrel_core::Position;
use tracing::{debug, info, warn};

use crate::search::control::SearchControl;
use crate::search::negamax::SearchContext;
use crate::search::params::SearchParams;
use crate::search::score::Score;
use crate::search::tt::TranspositionTable;
use crate::search::{SearchInfo, SearchResult};

/// Worker threads recurse up to `MAX_PLY` frames deep.
const WORKER_STACK_SIZE: usize = 16 * 1024 * 1024;

/// Run `threads` workers on `root` until worker 0 finishes or the control
/// stops them.
///
/// Worker 0 runs on the calling thread and is the only one that reports
/// progress and adjusts the soft limit. Odd helpers start one depth later
/// and break move-ordering ties the other way so the workers fan out over
/// different parts of the tree. Helpers that run out of depths simply
/// exit; worker 0 finishing raises the stop flag for the rest. The deepest
/// result wins, ties going to worker 0. A helper result deeper than any
/// depth worker 0 reported is reported before returning.
pub fn parallel_search<F>(
    tt: &TranspositionTable,
    root: &Position,
    max_depth: u8,
    control: &SearchControl,
    params: &SearchParams,
    threads: usize,
    mut on_info: F,
) -> SearchResult
where
    F: FnMut(&SearchInfo<'_>),
{
    let threads = threads.max(1);
    if threads == 1 {
        let mut ctx = SearchContext::new(0, tt, control, params);
        let mut result = ctx.iterate(root, max_depth, 1, on_info);
        control.wait_if_held();
        result.nodes = control.total_nodes();
        return result;
    }

    info!(threads, "starting lazy smp search");
    let (main, helpers) = thread::scope(|s| {
        let mut handles = Vec::with_capacity(threads - 1);
        for id in 1..threads {
            let spawned = thread::Builder::new()
                .name(format!("kestrel-search-{id}"))
                .stack_size(WORKER_STACK_SIZE)
                .spawn_scoped(s, move || {
                    let mut ctx = SearchContext::new(id, tt, control, params);
                    let start_depth = 1 + (id % 2) as u8;
                    ctx.iterate(root, max_depth, start_depth, |_| {})
                });
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(err) => warn!(id, %err, "failed to spawn search worker"),
            }
        }

        let mut ctx = SearchContext::new(0, tt, control, params);
        let main = ctx.iterate(root, max_depth, 1, &mut on_info);
        control.wait_if_held();
        control.stop();

        let helpers: Vec<SearchResult> = handles.into_iter().filter_map(|h| h.join().ok()).collect();
        (main, helpers)
    });

    let reported_depth = main.depth;
    let mut stats = main.stats;
    let mut best = main;
    for (id, result) in helpers.into_iter().enumerate() {
        stats.merge(&result.stats);
        debug!(worker = id + 1, depth = result.depth, score = result.score, "helper finished");
        if result.depth > best.depth && !result.best_move.is_null() {
            best = result;
        }
    }
    best.stats = stats;
    best.nodes = control.total_nodes();
    if best.depth > reported_depth {
        report(&best, tt, &mut on_info);
    }
    best
}

fn report<F>(result: &SearchResult, tt: &TranspositionTable, on_info: &mut F)
where
    F: FnMut(&SearchInfo<'_>),
{
    let millis = result.elapsed.as_millis().max(1) as u64;
    on_info(&SearchInfo {
        depth: result.depth,
        seldepth: result.seldepth,
        score: Score::from_internal(result.score),
        nodes: result.nodes,
        nps: result.nodes * 1000 / millis,
        elapsed: result.elapsed,
        hashfull: tt.hashfull(),
        pv: &result.pv,
    });
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;

    use super::*;

    #[test]
    fn single_thread_reports_shared_node_total() {
        let tt = TranspositionTable::new(4);
        let control = SearchControl::new_infinite(Arc::new(AtomicBool::new(false)));
        let params = SearchParams::default();
        let result = parallel_search(&tt, &Position::startpos(), 3, &control, &params, 1, |_| {});
        assert_eq!(result.depth, 3);
        assert_eq!(result.nodes, control.total_nodes());
    }

    #[test]
    fn every_completed_depth_is_reported() {
        let params = SearchParams::default();
        let pos = Position::startpos();
        for _ in 0..10 {
            let tt = TranspositionTable::new(8);
            let control = SearchControl::new_infinite(Arc::new(AtomicBool::new(false)));
            let mut depths = Vec::new();
            let result = parallel_search(&tt, &pos, 4, &control, &params, 4, |info| depths.push(info.depth));
            assert_eq!(result.depth, 4);
            assert_eq!(depths, vec![1, 2, 3, 4]);
        }
    }

    #[test]
    fn deeper_helper_result_is_reported() {
        let tt = TranspositionTable::new(1);
        let pos = Position::startpos();
        let mv = pos.parse_uci_move("e2e4").unwrap();
        let result = SearchResult {
            best_move: mv,
            ponder_move: None,
            pv: vec![mv],
            score: 20,
            depth: 7,
            seldepth: 9,
            nodes: 5000,
            stats: Default::default(),
            elapsed: std::time::Duration::from_millis(10),
        };
        let mut seen = Vec::new();
        report(&result, &tt, &mut |info: &SearchInfo<'_>| seen.push((info.depth, info.nps, info.pv.to_vec())));
        assert_eq!(seen, vec![(7, 500_000, vec![mv])]);
    }

    #[test]
    fn helpers_stop_when_main_finishes() {
        let tt = TranspositionTable::new(8);
        let control = SearchControl::new_infinite(Arc::new(AtomicBool::new(false)));
        let params = SearchParams::default();
        let pos = Position::startpos();
        let result = parallel_search(&tt, &pos, 5, &control, &params, 3, |_| {});
        assert!(result.depth >= 5);
        assert!(pos.is_legal(result.best_move));
        assert!(control.is_stopped());
    }
}
