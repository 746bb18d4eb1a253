//! Fixed-depth benchmark over a small position set.

use std::time::Instant;

use anyhow::{Context, Result};
use kestrel_core::Position;
use kestrel_engine::{Engine, SearchLimits, SearchStats};
use tracing::debug;

pub const DEFAULT_DEPTH: u8 = 9;

const POSITIONS: [&str; 8] = [
    "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
    "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
    "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
    "r1bqkb1r/pppp1ppp/2n2n2/4p2Q/2B1P3/8/PPPP1PPP/RNB1K1NR w KQkq - 4 4",
    "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
    "r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - - 0 10",
    "8/8/4k3/8/2p5/8/B2P2K1/8 w - - 0 1",
    "6k1/5ppp/8/8/8/8/8/R5K1 w - - 0 1",
];

/// Search every bench position to `depth` and print node and speed totals.
pub fn run(engine: &Engine, depth: u8) -> Result<()> {
    let limits = SearchLimits::depth(depth);
    let started = Instant::now();
    let mut nodes = 0u64;
    let mut stats = SearchStats::default();

    for (index, fen) in POSITIONS.iter().enumerate() {
        let pos = Position::from_fen(fen).with_context(|| format!("bad bench FEN {fen:?}"))?;
        engine.new_game();
        let result = engine.search(&pos, &limits, |_| {})?;
        debug!(index, fen, best = %result.best_move, nodes = result.nodes, "bench position done");
        println!(
            "{:>2} {:<6} {:>10} nodes  {} pv {}",
            index + 1,
            result.best_move.to_uci(),
            result.nodes,
            result.display_score(),
            crate::format_pv(&result.pv)
        );
        nodes += result.nodes;
        stats.merge(&result.stats);
    }

    let elapsed = started.elapsed();
    let nps = nodes * 1000 / (elapsed.as_millis().max(1) as u64);
    println!("{nodes} nodes {nps} nps");
    println!(
        "tt hits {}  null moves {}/{}  lmr re-searches {}  first-move cutoffs {:.1}%",
        stats.tt_hits,
        stats.null_move_cutoffs,
        stats.null_move_tries,
        stats.lmr_researches,
        stats.first_move_cutoff_rate()
    );
    Ok(())
}
