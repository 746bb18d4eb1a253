//! Quiescence search: resolve captures until the position is quiet.

use kestrel_core::{Position, piece_value};

use crate::search::negamax::SearchContext;
use crate::search::ordering::MovePicker;
use crate::search::score::{DRAW, INF, MAX_PLY, mated_in};

impl SearchContext<'_> {
    /// Captures and promotions only (all evasions when in check), with a
    /// stand-pat lower bound. `qdepth` counts down the remaining capture
    /// plies; the first one may also try quiet checks when enabled.
    pub(crate) fn quiesce(&mut self, pos: &mut Position, ply: usize, mut alpha: i32, beta: i32, qdepth: i32) -> i32 {
        if self.enter_node(ply) {
            return 0;
        }
        if ply > 0 && pos.is_draw() {
            return DRAW;
        }
        if ply >= MAX_PLY - 1 || qdepth <= 0 {
            return pos.evaluate();
        }

        let p = self.params;
        let in_check = pos.is_in_check();
        let stand_pat = if in_check { -INF } else { pos.evaluate() };
        if stand_pat >= beta {
            return stand_pat;
        }
        alpha = alpha.max(stand_pat);
        let mut best = stand_pat;

        let with_checks = p.qs_checks && qdepth == p.qs_max_depth;
        let mut picker = MovePicker::new_qsearch(pos, in_check, with_checks);
        let mut searched = 0usize;

        while let Some(mv) = picker.next_move(pos, &self.history) {
            searched += 1;
            if !in_check && p.qs_delta_enabled && mv.promotion().is_none() {
                let gain = pos.captured_piece(mv).map_or(0, piece_value);
                if stand_pat + gain + p.qs_delta_margin <= alpha {
                    continue;
                }
            }

            let undo = pos.make(mv);
            let score = -self.quiesce(pos, ply + 1, -beta, -alpha, qdepth - 1);
            pos.unmake(undo);
            if self.aborted {
                return 0;
            }

            if score > best {
                best = score;
                if score >= beta {
                    return score;
                }
                alpha = alpha.max(score);
            }
        }

        if in_check && searched == 0 {
            return mated_in(ply);
        }
        best
    }
}
