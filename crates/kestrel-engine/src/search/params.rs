//! Search tuning parameters.
//!
//! Every empirical margin and threshold used by the selective parts of the
//! search lives here, together with a switch per technique so each one can
//! be disabled on its own.

use crate::error::EngineError;

/// Tuning constants and technique switches for one search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    /// Half-width of the first aspiration window around the previous score.
    pub aspiration_delta: i32,
    /// Iterations shallower than this use a full window.
    pub aspiration_min_depth: i32,
    /// Failed aspiration attempts before falling back to a full window.
    pub aspiration_max_fails: u32,

    pub rfp_enabled: bool,
    pub rfp_max_depth: i32,
    /// Reverse futility margin per ply of depth.
    pub rfp_margin: i32,

    pub razor_enabled: bool,
    pub razor_max_depth: i32,
    pub razor_margin: i32,

    pub nmp_enabled: bool,
    pub nmp_min_depth: i32,
    /// Null-move reduction is `nmp_base_reduction + depth / nmp_depth_divisor`.
    pub nmp_base_reduction: i32,
    pub nmp_depth_divisor: i32,

    pub lmr_enabled: bool,
    pub lmr_min_depth: i32,
    /// Moves tried before this count are never reduced.
    pub lmr_min_move_index: usize,
    pub lmr_base: f64,
    pub lmr_divisor: f64,

    pub lmp_enabled: bool,
    pub lmp_max_depth: i32,
    /// Quiet moves allowed at depth `d` is `(lmp_base + d * d) / (2 - improving)`.
    pub lmp_base: i32,

    pub futility_enabled: bool,
    pub futility_max_depth: i32,
    pub futility_base: i32,
    pub futility_margin: i32,

    pub see_pruning_enabled: bool,
    pub see_max_depth: i32,
    /// Quiet moves losing more than `see_quiet_margin * depth` are skipped.
    pub see_quiet_margin: i32,
    /// Captures losing more than `see_capture_margin * depth * depth` are skipped.
    pub see_capture_margin: i32,

    pub check_extension: bool,
    pub promotion_extension: bool,
    pub singular_enabled: bool,
    pub singular_min_depth: i32,
    /// Singular beta is the hash score minus this many centipawns per ply.
    pub singular_margin: i32,

    pub qs_delta_enabled: bool,
    pub qs_delta_margin: i32,
    /// Quiescence plies before the static evaluation is returned outright.
    pub qs_max_depth: i32,
    /// Also try quiet checking moves on the first quiescence ply.
    pub qs_checks: bool,
}

impl SearchParams {
    /// Plain principal variation search: every pruning, reduction and
    /// extension is switched off and aspiration windows are never used.
    /// Transposition table and quiescence stay on.
    pub fn plain() -> Self {
        Self {
            aspiration_min_depth: i32::MAX,
            rfp_enabled: false,
            razor_enabled: false,
            nmp_enabled: false,
            lmr_enabled: false,
            lmp_enabled: false,
            futility_enabled: false,
            see_pruning_enabled: false,
            check_extension: false,
            promotion_extension: false,
            singular_enabled: false,
            qs_delta_enabled: false,
            qs_checks: false,
            ..Self::default()
        }
    }

    /// Reject values the search would divide by or loop on.
    pub fn validate(&self) -> Result<(), EngineError> {
        let invalid = |what: &str| Err(EngineError::InvalidConfig(what.to_string()));
        if self.aspiration_delta <= 0 {
            return invalid("aspiration delta must be positive");
        }
        if self.nmp_depth_divisor <= 0 {
            return invalid("null-move depth divisor must be positive");
        }
        if self.lmr_divisor.is_nan() || self.lmr_divisor <= 0.0 || !self.lmr_base.is_finite() {
            return invalid("late-move reduction base and divisor must be finite, divisor positive");
        }
        if self.qs_max_depth <= 0 {
            return invalid("quiescence depth bound must be positive");
        }
        Ok(())
    }

    /// Precompute the late-move reduction table for these parameters.
    pub fn lmr_table(&self) -> LmrTable {
        LmrTable::new(self.lmr_base, self.lmr_divisor)
    }
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            aspiration_delta: 25,
            aspiration_min_depth: 5,
            aspiration_max_fails: 4,

            rfp_enabled: true,
            rfp_max_depth: 8,
            rfp_margin: 80,

            razor_enabled: true,
            razor_max_depth: 2,
            razor_margin: 300,

            nmp_enabled: true,
            nmp_min_depth: 3,
            nmp_base_reduction: 3,
            nmp_depth_divisor: 4,

            lmr_enabled: true,
            lmr_min_depth: 3,
            lmr_min_move_index: 3,
            lmr_base: 0.75,
            lmr_divisor: 2.3,

            lmp_enabled: true,
            lmp_max_depth: 6,
            lmp_base: 3,

            futility_enabled: true,
            futility_max_depth: 6,
            futility_base: 90,
            futility_margin: 100,

            see_pruning_enabled: true,
            see_max_depth: 8,
            see_quiet_margin: -60,
            see_capture_margin: -25,

            check_extension: true,
            promotion_extension: true,
            singular_enabled: true,
            singular_min_depth: 8,
            singular_margin: 2,

            qs_delta_enabled: true,
            qs_delta_margin: 200,
            qs_max_depth: 16,
            qs_checks: false,
        }
    }
}

const LMR_SIZE: usize = 64;

/// Late-move reductions indexed by `[depth][move_index]`, both capped at 63.
///
/// `reduction = lmr_base + ln(depth) * ln(move_index) / lmr_divisor`.
#[derive(Clone)]
pub struct LmrTable {
    table: Box<[[u8; LMR_SIZE]; LMR_SIZE]>,
}

impl LmrTable {
    fn new(base: f64, divisor: f64) -> Self {
        let mut table = Box::new([[0u8; LMR_SIZE]; LMR_SIZE]);
        for (depth, row) in table.iter_mut().enumerate().skip(1) {
            for (index, cell) in row.iter_mut().enumerate().skip(1) {
                let r = base + (depth as f64).ln() * (index as f64).ln() / divisor;
                *cell = r.max(0.0) as u8;
            }
        }
        Self { table }
    }

    /// Base reduction for the `move_index`-th move (1-based) at `depth`.
    #[inline]
    pub fn reduction(&self, depth: i32, move_index: usize) -> i32 {
        let d = (depth.max(0) as usize).min(LMR_SIZE - 1);
        let i = move_index.min(LMR_SIZE - 1);
        self.table[d][i] as i32
    }
}

impl std::fmt::Debug for LmrTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LmrTable")
            .field("d8_m16", &self.reduction(8, 16))
            .finish()
    }
}
