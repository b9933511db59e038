// Penalty model for the descent search.
//
// Penalties are non-negative and accumulate along a search path; 0 means a
// perfect match. Gap costs are affine: opening costs const + linear, each
// extension costs linear again.

use crate::align::CODE_N;

/// Highest quality value that still scales a quality-dependent penalty.
const QUAL_CEIL: i64 = 40;

/// How the mismatch penalty depends on the base call quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmCostModel {
    /// Same penalty regardless of quality.
    Constant(i64),
    /// Interpolate between `min` (quality 0) and `max` (quality >= 40).
    QualityScaled { min: i64, max: i64 },
}

/// Linear function used for score floors.
#[derive(Debug, Clone, Copy)]
pub struct LinearFunc {
    pub konst: f64,
    pub coeff: f64,
}

impl LinearFunc {
    pub fn new(konst: f64, coeff: f64) -> LinearFunc {
        LinearFunc { konst, coeff }
    }

    #[inline]
    pub fn eval(&self, x: f64) -> f64 {
        self.konst + self.coeff * x
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Scoring {
    pub mm_cost: MmCostModel,
    pub read_gap_const: i64,
    pub read_gap_linear: i64,
    pub ref_gap_const: i64,
    pub ref_gap_linear: i64,
    /// No gaps within this many bases of either read end. Must be >= 1.
    pub gapbar: usize,
    /// Bonus per matched base; 0 for end-to-end alignment.
    pub match_bonus: i64,
    /// Minimum acceptable score as a function of read length.
    pub score_min: LinearFunc,
}

impl Scoring {
    /// Default end-to-end scheme: constant mismatch penalty 3, affine gaps
    /// 5 + 3 per base, gaps barred within 4 bases of the read ends.
    pub fn base() -> Scoring {
        Scoring {
            mm_cost: MmCostModel::Constant(3),
            read_gap_const: 5,
            read_gap_linear: 3,
            ref_gap_const: 5,
            ref_gap_linear: 3,
            gapbar: 4,
            match_bonus: 0,
            score_min: LinearFunc::new(-0.6, -0.6),
        }
    }

    /// Mismatch penalty for read character `c` (code; `CODE_N` for N) at
    /// quality `q`. An N in the read mismatches every base at this penalty.
    #[inline]
    pub fn mm(&self, c: u8, q: u8) -> i64 {
        debug_assert!(c <= CODE_N);
        match self.mm_cost {
            MmCostModel::Constant(pen) => pen,
            MmCostModel::QualityScaled { min, max } => {
                let q = (q as i64).min(QUAL_CEIL);
                min + ((max - min) * q + QUAL_CEIL / 2) / QUAL_CEIL
            }
        }
    }

    #[inline]
    pub fn read_gap_open(&self) -> i64 {
        self.read_gap_const + self.read_gap_linear
    }

    #[inline]
    pub fn read_gap_extend(&self) -> i64 {
        self.read_gap_linear
    }

    #[inline]
    pub fn ref_gap_open(&self) -> i64 {
        self.ref_gap_const + self.ref_gap_linear
    }

    #[inline]
    pub fn ref_gap_extend(&self) -> i64 {
        self.ref_gap_linear
    }

    /// Minimum acceptable alignment score for a read of the given length.
    pub fn score_min(&self, len: usize) -> i64 {
        self.score_min.eval(len as f64).floor() as i64
    }

    /// Score of a perfect end-to-end alignment of the given length.
    pub fn perfect_score(&self, len: usize) -> i64 {
        self.match_bonus * len as i64
    }
}
