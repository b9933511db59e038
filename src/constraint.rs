// Depth-indexed penalty budgets.
//
// A constraint maps the number of already-aligned characters (depth from the
// search root) to the maximum cumulative penalty allowed at that depth. It
// must be non-decreasing: budget never shrinks as an alignment grows.

/// Maximum cumulative penalty as a function of depth.
#[derive(Debug, Clone)]
pub enum PenaltyConstraint {
    /// `floor(konst + slope * depth)`.
    Linear { konst: f64, slope: f64 },
    /// Explicit table; depths beyond the end reuse the last entry.
    Table(Vec<i64>),
}

impl PenaltyConstraint {
    pub fn linear(konst: f64, slope: f64) -> PenaltyConstraint {
        assert!(konst >= 0.0 && slope >= 0.0, "constraint must be non-decreasing");
        PenaltyConstraint::Linear { konst, slope }
    }

    pub fn table(caps: Vec<i64>) -> PenaltyConstraint {
        assert!(!caps.is_empty(), "empty constraint table");
        assert!(caps.windows(2).all(|w| w[0] <= w[1]), "constraint must be non-decreasing");
        PenaltyConstraint::Table(caps)
    }

    /// No edits anywhere: every depth caps at zero penalty.
    pub fn exact() -> PenaltyConstraint {
        PenaltyConstraint::Linear { konst: 0.0, slope: 0.0 }
    }

    #[inline]
    pub fn max_pen(&self, depth: usize) -> i64 {
        match self {
            PenaltyConstraint::Linear { konst, slope } => (konst + slope * depth as f64).floor() as i64,
            PenaltyConstraint::Table(caps) => caps[depth.min(caps.len() - 1)],
        }
    }
}

/// What to do with a descent once it can no longer be extended end-to-end.
/// Carried per root for downstream stages; the core search does not branch
/// on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtensionPolicy {
    #[default]
    None,
    FromFirstBranch,
    FromEachEdge,
}

/// Per-root search configuration.
#[derive(Debug, Clone)]
pub struct DescentConfig {
    pub cons: PenaltyConstraint,
    pub expol: ExtensionPolicy,
}

impl DescentConfig {
    pub fn new(cons: PenaltyConstraint) -> DescentConfig {
        DescentConfig { cons, expol: ExtensionPolicy::None }
    }
}
