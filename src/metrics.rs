// Counters accumulated across a search. A caller may inspect them between
// `go()` calls; nothing in the core reads them back.

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DescentMetrics {
    /// Total BWT operations.
    pub bwops: u64,
    /// BWT operations on ranges wider than one row.
    pub bwops_bi: u64,
    /// BWT operations on single-row ranges.
    pub bwops_1: u64,
    /// Multi-character ftab jumps taken at roots.
    pub ftabs: u64,
    /// Positions where extension left at least one branch untaken.
    pub branches: u64,
    /// Arena allocations (descents and positions).
    pub allocs: u64,
}

impl DescentMetrics {
    pub fn reset(&mut self) {
        *self = DescentMetrics::default();
    }

    pub fn merge(&mut self, other: &DescentMetrics) {
        self.bwops += other.bwops;
        self.bwops_bi += other.bwops_bi;
        self.bwops_1 += other.bwops_1;
        self.ftabs += other.ftabs;
        self.branches += other.branches;
        self.allocs += other.allocs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge() {
        let mut a = DescentMetrics { bwops: 3, bwops_bi: 2, bwops_1: 1, ftabs: 1, branches: 4, allocs: 9 };
        let b = a;
        a.merge(&b);
        assert_eq!(a.bwops, 6);
        assert_eq!(a.allocs, 18);
        a.reset();
        assert_eq!(a, DescentMetrics::default());
    }
}
