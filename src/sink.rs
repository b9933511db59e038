// Collection point for finished end-to-end alignments.
//
// The sink stores SA ranges, not reference loci; resolving rows to
// coordinates belongs to a later pipeline stage. Each report walks the
// descent chain back to its root to reassemble the edit list in 5'-to-3'
// order. Reports that land on an already-recorded forward range are
// discarded, so equivalent paths found through different roots or edit
// orders count once.

use crate::arena::Pool;
use crate::descent::{Descent, NONE};
use crate::edit::Edit;

#[derive(Debug, Clone)]
pub struct DescentAlignment {
    pub pen: i64,
    pub rid: usize,
    pub topf: u64,
    pub botf: u64,
    pub topb: u64,
    pub botb: u64,
    ei: usize,
    en: usize,
}

impl DescentAlignment {
    /// Number of reference occurrences this range covers.
    #[inline]
    pub fn n_elt(&self) -> u64 {
        self.botf - self.topf
    }
}

#[derive(Debug, Default)]
pub struct AlignmentSink {
    als: Vec<DescentAlignment>,
    edits: Vec<Edit>,
    nelt: u64,
}

impl AlignmentSink {
    pub fn new() -> AlignmentSink {
        AlignmentSink::default()
    }

    pub fn clear(&mut self) {
        self.als.clear();
        self.edits.clear();
        self.nelt = 0;
    }

    /// Number of distinct SA ranges recorded.
    #[inline]
    pub fn n_range(&self) -> usize {
        self.als.len()
    }

    /// Total elements across all recorded ranges.
    #[inline]
    pub fn n_elt(&self) -> u64 {
        self.nelt
    }

    #[inline]
    pub fn alignment(&self, i: usize) -> &DescentAlignment {
        &self.als[i]
    }

    /// Edits of the i-th alignment, ordered 5' to 3'.
    pub fn edits(&self, i: usize) -> &[Edit] {
        let al = &self.als[i];
        &self.edits[al.ei..al.ei + al.en]
    }

    /// Lowest penalty among recorded alignments.
    pub fn best_pen(&self) -> Option<i64> {
        self.als.iter().map(|a| a.pen).min()
    }

    /// Record one end-to-end hit. `descid` is the leaf descent; `extra` is
    /// an edit taken on the final step that never got its own descent.
    /// Returns false when the range duplicates an earlier report.
    #[allow(clippy::too_many_arguments)]
    pub fn report_alignment(
        &mut self,
        topf: u64,
        botf: u64,
        topb: u64,
        botb: u64,
        descid: usize,
        rid: usize,
        extra: Option<Edit>,
        pen: i64,
        df: &Pool<Descent>,
    ) -> bool {
        debug_assert!(botf > topf);
        debug_assert_eq!(botf - topf, botb - topb);
        if self.als.iter().any(|a| a.topf == topf && a.botf == botf) {
            return false;
        }
        let ei = self.edits.len();
        let mut cur = descid;
        while cur != NONE {
            if let Some(e) = df[cur].edit {
                self.edits.push(e);
            }
            cur = df[cur].parent;
        }
        if let Some(e) = extra {
            self.edits.push(e);
        }
        self.edits[ei..].sort_by_key(|e| (e.pos, e.pos2));
        let en = self.edits.len() - ei;
        self.als.push(DescentAlignment { pen, rid, topf, botf, topb, botb, ei, en });
        self.nelt += botf - topf;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descent::Descent;

    fn chain(df: &mut Pool<Descent>, edits: &[Edit]) -> usize {
        let mut parent = NONE;
        let mut last = NONE;
        for &e in edits {
            let id = df.alloc();
            df[id].parent = parent;
            df[id].edit = Some(e);
            parent = id;
            last = id;
        }
        last
    }

    #[test]
    fn test_chain_walk_orders_edits() {
        let mut df: Pool<Descent> = Pool::new();
        // Chain recorded out of 5'-to-3' order, as a bounced search does.
        let leaf = chain(
            &mut df,
            &[Edit::mismatch(20, b'A', b'C'), Edit::mismatch(4, b'G', b'T')],
        );
        let mut sink = AlignmentSink::new();
        assert!(sink.report_alignment(10, 11, 30, 31, leaf, 0, Some(Edit::mismatch(12, b'C', b'A')), 9, &df));
        let positions: Vec<u32> = sink.edits(0).iter().map(|e| e.pos).collect();
        assert_eq!(positions, vec![4, 12, 20]);
        assert_eq!(sink.n_range(), 1);
        assert_eq!(sink.n_elt(), 1);
    }

    #[test]
    fn test_duplicate_range_dropped() {
        let mut df: Pool<Descent> = Pool::new();
        let a = df.alloc();
        let mut sink = AlignmentSink::new();
        assert!(sink.report_alignment(5, 7, 9, 11, a, 0, None, 0, &df));
        // Same forward range again, even at a worse penalty, is ignored.
        assert!(!sink.report_alignment(5, 7, 9, 11, a, 0, None, 6, &df));
        assert_eq!(sink.n_range(), 1);
        assert_eq!(sink.n_elt(), 2);
        assert_eq!(sink.best_pen(), Some(0));
    }
}
