// Paired FM index: a forward index over the reference text and a mirror
// index over the reversed text. Walking the forward index extends a pattern
// leftward in the text; walking the mirror extends it rightward. Either walk
// keeps the companion range synchronized via `map_bi_lf_ex`, so the search
// can change direction at any point without re-deriving state.

use crate::align::{base_to_code, CODE_N};
use crate::fm_index::FmIndex;

/// Default ftab depth, matching the window the root jump uses.
pub const DEFAULT_FTAB_CHARS: usize = 10;

#[derive(Debug, Clone)]
pub struct PairedFmIndex {
    fwd: FmIndex,
    mir: FmIndex,
    ftab_chars: usize,
}

impl PairedFmIndex {
    /// Build both strands from encoded reference sequences. Multiple
    /// sequences are joined with an N so no pattern can match across a
    /// boundary (patterns containing N never match anything).
    pub fn from_codes(refs: &[Vec<u8>], ftab_chars: usize) -> PairedFmIndex {
        assert!(!refs.is_empty(), "no reference sequences");
        let mut text: Vec<u8> = Vec::new();
        for (i, r) in refs.iter().enumerate() {
            if i > 0 {
                text.push(CODE_N);
            }
            text.extend_from_slice(r);
        }
        let mut rtext = text.clone();
        rtext.reverse();
        let fwd = FmIndex::from_codes(&text, ftab_chars);
        let mir = FmIndex::from_codes(&rtext, ftab_chars);
        debug_assert_eq!(fwd.rows(), mir.rows());
        for c in 0..=4 {
            debug_assert_eq!(fwd.fchr(c), mir.fchr(c));
        }
        PairedFmIndex { fwd, mir, ftab_chars }
    }

    /// Convenience constructor from ASCII references with the default ftab.
    pub fn from_strs(refs: &[&[u8]]) -> PairedFmIndex {
        let encoded: Vec<Vec<u8>> = refs.iter().map(|r| r.iter().map(|&b| base_to_code(b)).collect()).collect();
        PairedFmIndex::from_codes(&encoded, DEFAULT_FTAB_CHARS)
    }

    #[inline]
    pub fn fwd(&self) -> &FmIndex {
        &self.fwd
    }

    #[inline]
    pub fn mir(&self) -> &FmIndex {
        &self.mir
    }

    #[inline]
    pub fn ftab_chars(&self) -> usize {
        self.ftab_chars
    }
}
