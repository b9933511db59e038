// FM index over an encoded nucleotide text.
//
// This module contains the single-index machinery the descent search walks:
// - Occurrence counting with checkpoint blocks and popcount
// - LF steps: single-row fast path and the four-base bidirectional step
// - fchr single-character seeding and the multi-character ftab accelerator
//
// The BWT is built from a suffix array over the text with a sentinel
// appended; the sentinel row is tracked separately so occurrence bit planes
// only ever carry the four concrete bases.

use std::collections::HashMap;

use bio::data_structures::suffix_array::suffix_array;

use crate::align::{CODE_N, NUM_BASES};

const CP_SHIFT: u64 = 6;
const CP_MASK: u64 = 63;

/// Checkpoint block covering 64 BWT rows: occurrence counts for each base at
/// the block start plus one-hot encoded BWT bits for popcount queries.
#[derive(Debug, Clone, Copy, Default)]
struct CpOcc {
    counts: [u64; NUM_BASES],
    bits: [u64; NUM_BASES],
}

lazy_static::lazy_static! {
    // MASK[i] has the top i bits set, so counting rows with offset < i inside
    // a block is a single AND + popcount.
    static ref ONE_HOT_MASK: [u64; 64] = {
        let mut mask = [0u64; 64];
        let base = 0x8000_0000_0000_0000u64;
        for i in 1..64 {
            mask[i] = (mask[i - 1] >> 1) | base;
        }
        mask
    };
}

#[inline(always)]
fn popcount64(x: u64) -> u64 {
    x.count_ones() as u64
}

/// One strand of the paired index. `rows()` is text length + 1 (sentinel).
#[derive(Debug, Clone)]
pub struct FmIndex {
    bwt: Vec<u8>,
    cp_occ: Vec<CpOcc>,
    /// fchr[c] = first row whose suffix starts with code c; fchr[4] is one
    /// past the T block (N suffixes, if any, sort after it).
    fchr: [u64; 5],
    sentinel_row: u64,
    ftab: HashMap<u64, (u64, u64)>,
    ftab_chars: usize,
    rows: u64,
}

impl FmIndex {
    /// Build from an encoded text (codes 0..=4; 4 = N). `ftab_chars` of 0 or
    /// 1 disables the ftab.
    pub fn from_codes(text: &[u8], ftab_chars: usize) -> FmIndex {
        assert!(!text.is_empty(), "empty reference text");
        debug_assert!(text.iter().all(|&c| c <= CODE_N));

        // Shift codes to 1..=5 so 0 can serve as the sentinel the suffix
        // array construction requires.
        let mut shifted: Vec<u8> = Vec::with_capacity(text.len() + 1);
        shifted.extend(text.iter().map(|&c| c + 1));
        shifted.push(0);
        let sa = suffix_array(&shifted);
        let rows = shifted.len();

        let mut bwt = vec![0u8; rows];
        let mut sentinel_row = 0u64;
        for (i, &s) in sa.iter().enumerate() {
            if s == 0 {
                sentinel_row = i as u64;
            } else {
                bwt[i] = shifted[s - 1] - 1;
            }
        }

        let mut idx = FmIndex {
            bwt,
            cp_occ: Vec::new(),
            fchr: [0; 5],
            sentinel_row,
            ftab: HashMap::new(),
            ftab_chars,
            rows: rows as u64,
        };
        idx.build_fchr(text);
        idx.build_checkpoints();
        idx.build_ftab(text, &sa);
        log::debug!(
            "built FM index: {} rows, sentinel at {}, {} ftab entries (k={})",
            idx.rows,
            idx.sentinel_row,
            idx.ftab.len(),
            idx.ftab_chars
        );
        idx
    }

    fn build_fchr(&mut self, text: &[u8]) {
        let mut counts = [0u64; NUM_BASES];
        for &c in text {
            if (c as usize) < NUM_BASES {
                counts[c as usize] += 1;
            }
        }
        self.fchr[0] = 1; // row 0 is the sentinel suffix
        for c in 0..NUM_BASES {
            self.fchr[c + 1] = self.fchr[c] + counts[c];
        }
    }

    fn build_checkpoints(&mut self) {
        let nblocks = (self.rows >> CP_SHIFT) as usize + 1;
        let mut cp_occ = vec![CpOcc::default(); nblocks];
        let mut running = [0u64; NUM_BASES];
        for (i, &c) in self.bwt.iter().enumerate() {
            if i & CP_MASK as usize == 0 {
                cp_occ[i >> CP_SHIFT].counts = running;
            }
            if i as u64 != self.sentinel_row && (c as usize) < NUM_BASES {
                cp_occ[i >> CP_SHIFT].bits[c as usize] |= 1u64 << (63 - (i as u64 & CP_MASK));
                running[c as usize] += 1;
            }
        }
        if self.rows & CP_MASK == 0 {
            cp_occ[(self.rows >> CP_SHIFT) as usize].counts = running;
        }
        self.cp_occ = cp_occ;
    }

    fn build_ftab(&mut self, text: &[u8], sa: &[usize]) {
        let k = self.ftab_chars;
        if k <= 1 {
            return;
        }
        // Rows sharing a k-character suffix prefix are contiguous, so one
        // pass over the suffix array yields every interval.
        for (row, &s) in sa.iter().enumerate() {
            if s + k > text.len() {
                continue;
            }
            let window = &text[s..s + k];
            if window.iter().any(|&c| c as usize >= NUM_BASES) {
                continue;
            }
            let key = pack_kmer(window.iter().copied());
            let row = row as u64;
            self.ftab
                .entry(key)
                .and_modify(|e| e.1 = row + 1)
                .or_insert((row, row + 1));
        }
    }

    /// Number of BWT rows (text length + 1).
    #[inline]
    pub fn rows(&self) -> u64 {
        self.rows
    }

    #[inline]
    pub fn ftab_chars(&self) -> usize {
        self.ftab_chars
    }

    /// Row where the A/C/G/T block starting with code `c` begins; `fchr(4)`
    /// is one past the T block. Used for single-character seeding.
    #[inline]
    pub fn fchr(&self, c: usize) -> u64 {
        self.fchr[c]
    }

    /// Occurrences of base `c` in `bwt[0..row)`.
    #[inline]
    pub fn occ(&self, c: usize, row: u64) -> u64 {
        debug_assert!(c < NUM_BASES);
        debug_assert!(row <= self.rows);
        let cp = &self.cp_occ[(row >> CP_SHIFT) as usize];
        cp.counts[c] + popcount64(cp.bits[c] & ONE_HOT_MASK[(row & CP_MASK) as usize])
    }

    /// Single-row LF step: the BWT character at `row` and the row it maps
    /// to. `None` when the row holds the sentinel or an N.
    #[inline]
    pub fn map_lf1(&self, row: u64) -> Option<(u8, u64)> {
        if row == self.sentinel_row {
            return None;
        }
        let c = self.bwt[row as usize];
        if c as usize >= NUM_BASES {
            return None;
        }
        Some((c, self.fchr[c as usize] + self.occ(c as usize, row)))
    }

    /// Bidirectional LF step. `[top, bot)` is the pattern's range in this
    /// index; `[topp, botp)` is its range in the companion index. Returns,
    /// per base, the extended range in this index (`t`/`b`) and the
    /// synchronized companion range (`tp`/`bp`).
    ///
    /// The companion ranges follow from the fact that companion-side
    /// suffixes continuing the pattern sort by continuation character, with
    /// the end-of-text continuation first; that end-of-text case is exactly
    /// a walked-side range containing the sentinel row.
    pub fn map_bi_lf_ex(
        &self,
        top: u64,
        bot: u64,
        topp: u64,
        botp: u64,
    ) -> ([u64; 4], [u64; 4], [u64; 4], [u64; 4]) {
        debug_assert!(top < bot && bot <= self.rows);
        debug_assert_eq!(bot - top, botp - topp);
        let mut t = [0u64; 4];
        let mut b = [0u64; 4];
        for c in 0..NUM_BASES {
            t[c] = self.fchr[c] + self.occ(c, top);
            b[c] = self.fchr[c] + self.occ(c, bot);
        }
        let sent = (top <= self.sentinel_row && self.sentinel_row < bot) as u64;
        debug_assert!((0..4).map(|c| b[c] - t[c]).sum::<u64>() + sent <= bot - top);
        let mut tp = [0u64; 4];
        let mut bp = [0u64; 4];
        let mut cum = topp + sent;
        for c in 0..NUM_BASES {
            tp[c] = cum;
            bp[c] = cum + (b[c] - t[c]);
            cum = bp[c];
        }
        (t, b, tp, bp)
    }

    /// Range of the `ftab_chars`-long window of `seq` starting at `off`.
    /// With `reverse` the window is read right-to-left (used against the
    /// mirror index, whose text runs the other way). Returns an empty range
    /// when the window is absent or contains an N.
    pub fn ftab_lo_hi(&self, seq: &[u8], off: usize, reverse: bool) -> (u64, u64) {
        let k = self.ftab_chars;
        debug_assert!(k > 1 && off + k <= seq.len());
        let window = &seq[off..off + k];
        if window.iter().any(|&c| c as usize >= NUM_BASES) {
            return (0, 0);
        }
        let key = if reverse {
            pack_kmer(window.iter().rev().copied())
        } else {
            pack_kmer(window.iter().copied())
        };
        self.ftab.get(&key).copied().unwrap_or((0, 0))
    }
}

#[inline]
fn pack_kmer<I: Iterator<Item = u8>>(iter: I) -> u64 {
    let mut key = 0u64;
    for c in iter {
        debug_assert!((c as usize) < NUM_BASES);
        key = (key << 2) | c as u64;
    }
    key
}
