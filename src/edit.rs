// Edits describe how an alignment path departs from an exact match.
//
// Positions are 5'-relative offsets into the read, in the orientation the
// search root selected. `pos2` chains consecutive gap edits so that a gap
// extension can be told apart from a fresh gap opened at the same offset.

use std::fmt;

/// Anchor value for `pos2` on a newly opened gap. Extensions step it by one
/// per link, so related edits differ by their distance along the chain.
pub const POS2_ANCHOR: u32 = u32::MAX >> 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    /// Read and reference both consume a character that differs.
    Mismatch,
    /// Reference consumes a character the read lacks (deletion from read).
    ReadGap,
    /// Read consumes a character the reference lacks (insertion in read).
    RefGap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edit {
    /// 5'-relative read offset of the edit.
    pub pos: u32,
    /// Gap chain position; `POS2_ANCHOR` for anything but a gap extension.
    pub pos2: u32,
    /// Reference-side character (ASCII), `-` for a ref gap.
    pub chr: u8,
    /// Read-side character (ASCII), `-` for a read gap.
    pub qchr: u8,
    pub kind: EditKind,
}

impl Edit {
    pub fn mismatch(pos: u32, ref_chr: u8, read_chr: u8) -> Edit {
        Edit { pos, pos2: POS2_ANCHOR, chr: ref_chr, qchr: read_chr, kind: EditKind::Mismatch }
    }

    pub fn read_gap(pos: u32, ref_chr: u8) -> Edit {
        Edit { pos, pos2: POS2_ANCHOR, chr: ref_chr, qchr: b'-', kind: EditKind::ReadGap }
    }

    pub fn ref_gap(pos: u32, read_chr: u8) -> Edit {
        Edit { pos, pos2: POS2_ANCHOR, chr: b'-', qchr: read_chr, kind: EditKind::RefGap }
    }

    #[inline]
    pub fn is_mismatch(&self) -> bool {
        self.kind == EditKind::Mismatch
    }

    #[inline]
    pub fn is_read_gap(&self) -> bool {
        self.kind == EditKind::ReadGap
    }

    #[inline]
    pub fn is_ref_gap(&self) -> bool {
        self.kind == EditKind::RefGap
    }

    #[inline]
    pub fn is_gap(&self) -> bool {
        !self.is_mismatch()
    }
}

impl fmt::Display for Edit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}>{}", self.pos, self.chr as char, self.qchr as char)
    }
}
