// Best-first driver for the descent search.
//
// The driver owns everything a search touches: the query, the roots and
// their constraints, the two arenas, the heap, the redundancy checker and
// the sink. One `go()` call runs one read's search to exhaustion: roots are
// seeded in declaration order, then descents are popped best-first and each
// pop follows that descent's best remaining outgoing edge, possibly
// spawning a child descent that extends by exact matches until it branches,
// bounces off a read end, or completes.
//
// Direction bookkeeping: `toward3p = (l2r == fw)` says whether extension
// moves toward the oriented read's 3' end, which is also whether the next
// reference character is appended on the right of the matched pattern —
// i.e. whether the mirror index is the one to walk.

use crate::align::{base_to_code, code_to_base, CODE_N};
use crate::arena::Pool;
use crate::constraint::DescentConfig;
use crate::descent::{
    Descent, DescentEdge, DescentPos, DescentPriority, NONE,
};
use crate::edit::Edit;
use crate::heap::DescentHeap;
use crate::index::PairedFmIndex;
use crate::metrics::DescentMetrics;
use crate::query::Query;
use crate::redundancy::{RedundancyChecker, RedundancyKey};
use crate::scoring::Scoring;
use crate::sink::AlignmentSink;

/// Roots deeper than this never use the ftab jump; the jump would skip the
/// per-position branch records the constraint might still care about.
const NOBRANCH_DEPTH: usize = 20;

/// Where and how a search starts.
#[derive(Debug, Clone, Copy)]
pub struct DescentRoot {
    /// 5' offset into the read, in the orientation `fw` selects.
    pub off5p: usize,
    /// Initial extension direction.
    pub l2r: bool,
    /// Align the forward read (true) or its reverse complement.
    pub fw: bool,
    /// Tie-break priority among roots; lower is explored first.
    pub pri: f32,
}

/// Field bundle for creating a descent; roots, bounces and edge children
/// differ only in what they pass here.
struct DescentSeed {
    rid: usize,
    al5pi: usize,
    al5pf: usize,
    topf: u64,
    botf: u64,
    topb: u64,
    botb: u64,
    l2r: bool,
    parent: usize,
    pen: i64,
    edit: Option<Edit>,
}

/// What `follow_matches` learned beyond the descent's own fields.
#[derive(Debug, Default, Clone, Copy)]
struct FollowOutcome {
    hit_end: bool,
    done: bool,
    // Terminal ranges, valid when hit_end: where a bounce would resume.
    topf: u64,
    botf: u64,
    topb: u64,
    botb: u64,
}

#[derive(Debug, Default)]
pub struct DescentDriver {
    q: Option<Query>,
    roots: Vec<DescentRoot>,
    confs: Vec<DescentConfig>,
    df: Pool<Descent>,
    pf: Pool<DescentPos>,
    heap: DescentHeap,
    re: RedundancyChecker,
    sink: AlignmentSink,
}

impl DescentDriver {
    pub fn new() -> DescentDriver {
        DescentDriver::default()
    }

    /// Install the read to search and clear all prior state.
    pub fn init_read(&mut self, q: Query) {
        self.q = Some(q);
        self.reset();
    }

    /// Clear roots and search state, keeping the current read.
    pub fn reset(&mut self) {
        self.roots.clear();
        self.confs.clear();
        self.df.clear();
        self.pf.clear();
        self.heap.clear();
        self.re.clear();
        self.sink.clear();
    }

    pub fn add_root(&mut self, conf: DescentConfig, off5p: usize, l2r: bool, fw: bool, pri: f32) {
        let qlen = self.q.as_ref().expect("no read installed").len();
        assert!(off5p < qlen, "root offset {} outside read of length {}", off5p, qlen);
        self.roots.push(DescentRoot { off5p, l2r, fw, pri });
        self.confs.push(conf);
    }

    pub fn query(&self) -> &Query {
        self.q.as_ref().expect("no read installed")
    }

    pub fn sink(&self) -> &AlignmentSink {
        &self.sink
    }

    /// Run the search for the installed read over all roots.
    pub fn go(&mut self, sc: &Scoring, index: &PairedFmIndex, met: &mut DescentMetrics) {
        assert!(self.q.is_some(), "no read installed");
        assert!(sc.gapbar >= 1, "gapbar must be at least 1");
        log::debug!(
            "descent search: read len {}, {} roots",
            self.query().len(),
            self.roots.len()
        );
        for rid in 0..self.roots.len() {
            let dfsz = self.df.len();
            let pfsz = self.pf.len();
            let id = self.df.alloc();
            met.allocs += 1;
            let root = self.roots[rid];
            let seed = DescentSeed {
                rid,
                al5pi: root.off5p,
                al5pf: root.off5p,
                topf: 0,
                botf: 0,
                topb: 0,
                botb: 0,
                l2r: root.l2r,
                parent: NONE,
                pen: 0,
                edit: None,
            };
            if !self.init_descent(id, seed, sc, index, met) {
                // Dead root: reclaim its frame in both arenas.
                self.df.truncate(dfsz);
                self.pf.truncate(pfsz);
            }
        }
        while let Some((_pri, id)) = self.heap.pop() {
            self.follow_best_outgoing(id, sc, index, met);
        }
    }

    /// Create a descent in slot `id`: extend by matches, bounce if one read
    /// end was reached, summarize outgoing edges, and enqueue. Returns
    /// false when the slot is dead (no edges and no bounce child) and the
    /// caller should roll the arenas back.
    fn init_descent(
        &mut self,
        id: usize,
        seed: DescentSeed,
        sc: &Scoring,
        index: &PairedFmIndex,
        met: &mut DescentMetrics,
    ) -> bool {
        let gapadd_parent = if seed.parent == NONE { 0 } else { self.df[seed.parent].gapadd };
        let gapadd = gapadd_parent
            + match &seed.edit {
                Some(e) if e.is_read_gap() => 1,
                Some(e) if e.is_ref_gap() => -1,
                _ => 0,
            };
        let mut d = Descent {
            rid: seed.rid,
            al5pi: seed.al5pi,
            al5pf: seed.al5pf,
            l2r: seed.l2r,
            topf: seed.topf,
            botf: seed.botf,
            topb: seed.topb,
            botb: seed.botb,
            pen: seed.pen,
            edit: seed.edit,
            parent: seed.parent,
            gapadd,
            ..Descent::default()
        };
        if seed.parent != NONE {
            let depth = d.al5pf - d.al5pi + 1;
            debug_assert!(
                self.confs[d.rid].cons.max_pen(depth) >= d.pen,
                "penalty {} over budget at depth {}",
                d.pen,
                depth
            );
        }
        let mut fo = FollowOutcome::default();
        let match_succ = self.follow_matches(&mut d, id, index, met, &mut fo);
        self.df[id] = d;
        let mut bounce_succ = false;
        if fo.hit_end && !fo.done {
            bounce_succ = self.bounce(id, fo, sc, index, met);
        }
        if match_succ {
            let mut d = self.df[id].clone();
            self.recalc_outgoing(&mut d, sc);
            let pri = if d.out.is_empty() { None } else { Some(d.out.best_pri()) };
            self.df[id] = d;
            if let Some(pri) = pri {
                self.heap.insert(pri, id);
            }
        }
        !self.df[id].out.is_empty() || bounce_succ
    }

    /// Continue a descent that ran into a read end: a child with no incoming
    /// edit, same penalty, opposite direction.
    fn bounce(
        &mut self,
        parent: usize,
        fo: FollowOutcome,
        sc: &Scoring,
        index: &PairedFmIndex,
        met: &mut DescentMetrics,
    ) -> bool {
        let qlen = self.query().len();
        let p = &self.df[parent];
        debug_assert!(fo.botf > fo.topf);
        debug_assert!(p.al5pi == 0 || p.al5pf == qlen - 1);
        debug_assert!(!(p.al5pi == 0 && p.al5pf == qlen - 1));
        let seed = DescentSeed {
            rid: p.rid,
            al5pi: p.al5pi,
            al5pf: p.al5pf,
            topf: fo.topf,
            botf: fo.botf,
            topb: fo.topb,
            botb: fo.botb,
            l2r: !p.l2r,
            parent,
            pen: p.pen,
            edit: None,
        };
        let dfsz = self.df.len();
        let pfsz = self.pf.len();
        let id = self.df.alloc();
        met.allocs += 1;
        let succ = self.init_descent(id, seed, sc, index, met);
        if !succ {
            self.df.truncate(dfsz);
            self.pf.truncate(pfsz);
        }
        succ
    }

    /// Extend `d` by consuming matching read characters, without branching.
    /// Root descents may first jump `ftab_chars` positions in one lookup.
    /// Returns false when the descent failed outright (empty seed range or
    /// redundant from the start); out-params report end-of-read arrival.
    fn follow_matches(
        &mut self,
        d: &mut Descent,
        id: usize,
        index: &PairedFmIndex,
        met: &mut DescentMetrics,
        fo: &mut FollowOutcome,
    ) -> bool {
        let qlen = self.q.as_ref().expect("no read").len();
        let fw = self.roots[d.rid].fw;
        let (mut topf, mut botf, mut topb, mut botb) = (d.topf, d.botf, d.topb, d.botb);

        // Pick the direction to extend; flip once if the current direction
        // has already reached its read end.
        let mut toward3p;
        let mut off5p;
        loop {
            toward3p = d.l2r == fw;
            debug_assert!(d.al5pf >= d.al5pi);
            debug_assert!(d.al5pi != 0 || d.al5pf != qlen - 1);
            if toward3p {
                if d.al5pf == qlen - 1 {
                    d.l2r = !d.l2r;
                    continue;
                }
                off5p = if d.is_root() && d.al5pi == d.al5pf { d.al5pi } else { d.al5pf + 1 };
            } else {
                if d.al5pi == 0 {
                    d.l2r = !d.l2r;
                    continue;
                }
                off5p = if d.is_root() && d.al5pi == d.al5pf { d.al5pi } else { d.al5pi - 1 };
            }
            break;
        }
        d.off5p_i = off5p;
        let mut off3p = qlen - off5p - 1;
        let mut first_pos = true;
        let mut hit_end = false;
        let mut done = false;

        if d.is_root() {
            debug_assert_eq!(d.al5pi, d.al5pf);
            let ftab_len = index.ftab_chars();
            let ftab_fits =
                if toward3p { off5p + ftab_len <= qlen } else { off5p >= ftab_len };
            if ftab_len > 1 && ftab_len <= NOBRANCH_DEPTH && ftab_fits {
                // Jump ftab_len characters in one lookup against each index.
                let w = if toward3p { off5p } else { off5p + 1 - ftab_len };
                let seq = self.q.as_ref().expect("no read").seq(fw);
                let (tf, bf) = index.fwd().ftab_lo_hi(seq, w, false);
                if bf <= tf {
                    return false;
                }
                let (tb, bb) = index.mir().ftab_lo_hi(seq, w, true);
                met.ftabs += 1;
                debug_assert_eq!(bf - tf, bb - tb);
                topf = tf;
                botf = bf;
                topb = tb;
                botb = bb;
                // The last character consumed in walk order carries the
                // post-jump ranges.
                let c_last = if toward3p { seq[w + ftab_len - 1] } else { seq[w] };
                debug_assert!((c_last as usize) < 4);
                d.len += ftab_len;
                if toward3p {
                    d.al5pf += ftab_len - 1;
                    if d.al5pf == qlen - 1 {
                        hit_end = true;
                        done = d.al5pi == 0;
                    }
                } else {
                    d.al5pi -= ftab_len - 1;
                    if d.al5pi == 0 {
                        hit_end = true;
                        done = d.al5pf == qlen - 1;
                    }
                }
                if !hit_end {
                    if toward3p {
                        off5p += ftab_len;
                        off3p -= ftab_len;
                    } else {
                        off5p -= ftab_len;
                        off3p += ftab_len;
                    }
                }
                // The skipped positions stay uninitialized; only the jump's
                // landing position knows its ranges.
                d.posid = self.pf.alloc();
                for _ in 1..ftab_len {
                    self.pf.alloc();
                }
                met.allocs += ftab_len as u64;
                first_pos = false;
                let last = d.posid + ftab_len - 1;
                let p = &mut self.pf[last];
                p.c = c_last as i8;
                p.topf[c_last as usize] = topf;
                p.botf[c_last as usize] = botf;
                p.topb[c_last as usize] = topb;
                p.botb[c_last as usize] = botb;
            } else {
                // Single-character seed from fchr.
                let rdc = self.q.as_ref().expect("no read").getc(off5p, fw);
                if rdc >= CODE_N {
                    return false; // root on an N
                }
                topf = index.fwd().fchr(rdc as usize);
                botf = index.fwd().fchr(rdc as usize + 1);
                topb = topf;
                botb = botf;
                if botf <= topf {
                    return false;
                }
                d.len += 1;
                // The flip above keeps the far end out of reach, so a
                // single character cannot hit it.
                debug_assert!(if toward3p { off3p > 0 } else { off5p > 0 });
                if toward3p {
                    off5p += 1;
                    off3p -= 1;
                } else {
                    off5p -= 1;
                    off3p += 1;
                }
                d.posid = self.pf.alloc();
                met.allocs += 1;
                first_pos = false;
                let p = &mut self.pf[d.posid];
                p.c = rdc as i8;
                p.topf[rdc as usize] = topf;
                p.botf[rdc as usize] = botf;
                p.topb[rdc as usize] = topb;
                p.botb[rdc as usize] = botb;
            }
            debug_assert!(botf > topf);
            debug_assert_eq!(botf - topf, botb - topb);
            let key = RedundancyKey {
                fw,
                al5pi: d.al5pi,
                al5pf: d.al5pf,
                ref_len: (d.al5pf - d.al5pi + 1) as i64 + d.gapadd,
                topf,
                botf,
            };
            if !self.re.check(key, d.pen) {
                return false;
            }
        }

        if !done && !hit_end {
            let mut fail = false;
            while !fail && !hit_end {
                debug_assert!(!done);
                let rdc = self.q.as_ref().expect("no read").getc(off5p, fw);
                let width = botf - topf;
                debug_assert!(width > 0);
                let (walked, wtop, wbot, ptop, pbot) = if toward3p {
                    (index.mir(), topb, botb, topf, botf)
                } else {
                    (index.fwd(), topf, botf, topb, botb)
                };
                let mut t = [0u64; 4];
                let mut b = [0u64; 4];
                let mut tp = [0u64; 4];
                let mut bp = [0u64; 4];
                if width > 1 {
                    met.bwops += 1;
                    met.bwops_bi += 1;
                    (t, b, tp, bp) = walked.map_bi_lf_ex(wtop, wbot, ptop, pbot);
                    if rdc >= CODE_N || b[rdc as usize] <= t[rdc as usize] {
                        fail = true;
                    }
                    let survives = if rdc < CODE_N { b[rdc as usize] - t[rdc as usize] } else { 0 };
                    if survives < width {
                        met.branches += 1;
                    }
                } else {
                    met.bwops += 1;
                    met.bwops_1 += 1;
                    match walked.map_lf1(wtop) {
                        Some((cc, row)) => {
                            let ci = cc as usize;
                            t[ci] = row;
                            b[ci] = row + 1;
                            tp[ci] = ptop;
                            bp[ci] = pbot;
                            fail = cc != rdc;
                        }
                        None => fail = true,
                    }
                    if fail {
                        met.branches += 1;
                    }
                }
                // Ranges continuing through the read character, if any.
                if rdc < CODE_N {
                    let ci = rdc as usize;
                    if toward3p {
                        topf = tp[ci];
                        botf = bp[ci];
                        topb = t[ci];
                        botb = b[ci];
                    } else {
                        topf = t[ci];
                        botf = b[ci];
                        topb = tp[ci];
                        botb = bp[ci];
                    }
                }
                // Install the position even when the match fails: branches
                // can still leave from here.
                let pid = self.pf.alloc();
                met.allocs += 1;
                if first_pos {
                    d.posid = pid;
                    first_pos = false;
                }
                debug_assert_eq!(pid, d.posid + d.len);
                {
                    let p = &mut self.pf[pid];
                    p.c = rdc as i8;
                    for i in 0..4 {
                        if toward3p {
                            p.topf[i] = tp[i];
                            p.botf[i] = bp[i];
                            p.topb[i] = t[i];
                            p.botb[i] = b[i];
                        } else {
                            p.topf[i] = t[i];
                            p.botf[i] = b[i];
                            p.topb[i] = tp[i];
                            p.botb[i] = bp[i];
                        }
                        debug_assert_eq!(p.botf[i] - p.topf[i], p.botb[i] - p.topb[i]);
                    }
                }
                if !fail {
                    let (mut al5pi, mut al5pf) = (d.al5pi, d.al5pf);
                    if toward3p {
                        al5pf += 1;
                    } else {
                        al5pi -= 1;
                    }
                    let key = RedundancyKey {
                        fw,
                        al5pi,
                        al5pf,
                        ref_len: (al5pf - al5pi + 1) as i64 + d.gapadd,
                        topf,
                        botf,
                    };
                    if !self.re.check(key, d.pen) {
                        fail = true;
                    }
                }
                if !fail {
                    d.len += 1;
                    if toward3p {
                        d.al5pf += 1;
                        if d.al5pf == qlen - 1 {
                            hit_end = true;
                            done = d.al5pi == 0;
                        } else {
                            off5p += 1;
                            off3p -= 1;
                        }
                    } else {
                        debug_assert!(d.al5pi > 0);
                        d.al5pi -= 1;
                        if d.al5pi == 0 {
                            hit_end = true;
                            done = d.al5pf == qlen - 1;
                        } else {
                            off5p -= 1;
                            off3p += 1;
                        }
                    }
                }
            }
        }

        if done {
            self.df[id] = d.clone();
            self.report(topf, botf, topb, botb, id, d.rid, None, d.pen);
            fo.hit_end = true;
            fo.done = true;
        } else if hit_end {
            debug_assert!(botf > topf);
            fo.hit_end = true;
            fo.topf = topf;
            fo.botf = botf;
            fo.topb = topb;
            fo.botb = botb;
        }
        true
    }

    /// Enumerate the legal branches out of every position this descent
    /// owns (plus the trailing failed position, if it stopped short of the
    /// read end) and keep the best few in the summary. Returns the total
    /// number of edges seen.
    fn recalc_outgoing(&mut self, d: &mut Descent, sc: &Scoring) -> usize {
        let qlen = self.q.as_ref().expect("no read").len();
        debug_assert_eq!(d.botf - d.topf, d.botb - d.topb);
        debug_assert!(d.out.is_empty());
        let root = self.roots[d.rid];
        let fw = root.fw;
        let rootpri = root.pri;
        let toward3p = d.l2r == fw;
        let mut off5p = d.off5p_i;
        let mut off3p = qlen - off5p - 1;
        let (mut cur5pi, mut cur5pf) = (d.al5pi, d.al5pf);
        let mut extrai = 0usize;
        let mut extraf = 0usize;
        let mut depth;
        if toward3p {
            cur5pf = off5p;
            depth = off5p - d.al5pi;
            // One more position to visit if we stopped short of the 3' end:
            // edits can still leave from the position that failed to match.
            if d.al5pf < qlen - 1 {
                extraf = 1;
            }
        } else {
            cur5pi = off5p;
            depth = d.al5pf - off5p;
            if d.al5pi > 0 {
                extrai = 1;
            }
        }
        let pen_rdg_ex = sc.read_gap_extend();
        let pen_rfg_ex = sc.ref_gap_extend();
        let pen_rdg_op = sc.read_gap_open();
        let pen_rfg_op = sc.ref_gap_open();
        // Ranges entering the current position, walked-index first.
        let (mut top, mut bot, mut topp, mut botp) = if toward3p {
            (d.topb, d.botb, d.topf, d.botf)
        } else {
            (d.topf, d.botf, d.topb, d.botb)
        };
        let mut nout = 0usize;
        let mut pos = d.posid;
        while off5p >= d.al5pi - extrai && off5p <= d.al5pf + extraf {
            debug_assert!(off5p < qlen);
            let maxpen = self.confs[d.rid].cons.max_pen(depth);
            debug_assert!(maxpen >= d.pen, "penalty {} over budget {} at depth {}", d.pen, maxpen, depth);
            let diff = maxpen - d.pen;
            let p = &self.pf[pos];
            let (t, b) = if toward3p { (&p.topb, &p.botb) } else { (&p.topf, &p.botf) };
            let (c, qq) = self.q.as_ref().expect("no read").get(off5p, fw);
            let ci = c as usize;
            if !p.flags.exhausted() && diff > 0 {
                // Mismatches, including every base when the read has an N.
                let pen_mm = sc.mm(c, qq);
                if pen_mm <= diff {
                    for j in 0..4usize {
                        if j == ci || b[j] <= t[j] || !p.flags.mm_avail(j) {
                            continue;
                        }
                        let key = RedundancyKey {
                            fw,
                            al5pi: cur5pi,
                            al5pf: cur5pf,
                            ref_len: (cur5pf - cur5pi + 1) as i64 + d.gapadd,
                            topf: p.topf[j],
                            botf: p.botf[j],
                        };
                        if self.re.contains(&key, d.pen + pen_mm) {
                            continue;
                        }
                        let width = b[j] - t[j];
                        let edit = Edit::mismatch(off5p as u32, code_to_base(j as u8), code_to_base(c));
                        let pri = DescentPriority::new(d.pen + pen_mm, depth, width, rootpri);
                        d.out.update(DescentEdge { e: edit, off5p, pri, pos });
                        nout += 1;
                    }
                }
                let gaps_allowed = off5p >= sc.gapbar && off3p >= sc.gapbar;
                if gaps_allowed {
                    // If every way forward is a match, a gap here is always
                    // dominated by the same gap one step downstream.
                    let totwidth = (b[0] - t[0]) + (b[1] - t[1]) + (b[2] - t[2]) + (b[3] - t[3]);
                    let cwidth = if ci < 4 { b[ci] - t[ci] } else { 0 };
                    let allmatch = totwidth == cwidth;
                    let mut rdex = false;
                    let mut rfex = false;
                    let (mut cur5pi_i, mut cur5pf_i) = (cur5pi, cur5pf);
                    if toward3p {
                        cur5pf_i -= 1;
                    } else {
                        cur5pi_i += 1;
                    }
                    if off5p == d.off5p_i {
                        if let Some(ed) = d.edit {
                            // At the descent's first position an incoming gap
                            // can be stretched instead of reopened. Gap pos
                            // and pos2 key on the raw l2r flag, not toward3p.
                            if pen_rdg_ex <= diff && ed.is_read_gap() {
                                rdex = true;
                                for j in 0..4usize {
                                    if b[j] <= t[j] || !p.flags.rdg_avail(j) {
                                        continue;
                                    }
                                    let key = RedundancyKey {
                                        fw,
                                        al5pi: cur5pi_i,
                                        al5pf: cur5pf_i,
                                        ref_len: (cur5pf - cur5pi + 1) as i64 + d.gapadd,
                                        topf: p.topf[j],
                                        botf: p.botf[j],
                                    };
                                    if self.re.contains(&key, d.pen + pen_rdg_ex) {
                                        continue;
                                    }
                                    let width = b[j] - t[j];
                                    let off = off5p as u32 + if d.l2r { 0 } else { 1 };
                                    let mut edit = Edit::read_gap(off, code_to_base(j as u8));
                                    edit.pos2 = if d.l2r { ed.pos2 + 1 } else { ed.pos2 - 1 };
                                    let pri = DescentPriority::new(d.pen + pen_rdg_ex, depth, width, rootpri);
                                    d.out.update(DescentEdge { e: edit, off5p, pri, pos });
                                    nout += 1;
                                }
                            }
                            if pen_rfg_ex <= diff && ed.is_ref_gap() {
                                rfex = true;
                                if p.flags.rfg_avail() && bot > top {
                                    let (rtopf, rbotf) = if toward3p { (topp, botp) } else { (top, bot) };
                                    let key = RedundancyKey {
                                        fw,
                                        al5pi: cur5pi,
                                        al5pf: cur5pf,
                                        ref_len: (cur5pf - cur5pi) as i64 + d.gapadd,
                                        topf: rtopf,
                                        botf: rbotf,
                                    };
                                    if !self.re.contains(&key, d.pen + pen_rfg_ex) {
                                        let width = bot - top;
                                        let edit = Edit::ref_gap(off5p as u32, code_to_base(c));
                                        let pri = DescentPriority::new(d.pen + pen_rfg_ex, depth, width, rootpri);
                                        d.out.update(DescentEdge { e: edit, off5p, pri, pos });
                                        nout += 1;
                                    }
                                }
                            }
                        }
                    }
                    if !allmatch && pen_rdg_op <= diff && !rdex {
                        for j in 0..4usize {
                            if b[j] <= t[j] || !p.flags.rdg_avail(j) {
                                continue;
                            }
                            let key = RedundancyKey {
                                fw,
                                al5pi: cur5pi_i,
                                al5pf: cur5pf_i,
                                ref_len: (cur5pf - cur5pi + 1) as i64 + d.gapadd,
                                topf: p.topf[j],
                                botf: p.botf[j],
                            };
                            if self.re.contains(&key, d.pen + pen_rdg_op) {
                                continue;
                            }
                            let width = b[j] - t[j];
                            let off = off5p as u32 + if d.l2r { 0 } else { 1 };
                            let edit = Edit::read_gap(off, code_to_base(j as u8));
                            let pri = DescentPriority::new(d.pen + pen_rdg_op, depth, width, rootpri);
                            d.out.update(DescentEdge { e: edit, off5p, pri, pos });
                            nout += 1;
                        }
                    }
                    if !allmatch && pen_rfg_op <= diff && !rfex && p.flags.rfg_avail() && bot > top {
                        let (rtopf, rbotf) = if toward3p { (topp, botp) } else { (top, bot) };
                        let key = RedundancyKey {
                            fw,
                            al5pi: cur5pi,
                            al5pf: cur5pf,
                            ref_len: (cur5pf - cur5pi) as i64 + d.gapadd,
                            topf: rtopf,
                            botf: rbotf,
                        };
                        if !self.re.contains(&key, d.pen + pen_rfg_op) {
                            let width = bot - top;
                            let edit = Edit::ref_gap(off5p as u32, code_to_base(c));
                            let pri = DescentPriority::new(d.pen + pen_rfg_op, depth, width, rootpri);
                            d.out.update(DescentEdge { e: edit, off5p, pri, pos });
                            nout += 1;
                        }
                    }
                }
            }
            // Step to the next owned position; carry the ranges through the
            // character this one matched. Uninitialized positions (under an
            // ftab jump) carry nothing.
            let (nt, nb, ntp, nbp) = if p.inited() && (p.c as usize) < 4 {
                let k = p.c as usize;
                let (tpp, bpp) = if toward3p { (&p.topf, &p.botf) } else { (&p.topb, &p.botb) };
                (t[k], b[k], tpp[k], bpp[k])
            } else {
                (0, 0, 0, 0)
            };
            pos += 1;
            depth += 1;
            if toward3p {
                if off3p == 0 {
                    break;
                }
                off5p += 1;
                off3p -= 1;
                cur5pf += 1;
            } else {
                if off5p == 0 {
                    break;
                }
                off5p -= 1;
                off3p += 1;
                cur5pi -= 1;
            }
            top = nt;
            bot = nb;
            topp = ntp;
            botp = nbp;
        }
        d.last_recalc = nout <= crate::descent::OUT_SUMMARY;
        d.out.consume_flags(&mut self.pf);
        nout
    }

    /// Follow the best summarized edge of a just-popped descent: spawn the
    /// child (or report, when the edge completes the read), then re-enqueue
    /// this descent if edges remain.
    fn follow_best_outgoing(
        &mut self,
        id: usize,
        sc: &Scoring,
        index: &PairedFmIndex,
        met: &mut DescentMetrics,
    ) {
        let qlen = self.q.as_ref().expect("no read").len();
        debug_assert!(!self.df[id].out.is_empty());
        while !self.df[id].out.is_empty() {
            let best = self.df[id].out.best_pri();
            let e = self.df[id].out.rotate();
            if self.df[id].out.is_empty() && !self.df[id].last_recalc {
                // The summary was a window onto a larger edge set; rebuild
                // it from the position records.
                let mut d = self.df[id].clone();
                self.recalc_outgoing(&mut d, sc);
                let empty = d.out.is_empty();
                self.df[id] = d;
                if empty {
                    // Everything left became redundant in the meantime.
                    break;
                }
            }
            let this = self.df[id].clone();
            let fw = self.roots[this.rid].fw;
            let toward3p = this.l2r == fw;
            let edoff = e.off5p;
            let (mut al5pi_new, mut al5pf_new) = (this.al5pi, this.al5pf);
            let hit_end;
            let done;
            let doff;
            if toward3p {
                al5pf_new = edoff;
                if e.e.is_read_gap() {
                    // No read character consumed; the advancing end stays put.
                    debug_assert!(al5pf_new > 0);
                    al5pf_new -= 1;
                }
                debug_assert!(al5pf_new < qlen);
                hit_end = al5pf_new == qlen - 1;
                done = hit_end && al5pi_new == 0;
                debug_assert!(edoff >= this.off5p_i);
                doff = edoff - this.off5p_i;
            } else {
                al5pi_new = edoff;
                if e.e.is_read_gap() {
                    al5pi_new += 1;
                }
                hit_end = al5pi_new == 0;
                done = hit_end && al5pf_new == qlen - 1;
                debug_assert!(this.off5p_i >= edoff);
                doff = this.off5p_i - edoff;
            }
            debug_assert!(doff <= this.len);
            // No redundancy re-check here: it would suppress legitimate
            // sibling edges. Checks run at enumeration and extension only.
            let l2r_child = if hit_end && !done { !this.l2r } else { this.l2r };
            let (topf, botf, topb, botb);
            if e.e.is_ref_gap() {
                if doff == 0 {
                    // First offset of the descent: the pool has no entry for
                    // the step before it, so the ranges come from the
                    // descent's cached incoming state.
                    topf = this.topf;
                    botf = this.botf;
                    topb = this.topb;
                    botb = this.botb;
                } else {
                    let p = &self.pf[this.posid + doff - 1];
                    debug_assert!(p.inited());
                    let chr = p.c as usize;
                    debug_assert!(chr < 4);
                    topf = p.topf[chr];
                    botf = p.botf[chr];
                    topb = p.topb[chr];
                    botb = p.botb[chr];
                }
            } else {
                // Mismatch or read gap: the branch character's quad at the
                // edit position.
                let p = &self.pf[this.posid + doff];
                debug_assert!(p.inited());
                let chr = base_to_code(e.e.chr) as usize;
                debug_assert!(chr < 4);
                topf = p.topf[chr];
                botf = p.botf[chr];
                topb = p.topb[chr];
                botb = p.botb[chr];
            }
            debug_assert_eq!(botf - topf, botb - topb);
            if done {
                // The edge completes the read; the alignment is reported
                // from this descent with the edge as the extra edit, and
                // this descent retires.
                self.report(topf, botf, topb, botb, id, this.rid, Some(e.e), best.pen);
                return;
            }
            debug_assert!(al5pi_new != 0 || al5pf_new != qlen - 1);
            let dfsz = self.df.len();
            let pfsz = self.pf.len();
            let cid = self.df.alloc();
            met.allocs += 1;
            let seed = DescentSeed {
                rid: this.rid,
                al5pi: al5pi_new,
                al5pf: al5pf_new,
                topf,
                botf,
                topb,
                botb,
                l2r: l2r_child,
                parent: id,
                pen: best.pen,
                edit: Some(e.e),
            };
            if !self.init_descent(cid, seed, sc, index, met) {
                self.df.truncate(dfsz);
                self.pf.truncate(pfsz);
            }
            break;
        }
        if !self.df[id].out.is_empty() {
            let pri = self.df[id].out.best_pri();
            self.heap.insert(pri, id);
        }
    }

    fn report(
        &mut self,
        topf: u64,
        botf: u64,
        topb: u64,
        botb: u64,
        descid: usize,
        rid: usize,
        extra: Option<Edit>,
        pen: i64,
    ) {
        let added =
            self.sink.report_alignment(topf, botf, topb, botb, descid, rid, extra, pen, &self.df);
        if added && log::log_enabled!(log::Level::Debug) {
            let n = self.sink.n_range() - 1;
            let edits: Vec<String> = self.sink.edits(n).iter().map(|e| e.to_string()).collect();
            log::debug!(
                "alignment: pen={} range=[{}, {}) elts={} edits=[{}]",
                pen,
                topf,
                botf,
                botf - topf,
                edits.join(", ")
            );
        }
    }
}
