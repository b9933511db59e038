// End-to-end descent searches over tiny references.
//
// The two-copy reference carries the same 45-base segment twice, separated
// by Ns, so an exact read hits one SA range with two elements. The
// single-copy reference truncates the second segment before the read
// region, leaving exactly one occurrence.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use descent_align::align::{code_to_base, encode, revcomp_codes};
use descent_align::edit::Edit;
use descent_align::{
    DescentConfig, DescentDriver, DescentMetrics, MmCostModel, PairedFmIndex, PenaltyConstraint,
    Query, Scoring,
};

const SEGMENT: &[u8] = b"CATGTCAGCTATATAGCGCGCTCGCATCATTTTGTGTGTAAACCA";

//                       GCTATATAGCGCGCTCGCATCATTTTGTGT = SEGMENT[7..37]
const READ: &[u8] = b"GCTATATAGCGCGCTCGCATCATTTTGTGT";

fn two_copy_index() -> PairedFmIndex {
    let text: Vec<u8> = [SEGMENT, &b"NNNNNNNNNN"[..], SEGMENT].concat();
    PairedFmIndex::from_strs(&[&text])
}

fn single_copy_index() -> PairedFmIndex {
    let text: Vec<u8> = [SEGMENT, &b"NNNNNNNNNN"[..], &SEGMENT[..18]].concat();
    PairedFmIndex::from_strs(&[&text])
}

fn quals(len: usize) -> Vec<u8> {
    vec![b'I'; len]
}

struct SearchOutcome {
    n_range: usize,
    n_elt: u64,
    pen: Option<i64>,
    topf: Option<u64>,
    /// Edits of the first recorded alignment, 5' to 3'.
    edits: Vec<Edit>,
    met: DescentMetrics,
}

/// Run one search with the given roots `(off5p, l2r, fw, pri)`.
fn search(
    index: &PairedFmIndex,
    read: &[u8],
    roots: &[(usize, bool, bool, f32)],
    sc: &Scoring,
    cons: &PenaltyConstraint,
) -> SearchOutcome {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut dr = DescentDriver::new();
    dr.init_read(Query::new(read, &quals(read.len())));
    for &(off5p, l2r, fw, pri) in roots {
        dr.add_root(DescentConfig::new(cons.clone()), off5p, l2r, fw, pri);
    }
    let mut met = DescentMetrics::default();
    dr.go(sc, index, &mut met);
    let sink = dr.sink();
    SearchOutcome {
        n_range: sink.n_range(),
        n_elt: sink.n_elt(),
        pen: sink.best_pen(),
        topf: (sink.n_range() > 0).then(|| sink.alignment(0).topf),
        edits: if sink.n_range() > 0 { sink.edits(0).to_vec() } else { Vec::new() },
        met,
    }
}

#[test]
fn exact_read_left_to_right_root() {
    let index = two_copy_index();
    let out = search(
        &index,
        READ,
        &[(0, true, true, 0.0)],
        &Scoring::base(),
        &PenaltyConstraint::linear(0.0, 1.0),
    );
    assert_eq!(out.n_range, 1);
    assert_eq!(out.n_elt, 2);
    assert_eq!(out.pen, Some(0));
}

#[test]
fn exact_read_right_to_left_root() {
    let index = two_copy_index();
    let out = search(
        &index,
        READ,
        &[(READ.len() - 1, false, true, 0.0)],
        &Scoring::base(),
        &PenaltyConstraint::linear(0.0, 1.0),
    );
    assert_eq!(out.n_range, 1);
    assert_eq!(out.n_elt, 2);
    assert_eq!(out.pen, Some(0));
}

#[test]
fn exact_read_of_ftab_length() {
    // Read length equals the ftab depth: the jump alone spans the read.
    let index = two_copy_index();
    let read = &READ[..10];
    for &(off5p, l2r) in &[(0usize, true), (9usize, false)] {
        let out = search(
            &index,
            read,
            &[(off5p, l2r, true, 0.0)],
            &Scoring::base(),
            &PenaltyConstraint::linear(0.0, 1.0),
        );
        assert_eq!(out.n_range, 1, "root {} {}", off5p, l2r);
        assert_eq!(out.n_elt, 2);
        assert_eq!(out.pen, Some(0));
    }
}

#[test]
fn exact_read_shorter_than_ftab() {
    // 9 bases < ftab depth 10: the root must fall back to fchr seeding.
    let index = two_copy_index();
    let read = &READ[..9];
    let out = search(
        &index,
        read,
        &[(0, true, true, 0.0)],
        &Scoring::base(),
        &PenaltyConstraint::linear(0.0, 1.0),
    );
    assert_eq!(out.n_range, 1);
    assert_eq!(out.n_elt, 2);
    assert_eq!(out.pen, Some(0));
    assert_eq!(out.met.ftabs, 0);
}

#[test]
fn root_in_middle_bounces() {
    let index = two_copy_index();
    for &(off5p, l2r) in &[(10usize, true), (READ.len() - 1 - 10, false)] {
        let out = search(
            &index,
            READ,
            &[(off5p, l2r, true, 0.0)],
            &Scoring::base(),
            &PenaltyConstraint::linear(0.0, 1.0),
        );
        assert_eq!(out.n_range, 1, "root {} {}", off5p, l2r);
        assert_eq!(out.n_elt, 2);
        assert_eq!(out.pen, Some(0));
    }
}

#[test]
fn exact_read_every_root() {
    // If the read occurs exactly, any root in either direction must find
    // all occurrences at penalty zero.
    let index = two_copy_index();
    for l2r in [true, false] {
        for j in 0..READ.len() {
            let out = search(
                &index,
                READ,
                &[(j, l2r, true, 0.0)],
                &Scoring::base(),
                &PenaltyConstraint::linear(0.0, 1.0),
            );
            assert_eq!(out.n_range, 1, "root {} l2r {}", j, l2r);
            assert_eq!(out.n_elt, 2, "root {} l2r {}", j, l2r);
            assert_eq!(out.pen, Some(0));
        }
    }
}

#[test]
fn reverse_complement_read() {
    // The reverse complement of the read occurs in the reference; only an
    // fw=false root can see it.
    let index = two_copy_index();
    let rc: Vec<u8> = revcomp_codes(&encode(READ)).iter().map(|&c| code_to_base(c)).collect();
    for &(off5p, l2r) in &[(0usize, true), (rc.len() - 1, false), (12usize, true)] {
        let out = search(
            &index,
            &rc,
            &[(off5p, l2r, false, 0.0)],
            &Scoring::base(),
            &PenaltyConstraint::linear(0.0, 1.0),
        );
        assert_eq!(out.n_range, 1, "root {} l2r {}", off5p, l2r);
        assert_eq!(out.n_elt, 2);
        assert_eq!(out.pen, Some(0));
    }

    // The same roots on the forward read find nothing.
    let out = search(
        &index,
        &rc,
        &[(0, true, true, 0.0)],
        &Scoring::base(),
        &PenaltyConstraint::exact(),
    );
    assert_eq!(out.n_range, 0);
}

#[test]
fn one_mismatch() {
    let index = single_copy_index();
    let k = 15;
    let mut read = READ.to_vec();
    read[k] = code_to_base(encode(&read)[k] ^ 3);
    // Roots whose ftab window avoids k and that sit at least the mismatch
    // penalty's depth away from it.
    let mut last_topf = None;
    for &(off5p, l2r) in &[(0usize, true), (20usize, true), (read.len() - 1, false)] {
        let out = search(
            &index,
            &read,
            &[(off5p, l2r, true, 0.0)],
            &Scoring::base(),
            &PenaltyConstraint::linear(0.0, 1.0),
        );
        assert_eq!(out.n_range, 1, "root {} l2r {}", off5p, l2r);
        assert_eq!(out.n_elt, 1);
        assert_eq!(out.pen, Some(3));
        if let Some(prev) = last_topf {
            assert_eq!(out.topf, Some(prev), "roots disagree on the range");
        }
        last_topf = out.topf;
    }
}

#[test]
fn one_base_read_gap() {
    // Read skips one reference base at read offset 15.
    let index = single_copy_index();
    let read: Vec<u8> = [&READ[..15], &READ[16..]].concat();
    let sc = Scoring::base();
    let out = search(
        &index,
        &read,
        &[(0, true, true, 0.0)],
        &sc,
        &PenaltyConstraint::linear(0.0, 1.5),
    );
    assert_eq!(out.n_range, 1);
    assert_eq!(out.n_elt, 1);
    assert_eq!(out.pen, Some(sc.read_gap_open()));
    // An l2r descent records the gap at the unconsumed character's offset.
    assert_eq!(out.edits.len(), 1);
    assert!(out.edits[0].is_read_gap());
    assert_eq!(out.edits[0].pos, 15);
}

#[test]
fn read_gap_from_reverse_complement_root() {
    // Same alignment as one_base_read_gap, reached from an fw=false root on
    // the reverse-complement read. The root flips to r2l on entry, so the
    // gap edit's offset takes the other branch of the l2r adjustment.
    let index = single_copy_index();
    let gapped: Vec<u8> = [&READ[..15], &READ[16..]].concat();
    let rc: Vec<u8> = revcomp_codes(&encode(&gapped)).iter().map(|&c| code_to_base(c)).collect();
    let sc = Scoring::base();
    let out = search(
        &index,
        &rc,
        &[(0, true, false, 0.0)],
        &sc,
        &PenaltyConstraint::linear(0.0, 1.5),
    );
    assert_eq!(out.n_range, 1);
    assert_eq!(out.n_elt, 1);
    assert_eq!(out.pen, Some(sc.read_gap_open()));
    assert_eq!(out.edits.len(), 1);
    assert!(out.edits[0].is_read_gap());
    assert_eq!(out.edits[0].pos, 16);
}

#[test]
fn three_base_read_gap() {
    // Read skips three reference bases after offset 14. The mismatch
    // penalty is raised so mismatch chains cannot shadow the gap.
    let index = single_copy_index();
    let read: Vec<u8> = [&READ[..14], &READ[17..]].concat();
    let mut sc = Scoring::base();
    sc.mm_cost = MmCostModel::Constant(6);
    let out = search(
        &index,
        &read,
        &[(0, true, true, 0.0)],
        &sc,
        &PenaltyConstraint::linear(0.0, 2.5),
    );
    assert_eq!(out.n_range, 1);
    assert_eq!(out.n_elt, 1);
    assert_eq!(out.pen, Some(sc.read_gap_open() + 2 * sc.read_gap_extend()));
}

#[test]
fn one_base_ref_gap() {
    // Read carries one base the reference lacks, inserted at offset 14.
    let index = single_copy_index();
    let read: Vec<u8> = [&READ[..14], b"A", &READ[14..]].concat();
    let mut sc = Scoring::base();
    sc.mm_cost = MmCostModel::Constant(6);
    let out = search(
        &index,
        &read,
        &[(0, true, true, 0.0)],
        &sc,
        &PenaltyConstraint::linear(0.0, 2.5),
    );
    assert_eq!(out.n_range, 1);
    assert_eq!(out.n_elt, 1);
    assert_eq!(out.pen, Some(sc.ref_gap_open()));
}

#[test]
fn three_base_ref_gap() {
    // Read carries three bases the reference lacks, inserted at offset 14:
    // one gap open plus two extensions.
    let index = single_copy_index();
    let read: Vec<u8> = [&READ[..14], b"ATG", &READ[14..]].concat();
    let mut sc = Scoring::base();
    sc.mm_cost = MmCostModel::Constant(6);
    let out = search(
        &index,
        &read,
        &[(0, true, true, 0.0)],
        &sc,
        &PenaltyConstraint::linear(0.0, 2.5),
    );
    assert_eq!(out.n_range, 1);
    assert_eq!(out.n_elt, 1);
    assert_eq!(out.pen, Some(sc.ref_gap_open() + 2 * sc.ref_gap_extend()));
    let gap_positions: Vec<u32> =
        out.edits.iter().filter(|e| e.is_ref_gap()).map(|e| e.pos).collect();
    assert_eq!(gap_positions, vec![14, 15, 16]);
}

#[test]
fn n_in_read_aligns_as_mismatch() {
    let index = single_copy_index();
    let mut read = READ.to_vec();
    read[12] = b'N';
    let out = search(
        &index,
        &read,
        &[(0, true, true, 0.0)],
        &Scoring::base(),
        &PenaltyConstraint::linear(0.0, 1.0),
    );
    assert_eq!(out.n_range, 1);
    assert_eq!(out.n_elt, 1);
    assert_eq!(out.pen, Some(3));
}

#[test]
fn gap_too_close_to_read_end_is_suppressed() {
    // The only gapless explanation needs a deletion at read offset 2,
    // inside the gap bar; with mismatches priced out of reach there is no
    // legal end-to-end alignment.
    let index = single_copy_index();
    let read: Vec<u8> = [&READ[..2], &READ[3..23]].concat();
    let mut sc = Scoring::base();
    sc.mm_cost = MmCostModel::Constant(6);
    let out = search(
        &index,
        &read,
        &[(10, true, true, 0.0)],
        &sc,
        &PenaltyConstraint::linear(0.0, 0.5),
    );
    assert_eq!(out.n_range, 0);
    assert_eq!(out.n_elt, 0);
}

#[test]
fn many_roots_deduplicate() {
    // Several deterministic roots plus a seeded scatter; equivalent paths
    // may reach the same range but it is recorded once.
    let index = two_copy_index();
    let mut roots: Vec<(usize, bool, bool, f32)> = vec![
        (0, true, true, 0.0),
        (5, true, true, 1.0),
        (READ.len() - 1, false, true, 2.0),
        (15, false, true, 3.0),
    ];
    let mut rng = StdRng::seed_from_u64(77);
    for i in 0..6 {
        roots.push((rng.gen_range(0..READ.len()), rng.gen_bool(0.5), true, 4.0 + i as f32));
    }
    let out = search(
        &index,
        READ,
        &roots,
        &Scoring::base(),
        &PenaltyConstraint::linear(0.0, 1.0),
    );
    assert_eq!(out.n_range, 1);
    assert_eq!(out.n_elt, 2);
    assert_eq!(out.pen, Some(0));
}

#[test]
fn metrics_accumulate() {
    let index = two_copy_index();
    let out = search(
        &index,
        READ,
        &[(0, true, true, 0.0)],
        &Scoring::base(),
        &PenaltyConstraint::linear(0.0, 1.0),
    );
    assert!(out.met.bwops > 0);
    assert_eq!(out.met.bwops, out.met.bwops_bi + out.met.bwops_1);
    assert_eq!(out.met.ftabs, 1);
    assert!(out.met.allocs > 0);
}
