//! Best-first, penalty-bounded descent search for end-to-end short-read
//! alignment over a paired FM index.
//!
//! Given a read and a set of search roots (offset, direction, strand), the
//! driver enumerates reference occurrences of the read that tolerate a
//! bounded number of mismatches and gaps under an affine penalty model,
//! reporting suffix-array ranges rather than resolved reference loci.
//!
//! The search walks a forward index and a mirror (reversed-text) index in
//! lockstep, so an alignment can grow in either direction and "bounce" off
//! a read end to finish the other side. Branch points are scheduled through
//! a priority heap, pruned by depth-indexed penalty budgets and a
//! redundancy filter over visited suffix-array states.

pub mod align;
pub mod arena;
pub mod constraint;
pub mod descent;
pub mod driver;
pub mod edit;
pub mod fm_index;
pub mod heap;
pub mod index;
pub mod metrics;
pub mod query;
pub mod redundancy;
pub mod scoring;
pub mod sink;

pub use constraint::{DescentConfig, ExtensionPolicy, PenaltyConstraint};
pub use driver::{DescentDriver, DescentRoot};
pub use index::PairedFmIndex;
pub use metrics::DescentMetrics;
pub use query::Query;
pub use scoring::{MmCostModel, Scoring};
