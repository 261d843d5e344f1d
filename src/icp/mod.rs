//! The ICP scoring model.
//!
//! ICP (Intrinsic Cognitive Points) scores every class and method by
//! counting weighted construct occurrences: branches, boolean
//! conditions, exception handling, and coupling to other types. The
//! language-specific tree walks live in `analysis::languages`; this
//! module owns the shared model, the coupling heuristic, and the
//! configuration-driven weight resolution.

mod coupling;
mod model;
mod weights;

pub use coupling::{Coupling, CouplingResolver};
pub use model::{IcpInstance, IcpType};
pub use weights::{resolve_limit, resolve_weights, ResolvedWeights, UNLIMITED};

use crate::config::InternalCouplingConfig;

/// Read-only inputs shared by a file's ICP scans.
///
/// Built once per analyzed file; the per-class state (the coupling
/// dedup set) lives in the [`CouplingResolver`] each scan creates.
pub struct ScanContext<'a> {
    pub weights: &'a ResolvedWeights,
    pub coupling: &'a InternalCouplingConfig,
}
