//! Coarse-to-fine alignment engine.
//!
//! The engine owns the template and target pyramids, walks the levels from
//! coarsest to finest and asks an [`AlignmentPolicy`] for one refinement step
//! per iteration. Accepting or rejecting a step, moving between levels and
//! rescaling the warp are handled here; computing and applying a step is up
//! to the policy.

mod config;
mod context;
mod engine;

pub use config::{align_images, AlignConfig, Alignment};
pub use context::AlignContext;
pub use engine::{Aligner, LevelReport, LevelStop};

use crate::util::AlignResult;
use crate::warp::Warp;

/// Outcome of one refinement step at the active pyramid level.
#[derive(Clone)]
pub struct SingleStepResult<W: Warp> {
    /// Proposed parameter update.
    pub delta: W::Params,
    /// Sum of per-constraint errors for the warp the step was computed at.
    pub sum_errors: W::Scalar,
    /// Number of constraints (pixels) that contributed.
    pub num_constraints: usize,
}

/// Algorithm-specific part of an alignment: how to compute and apply a step.
///
/// The engine calls [`prepare`](AlignmentPolicy::prepare) once after the
/// pyramids are built, then alternates [`step`](AlignmentPolicy::step) and,
/// for accepted steps, [`apply_step`](AlignmentPolicy::apply_step). Images
/// at the active level are available through the context.
pub trait AlignmentPolicy<W: Warp> {
    /// One-time setup after `prepare` built the pyramids.
    fn prepare(&mut self, ctx: &AlignContext<W::Scalar>, initial: &W) -> AlignResult<()>;

    /// Computes one step for `warp`, expressed at the active level.
    fn step(&mut self, ctx: &AlignContext<W::Scalar>, warp: &W) -> SingleStepResult<W>;

    /// Updates `warp` with an accepted step.
    fn apply_step(
        &mut self,
        ctx: &AlignContext<W::Scalar>,
        warp: &mut W,
        step: &SingleStepResult<W>,
    );
}
