//! The coarse-to-fine driver.

use crate::align::context::{AlignContext, TargetPyramid};
use crate::align::{AlignmentPolicy, SingleStepResult};
use crate::image::pyramid::ImagePyramid;
use crate::image::{ImageView, Pixel};
use crate::trace::{trace_debug, trace_event, trace_span};
use crate::util::{AlignError, AlignResult};
use crate::warp::{Parameters, Warp};
use nalgebra::ComplexField;
use std::marker::PhantomData;
use std::sync::Arc;

/// Why iteration on a pyramid level ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LevelStop {
    /// All iterations budgeted for the level were accepted.
    BudgetExhausted,
    /// A step had no valid constraints.
    NoConstraints,
    /// A step did not lower the mean error.
    ErrorIncreased,
    /// A step after the first was shorter than `eps`.
    Converged,
}

impl LevelStop {
    /// Short snake-case label, used in logs and CLI output.
    pub fn as_str(self) -> &'static str {
        match self {
            LevelStop::BudgetExhausted => "budget_exhausted",
            LevelStop::NoConstraints => "no_constraints",
            LevelStop::ErrorIncreased => "error_increased",
            LevelStop::Converged => "converged",
        }
    }
}

/// Summary of the iterations run on one pyramid level.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LevelReport<S> {
    /// Pyramid level (0 = finest).
    pub level: usize,
    /// Steps computed by the policy.
    pub attempted: usize,
    /// Steps applied to the warp.
    pub accepted: usize,
    /// Reason the level ended.
    pub stop: LevelStop,
    /// Mean error after the last accepted step, if any.
    pub error: Option<S>,
}

/// Multi-resolution alignment engine driving an [`AlignmentPolicy`].
///
/// ```ignore
/// let mut aligner = Aligner::new(InverseCompositional::<Affine, 6>::new());
/// aligner.prepare(template, target, &warp, 4)?;
/// aligner.align(&mut warp, 100, 1e-3, None)?;
/// ```
pub struct Aligner<P, W: Warp> {
    policy: P,
    ctx: Option<AlignContext<W::Scalar>>,
    reports: Vec<LevelReport<W::Scalar>>,
    _warp: PhantomData<fn() -> W>,
}

impl<P, W> Aligner<P, W>
where
    P: AlignmentPolicy<W>,
    W: Warp,
{
    /// Creates an unprepared aligner around a policy.
    pub fn new(policy: P) -> Self {
        Self {
            policy,
            ctx: None,
            reports: Vec::new(),
            _warp: PhantomData,
        }
    }

    /// Builds pyramids for both images and runs the policy's preparation.
    ///
    /// The level count is `requested_levels` clamped to `[1, n]`, where `n`
    /// is the smaller of the counts either image supports. Both images must
    /// be single channel. On any error, including one from the policy's
    /// preparation, the previously prepared state stays in place.
    pub fn prepare<T: Pixel, U: Pixel>(
        &mut self,
        template: ImageView<'_, T>,
        target: ImageView<'_, U>,
        initial: &W,
        requested_levels: usize,
    ) -> AlignResult<()> {
        ensure_single_channel("template", template.channels())?;
        ensure_single_channel("target", target.channels())?;

        let max_levels = ImagePyramid::max_levels_for_size(template.width(), template.height())
            .min(ImagePyramid::max_levels_for_size(
                target.width(),
                target.height(),
            ));
        let levels = requested_levels.min(max_levels).max(1);
        let _span = trace_span!("prepare", levels = levels, shared = false).entered();

        let template = ImagePyramid::build(template, levels)?;
        let target = ImagePyramid::build(target, levels)?;
        self.install(template, TargetPyramid::Owned(target), levels, initial)
    }

    /// Like [`prepare`](Self::prepare), but reuses a pre-built target pyramid.
    ///
    /// The pyramid is shared read-only; when it has more levels than needed
    /// only its finest levels are used. It must have at least one
    /// single-channel level.
    pub fn prepare_shared<T: Pixel>(
        &mut self,
        template: ImageView<'_, T>,
        target: Arc<ImagePyramid>,
        initial: &W,
        requested_levels: usize,
    ) -> AlignResult<()> {
        if target.num_levels() == 0 {
            return Err(AlignError::EmptyPyramid);
        }
        ensure_single_channel("template", template.channels())?;
        let finest = target.level(0).ok_or(AlignError::EmptyPyramid)?;
        ensure_single_channel("target", finest.channels())?;

        let max_levels = ImagePyramid::max_levels_for_size(template.width(), template.height())
            .min(target.num_levels());
        let levels = requested_levels.min(max_levels).max(1);
        let _span = trace_span!("prepare", levels = levels, shared = true).entered();

        let template = ImagePyramid::build(template, levels)?;
        let target = if target.num_levels() > levels {
            Arc::new(target.slice(0, levels)?)
        } else {
            target
        };
        self.install(template, TargetPyramid::Shared(target), levels, initial)
    }

    fn install(
        &mut self,
        template: ImagePyramid,
        target: TargetPyramid,
        levels: usize,
        initial: &W,
    ) -> AlignResult<()> {
        let mut ctx = AlignContext::new(template, target, levels);
        ctx.set_level(0);
        self.policy.prepare(&ctx, initial)?;
        self.reports.clear();
        self.ctx = Some(ctx);
        trace_event!("prepared", levels = levels);
        Ok(())
    }

    /// Refines `warp` coarse to fine.
    ///
    /// `warp` is given and returned in level-0 coordinates. Each level gets
    /// `max_iterations / num_levels` iterations; a level ends early on the
    /// first rejected step. A step is accepted when it has constraints, does
    /// not raise the mean error, and is either the level's first step or at
    /// least `eps` long. When `steps` is given, every accepted warp is
    /// appended to it in level-0 coordinates.
    pub fn align(
        &mut self,
        warp: &mut W,
        max_iterations: usize,
        eps: W::Scalar,
        mut steps: Option<&mut Vec<W>>,
    ) -> AlignResult<()> {
        let ctx = self.ctx.as_mut().ok_or(AlignError::NotPrepared)?;
        let num_levels = ctx.num_levels();
        let iterations_per_level = max_iterations / num_levels;
        let _span = trace_span!(
            "align",
            levels = num_levels,
            iterations_per_level = iterations_per_level
        )
        .entered();

        self.reports.clear();
        let mut ws = warp.scaled(-(num_levels as i32));

        for level in (0..num_levels).rev() {
            ctx.set_level(level);
            ws = ws.scaled(1);

            let mut report = LevelReport {
                level,
                attempted: 0,
                accepted: 0,
                stop: LevelStop::BudgetExhausted,
                error: None,
            };

            for iter in 0..iterations_per_level {
                let step = self.policy.step(ctx, &ws);
                report.attempted += 1;

                match judge_step(ctx.last_error(), &step, iter, eps) {
                    Ok(new_error) => {
                        self.policy.apply_step(ctx, &mut ws, &step);
                        ctx.last_error = Some(new_error);
                        report.accepted += 1;
                        if let Some(trace) = steps.as_deref_mut() {
                            trace.push(ws.scaled(level as i32));
                        }
                    }
                    Err(stop) => {
                        trace_debug!(
                            "step_rejected",
                            level = level,
                            iter = iter,
                            reason = stop.as_str()
                        );
                        report.stop = stop;
                        break;
                    }
                }
            }

            report.error = ctx.last_error();
            trace_event!(
                "level_done",
                level = level,
                attempted = report.attempted,
                accepted = report.accepted,
                stop = report.stop.as_str(),
                error = scalar_to_f64(report.error)
            );
            self.reports.push(report);
        }

        *warp = ws;
        Ok(())
    }

    /// Number of levels in use, 0 before `prepare`.
    pub fn num_levels(&self) -> usize {
        self.ctx.as_ref().map_or(0, AlignContext::num_levels)
    }

    /// Active pyramid level.
    pub fn level(&self) -> usize {
        self.ctx.as_ref().map_or(0, AlignContext::level)
    }

    /// Activates a level (clamped) and resets the last error.
    pub fn set_level(&mut self, level: usize) -> &mut Self {
        if let Some(ctx) = self.ctx.as_mut() {
            ctx.set_level(level);
        }
        self
    }

    /// Mean error of the last accepted step on the active level.
    ///
    /// After `align` this is the error at level 0, or `None` if no step was
    /// accepted there.
    pub fn last_error(&self) -> Option<W::Scalar> {
        self.ctx.as_ref().and_then(AlignContext::last_error)
    }

    /// Per-level summaries of the last `align` call, coarsest first.
    pub fn level_reports(&self) -> &[LevelReport<W::Scalar>] {
        &self.reports
    }

    /// Engine state, available after a successful `prepare`.
    pub fn context(&self) -> Option<&AlignContext<W::Scalar>> {
        self.ctx.as_ref()
    }

    /// Template image at the active level.
    pub fn template_image(&self) -> Option<ImageView<'_, f32>> {
        self.ctx.as_ref().map(AlignContext::template_image)
    }

    /// Target image at the active level.
    pub fn target_image(&self) -> Option<ImageView<'_, f32>> {
        self.ctx.as_ref().map(AlignContext::target_image)
    }

    /// Returns the policy.
    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Returns the policy mutably.
    pub fn policy_mut(&mut self) -> &mut P {
        &mut self.policy
    }

    /// Consumes the aligner and returns its policy.
    pub fn into_policy(self) -> P {
        self.policy
    }
}

fn ensure_single_channel(which: &'static str, channels: usize) -> AlignResult<()> {
    if channels == 1 {
        Ok(())
    } else {
        Err(AlignError::NotSingleChannel { which, channels })
    }
}

/// Applies the acceptance rule, returning the new mean error or the reason to stop.
fn judge_step<W: Warp>(
    last_error: Option<W::Scalar>,
    step: &SingleStepResult<W>,
    iter: usize,
    eps: W::Scalar,
) -> Result<W::Scalar, LevelStop> {
    if step.num_constraints == 0 {
        return Err(LevelStop::NoConstraints);
    }
    let count: W::Scalar = nalgebra::convert(step.num_constraints as f64);
    let new_error = step.sum_errors / count;

    let improving = match last_error {
        None => new_error.is_finite(),
        Some(prev) => prev - new_error >= nalgebra::zero(),
    };
    if !improving {
        return Err(LevelStop::ErrorIncreased);
    }

    // The first step of a level always refines the coarser estimate.
    let long_enough = iter == 0 || step.delta.magnitude() >= eps;
    if !long_enough {
        return Err(LevelStop::Converged);
    }
    Ok(new_error)
}

fn scalar_to_f64<S: nalgebra::RealField + Copy>(value: Option<S>) -> f64 {
    value
        .and_then(nalgebra::try_convert::<S, f64>)
        .unwrap_or(f64::NAN)
}
