//! Pyramid storage and level bookkeeping shared with policies.

use crate::image::pyramid::ImagePyramid;
use crate::image::ImageView;
use std::sync::Arc;

/// Target pyramid, either built by the engine or supplied by the caller.
///
/// A shared pyramid is never mutated; several aligners may hold it at once.
#[derive(Clone, Debug)]
pub(crate) enum TargetPyramid {
    Owned(ImagePyramid),
    Shared(Arc<ImagePyramid>),
}

impl TargetPyramid {
    fn get(&self) -> &ImagePyramid {
        match self {
            TargetPyramid::Owned(pyramid) => pyramid,
            TargetPyramid::Shared(pyramid) => &**pyramid,
        }
    }
}

/// Engine state visible to alignment policies.
///
/// Holds both pyramids, the active level and the mean error of the last
/// accepted step. The error is `None` until a step has been accepted on the
/// active level; errors from different levels are never compared.
#[derive(Clone, Debug)]
pub struct AlignContext<S> {
    template: ImagePyramid,
    target: TargetPyramid,
    num_levels: usize,
    level: usize,
    pub(crate) last_error: Option<S>,
}

impl<S: Copy> AlignContext<S> {
    pub(crate) fn new(template: ImagePyramid, target: TargetPyramid, num_levels: usize) -> Self {
        debug_assert!(num_levels >= 1);
        debug_assert_eq!(template.num_levels(), num_levels);
        debug_assert_eq!(target.get().num_levels(), num_levels);
        Self {
            template,
            target,
            num_levels,
            level: 0,
            last_error: None,
        }
    }

    /// Returns the number of pyramid levels in use.
    pub fn num_levels(&self) -> usize {
        self.num_levels
    }

    /// Returns the active level (0 = finest).
    pub fn level(&self) -> usize {
        self.level
    }

    /// Activates a level, clamped to the valid range, and forgets the last error.
    pub fn set_level(&mut self, level: usize) -> usize {
        self.level = level.min(self.num_levels - 1);
        self.last_error = None;
        self.level
    }

    /// Mean error of the last accepted step at the active level.
    pub fn last_error(&self) -> Option<S> {
        self.last_error
    }

    /// Template image at the active level.
    pub fn template_image(&self) -> ImageView<'_, f32> {
        self.template[self.level].view()
    }

    /// Target image at the active level.
    pub fn target_image(&self) -> ImageView<'_, f32> {
        self.target.get()[self.level].view()
    }

    /// The full template pyramid.
    pub fn template_pyramid(&self) -> &ImagePyramid {
        &self.template
    }

    /// The target pyramid, limited to the levels in use.
    pub fn target_pyramid(&self) -> &ImagePyramid {
        self.target.get()
    }

    /// Target image at an arbitrary level in use.
    pub fn target_level(&self, level: usize) -> Option<ImageView<'_, f32>> {
        if level >= self.num_levels {
            return None;
        }
        self.target.get().level(level)
    }

    /// Returns `true` when the target pyramid was supplied by the caller.
    pub fn is_target_shared(&self) -> bool {
        matches!(self.target, TargetPyramid::Shared(_))
    }
}
