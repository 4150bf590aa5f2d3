//! Finishing transforms applied to merged distances.
//!
//! A transform must be monotonic non-decreasing so the slot order produced
//! by the merge survives it. Empty slots (label `-1`) keep their sentinel.

use crate::INVALID_LABEL;
use ndarray::{ArrayView2, ArrayViewMut2, Zip};

pub trait DistanceTransform: Send + Sync {
    fn apply(&self, distance: f32) -> f32;

    /// Lets callers skip the pass entirely.
    fn is_identity(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl DistanceTransform for Identity {
    #[inline]
    fn apply(&self, distance: f32) -> f32 {
        distance
    }

    fn is_identity(&self) -> bool {
        true
    }
}

/// Squared L2 to true L2. Rounding can leave tiny negative squares; those clamp to zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sqrt;

impl DistanceTransform for Sqrt {
    #[inline]
    fn apply(&self, distance: f32) -> f32 {
        distance.max(0.0).sqrt()
    }
}

/// Adapts a closure. The caller vouches for monotonicity.
#[derive(Debug, Clone, Copy)]
pub struct FnTransform<F>(pub F);

impl<F> DistanceTransform for FnTransform<F>
where
    F: Fn(f32) -> f32 + Send + Sync,
{
    #[inline]
    fn apply(&self, distance: f32) -> f32 {
        (self.0)(distance)
    }
}

/// Applies `transform` in parallel to every filled slot of `distances`.
///
/// # Panics
/// If `distances` and `labels` differ in shape.
pub fn finish(
    transform: &dyn DistanceTransform,
    distances: ArrayViewMut2<'_, f32>,
    labels: ArrayView2<'_, i64>,
) {
    assert_eq!(
        distances.dim(),
        labels.dim(),
        "distance and label matrices must have the same shape"
    );
    if transform.is_identity() {
        return;
    }
    Zip::from(distances).and(labels).par_for_each(|d, &label| {
        if label != INVALID_LABEL {
            *d = transform.apply(*d);
        }
    });
}
