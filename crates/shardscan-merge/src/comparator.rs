use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Direction of a top-k selection.
///
/// `order(a, b) == Less` means `a` is emitted before `b`. Implementations
/// must be total (NaN included) so merges are reproducible.
pub trait Comparator: Send + Sync + 'static {
    fn order(a: f32, b: f32) -> Ordering;

    /// Distance written to slots that have no candidate.
    fn neutral() -> f32;
}

/// Smallest distance first. Sentinel `f32::MAX`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmallestFirst;

impl Comparator for SmallestFirst {
    #[inline(always)]
    fn order(a: f32, b: f32) -> Ordering {
        a.total_cmp(&b)
    }

    #[inline(always)]
    fn neutral() -> f32 {
        f32::MAX
    }
}

/// Largest score first. Sentinel `f32::MIN`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LargestFirst;

impl Comparator for LargestFirst {
    #[inline(always)]
    fn order(a: f32, b: f32) -> Ordering {
        b.total_cmp(&a)
    }

    #[inline(always)]
    fn neutral() -> f32 {
        f32::MIN
    }
}

/// Runtime form of the comparator, for callers that pick it from config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeOrder {
    #[default]
    Smallest,
    Largest,
}

impl MergeOrder {
    pub fn neutral(self) -> f32 {
        match self {
            Self::Smallest => SmallestFirst::neutral(),
            Self::Largest => LargestFirst::neutral(),
        }
    }
}
