use std::fmt::Debug;
use std::iter::Sum;

use num_traits::{Float, FromPrimitive, ToPrimitive};

/// Scalar element type a forest can index.
///
/// Implemented for `f32` and `f64`. `TYPE_NAME` is the runtime identifier
/// reported by [`crate::KdForest::element_type`].
pub trait Element:
    Float + FromPrimitive + ToPrimitive + Sum + Debug + Send + Sync + 'static
{
    const TYPE_NAME: &'static str;
}

impl Element for f32 {
    const TYPE_NAME: &'static str = "f32";
}

impl Element for f64 {
    const TYPE_NAME: &'static str = "f64";
}
