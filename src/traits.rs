use num_traits::{Float, FromPrimitive, ToPrimitive};
use std::fmt::{Debug, Display};

/// Scalar type of the sampled field
pub trait FluxValue: Float + FromPrimitive + ToPrimitive + Debug + Display + 'static {}

impl<T: Float + FromPrimitive + ToPrimitive + Debug + Display + 'static> FluxValue for T {}
