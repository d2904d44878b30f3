//! The three passes of a depthwise 2D convolution, implemented as unfold followed by matrix multiplication.

pub mod nn;
mod sgemm;
pub mod unfold;

pub use crate::sgemm::addmm;
