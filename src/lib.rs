//! Depthwise 2D convolution over `ndarray` tensors.
//!
//! ```no_run
//! use dwconv::{ArrayD, DepthwiseConv2d, IxDyn};
//!
//! let input = ArrayD::<f32>::zeros(IxDyn(&[8, 16, 32, 32]));
//! let weight = ArrayD::<f32>::zeros(IxDyn(&[2, 16, 3, 3]));
//! let mut output = ArrayD::zeros(IxDyn(&[0]));
//! let mut finput = ArrayD::zeros(IxDyn(&[0]));
//!
//! DepthwiseConv2d::new(3, 3)
//! 	.padding(1, 1)
//! 	.forward(input.view(), weight.view(), None, &mut output, &mut finput)
//! 	.unwrap();
//! assert_eq!(output.shape(), &[8, 32, 32, 32]);
//! ```
pub use dwconv_core as core;
pub use dwconv_ops as ops;

pub use dwconv_core::{
	errors::ConvError,
	exec::Executor,
	shape::{ConvParams, ConvShape},
};
pub use dwconv_ops::nn::depthwise_conv::DepthwiseConv2d;
pub use ndarray::{ArrayD, IxDyn};
