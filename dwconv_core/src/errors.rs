use failure::{Context, Fail};
use ndarray::ShapeError;
use std::fmt::{Display, Formatter, Result};

/// Fail type returned by the shape validator, and so by every convolution entry point.
///
/// All variants are produced before any output or scratch buffer is touched.
#[derive(Debug, Fail)]
pub enum ConvError {
	/// Malformed hyperparameters or tensor ranks.
	#[fail(display = "ConvError::InvalidArgument {}", desc)]
	InvalidArgument { desc: String },

	/// Tensor dimensions which are individually valid but inconsistent with each other.
	#[fail(display = "ConvError::ShapeMismatch {}", desc)]
	ShapeMismatch { desc: String },

	/// The calculated output has a spatial dimension smaller than one.
	#[fail(
		display = "ConvError::SizeError Given input size: ({}). Calculated output size: ({}). Output size is too small",
		input, output
	)]
	SizeError { input: SizeDisplay, output: SizeDisplay },
}

impl ConvError {
	pub fn invalid_argument<I: Into<String>>(desc: I) -> Self {
		ConvError::InvalidArgument { desc: desc.into() }
	}

	pub fn shape_mismatch<I: Into<String>>(desc: I) -> Self {
		ConvError::ShapeMismatch { desc: desc.into() }
	}
}

impl From<ShapeError> for ConvError {
	fn from(err: ShapeError) -> ConvError {
		ConvError::ShapeMismatch {
			desc: format!("could not reinterpret array shape: {}", err),
		}
	}
}

/// Wrapper to display a (channels, height, width) triple as `c x h x w`.
///
/// The height or width may be negative when the padded input is smaller than the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeDisplay {
	pub inner: [isize; 3],
}

impl Display for SizeDisplay {
	fn fmt(&self, f: &mut Formatter) -> Result {
		write!(f, "{} x {} x {}", self.inner[0], self.inner[1], self.inner[2])
	}
}

/// Returned when a dedicated thread pool for an `Executor` cannot be constructed.
#[derive(Debug, Fail)]
#[fail(display = "ExecutorError cause: {}", cause)]
pub struct ExecutorError {
	cause: Context<String>,
}

impl From<String> for ExecutorError {
	fn from(context: String) -> Self {
		Self {
			cause: Context::from(context),
		}
	}
}

impl From<rayon::ThreadPoolBuildError> for ExecutorError {
	fn from(err: rayon::ThreadPoolBuildError) -> Self {
		format!("could not build thread pool: {}", err).into()
	}
}
