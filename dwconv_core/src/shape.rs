//! Convolution hyperparameters and the shape validator shared by all three passes.
use crate::errors::{ConvError, SizeDisplay};
use smallvec::SmallVec;

/// Kernel size, stride and zero padding of a 2D depthwise convolution.
///
/// Padding is symmetric: `pad_h` rows are added above and below the input, `pad_w` columns to the left and right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConvParams {
	pub kernel_h: usize,
	pub kernel_w: usize,
	pub stride_h: usize,
	pub stride_w: usize,
	pub pad_h: usize,
	pub pad_w: usize,
}

impl ConvParams {
	/// Unit stride, no padding.
	pub fn new(kernel_h: usize, kernel_w: usize) -> Self {
		ConvParams {
			kernel_h,
			kernel_w,
			stride_h: 1,
			stride_w: 1,
			pad_h: 0,
			pad_w: 0,
		}
	}

	pub fn stride(mut self, stride_h: usize, stride_w: usize) -> Self {
		self.stride_h = stride_h;
		self.stride_w = stride_w;
		self
	}

	pub fn padding(mut self, pad_h: usize, pad_w: usize) -> Self {
		self.pad_h = pad_h;
		self.pad_w = pad_w;
		self
	}

	/// Number of rows in an unfolded patch matrix, `kernel_h * kernel_w`.
	pub fn patch_size(&self) -> usize {
		self.kernel_h * self.kernel_w
	}

	/// `floor((input + 2 * pad - kernel) / stride) + 1` for each spatial axis.
	///
	/// The result is not clamped, values less than one indicate a configuration the validator rejects. Returns `None`
	/// if either stride is zero.
	pub fn output_size(&self, input_h: usize, input_w: usize) -> Option<(isize, isize)> {
		Some((
			output_dim(input_h, self.pad_h, self.kernel_h, self.stride_h)?,
			output_dim(input_w, self.pad_w, self.kernel_w, self.stride_w)?,
		))
	}

	fn check(&self) -> Result<(), ConvError> {
		if self.kernel_h == 0 || self.kernel_w == 0 {
			return Err(ConvError::invalid_argument(format!(
				"kernel size should be greater than zero, but got kernel_h: {} kernel_w: {}",
				self.kernel_h, self.kernel_w
			)));
		}
		if self.stride_h == 0 || self.stride_w == 0 {
			return Err(ConvError::invalid_argument(format!(
				"stride should be greater than zero, but got stride_h: {} stride_w: {}",
				self.stride_h, self.stride_w
			)));
		}
		Ok(())
	}
}

fn output_dim(input: usize, pad: usize, kernel: usize, stride: usize) -> Option<isize> {
	let span = input as isize + 2 * pad as isize - kernel as isize;
	Some(span.checked_div_euclid(stride as isize)? + 1)
}

/// Every dimension derived by `check_shapes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvShape {
	/// `None` for an unbatched (rank 3) input.
	pub batch: Option<usize>,
	pub channels: usize,
	/// Output planes per input channel.
	pub planes: usize,
	pub input_h: usize,
	pub input_w: usize,
	pub output_h: usize,
	pub output_w: usize,
	pub patch_size: usize,
}

impl ConvShape {
	pub fn batch_or_one(&self) -> usize {
		self.batch.unwrap_or(1)
	}

	pub fn output_spaxels(&self) -> usize {
		self.output_h * self.output_w
	}

	/// Number of (batch element, channel) frames.
	pub fn frames(&self) -> usize {
		self.batch_or_one() * self.channels
	}

	/// External output shape, with channel and output plane axes combined.
	pub fn output_shape(&self) -> SmallVec<[usize; 5]> {
		self.with_batch(&[self.channels * self.planes, self.output_h, self.output_w])
	}

	/// Output gradient shape with separate channel and output plane axes.
	pub fn split_output_shape(&self) -> SmallVec<[usize; 5]> {
		self.with_batch(&[self.channels, self.planes, self.output_h, self.output_w])
	}

	/// Shape of the unfold buffer, and of the fold scratch buffer.
	pub fn unfold_shape(&self) -> SmallVec<[usize; 5]> {
		self.with_batch(&[self.channels, self.patch_size, self.output_spaxels()])
	}

	pub fn input_shape(&self) -> SmallVec<[usize; 5]> {
		self.with_batch(&[self.channels, self.input_h, self.input_w])
	}

	fn with_batch(&self, rest: &[usize]) -> SmallVec<[usize; 5]> {
		self.batch.iter().chain(rest).cloned().collect()
	}
}

/// Reinterpret a flattened `(planes, channels * kernel_h * kernel_w)` weight shape as rank 4.
///
/// Rank 4 shapes, and shapes of any other rank, are returned unchanged so that `check_shapes` can report them.
pub fn normalize_weight_shape(params: &ConvParams, weight: &[usize]) -> Result<SmallVec<[usize; 4]>, ConvError> {
	let patch_size = params.patch_size();
	if weight.len() != 2 || patch_size == 0 {
		return Ok(weight.iter().cloned().collect());
	}
	if weight[1] % patch_size != 0 {
		return Err(ConvError::invalid_argument(format!(
			"2D weight tensor second dimension ({}) must be a multiple of kernel_h * kernel_w ({})",
			weight[1], patch_size
		)));
	}
	Ok(SmallVec::from_slice(&[
		weight[0],
		weight[1] / patch_size,
		params.kernel_h,
		params.kernel_w,
	]))
}

/// Validates the shapes of one call against each other and the hyperparameters, returning the derived dimensions.
///
/// `weight` must already be rank 4, see `normalize_weight_shape`. `grad_output`, when present, must be in the split
/// form: one axis more than `input`, with separate channel and output plane axes.
///
/// # Errors
/// * `InvalidArgument` for a zero kernel or stride, a weight not of rank 4, a bias not shaped (planes, channels), or an
///   input not of rank 3 or 4.
/// * `SizeError` if either calculated output dimension is less than one.
/// * `ShapeMismatch` if the input channels, weight kernel dimensions or output gradient shape are inconsistent.
pub fn check_shapes(
	params: &ConvParams,
	input: &[usize],
	grad_output: Option<&[usize]>,
	weight: &[usize],
	bias: Option<&[usize]>,
) -> Result<ConvShape, ConvError> {
	params.check()?;

	if weight.len() != 4 {
		return Err(ConvError::invalid_argument(format!(
			"2D or 4D weight tensor expected, but got: {:?}",
			weight
		)));
	}
	let planes = weight[0];
	let channels = weight[1];

	if let Some(bias) = bias {
		if bias != [planes, channels] {
			return Err(ConvError::invalid_argument(format!(
				"bias shape {:?} should be (weight planes, weight channels) {:?}",
				bias,
				[planes, channels]
			)));
		}
	}

	let (batch, dimf) = match input.len() {
		3 => (None, 0),
		4 => (Some(input[0]), 1),
		_ => {
			return Err(ConvError::invalid_argument(format!(
				"3D or 4D input tensor expected but got: {:?}",
				input
			)))
		}
	};
	let input_h = input[dimf + 1];
	let input_w = input[dimf + 2];

	let (output_h, output_w) = params.output_size(input_h, input_w).ok_or_else(|| {
		ConvError::invalid_argument(format!("stride should be greater than zero, but got {:?}", params))
	})?;
	if output_h < 1 || output_w < 1 {
		return Err(ConvError::SizeError {
			input: SizeDisplay {
				inner: [channels as isize, input_h as isize, input_w as isize],
			},
			output: SizeDisplay {
				inner: [(planes * channels) as isize, output_h, output_w],
			},
		});
	}
	let (output_h, output_w) = (output_h as usize, output_w as usize);

	if input[dimf] != channels {
		return Err(ConvError::shape_mismatch(format!(
			"input channels ({}) should equal weight channels ({}), input: {:?} weight: {:?}",
			input[dimf], channels, input, weight
		)));
	}
	if weight[2] != params.kernel_h || weight[3] != params.kernel_w {
		return Err(ConvError::shape_mismatch(format!(
			"weight kernel dimensions {:?} do not match kernel size ({}, {})",
			&weight[2..],
			params.kernel_h,
			params.kernel_w
		)));
	}

	let shape = ConvShape {
		batch,
		channels,
		planes,
		input_h,
		input_w,
		output_h,
		output_w,
		patch_size: params.patch_size(),
	};

	if let Some(grad_output) = grad_output {
		let expected = shape.split_output_shape();
		if grad_output != expected.as_slice() {
			return Err(ConvError::shape_mismatch(format!(
				"output gradient shape {:?} should be {:?} ([batch,] channels, planes, output_h, output_w)",
				grad_output, expected
			)));
		}
	}

	Ok(shape)
}
