use crate::nn::depthwise_frame::{backward_input_frame, backward_params_frame, forward_frame};
use dwconv_core::{
	errors::ConvError,
	exec::Executor,
	shape::{check_shapes, normalize_weight_shape, ConvParams, ConvShape},
	tensor::{assign_from_channel_major, channel_major, reshape_standard, resize},
};
use log::{debug, trace};
use ndarray::{Array2, Array3, ArrayD, ArrayView2, ArrayViewD, ArrayViewMut2, ArrayViewMutD, Axis, Zip};
use smallvec::SmallVec;

/// Depthwise 2D convolution (actually cross-correlation), computed by unfolding each input plane into a patch matrix
/// and multiplying by that channel's filter bank.
///
/// Every input channel is convolved independently with its own bank of `planes` filters:
///
/// * input: `[batch,] channels, input_h, input_w`
/// * weight: `planes, channels, kernel_h, kernel_w`, or flattened as `planes, channels * kernel_h * kernel_w`
/// * bias: `planes, channels`
/// * output: `[batch,] channels * planes, output_h, output_w`
///
/// The output channel axis is channel-major: output channel `c * planes + p` is filter `p` of input channel `c`.
///
/// Each pass is one synchronous call. The unfold buffer (`finput`) written by `forward` is required, unchanged, by a
/// later `backward_params` on the same input.
#[must_use]
#[derive(Clone, Debug)]
pub struct DepthwiseConv2d {
	params: ConvParams,
	executor: Executor,
}

impl DepthwiseConv2d {
	/// Unit stride, no padding, default executor.
	pub fn new(kernel_h: usize, kernel_w: usize) -> Self {
		Self::from_params(ConvParams::new(kernel_h, kernel_w))
	}

	pub fn from_params(params: ConvParams) -> Self {
		DepthwiseConv2d {
			params,
			executor: Executor::default(),
		}
	}

	/// Default: `(1, 1)`
	pub fn stride(mut self, stride_h: usize, stride_w: usize) -> Self {
		self.params = self.params.stride(stride_h, stride_w);
		self
	}

	/// Zero padding added to both sides of each spatial axis.
	///
	/// Default: `(0, 0)`
	pub fn padding(mut self, pad_h: usize, pad_w: usize) -> Self {
		self.params = self.params.padding(pad_h, pad_w);
		self
	}

	/// Sets the pool used for the parallel loop over (batch, channel) frames.
	///
	/// Default: `Executor::default()`, the calling context's rayon pool.
	pub fn executor(mut self, executor: Executor) -> Self {
		self.executor = executor;
		self
	}

	pub fn params(&self) -> &ConvParams {
		&self.params
	}

	/// Validates a set of shapes without touching any data.
	///
	/// `weight` may be rank 4 or flattened rank 2. `grad_output` may be flattened (same rank as `input`) or split (one
	/// more axis, separate channel and plane axes).
	pub fn check_shapes(
		&self,
		input: &[usize],
		grad_output: Option<&[usize]>,
		weight: &[usize],
		bias: Option<&[usize]>,
	) -> Result<ConvShape, ConvError> {
		let weight = normalize_weight_shape(&self.params, weight)?;
		let grad_output = grad_output.map(|grad_output| split_grad_output_shape(input.len(), grad_output, &weight));
		check_shapes(&self.params, input, grad_output.as_deref(), &weight, bias)
	}

	/// The shape `forward` will resize `output` to.
	pub fn output_shape(&self, input: &[usize], weight: &[usize]) -> Result<SmallVec<[usize; 5]>, ConvError> {
		Ok(self.check_shapes(input, None, weight, None)?.output_shape())
	}

	/// Computes the convolution of `input` into `output`.
	///
	/// `output` and `finput` are resized as required, reusing their allocations where the element count already
	/// matches. `finput` receives the unfolded patch matrix of every frame, `[batch,] channels, kernel_h * kernel_w,
	/// output_h * output_w`.
	///
	/// # Errors
	/// Returns an error, before writing to any buffer, if the shapes are inconsistent. See `check_shapes`.
	pub fn forward(
		&self,
		input: ArrayViewD<f32>,
		weight: ArrayViewD<f32>,
		bias: Option<ArrayView2<f32>>,
		output: &mut ArrayD<f32>,
		finput: &mut ArrayD<f32>,
	) -> Result<(), ConvError> {
		let shape = self.check_shapes(input.shape(), None, weight.shape(), bias.as_ref().map(|b| b.shape()))?;
		debug!(
			"DepthwiseConv2d forward: input {:?} weight {:?} bias {} -> output {:?}, {:?}",
			input.shape(),
			weight.shape(),
			bias.is_some(),
			shape.output_shape(),
			self.params
		);

		let weight = channel_major_weight(weight, &shape)?;
		let bias: Option<Array2<f32>> = bias.map(channel_major);
		let input = reshape_standard(input, (shape.frames(), shape.input_h, shape.input_w))?;

		resize(output, &shape.output_shape());
		resize(finput, &shape.unfold_shape());
		let mut output = output
			.view_mut()
			.into_shape((shape.frames(), shape.planes, shape.output_spaxels()))?;
		let mut finput = finput
			.view_mut()
			.into_shape((shape.frames(), shape.patch_size, shape.output_spaxels()))?;

		let params = &self.params;
		let channels = shape.channels;
		self.executor.install(|| {
			trace!("DepthwiseConv2d forward: {} frames", shape.frames());
			Zip::indexed(output.outer_iter_mut())
				.and(finput.outer_iter_mut())
				.par_for_each(|n, mut output, mut finput| {
					let i = n % channels;
					forward_frame(
						&input.index_axis(Axis(0), n),
						&weight.index_axis(Axis(0), i),
						bias.as_ref().map(|bias| bias.row(i)),
						&mut output,
						&mut finput,
						params,
					);
				});
		});

		Ok(())
	}

	/// Computes the gradient with respect to the input, overwriting `grad_input`.
	///
	/// `grad_input` is resized to the shape of `input`, `fgrad_input` to the shape of the unfold buffer, and is used
	/// as scratch space. `input` is only read for its shape.
	///
	/// # Errors
	/// Returns an error, before writing to any buffer, if the shapes are inconsistent. See `check_shapes`.
	pub fn backward_input(
		&self,
		input: ArrayViewD<f32>,
		grad_output: ArrayViewD<f32>,
		weight: ArrayViewD<f32>,
		grad_input: &mut ArrayD<f32>,
		fgrad_input: &mut ArrayD<f32>,
	) -> Result<(), ConvError> {
		let shape = self.check_shapes(input.shape(), Some(grad_output.shape()), weight.shape(), None)?;
		debug!(
			"DepthwiseConv2d backward_input: grad_output {:?} weight {:?} -> grad_input {:?}, {:?}",
			grad_output.shape(),
			weight.shape(),
			input.shape(),
			self.params
		);

		let weight = channel_major_weight(weight, &shape)?;
		let grad_output = reshape_standard(grad_output, (shape.frames(), shape.planes, shape.output_spaxels()))?;

		resize(grad_input, &shape.input_shape());
		resize(fgrad_input, &shape.unfold_shape());
		fgrad_input.fill(0.0);
		let mut grad_input = grad_input
			.view_mut()
			.into_shape((shape.frames(), shape.input_h, shape.input_w))?;
		let mut fgrad_input = fgrad_input
			.view_mut()
			.into_shape((shape.frames(), shape.patch_size, shape.output_spaxels()))?;

		let params = &self.params;
		let channels = shape.channels;
		self.executor.install(|| {
			trace!("DepthwiseConv2d backward_input: {} frames", shape.frames());
			Zip::indexed(grad_input.outer_iter_mut())
				.and(fgrad_input.outer_iter_mut())
				.par_for_each(|n, mut grad_input, mut fgrad_input| {
					let weight_t = weight.index_axis(Axis(0), n % channels).reversed_axes();
					backward_input_frame(
						&grad_output.index_axis(Axis(0), n),
						&weight_t,
						&mut grad_input,
						&mut fgrad_input,
						params,
					);
				});
		});

		Ok(())
	}

	/// Accumulates `scale` times the gradient with respect to the weight into `grad_weight`, and with respect to the
	/// bias into `grad_bias` if given.
	///
	/// `finput` must be the unfold buffer produced by `forward` on the same `input`, it is not recomputed. The
	/// accumulation happens in a private channel-major copy which is written back at the end, the layouts of
	/// `grad_weight` and `grad_bias` are never changed.
	///
	/// # Errors
	/// Returns an error, before writing to any buffer, if the shapes are inconsistent (see `check_shapes`), or if
	/// `finput` does not have the shape `forward` would have produced.
	pub fn backward_params(
		&self,
		input: ArrayViewD<f32>,
		grad_output: ArrayViewD<f32>,
		mut grad_weight: ArrayViewMutD<f32>,
		grad_bias: Option<ArrayViewMut2<f32>>,
		finput: ArrayViewD<f32>,
		scale: f32,
	) -> Result<(), ConvError> {
		let shape = self.check_shapes(
			input.shape(),
			Some(grad_output.shape()),
			grad_weight.shape(),
			grad_bias.as_ref().map(|b| b.shape()),
		)?;
		if finput.shape() != shape.unfold_shape().as_slice() {
			return Err(ConvError::shape_mismatch(format!(
				"unfold buffer shape {:?} should be {:?}, as produced by forward on the same input",
				finput.shape(),
				shape.unfold_shape()
			)));
		}
		debug!(
			"DepthwiseConv2d backward_params: grad_output {:?} -> grad_weight {:?} grad_bias {}, scale {}, {:?}",
			grad_output.shape(),
			grad_weight.shape(),
			grad_bias.is_some(),
			scale,
			self.params
		);

		let grad_output = reshape_standard(grad_output, (shape.frames(), shape.planes, shape.output_spaxels()))?;
		let finput = reshape_standard(finput, (shape.frames(), shape.patch_size, shape.output_spaxels()))?;

		let mut grad_weight_cm = channel_major_weight(grad_weight.view(), &shape)?;
		// zero width rows when there is no bias gradient
		let mut grad_bias_cm = match grad_bias {
			Some(ref grad_bias) => channel_major(grad_bias.view()),
			None => Array2::zeros((shape.channels, 0)),
		};
		let has_bias = grad_bias.is_some();

		// one task per channel, batch elements accumulated in ascending order
		let channels = shape.channels;
		let batch = shape.batch_or_one();
		self.executor.install(|| {
			trace!("DepthwiseConv2d backward_params: {} channels x {} batch", channels, batch);
			Zip::indexed(grad_weight_cm.outer_iter_mut())
				.and(grad_bias_cm.outer_iter_mut())
				.par_for_each(|i, mut grad_weight, mut grad_bias| {
					for t in 0..batch {
						let n = t * channels + i;
						backward_params_frame(
							&grad_output.index_axis(Axis(0), n),
							&finput.index_axis(Axis(0), n),
							&mut grad_weight,
							if has_bias { Some(grad_bias.view_mut()) } else { None },
							scale,
						);
					}
				});
		});

		let restored = channel_major(grad_weight_cm.view()).into_shape(grad_weight.shape())?;
		grad_weight.assign(&restored);
		if let Some(mut grad_bias) = grad_bias {
			assign_from_channel_major(&mut grad_bias, grad_bias_cm.view());
		}

		Ok(())
	}
}

/// Reinterprets a flattened output gradient shape, `[batch,] channels * planes, h, w`, as
/// `[batch,] channels, planes, h, w`.
///
/// Shapes which are not a valid flattened form are returned unchanged for `check_shapes` to reject.
fn split_grad_output_shape(input_ndim: usize, grad_output: &[usize], weight: &[usize]) -> SmallVec<[usize; 5]> {
	if grad_output.len() == input_ndim && input_ndim >= 3 && weight.len() == 4 {
		let dimf = input_ndim - 3;
		let (planes, channels) = (weight[0], weight[1]);
		if grad_output[dimf] == channels * planes {
			return grad_output[..dimf]
				.iter()
				.chain(&[channels, planes])
				.chain(&grad_output[dimf + 1..])
				.cloned()
				.collect();
		}
	}
	grad_output.iter().cloned().collect()
}

/// `(channels, planes, kernel_h * kernel_w)` contiguous copy of a validated rank 4 or rank 2 weight.
fn channel_major_weight(weight: ArrayViewD<f32>, shape: &ConvShape) -> Result<Array3<f32>, ConvError> {
	let weight = reshape_standard(weight, (shape.planes, shape.channels, shape.patch_size))?;
	Ok(channel_major(weight.view()))
}
