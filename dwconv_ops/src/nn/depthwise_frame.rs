//! Per frame kernels, where a frame is one channel of one batch element.
//!
//! Each kernel sees only its own slices: the channel's input plane, the channel's filter bank of
//! `(planes, kernel_h * kernel_w)`, the channel's `planes` output planes flattened to `(planes, output_h * output_w)`
//! and the channel's `(kernel_h * kernel_w, output_h * output_w)` unfold buffer.
use crate::{
	sgemm::addmm,
	unfold::{unfolded_acc, unfolded_copy},
};
use dwconv_core::shape::ConvParams;
use ndarray::{ArrayView1, ArrayView2, ArrayViewMut1, ArrayViewMut2};

/// Unfolds `input` into `finput`, then sets `output = bias + weight · finput`.
pub fn forward_frame(
	input: &ArrayView2<f32>,
	weight: &ArrayView2<f32>,
	bias: Option<ArrayView1<f32>>,
	output: &mut ArrayViewMut2<f32>,
	finput: &mut ArrayViewMut2<f32>,
	params: &ConvParams,
) {
	unfolded_copy(finput, input, params);

	match bias {
		Some(bias) => {
			debug_assert_eq!(bias.len(), output.nrows());
			for (mut plane, &b) in output.outer_iter_mut().zip(bias) {
				plane.fill(b);
			}
		}
		None => output.fill(0.0),
	}

	addmm(1.0, output, 1.0, weight, &finput.view());
}

/// Sets `fgrad_input = weight_t · grad_output`, then folds it into a zeroed `grad_input`.
///
/// `weight_t` is the transposed filter bank, `(kernel_h * kernel_w, planes)`.
pub fn backward_input_frame(
	grad_output: &ArrayView2<f32>,
	weight_t: &ArrayView2<f32>,
	grad_input: &mut ArrayViewMut2<f32>,
	fgrad_input: &mut ArrayViewMut2<f32>,
	params: &ConvParams,
) {
	addmm(0.0, fgrad_input, 1.0, weight_t, grad_output);

	grad_input.fill(0.0);
	unfolded_acc(&fgrad_input.view(), grad_input, params);
}

/// Accumulates `scale · grad_output · finputᵀ` into `grad_weight`, and the scaled spatial sum of each output plane's
/// gradient into `grad_bias`.
pub fn backward_params_frame(
	grad_output: &ArrayView2<f32>,
	finput: &ArrayView2<f32>,
	grad_weight: &mut ArrayViewMut2<f32>,
	grad_bias: Option<ArrayViewMut1<f32>>,
	scale: f32,
) {
	addmm(1.0, grad_weight, scale, grad_output, &finput.t());

	if let Some(mut grad_bias) = grad_bias {
		debug_assert_eq!(grad_bias.len(), grad_output.nrows());
		for (b, plane) in grad_bias.iter_mut().zip(grad_output.outer_iter()) {
			*b += scale * plane.sum();
		}
	}
}
