//! Patch extraction ("unfold", im2col) and its adjoint ("fold") for a single channel plane.
//!
//! The unfolded matrix has one row per kernel position, `kh * kernel_w + kw`, and one column per output position,
//! `y * output_w + x`. Entry (k, y * output_w + x) holds the input at `(y * stride_h + kh - pad_h, x * stride_w + kw -
//! pad_w)`, or zero if that position lies in the padding.
use dwconv_core::shape::ConvParams;
use ndarray::{s, ArrayView2, ArrayViewMut2};
use std::cmp::{max, min};

/// Returns the range `[start, end)` of output positions along one axis for which the kernel tap at `offset` reads
/// from the input, rather than from the zero padding.
fn valid_range(offset: usize, pad: usize, stride: usize, input: usize, output: usize) -> (usize, usize) {
	let start = if offset >= pad {
		0
	} else {
		(pad - offset + stride - 1) / stride
	};
	let end = if pad + input <= offset {
		0
	} else {
		(pad + input - offset + stride - 1) / stride
	};
	let end = min(end, output);
	(min(start, end), end)
}

fn plane_output_size(params: &ConvParams, input_h: usize, input_w: usize) -> (usize, usize) {
	let (output_h, output_w) = params.output_size(input_h, input_w).unwrap_or((0, 0));
	(max(output_h, 0) as usize, max(output_w, 0) as usize)
}

/// Writes every kernel window of `src` into the columns of `dst`, zero filling taps that fall in the padding.
///
/// `src` is one `(input_h, input_w)` plane, `dst` is `(kernel_h * kernel_w, output_h * output_w)`. Every element of
/// `dst` is overwritten.
pub fn unfolded_copy(dst: &mut ArrayViewMut2<f32>, src: &ArrayView2<f32>, params: &ConvParams) {
	let (input_h, input_w) = src.dim();
	let (output_h, output_w) = plane_output_size(params, input_h, input_w);
	debug_assert_eq!(dst.dim(), (params.patch_size(), output_h * output_w));

	for (k, mut row) in dst.outer_iter_mut().enumerate() {
		let (kh, kw) = (k / params.kernel_w, k % params.kernel_w);
		let (y_start, y_end) = valid_range(kh, params.pad_h, params.stride_h, input_h, output_h);
		let (x_start, x_end) = valid_range(kw, params.pad_w, params.stride_w, input_w, output_w);

		for y in 0..output_h {
			let mut out_row = row.slice_mut(s![y * output_w..(y + 1) * output_w]);
			if y < y_start || y >= y_end || x_start == x_end {
				out_row.fill(0.0);
				continue;
			}

			out_row.slice_mut(s![..x_start]).fill(0.0);
			out_row.slice_mut(s![x_end..]).fill(0.0);

			let iy = y * params.stride_h + kh - params.pad_h;
			let ix = x_start * params.stride_w + kw - params.pad_w;
			let span = (x_end - x_start - 1) * params.stride_w + 1;
			out_row
				.slice_mut(s![x_start..x_end])
				.assign(&src.slice(s![iy, ix..ix + span; params.stride_w as isize]));
		}
	}
}

/// Adds each column of `src` back onto the kernel window of `dst` it was unfolded from.
///
/// This is the adjoint of `unfolded_copy`: overlapping windows sum into the same input position, and entries which
/// correspond to padding are discarded. `dst` is accumulated into, not overwritten.
pub fn unfolded_acc(src: &ArrayView2<f32>, dst: &mut ArrayViewMut2<f32>, params: &ConvParams) {
	let (input_h, input_w) = dst.dim();
	let (output_h, output_w) = plane_output_size(params, input_h, input_w);
	debug_assert_eq!(src.dim(), (params.patch_size(), output_h * output_w));

	for (k, row) in src.outer_iter().enumerate() {
		let (kh, kw) = (k / params.kernel_w, k % params.kernel_w);
		let (y_start, y_end) = valid_range(kh, params.pad_h, params.stride_h, input_h, output_h);
		let (x_start, x_end) = valid_range(kw, params.pad_w, params.stride_w, input_w, output_w);
		if x_start == x_end {
			continue;
		}

		let ix = x_start * params.stride_w + kw - params.pad_w;
		let span = (x_end - x_start - 1) * params.stride_w + 1;
		for y in y_start..y_end {
			let iy = y * params.stride_h + kh - params.pad_h;
			let mut dst_x = dst.slice_mut(s![iy, ix..ix + span; params.stride_w as isize]);
			dst_x += &row.slice(s![y * output_w + x_start..y * output_w + x_end]);
		}
	}
}
