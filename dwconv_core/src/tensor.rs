//! Buffer management on top of `ndarray`: resizing caller owned arrays and producing contiguous reinterpretations.
use ndarray::{Array, ArrayD, ArrayView, ArrayViewD, ArrayViewMut, CowArray, Dimension, IntoDimension, IxDyn, ShapeError};
use std::mem;

/// Resizes `array` to `shape`, in standard layout.
///
/// If the element count is unchanged and the array is already in standard layout the existing allocation is kept
/// (with its contents reinterpreted), otherwise a new zeroed array is allocated.
pub fn resize(array: &mut ArrayD<f32>, shape: &[usize]) {
	if array.shape() == shape && array.is_standard_layout() {
		return;
	}
	let len: usize = shape.iter().product();
	let old = mem::replace(array, ArrayD::zeros(IxDyn(&[0])));
	*array = if old.len() == len && old.is_standard_layout() {
		old.into_shape(IxDyn(shape))
			.unwrap_or_else(|_| ArrayD::zeros(IxDyn(shape)))
	} else {
		ArrayD::zeros(IxDyn(shape))
	};
}

/// Reinterprets `array` in row-major order with a new shape, copying only if it is not in standard layout.
pub fn reshape_standard<'a, E>(array: ArrayViewD<'a, f32>, shape: E) -> Result<CowArray<'a, f32, E::Dim>, ShapeError>
where
	E: IntoDimension,
{
	if array.is_standard_layout() {
		Ok(CowArray::from(array.into_shape(shape)?))
	} else {
		Ok(CowArray::from(array.as_standard_layout().into_owned().into_shape(shape)?))
	}
}

/// Swaps the two outermost axes and materialises the result contiguously.
///
/// Turns a `(planes, channels, ..)` weight or bias into `(channels, planes, ..)` so each channel's filter bank is a
/// contiguous block.
pub fn channel_major<D: Dimension>(mut array: ArrayView<f32, D>) -> Array<f32, D> {
	array.swap_axes(0, 1);
	array.as_standard_layout().into_owned()
}

/// Writes a `(channels, planes, ..)` array back into a `(planes, channels, ..)` destination.
pub fn assign_from_channel_major<D: Dimension>(dst: &mut ArrayViewMut<f32, D>, mut src: ArrayView<f32, D>) {
	src.swap_axes(0, 1);
	dst.assign(&src);
}

#[cfg(test)]
mod tests {
	use super::{assign_from_channel_major, channel_major, reshape_standard, resize};
	use ndarray::{arr2, Array, ArrayD, Ix3, IxDyn};

	#[test]
	fn resize_keeps_allocation() {
		let mut array = Array::from_shape_vec(IxDyn(&[2, 6]), (0..12).map(|x| x as f32).collect()).unwrap();
		let ptr = array.as_ptr();
		resize(&mut array, &[3, 2, 2]);
		assert_eq!(array.shape(), &[3, 2, 2]);
		assert_eq!(array.as_ptr(), ptr);
		assert_eq!(array[[2, 1, 1]], 11.0);
	}

	#[test]
	fn resize_reallocates() {
		let mut array = ArrayD::from_elem(IxDyn(&[2, 3]), 1.0);
		resize(&mut array, &[4, 4]);
		assert_eq!(array.shape(), &[4, 4]);
		assert!(array.iter().all(|&x| x == 0.0));

		// same shape, but transposed memory order
		let mut array = ArrayD::from_elem(IxDyn(&[3, 2]), 1.0).reversed_axes();
		resize(&mut array, &[2, 3]);
		assert!(array.is_standard_layout());
	}

	#[test]
	fn reshape_non_standard() {
		let a = arr2(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
		let t = a.t().into_dyn();
		let r = reshape_standard(t, Ix3(1, 3, 2)).unwrap();
		assert_eq!(r.as_slice().unwrap(), &[1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);

		let r = reshape_standard(a.view().into_dyn(), Ix3(3, 1, 2)).unwrap();
		assert_eq!(r.as_slice().unwrap(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

		assert!(reshape_standard(a.view().into_dyn(), Ix3(2, 2, 2)).is_err());
	}

	#[test]
	fn channel_major_round_trip() {
		let a = arr2(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
		let cm = channel_major(a.view());
		assert_eq!(cm, arr2(&[[1.0, 4.0], [2.0, 5.0], [3.0, 6.0]]));
		assert!(cm.is_standard_layout());

		let mut back = Array::zeros((2, 3));
		assign_from_channel_major(&mut back.view_mut(), cm.view());
		assert_eq!(back, a);
	}
}
