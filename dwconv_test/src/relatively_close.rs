use ndarray::{ArrayBase, Data, Dimension};
use num_traits::Float;
use std::fmt::Debug;

pub trait RelClose<A: Float + Debug> {
	/// Similar to `all_close()` for ArrayBase, however it tests
	/// `(*x - *y).abs() <= tol * y.abs().max(1)`
	/// rather than
	/// `(*x - *y).abs() <= tol`
	///
	/// Elements are paired in logical order, so the memory layouts and dimension types of the two arrays may differ,
	/// but their shapes must be equal.
	fn all_relatively_close<S2, E2>(&self, rhs: &ArrayBase<S2, E2>, tol: A) -> bool
	where
		S2: Data<Elem = A>,
		E2: Dimension;

	/// The largest `(*x - *y).abs() / y.abs().max(1)` over all element pairs, or `None` if the shapes differ.
	fn max_relative_diff<S2, E2>(&self, rhs: &ArrayBase<S2, E2>) -> Option<A>
	where
		S2: Data<Elem = A>,
		E2: Dimension;
}

impl<A: Float + Debug, S1: Data<Elem = A>, E1: Dimension> RelClose<A> for ArrayBase<S1, E1> {
	fn all_relatively_close<S2, E2>(&self, rhs: &ArrayBase<S2, E2>, tol: A) -> bool
	where
		S2: Data<Elem = A>,
		E2: Dimension,
	{
		if self.shape() != rhs.shape() {
			eprintln!("shapes differ: {:?} vs {:?}", self.shape(), rhs.shape());
			return false;
		}
		match self
			.iter()
			.zip(rhs.iter())
			.find(|&(&x, &y)| !((x - y).abs() <= tol * y.abs().max(A::one())))
		{
			Some((x, y)) => {
				eprintln!("tolerance failed, found: {:?}, expect within {:?} of {:?}", x, tol, y);
				false
			}
			None => true,
		}
	}

	fn max_relative_diff<S2, E2>(&self, rhs: &ArrayBase<S2, E2>) -> Option<A>
	where
		S2: Data<Elem = A>,
		E2: Dimension,
	{
		if self.shape() != rhs.shape() {
			return None;
		}
		Some(self.iter().zip(rhs.iter()).fold(A::zero(), |max, (&x, &y)| {
			let diff = (x - y).abs() / y.abs().max(A::one());
			if max.is_nan() || diff.is_nan() {
				A::nan()
			} else {
				max.max(diff)
			}
		}))
	}
}
