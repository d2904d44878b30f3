use ndarray::{ArrayView2, ArrayViewMut2};

/// General matrix multiplication (f32)
///
/// C ← α A B + β C
///
/// + m, k, n: dimensions
/// + a, b, c: pointer to the first element in the matrix
/// + A: m by k matrix
/// + B: k by n matrix
/// + C: m by n matrix
/// + rs<em>x</em>: row stride of *x*
/// + cs<em>x</em>: col stride of *x*
///
/// Strides for A and B may be arbitrary. Strides for C must not result in
/// elements that alias each other, for example they can not be zero.
///
/// If β is zero, then C does not need to be initialized.
#[allow(clippy::too_many_arguments)]
unsafe fn sgemm(
	m: usize,
	k: usize,
	n: usize,
	alpha: f32,
	a: *const f32,
	rsa: isize,
	csa: isize,
	b: *const f32,
	rsb: isize,
	csb: isize,
	beta: f32,
	c: *mut f32,
	rsc: isize,
	csc: isize,
) {
	matrixmultiply_mt::sgemm(m, k, n, alpha, a, rsa, csa, b, rsb, csb, beta, c, rsc, csc);
}

/// C ← β C + α A B, for 2D views of any memory layout.
///
/// When `beta` is zero the previous contents of `c` are ignored entirely, NaNs included.
///
/// # Panics
/// Panics if `a` is not m by k, `b` k by n and `c` m by n.
pub fn addmm(beta: f32, c: &mut ArrayViewMut2<f32>, alpha: f32, a: &ArrayView2<f32>, b: &ArrayView2<f32>) {
	let (m, k) = a.dim();
	let (k_b, n) = b.dim();
	assert_eq!(k, k_b, "inner dimensions do not match, a: {:?} b: {:?}", a.dim(), b.dim());
	assert_eq!(c.dim(), (m, n), "c: {:?} should be {:?}", c.dim(), (m, n));

	if m == 0 || n == 0 {
		return;
	}
	if k == 0 {
		if beta == 0.0 {
			c.fill(0.0);
		} else {
			c.mapv_inplace(|x| x * beta);
		}
		return;
	}

	// a stride on a unit length axis is never stepped along, so only longer axes can alias
	let (rsc, csc) = (c.strides()[0], c.strides()[1]);
	debug_assert!((rsc != 0 || m == 1) && (csc != 0 || n == 1));

	unsafe {
		sgemm(
			m,
			k,
			n,
			alpha,
			a.as_ptr(),
			a.strides()[0],
			a.strides()[1],
			b.as_ptr(),
			b.strides()[0],
			b.strides()[1],
			beta,
			c.as_mut_ptr(),
			rsc,
			csc,
		);
	}
}
