//! Thread pool handle on which the per-frame loops of each pass run.
use crate::errors::ExecutorError;
use lazy_static::lazy_static;
use log::debug;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::Arc;

lazy_static! {
	static ref NUM_CPUS: usize = num_cpus::get();
}

/// Number of logical CPUs, used when a thread count of zero is requested.
pub fn num_cpus() -> usize {
	*NUM_CPUS
}

/// Where the data parallel (batch, channel) loops are executed.
///
/// The default executor uses the rayon pool of the calling context, which outside of any `install` is the global pool
/// sized to the available hardware parallelism. All frames of one call are flattened into a single parallel iteration,
/// so a pool is never nested inside itself.
#[derive(Clone, Debug, Default)]
pub struct Executor {
	pool: Option<Arc<ThreadPool>>,
}

impl Executor {
	/// Builds a dedicated pool with `threads` workers, or one per logical CPU if `threads` is zero.
	pub fn with_threads(threads: usize) -> Result<Self, ExecutorError> {
		let threads = if threads == 0 { num_cpus() } else { threads };
		let pool = ThreadPoolBuilder::new()
			.num_threads(threads)
			.thread_name(|i| format!("dwconv-{}", i))
			.build()?;
		debug!("Built depthwise convolution thread pool with {} threads", threads);
		Ok(Executor {
			pool: Some(Arc::new(pool)),
		})
	}

	/// Share an existing pool, e.g. one also used by the surrounding application.
	pub fn from_pool(pool: Arc<ThreadPool>) -> Self {
		Executor { pool: Some(pool) }
	}

	pub fn current_num_threads(&self) -> usize {
		match self.pool {
			Some(ref pool) => pool.current_num_threads(),
			None => rayon::current_num_threads(),
		}
	}

	/// Runs `op` such that any rayon parallel iterators inside it use this executor's pool.
	pub fn install<OP, R>(&self, op: OP) -> R
	where
		OP: FnOnce() -> R + Send,
		R: Send,
	{
		match self.pool {
			Some(ref pool) => pool.install(op),
			None => op(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::{num_cpus, Executor};
	use rayon::prelude::*;

	#[test]
	fn dedicated_pool() {
		let exec = Executor::with_threads(3).unwrap();
		assert_eq!(exec.current_num_threads(), 3);
		assert_eq!(exec.install(rayon::current_num_threads), 3);

		let sum: usize = exec.install(|| (0..100usize).into_par_iter().sum());
		assert_eq!(sum, 4950);
	}

	#[test]
	fn zero_threads_uses_cpus() {
		let exec = Executor::with_threads(0).unwrap();
		assert_eq!(exec.current_num_threads(), num_cpus());
	}

	#[test]
	fn default_runs_inline() {
		let exec = Executor::default();
		assert_eq!(exec.current_num_threads(), rayon::current_num_threads());
		assert_eq!(exec.install(|| 7), 7);
	}
}
