use rand::{Rng, rngs::ThreadRng};

use lens_domain::Layout;

/// Draws the slot layout for a session as a uniform permutation of the pipelines.
pub struct LayoutRandomizer<R> {
	rng: R,
}
impl LayoutRandomizer<ThreadRng> {
	pub fn new() -> Self {
		Self { rng: rand::thread_rng() }
	}
}
impl Default for LayoutRandomizer<ThreadRng> {
	fn default() -> Self {
		Self::new()
	}
}
impl<R> LayoutRandomizer<R>
where
	R: Rng,
{
	pub fn with_rng(rng: R) -> Self {
		Self { rng }
	}

	pub fn draw(&mut self) -> Layout {
		Layout::shuffled(&mut self.rng)
	}
}
