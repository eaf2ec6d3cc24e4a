use std::collections::BTreeMap;

use serde::Serialize;

use lens_domain::PipelineId;

/// Tag identifying one dispatch of one pipeline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Generation(u64);
impl Generation {
	pub fn value(self) -> u64 {
		self.0
	}
}

/// Per-pipeline generation counters. Counters only move forward for the life of a session.
#[derive(Debug, Default)]
pub struct StaleResponseGuard {
	counters: BTreeMap<PipelineId, Generation>,
}
impl StaleResponseGuard {
	/// Bumps the pipeline's counter and returns the tag for the dispatch about to happen.
	pub fn advance(&mut self, pipeline: PipelineId) -> Generation {
		let counter = self.counters.entry(pipeline).or_default();

		counter.0 += 1;

		*counter
	}

	pub fn current(&self, pipeline: PipelineId) -> Generation {
		self.counters.get(&pipeline).copied().unwrap_or_default()
	}

	pub fn is_current(&self, pipeline: PipelineId, generation: Generation) -> bool {
		generation.0 > 0 && self.current(pipeline) == generation
	}
}
