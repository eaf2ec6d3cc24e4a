use std::collections::BTreeMap;

use lens_domain::{PipelineId, QueryKey};

/// Remembers the last key issued to each pipeline so unchanged inputs are not re-requested.
#[derive(Debug, Default)]
pub struct RequestDeduplicator {
	issued: BTreeMap<PipelineId, QueryKey>,
}
impl RequestDeduplicator {
	/// Returns `true` when `key` differs from the last issued key. The key is recorded
	/// immediately, before the request resolves.
	pub fn should_issue(&mut self, pipeline: PipelineId, key: &QueryKey) -> bool {
		if self.issued.get(&pipeline) == Some(key) {
			return false;
		}

		self.issued.insert(pipeline, key.clone());

		true
	}

	/// Drops the stored key so the next evaluation re-issues.
	pub fn forget(&mut self, pipeline: PipelineId) {
		self.issued.remove(&pipeline);
	}
}
