use serde::Serialize;
use time::OffsetDateTime;

use crate::{Layout, PipelineId, Query, Ranking, Slot};

/// Result identifiers shown in each slot when feedback was given, truncated to a fixed bound.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SlotIds {
	pub left: Vec<String>,
	pub middle: Vec<String>,
	pub right: Vec<String>,
}
impl SlotIds {
	pub fn get(&self, slot: Slot) -> &[String] {
		match slot {
			Slot::Left => &self.left,
			Slot::Middle => &self.middle,
			Slot::Right => &self.right,
		}
	}

	pub fn set(&mut self, slot: Slot, ids: Vec<String>) {
		match slot {
			Slot::Left => self.left = ids,
			Slot::Middle => self.middle = ids,
			Slot::Right => self.right = ids,
		}
	}
}

/// A single blind-comparison judgement. Immutable once built.
#[derive(Clone, Debug, Serialize)]
pub struct FeedbackRecord {
	pub query: Query,
	pub ranking: Ranking,
	pub ranked_pipelines: [PipelineId; 3],
	pub layout: Layout,
	pub slot_ids: SlotIds,
	pub comment: Option<String>,
	#[serde(with = "crate::time_serde")]
	pub submitted_at: OffsetDateTime,
}
