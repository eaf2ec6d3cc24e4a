use std::{fmt, str::FromStr};

use rand::{Rng, seq::SliceRandom};
use serde::{Deserialize, Serialize};

use crate::{Error, PipelineId, Result};

/// Anonymized display position used in comparative mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
	Left,
	Middle,
	Right,
}
impl Slot {
	pub const ALL: [Self; 3] = [Self::Left, Self::Middle, Self::Right];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Left => "left",
			Self::Middle => "middle",
			Self::Right => "right",
		}
	}
}
impl fmt::Display for Slot {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
impl FromStr for Slot {
	type Err = Error;

	fn from_str(raw: &str) -> Result<Self> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"left" => Ok(Self::Left),
			"middle" => Ok(Self::Middle),
			"right" => Ok(Self::Right),
			_ => Err(Error::UnknownSlot { value: raw.to_string() }),
		}
	}
}

/// Bijection from slots to pipelines, fixed for a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Layout {
	left: PipelineId,
	middle: PipelineId,
	right: PipelineId,
}
impl Layout {
	/// Builds a layout from pipelines listed in left, middle, right order.
	pub fn from_order(order: [PipelineId; 3]) -> Result<Self> {
		for pipeline in PipelineId::ALL {
			if !order.contains(&pipeline) {
				return Err(Error::InvalidLayout {
					message: format!("pipeline {pipeline} has no slot."),
				});
			}
		}

		Ok(Self::from_permutation(order))
	}

	/// Draws a uniformly random layout.
	pub fn shuffled<R>(rng: &mut R) -> Self
	where
		R: Rng + ?Sized,
	{
		let mut order = PipelineId::ALL;

		order.shuffle(rng);

		Self::from_permutation(order)
	}

	// `order` must be a permutation of `PipelineId::ALL`.
	fn from_permutation(order: [PipelineId; 3]) -> Self {
		let [left, middle, right] = order;

		Self { left, middle, right }
	}

	pub fn pipeline_at(&self, slot: Slot) -> PipelineId {
		match slot {
			Slot::Left => self.left,
			Slot::Middle => self.middle,
			Slot::Right => self.right,
		}
	}

	pub fn slot_of(&self, pipeline: PipelineId) -> Option<Slot> {
		Slot::ALL.into_iter().find(|slot| self.pipeline_at(*slot) == pipeline)
	}
}
/// The fixed arrangement used before layouts were randomized.
impl Default for Layout {
	fn default() -> Self {
		Self {
			left: PipelineId::Embedding,
			middle: PipelineId::Keyword,
			right: PipelineId::AssistedKeyword,
		}
	}
}

/// A full most-to-least relevant ordering of the three slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Ranking([Slot; 3]);
impl Ranking {
	pub fn new(slots: &[Slot]) -> Result<Self> {
		let order: [Slot; 3] = slots.try_into().map_err(|_| Error::InvalidRanking {
			message: format!("expected 3 slots, got {}.", slots.len()),
		})?;

		for (i, slot) in order.iter().enumerate() {
			if order[..i].contains(slot) {
				return Err(Error::InvalidRanking { message: format!("slot {slot} is repeated.") });
			}
		}

		Ok(Self(order))
	}

	pub fn slots(&self) -> [Slot; 3] {
		self.0
	}

	pub fn first(&self) -> Slot {
		self.0[0]
	}

	pub fn to_pipelines(&self, layout: &Layout) -> [PipelineId; 3] {
		self.0.map(|slot| layout.pipeline_at(slot))
	}
}
impl FromStr for Ranking {
	type Err = Error;

	fn from_str(raw: &str) -> Result<Self> {
		let slots = raw
			.split(',')
			.filter(|part| !part.trim().is_empty())
			.map(Slot::from_str)
			.collect::<Result<Vec<_>>>()?;

		Self::new(&slots)
	}
}
