use std::{collections::BTreeMap, sync::Arc};

use serde::Serialize;
use time::OffsetDateTime;

use lens_domain::{Layout, PipelineId, PipelineResult, Query, QueryKey, Slot};

use crate::{
	Failure, Outcome,
	guard::{Generation, StaleResponseGuard},
};

/// Loading state exposed to presentation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
	#[default]
	Idle,
	AwaitingPrimary,
	AwaitingSecondary,
	Committed,
	Failed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
	Single,
	Comparative,
}

/// Per-slot results of a comparative commit. Pipeline identities are deliberately absent.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SlotResults {
	pub left: PipelineResult,
	pub middle: PipelineResult,
	pub right: PipelineResult,
}
impl SlotResults {
	pub fn get(&self, slot: Slot) -> &PipelineResult {
		match slot {
			Slot::Left => &self.left,
			Slot::Middle => &self.middle,
			Slot::Right => &self.right,
		}
	}
}

/// The externally visible snapshot. Replaced wholesale on every commit.
#[derive(Clone, Debug, Serialize)]
pub struct CompositeResult {
	pub key: QueryKey,
	pub query: Query,
	pub mode: Mode,
	pub primary: PipelineResult,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub slots: Option<SlotResults>,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub degraded: Vec<PipelineId>,
	#[serde(with = "lens_domain::time_serde")]
	pub committed_at: OffsetDateTime,
}
impl CompositeResult {
	pub fn degradation(&self) -> Option<Failure> {
		(!self.degraded.is_empty())
			.then(|| Failure::PartialDegradation { pipelines: self.degraded.clone() })
	}
}

/// The composite key and mode being assembled, with the per-pipeline keys it needs.
#[derive(Clone, Debug)]
pub struct Target {
	pub key: QueryKey,
	pub query: Query,
	pub mode: Mode,
	pub required: Vec<(PipelineId, QueryKey)>,
}
impl Target {
	fn expected_key(&self, pipeline: PipelineId) -> Option<&QueryKey> {
		self.required.iter().find(|(id, _)| *id == pipeline).map(|(_, key)| key)
	}
}

/// An honored completion of one pipeline.
#[derive(Clone, Debug)]
pub struct Settlement {
	pub generation: Generation,
	pub key: QueryKey,
	pub outcome: Outcome,
}

/// Tracks which required pipelines have settled for the current target and commits the
/// composite result once all of them have.
///
/// Every commit is kept for the session. Returning to a key and mode that was committed before
/// shows that composite again instead of committing a second one.
#[derive(Debug)]
pub struct ReadinessAggregator {
	layout: Layout,
	target: Option<Target>,
	settled: BTreeMap<PipelineId, Settlement>,
	readiness: Readiness,
	committed: Option<Arc<CompositeResult>>,
	history: BTreeMap<(QueryKey, Mode), Arc<CompositeResult>>,
	failure: Option<Failure>,
}
impl ReadinessAggregator {
	pub fn new(layout: Layout) -> Self {
		Self {
			layout,
			target: None,
			settled: BTreeMap::new(),
			readiness: Readiness::Idle,
			committed: None,
			history: BTreeMap::new(),
			failure: None,
		}
	}

	pub fn layout(&self) -> Layout {
		self.layout
	}

	pub fn readiness(&self) -> Readiness {
		self.readiness
	}

	pub fn committed(&self) -> Option<&Arc<CompositeResult>> {
		self.committed.as_ref()
	}

	pub fn failure(&self) -> Option<&Failure> {
		self.failure.as_ref()
	}

	pub fn target(&self) -> Option<&Target> {
		self.target.as_ref()
	}

	/// Whether `key` was committed in `mode` at any point in this session.
	pub fn is_committed_for(&self, key: &QueryKey, mode: Mode) -> bool {
		self.history.contains_key(&(key.clone(), mode))
	}

	/// Starts assembling `target`, superseding whatever was in progress. Settlements already
	/// honored for the expected keys are reused, so this may commit immediately. A target that
	/// was committed before is shown again without a new commit.
	pub fn begin(
		&mut self,
		target: Target,
		guard: &StaleResponseGuard,
	) -> Option<Arc<CompositeResult>> {
		let earlier = self.history.get(&(target.key.clone(), target.mode)).cloned();

		self.target = Some(target);
		self.failure = None;

		if let Some(earlier) = earlier {
			tracing::debug!(key = %earlier.key, mode = ?earlier.mode, "Showing earlier commit.");

			self.committed = Some(earlier);
			self.readiness = Readiness::Committed;

			return None;
		}

		self.readiness = Readiness::AwaitingPrimary;

		self.evaluate(guard)
	}

	/// Records an honored completion. Returns the new composite when this settlement completes
	/// the target.
	pub fn settle(
		&mut self,
		pipeline: PipelineId,
		settlement: Settlement,
		guard: &StaleResponseGuard,
	) -> Option<Arc<CompositeResult>> {
		self.settled.insert(pipeline, settlement);

		match self.readiness {
			Readiness::AwaitingPrimary | Readiness::AwaitingSecondary => self.evaluate(guard),
			Readiness::Idle | Readiness::Committed | Readiness::Failed => None,
		}
	}

	/// Drops the target and the visible result. Earlier commits stay available to [`Self::begin`].
	pub fn clear(&mut self) {
		self.target = None;
		self.committed = None;
		self.failure = None;
		self.readiness = Readiness::Idle;
	}

	/// Required pipelines whose settlement for the current target is a failure.
	pub fn failed_pipelines(&self, guard: &StaleResponseGuard) -> Vec<PipelineId> {
		let Some(target) = &self.target else {
			return Vec::new();
		};

		target
			.required
			.iter()
			.filter(|(pipeline, key)| {
				matches!(self.resolved(*pipeline, key, guard), Some(Err(_)))
			})
			.map(|(pipeline, _)| *pipeline)
			.collect()
	}

	fn resolved(
		&self,
		pipeline: PipelineId,
		expected: &QueryKey,
		guard: &StaleResponseGuard,
	) -> Option<&Outcome> {
		self.settled
			.get(&pipeline)
			.filter(|settlement| {
				settlement.key == *expected && guard.is_current(pipeline, settlement.generation)
			})
			.map(|settlement| &settlement.outcome)
	}

	fn evaluate(&mut self, guard: &StaleResponseGuard) -> Option<Arc<CompositeResult>> {
		let target = self.target.as_ref()?;
		let primary_key = target.expected_key(PipelineId::Embedding)?;
		let primary = match self.resolved(PipelineId::Embedding, primary_key, guard) {
			None => {
				self.readiness = Readiness::AwaitingPrimary;

				return None;
			},
			Some(Err(failure)) => {
				tracing::warn!(key = %target.key, error = %failure, "Primary pipeline failed.");

				self.failure = Some(Failure::TotalFailure { message: failure.to_string() });
				self.readiness = Readiness::Failed;

				return None;
			},
			Some(Ok(primary)) => primary.clone(),
		};
		let pending = target.required.iter().any(|(pipeline, key)| {
			!pipeline.is_primary() && self.resolved(*pipeline, key, guard).is_none()
		});

		if pending {
			self.readiness = Readiness::AwaitingSecondary;

			return None;
		}

		let mut degraded = Vec::new();
		let slots = match target.mode {
			Mode::Single => None,
			Mode::Comparative => {
				let mut fill = |slot: Slot| match self.layout.pipeline_at(slot) {
					PipelineId::Embedding => primary.clone(),
					pipeline => match target
						.expected_key(pipeline)
						.and_then(|key| self.resolved(pipeline, key, guard))
					{
						Some(Ok(result)) => result.clone(),
						Some(Err(_)) => {
							degraded.push(pipeline);

							PipelineResult::default()
						},
						None => PipelineResult::default(),
					},
				};

				Some(SlotResults {
					left: fill(Slot::Left),
					middle: fill(Slot::Middle),
					right: fill(Slot::Right),
				})
			},
		};

		degraded.sort_unstable();

		let composite = Arc::new(CompositeResult {
			key: target.key.clone(),
			query: target.query.clone(),
			mode: target.mode,
			primary,
			slots,
			degraded,
			committed_at: OffsetDateTime::now_utc(),
		});

		tracing::info!(
			key = %composite.key,
			mode = ?composite.mode,
			degraded = composite.degraded.len(),
			"Committed composite result."
		);

		self.history.insert((composite.key.clone(), composite.mode), composite.clone());

		self.committed = Some(composite.clone());
		self.readiness = Readiness::Committed;

		Some(composite)
	}
}
