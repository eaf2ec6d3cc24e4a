//! Sans-IO composition of the deduplicator, the stale-response guard, and the readiness
//! aggregator. The controller decides what to dispatch and what to commit; it never performs a
//! request itself.

use std::sync::Arc;

use lens_config::{ASSISTED_REQUIRES_ABSTRACTS_AND_KEYWORDS, Config};
use lens_domain::{Layout, PipelineId, Query, QueryKey};

use crate::{
	Error, Failure, Outcome, Result,
	aggregator::{CompositeResult, Mode, Readiness, ReadinessAggregator, Settlement, Target},
	dedup::RequestDeduplicator,
	guard::{Generation, StaleResponseGuard},
};

/// Inputs the assisted keyword pipeline needs before it is worth running.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AssistedPrecondition {
	#[default]
	Abstracts,
	AbstractsAndKeywords,
}
impl AssistedPrecondition {
	/// Maps a validated `evaluation.assisted_requires` value.
	pub fn from_config(raw: &str) -> Self {
		if raw == ASSISTED_REQUIRES_ABSTRACTS_AND_KEYWORDS {
			Self::AbstractsAndKeywords
		} else {
			Self::Abstracts
		}
	}

	pub fn admits(self, query: &Query) -> bool {
		match self {
			Self::Abstracts => !query.abstracts().is_empty(),
			Self::AbstractsAndKeywords => {
				!query.abstracts().is_empty() && !query.keywords().is_empty()
			},
		}
	}
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ControllerSettings {
	pub evaluation: bool,
	pub assisted_requires: AssistedPrecondition,
}
impl ControllerSettings {
	pub fn from_config(cfg: &Config) -> Self {
		Self {
			evaluation: cfg.evaluation.enabled,
			assisted_requires: AssistedPrecondition::from_config(&cfg.evaluation.assisted_requires),
		}
	}
}

/// A request the driver must perform.
#[derive(Clone, Debug)]
pub struct Dispatch {
	pub pipeline: PipelineId,
	pub generation: Generation,
	pub key: QueryKey,
	pub query: Query,
}

/// The settled outcome of a [`Dispatch`], tagged with the dispatch's generation and key.
#[derive(Clone, Debug)]
pub struct Completion {
	pub pipeline: PipelineId,
	pub generation: Generation,
	pub key: QueryKey,
	pub outcome: Outcome,
}

#[derive(Debug, Default)]
pub struct Plan {
	pub dispatches: Vec<Dispatch>,
	/// Set when the new target was satisfied entirely by earlier settlements.
	pub commit: Option<Arc<CompositeResult>>,
}

#[derive(Debug)]
pub enum Applied {
	Discarded,
	Settled { commit: Option<Arc<CompositeResult>> },
}

#[derive(Debug)]
pub struct Controller {
	settings: ControllerSettings,
	dedup: RequestDeduplicator,
	guard: StaleResponseGuard,
	aggregator: ReadinessAggregator,
	query: Option<Query>,
}
impl Controller {
	pub fn new(layout: Layout, settings: ControllerSettings) -> Self {
		Self {
			settings,
			dedup: RequestDeduplicator::default(),
			guard: StaleResponseGuard::default(),
			aggregator: ReadinessAggregator::new(layout),
			query: None,
		}
	}

	pub fn settings(&self) -> ControllerSettings {
		self.settings
	}

	pub fn layout(&self) -> Layout {
		self.aggregator.layout()
	}

	pub fn readiness(&self) -> Readiness {
		self.aggregator.readiness()
	}

	pub fn committed(&self) -> Option<&Arc<CompositeResult>> {
		self.aggregator.committed()
	}

	pub fn failure(&self) -> Option<&Failure> {
		self.aggregator.failure()
	}

	pub fn on_query_change(&mut self, query: Query) -> Plan {
		if query.is_empty() {
			tracing::debug!("Query is empty. Clearing results.");

			self.query = None;

			self.aggregator.clear();

			return Plan::default();
		}

		let mode = self.mode();
		let key = query.key();

		if self.aggregator.target().is_some_and(|target| target.key == key && target.mode == mode) {
			tracing::debug!(key = %key, "Query unchanged. Nothing to dispatch.");

			return Plan::default();
		}

		self.query = Some(query.clone());

		self.plan(query)
	}

	/// Moves the current query to another page of primary results.
	pub fn set_page(&mut self, page: u32) -> Result<Plan> {
		let Some(current) = &self.query else {
			return Err(Error::InvalidQuery {
				message: "There is no active query to paginate.".to_string(),
			});
		};
		let query = current.with_page(page)?;

		Ok(self.on_query_change(query))
	}

	pub fn set_evaluation_mode(&mut self, enabled: bool) -> Plan {
		if self.settings.evaluation == enabled {
			return Plan::default();
		}

		self.settings.evaluation = enabled;

		tracing::info!(enabled, "Evaluation mode changed.");

		match self.query.clone() {
			Some(query) => self.plan(query),
			None => Plan::default(),
		}
	}

	/// Re-issues the calls that failed for the current target. Only acts after a total failure.
	pub fn retry(&mut self) -> Plan {
		if self.aggregator.readiness() != Readiness::Failed {
			return Plan::default();
		}

		let Some(query) = self.query.clone() else {
			return Plan::default();
		};

		for pipeline in self.aggregator.failed_pipelines(&self.guard) {
			tracing::info!(pipeline = %pipeline, "Retrying failed pipeline.");

			self.dedup.forget(pipeline);
		}

		self.plan(query)
	}

	pub fn on_completion(&mut self, completion: Completion) -> Applied {
		let Completion { pipeline, generation, key, outcome } = completion;

		if !self.guard.is_current(pipeline, generation) {
			tracing::warn!(
				pipeline = %pipeline,
				generation = generation.value(),
				current = self.guard.current(pipeline).value(),
				"Discarded stale pipeline response."
			);

			return Applied::Discarded;
		}

		if let Err(failure) = &outcome
			&& !pipeline.is_primary()
		{
			tracing::warn!(
				pipeline = %pipeline,
				error = %failure,
				"Secondary pipeline failed. Its slot will be empty."
			);
		}

		let commit =
			self.aggregator.settle(pipeline, Settlement { generation, key, outcome }, &self.guard);

		Applied::Settled { commit }
	}

	fn mode(&self) -> Mode {
		if self.settings.evaluation { Mode::Comparative } else { Mode::Single }
	}

	fn required_pipelines(&self, query: &Query) -> Vec<PipelineId> {
		let mut required = vec![PipelineId::Embedding];

		if self.settings.evaluation {
			if !query.keywords().is_empty() {
				required.push(PipelineId::Keyword);
			}
			if self.settings.assisted_requires.admits(query) {
				required.push(PipelineId::AssistedKeyword);
			}
		}

		required
	}

	fn plan(&mut self, query: Query) -> Plan {
		let mode = self.mode();
		let key = query.key();
		let required: Vec<(PipelineId, QueryKey)> = self
			.required_pipelines(&query)
			.into_iter()
			.map(|pipeline| (pipeline, query.key_for(pipeline)))
			.collect();
		let mut dispatches = Vec::new();

		if !self.aggregator.is_committed_for(&key, mode) {
			for (pipeline, pipeline_key) in &required {
				if !self.dedup.should_issue(*pipeline, pipeline_key) {
					tracing::debug!(pipeline = %pipeline, "Pipeline input unchanged. Skipping.");

					continue;
				}

				let generation = self.guard.advance(*pipeline);

				tracing::debug!(
					pipeline = %pipeline,
					generation = generation.value(),
					"Dispatching pipeline request."
				);

				dispatches.push(Dispatch {
					pipeline: *pipeline,
					generation,
					key: pipeline_key.clone(),
					query: query.clone(),
				});
			}
		}

		let commit = self.aggregator.begin(Target { key, query, mode, required }, &self.guard);

		Plan { dispatches, commit }
	}
}
