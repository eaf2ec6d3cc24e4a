use std::{collections::BTreeMap, panic, sync::Arc};

use tokio::{sync::watch, task::JoinSet};

use lens_config::Config;
use lens_domain::{Layout, Query, QueryKey, RawQuery, Slot};

use crate::{
	Collaborators, Error, Failure, Result,
	aggregator::{CompositeResult, Mode, Readiness},
	controller::{Applied, Completion, Controller, ControllerSettings, Plan},
	feedback::{FeedbackReceipt, FeedbackRecorder},
	layout::LayoutRandomizer,
	runner,
};

/// What presentation sees. `committed` only ever changes wholesale.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
	pub readiness: Readiness,
	pub committed: Option<Arc<CompositeResult>>,
	pub failure: Option<Failure>,
}

/// Async driver for one user session. Pipeline calls run as tasks; their completions are applied
/// one at a time by whoever polls [`DiscoverySession::next_update`].
pub struct DiscoverySession {
	cfg: Arc<Config>,
	collaborators: Collaborators,
	controller: Controller,
	in_flight: JoinSet<Completion>,
	snapshot: watch::Sender<Snapshot>,
	// One recorder per committed comparative key, kept so a re-shown result keeps its state.
	feedback: BTreeMap<QueryKey, FeedbackRecorder>,
}
impl DiscoverySession {
	pub fn new(cfg: Config, collaborators: Collaborators) -> Self {
		let layout = LayoutRandomizer::new().draw();

		Self::with_layout(cfg, collaborators, layout)
	}

	pub fn with_layout(cfg: Config, collaborators: Collaborators, layout: Layout) -> Self {
		let settings = ControllerSettings::from_config(&cfg);
		let (snapshot, _) = watch::channel(Snapshot::default());

		Self {
			cfg: Arc::new(cfg),
			collaborators,
			controller: Controller::new(layout, settings),
			in_flight: JoinSet::new(),
			snapshot,
			feedback: BTreeMap::new(),
		}
	}

	pub fn evaluation_mode(&self) -> bool {
		self.controller.settings().evaluation
	}

	pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
		self.snapshot.subscribe()
	}

	pub fn snapshot(&self) -> Snapshot {
		self.snapshot.borrow().clone()
	}

	/// Number of dispatched calls whose completions have not been applied yet.
	pub fn in_flight(&self) -> usize {
		self.in_flight.len()
	}

	/// Normalizes and applies a new query. Must be called from within a Tokio runtime.
	pub fn submit_query(&mut self, raw: RawQuery) -> Result<Readiness> {
		let query = Query::normalize(raw)?;
		let plan = self.controller.on_query_change(query);

		self.apply(plan);

		Ok(self.controller.readiness())
	}

	pub fn set_page(&mut self, page: u32) -> Result<Readiness> {
		let plan = self.controller.set_page(page)?;

		self.apply(plan);

		Ok(self.controller.readiness())
	}

	pub fn set_evaluation_mode(&mut self, enabled: bool) -> Readiness {
		let plan = self.controller.set_evaluation_mode(enabled);

		self.apply(plan);

		self.controller.readiness()
	}

	pub fn retry(&mut self) -> Readiness {
		let plan = self.controller.retry();

		self.apply(plan);

		self.controller.readiness()
	}

	/// Applies the next completion. Returns `None` once nothing is in flight.
	pub async fn next_update(&mut self) -> Option<Snapshot> {
		let joined = self.in_flight.join_next().await?;
		let completion = match joined {
			Ok(completion) => completion,
			Err(err) if err.is_panic() => panic::resume_unwind(err.into_panic()),
			Err(err) => {
				tracing::warn!(error = %err, "Pipeline task was cancelled.");

				return Some(self.snapshot());
			},
		};

		let applied = self.controller.on_completion(completion);

		if let Applied::Settled { commit: Some(commit) } = applied {
			self.on_commit(commit);
		}

		self.publish();

		Some(self.snapshot())
	}

	/// Applies completions until nothing is in flight.
	pub async fn settle(&mut self) -> Snapshot {
		while self.next_update().await.is_some() {}

		self.snapshot()
	}

	pub async fn submit_feedback(
		&mut self,
		ranking: &[Slot],
		comment: Option<&str>,
	) -> Result<FeedbackReceipt> {
		let key = self.visible_comparative_key()?;
		let recorder = self.feedback.get_mut(&key).ok_or_else(no_comparative_result)?;

		recorder
			.submit(self.collaborators.feedback.as_ref(), &self.cfg.feedback, ranking, comment)
			.await
	}

	pub async fn retry_feedback(&mut self) -> Result<FeedbackReceipt> {
		let key = self.visible_comparative_key()?;
		let recorder = self.feedback.get_mut(&key).ok_or_else(no_comparative_result)?;

		recorder.retry_pending(self.collaborators.feedback.as_ref(), &self.cfg.feedback).await
	}

	fn apply(&mut self, plan: Plan) {
		for dispatch in plan.dispatches {
			let task = runner::run(self.collaborators.clone(), self.cfg.clone(), dispatch);

			self.in_flight.spawn(task);
		}

		if let Some(commit) = plan.commit {
			self.on_commit(commit);
		}

		self.publish();
	}

	fn visible_comparative_key(&self) -> Result<QueryKey> {
		self.controller
			.committed()
			.filter(|committed| committed.mode == Mode::Comparative)
			.map(|committed| committed.key.clone())
			.ok_or_else(no_comparative_result)
	}

	fn on_commit(&mut self, commit: Arc<CompositeResult>) {
		tracing::info!(
			key = %commit.key,
			mode = ?commit.mode,
			primary = commit.primary.items.len(),
			"Published composite result."
		);

		if commit.mode != Mode::Comparative || self.feedback.contains_key(&commit.key) {
			return;
		}

		let key = commit.key.clone();
		let recorder = FeedbackRecorder::new(
			commit,
			self.controller.layout(),
			self.cfg.feedback.max_ids_per_slot,
		);

		match recorder {
			Ok(recorder) => {
				self.feedback.insert(key, recorder);
			},
			Err(err) => tracing::warn!(key = %key, error = %err, "Feedback is unavailable."),
		}
	}

	fn publish(&self) {
		self.snapshot.send_replace(Snapshot {
			readiness: self.controller.readiness(),
			committed: self.controller.committed().cloned(),
			failure: self.controller.failure().cloned(),
		});
	}
}

fn no_comparative_result() -> Error {
	Error::FeedbackUnavailable {
		message: "No comparative result has been committed.".to_string(),
	}
}
