use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;

use lens_config::Feedback;
use lens_domain::{FeedbackRecord, Layout, Ranking, Slot, SlotIds};

use crate::{
	Error, FeedbackSink, Result,
	aggregator::{CompositeResult, Mode},
};

/// How far a submitted judgement got.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Acknowledgement {
	/// The feedback endpoint accepted the record.
	Remote { status: String },
	/// Delivery failed. The record is kept for [`FeedbackRecorder::retry_pending`].
	LocalOnly { reason: String },
}

#[derive(Clone, Debug, Serialize)]
pub struct FeedbackReceipt {
	pub record: FeedbackRecord,
	pub acknowledgement: Acknowledgement,
}

#[derive(Debug)]
enum State {
	Open,
	Pending(FeedbackRecord),
	Submitted,
}

/// Captures one ranking for one committed comparative result.
#[derive(Debug)]
pub struct FeedbackRecorder {
	result: Arc<CompositeResult>,
	layout: Layout,
	max_ids: usize,
	state: State,
}
impl FeedbackRecorder {
	pub fn new(
		result: Arc<CompositeResult>,
		layout: Layout,
		max_ids_per_slot: u32,
	) -> Result<Self> {
		if result.mode != Mode::Comparative || result.slots.is_none() {
			return Err(Error::FeedbackUnavailable {
				message: "Feedback requires a committed comparative result.".to_string(),
			});
		}

		Ok(Self { result, layout, max_ids: max_ids_per_slot as usize, state: State::Open })
	}

	pub fn is_submitted(&self) -> bool {
		!matches!(self.state, State::Open)
	}

	pub fn pending(&self) -> Option<&FeedbackRecord> {
		match &self.state {
			State::Pending(record) => Some(record),
			State::Open | State::Submitted => None,
		}
	}

	/// Validates the ranking and builds the record without sending it.
	pub fn prepare(
		&self,
		ranking: &[Slot],
		comment: Option<&str>,
		submitted_at: OffsetDateTime,
	) -> Result<FeedbackRecord> {
		let ranking = Ranking::new(ranking)?;
		let mut slot_ids = SlotIds::default();

		if let Some(slots) = &self.result.slots {
			for slot in Slot::ALL {
				slot_ids.set(slot, slots.get(slot).ids(self.max_ids));
			}
		}

		Ok(FeedbackRecord {
			query: self.result.query.clone(),
			ranking,
			ranked_pipelines: ranking.to_pipelines(&self.layout),
			layout: self.layout,
			slot_ids,
			comment: comment.map(str::trim).filter(|text| !text.is_empty()).map(str::to_string),
			submitted_at,
		})
	}

	/// Sends the judgement once. A delivery failure is not an error: the record stays pending
	/// and the receipt is acknowledged locally.
	pub async fn submit(
		&mut self,
		sink: &dyn FeedbackSink,
		cfg: &Feedback,
		ranking: &[Slot],
		comment: Option<&str>,
	) -> Result<FeedbackReceipt> {
		if self.is_submitted() {
			return Err(Error::FeedbackAlreadySubmitted);
		}

		let record = self.prepare(ranking, comment, OffsetDateTime::now_utc())?;

		Ok(self.send(sink, cfg, record).await)
	}

	pub async fn retry_pending(
		&mut self,
		sink: &dyn FeedbackSink,
		cfg: &Feedback,
	) -> Result<FeedbackReceipt> {
		let Some(record) = self.pending().cloned() else {
			return Err(Error::FeedbackUnavailable {
				message: "No feedback submission is pending.".to_string(),
			});
		};

		Ok(self.send(sink, cfg, record).await)
	}

	async fn send(
		&mut self,
		sink: &dyn FeedbackSink,
		cfg: &Feedback,
		record: FeedbackRecord,
	) -> FeedbackReceipt {
		match sink.submit(cfg, &record).await {
			Ok(status) => {
				tracing::info!(
					key = %self.result.key,
					choice = %record.ranking.first(),
					"Feedback submitted."
				);

				self.state = State::Submitted;

				FeedbackReceipt {
					record,
					acknowledgement: Acknowledgement::Remote { status: status.status },
				}
			},
			Err(err) => {
				tracing::warn!(
					key = %self.result.key,
					error = %err,
					"Feedback submission failed. Keeping it for retry."
				);

				self.state = State::Pending(record.clone());

				FeedbackReceipt {
					record,
					acknowledgement: Acknowledgement::LocalOnly { reason: err.to_string() },
				}
			},
		}
	}
}
