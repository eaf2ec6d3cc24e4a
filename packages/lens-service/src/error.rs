use serde::Serialize;

use lens_domain::{PipelineId, PipelineResult};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// What a dispatched pipeline call settled to.
pub type Outcome = std::result::Result<PipelineResult, Failure>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid query: {message}")]
	InvalidQuery { message: String },
	#[error("Invalid ranking: {message}")]
	InvalidRanking { message: String },
	#[error("Feedback unavailable: {message}")]
	FeedbackUnavailable { message: String },
	#[error("Feedback has already been submitted for this result.")]
	FeedbackAlreadySubmitted,
	#[error("Provider error: {message}")]
	Provider { message: String },
}
impl From<lens_domain::Error> for Error {
	fn from(err: lens_domain::Error) -> Self {
		match err {
			lens_domain::Error::InvalidRanking { .. } | lens_domain::Error::UnknownSlot { .. } => {
				Self::InvalidRanking { message: err.to_string() }
			},
			other => Self::InvalidQuery { message: other.to_string() },
		}
	}
}

impl From<lens_providers::Error> for Error {
	fn from(err: lens_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}

/// Failure taxonomy for pipeline work.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Failure {
	/// A single pipeline call was rejected or timed out.
	#[error("Pipeline {pipeline} failed: {message}")]
	NetworkFailure { pipeline: PipelineId, message: String },
	/// The primary pipeline succeeded but some secondaries did not.
	#[error("Degraded result; failed pipelines: {pipelines:?}.")]
	PartialDegradation { pipelines: Vec<PipelineId> },
	/// The primary pipeline failed. Nothing was committed.
	#[error("Search failed: {message}")]
	TotalFailure { message: String },
}
