use std::{sync::Arc, time::Duration};

use lens_config::Config;
use lens_domain::{PipelineId, PipelineResult, Query, YearBounds};

use crate::{
	Collaborators, Failure, Result,
	controller::{Completion, Dispatch},
};

#[derive(Clone, Debug)]
pub struct EmbeddingRequest {
	pub query: Query,
	pub page: u32,
	pub page_size: u32,
}

#[derive(Clone, Debug)]
pub struct KeywordRequest {
	pub keywords: Vec<String>,
	pub page_size: u32,
	pub years: YearBounds,
}

#[derive(Clone, Debug)]
pub struct AssistedKeywordRequest {
	pub abstracts: Vec<String>,
	pub keywords: Vec<String>,
	pub page_size: u32,
	pub years: YearBounds,
}

/// Performs one dispatch. Errors and elapsed settle timeouts become failed outcomes, so every
/// dispatch produces exactly one completion.
pub(crate) async fn run(
	collaborators: Collaborators,
	cfg: Arc<Config>,
	dispatch: Dispatch,
) -> Completion {
	let pipeline = dispatch.pipeline;
	let generation = dispatch.generation;
	let limit = Duration::from_millis(cfg.evaluation.settle_timeout_ms);
	let outcome = match tokio::time::timeout(limit, invoke(&collaborators, &cfg, &dispatch)).await {
		Ok(Ok(result)) => {
			tracing::debug!(
				pipeline = %pipeline,
				generation = generation.value(),
				items = result.items.len(),
				"Pipeline request settled."
			);

			Ok(result)
		},
		Ok(Err(err)) => {
			tracing::warn!(
				pipeline = %pipeline,
				generation = generation.value(),
				error = %err,
				"Pipeline request failed."
			);

			Err(Failure::NetworkFailure { pipeline, message: err.to_string() })
		},
		Err(_) => {
			tracing::warn!(
				pipeline = %pipeline,
				generation = generation.value(),
				timeout_ms = cfg.evaluation.settle_timeout_ms,
				"Pipeline request timed out."
			);

			Err(Failure::NetworkFailure {
				pipeline,
				message: format!("No response within {} ms.", cfg.evaluation.settle_timeout_ms),
			})
		},
	};

	Completion { pipeline, generation, key: dispatch.key, outcome }
}

async fn invoke(
	collaborators: &Collaborators,
	cfg: &Config,
	dispatch: &Dispatch,
) -> Result<PipelineResult> {
	let query = &dispatch.query;

	match dispatch.pipeline {
		PipelineId::Embedding => {
			let endpoint = &cfg.pipelines.embedding;
			let request = EmbeddingRequest {
				query: query.clone(),
				page: query.page(),
				page_size: endpoint.page_size,
			};

			collaborators.embedding.search(endpoint, &request).await
		},
		PipelineId::Keyword => {
			let endpoint = &cfg.pipelines.keyword;
			let request = KeywordRequest {
				keywords: query.keywords().to_vec(),
				page_size: endpoint.page_size,
				years: query.years(),
			};

			collaborators.keyword.search(endpoint, &request).await
		},
		PipelineId::AssistedKeyword => {
			let endpoint = &cfg.pipelines.assisted_keyword;
			let request = AssistedKeywordRequest {
				abstracts: query.abstracts().to_vec(),
				keywords: query.keywords().to_vec(),
				page_size: endpoint.page_size,
				years: query.years(),
			};

			collaborators.assisted_keyword.search(endpoint, &request).await
		},
	}
}
