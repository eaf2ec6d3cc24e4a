pub mod aggregator;
pub mod controller;
pub mod dedup;
pub mod feedback;
pub mod guard;
pub mod layout;
pub mod session;

mod error;
mod runner;

pub use aggregator::{CompositeResult, Mode, Readiness, ReadinessAggregator, SlotResults};
pub use controller::{AssistedPrecondition, Controller, ControllerSettings};
pub use dedup::RequestDeduplicator;
pub use error::{Error, Failure, Outcome, Result};
pub use feedback::{Acknowledgement, FeedbackReceipt, FeedbackRecorder};
pub use guard::{Generation, StaleResponseGuard};
pub use layout::LayoutRandomizer;
pub use lens_providers::feedback::FeedbackStatus;
pub use runner::{AssistedKeywordRequest, EmbeddingRequest, KeywordRequest};
pub use session::{DiscoverySession, Snapshot};

use std::{future::Future, pin::Pin, sync::Arc};

use lens_config::{Feedback, PipelineEndpoint};
use lens_domain::{FeedbackRecord, PipelineResult};
use lens_providers::search;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingSearch
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		cfg: &'a PipelineEndpoint,
		request: &'a EmbeddingRequest,
	) -> BoxFuture<'a, Result<PipelineResult>>;
}

pub trait KeywordSearch
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		cfg: &'a PipelineEndpoint,
		request: &'a KeywordRequest,
	) -> BoxFuture<'a, Result<PipelineResult>>;
}

pub trait AssistedKeywordSearch
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		cfg: &'a PipelineEndpoint,
		request: &'a AssistedKeywordRequest,
	) -> BoxFuture<'a, Result<PipelineResult>>;
}

pub trait FeedbackSink
where
	Self: Send + Sync,
{
	fn submit<'a>(
		&'a self,
		cfg: &'a Feedback,
		record: &'a FeedbackRecord,
	) -> BoxFuture<'a, Result<FeedbackStatus>>;
}

#[derive(Clone)]
pub struct Collaborators {
	pub embedding: Arc<dyn EmbeddingSearch>,
	pub keyword: Arc<dyn KeywordSearch>,
	pub assisted_keyword: Arc<dyn AssistedKeywordSearch>,
	pub feedback: Arc<dyn FeedbackSink>,
}
impl Collaborators {
	pub fn new(
		embedding: Arc<dyn EmbeddingSearch>,
		keyword: Arc<dyn KeywordSearch>,
		assisted_keyword: Arc<dyn AssistedKeywordSearch>,
		feedback: Arc<dyn FeedbackSink>,
	) -> Self {
		Self { embedding, keyword, assisted_keyword, feedback }
	}
}
impl Default for Collaborators {
	fn default() -> Self {
		let http = Arc::new(HttpCollaborators);

		Self {
			embedding: http.clone(),
			keyword: http.clone(),
			assisted_keyword: http.clone(),
			feedback: http,
		}
	}
}

struct HttpCollaborators;
impl EmbeddingSearch for HttpCollaborators {
	fn search<'a>(
		&'a self,
		cfg: &'a PipelineEndpoint,
		request: &'a EmbeddingRequest,
	) -> BoxFuture<'a, Result<PipelineResult>> {
		Box::pin(async move {
			Ok(search::embedding(cfg, &request.query, request.page, request.page_size).await?)
		})
	}
}
impl KeywordSearch for HttpCollaborators {
	fn search<'a>(
		&'a self,
		cfg: &'a PipelineEndpoint,
		request: &'a KeywordRequest,
	) -> BoxFuture<'a, Result<PipelineResult>> {
		Box::pin(async move {
			Ok(search::keyword(cfg, &request.keywords, request.page_size, request.years).await?)
		})
	}
}
impl AssistedKeywordSearch for HttpCollaborators {
	fn search<'a>(
		&'a self,
		cfg: &'a PipelineEndpoint,
		request: &'a AssistedKeywordRequest,
	) -> BoxFuture<'a, Result<PipelineResult>> {
		Box::pin(async move {
			Ok(search::assisted_keyword(
				cfg,
				&request.abstracts,
				&request.keywords,
				request.page_size,
				request.years,
			)
			.await?)
		})
	}
}
impl FeedbackSink for HttpCollaborators {
	fn submit<'a>(
		&'a self,
		cfg: &'a Feedback,
		record: &'a FeedbackRecord,
	) -> BoxFuture<'a, Result<FeedbackStatus>> {
		Box::pin(async move { Ok(lens_providers::feedback::submit(cfg, record).await?) })
	}
}
