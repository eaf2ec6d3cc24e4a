use serde::Deserialize;
use serde_json::{Map, Value};

pub const ASSISTED_REQUIRES_ABSTRACTS: &str = "abstracts";
pub const ASSISTED_REQUIRES_ABSTRACTS_AND_KEYWORDS: &str = "abstracts_and_keywords";

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub pipelines: Pipelines,
	pub feedback: Feedback,
	#[serde(default)]
	pub evaluation: Evaluation,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Pipelines {
	pub embedding: PipelineEndpoint,
	pub keyword: PipelineEndpoint,
	pub assisted_keyword: PipelineEndpoint,
}

/// One remote search endpoint.
#[derive(Clone, Debug, Deserialize)]
pub struct PipelineEndpoint {
	pub api_base: String,
	/// Optional bearer token. Blank values are treated as absent.
	#[serde(default)]
	pub api_key: Option<String>,
	pub path: String,
	/// Result count requested per call. The embedding pipeline pages with this size; the keyword
	/// pipelines return a single set of this size.
	pub page_size: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Feedback {
	pub api_base: String,
	#[serde(default)]
	pub api_key: Option<String>,
	pub path: String,
	pub timeout_ms: u64,
	#[serde(default = "default_max_ids_per_slot")]
	pub max_ids_per_slot: u32,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Evaluation {
	pub enabled: bool,
	/// Upper bound on how long any dispatched pipeline call may stay unsettled.
	pub settle_timeout_ms: u64,
	/// Which inputs must be non-empty before the assisted keyword pipeline runs.
	pub assisted_requires: String,
}
impl Default for Evaluation {
	fn default() -> Self {
		Self {
			enabled: false,
			settle_timeout_ms: 30_000,
			assisted_requires: ASSISTED_REQUIRES_ABSTRACTS.to_string(),
		}
	}
}

fn default_max_ids_per_slot() -> u32 {
	30
}
