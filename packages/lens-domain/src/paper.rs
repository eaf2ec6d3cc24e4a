use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a retrieval pipeline. Serialized names match the identifiers recorded in
/// evaluation feedback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PipelineId {
	#[serde(rename = "embedding")]
	Embedding,
	#[serde(rename = "raw_openalex")]
	Keyword,
	#[serde(rename = "gemini_openalex")]
	AssistedKeyword,
}
impl PipelineId {
	pub const ALL: [Self; 3] = [Self::Embedding, Self::Keyword, Self::AssistedKeyword];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Embedding => "embedding",
			Self::Keyword => "raw_openalex",
			Self::AssistedKeyword => "gemini_openalex",
		}
	}

	pub fn is_primary(self) -> bool {
		matches!(self, Self::Embedding)
	}
}
impl fmt::Display for PipelineId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaperSummary {
	pub id: String,
	pub title: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub venue: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub year: Option<i32>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub authors: Vec<String>,
	#[serde(default, rename = "abstract", skip_serializing_if = "Option::is_none")]
	pub abstract_text: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub url: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub doi: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub similarity: Option<f32>,
}

/// One pipeline's answer for one request. Failed requests are represented by
/// [`PipelineResult::default`].
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PipelineResult {
	pub items: Vec<PaperSummary>,
	pub count: u64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub next_page: Option<u32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub previous_page: Option<u32>,
}
impl PipelineResult {
	pub fn is_empty(&self) -> bool {
		self.items.is_empty()
	}

	/// Identifiers of the first `limit` items, in rank order.
	pub fn ids(&self, limit: usize) -> Vec<String> {
		self.items.iter().take(limit).map(|item| item.id.clone()).collect()
	}
}
