use serde::{Deserialize, Serialize};
use serde_json::Value;

use lens_config::PipelineEndpoint;
use lens_domain::{PaperSummary, PipelineResult, Query, YearBounds};

use crate::{Error, Result};

#[derive(Debug, Serialize)]
struct EmbeddingSearchBody<'a> {
	#[serde(skip_serializing_if = "is_empty")]
	abstracts: &'a [String],
	#[serde(skip_serializing_if = "is_empty")]
	keywords: &'a [String],
	#[serde(skip_serializing_if = "Option::is_none")]
	year_min: Option<i32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	year_max: Option<i32>,
}

#[derive(Debug, Serialize)]
struct KeywordSearchBody<'a> {
	#[serde(skip_serializing_if = "Option::is_none")]
	abstracts: Option<&'a [String]>,
	keywords: &'a [String],
	per_page: u32,
	#[serde(skip_serializing_if = "Option::is_none")]
	year_min: Option<i32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	year_max: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct SearchResponseWire {
	#[serde(default)]
	count: Option<u64>,
	#[serde(default)]
	next: Option<String>,
	#[serde(default)]
	previous: Option<String>,
	results: Vec<PaperWire>,
}

#[derive(Debug, Deserialize)]
struct PaperWire {
	#[serde(default)]
	id: Option<Value>,
	#[serde(default, alias = "display_name")]
	title: Option<String>,
	#[serde(default)]
	venue: Option<String>,
	#[serde(default)]
	year: Option<i32>,
	#[serde(default)]
	authors: Vec<String>,
	#[serde(default, rename = "abstract")]
	abstract_text: Option<Value>,
	#[serde(default)]
	url: Option<String>,
	#[serde(default)]
	doi: Option<String>,
	#[serde(default)]
	similarity: Option<f32>,
}

/// Runs the paged embedding search.
pub async fn embedding(
	cfg: &PipelineEndpoint,
	query: &Query,
	page: u32,
	page_size: u32,
) -> Result<PipelineResult> {
	let client = crate::client(cfg.timeout_ms)?;
	let url = crate::endpoint_url(&cfg.api_base, &cfg.path);
	let years = query.years();
	let body = EmbeddingSearchBody {
		abstracts: query.abstracts(),
		keywords: query.keywords(),
		year_min: years.min,
		year_max: years.max,
	};
	let res = client
		.post(url)
		.query(&[("page", page), ("per_page", page_size)])
		.headers(crate::auth_headers(cfg.api_key.as_deref(), &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = crate::check_status(res).await?.json().await?;

	parse_paged_response(json, page)
}

/// Runs the plain keyword search. Returns one unpaged result set.
pub async fn keyword(
	cfg: &PipelineEndpoint,
	keywords: &[String],
	page_size: u32,
	years: YearBounds,
) -> Result<PipelineResult> {
	let body = KeywordSearchBody {
		abstracts: None,
		keywords,
		per_page: page_size,
		year_min: years.min,
		year_max: years.max,
	};

	post_result_set(cfg, &body).await
}

/// Runs the keyword search seeded with phrases an LLM extracts from the abstracts.
pub async fn assisted_keyword(
	cfg: &PipelineEndpoint,
	abstracts: &[String],
	keywords: &[String],
	page_size: u32,
	years: YearBounds,
) -> Result<PipelineResult> {
	let body = KeywordSearchBody {
		abstracts: Some(abstracts),
		keywords,
		per_page: page_size,
		year_min: years.min,
		year_max: years.max,
	};

	post_result_set(cfg, &body).await
}

async fn post_result_set(
	cfg: &PipelineEndpoint,
	body: &KeywordSearchBody<'_>,
) -> Result<PipelineResult> {
	let client = crate::client(cfg.timeout_ms)?;
	let url = crate::endpoint_url(&cfg.api_base, &cfg.path);
	let res = client
		.post(url)
		.headers(crate::auth_headers(cfg.api_key.as_deref(), &cfg.default_headers)?)
		.json(body)
		.send()
		.await?;
	let json: Value = crate::check_status(res).await?.json().await?;

	parse_result_set(json)
}

fn parse_paged_response(json: Value, page: u32) -> Result<PipelineResult> {
	let wire: SearchResponseWire = serde_json::from_value(json)?;
	let has_next = wire.next.as_deref().is_some_and(|link| !link.trim().is_empty());
	let has_previous = wire.previous.as_deref().is_some_and(|link| !link.trim().is_empty());
	let items = convert_items(wire.results)?;
	let count = wire.count.unwrap_or(items.len() as u64);

	Ok(PipelineResult {
		items,
		count,
		next_page: has_next.then(|| page.saturating_add(1)),
		previous_page: (has_previous && page > 1).then(|| page - 1),
	})
}

fn parse_result_set(json: Value) -> Result<PipelineResult> {
	let wire: SearchResponseWire = serde_json::from_value(json)?;
	let items = convert_items(wire.results)?;
	let count = wire.count.unwrap_or(items.len() as u64);

	Ok(PipelineResult { items, count, next_page: None, previous_page: None })
}

fn convert_items(results: Vec<PaperWire>) -> Result<Vec<PaperSummary>> {
	results.into_iter().enumerate().map(|(index, paper)| convert_paper(index, paper)).collect()
}

fn convert_paper(index: usize, paper: PaperWire) -> Result<PaperSummary> {
	let id = match paper.id {
		Some(Value::String(id)) if !id.trim().is_empty() => id.trim().to_string(),
		Some(Value::Number(id)) => id.to_string(),
		_ => {
			return Err(Error::InvalidResponse {
				message: format!("Search result {index} is missing an id."),
			});
		},
	};
	let abstract_text = match paper.abstract_text {
		Some(Value::String(text)) => non_blank(Some(text)),
		_ => None,
	};

	Ok(PaperSummary {
		id,
		title: paper.title.unwrap_or_default().trim().to_string(),
		venue: non_blank(paper.venue),
		year: paper.year,
		authors: paper.authors.into_iter().filter(|name| !name.trim().is_empty()).collect(),
		abstract_text,
		url: non_blank(paper.url),
		doi: non_blank(paper.doi),
		similarity: paper.similarity,
	})
}

fn non_blank(value: Option<String>) -> Option<String> {
	value.map(|text| text.trim().to_string()).filter(|text| !text.is_empty())
}

fn is_empty(values: &&[String]) -> bool {
	values.is_empty()
}
