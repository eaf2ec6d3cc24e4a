use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{Error, PipelineId, Result};

pub const MIN_YEAR: i32 = 1900;

/// Query fields as they arrive from the input boundary, before any cleanup.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawQuery {
	#[serde(default)]
	pub abstracts: Vec<String>,
	#[serde(default)]
	pub keywords: Vec<String>,
	#[serde(default)]
	pub year_min: Option<String>,
	#[serde(default)]
	pub year_max: Option<String>,
	#[serde(default)]
	pub page: Option<u32>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct YearBounds {
	pub min: Option<i32>,
	pub max: Option<i32>,
}
impl YearBounds {
	pub fn is_unbounded(&self) -> bool {
		self.min.is_none() && self.max.is_none()
	}
}

/// A normalized search query.
///
/// Abstract order is significant. Keyword order is kept for display only; keys treat keywords
/// as a set.
#[derive(Clone, Debug, Serialize)]
pub struct Query {
	abstracts: Vec<String>,
	keywords: Vec<String>,
	year_min: Option<i32>,
	year_max: Option<i32>,
	page: u32,
}
impl Query {
	pub fn normalize(raw: RawQuery) -> Result<Self> {
		let abstracts = raw
			.abstracts
			.into_iter()
			.map(|text| text.trim().to_string())
			.filter(|text| !text.is_empty())
			.collect();
		let mut keywords: Vec<String> = Vec::new();

		for entry in &raw.keywords {
			for part in entry.split(',') {
				let part = part.trim();

				if !part.is_empty() && !keywords.iter().any(|seen| seen == part) {
					keywords.push(part.to_string());
				}
			}
		}

		let year_min = parse_year("year_min", raw.year_min.as_deref())?;
		let year_max = parse_year("year_max", raw.year_max.as_deref())?;

		if let (Some(min), Some(max)) = (year_min, year_max)
			&& min > max
		{
			return Err(Error::InvalidYearRange { min, max });
		}

		let page = match raw.page {
			None => 1,
			Some(0) => return Err(Error::InvalidPage),
			Some(page) => page,
		};

		Ok(Self { abstracts, keywords, year_min, year_max, page })
	}

	/// Returns the same query pointed at another page of primary results.
	pub fn with_page(&self, page: u32) -> Result<Self> {
		if page == 0 {
			return Err(Error::InvalidPage);
		}

		Ok(Self { page, ..self.clone() })
	}

	pub fn abstracts(&self) -> &[String] {
		&self.abstracts
	}

	pub fn keywords(&self) -> &[String] {
		&self.keywords
	}

	pub fn years(&self) -> YearBounds {
		YearBounds { min: self.year_min, max: self.year_max }
	}

	pub fn page(&self) -> u32 {
		self.page
	}

	pub fn is_empty(&self) -> bool {
		self.abstracts.is_empty() && self.keywords.is_empty()
	}

	/// Key covering every field of the query.
	pub fn key(&self) -> QueryKey {
		QueryKey::build("query", self.material(true, true, true))
	}

	/// Key covering only the fields the given pipeline consumes.
	///
	/// The page is part of the embedding key alone; the keyword pipeline ignores abstracts.
	pub fn key_for(&self, pipeline: PipelineId) -> QueryKey {
		let material = match pipeline {
			PipelineId::Embedding => self.material(true, true, true),
			PipelineId::Keyword => self.material(false, true, false),
			PipelineId::AssistedKeyword => self.material(true, true, false),
		};

		QueryKey::build(pipeline.as_str(), material)
	}

	fn material(&self, abstracts: bool, keywords: bool, page: bool) -> Value {
		let mut sorted: Vec<&str> = self.keywords.iter().map(String::as_str).collect();

		sorted.sort_unstable();

		let mut material = json!({
			"year_min": self.year_min,
			"year_max": self.year_max,
		});

		if abstracts {
			material["abstracts"] = json!(self.abstracts);
		}
		if keywords {
			material["keywords"] = json!(sorted);
		}
		if page {
			material["page"] = json!(self.page);
		}

		material
	}
}

/// Canonical comparison key derived from a [`Query`].
///
/// Built from a JSON object whose keys serialize in sorted order, so structurally equal queries
/// always yield byte-identical keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct QueryKey(String);
impl QueryKey {
	fn build(scope: &str, material: Value) -> Self {
		Self(format!("{scope}:{material}"))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl fmt::Display for QueryKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

fn parse_year(field: &'static str, raw: Option<&str>) -> Result<Option<i32>> {
	let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
		return Ok(None);
	};
	let year: i32 =
		raw.parse().map_err(|_| Error::InvalidYear { field, value: raw.to_string() })?;

	if year < MIN_YEAR {
		return Err(Error::InvalidYear { field, value: raw.to_string() });
	}

	Ok(Some(year))
}
