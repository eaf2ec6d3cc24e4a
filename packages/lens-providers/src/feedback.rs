use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use lens_config::Feedback;
use lens_domain::{FeedbackRecord, Layout, PipelineId, Slot};

use crate::Result;

const DEFAULT_STATUS: &str = "ok";

#[derive(Debug, Serialize)]
struct FeedbackBody<'a> {
	query: FeedbackQuery<'a>,
	ranking: [Slot; 3],
	ranked_pipelines: [PipelineId; 3],
	choice: Slot,
	comment: Option<&'a str>,
	layout: &'a Layout,
	left_ids: &'a [String],
	middle_ids: &'a [String],
	right_ids: &'a [String],
	#[serde(with = "lens_domain::time_serde")]
	submitted_at: OffsetDateTime,
}

#[derive(Debug, Serialize)]
struct FeedbackQuery<'a> {
	abstracts: &'a [String],
	keywords: &'a [String],
	#[serde(skip_serializing_if = "Option::is_none")]
	year_min: Option<i32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	year_max: Option<i32>,
}

/// Acknowledgement returned by the feedback endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackStatus {
	pub status: String,
}

pub async fn submit(cfg: &Feedback, record: &FeedbackRecord) -> Result<FeedbackStatus> {
	let client = crate::client(cfg.timeout_ms)?;
	let url = crate::endpoint_url(&cfg.api_base, &cfg.path);
	let body = feedback_body(record);
	let res = client
		.post(url)
		.headers(crate::auth_headers(cfg.api_key.as_deref(), &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let raw = crate::check_status(res).await?.text().await?;

	Ok(parse_status(&raw))
}

fn feedback_body(record: &FeedbackRecord) -> FeedbackBody<'_> {
	let years = record.query.years();

	FeedbackBody {
		query: FeedbackQuery {
			abstracts: record.query.abstracts(),
			keywords: record.query.keywords(),
			year_min: years.min,
			year_max: years.max,
		},
		ranking: record.ranking.slots(),
		ranked_pipelines: record.ranked_pipelines,
		choice: record.ranking.first(),
		comment: record.comment.as_deref(),
		layout: &record.layout,
		left_ids: record.slot_ids.get(Slot::Left),
		middle_ids: record.slot_ids.get(Slot::Middle),
		right_ids: record.slot_ids.get(Slot::Right),
		submitted_at: record.submitted_at,
	}
}

// Empty (204) and non-JSON bodies count as accepted.
fn parse_status(raw: &str) -> FeedbackStatus {
	serde_json::from_str::<FeedbackStatus>(raw)
		.unwrap_or_else(|_| FeedbackStatus { status: DEFAULT_STATUS.to_string() })
}
