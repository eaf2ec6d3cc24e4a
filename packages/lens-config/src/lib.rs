mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	ASSISTED_REQUIRES_ABSTRACTS, ASSISTED_REQUIRES_ABSTRACTS_AND_KEYWORDS, Config, Evaluation,
	Feedback, PipelineEndpoint, Pipelines, Service,
};

use std::{fs, path::Path};

use serde_json::{Map, Value};

const MAX_PAGE_SIZE: u32 = 200;

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	parse(&raw).map_err(|err| match err {
		Error::ParseConfig { source, .. } => Error::ParseConfig { path: path.to_path_buf(), source },
		other => other,
	})
}

pub fn parse(raw: &str) -> Result<Config> {
	let mut cfg: Config = toml::from_str(raw)
		.map_err(|err| Error::ParseConfig { path: Default::default(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}

	for (label, endpoint) in [
		("pipelines.embedding", &cfg.pipelines.embedding),
		("pipelines.keyword", &cfg.pipelines.keyword),
		("pipelines.assisted_keyword", &cfg.pipelines.assisted_keyword),
	] {
		validate_endpoint(label, &endpoint.api_base, &endpoint.path, endpoint.timeout_ms)?;
		validate_headers(label, &endpoint.default_headers)?;

		if endpoint.page_size == 0 || endpoint.page_size > MAX_PAGE_SIZE {
			return Err(Error::Validation {
				message: format!("{label}.page_size must be in the range 1-{MAX_PAGE_SIZE}."),
			});
		}
	}

	validate_endpoint(
		"feedback",
		&cfg.feedback.api_base,
		&cfg.feedback.path,
		cfg.feedback.timeout_ms,
	)?;
	validate_headers("feedback", &cfg.feedback.default_headers)?;

	if cfg.feedback.max_ids_per_slot == 0 {
		return Err(Error::Validation {
			message: "feedback.max_ids_per_slot must be greater than zero.".to_string(),
		});
	}
	if cfg.evaluation.settle_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "evaluation.settle_timeout_ms must be greater than zero.".to_string(),
		});
	}
	if !matches!(
		cfg.evaluation.assisted_requires.as_str(),
		ASSISTED_REQUIRES_ABSTRACTS | ASSISTED_REQUIRES_ABSTRACTS_AND_KEYWORDS
	) {
		return Err(Error::Validation {
			message: "evaluation.assisted_requires must be one of abstracts or abstracts_and_keywords."
				.to_string(),
		});
	}

	Ok(())
}

fn validate_endpoint(label: &str, api_base: &str, path: &str, timeout_ms: u64) -> Result<()> {
	if api_base.trim().is_empty() {
		return Err(Error::Validation { message: format!("{label}.api_base must be non-empty.") });
	}
	if !path.starts_with('/') {
		return Err(Error::Validation { message: format!("{label}.path must start with '/'.") });
	}
	if timeout_ms == 0 {
		return Err(Error::Validation {
			message: format!("{label}.timeout_ms must be greater than zero."),
		});
	}

	Ok(())
}

fn validate_headers(label: &str, headers: &Map<String, Value>) -> Result<()> {
	if headers.values().any(|value| !value.is_string()) {
		return Err(Error::Validation {
			message: format!("{label}.default_headers values must be strings."),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	for endpoint in [
		&mut cfg.pipelines.embedding,
		&mut cfg.pipelines.keyword,
		&mut cfg.pipelines.assisted_keyword,
	] {
		normalize_base(&mut endpoint.api_base);
		normalize_key(&mut endpoint.api_key);
	}

	normalize_base(&mut cfg.feedback.api_base);
	normalize_key(&mut cfg.feedback.api_key);

	cfg.evaluation.assisted_requires = cfg.evaluation.assisted_requires.trim().to_string();
}

fn normalize_base(api_base: &mut String) {
	let trimmed = api_base.trim().trim_end_matches('/');

	*api_base = trimmed.to_string();
}

fn normalize_key(api_key: &mut Option<String>) {
	if api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false) {
		*api_key = None;
	}
}
