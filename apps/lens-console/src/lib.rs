use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre;
use tracing_subscriber::EnvFilter;

use lens_domain::{RawQuery, Ranking};
use lens_service::{Collaborators, DiscoverySession, Readiness};

/// Runs one discovery query against the configured pipelines and prints the committed result.
#[derive(Debug, Parser)]
#[command(
	version = lens_cli::VERSION,
	rename_all = "kebab",
	styles = lens_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	#[arg(long = "abstract", short = 'a', value_name = "TEXT")]
	pub abstracts: Vec<String>,
	/// Comma-separated values are split into separate keywords.
	#[arg(long = "keyword", short = 'k', value_name = "TEXT")]
	pub keywords: Vec<String>,
	#[arg(long, value_name = "YEAR")]
	pub year_min: Option<String>,
	#[arg(long, value_name = "YEAR")]
	pub year_max: Option<String>,
	#[arg(long, value_name = "N")]
	pub page: Option<u32>,
	/// Compare all pipelines side by side, overriding `evaluation.enabled`.
	#[arg(long)]
	pub evaluation: bool,
	/// Slots from most to least relevant, for example `right,left,middle`.
	#[arg(long, value_name = "SLOTS")]
	pub rank: Option<Ranking>,
	#[arg(long, value_name = "TEXT", requires = "rank")]
	pub comment: Option<String>,
}
impl Args {
	pub fn raw_query(&self) -> RawQuery {
		RawQuery {
			abstracts: self.abstracts.clone(),
			keywords: self.keywords.clone(),
			year_min: self.year_min.clone(),
			year_max: self.year_max.clone(),
			page: self.page,
		}
	}
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let mut config = lens_config::load(&args.config)?;
	let filter = EnvFilter::new(config.service.log_level.clone());

	tracing_subscriber::fmt().with_env_filter(filter).init();

	if args.evaluation {
		config.evaluation.enabled = true;
	}

	let mut session = DiscoverySession::new(config, Collaborators::default());

	tracing::info!(evaluation = session.evaluation_mode(), "Session started.");

	if session.submit_query(args.raw_query())? == Readiness::Idle {
		return Err(eyre::eyre!("Provide at least one --abstract or --keyword."));
	}

	let snapshot = session.settle().await;

	tracing::info!(readiness = ?snapshot.readiness, "Session settled.");

	if let Some(failure) = &snapshot.failure {
		return Err(eyre::eyre!("{failure}"));
	}

	let committed = snapshot.committed.ok_or_else(|| eyre::eyre!("No result was committed."))?;
	let json = serde_json::to_string_pretty(committed.as_ref())?;

	println!("{json}");

	if let Some(ranking) = args.rank {
		let receipt = session.submit_feedback(&ranking.slots(), args.comment.as_deref()).await?;
		let json = serde_json::to_string_pretty(&receipt)?;

		println!("{json}");
	}

	Ok(())
}
