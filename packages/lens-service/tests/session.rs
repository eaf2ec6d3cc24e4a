use std::{
	collections::{HashMap, VecDeque},
	sync::{
		Arc, Mutex,
		atomic::{AtomicUsize, Ordering},
	},
};

use tokio::sync::oneshot;

use lens_config::{Config, Feedback, PipelineEndpoint};
use lens_domain::{FeedbackRecord, Layout, PaperSummary, PipelineId, PipelineResult, RawQuery, Slot};
use lens_service::{
	Acknowledgement, AssistedKeywordRequest, AssistedKeywordSearch, BoxFuture, Collaborators,
	DiscoverySession, EmbeddingRequest, EmbeddingSearch, Error, Failure, FeedbackSink,
	FeedbackStatus, KeywordRequest, KeywordSearch, Mode, Readiness, Result,
};

type Reply = BoxFuture<'static, Result<PipelineResult>>;

fn papers(prefix: &str, n: usize) -> PipelineResult {
	PipelineResult {
		items: (0..n)
			.map(|i| PaperSummary {
				id: format!("{prefix}-{i}"),
				title: format!("Paper {prefix} {i}"),
				venue: None,
				year: Some(2020),
				authors: vec!["Ada".to_string()],
				abstract_text: None,
				url: None,
				doi: None,
				similarity: None,
			})
			.collect(),
		count: n as u64,
		next_page: None,
		previous_page: None,
	}
}

fn ok(prefix: &str) -> Reply {
	let result = papers(prefix, 3);

	Box::pin(async move { Ok(result) })
}

fn fail(message: &str) -> Reply {
	let message = message.to_string();

	Box::pin(async move { Err(Error::Provider { message }) })
}

fn gated() -> (oneshot::Sender<Result<PipelineResult>>, Reply) {
	let (tx, rx) = oneshot::channel();
	let reply: Reply = Box::pin(async move {
		rx.await.unwrap_or_else(|_| Err(Error::Provider { message: "gate dropped".to_string() }))
	});

	(tx, reply)
}

fn hang() -> Reply {
	Box::pin(std::future::pending())
}

/// Replays scripted replies in call order, then answers with fresh results. Embedding calls can
/// also be scripted per first abstract, which does not depend on task scheduling order.
struct ScriptedSearch {
	name: &'static str,
	calls: Arc<AtomicUsize>,
	script: Mutex<VecDeque<Reply>>,
	by_abstract: Mutex<HashMap<String, Reply>>,
}
impl ScriptedSearch {
	fn new(name: &'static str) -> Arc<Self> {
		Arc::new(Self {
			name,
			calls: Arc::new(AtomicUsize::new(0)),
			script: Mutex::default(),
			by_abstract: Mutex::default(),
		})
	}

	fn push(&self, reply: Reply) {
		self.script.lock().expect("script lock poisoned").push_back(reply);
	}

	fn push_for(&self, abstract_text: &str, reply: Reply) {
		self.by_abstract
			.lock()
			.expect("script lock poisoned")
			.insert(abstract_text.to_string(), reply);
	}

	fn count(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	fn reply(&self) -> Reply {
		self.reply_for(None)
	}

	fn reply_for(&self, abstract_text: Option<&String>) -> Reply {
		let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
		let keyed = abstract_text.and_then(|text| {
			self.by_abstract.lock().expect("script lock poisoned").remove(text)
		});
		let scripted =
			keyed.or_else(|| self.script.lock().expect("script lock poisoned").pop_front());

		scripted.unwrap_or_else(|| ok(&format!("{}{call}", self.name)))
	}
}
impl EmbeddingSearch for ScriptedSearch {
	fn search<'a>(
		&'a self,
		_cfg: &'a PipelineEndpoint,
		request: &'a EmbeddingRequest,
	) -> BoxFuture<'a, Result<PipelineResult>> {
		self.reply_for(request.query.abstracts().first())
	}
}
impl KeywordSearch for ScriptedSearch {
	fn search<'a>(
		&'a self,
		_cfg: &'a PipelineEndpoint,
		_request: &'a KeywordRequest,
	) -> BoxFuture<'a, Result<PipelineResult>> {
		self.reply()
	}
}
impl AssistedKeywordSearch for ScriptedSearch {
	fn search<'a>(
		&'a self,
		_cfg: &'a PipelineEndpoint,
		_request: &'a AssistedKeywordRequest,
	) -> BoxFuture<'a, Result<PipelineResult>> {
		self.reply()
	}
}

struct SpySink {
	calls: Arc<AtomicUsize>,
	failures: usize,
	records: Mutex<Vec<FeedbackRecord>>,
}
impl SpySink {
	fn new(failures: usize) -> Arc<Self> {
		Arc::new(Self { calls: Arc::new(AtomicUsize::new(0)), failures, records: Mutex::default() })
	}

	fn count(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	fn records(&self) -> Vec<FeedbackRecord> {
		self.records.lock().expect("records lock poisoned").clone()
	}
}
impl FeedbackSink for SpySink {
	fn submit<'a>(
		&'a self,
		_cfg: &'a Feedback,
		record: &'a FeedbackRecord,
	) -> BoxFuture<'a, Result<FeedbackStatus>> {
		let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

		self.records.lock().expect("records lock poisoned").push(record.clone());

		let reply = if call <= self.failures {
			Err(Error::Provider { message: "feedback endpoint unreachable".to_string() })
		} else {
			Ok(FeedbackStatus { status: "ok".to_string() })
		};

		Box::pin(async move { reply })
	}
}

struct Fixture {
	embedding: Arc<ScriptedSearch>,
	keyword: Arc<ScriptedSearch>,
	assisted: Arc<ScriptedSearch>,
	sink: Arc<SpySink>,
}
impl Fixture {
	fn new() -> Self {
		Self::with_feedback_failures(0)
	}

	fn with_feedback_failures(failures: usize) -> Self {
		Self {
			embedding: ScriptedSearch::new("E"),
			keyword: ScriptedSearch::new("K"),
			assisted: ScriptedSearch::new("A"),
			sink: SpySink::new(failures),
		}
	}

	fn session(&self, evaluation: bool) -> DiscoverySession {
		let collaborators = Collaborators::new(
			self.embedding.clone(),
			self.keyword.clone(),
			self.assisted.clone(),
			self.sink.clone(),
		);

		DiscoverySession::with_layout(config(evaluation), collaborators, layout())
	}

	fn counts(&self) -> [usize; 3] {
		[self.embedding.count(), self.keyword.count(), self.assisted.count()]
	}
}

fn config(evaluation: bool) -> Config {
	let raw = format!(
		r#"
[service]
log_level = "debug"

[pipelines.embedding]
api_base   = "http://127.0.0.1:9/api"
path       = "/search/"
page_size  = 12
timeout_ms = 1000

[pipelines.keyword]
api_base   = "http://127.0.0.1:9/api"
path       = "/openalex-keyword-search/"
page_size  = 30
timeout_ms = 1000

[pipelines.assisted_keyword]
api_base   = "http://127.0.0.1:9/api"
path       = "/openalex-gemini-keyword-search/"
page_size  = 30
timeout_ms = 1000

[feedback]
api_base         = "http://127.0.0.1:9/api"
path             = "/eval-feedback/"
timeout_ms       = 1000
max_ids_per_slot = 2

[evaluation]
enabled           = {evaluation}
settle_timeout_ms = 30000
"#
	);

	lens_config::parse(&raw).expect("Test config must be valid.")
}

// Keyword on the left, embedding in the middle, assisted keyword on the right.
fn layout() -> Layout {
	Layout::from_order([PipelineId::Keyword, PipelineId::Embedding, PipelineId::AssistedKeyword])
		.expect("Test layout must be valid.")
}

fn raw(abstracts: &[&str], keywords: &[&str]) -> RawQuery {
	RawQuery {
		abstracts: abstracts.iter().map(|s| s.to_string()).collect(),
		keywords: keywords.iter().map(|s| s.to_string()).collect(),
		..Default::default()
	}
}

#[tokio::test]
async fn keyword_only_query_runs_embedding_and_keyword() {
	let fixture = Fixture::new();
	let mut session = fixture.session(true);
	let readiness = session.submit_query(raw(&[], &["AI"])).expect("query should be accepted");

	assert_eq!(readiness, Readiness::AwaitingPrimary);

	let snapshot = session.settle().await;
	let committed = snapshot.committed.expect("result should be committed");
	let slots = committed.slots.as_ref().expect("comparative result should carry slots");

	assert_eq!(fixture.counts(), [1, 1, 0]);
	assert_eq!(snapshot.readiness, Readiness::Committed);
	assert_eq!(committed.mode, Mode::Comparative);
	assert_eq!(slots.left.ids(1), ["K1-0"]);
	assert_eq!(slots.middle.ids(1), ["E1-0"]);
	assert!(slots.right.is_empty());
	assert!(committed.degraded.is_empty());
}

#[tokio::test]
async fn identical_queries_run_each_pipeline_once() {
	let fixture = Fixture::new();
	let mut session = fixture.session(true);

	session.submit_query(raw(&["An abstract."], &["AI", "ML"])).expect("first query");
	session.submit_query(raw(&[" An abstract. ", ""], &["ML, AI"])).expect("second query");

	assert_eq!(session.in_flight(), 3);

	session.settle().await;

	assert_eq!(fixture.counts(), [1, 1, 1]);
}

#[tokio::test]
async fn page_change_reinvokes_only_embedding() {
	let fixture = Fixture::new();
	let mut session = fixture.session(true);

	session.submit_query(raw(&["An abstract."], &["AI"])).expect("query should be accepted");
	session.settle().await;

	session.set_page(2).expect("page change should be accepted");

	assert_eq!(session.in_flight(), 1);

	let snapshot = session.settle().await;
	let committed = snapshot.committed.expect("page 2 should be committed");
	let slots = committed.slots.as_ref().expect("comparative result should carry slots");

	assert_eq!(fixture.counts(), [2, 1, 1]);
	assert_eq!(committed.query.page(), 2);
	assert_eq!(committed.primary.ids(1), ["E2-0"]);
	assert_eq!(slots.left.ids(1), ["K1-0"]);
	assert_eq!(slots.right.ids(1), ["A1-0"]);
}

#[tokio::test]
async fn keyword_failure_commits_an_empty_slot() {
	let fixture = Fixture::new();
	let mut session = fixture.session(true);

	fixture.keyword.push(fail("keyword backend down"));
	session.submit_query(raw(&[], &["AI"])).expect("query should be accepted");

	let snapshot = session.settle().await;
	let committed = snapshot.committed.expect("failure of a secondary must not block the commit");
	let slots = committed.slots.as_ref().expect("comparative result should carry slots");

	assert_eq!(snapshot.readiness, Readiness::Committed);
	assert!(snapshot.failure.is_none());
	assert_eq!(committed.primary.ids(1), ["E1-0"]);
	assert!(slots.left.is_empty());
	assert_eq!(committed.degraded, [PipelineId::Keyword]);
	assert!(matches!(committed.degradation(), Some(Failure::PartialDegradation { .. })));
}

#[tokio::test]
async fn out_of_order_responses_never_overwrite_newer_ones() {
	let fixture = Fixture::new();
	let mut session = fixture.session(false);
	let (first_gate, first_reply) = gated();
	let (second_gate, second_reply) = gated();

	fixture.embedding.push_for("first", first_reply);
	fixture.embedding.push_for("second", second_reply);
	session.submit_query(raw(&["first"], &[])).expect("first query");
	session.submit_query(raw(&["second"], &[])).expect("second query");

	second_gate.send(Ok(papers("NEW", 1))).expect("second request should be waiting");

	let snapshot = session.next_update().await.expect("one completion should be applied");
	let committed = snapshot.committed.expect("second query should be committed");

	assert_eq!(committed.primary.ids(1), ["NEW-0"]);
	assert_eq!(committed.query.abstracts(), ["second"]);

	first_gate.send(Ok(papers("OLD", 1))).expect("first request should be waiting");

	let snapshot = session.next_update().await.expect("stale completion should be consumed");
	let committed = snapshot.committed.expect("second query should stay committed");

	assert_eq!(committed.primary.ids(1), ["NEW-0"]);
	assert_eq!(session.in_flight(), 0);
}

#[tokio::test]
async fn comparative_result_is_published_all_at_once() {
	let fixture = Fixture::new();
	let mut session = fixture.session(true);
	let updates = session.subscribe();
	let (keyword_gate, keyword_reply) = gated();
	let (assisted_gate, assisted_reply) = gated();

	fixture.keyword.push(keyword_reply);
	fixture.assisted.push(assisted_reply);
	session.submit_query(raw(&["An abstract."], &["AI"])).expect("query should be accepted");

	let snapshot = session.next_update().await.expect("primary should settle");

	assert_eq!(snapshot.readiness, Readiness::AwaitingSecondary);
	assert!(snapshot.committed.is_none());

	keyword_gate.send(Ok(papers("K", 2))).expect("keyword request should be waiting");

	let snapshot = session.next_update().await.expect("keyword should settle");

	assert_eq!(snapshot.readiness, Readiness::AwaitingSecondary);
	assert!(updates.borrow().committed.is_none());

	assisted_gate.send(Ok(papers("A", 2))).expect("assisted request should be waiting");
	session.settle().await;

	let published = updates.borrow().clone();
	let committed = published.committed.expect("all three pipelines should be committed");
	let slots = committed.slots.as_ref().expect("comparative result should carry slots");

	assert_eq!(published.readiness, Readiness::Committed);
	assert!(!slots.left.is_empty());
	assert!(!slots.middle.is_empty());
	assert!(!slots.right.is_empty());
}

#[tokio::test(start_paused = true)]
async fn hung_secondary_settles_after_the_timeout() {
	let fixture = Fixture::new();
	let mut session = fixture.session(true);

	fixture.assisted.push(hang());
	session.submit_query(raw(&["An abstract."], &["AI"])).expect("query should be accepted");

	let snapshot = session.settle().await;
	let committed = snapshot.committed.expect("timed out secondary must not block the commit");

	assert_eq!(committed.degraded, [PipelineId::AssistedKeyword]);
	assert!(committed.slots.as_ref().is_some_and(|slots| slots.right.is_empty()));
}

#[tokio::test]
async fn primary_failure_keeps_the_previous_result_until_retry() {
	let fixture = Fixture::new();
	let mut session = fixture.session(false);

	session.submit_query(raw(&["first"], &[])).expect("first query");
	session.settle().await;

	fixture.embedding.push(fail("embedding backend down"));
	session.submit_query(raw(&["second"], &[])).expect("second query");

	let snapshot = session.settle().await;
	let committed = snapshot.committed.expect("previous result should stay visible");

	assert_eq!(snapshot.readiness, Readiness::Failed);
	assert!(matches!(snapshot.failure, Some(Failure::TotalFailure { .. })));
	assert_eq!(committed.query.abstracts(), ["first"]);

	assert_eq!(session.retry(), Readiness::AwaitingPrimary);

	let snapshot = session.settle().await;
	let committed = snapshot.committed.expect("retry should commit");

	assert_eq!(snapshot.readiness, Readiness::Committed);
	assert!(snapshot.failure.is_none());
	assert_eq!(committed.query.abstracts(), ["second"]);
	assert_eq!(fixture.embedding.count(), 3);
}

#[tokio::test]
async fn empty_query_clears_the_result() {
	let fixture = Fixture::new();
	let mut session = fixture.session(false);

	session.submit_query(raw(&["first"], &[])).expect("query should be accepted");
	session.settle().await;

	let readiness = session.submit_query(raw(&["  "], &[" , "])).expect("empty query");

	assert_eq!(readiness, Readiness::Idle);
	assert!(session.snapshot().committed.is_none());
	assert_eq!(session.in_flight(), 0);
}

#[tokio::test]
async fn invalid_year_is_rejected_before_dispatch() {
	let fixture = Fixture::new();
	let mut session = fixture.session(true);
	let err = session
		.submit_query(RawQuery { year_min: Some("0".to_string()), ..raw(&["a"], &[]) })
		.expect_err("year 0 must be rejected");

	assert!(matches!(err, Error::InvalidQuery { .. }));
	assert_eq!(fixture.counts(), [0, 0, 0]);
}

#[tokio::test]
async fn evaluation_toggle_dispatches_only_new_secondaries() {
	let fixture = Fixture::new();
	let mut session = fixture.session(false);

	session.submit_query(raw(&["An abstract."], &["AI"])).expect("query should be accepted");
	session.settle().await;

	assert_eq!(session.set_evaluation_mode(true), Readiness::AwaitingSecondary);

	let snapshot = session.settle().await;
	let committed = snapshot.committed.expect("comparative result should be committed");

	assert_eq!(committed.mode, Mode::Comparative);
	assert_eq!(fixture.counts(), [1, 1, 1]);
}

#[tokio::test]
async fn feedback_is_sent_once_with_pipeline_identities() {
	let fixture = Fixture::new();
	let mut session = fixture.session(true);

	session.submit_query(raw(&["An abstract."], &["AI"])).expect("query should be accepted");
	session.settle().await;

	let err = session
		.submit_feedback(&[Slot::Left, Slot::Left, Slot::Right], None)
		.await
		.expect_err("duplicate slots must be rejected");

	assert!(matches!(err, Error::InvalidRanking { .. }));

	let receipt = session
		.submit_feedback(&[Slot::Right, Slot::Middle, Slot::Left], Some(" Right was best. "))
		.await
		.expect("valid ranking should be accepted");

	assert_eq!(receipt.acknowledgement, Acknowledgement::Remote { status: "ok".to_string() });
	assert_eq!(
		receipt.record.ranked_pipelines,
		[PipelineId::AssistedKeyword, PipelineId::Embedding, PipelineId::Keyword]
	);
	assert_eq!(receipt.record.comment.as_deref(), Some("Right was best."));
	assert_eq!(receipt.record.slot_ids.left, ["K1-0", "K1-1"]);

	let err = session
		.submit_feedback(&[Slot::Left, Slot::Middle, Slot::Right], None)
		.await
		.expect_err("second submission must be rejected");

	assert!(matches!(err, Error::FeedbackAlreadySubmitted));
	assert_eq!(fixture.sink.count(), 1);
}

#[tokio::test]
async fn failed_feedback_is_kept_for_retry() {
	let fixture = Fixture::with_feedback_failures(1);
	let mut session = fixture.session(true);

	session.submit_query(raw(&["An abstract."], &["AI"])).expect("query should be accepted");
	session.settle().await;

	let receipt = session
		.submit_feedback(&[Slot::Middle, Slot::Left, Slot::Right], None)
		.await
		.expect("delivery failure should not surface as an error");

	assert!(matches!(receipt.acknowledgement, Acknowledgement::LocalOnly { .. }));

	let retried = session.retry_feedback().await.expect("pending feedback should be resent");

	assert!(matches!(retried.acknowledgement, Acknowledgement::Remote { .. }));
	assert_eq!(retried.record.submitted_at, receipt.record.submitted_at);
	assert_eq!(fixture.sink.count(), 2);

	let sent = fixture.sink.records();

	assert_eq!(sent[0].ranking, sent[1].ranking);
	assert_eq!(sent[0].query.abstracts(), ["An abstract."]);
	assert!(matches!(session.retry_feedback().await, Err(Error::FeedbackUnavailable { .. })));
}

#[tokio::test]
async fn single_mode_takes_no_feedback() {
	let fixture = Fixture::new();
	let mut session = fixture.session(false);

	session.submit_query(raw(&["An abstract."], &[])).expect("query should be accepted");
	session.settle().await;

	let err = session
		.submit_feedback(&[Slot::Left, Slot::Middle, Slot::Right], None)
		.await
		.expect_err("single mode has no comparison to rank");

	assert!(matches!(err, Error::FeedbackUnavailable { .. }));
	assert_eq!(fixture.sink.count(), 0);
}

#[tokio::test]
async fn toggling_evaluation_back_on_reuses_the_ranked_comparison() {
	let fixture = Fixture::new();
	let mut session = fixture.session(true);

	session.submit_query(raw(&["An abstract."], &["AI"])).expect("query should be accepted");

	let first = session.settle().await.committed.expect("comparative result should be committed");

	session
		.submit_feedback(&[Slot::Left, Slot::Middle, Slot::Right], None)
		.await
		.expect("first ranking should be accepted");

	assert_eq!(session.set_evaluation_mode(false), Readiness::Committed);
	assert_eq!(session.snapshot().committed.map(|c| c.mode), Some(Mode::Single));
	assert_eq!(session.set_evaluation_mode(true), Readiness::Committed);
	assert_eq!(session.in_flight(), 0);

	let shown = session.snapshot().committed.expect("comparison should be shown again");

	assert!(Arc::ptr_eq(&shown, &first));

	let err = session
		.submit_feedback(&[Slot::Right, Slot::Middle, Slot::Left], None)
		.await
		.expect_err("the comparison was already ranked");

	assert!(matches!(err, Error::FeedbackAlreadySubmitted));
	assert_eq!(fixture.counts(), [1, 1, 1]);
	assert_eq!(fixture.sink.count(), 1);
}

#[tokio::test]
async fn returning_to_an_earlier_query_keeps_its_feedback_spent() {
	let fixture = Fixture::new();
	let mut session = fixture.session(true);

	session.submit_query(raw(&["first"], &["AI"])).expect("first query");

	let first = session.settle().await.committed.expect("first query should be committed");

	session
		.submit_feedback(&[Slot::Middle, Slot::Left, Slot::Right], None)
		.await
		.expect("first ranking should be accepted");
	session.submit_query(raw(&["second"], &["AI"])).expect("second query");
	session.settle().await;

	assert_eq!(fixture.counts(), [2, 1, 2]);

	let readiness = session.submit_query(raw(&["first"], &["AI"])).expect("first query again");

	assert_eq!(readiness, Readiness::Committed);
	assert_eq!(session.in_flight(), 0);

	let shown = session.snapshot().committed.expect("first query should be shown again");

	assert!(Arc::ptr_eq(&shown, &first));

	let err = session
		.submit_feedback(&[Slot::Left, Slot::Middle, Slot::Right], None)
		.await
		.expect_err("the first comparison was already ranked");

	assert!(matches!(err, Error::FeedbackAlreadySubmitted));
	assert_eq!(fixture.counts(), [2, 1, 2]);
	assert_eq!(fixture.sink.count(), 1);
}
