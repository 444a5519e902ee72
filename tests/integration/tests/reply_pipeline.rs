use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use parley_ai::{ChatRequest, ChatResponse, ChatUsage, GenerationError, LlmClient, Message};
use parley_forum::{
    CommentEvent, CommentSource, CommentStream, ParentNode, PostedReply, ReplyPublisher,
    Submission, ThreadLookup,
};
use parley_runtime::{
    approval_channel, build_upward_chain, spawn_supervised_worker, DedupStore, DraftSource, Mode,
    PostStatus, Poster, ReplyBotConfig, ReplyGenerator, ReviewError, ReviewNotice, ReviewSession,
    StreamWorker,
};
use tempfile::{tempdir, TempDir};
use tokio::sync::{watch, Mutex as AsyncMutex};

/// In-memory forum: a fixed comment feed, a parent index and a reply log.
struct FakeForum {
    feed: Mutex<VecDeque<Vec<CommentEvent>>>,
    parents: HashMap<String, ParentNode>,
    posted: Mutex<Vec<(String, String)>>,
    post_delay: Duration,
}

impl FakeForum {
    fn new(feed: Vec<CommentEvent>, parents: HashMap<String, ParentNode>) -> Self {
        Self {
            feed: Mutex::new(VecDeque::from([feed])),
            parents,
            posted: Mutex::new(Vec::new()),
            post_delay: Duration::ZERO,
        }
    }

    fn with_post_delay(mut self, delay: Duration) -> Self {
        self.post_delay = delay;
        self
    }

    fn posted(&self) -> Vec<(String, String)> {
        self.posted.lock().expect("posted lock").clone()
    }
}

#[async_trait]
impl CommentSource for FakeForum {
    async fn subscribe(&self, _forum: &str) -> Result<CommentStream> {
        let events = self
            .feed
            .lock()
            .expect("feed lock")
            .pop_front()
            .unwrap_or_default();
        Ok(stream::iter(events.into_iter().map(Ok))
            .chain(stream::pending())
            .boxed())
    }
}

#[async_trait]
impl ThreadLookup for FakeForum {
    async fn fetch_parent(&self, parent_fullname: &str) -> Result<ParentNode> {
        self.parents
            .get(parent_fullname)
            .cloned()
            .ok_or_else(|| anyhow!("unknown parent {parent_fullname}"))
    }
}

#[async_trait]
impl ReplyPublisher for FakeForum {
    async fn post_reply(&self, parent_fullname: &str, body: &str) -> Result<PostedReply> {
        if !self.post_delay.is_zero() {
            tokio::time::sleep(self.post_delay).await;
        }
        self.posted
            .lock()
            .expect("posted lock")
            .push((parent_fullname.to_string(), body.to_string()));
        Ok(PostedReply {
            id: Some(format!("reply-to-{parent_fullname}")),
            permalink: None,
        })
    }
}

struct ScriptedClient {
    reply: String,
    requests: AsyncMutex<Vec<ChatRequest>>,
}

impl ScriptedClient {
    fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            requests: AsyncMutex::new(Vec::new()),
        }
    }

    async fn prompts(&self) -> Vec<String> {
        self.requests
            .lock()
            .await
            .iter()
            .filter_map(|request| request.messages.last().map(|message| message.content.clone()))
            .collect()
    }
}

#[async_trait]
impl LlmClient for ScriptedClient {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, GenerationError> {
        self.requests.lock().await.push(request);
        Ok(ChatResponse {
            message: Message::assistant_text(self.reply.clone()),
            finish_reason: Some("stop".to_string()),
            usage: ChatUsage::default(),
        })
    }
}

fn submission() -> Submission {
    Submission {
        id: "p".to_string(),
        fullname: "t3_p".to_string(),
        author: Some("op".to_string()),
        title: "Budget debate".to_string(),
        selftext: "What do you think about the new budget?".to_string(),
        url: String::new(),
        is_self: true,
    }
}

fn comment(id: &str, author: &str, body: &str, parent_id: &str) -> CommentEvent {
    CommentEvent {
        id: id.to_string(),
        fullname: format!("t1_{id}"),
        author: Some(author.to_string()),
        body: body.to_string(),
        submission_id: "t3_p".to_string(),
        parent_id: parent_id.to_string(),
        permalink: Some(format!("/r/politics/comments/p/budget/{id}/")),
    }
}

fn parents_with_submission() -> HashMap<String, ParentNode> {
    HashMap::from([("t3_p".to_string(), ParentNode::Submission(submission()))])
}

struct Pipeline {
    _temp: TempDir,
    store: Arc<DedupStore>,
    session: ReviewSession,
    supervisor: tokio::task::JoinHandle<Option<parley_runtime::StreamWorkerReport>>,
}

fn start_pipeline(
    forum: Arc<FakeForum>,
    client: Arc<dyn LlmClient>,
    mode: Mode,
    keywords: &[&str],
    handled: &[&str],
) -> Pipeline {
    let temp = tempdir().expect("tempdir");
    let store = Arc::new(DedupStore::new(temp.path().join("replied_comments.txt")));
    for comment_id in handled {
        store.record(comment_id).expect("seed handled comment");
    }
    let keywords = keywords.iter().map(|k| k.to_string()).collect::<Vec<_>>();
    let mut config = ReplyBotConfig::new("politics", &keywords);
    config.mode = mode;
    config.bot_identity = Some("bot1".to_string());
    config.reconnect_delay = Duration::from_millis(10);

    let (sender, queue) = approval_channel();
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let worker = StreamWorker::new(
        Arc::new(config),
        Arc::clone(&forum) as Arc<dyn CommentSource>,
        Arc::clone(&forum) as Arc<dyn ThreadLookup>,
        ReplyGenerator::new(client, "test-model"),
        Arc::clone(&store),
        sender,
    )
    .expect("worker");
    let supervisor = spawn_supervised_worker(worker, cancel_rx);
    let session = ReviewSession::new(
        queue,
        Poster::new(forum as Arc<dyn ReplyPublisher>, Arc::clone(&store)),
        cancel_tx,
    );
    Pipeline {
        _temp: temp,
        store,
        session,
        supervisor,
    }
}

async fn tick_until<F>(session: &mut ReviewSession, mut done: F) -> Vec<ReviewNotice>
where
    F: FnMut(&[ReviewNotice]) -> bool,
{
    let mut seen = Vec::new();
    for _ in 0..200 {
        seen.extend(session.tick().await);
        if done(&seen) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    seen
}

fn presented(notices: &[ReviewNotice]) -> Vec<String> {
    notices
        .iter()
        .filter_map(|notice| match notice {
            ReviewNotice::Presented(pending) => Some(pending.comment.id.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn integration_matching_comment_is_reviewed_posted_and_recorded() {
    let forum = Arc::new(FakeForum::new(
        vec![comment("c1", "u1", "I love tax cuts", "t3_p")],
        parents_with_submission(),
    ));
    let client = Arc::new(ScriptedClient::new(
        "PHASE 1 - ANALYSIS\nclaims the cuts are free\n\nFINAL COMMENT:\nHave you looked at the deficit numbers?",
    ));
    let mut pipeline = start_pipeline(
        Arc::clone(&forum),
        client.clone(),
        Mode::Standard,
        &["tax cuts"],
        &[],
    );

    let notices = tick_until(&mut pipeline.session, |seen| !presented(seen).is_empty()).await;
    assert_eq!(presented(&notices), vec!["c1".to_string()]);
    let current = pipeline.session.current().expect("current item");
    assert_eq!(current.matched_keyword, "tax cuts");
    assert_eq!(current.draft_source, DraftSource::Generated);
    assert_eq!(
        current.suggested_reply,
        "Have you looked at the deficit numbers?"
    );
    assert_eq!(
        current.thread_context,
        "REDDIT POST:\nop: Budget debate\n\nWhat do you think about the new budget?\n\nu1: I love tax cuts"
    );

    pipeline.session.approve(None).expect("approve");
    let notices = tick_until(&mut pipeline.session, |seen| {
        seen.iter()
            .any(|notice| matches!(notice, ReviewNotice::PostFinished(_)))
    })
    .await;
    let outcome = notices
        .iter()
        .find_map(|notice| match notice {
            ReviewNotice::PostFinished(outcome) => Some(outcome.clone()),
            _ => None,
        })
        .expect("post finished");
    assert_eq!(
        outcome.status,
        PostStatus::Posted {
            reply_id: Some("reply-to-t1_c1".to_string())
        }
    );
    assert_eq!(
        forum.posted(),
        vec![(
            "t1_c1".to_string(),
            "Have you looked at the deficit numbers?".to_string()
        )]
    );
    assert!(pipeline.store.has("c1").expect("has"));
    assert!(pipeline.session.current().is_none());

    let prompts = client.prompts().await;
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("THREAD CONTEXT:"));
    assert!(prompts[0].ends_with("u1: I love tax cuts"));

    let summary = pipeline.session.shutdown().await;
    assert_eq!(summary.discarded, 0);
    let report = pipeline
        .supervisor
        .await
        .expect("supervisor")
        .expect("report");
    assert_eq!(report.matches, 1);
}

#[tokio::test]
async fn integration_non_matching_handled_and_self_comments_never_reach_review() {
    let forum = Arc::new(FakeForum::new(
        vec![
            comment("c1", "u1", "nothing relevant here", "t3_p"),
            comment("c2", "Bot1", "tax cuts are great", "t3_p"),
            comment("c3", "u3", "more tax cuts please", "t3_p"),
        ],
        parents_with_submission(),
    ));
    let client = Arc::new(ScriptedClient::new("unused"));
    let mut pipeline = start_pipeline(
        forum,
        client.clone(),
        Mode::Standard,
        &["tax cuts"],
        &["c3"],
    );

    tokio::time::sleep(Duration::from_millis(100)).await;
    let notices = pipeline.session.tick().await;
    assert!(presented(&notices).is_empty());
    assert!(pipeline.session.current().is_none());
    assert!(client.prompts().await.is_empty());

    pipeline.session.shutdown().await;
    let report = pipeline
        .supervisor
        .await
        .expect("supervisor")
        .expect("report");
    assert_eq!(report.events_seen, 3);
    assert_eq!(report.keyword_misses, 1);
    assert_eq!(report.self_skips, 1);
    assert_eq!(report.duplicate_skips, 1);
    assert_eq!(report.matches, 0);
}

#[tokio::test]
async fn integration_mode_selection_changes_generation_prompt_only() {
    let mut prompts_by_mode = HashMap::new();
    for mode in [Mode::Dunk, Mode::Friendly] {
        let forum = Arc::new(FakeForum::new(
            vec![comment("c1", "u1", "I love tax cuts", "t3_p")],
            parents_with_submission(),
        ));
        let client = Arc::new(ScriptedClient::new("reply"));
        let mut pipeline = start_pipeline(forum, client.clone(), mode, &["tax cuts"], &[]);
        let notices = tick_until(&mut pipeline.session, |seen| !presented(seen).is_empty()).await;
        assert_eq!(presented(&notices), vec!["c1".to_string()]);
        pipeline.session.shutdown().await;
        let _ = pipeline.supervisor.await;
        let prompts = client.prompts().await;
        prompts_by_mode.insert(mode, prompts.into_iter().next().expect("one prompt"));
    }

    let dunk = &prompts_by_mode[&Mode::Dunk];
    let friendly = &prompts_by_mode[&Mode::Friendly];
    assert!(dunk.contains("dismantle"));
    assert!(!friendly.contains("dismantle"));
    assert!(dunk.contains("DUNK MODE ACTIVATED"));
    assert!(!dunk.contains("FRIENDLY MODE"));
    assert!(friendly.contains("FRIENDLY MODE"));
    assert!(!friendly.contains("DUNK MODE ACTIVATED"));

    let context = |prompt: &str| {
        prompt
            .split_once("THREAD CONTEXT:")
            .map(|(_, context)| context.to_string())
            .expect("thread context section")
    };
    assert_eq!(context(dunk), context(friendly));
}

#[tokio::test]
async fn integration_second_approval_is_rejected_while_post_is_in_flight() {
    let forum = Arc::new(
        FakeForum::new(
            vec![
                comment("c1", "u1", "tax cuts now", "t3_p"),
                comment("c2", "u2", "tax cuts later", "t3_p"),
            ],
            parents_with_submission(),
        )
        .with_post_delay(Duration::from_millis(150)),
    );
    let client = Arc::new(ScriptedClient::new("reply"));
    let mut pipeline = start_pipeline(
        Arc::clone(&forum),
        client,
        Mode::Standard,
        &["tax cuts"],
        &[],
    );

    tick_until(&mut pipeline.session, |seen| !presented(seen).is_empty()).await;
    pipeline.session.approve(None).expect("first approve");
    assert!(matches!(
        pipeline.session.approve(Some("again".to_string())),
        Err(ReviewError::Dispatch(_))
    ));
    assert!(matches!(
        pipeline.session.skip(),
        Err(ReviewError::AlreadyPosting)
    ));

    let notices = tick_until(&mut pipeline.session, |seen| {
        presented(seen).contains(&"c2".to_string())
    })
    .await;
    assert!(notices
        .iter()
        .any(|notice| matches!(notice, ReviewNotice::PostFinished(_))));
    assert_eq!(forum.posted().len(), 1);
    assert!(pipeline.store.has("c1").expect("has c1"));
    assert!(!pipeline.store.has("c2").expect("has c2"));

    let summary = pipeline.session.shutdown().await;
    assert_eq!(summary.discarded, 1);
    let _ = pipeline.supervisor.await;
}

#[tokio::test]
async fn integration_upward_chain_has_one_block_per_ancestor_plus_submission() {
    let depth = 4;
    let mut parents = parents_with_submission();
    let mut parent_id = "t3_p".to_string();
    for level in 0..depth {
        let node = comment(&format!("a{level}"), &format!("u{level}"), "reply", &parent_id);
        parent_id = node.fullname.clone();
        parents.insert(node.fullname.clone(), ParentNode::Comment(node));
    }
    let forum = FakeForum::new(Vec::new(), parents);
    let trigger = comment("leaf", "leaf_author", "tax cuts", &parent_id);

    let chain = build_upward_chain(&forum, &trigger).await.expect("chain");
    let blocks = chain.blocks();
    assert_eq!(blocks.len(), depth + 2);
    assert!(blocks[0].starts_with("REDDIT POST:\nop: Budget debate"));
    assert_eq!(blocks[1], "u0: reply");
    assert_eq!(blocks.last().map(String::as_str), Some("leaf_author: tax cuts"));
}
