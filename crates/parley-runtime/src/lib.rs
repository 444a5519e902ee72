//! Supervised reply pipeline: filtering, thread context, prompt modes, review and posting.

pub mod ancestor_chain;
pub mod approval_queue;
pub mod config;
pub mod dedup_store;
pub mod keyword_filter;
pub mod poster;
pub mod prompt_modes;
pub mod reply_generator;
pub mod review_session;
pub mod stream_worker;

pub use ancestor_chain::{build_downward_chain, build_upward_chain, AncestorChain};
pub use approval_queue::{approval_channel, ApprovalQueue, ApprovalSender, PendingReply, ReviewItem};
pub use config::{
    normalize_forum, ReplyBotConfig, DEFAULT_DEDUP_FILE, DEFAULT_RECONNECT_DELAY_MS,
    DEFAULT_REVIEW_TICK_MS,
};
pub use dedup_store::DedupStore;
pub use keyword_filter::{classify_comment, match_keyword, normalize_keywords, CommentDisposition};
pub use poster::{DispatchError, PostOutcome, PostStatus, Poster};
pub use prompt_modes::{
    compose_generation_prompt, compose_mode_prompt, compose_prompt, mode_display_label,
    validate_all_modes, Mode, PromptTemplateError, BUILTIN_REPLY_TEMPLATE,
};
pub use reply_generator::{
    extract_final_comment, DraftSource, ReplyDraft, ReplyGenerator,
    DEFAULT_GENERATION_TIMEOUT_MS, DEFAULT_MODEL, DEFAULT_SYSTEM_PROMPT, DEFAULT_TEMPERATURE,
    FALLBACK_REPLY, FINAL_COMMENT_MARKER,
};
pub use review_session::{RefreshOutcome, ReviewError, ReviewNotice, ReviewSession, ShutdownSummary};
pub use stream_worker::{spawn_supervised_worker, StreamWorker, StreamWorkerReport};
