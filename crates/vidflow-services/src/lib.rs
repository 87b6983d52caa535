//! Vidflow services layer
//!
//! Orchestration on top of the persistence, storage and provider crates:
//! lifecycle transitions, deduplication, polling, webhook handling and the
//! poster fallback chain. HTTP concerns stay in vidflow-api.

pub mod dedup;
pub mod events;
pub mod lifecycle;
pub mod thumbnail;
pub mod waiter;
pub mod webhook;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_helpers;

pub use dedup::{DeduplicationGuard, FindOrCreate};
pub use events::{EventPublisher, LifecycleEvent, LifecycleEventConsumer};
pub use lifecycle::{AssetLifecycleManager, LifecycleConfig};
pub use thumbnail::{
    FfmpegFrameStrategy, PlaceholderStrategy, ProviderCaptureStrategy, StrategyFailure,
    ThumbnailChain, ThumbnailConfig, ThumbnailOutcome, ThumbnailStrategy, ThumbnailTarget,
};
pub use waiter::{CompletionWaiter, WaitOutcome, WaitPolicy};
pub use webhook::{ProcessOutcome, WebhookProcessor, WebhookVerifier};
