//! Inbound provider webhooks: signature verification and event processing.

pub mod processor;
pub mod signature;

pub use processor::{ProcessOutcome, WebhookProcessor};
pub use signature::{WebhookVerifier, SIGNATURE_HEADER};
