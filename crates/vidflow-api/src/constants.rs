//! API constants

/// Versioned prefix for the public API routes.
pub const API_PREFIX: &str = "/api/v0";

/// Path the provider delivers webhooks to.
pub const WEBHOOK_PATH: &str = "/webhooks/provider";

/// Upper bound on request bodies; payloads here are small JSON documents.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

pub const DEFAULT_HTTP_CONCURRENCY_LIMIT: usize = 10_000;
