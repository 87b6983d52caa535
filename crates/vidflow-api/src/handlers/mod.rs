pub mod health;
pub mod videos;
pub mod webhooks;
