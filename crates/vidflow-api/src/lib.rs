//! Vidflow API Library
//!
//! HTTP surface of the ingest pipeline: handlers, application state and setup.

mod api_doc;
pub mod constants;
pub mod error;
mod handlers;
pub mod setup;
pub mod state;
mod telemetry;

pub use error::{ErrorResponse, HttpAppError};
pub use state::{AppSettings, AppState, Collaborators};
