pub mod provider;
pub mod video_asset;
pub mod webhook_event;

pub use provider::*;
pub use video_asset::*;
pub use webhook_event::*;
