//! murmur-me: lip sync for a VTube Studio avatar
//!
//! Provides:
//! - The VTube Studio public API messages used for lip sync
//! - An authenticated link client that smooths and pushes mouth levels
//! - A drop-oldest level queue and a forwarding task that owns the client

pub mod config;
pub mod error;
pub mod forwarder;
pub mod level_queue;
pub mod link;
pub mod protocol;

pub use config::AvatarConfig;
pub use error::AvatarError;
pub use forwarder::LevelForwarder;
pub use level_queue::{level_channel, LevelQueue, LevelReceiver};
pub use link::{AuthPhase, AvatarLinkClient, LinkState};
pub use protocol::{Request, Response};
