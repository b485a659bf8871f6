//! Task that owns the avatar link and feeds it queued levels

use crate::level_queue::{level_channel, LevelQueue, LevelReceiver};
use crate::link::AvatarLinkClient;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Background consumer of a [`LevelQueue`] sized by the client's config.
///
/// The link client moves into the task, so pushes never race each other.
/// A dropped link is re-established at most once per cooldown period.
pub struct LevelForwarder {
    queue: LevelQueue,
    handle: JoinHandle<AvatarLinkClient>,
}

impl LevelForwarder {
    pub fn spawn(client: AvatarLinkClient) -> Self {
        let cooldown = client.config().reconnect_cooldown();
        let (queue, levels) = level_channel(client.config().queue_capacity);
        let handle = tokio::spawn(forward_levels(client, levels, cooldown));
        Self { queue, handle }
    }

    pub fn queue(&self) -> &LevelQueue {
        &self.queue
    }

    /// Stop accepting levels, flush what is queued and close the link
    pub async fn shutdown(self) {
        let Self { queue, handle } = self;
        drop(queue);
        match handle.await {
            Ok(mut client) => client.close().await,
            Err(e) => warn!("Level forwarder task failed: {}", e),
        }
        debug!("Level forwarder stopped");
    }
}

async fn forward_levels(mut client: AvatarLinkClient, mut levels: LevelReceiver, cooldown: Duration) -> AvatarLinkClient {
    let mut last_attempt = Instant::now();

    while let Some(level) = levels.recv().await {
        if !client.is_ready() && last_attempt.elapsed() >= cooldown {
            last_attempt = Instant::now();
            match client.reconnect().await {
                Ok(()) => info!("VTube Studio link re-established"),
                Err(e) => debug!("VTube Studio reconnect failed: {}", e),
            }
        }
        client.push(level).await;
    }

    let dropped = levels.dropped();
    if dropped > 0 {
        debug!("{} mouth levels dropped while the link was busy", dropped);
    }
    client
}
