//! Best-effort delayed deletion of transient UI messages.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::metrics;
use crate::platform::{MessageRef, Platform};

/// Schedules delayed, best-effort deletion of transient messages.
///
/// Once scheduled a deletion always fires after its delay, even if the
/// message was already removed by other means; there is no cancellation
/// path. Failures are logged and swallowed, never surfaced to the caller.
#[derive(Clone)]
pub struct EphemeralScheduler {
    platform: Arc<dyn Platform>,
}

impl EphemeralScheduler {
    pub fn new(platform: Arc<dyn Platform>) -> Self {
        Self { platform }
    }

    /// Delete `message` after `delay`, detached from the caller.
    pub fn schedule_delete(&self, message: MessageRef, delay: Duration) {
        let platform = self.platform.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = platform.delete_message(&message).await {
                metrics::CLEANUP_FAILURES.inc();
                warn!(
                    "Failed to delete ephemeral message {} in channel {}: {}",
                    message.id, message.channel, e
                );
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::PlatformError;
    use crate::testing::{MockPlatform, PlatformCall};

    #[tokio::test]
    async fn test_deletion_fires_after_delay() {
        let platform = Arc::new(MockPlatform::new());
        let scheduler = EphemeralScheduler::new(platform.clone());

        let message = MessageRef::new("channel-1", "message-1");
        scheduler.schedule_delete(message.clone(), Duration::from_millis(10));

        // Nothing happens before the delay elapses
        assert!(platform.deleted_messages().await.is_empty());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(platform.deleted_messages().await, vec![message]);
    }

    #[tokio::test]
    async fn test_deletion_failure_is_swallowed() {
        let platform = Arc::new(MockPlatform::new());
        platform
            .set_next_error(PlatformError::NotFound("already gone".to_string()))
            .await;
        let scheduler = EphemeralScheduler::new(platform.clone());

        scheduler.schedule_delete(
            MessageRef::new("channel-1", "message-1"),
            Duration::from_millis(10),
        );

        tokio::time::sleep(Duration::from_millis(50)).await;

        // The attempt was made and the failure swallowed
        let attempts = platform
            .calls()
            .await
            .into_iter()
            .filter(|c| matches!(c, PlatformCall::DeleteMessage(_)))
            .count();
        assert_eq!(attempts, 1);
    }
}
