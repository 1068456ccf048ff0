//! Best-effort change and error notifications.
//!
//! The orchestrator hands events to a [`NotificationDispatcher`], which runs
//! each delivery on its own task. Delivery failures are logged here and never
//! reach the caller.

mod slack;

pub use slack::{
    SlackAttachment, SlackField, SlackMessage, SlackWebhookNotifier,
};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use crate::{
    error::{RegionsError, Result},
    types::Regions,
};

/// Outbound sink for region events.
#[async_trait]
pub trait ChangeNotifier: Send + Sync + std::fmt::Debug {
    /// A provider fetch failed.
    async fn notify_error(
        &self,
        provider: &str,
        error: &RegionsError,
    ) -> Result<()>;

    /// A provider's regions differ from the cached set.
    async fn notify_changed(
        &self,
        provider: &str,
        previous: &Regions,
        current: &Regions,
    ) -> Result<()>;
}

/// Notifier used when no delivery channel is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopNotifier;

#[async_trait]
impl ChangeNotifier for NoopNotifier {
    async fn notify_error(
        &self,
        provider: &str,
        error: &RegionsError,
    ) -> Result<()> {
        debug!(
            "No notifier configured, dropping error event for {provider}: \
             {error}"
        );
        Ok(())
    }

    async fn notify_changed(
        &self,
        provider: &str,
        _previous: &Regions,
        _current: &Regions,
    ) -> Result<()> {
        debug!("No notifier configured, dropping change event for {provider}");
        Ok(())
    }
}

/// Fire-and-forget front for a [`ChangeNotifier`].
#[derive(Clone, Debug)]
pub struct NotificationDispatcher {
    notifier: Arc<dyn ChangeNotifier>,
    tracker: TaskTracker,
}

impl NotificationDispatcher {
    /// Dispatcher delivering through `notifier`.
    pub fn new(notifier: Arc<dyn ChangeNotifier>) -> Self {
        Self {
            notifier,
            tracker: TaskTracker::new(),
        }
    }

    /// Queue an error event. Returns immediately.
    pub fn error(&self, provider: &str, error: RegionsError) {
        let notifier = Arc::clone(&self.notifier);
        let provider = provider.to_string();
        self.tracker.spawn(async move {
            match notifier.notify_error(&provider, &error).await {
                Ok(()) => debug!(
                    "Sent regions fetch error notification for provider: \
                     {provider}"
                ),
                Err(err) => warn!(
                    "Failed to send error notification for provider \
                     {provider}: {err}"
                ),
            }
        });
    }

    /// Queue a change event. Returns immediately.
    pub fn changed(
        &self,
        provider: &str,
        previous: Regions,
        current: Regions,
    ) {
        let notifier = Arc::clone(&self.notifier);
        let provider = provider.to_string();
        self.tracker.spawn(async move {
            let sent =
                notifier.notify_changed(&provider, &previous, &current).await;
            match sent {
                Ok(()) => debug!(
                    "Sent regions changed notification for provider: \
                     {provider}"
                ),
                Err(err) => warn!(
                    "Failed to send change notification for provider \
                     {provider}: {err}"
                ),
            }
        });
    }

    /// Deliveries still running.
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Wait for outstanding deliveries. Returns `false` if `timeout` elapsed
    /// first; those deliveries keep running in the background.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.tracker.close();
        let drained = tokio::time::timeout(timeout, self.tracker.wait())
            .await
            .is_ok();
        self.tracker.reopen();

        if !drained {
            warn!(
                "Timed out after {:?} waiting for {} notification(s)",
                timeout,
                self.tracker.len()
            );
        }
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Debug, Default)]
    struct Recording {
        errors: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChangeNotifier for Recording {
        async fn notify_error(
            &self,
            provider: &str,
            _error: &RegionsError,
        ) -> Result<()> {
            self.errors.lock().push(provider.to_string());
            Err(RegionsError::Notification("webhook down".into()))
        }

        async fn notify_changed(
            &self,
            _: &str,
            _: &Regions,
            _: &Regions,
        ) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn failed_delivery_is_swallowed_and_drained() {
        let recording = Arc::new(Recording::default());
        let dispatcher = NotificationDispatcher::new(recording.clone());

        dispatcher.error("A", RegionsError::Serialization("boom".into()));
        assert!(dispatcher.drain(Duration::from_secs(1)).await);
        assert_eq!(dispatcher.pending(), 0);
        assert_eq!(*recording.errors.lock(), vec!["A".to_string()]);

        // Still usable after a drain.
        dispatcher.error("B", RegionsError::Serialization("boom".into()));
        assert!(dispatcher.drain(Duration::from_secs(1)).await);
        assert_eq!(recording.errors.lock().len(), 2);
    }
}
