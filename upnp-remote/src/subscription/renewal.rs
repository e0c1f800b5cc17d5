//! Renewal timers.

use std::future::Future;
use std::time::Duration;

use tokio::sync::oneshot;

/// Delay before renewing a subscription granted for `granted`.
///
/// Renews `margin` before expiry but never sooner than `floor`.
pub fn renewal_delay(granted: Duration, margin: Duration, floor: Duration) -> Duration {
    granted.saturating_sub(margin).max(floor)
}

/// A one-shot timer owned by a subscription.
///
/// Cancelling (or dropping) the timer stops it only while it is still
/// waiting; once it has fired, the renewal runs to completion.
#[derive(Debug)]
pub(crate) struct RenewalTimer {
    cancel: Option<oneshot::Sender<()>>,
}

impl RenewalTimer {
    pub fn schedule<F, Fut>(delay: Duration, on_fire: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (cancel, cancelled) = oneshot::channel::<()>();

        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => on_fire().await,
                _ = cancelled => {}
            }
        });

        Self {
            cancel: Some(cancel),
        }
    }

    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }
}

impl Drop for RenewalTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
