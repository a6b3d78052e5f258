//! Batch messages and their source-side callbacks.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use wharf_types::DiscoveredBatch;

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;
type AckFn = Box<dyn FnOnce() -> BoxFuture<anyhow::Result<()>> + Send>;
type ExtendFn = dyn Fn(Duration) -> BoxFuture<anyhow::Result<()>> + Send + Sync;

/// Fire-once acknowledgment of the source notification.
pub struct Ack(Option<AckFn>);

impl Ack {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self(Some(Box::new(move || Box::pin(f()))))
    }

    /// Acknowledgment for messages with no source to acknowledge, such as
    /// retry-queue resubmissions.
    #[must_use]
    pub fn noop() -> Self {
        Self(None)
    }

    /// `true` until the callback has been invoked.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.0.is_some()
    }

    /// Invoke the callback. Subsequent calls do nothing and return `false`.
    ///
    /// # Errors
    ///
    /// Returns the callback's error. The callback is consumed either way.
    pub async fn acknowledge(&mut self) -> anyhow::Result<bool> {
        let Some(ack) = self.0.take() else {
            return Ok(false);
        };
        ack().await?;
        Ok(true)
    }
}

impl fmt::Debug for Ack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Ack").field(&self.is_pending()).finish()
    }
}

/// Extends the source's processing lease (e.g. a queue visibility timeout).
#[derive(Clone)]
pub struct ExtendLease(Option<Arc<ExtendFn>>);

impl ExtendLease {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Duration) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self(Some(Arc::new(move |by| Box::pin(f(by)))))
    }

    #[must_use]
    pub fn noop() -> Self {
        Self(None)
    }

    /// # Errors
    ///
    /// Returns the callback's error.
    pub async fn extend(&self, by: Duration) -> anyhow::Result<()> {
        match &self.0 {
            Some(extend) => extend(by).await,
            None => Ok(()),
        }
    }
}

impl fmt::Debug for ExtendLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ExtendLease").field(&self.0.is_some()).finish()
    }
}

/// A discovered batch together with the callbacks of the notification
/// that announced it.
#[derive(Debug)]
pub struct BatchMessage {
    pub batch: DiscoveredBatch,
    pub ack: Ack,
    pub extend: ExtendLease,
}

impl BatchMessage {
    #[must_use]
    pub fn new(batch: DiscoveredBatch, ack: Ack, extend: ExtendLease) -> Self {
        Self { batch, ack, extend }
    }

    /// A message with no source notification behind it.
    #[must_use]
    pub fn unsourced(batch: DiscoveredBatch) -> Self {
        Self::new(batch, Ack::noop(), ExtendLease::noop())
    }
}
