//! Mirror node subscriptions.
//!
//! A [`SubscribeIterator`] keeps one server-streaming call to a mirror node
//! alive across transport failures:
//!
//! | State | Event | Next |
//! |---|---|---|
//! | `Start` | open a call from the current context, reset both backoffs | `Running` |
//! | `Running` | item received, context updated, item yielded | `Running` |
//! | `Running` | `Unavailable` / `ResourceExhausted` / `Aborted` | sleep (unbounded), `Start` |
//! | `Running` | code the request retries | sleep (bounded), `Start`; `TimedOut` once exhausted |
//! | `Running` | end of stream | `Finished` |
//! | `Running` | any other code | error, `Finished` |
//! | `Finished` | | end |
//!
//! Cancellation is checked before every step and interrupts backoff sleeps.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt};
use ledgerpc_common::transport::{Channel, Connector, ItemStream, TransportError};
use ledgerpc_common::{Code, LedgerError, Result};
use ledgerpc_metrics::MetricsRegistry;
use ledgerpc_orchestrator::{ExponentialBackoff, MaxElapsedTime};
use rand::Rng;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Channels to the mirror nodes of a network.
#[derive(Clone, Default)]
pub struct MirrorNetwork {
    addresses: Vec<String>,
    channels: Vec<Arc<dyn Channel>>,
}

impl MirrorNetwork {
    /// Opens one channel per mirror address.
    pub fn from_addresses(addresses: &[String], connector: &dyn Connector) -> Result<Self> {
        let channels = addresses
            .iter()
            .map(|address| connector.open(std::slice::from_ref(address)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            addresses: addresses.to_vec(),
            channels,
        })
    }

    pub fn from_channels(channels: Vec<Arc<dyn Channel>>) -> Self {
        Self {
            addresses: Vec::new(),
            channels,
        }
    }

    pub fn addresses(&self) -> &[String] {
        &self.addresses
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// A channel picked uniformly at random.
    pub fn channel(&self) -> Result<Arc<dyn Channel>> {
        if self.channels.is_empty() {
            return Err(LedgerError::Config("mirror network has no nodes".to_string()));
        }

        let index = rand::rng().random_range(0..self.channels.len());
        Ok(self.channels[index].clone())
    }
}

impl std::fmt::Debug for MirrorNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MirrorNetwork")
            .field("addresses", &self.addresses)
            .field("channels", &self.channels.len())
            .finish()
    }
}

/// Per-subscription state that survives reconnects.
pub trait MirrorContext<Item>: Default + Send + 'static {
    /// Records a received item so the next call can resume after it.
    fn update(&mut self, item: &Item);
}

/// A streaming request served by mirror nodes.
pub trait MirrorRequest: Send + Sync + 'static {
    /// Raw item as received from the mirror node.
    type GrpcItem: DeserializeOwned + Send + 'static;
    type Context: MirrorContext<Self::GrpcItem>;
    /// Item handed to the caller.
    type Item: Send + 'static;

    const METHOD: &'static str;

    /// Payload opening a call that resumes from `context`.
    fn make_query(&self, context: &Self::Context) -> Result<Value>;

    /// Whether a transport failure with `code` is worth a bounded retry.
    /// `Unavailable`, `ResourceExhausted` and `Aborted` are always retried.
    fn should_retry(&self, _code: Code) -> bool {
        false
    }

    /// Turns the raw item stream into the caller's item stream.
    fn make_item_stream(raw: BoxStream<'static, Result<Self::GrpcItem>>) -> BoxStream<'static, Result<Self::Item>>;
}

enum State {
    Start,
    Running(ItemStream),
    Finished,
}

/// Resumable raw item stream of one subscription.
pub struct SubscribeIterator<R: MirrorRequest> {
    request: Arc<R>,
    channel: Arc<dyn Channel>,
    state: State,
    context: R::Context,
    backoff: ExponentialBackoff,
    backoff_unbounded: ExponentialBackoff,
    cancel: CancellationToken,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl<R: MirrorRequest> SubscribeIterator<R> {
    /// `timeout` bounds the retries of codes the request marks retryable.
    pub fn new(request: Arc<R>, channel: Arc<dyn Channel>, timeout: Duration) -> Self {
        Self {
            request,
            channel,
            state: State::Start,
            context: R::Context::default(),
            backoff: ExponentialBackoff::default().with_max_elapsed_time(MaxElapsedTime::Limited(timeout)),
            backoff_unbounded: ExponentialBackoff::default().with_max_elapsed_time(MaxElapsedTime::Unlimited),
            cancel: CancellationToken::new(),
            metrics: None,
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// The next raw item, `None` once the subscription has ended.
    ///
    /// After an error is returned the subscription is finished.
    pub async fn next(&mut self) -> Option<Result<R::GrpcItem>> {
        loop {
            if matches!(self.state, State::Finished) {
                return None;
            }

            if self.cancel.is_cancelled() {
                debug!(method = R::METHOD, "subscription cancelled");
                self.state = State::Finished;
                return Some(Err(LedgerError::Cancelled));
            }

            match std::mem::replace(&mut self.state, State::Finished) {
                State::Start => {
                    let payload = match self.request.make_query(&self.context) {
                        Ok(payload) => payload,
                        Err(e) => return Some(Err(e)),
                    };

                    self.backoff.reset();
                    self.backoff_unbounded.reset();

                    match self.channel.server_streaming(R::METHOD, payload).await {
                        Ok(stream) => self.state = State::Running(stream),
                        Err(error) => {
                            if let Err(e) = self.reconnect_after(error).await {
                                return Some(Err(e));
                            }
                        }
                    }
                }

                State::Running(mut stream) => {
                    let received = tokio::select! {
                        _ = self.cancel.cancelled() => {
                            debug!(method = R::METHOD, "subscription cancelled");
                            return Some(Err(LedgerError::Cancelled));
                        }
                        received = stream.next() => received,
                    };

                    match received {
                        None => return None,
                        Some(Ok(value)) => {
                            let item: R::GrpcItem = match serde_json::from_value(value) {
                                Ok(item) => item,
                                Err(e) => {
                                    return Some(Err(LedgerError::MalformedResponse(format!(
                                        "{}: {}",
                                        R::METHOD,
                                        e
                                    ))))
                                }
                            };

                            self.context.update(&item);
                            self.state = State::Running(stream);
                            return Some(Ok(item));
                        }
                        Some(Err(error)) => {
                            drop(stream);
                            if let Err(e) = self.reconnect_after(error).await {
                                return Some(Err(e));
                            }
                        }
                    }
                }

                State::Finished => return None,
            }
        }
    }

    /// Classifies a transport failure. On `Ok` the state is `Start` again (or
    /// `Finished` if cancelled while sleeping); on `Err` it stays `Finished`.
    async fn reconnect_after(&mut self, error: TransportError) -> Result<()> {
        let delay = match error.code {
            Code::Unavailable | Code::ResourceExhausted | Code::Aborted => self
                .backoff_unbounded
                .next_backoff()
                .unwrap_or(self.backoff_unbounded.max_interval),

            code if self.request.should_retry(code) => match self.backoff.next_backoff() {
                Some(delay) => delay,
                None => {
                    warn!(method = R::METHOD, code = ?code, "subscription retries exhausted");
                    return Err(LedgerError::timed_out(Some(error.into())));
                }
            },

            _ => return Err(error.into()),
        };

        warn!(
            method = R::METHOD,
            code = ?error.code,
            delay_ms = delay.as_millis() as u64,
            "subscription interrupted, reconnecting"
        );
        if let Some(metrics) = &self.metrics {
            metrics.record_reconnect();
        }

        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = tokio::time::sleep(delay) => {}
        }

        self.state = State::Start;
        Ok(())
    }

    /// Raw items as a stream.
    pub fn into_stream(self) -> BoxStream<'static, Result<R::GrpcItem>> {
        stream::unfold(self, |mut iterator| async move {
            let item = iterator.next().await?;
            Some((item, iterator))
        })
        .boxed()
    }

    /// Caller items as a stream.
    pub fn into_item_stream(self) -> BoxStream<'static, Result<R::Item>> {
        R::make_item_stream(self.into_stream())
    }
}

/// Drains a subscription, failing on its first error.
pub async fn collect<R: MirrorRequest>(iterator: SubscribeIterator<R>) -> Result<Vec<R::Item>> {
    let mut items = iterator.into_item_stream();
    let mut collected = Vec::new();
    while let Some(item) = items.next().await {
        collected.push(item?);
    }
    Ok(collected)
}
