use std::collections::HashMap;
use std::sync::Arc;

use domain::common::entity::EntityKind;
use domain::propagation::entity::{ChangeEvent, ReplayBuffer, StreamKey};
use ports::secondary::metrics_port::MetricsPort;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::retry::{RetryConfig, retry_with_backoff};

/// Tuning for the change propagator.
#[derive(Debug, Clone)]
pub struct PropagatorConfig {
    /// Capacity of the internal publish queue.
    pub queue_capacity: usize,
    /// Events retained per stream for reconnect replay.
    pub replay_capacity: usize,
    /// Per-subscriber channel buffer. A subscriber that falls this far
    /// behind is dropped and must reconnect with its last acknowledged
    /// version.
    pub subscriber_buffer: usize,
    /// Backoff for re-enqueueing when the publish queue is full.
    pub retry: RetryConfig,
}

impl Default for PropagatorConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            replay_capacity: 256,
            subscriber_buffer: 64,
            retry: RetryConfig::default(),
        }
    }
}

enum Command {
    Publish(ChangeEvent),
    Subscribe {
        stream: StreamKey,
        since_version: u64,
        tx: mpsc::Sender<ChangeEvent>,
    },
}

/// Fan-out layer for config/secret/policy change notifications.
///
/// `publish` never blocks and never fails the originating mutation: the
/// event goes into a bounded queue, and if that queue is full a detached
/// task retries with backoff before giving up with a warning. A single
/// dispatcher task appends each event to the per-stream replay buffer and
/// forwards it to subscribers. Delivery per stream is in version order;
/// the contract is at-least-once, so consumers dedupe on
/// `(kind, key, version)`.
#[derive(Clone)]
pub struct ChangePropagator {
    tx: mpsc::Sender<Command>,
    config: PropagatorConfig,
    metrics: Arc<dyn MetricsPort>,
}

impl ChangePropagator {
    /// Create the propagator and spawn its dispatcher task. The task runs
    /// until `shutdown` is cancelled and the queue drains.
    pub fn new(
        config: PropagatorConfig,
        metrics: Arc<dyn MetricsPort>,
        shutdown: CancellationToken,
    ) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let dispatcher = Dispatcher {
            replay_capacity: config.replay_capacity,
            metrics: Arc::clone(&metrics),
            buffers: HashMap::new(),
            subscribers: HashMap::new(),
        };
        tokio::spawn(dispatcher.run(rx, shutdown));
        Self {
            tx,
            config,
            metrics,
        }
    }

    /// Enqueue a change event. Non-blocking; the caller's mutation has
    /// already succeeded and is never rolled back. A full queue falls
    /// back to a detached retry task with backoff.
    pub fn publish(&self, event: ChangeEvent) {
        self.metrics.record_event_published(event.kind.as_str());
        match self.tx.try_send(Command::Publish(event)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(command)) => {
                let tx = self.tx.clone();
                let retry = self.config.retry.clone();
                let metrics = Arc::clone(&self.metrics);
                let mut command = Some(command);
                tokio::spawn(async move {
                    let result = retry_with_backoff(&retry, || {
                        let attempt = match command.take() {
                            // The queue closed mid-retry; nothing left to do.
                            None => Ok(()),
                            Some(c) => match tx.try_send(c) {
                                Ok(()) => Ok(()),
                                Err(mpsc::error::TrySendError::Full(c)) => {
                                    command = Some(c);
                                    Err(domain::common::error::DomainError::StoreFailed(
                                        "publish queue full".to_string(),
                                    ))
                                }
                                Err(mpsc::error::TrySendError::Closed(_)) => Ok(()),
                            },
                        };
                        async move { attempt }
                    })
                    .await;
                    if let Err(e) = result {
                        metrics.record_event_dropped("queue_full");
                        tracing::warn!(error = %e, "change event dropped after retries");
                    }
                });
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.metrics.record_event_dropped("stopped");
                tracing::warn!("change event dropped: propagator stopped");
            }
        }
    }

    /// Subscribe to one stream, replaying buffered events with
    /// `version > since_version` before live delivery. The returned
    /// channel closes when the subscriber is dropped for falling behind.
    pub async fn subscribe(
        &self,
        kind: EntityKind,
        key: impl Into<String>,
        since_version: u64,
    ) -> mpsc::Receiver<ChangeEvent> {
        let (tx, rx) = mpsc::channel(self.config.subscriber_buffer.max(1));
        let command = Command::Subscribe {
            stream: StreamKey::new(kind, key),
            since_version,
            tx,
        };
        if self.tx.send(command).await.is_err() {
            tracing::warn!("subscribe ignored: propagator stopped");
        }
        rx
    }
}

struct Dispatcher {
    replay_capacity: usize,
    metrics: Arc<dyn MetricsPort>,
    buffers: HashMap<StreamKey, ReplayBuffer>,
    subscribers: HashMap<StreamKey, Vec<mpsc::Sender<ChangeEvent>>>,
}

impl Dispatcher {
    async fn run(mut self, mut rx: mpsc::Receiver<Command>, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                command = rx.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                () = shutdown.cancelled() => {
                    // Drain whatever is already queued, then stop.
                    while let Ok(command) = rx.try_recv() {
                        self.handle(command);
                    }
                    break;
                }
            }
        }
        tracing::debug!("change propagator dispatcher stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Publish(event) => self.dispatch(event),
            Command::Subscribe {
                stream,
                since_version,
                tx,
            } => self.register(stream, since_version, tx),
        }
    }

    /// Replay the buffered tail, then register for live events. Both
    /// happen inside the dispatcher so no event can slip between replay
    /// and registration.
    fn register(&mut self, stream: StreamKey, since_version: u64, tx: mpsc::Sender<ChangeEvent>) {
        if let Some(buffer) = self.buffers.get(&stream) {
            for event in buffer.since(since_version) {
                if tx.try_send(event).is_err() {
                    // Replay alone overflowed the buffer; the subscriber
                    // must reconnect with a larger ack floor.
                    self.metrics.record_subscriber_dropped();
                    tracing::warn!(stream = %stream, "subscriber dropped during replay");
                    return;
                }
            }
        }
        self.subscribers.entry(stream).or_default().push(tx);
        self.update_subscriber_gauge();
    }

    fn dispatch(&mut self, event: ChangeEvent) {
        let stream = event.stream_key();
        self.buffers
            .entry(stream.clone())
            .or_insert_with(|| ReplayBuffer::new(self.replay_capacity))
            .push(event.clone());

        let Some(subscribers) = self.subscribers.get_mut(&stream) else {
            return;
        };

        let mut dropped = 0usize;
        subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                // Backpressure: drop the laggard instead of buffering
                // without bound; it reconnects and resyncs from its last
                // acknowledged version.
                dropped += 1;
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
        if subscribers.is_empty() {
            self.subscribers.remove(&stream);
        }
        for _ in 0..dropped {
            self.metrics.record_subscriber_dropped();
            tracing::warn!(stream = %stream, "subscriber dropped: buffer overflow");
        }
        self.update_subscriber_gauge();
    }

    fn update_subscriber_gauge(&self) {
        let total: usize = self.subscribers.values().map(Vec::len).sum();
        self.metrics.set_subscribers(total as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ports::test_utils::NoopMetrics;
    use std::time::Duration;

    fn make_event(key: &str, version: u64) -> ChangeEvent {
        ChangeEvent {
            kind: EntityKind::Config,
            key: key.to_string(),
            version,
            payload: format!("{key}@{version}"),
            occurred_at_ms: version,
        }
    }

    fn make_propagator(config: PropagatorConfig) -> (ChangePropagator, CancellationToken) {
        let token = CancellationToken::new();
        let propagator = ChangePropagator::new(config, Arc::new(NoopMetrics), token.clone());
        (propagator, token)
    }

    async fn recv_timeout(rx: &mut mpsc::Receiver<ChangeEvent>) -> Option<ChangeEvent> {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .ok()
            .flatten()
    }

    #[tokio::test]
    async fn live_events_reach_subscriber_in_order() {
        let (propagator, _token) = make_propagator(PropagatorConfig::default());
        let mut rx = propagator.subscribe(EntityKind::Config, "db.timeout", 0).await;

        for v in 1..=3 {
            propagator.publish(make_event("db.timeout", v));
        }

        for expected in 1..=3 {
            let event = recv_timeout(&mut rx).await.unwrap();
            assert_eq!(event.version, expected);
        }
    }

    #[tokio::test]
    async fn replay_from_since_version() {
        let (propagator, _token) = make_propagator(PropagatorConfig::default());
        for v in 1..=5 {
            propagator.publish(make_event("db.timeout", v));
        }
        // Give the dispatcher a moment to buffer.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut rx = propagator.subscribe(EntityKind::Config, "db.timeout", 3).await;
        assert_eq!(recv_timeout(&mut rx).await.unwrap().version, 4);
        assert_eq!(recv_timeout(&mut rx).await.unwrap().version, 5);

        // Live events continue after the replay.
        propagator.publish(make_event("db.timeout", 6));
        assert_eq!(recv_timeout(&mut rx).await.unwrap().version, 6);
    }

    #[tokio::test]
    async fn streams_are_isolated() {
        let (propagator, _token) = make_propagator(PropagatorConfig::default());
        let mut rx = propagator.subscribe(EntityKind::Config, "a", 0).await;

        propagator.publish(make_event("b", 1));
        propagator.publish(make_event("a", 1));

        let event = recv_timeout(&mut rx).await.unwrap();
        assert_eq!(event.key, "a");
    }

    #[tokio::test]
    async fn slow_subscriber_is_dropped() {
        let config = PropagatorConfig {
            subscriber_buffer: 2,
            ..Default::default()
        };
        let (propagator, _token) = make_propagator(config);
        let mut rx = propagator.subscribe(EntityKind::Config, "k", 0).await;

        // Without consuming, overflow the 2-slot buffer.
        for v in 1..=5 {
            propagator.publish(make_event("k", v));
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        // The buffered events arrive, then the channel closes.
        assert_eq!(recv_timeout(&mut rx).await.unwrap().version, 1);
        assert_eq!(recv_timeout(&mut rx).await.unwrap().version, 2);
        assert!(recv_timeout(&mut rx).await.is_none());
    }

    #[tokio::test]
    async fn dropped_subscriber_can_resync() {
        let config = PropagatorConfig {
            subscriber_buffer: 4,
            ..Default::default()
        };
        let (propagator, _token) = make_propagator(config);
        let mut rx = propagator.subscribe(EntityKind::Config, "k", 0).await;

        // Eight events against a 4-slot buffer: the subscriber is dropped
        // after the fourth undelivered event.
        for v in 1..=8 {
            propagator.publish(make_event("k", v));
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut last_acked = 0;
        while let Some(event) = recv_timeout(&mut rx).await {
            last_acked = event.version;
        }
        assert_eq!(last_acked, 4, "subscriber was dropped mid-stream");

        // Reconnect from the last acknowledged version and catch up.
        let mut rx2 = propagator.subscribe(EntityKind::Config, "k", last_acked).await;
        let mut versions = Vec::new();
        for _ in 0..4 {
            versions.push(recv_timeout(&mut rx2).await.unwrap().version);
        }
        assert_eq!(versions, vec![5, 6, 7, 8]);
    }

    #[tokio::test]
    async fn publish_does_not_block_when_no_subscribers() {
        let (propagator, _token) = make_propagator(PropagatorConfig::default());
        for v in 1..=100 {
            propagator.publish(make_event("lonely", v));
        }
        // Nothing to assert beyond not hanging; the dispatcher absorbs all.
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn shutdown_stops_dispatcher() {
        let (propagator, token) = make_propagator(PropagatorConfig::default());
        let mut rx = propagator.subscribe(EntityKind::Config, "k", 0).await;
        propagator.publish(make_event("k", 1));
        assert!(recv_timeout(&mut rx).await.is_some());

        token.cancel();
        tokio::time::sleep(Duration::from_millis(50)).await;
        // Further publishes are dropped without panicking.
        propagator.publish(make_event("k", 2));
    }
}
