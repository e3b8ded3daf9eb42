//! Notification client
//!
//! Owns the subscriber registry and at most one push connection. The
//! connection exists exactly while somebody is listening:
//!
//! - the first `subscribe` from `Idle` opens it,
//! - the last `cancel` closes it and disarms any reconnect timer,
//! - a transport error is fanned out as an `error` event, the dead
//!   connection is dropped and a reconnect is armed.
//!
//! Registry and lifecycle state sit behind one lock so "no subscribers" and
//! "no connection" always change together. The lock is never held while a
//! transport is asked to connect or close, or while a callback runs.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use reqwest::Url;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::auth::CredentialProvider;
use crate::dispatch::Dispatcher;
use crate::error::{Error, Result, TransportError};
use crate::event::NotificationEvent;
use crate::registry::{Callback, SubscriberId, SubscriberRegistry};
use crate::stats::{ClientStats, StatsSnapshot};
use crate::transport::{
    ConnectRequest, Connection, ConnectionId, HttpTransport, SseFrame, Transport, TransportEvents,
    TransportListener,
};

use super::config::ClientConfig;
use super::state::ConnectionState;
use super::subscription::Subscription;

/// Real-time notification client
///
/// Cheap to clone; clones share one registry and one connection. Must be
/// created inside a tokio runtime, which then drives the connection and the
/// reconnect timer.
///
/// # Example
/// ```no_run
/// use order_notify_rs::auth::StaticCredentials;
/// use order_notify_rs::client::{ClientConfig, NotificationClient};
///
/// # async fn example() -> order_notify_rs::error::Result<()> {
/// let client = NotificationClient::new(ClientConfig::default(), StaticCredentials::new("jwt"))?;
///
/// let subscription = client.subscribe(|event| {
///     println!("{}", event);
/// })?;
///
/// // ... later
/// subscription.cancel();
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct NotificationClient {
    shared: Arc<Shared>,
}

impl NotificationClient {
    /// Create a client that connects over HTTP
    pub fn new<C>(config: ClientConfig, credentials: C) -> Result<Self>
    where
        C: CredentialProvider,
    {
        let transport = HttpTransport::with_connect_timeout(config.connect_timeout)?
            .idle_timeout(config.idle_timeout);
        Self::with_transport(config, credentials, transport)
    }

    /// Create a client on top of a custom transport
    pub fn with_transport<C, T>(config: ClientConfig, credentials: C, transport: T) -> Result<Self>
    where
        C: CredentialProvider,
        T: Transport,
    {
        let endpoint = config.validate()?;
        let runtime = Handle::try_current().map_err(|e| Error::NoRuntime(e.to_string()))?;

        let stats = Arc::new(ClientStats::new());
        let dispatcher = Dispatcher::new(config.event_name.as_str(), Arc::clone(&stats));

        tracing::debug!(
            endpoint = %endpoint,
            event = %config.event_name,
            "Notification client created"
        );

        let shared = Arc::new_cyclic(|this| Shared {
            this: this.clone(),
            config,
            endpoint,
            transport: Box::new(transport),
            credentials: Arc::new(credentials),
            runtime,
            dispatcher,
            stats,
            inner: Mutex::new(Inner::new()),
        });

        Ok(Self { shared })
    }

    /// Register a callback for every delivered event
    ///
    /// Opens the connection if this is the first subscriber. Only fails once
    /// the client has been shut down.
    ///
    /// The callback stays registered only while the returned [`Subscription`]
    /// is alive. Bind it (`let _sub = ...`); `let _ = ...` drops it on the
    /// spot and cancels the callback immediately.
    pub fn subscribe<F>(&self, callback: F) -> Result<Subscription>
    where
        F: Fn(&NotificationEvent) + Send + Sync + 'static,
    {
        self.subscribe_boxed(Box::new(callback))
    }

    /// Register an already boxed callback
    pub fn subscribe_boxed(&self, callback: Callback) -> Result<Subscription> {
        let id = self.shared.subscribe(callback)?;
        Ok(Subscription::new(id, Arc::downgrade(&self.shared)))
    }

    /// Subscribe through a channel instead of a callback
    ///
    /// Events are queued without bound; the receiver should be drained by a
    /// task of its own.
    pub fn subscribe_channel(
        &self,
    ) -> Result<(Subscription, mpsc::UnboundedReceiver<NotificationEvent>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.subscribe(move |event| {
            let _ = tx.send(event.clone());
        })?;
        Ok((subscription, rx))
    }

    /// Cancel every subscription, close the connection and refuse new
    /// subscribers
    pub fn shutdown(&self) {
        self.shared.shutdown();
    }

    /// Whether `shutdown` has been called
    pub fn is_shut_down(&self) -> bool {
        self.shared.inner.lock().shut_down
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConnectionState {
        self.shared.inner.lock().state
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.shared.inner.lock().registry.len()
    }

    /// Attempt currently considered live, if any
    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.shared.inner.lock().current
    }

    /// Counter snapshot
    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Configuration in use
    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }

    /// Parsed stream endpoint
    pub fn endpoint(&self) -> &Url {
        &self.shared.endpoint
    }
}

impl std::fmt::Debug for NotificationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.shared.inner.lock();
        f.debug_struct("NotificationClient")
            .field("endpoint", &self.shared.endpoint.as_str())
            .field("state", &inner.state)
            .field("subscribers", &inner.registry.len())
            .field("connection", &inner.current)
            .finish()
    }
}

/// State shared by client clones, subscriptions, timers and transports
pub(crate) struct Shared {
    this: Weak<Shared>,
    config: ClientConfig,
    endpoint: Url,
    transport: Box<dyn Transport>,
    credentials: Arc<dyn CredentialProvider>,
    runtime: Handle,
    dispatcher: Dispatcher,
    stats: Arc<ClientStats>,
    inner: Mutex<Inner>,
}

struct Inner {
    registry: SubscriberRegistry,
    state: ConnectionState,
    /// Attempt whose signals are honoured
    current: Option<ConnectionId>,
    last_connection_id: u64,
    connection: Option<Box<dyn Connection>>,
    reconnect_timer: Option<JoinHandle<()>>,
    /// Bumped whenever a timer is armed or disarmed
    timer_epoch: u64,
    /// Consecutive failures since the last successful open
    failures: u32,
    shut_down: bool,
}

impl Inner {
    fn new() -> Self {
        Self {
            registry: SubscriberRegistry::new(),
            state: ConnectionState::Idle,
            current: None,
            last_connection_id: 0,
            connection: None,
            reconnect_timer: None,
            timer_epoch: 0,
            failures: 0,
            shut_down: false,
        }
    }

    fn is_current(&self, id: ConnectionId) -> bool {
        self.current == Some(id)
    }

    fn begin_attempt(&mut self) -> ConnectionId {
        self.last_connection_id += 1;
        let id = ConnectionId(self.last_connection_id);
        self.current = Some(id);
        self.state = ConnectionState::Connecting;
        id
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.reconnect_timer.take() {
            timer.abort();
        }
        self.timer_epoch += 1;
    }

    /// Back to `Idle`. The returned connection must be closed after the lock
    /// is released.
    fn teardown(&mut self) -> Option<Box<dyn Connection>> {
        self.current = None;
        self.state = ConnectionState::Idle;
        self.failures = 0;
        self.cancel_timer();
        self.connection.take()
    }
}

fn close_connection(connection: Option<Box<dyn Connection>>) {
    if let Some(mut connection) = connection {
        connection.close();
    }
}

impl Shared {
    fn listener(&self) -> Weak<dyn TransportListener> {
        self.this.clone()
    }

    fn subscribe(&self, callback: Callback) -> Result<SubscriberId> {
        let (id, attempt) = {
            let mut inner = self.inner.lock();
            if inner.shut_down {
                return Err(Error::Shutdown);
            }

            let id = inner.registry.add_boxed(callback);
            let attempt = if inner.state == ConnectionState::Idle {
                Some(inner.begin_attempt())
            } else {
                None
            };

            tracing::debug!(
                subscriber = %id,
                subscribers = inner.registry.len(),
                state = %inner.state,
                "Subscriber added"
            );
            (id, attempt)
        };

        if let Some(connection_id) = attempt {
            self.start_connection(connection_id);
        }
        Ok(id)
    }

    pub(crate) fn unsubscribe(&self, id: SubscriberId) {
        let (removed, connection) = {
            let mut inner = self.inner.lock();
            let Some(removed) = inner.registry.remove(id) else {
                return;
            };

            tracing::debug!(
                subscriber = %id,
                subscribers = inner.registry.len(),
                "Subscriber removed"
            );

            let connection = if inner.registry.is_empty() && inner.state.is_active() {
                tracing::info!(state = %inner.state, "Last subscriber left, closing notification stream");
                inner.teardown()
            } else {
                None
            };
            (removed, connection)
        };

        close_connection(connection);
        drop(removed);
    }

    fn shutdown(&self) {
        let (removed, connection) = {
            let mut inner = self.inner.lock();
            if inner.shut_down {
                return;
            }
            inner.shut_down = true;
            let removed = inner.registry.clear();
            (removed, inner.teardown())
        };

        tracing::info!(subscribers = removed.len(), "Notification client shut down");
        close_connection(connection);
        drop(removed);
    }

    fn start_connection(&self, id: ConnectionId) {
        let request = ConnectRequest {
            id,
            endpoint: self.endpoint.clone(),
            auth: self.credentials.bearer_token(),
        };

        self.stats.record_connect_attempt();
        tracing::info!(
            connection_id = %id,
            endpoint = %self.endpoint,
            authenticated = request.auth.is_some(),
            "Opening notification stream"
        );

        let events = TransportEvents::new(id, self.listener());
        let connection = self.transport.connect(request, events);

        let mut inner = self.inner.lock();
        if inner.is_current(id) && inner.connection.is_none() {
            inner.connection = Some(connection);
            return;
        }
        drop(inner);

        tracing::debug!(connection_id = %id, "Connection abandoned while opening");
        close_connection(Some(connection));
    }

    fn schedule_reconnect(&self, inner: &mut Inner) {
        let delay = self.config.reconnect.delay_for(inner.failures);
        inner.failures = inner.failures.saturating_add(1);
        inner.state = ConnectionState::ReconnectPending;
        inner.cancel_timer();

        let epoch = inner.timer_epoch;
        let shared = self.this.clone();
        inner.reconnect_timer = Some(self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(shared) = shared.upgrade() {
                shared.reconnect_due(epoch);
            }
        }));

        self.stats.record_reconnect_scheduled();
        tracing::info!(
            delay_ms = delay.as_millis() as u64,
            failures = inner.failures,
            "Reconnect scheduled"
        );
    }

    fn reconnect_due(&self, epoch: u64) {
        let id = {
            let mut inner = self.inner.lock();
            if inner.timer_epoch != epoch || inner.state != ConnectionState::ReconnectPending {
                return;
            }
            inner.reconnect_timer = None;

            if inner.registry.is_empty() {
                inner.state = ConnectionState::Idle;
                tracing::debug!("Reconnect timer fired with no subscribers");
                return;
            }
            inner.begin_attempt()
        };

        self.start_connection(id);
    }
}

impl TransportListener for Shared {
    fn on_open(&self, id: ConnectionId) {
        {
            let mut inner = self.inner.lock();
            if !inner.is_current(id) {
                tracing::trace!(connection_id = %id, "Ignoring open from stale connection");
                return;
            }
            inner.state = ConnectionState::Open;
            inner.failures = 0;
        }

        self.stats.record_connection_opened();
        tracing::info!(connection_id = %id, "Notification stream open");
    }

    fn on_frame(&self, id: ConnectionId, frame: SseFrame) {
        let subscribers = {
            let inner = self.inner.lock();
            if !inner.is_current(id) {
                tracing::trace!(connection_id = %id, event = %frame.event, "Ignoring frame from stale connection");
                return;
            }
            inner.registry.snapshot()
        };

        self.dispatcher.on_frame(&frame, &subscribers);
    }

    fn on_error(&self, id: ConnectionId, err: TransportError) {
        let subscribers = {
            let inner = self.inner.lock();
            if !inner.is_current(id) {
                tracing::trace!(connection_id = %id, error = %err, "Ignoring error from stale connection");
                return;
            }
            inner.registry.snapshot()
        };

        self.stats.record_transport_error();
        tracing::warn!(
            connection_id = %id,
            error = %err,
            recoverable = err.is_recoverable(),
            "Notification stream failed"
        );

        self.dispatcher.on_transport_error(&err, &subscribers);
        drop(subscribers);

        let connection = {
            let mut inner = self.inner.lock();
            // A callback may have cancelled the last subscription
            if !inner.is_current(id) {
                return;
            }
            inner.current = None;
            let connection = inner.connection.take();
            self.schedule_reconnect(&mut inner);
            connection
        };

        close_connection(connection);
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        close_connection(self.inner.get_mut().teardown());
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::auth::{SessionCredentials, StaticCredentials};
    use crate::client::config::{ReconnectPolicy, DEFAULT_ENDPOINT};
    use crate::event::{ERROR_KIND, ORDER_CREATED_KIND};
    use crate::transport::mock::MockTransport;

    fn client_with(transport: &Arc<MockTransport>, config: ClientConfig) -> NotificationClient {
        NotificationClient::with_transport(
            config,
            StaticCredentials::new("token-1"),
            Arc::clone(transport),
        )
        .unwrap()
    }

    fn client(transport: &Arc<MockTransport>) -> NotificationClient {
        client_with(transport, ClientConfig::default())
    }

    fn order(id: u64) -> SseFrame {
        SseFrame::new(ORDER_CREATED_KIND, json!({ "orderId": id }).to_string())
    }

    fn recorder(client: &NotificationClient) -> (Subscription, Arc<Mutex<Vec<NotificationEvent>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let subscription = client
            .subscribe(move |event| sink.lock().push(event.clone()))
            .unwrap();
        (subscription, seen)
    }

    fn order_ids(seen: &Mutex<Vec<NotificationEvent>>) -> Vec<u64> {
        seen.lock()
            .iter()
            .filter_map(|e| e.payload["orderId"].as_u64())
            .collect()
    }

    #[tokio::test]
    async fn test_connects_lazily_and_once() {
        let transport = MockTransport::new();
        let client = client(&transport);

        assert_eq!(client.state(), ConnectionState::Idle);
        assert_eq!(transport.attempts(), 0);

        let subscriptions: Vec<_> = (0..5).map(|_| client.subscribe(|_| {}).unwrap()).collect();

        assert_eq!(transport.attempts(), 1);
        assert_eq!(client.state(), ConnectionState::Connecting);
        assert_eq!(client.subscriber_count(), subscriptions.len());

        let attempt = transport.last();
        assert_eq!(attempt.request.endpoint.as_str(), DEFAULT_ENDPOINT);
        assert_eq!(
            attempt.request.auth.as_ref().map(|t| t.expose()),
            Some("token-1")
        );

        attempt.events.opened();
        assert_eq!(client.state(), ConnectionState::Open);
        assert_eq!(client.connection_id(), Some(attempt.request.id));
    }

    #[tokio::test]
    async fn test_last_cancel_closes_connection() {
        let transport = MockTransport::new();
        let client = client(&transport);

        let a = client.subscribe(|_| {}).unwrap();
        let b = client.subscribe(|_| {}).unwrap();
        transport.last().events.opened();

        a.cancel();
        assert!(!transport.last().is_closed());
        assert_eq!(client.state(), ConnectionState::Open);

        b.cancel();
        assert!(transport.last().is_closed());
        assert_eq!(client.state(), ConnectionState::Idle);
        assert_eq!(client.connection_id(), None);
        assert_eq!(transport.live(), 0);
    }

    #[tokio::test]
    async fn test_resubscribe_after_idle_opens_new_connection() {
        let transport = MockTransport::new();
        let client = client(&transport);

        client.subscribe(|_| {}).unwrap().cancel();
        let _again = client.subscribe(|_| {}).unwrap();

        assert_eq!(transport.attempts(), 2);
        assert!(transport.attempt(0).is_closed());
        assert_eq!(transport.live(), 1);
        assert!(transport.attempt(1).request.id > transport.attempt(0).request.id);
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let transport = MockTransport::new();
        let client = client(&transport);

        let a = client.subscribe(|_| {}).unwrap();
        let (_b, seen) = recorder(&client);
        transport.last().events.opened();

        a.cancel();
        a.cancel();
        assert!(a.is_cancelled());
        assert_eq!(client.subscriber_count(), 1);
        assert!(!transport.last().is_closed());

        transport.last().events.frame(order(1));
        assert_eq!(order_ids(&seen), vec![1]);
    }

    #[tokio::test]
    async fn test_dropping_subscription_cancels() {
        let transport = MockTransport::new();
        let client = client(&transport);

        {
            let _subscription = client.subscribe(|_| {}).unwrap();
            assert_eq!(client.subscriber_count(), 1);
        }

        assert_eq!(client.subscriber_count(), 0);
        assert_eq!(client.state(), ConnectionState::Idle);
        assert!(transport.last().is_closed());
    }

    #[tokio::test]
    async fn test_discarded_subscription_is_cancelled_at_once() {
        let transport = MockTransport::new();
        let client = client(&transport);

        let _ = client.subscribe(|_| {}).unwrap();

        assert_eq!(client.subscriber_count(), 0);
        assert_eq!(client.state(), ConnectionState::Idle);
        assert_eq!(transport.attempts(), 1);
        assert!(transport.last().is_closed());

        let _kept = client.subscribe(|_| {}).unwrap();
        assert_eq!(client.subscriber_count(), 1);
        assert_eq!(transport.live(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_churn_leaves_no_connection() {
        let transport = MockTransport::new();
        let client = client(&transport);

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let client = client.clone();
                tokio::spawn(async move {
                    for _ in 0..500 {
                        let subscription = client.subscribe(|_| {}).unwrap();
                        tokio::task::yield_now().await;
                        subscription.cancel();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.await.unwrap();
        }

        assert_eq!(client.subscriber_count(), 0);
        assert_eq!(client.state(), ConnectionState::Idle);
        assert_eq!(client.connection_id(), None);
        assert!(transport.attempts() >= 1);
        assert_eq!(transport.live(), 0);
    }

    #[tokio::test]
    async fn test_panicking_callback_does_not_stop_others() {
        let transport = MockTransport::new();
        let client = client(&transport);

        let (_a, first) = recorder(&client);
        let _b = client.subscribe(|_| panic!("bad subscriber")).unwrap();
        let (_c, third) = recorder(&client);
        transport.last().events.opened();

        transport.last().events.frame(order(1));
        transport.last().events.frame(order(2));

        assert_eq!(order_ids(&first), vec![1, 2]);
        assert_eq!(order_ids(&third), vec![1, 2]);
        assert_eq!(client.stats().callback_panics, 2);
        assert_eq!(client.state(), ConnectionState::Open);
    }

    #[tokio::test]
    async fn test_late_subscriber_gets_no_replay() {
        let transport = MockTransport::new();
        let client = client(&transport);

        let (_early, early_seen) = recorder(&client);
        transport.last().events.opened();
        transport.last().events.frame(order(1));

        let (_late, late_seen) = recorder(&client);
        transport.last().events.frame(order(2));

        assert_eq!(order_ids(&early_seen), vec![1, 2]);
        assert_eq!(order_ids(&late_seen), vec![2]);
    }

    #[tokio::test]
    async fn test_malformed_frame_keeps_connection() {
        let transport = MockTransport::new();
        let client = client(&transport);

        let (_s, seen) = recorder(&client);
        transport.last().events.opened();
        transport
            .last()
            .events
            .frame(SseFrame::new(ORDER_CREATED_KIND, "{\"orderId\": "));
        transport.last().events.frame(order(2));

        assert_eq!(order_ids(&seen), vec![2]);
        assert_eq!(client.state(), ConnectionState::Open);
        assert!(!transport.last().is_closed());
        assert_eq!(client.stats().decode_errors, 1);
    }

    #[tokio::test]
    async fn test_other_event_names_are_not_delivered() {
        let transport = MockTransport::new();
        let client = client(&transport);

        let (_s, seen) = recorder(&client);
        transport.last().events.opened();
        transport
            .last()
            .events
            .frame(SseFrame::new("connected", "Connected to notification service"));

        assert!(seen.lock().is_empty());
        assert_eq!(client.stats().frames_ignored, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_is_delivered_then_reconnects_after_delay() {
        let transport = MockTransport::new();
        let client = client(&transport);

        let (_a, a_seen) = recorder(&client);
        let (_b, b_seen) = recorder(&client);
        transport.last().events.opened();

        transport.last().events.error(TransportError::Status(401));

        for seen in [&a_seen, &b_seen] {
            let events = seen.lock();
            assert_eq!(events.len(), 1);
            assert_eq!(events[0].kind(), ERROR_KIND);
            assert_eq!(
                events[0].error_message(),
                Some("Server responded with HTTP 401")
            );
            assert_eq!(events[0].payload["recoverable"], false);
        }

        assert!(transport.attempt(0).is_closed());
        assert_eq!(client.state(), ConnectionState::ReconnectPending);
        assert_eq!(client.connection_id(), None);

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(transport.attempts(), 1);

        tokio::time::sleep(Duration::from_millis(1001)).await;
        assert_eq!(transport.attempts(), 2);
        assert_eq!(client.state(), ConnectionState::Connecting);
        assert_eq!(transport.live(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_reconnect_after_last_cancel() {
        let transport = MockTransport::new();
        let client = client(&transport);

        let subscription = client.subscribe(|_| {}).unwrap();
        transport.last().events.opened();
        transport.last().events.error(TransportError::Closed);
        assert_eq!(client.state(), ConnectionState::ReconnectPending);

        subscription.cancel();
        assert_eq!(client.state(), ConnectionState::Idle);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(transport.attempts(), 1);
        assert_eq!(client.state(), ConnectionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribe_while_reconnect_pending_waits_for_timer() {
        let transport = MockTransport::new();
        let client = client(&transport);

        let _a = client.subscribe(|_| {}).unwrap();
        transport.last().events.error(TransportError::Connect("refused".into()));

        let _b = client.subscribe(|_| {}).unwrap();
        assert_eq!(transport.attempts(), 1);
        assert_eq!(client.state(), ConnectionState::ReconnectPending);

        tokio::time::sleep(Duration::from_millis(5001)).await;
        assert_eq!(transport.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_signals_are_ignored() {
        let transport = MockTransport::new();
        let client = client(&transport);

        let (_s, seen) = recorder(&client);
        let stale = transport.last();
        stale.events.opened();
        stale.events.error(TransportError::Closed);

        tokio::time::sleep(Duration::from_millis(5001)).await;
        let fresh = transport.last();
        assert_ne!(fresh.request.id, stale.request.id);
        fresh.events.opened();
        seen.lock().clear();

        stale.events.frame(order(9));
        stale.events.error(TransportError::Closed);
        stale.events.opened();

        assert!(seen.lock().is_empty());
        assert_eq!(client.state(), ConnectionState::Open);
        assert_eq!(client.connection_id(), Some(fresh.request.id));

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(transport.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_grows_and_resets_on_open() {
        let transport = MockTransport::new();
        let config = ClientConfig::default().reconnect_policy(ReconnectPolicy::exponential(
            Duration::from_secs(1),
            Duration::from_secs(8),
        ));
        let client = client_with(&transport, config);
        let _s = client.subscribe(|_| {}).unwrap();

        transport.last().events.error(TransportError::Closed);
        tokio::time::sleep(Duration::from_millis(1001)).await;
        assert_eq!(transport.attempts(), 2);

        transport.last().events.error(TransportError::Closed);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(transport.attempts(), 2);
        tokio::time::sleep(Duration::from_millis(501)).await;
        assert_eq!(transport.attempts(), 3);

        transport.last().events.opened();
        transport.last().events.error(TransportError::Closed);
        tokio::time::sleep(Duration::from_millis(1001)).await;
        assert_eq!(transport.attempts(), 4);
    }

    #[tokio::test]
    async fn test_cancel_from_inside_callback() {
        let transport = MockTransport::new();
        let client = client(&transport);

        let hits = Arc::new(AtomicUsize::new(0));
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let subscription = {
            let hits = Arc::clone(&hits);
            let slot = Arc::clone(&slot);
            client
                .subscribe(move |_| {
                    hits.fetch_add(1, Ordering::SeqCst);
                    if let Some(own) = slot.lock().take() {
                        own.cancel();
                    }
                })
                .unwrap()
        };
        *slot.lock() = Some(subscription);
        transport.last().events.opened();

        transport.last().events.frame(order(1));
        transport.last().events.frame(order(2));

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(client.state(), ConnectionState::Idle);
        assert!(transport.last().is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_error_dispatch_skips_reconnect() {
        let transport = MockTransport::new();
        let client = client(&transport);

        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let subscription = {
            let slot = Arc::clone(&slot);
            client
                .subscribe(move |event| {
                    if event.is_error() {
                        slot.lock().take();
                    }
                })
                .unwrap()
        };
        *slot.lock() = Some(subscription);

        transport.last().events.error(TransportError::Closed);
        assert_eq!(client.state(), ConnectionState::Idle);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(transport.attempts(), 1);
        assert_eq!(client.stats().reconnects_scheduled, 0);
    }

    #[tokio::test]
    async fn test_channel_subscriber() {
        let transport = MockTransport::new();
        let client = client(&transport);

        let (_subscription, mut rx) = client.subscribe_channel().unwrap();
        transport.last().events.opened();

        let mut recv = tokio_test::task::spawn(rx.recv());
        tokio_test::assert_pending!(recv.poll());

        transport.last().events.frame(SseFrame::new(
            ORDER_CREATED_KIND,
            json!({
                "orderId": 5,
                "status": "PENDING",
                "createdById": 7,
                "customerId": 42,
            })
            .to_string(),
        ));

        assert!(recv.is_woken());
        let event = tokio_test::assert_ready!(recv.poll()).unwrap();
        assert!(event.is_order_created());
        let order = event.order_created().unwrap().unwrap();
        assert_eq!(order.order_id, 5);
        assert_eq!(order.customer_id, 42);
    }

    #[tokio::test]
    async fn test_shutdown_refuses_new_subscribers() {
        let transport = MockTransport::new();
        let client = client(&transport);

        let subscription = client.subscribe(|_| {}).unwrap();
        client.shutdown();

        assert!(client.is_shut_down());
        assert!(transport.last().is_closed());
        assert_eq!(client.state(), ConnectionState::Idle);
        assert_eq!(client.subscriber_count(), 0);
        assert!(matches!(client.subscribe(|_| {}), Err(Error::Shutdown)));

        subscription.cancel();
        client.shutdown();
        assert_eq!(transport.attempts(), 1);
    }

    #[tokio::test]
    async fn test_dropping_client_closes_connection() {
        let transport = MockTransport::new();
        let client = client(&transport);

        let subscription = client.subscribe(|_| {}).unwrap();
        let attempt = transport.last();
        drop(client);

        assert!(attempt.is_closed());
        assert!(!attempt.events.is_attached());
        subscription.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_attempt_reads_current_token() {
        let transport = MockTransport::new();
        let credentials = Arc::new(SessionCredentials::new());
        credentials.set("first", "alice");

        let client = NotificationClient::with_transport(
            ClientConfig::default(),
            Arc::clone(&credentials),
            Arc::clone(&transport),
        )
        .unwrap();

        let _s = client.subscribe(|_| {}).unwrap();
        credentials.set("second", "alice");
        transport.last().events.error(TransportError::Status(401));
        tokio::time::sleep(Duration::from_millis(5001)).await;

        let tokens: Vec<_> = (0..2)
            .map(|i| transport.attempt(i).request.auth.clone().map(|t| t.expose().to_string()))
            .collect();
        assert_eq!(tokens, vec![Some("first".into()), Some("second".into())]);
    }

    #[tokio::test]
    async fn test_stats() {
        let transport = MockTransport::new();
        let client = client(&transport);

        let (_s, _) = recorder(&client);
        transport.last().events.opened();
        transport.last().events.frame(order(1));
        transport.last().events.error(TransportError::Closed);

        let stats = client.stats();
        assert_eq!(stats.connect_attempts, 1);
        assert_eq!(stats.connections_opened, 1);
        assert_eq!(stats.frames_received, 1);
        assert_eq!(stats.events_dispatched, 2);
        assert_eq!(stats.deliveries, 2);
        assert_eq!(stats.transport_errors, 1);
        assert_eq!(stats.reconnects_scheduled, 1);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let transport = MockTransport::new();
        let result = NotificationClient::with_transport(
            ClientConfig::new("not a url"),
            StaticCredentials::anonymous(),
            transport,
        );
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_requires_runtime() {
        let result = NotificationClient::with_transport(
            ClientConfig::default(),
            StaticCredentials::anonymous(),
            MockTransport::new(),
        );
        assert!(matches!(result, Err(Error::NoRuntime(_))));
    }
}
