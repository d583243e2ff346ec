//! The public session facade.

use embassy_time::{Duration, Instant};

use super::cache::{Slot, TopicCache};
use super::connection::ConnectionManager;
use super::dispatch;
use super::liveness::Liveness;
use super::payload::IntoPayload;
use super::traits::{MessageHandler, MqttTransport, ReconnectHandler};
use crate::config::{ConnectionConfig, DEFAULT_MAX_TOPICS, MAX_TOPIC_LEN, WillConfig};
use crate::error::SessionError;

/// A durable MQTT session over any [`MqttTransport`].
///
/// The session remembers every topic it subscribed to (up to `MAX_TOPICS`),
/// keeps the last message received on each, and restores the subscriptions
/// whenever the connection has to be re-established. The host calls
/// [`refresh`](Self::refresh) periodically to keep it alive.
///
/// Handlers are borrowed for `'h`, so no allocator is needed.
///
/// # Example
///
/// ```ignore
/// let mut on_message = |topic: &str, message: &str| info!("{} = {}", topic, message);
/// let mut session = MqttSession::<_>::new(client);
/// session.set_callback(&mut on_message);
/// session.set_will(WillConfig::new("device/status", "offline")?);
/// session.connect("broker.local", 1883, None, None).await?;
/// session.subscribe("device/cmd").await?;
///
/// loop {
///     session.refresh().await;
///     session.put("device/temp", 21.5).await.ok();
///     Timer::after_millis(100).await;
/// }
/// ```
pub struct MqttSession<'h, T, const MAX_TOPICS: usize = DEFAULT_MAX_TOPICS> {
    connection: ConnectionManager<T>,
    cache: TopicCache<MAX_TOPICS>,
    liveness: Liveness,
    message_handler: Option<&'h mut dyn MessageHandler>,
    reconnect_handler: Option<&'h mut dyn ReconnectHandler>,
}

impl<'h, T: MqttTransport, const MAX_TOPICS: usize> MqttSession<'h, T, MAX_TOPICS> {
    pub fn new(transport: T) -> Self {
        Self {
            connection: ConnectionManager::new(transport),
            cache: TopicCache::new(),
            liveness: Liveness::default(),
            message_handler: None,
            reconnect_handler: None,
        }
    }

    /// Connects to `host:port`, authenticating if both `username` and
    /// `password` are given.
    ///
    /// The broker settings are kept for every later reconnect, whether or
    /// not this first attempt succeeds.
    pub async fn connect(
        &mut self,
        host: &str,
        port: u16,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<(), SessionError<T::Error>> {
        let config = ConnectionConfig::new(host, port, username, password)?;
        self.connection
            .connect(config, &self.cache, self.reconnect_handler.as_deref_mut())
            .await
    }

    /// Makes one attempt to bring the connection back. Succeeds immediately
    /// when already connected.
    pub async fn reconnect(&mut self) -> Result<(), SessionError<T::Error>> {
        self.connection
            .reconnect(&self.cache, self.reconnect_handler.as_deref_mut())
            .await
    }

    /// Closes the connection. Subscriptions and broker settings are kept,
    /// so `reconnect` restores the same session.
    pub async fn disconnect(&mut self) {
        self.connection.disconnect().await;
    }

    pub fn connected(&self) -> bool {
        self.connection.connected()
    }

    /// Publishes `value` on `topic`.
    ///
    /// When disconnected, one reconnect is attempted first; if that fails
    /// nothing is published and nothing is queued.
    pub async fn put<'p>(
        &mut self,
        topic: &str,
        value: impl IntoPayload<'p>,
    ) -> Result<(), SessionError<T::Error>> {
        self.publish(topic, value, false).await
    }

    /// Like [`put`](Self::put), with the retain flag set.
    pub async fn put_retain<'p>(
        &mut self,
        topic: &str,
        value: impl IntoPayload<'p>,
    ) -> Result<(), SessionError<T::Error>> {
        self.publish(topic, value, true).await
    }

    async fn publish<'p>(
        &mut self,
        topic: &str,
        value: impl IntoPayload<'p>,
        retain: bool,
    ) -> Result<(), SessionError<T::Error>> {
        self.ensure_connected().await?;
        let payload = value.into_payload();
        self.connection
            .transport_mut()
            .publish(topic, payload.as_str().as_bytes(), retain)
            .await
            .map_err(SessionError::Transport)
    }

    /// Subscribes to `topic` and starts caching its messages.
    ///
    /// Subscribing to a cached topic succeeds without contacting the broker.
    /// When the cache is full the call fails before anything is sent.
    pub async fn subscribe(&mut self, topic: &str) -> Result<(), SessionError<T::Error>> {
        if topic.is_empty() || topic.len() > MAX_TOPIC_LEN {
            return Err(SessionError::InvalidTopic);
        }
        self.ensure_connected().await?;

        match self.cache.slot(topic) {
            Slot::Cached => return Ok(()),
            Slot::Full => {
                warn!("max topic cache reached ({}), {} not subscribed", MAX_TOPICS, topic);
                return Err(SessionError::CacheFull);
            }
            Slot::Vacant => {}
        }

        self.connection
            .transport_mut()
            .subscribe(topic)
            .await
            .map_err(SessionError::Transport)?;
        self.cache.insert(topic);
        info!("Subscribed to topic: {}", topic);
        Ok(())
    }

    /// Last message received on `topic`, or `""` if the topic is not
    /// subscribed or nothing has arrived yet. Never waits.
    pub fn get(&self, topic: &str) -> &str {
        self.cache.get(topic)
    }

    /// Keeps the session alive. Call it regularly from the host loop.
    ///
    /// Reconnects if needed, lets the transport service keepalive and
    /// deliver inbound messages, and logs a warning if the previous call was
    /// longer ago than the loop timeout.
    pub async fn refresh(&mut self) {
        if !self.connection.connected() {
            // Failures are logged by the manager; the next refresh retries.
            let _ = self.reconnect().await;
        }

        if self.connection.connected() {
            let cache = &mut self.cache;
            let handler = &mut self.message_handler;
            let result = self
                .connection
                .transport_mut()
                .poll(&mut |topic: &str, payload: &[u8]| {
                    dispatch::route(cache, handler.as_deref_mut(), topic, payload);
                })
                .await;
            if result.is_err() {
                warn!(
                    "MQTT poll failed rc={}",
                    self.connection.transport().last_error_code()
                );
            }
        }

        if let Some(elapsed) = self.liveness.tick(Instant::now()) {
            warn!(
                "refresh() may not be called frequently enough: {} ms since last call, limit {} ms",
                elapsed.as_millis(),
                self.liveness.max_interval().as_millis()
            );
        }
    }

    /// Registers the handler for inbound messages.
    pub fn set_callback(&mut self, handler: &'h mut dyn MessageHandler) {
        self.message_handler = Some(handler);
    }

    /// Registers the hook run after each successful reconnect.
    pub fn on_reconnect(&mut self, handler: &'h mut dyn ReconnectHandler) {
        self.reconnect_handler = Some(handler);
    }

    /// Sets how long `refresh` may go uncalled before a warning is logged.
    /// This has no effect on any network timeout.
    pub fn set_loop_timeout(&mut self, timeout: Duration) {
        self.liveness.set_max_interval(timeout);
    }

    /// Sets the will used from the next connect attempt on.
    pub fn set_will(&mut self, will: WillConfig) {
        self.connection.set_will(will);
    }

    /// Diagnostic code of the transport's last failure.
    pub fn last_error_code(&self) -> i32 {
        self.connection.transport().last_error_code()
    }

    pub fn cache(&self) -> &TopicCache<MAX_TOPICS> {
        &self.cache
    }

    pub fn transport(&self) -> &T {
        self.connection.transport()
    }

    pub fn transport_mut(&mut self) -> &mut T {
        self.connection.transport_mut()
    }

    async fn ensure_connected(&mut self) -> Result<(), SessionError<T::Error>> {
        if self.connection.connected() {
            return Ok(());
        }
        self.reconnect().await
    }
}
