//! Connect and reconnect sequencing.
//!
//! The manager owns the transport together with everything needed to bring
//! a dropped connection back: broker address, credentials and will. The
//! topic cache and the reconnect hook are lent to it by the session for the
//! duration of a reconnect.

use super::cache::TopicCache;
use super::traits::{MqttTransport, ReconnectHandler};
use crate::config::{CLIENT_ID, ConnectionConfig, WillConfig};
use crate::error::SessionError;

/// Drives a transport through the Disconnected/Connected cycle.
pub struct ConnectionManager<T> {
    transport: T,
    config: Option<ConnectionConfig>,
    will: Option<WillConfig>,
}

impl<T: MqttTransport> ConnectionManager<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            config: None,
            will: None,
        }
    }

    /// Stores the broker settings and makes a first connection attempt.
    ///
    /// The settings are kept even if the attempt fails, so a later
    /// `reconnect` retries the same broker.
    pub async fn connect<const MAX_TOPICS: usize>(
        &mut self,
        config: ConnectionConfig,
        cache: &TopicCache<MAX_TOPICS>,
        hook: Option<&mut (dyn ReconnectHandler + '_)>,
    ) -> Result<(), SessionError<T::Error>> {
        self.transport.set_target(config.host(), config.port());
        self.config = Some(config);
        self.reconnect(cache, hook).await
    }

    /// Brings the connection back up if it is down.
    ///
    /// Makes exactly one attempt. On success every cached topic is
    /// subscribed again in subscription order and `hook` runs afterwards.
    /// Resubscription is best effort: a failed resubscribe is logged and the
    /// remaining topics are still tried.
    pub async fn reconnect<const MAX_TOPICS: usize>(
        &mut self,
        cache: &TopicCache<MAX_TOPICS>,
        hook: Option<&mut (dyn ReconnectHandler + '_)>,
    ) -> Result<(), SessionError<T::Error>> {
        if self.transport.is_connected() {
            return Ok(());
        }
        let Some(config) = &self.config else {
            warn!("reconnect requested before connect");
            return Err(SessionError::NotConfigured);
        };

        info!("Connecting to MQTT {}:{} ...", config.host(), config.port());

        if let Some(will) = &self.will {
            self.transport.configure_will(Some(will));
        }

        if let Err(err) = self
            .transport
            .connect(CLIENT_ID, config.credentials())
            .await
        {
            warn!("MQTT connect failed rc={}", self.transport.last_error_code());
            return Err(SessionError::Connect(err));
        }
        info!("MQTT connected");

        for topic in cache.topics() {
            match self.transport.subscribe(topic).await {
                Ok(()) => debug!("Resubscribed to {}", topic),
                Err(_) => warn!(
                    "resubscribe to {} failed rc={}",
                    topic,
                    self.transport.last_error_code()
                ),
            }
        }

        if let Some(hook) = hook {
            hook.on_reconnect();
        }
        Ok(())
    }

    pub async fn disconnect(&mut self) {
        self.transport.disconnect().await;
        info!("MQTT disconnected");
    }

    pub fn connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Replaces the will applied on the next connect attempt.
    pub fn set_will(&mut self, will: WillConfig) {
        self.will = Some(will);
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}
