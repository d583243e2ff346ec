//! Transport capability and handler traits.
//!
//! # Object Safety
//!
//! The handler traits are dyn-compatible, so a session stores them as
//! `&mut dyn MessageHandler` / `&mut dyn ReconnectHandler`. This keeps the
//! session free of extra type parameters and works without an allocator.
//! Plain closures implement both traits through blanket impls.

use crate::config::{Credentials, WillConfig};

/// The MQTT capability a session runs on.
///
/// The session never encodes packets itself. It drives an implementation of
/// this trait, such as [`MqttClient`](crate::client::MqttClient), or a stub in
/// tests.
#[allow(async_fn_in_trait)]
pub trait MqttTransport {
    /// The error type returned by the transport.
    type Error: core::fmt::Debug;

    /// Sets the broker the next `connect` goes to.
    fn set_target(&mut self, host: &str, port: u16);

    /// Sets or clears the will sent with the next `connect`.
    fn configure_will(&mut self, will: Option<&WillConfig>);

    /// Performs the MQTT handshake, authenticating when `credentials` is set.
    async fn connect(
        &mut self,
        client_id: &str,
        credentials: Option<Credentials<'_>>,
    ) -> Result<(), Self::Error>;

    /// Whether the broker connection is currently up.
    fn is_connected(&self) -> bool;

    /// Closes the broker connection.
    async fn disconnect(&mut self);

    /// Publishes `payload` on `topic`.
    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retain: bool,
    ) -> Result<(), Self::Error>;

    /// Subscribes to `topic`.
    async fn subscribe(&mut self, topic: &str) -> Result<(), Self::Error>;

    /// Services keepalive and inbound traffic.
    ///
    /// Every inbound PUBLISH is handed to `on_publish` before this returns.
    async fn poll(&mut self, on_publish: &mut dyn FnMut(&str, &[u8])) -> Result<(), Self::Error>;

    /// Diagnostic code describing the last failure.
    fn last_error_code(&self) -> i32;
}

/// Receives every inbound message after it has been cached.
pub trait MessageHandler {
    /// `message` is the payload as cached: truncated and UTF-8.
    fn on_message(&mut self, topic: &str, message: &str);
}

impl<F: FnMut(&str, &str)> MessageHandler for F {
    fn on_message(&mut self, topic: &str, message: &str) {
        self(topic, message)
    }
}

/// Notified after a reconnect has restored the cached subscriptions.
pub trait ReconnectHandler {
    fn on_reconnect(&mut self);
}

impl<F: FnMut()> ReconnectHandler for F {
    fn on_reconnect(&mut self) {
        self()
    }
}
