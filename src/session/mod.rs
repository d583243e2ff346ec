//! Durable MQTT Session
//!
//! Keeps one broker connection alive across network failures for a host that
//! drives it from a periodic loop.
//!
//! # Overview
//!
//! - [`TopicCache`] holds the subscribed topics (bounded) with the last
//!   message seen on each.
//! - [`ConnectionManager`] owns the transport and the broker settings and
//!   replays the cached subscriptions after every reconnect.
//! - [`dispatch`] routes inbound messages into the cache and on to the
//!   user's [`MessageHandler`].
//! - [`MqttSession`] is the public surface tying them together.
//!
//! # Failure Model
//!
//! Nothing here retries on its own. A failed connect, publish or subscribe
//! is returned to the caller, and the next [`MqttSession::refresh`] makes the
//! next reconnect attempt. Publishing while disconnected tries one inline
//! reconnect and never queues.
//!
//! Resubscription after a reconnect is best effort. A topic whose
//! resubscribe fails stays cached and is retried only on the next reconnect.

pub(crate) mod cache;
pub(crate) mod connection;
pub mod dispatch;
pub(crate) mod liveness;
pub(crate) mod mqtt_session;
pub(crate) mod payload;
pub(crate) mod traits;

pub use cache::{CachedTopic, Slot, TopicCache};
pub use connection::ConnectionManager;
pub use liveness::Liveness;
pub use mqtt_session::MqttSession;
pub use payload::{IntoPayload, Payload};
pub use traits::{MessageHandler, MqttTransport, ReconnectHandler};
