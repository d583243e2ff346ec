//! # Self-Healing MQTT Session for Embedded Systems
//!
//! `myrtio-mqtt-session` keeps a single MQTT broker connection alive for a
//! device that drives it from a periodic loop. It is `no_std` compatible and
//! built on the [Embassy](https://embassy.dev/) async ecosystem.
//!
//! ## Core Features
//!
//! - **`no_std` & `no_alloc`:** All buffers are fixed size and managed with `heapless`.
//! - **Automatic Recovery:** A dropped connection is re-established on the next
//!   [`MqttSession::refresh`], together with the will and every cached subscription.
//! - **Topic Cache:** Up to ten subscribed topics (configurable) with the last
//!   message received on each, readable at any time without waiting.
//! - **Liveness Warning:** A warning is logged when `refresh` is not called often enough.
//! - **Transport Agnostic:** The session runs on any [`MqttTransport`]; the bundled
//!   [`MqttClient`] speaks MQTT 3.1.1 over any [`Link`], such as [`TcpLink`].
//!
//! ## Usage
//!
//! ```ignore
//! let link = TcpLink::new(stack, &mut rx_buf, &mut tx_buf, Duration::from_secs(10));
//! let client = MqttClient::<_>::new(link, MqttOptions::default());
//!
//! let mut on_message = |topic: &str, message: &str| info!("{} -> {}", topic, message);
//! let mut session = MqttSession::<_>::new(client);
//! session.set_callback(&mut on_message);
//! session.set_will(WillConfig::new("device/status", "offline")?);
//! session.connect("broker.local", 1883, Some("user"), Some("secret")).await?;
//! session.subscribe("device/cmd").await?;
//!
//! loop {
//!     session.refresh().await;
//!     if session.get("device/cmd") == "reboot" {
//!         // ...
//!     }
//!     session.put("device/temp", 21.5).await.ok();
//!     Timer::after_millis(100).await;
//! }
//! ```
//!
//! ## Logging
//!
//! Enable one of the `log`, `defmt` or `esp32-log` features to route the
//! crate's diagnostics to that backend. With none enabled, logging compiles
//! away.

#![cfg_attr(not(test), no_std)]

// Must come first so the logging macros are visible to every module.
#[macro_use]
mod fmt;

pub mod client;
pub mod config;
pub mod error;
pub mod packet;
pub mod session;
pub mod transport;
pub mod util;

// Re-export key types for easier access at the crate root.
pub use client::{ClientState, DEFAULT_BUF_SIZE, MqttClient, MqttOptions};
pub use config::{ConnectionConfig, Credentials, WillConfig};
pub use error::{MqttError, SessionError};
pub use packet::QoS;
pub use session::{MessageHandler, MqttSession, MqttTransport, ReconnectHandler};
pub use transport::{Link, TcpLink};
