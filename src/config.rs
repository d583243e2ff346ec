//! # Session Configuration
//!
//! Owned, fixed-size configuration values and the crate-wide limits. Every
//! string is copied into a `heapless::String`, so the memory used by a
//! session is known at compile time.

use embassy_time::Duration;
use heapless::String;

use crate::error::ValueTooLong;
use crate::packet::{LastWill, QoS};

/// Maximum length for a single topic string.
pub const MAX_TOPIC_LEN: usize = 128;

/// Size of the per-topic message slot. One byte is reserved, so at most
/// `MAX_MESSAGE_LEN - 1` payload bytes are kept.
pub const MAX_MESSAGE_LEN: usize = 128;

/// Default number of topics a session can subscribe to.
pub const DEFAULT_MAX_TOPICS: usize = 10;

/// Maximum length of the broker host name.
pub const MAX_HOST_LEN: usize = 64;

/// Maximum length of the username and of the password.
pub const MAX_CREDENTIAL_LEN: usize = 64;

/// Maximum length of the last-will message.
pub const MAX_WILL_MESSAGE_LEN: usize = 128;

/// Default interval after which a late `refresh` is reported.
pub const DEFAULT_LOOP_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Client identifier sent in every CONNECT.
pub const CLIENT_ID: &str = "myrtio-session";

/// Copies `value` into a bounded string.
pub(crate) fn bounded<const N: usize>(value: &str) -> Result<String<N>, ValueTooLong> {
    let mut owned = String::new();
    owned.push_str(value).map_err(|_| ValueTooLong)?;
    Ok(owned)
}

/// Borrowed username/password pair passed to the transport on connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Credentials<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Broker address and optional credentials, kept for every reconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    host: String<MAX_HOST_LEN>,
    port: u16,
    username: Option<String<MAX_CREDENTIAL_LEN>>,
    password: Option<String<MAX_CREDENTIAL_LEN>>,
}

impl ConnectionConfig {
    pub fn new(
        host: &str,
        port: u16,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<Self, ValueTooLong> {
        Ok(Self {
            host: bounded(host)?,
            port,
            username: username.map(bounded).transpose()?,
            password: password.map(bounded).transpose()?,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Credentials to authenticate with.
    ///
    /// Only returned when both a username and a password were given; a lone
    /// username or password results in an anonymous connect.
    pub fn credentials(&self) -> Option<Credentials<'_>> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Some(Credentials {
                username: username.as_str(),
                password: password.as_str(),
            }),
            _ => None,
        }
    }
}

/// Last Will and Testament registered with the broker on each connect.
///
/// Defaults to a retained message at QoS 1.
///
/// ```ignore
/// let will = WillConfig::new("device/status", "offline")?.with_qos(QoS::AtMostOnce);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WillConfig {
    topic: String<MAX_TOPIC_LEN>,
    message: String<MAX_WILL_MESSAGE_LEN>,
    retain: bool,
    qos: QoS,
}

impl WillConfig {
    pub fn new(topic: &str, message: &str) -> Result<Self, ValueTooLong> {
        Ok(Self {
            topic: bounded(topic)?,
            message: bounded(message)?,
            retain: true,
            qos: QoS::AtLeastOnce,
        })
    }

    pub fn with_retain(mut self, retain: bool) -> Self {
        self.retain = retain;
        self
    }

    pub fn with_qos(mut self, qos: QoS) -> Self {
        self.qos = qos;
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn retain(&self) -> bool {
        self.retain
    }

    pub fn qos(&self) -> QoS {
        self.qos
    }

    /// Borrowed view used when encoding CONNECT.
    pub fn as_last_will(&self) -> LastWill<'_> {
        LastWill {
            topic: &self.topic,
            message: self.message.as_bytes(),
            qos: self.qos,
            retain: self.retain,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_require_both_parts() {
        let anonymous = ConnectionConfig::new("broker.local", 1883, Some("user"), None).unwrap();
        assert_eq!(anonymous.credentials(), None);

        let authed = ConnectionConfig::new("broker.local", 8883, Some("user"), Some("pw")).unwrap();
        assert_eq!(
            authed.credentials(),
            Some(Credentials {
                username: "user",
                password: "pw"
            })
        );
        assert_eq!(authed.port(), 8883);
    }

    #[test]
    fn overlong_host_is_rejected() {
        let host = [b'a'; MAX_HOST_LEN + 1];
        let host = core::str::from_utf8(&host).unwrap();
        assert_eq!(ConnectionConfig::new(host, 1883, None, None), Err(ValueTooLong));
    }

    #[test]
    fn will_defaults_to_retained_qos1() {
        let will = WillConfig::new("device/status", "offline").unwrap();
        assert!(will.retain());
        assert_eq!(will.qos(), QoS::AtLeastOnce);

        let will = will.with_retain(false).with_qos(QoS::AtMostOnce);
        assert!(!will.retain());
        assert_eq!(will.as_last_will().message, b"offline");
    }
}
