//! Session behaviour against a scripted transport.

use std::cell::RefCell;
use std::collections::VecDeque;

use embassy_futures::block_on;
use myrtio_mqtt_session::config::{CLIENT_ID, DEFAULT_MAX_TOPICS};
use myrtio_mqtt_session::{
    Credentials, MqttSession, MqttTransport, QoS, SessionError, WillConfig,
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum StubError {
    Refused,
    Down,
}

/// Records every call the session makes and replays queued inbound messages.
#[derive(Default)]
struct StubTransport {
    connected: bool,
    target: Option<(String, u16)>,
    will: Option<(String, String, bool, QoS)>,
    refuse_connect: bool,
    reject_subscribe: Vec<String>,
    drop_on_poll: bool,

    connect_attempts: usize,
    wills_at_connect: Vec<Option<String>>,
    credentials_at_connect: Vec<Option<(String, String)>>,
    client_ids: Vec<String>,
    subscribes: Vec<String>,
    publishes: Vec<(String, String, bool)>,
    inbound: VecDeque<(String, Vec<u8>)>,
    polls: usize,
}

impl StubTransport {
    fn deliver(&mut self, topic: &str, payload: &[u8]) {
        self.inbound.push_back((topic.to_string(), payload.to_vec()));
    }
}

impl MqttTransport for StubTransport {
    type Error = StubError;

    fn set_target(&mut self, host: &str, port: u16) {
        self.target = Some((host.to_string(), port));
    }

    fn configure_will(&mut self, will: Option<&WillConfig>) {
        self.will = will.map(|w| {
            (
                w.topic().to_string(),
                w.message().to_string(),
                w.retain(),
                w.qos(),
            )
        });
    }

    async fn connect(
        &mut self,
        client_id: &str,
        credentials: Option<Credentials<'_>>,
    ) -> Result<(), StubError> {
        self.connect_attempts += 1;
        self.client_ids.push(client_id.to_string());
        self.wills_at_connect
            .push(self.will.as_ref().map(|(_, message, _, _)| message.clone()));
        self.credentials_at_connect.push(
            credentials.map(|c| (c.username.to_string(), c.password.to_string())),
        );
        if self.refuse_connect {
            return Err(StubError::Refused);
        }
        self.connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn disconnect(&mut self) {
        self.connected = false;
    }

    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retain: bool,
    ) -> Result<(), StubError> {
        if !self.connected {
            return Err(StubError::Down);
        }
        self.publishes.push((
            topic.to_string(),
            String::from_utf8_lossy(payload).into_owned(),
            retain,
        ));
        Ok(())
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), StubError> {
        if !self.connected {
            return Err(StubError::Down);
        }
        self.subscribes.push(topic.to_string());
        if self.reject_subscribe.iter().any(|t| t == topic) {
            return Err(StubError::Refused);
        }
        Ok(())
    }

    async fn poll(&mut self, on_publish: &mut dyn FnMut(&str, &[u8])) -> Result<(), StubError> {
        self.polls += 1;
        if self.drop_on_poll {
            self.connected = false;
            return Err(StubError::Down);
        }
        while let Some((topic, payload)) = self.inbound.pop_front() {
            on_publish(&topic, &payload);
        }
        Ok(())
    }

    fn last_error_code(&self) -> i32 {
        if self.connected { 0 } else { -3 }
    }
}

type Session<'h> = MqttSession<'h, StubTransport>;

fn connected_session<'h>() -> Session<'h> {
    let mut session: Session<'h> = MqttSession::new(StubTransport::default());
    block_on(session.connect("broker.local", 1883, None, None)).unwrap();
    session
}

#[test]
fn connect_targets_broker_with_credentials() {
    let mut session: Session<'_> = MqttSession::new(StubTransport::default());
    block_on(session.connect("broker.local", 8883, Some("user"), Some("pw"))).unwrap();

    let stub = session.transport();
    assert!(session.connected());
    assert_eq!(stub.target, Some(("broker.local".to_string(), 8883)));
    assert_eq!(stub.client_ids, [CLIENT_ID]);
    assert_eq!(
        stub.credentials_at_connect,
        [Some(("user".to_string(), "pw".to_string()))]
    );
}

#[test]
fn half_credentials_connect_anonymously() {
    let mut session: Session<'_> = MqttSession::new(StubTransport::default());
    block_on(session.connect("broker.local", 1883, Some("user"), None)).unwrap();
    assert_eq!(session.transport().credentials_at_connect, [None]);
}

#[test]
fn failed_connect_is_reported_and_retried_by_refresh() {
    let mut session: Session<'_> = MqttSession::new(StubTransport::default());
    session.transport_mut().refuse_connect = true;

    let err = block_on(session.connect("broker.local", 1883, None, None)).unwrap_err();
    assert_eq!(err, SessionError::Connect(StubError::Refused));
    assert!(!session.connected());
    assert_eq!(session.last_error_code(), -3);

    session.transport_mut().refuse_connect = false;
    block_on(session.refresh());
    assert!(session.connected());
    assert_eq!(session.transport().connect_attempts, 2);
    assert_eq!(session.transport().polls, 1);
}

#[test]
fn reconnect_before_connect_is_not_configured() {
    let mut session: Session<'_> = MqttSession::new(StubTransport::default());
    assert_eq!(
        block_on(session.reconnect()),
        Err(SessionError::NotConfigured)
    );
    assert_eq!(session.transport().connect_attempts, 0);
}

#[test]
fn reconnect_while_connected_does_nothing() {
    let mut session = connected_session();
    block_on(session.reconnect()).unwrap();
    assert_eq!(session.transport().connect_attempts, 1);
}

#[test]
fn subscribing_twice_keeps_one_entry() {
    let mut session = connected_session();
    block_on(session.subscribe("dev/cmd")).unwrap();
    block_on(session.subscribe("dev/cmd")).unwrap();

    assert_eq!(session.cache().len(), 1);
    assert_eq!(session.transport().subscribes, ["dev/cmd"]);
}

#[test]
fn cache_capacity_is_enforced_before_subscribing() {
    let mut session = connected_session();
    for i in 0..DEFAULT_MAX_TOPICS {
        block_on(session.subscribe(&format!("dev/{i}"))).unwrap();
    }

    let err = block_on(session.subscribe("dev/extra")).unwrap_err();
    assert_eq!(err, SessionError::CacheFull);
    assert_eq!(session.cache().len(), DEFAULT_MAX_TOPICS);
    assert_eq!(session.cache().capacity(), DEFAULT_MAX_TOPICS);
    assert_eq!(session.transport().subscribes.len(), DEFAULT_MAX_TOPICS);
    assert!(!session.transport().subscribes.iter().any(|t| t == "dev/extra"));
}

#[test]
fn subscribe_while_disconnected_reconnects_first() {
    let mut session = connected_session();
    session.transport_mut().connected = false;

    block_on(session.subscribe("dev/cmd")).unwrap();

    assert!(session.connected());
    assert_eq!(session.transport().connect_attempts, 2);
    assert_eq!(session.transport().subscribes, ["dev/cmd"]);
    let cached: Vec<_> = session.cache().topics().collect();
    assert_eq!(cached, ["dev/cmd"]);
}

#[test]
fn subscribe_fails_when_inline_reconnect_fails() {
    let mut session = connected_session();
    block_on(session.subscribe("dev/cmd")).unwrap();
    session.transport_mut().connected = false;
    session.transport_mut().refuse_connect = true;

    let err = block_on(session.subscribe("dev/mode")).unwrap_err();

    assert_eq!(err, SessionError::Connect(StubError::Refused));
    assert_eq!(session.transport().connect_attempts, 2);
    assert_eq!(session.transport().subscribes, ["dev/cmd"]);
    let cached: Vec<_> = session.cache().topics().collect();
    assert_eq!(cached, ["dev/cmd"]);
}

#[test]
fn rejected_subscribe_is_not_cached() {
    let mut session = connected_session();
    session.transport_mut().reject_subscribe.push("dev/secret".to_string());

    let err = block_on(session.subscribe("dev/secret")).unwrap_err();
    assert_eq!(err, SessionError::Transport(StubError::Refused));
    assert!(session.cache().is_empty());
}

#[test]
fn invalid_topics_are_refused() {
    let mut session = connected_session();
    let long = "t".repeat(129);
    assert_eq!(block_on(session.subscribe("")), Err(SessionError::InvalidTopic));
    assert_eq!(
        block_on(session.subscribe(&long)),
        Err(SessionError::InvalidTopic)
    );
    assert!(session.transport().subscribes.is_empty());
}

#[test]
fn reconnect_resubscribes_in_order_and_keeps_messages() {
    let mut session = connected_session();
    for topic in ["a/1", "b/2", "c/3"] {
        block_on(session.subscribe(topic)).unwrap();
    }
    session.transport_mut().deliver("b/2", b"kept");
    block_on(session.refresh());
    assert_eq!(session.get("b/2"), "kept");

    session.transport_mut().connected = false;
    session.transport_mut().subscribes.clear();
    block_on(session.refresh());

    assert!(session.connected());
    assert_eq!(session.transport().subscribes, ["a/1", "b/2", "c/3"]);
    let cached: Vec<_> = session.cache().topics().collect();
    assert_eq!(cached, ["a/1", "b/2", "c/3"]);
    assert_eq!(session.get("b/2"), "kept");
    assert_eq!(session.get("a/1"), "");
}

#[test]
fn failed_resubscribe_does_not_stop_the_rest() {
    let mut session = connected_session();
    for topic in ["a/1", "b/2", "c/3"] {
        block_on(session.subscribe(topic)).unwrap();
    }
    session.transport_mut().connected = false;
    session.transport_mut().subscribes.clear();
    session.transport_mut().reject_subscribe.push("b/2".to_string());

    block_on(session.reconnect()).unwrap();
    assert_eq!(session.transport().subscribes, ["a/1", "b/2", "c/3"]);
    assert_eq!(session.cache().len(), 3);
}

#[test]
fn reconnect_hook_runs_on_every_successful_connect() {
    let mut hook_runs = 0;
    {
        let mut hook = || hook_runs += 1;
        let mut session: Session<'_> = MqttSession::new(StubTransport::default());
        session.on_reconnect(&mut hook);
        block_on(session.connect("broker.local", 1883, None, None)).unwrap();
        block_on(session.subscribe("dev/cmd")).unwrap();

        session.transport_mut().connected = false;
        session.transport_mut().refuse_connect = true;
        assert!(block_on(session.reconnect()).is_err());

        session.transport_mut().refuse_connect = false;
        block_on(session.reconnect()).unwrap();
    }
    assert_eq!(hook_runs, 2);
}

#[test]
fn inbound_message_is_cached_and_delivered_once() {
    let seen = RefCell::new(Vec::new());
    let mut handler = |topic: &str, message: &str| {
        seen.borrow_mut().push((topic.to_string(), message.to_string()));
    };
    let mut session = connected_session();
    session.set_callback(&mut handler);
    block_on(session.subscribe("dev/cmd")).unwrap();

    session.transport_mut().deliver("dev/cmd", b"reboot");
    block_on(session.refresh());
    block_on(session.refresh());

    assert_eq!(session.get("dev/cmd"), "reboot");
    assert_eq!(
        *seen.borrow(),
        [("dev/cmd".to_string(), "reboot".to_string())]
    );
}

#[test]
fn long_message_is_truncated_to_127_bytes() {
    let mut session = connected_session();
    block_on(session.subscribe("dev/blob")).unwrap();

    let payload = [b'z'; 130];
    session.transport_mut().deliver("dev/blob", &payload);
    block_on(session.refresh());

    let cached = session.get("dev/blob");
    assert_eq!(cached.len(), 127);
    assert!(cached.bytes().all(|b| b == b'z'));
}

#[test]
fn unknown_topic_reaches_handler_but_not_cache() {
    let seen = RefCell::new(Vec::new());
    let mut handler = |topic: &str, message: &str| {
        seen.borrow_mut().push((topic.to_string(), message.to_string()));
    };
    let mut session = connected_session();
    session.set_callback(&mut handler);

    session.transport_mut().deliver("other/topic", b"hello");
    block_on(session.refresh());

    assert_eq!(session.get("other/topic"), "");
    assert!(session.cache().is_empty());
    assert_eq!(
        *seen.borrow(),
        [("other/topic".to_string(), "hello".to_string())]
    );
}

#[test]
fn newer_message_replaces_older() {
    let mut session = connected_session();
    block_on(session.subscribe("dev/temp")).unwrap();
    session.transport_mut().deliver("dev/temp", b"20.00");
    session.transport_mut().deliver("dev/temp", b"21.50");
    block_on(session.refresh());
    assert_eq!(session.get("dev/temp"), "21.50");
}

#[test]
fn put_while_disconnected_tries_one_reconnect() {
    let mut session = connected_session();
    session.transport_mut().connected = false;
    session.transport_mut().refuse_connect = true;

    let err = block_on(session.put("dev/temp", "1")).unwrap_err();
    assert_eq!(err, SessionError::Connect(StubError::Refused));
    assert_eq!(session.transport().connect_attempts, 2);
    assert!(session.transport().publishes.is_empty());
}

#[test]
fn put_reconnects_then_publishes() {
    let mut session = connected_session();
    session.transport_mut().connected = false;

    block_on(session.put("dev/temp", "1")).unwrap();
    assert_eq!(session.transport().connect_attempts, 2);
    assert_eq!(
        session.transport().publishes,
        [("dev/temp".to_string(), "1".to_string(), false)]
    );
}

#[test]
fn put_renders_numbers_as_text() {
    let mut session = connected_session();
    block_on(session.put("dev/count", 42u32)).unwrap();
    block_on(session.put("dev/temp", 21.5f32)).unwrap();
    block_on(session.put_retain("dev/state", "on")).unwrap();

    assert_eq!(
        session.transport().publishes,
        [
            ("dev/count".to_string(), "42".to_string(), false),
            ("dev/temp".to_string(), "21.50".to_string(), false),
            ("dev/state".to_string(), "on".to_string(), true),
        ]
    );
}

#[test]
fn will_set_after_connect_applies_on_reconnect() {
    let mut session = connected_session();
    assert_eq!(session.transport().wills_at_connect, [None]);

    session.set_will(WillConfig::new("dev/status", "offline").unwrap());
    session.transport_mut().connected = false;
    block_on(session.refresh());

    assert_eq!(
        session.transport().wills_at_connect,
        [None, Some("offline".to_string())]
    );
    assert_eq!(
        session.transport().will,
        Some((
            "dev/status".to_string(),
            "offline".to_string(),
            true,
            QoS::AtLeastOnce
        ))
    );
}

#[test]
fn disconnect_keeps_cache_and_settings() {
    let mut session = connected_session();
    block_on(session.subscribe("dev/cmd")).unwrap();
    block_on(session.disconnect());
    assert!(!session.connected());
    assert_eq!(session.cache().len(), 1);

    session.transport_mut().subscribes.clear();
    block_on(session.reconnect()).unwrap();
    assert_eq!(session.transport().subscribes, ["dev/cmd"]);
}

#[test]
fn poll_failure_is_recovered_on_next_refresh() {
    let mut session = connected_session();
    session.transport_mut().drop_on_poll = true;
    block_on(session.refresh());
    assert!(!session.connected());

    session.transport_mut().drop_on_poll = false;
    block_on(session.refresh());
    assert!(session.connected());
    assert_eq!(session.transport().connect_attempts, 2);
    assert_eq!(session.transport().polls, 2);
}
