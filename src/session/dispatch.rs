//! Inbound message routing: truncate, cache, notify.

use heapless::String;

use super::cache::TopicCache;
use super::traits::MessageHandler;
use crate::config::MAX_MESSAGE_LEN;

/// Longest text a cache slot holds, in bytes.
const MAX_TEXT_LEN: usize = MAX_MESSAGE_LEN - 1;

/// Turns an inbound payload into the text kept in a cache slot.
///
/// At most `MAX_MESSAGE_LEN - 1` bytes are kept and the excess is dropped
/// silently. Invalid UTF-8 sequences become U+FFFD, so a non-empty payload
/// never caches as `""`. A character split by the length limit is dropped,
/// as is a replacement character that would not fit.
pub fn truncate_payload(payload: &[u8]) -> String<MAX_MESSAGE_LEN> {
    let cut = payload.len() > MAX_TEXT_LEN;
    let kept = &payload[..payload.len().min(MAX_TEXT_LEN)];

    let mut text = String::new();
    let mut chunks = kept.utf8_chunks().peekable();
    while let Some(chunk) = chunks.next() {
        if push_within(&mut text, chunk.valid()).is_err() {
            break;
        }
        let split_at_limit = cut && chunks.peek().is_none();
        if !chunk.invalid().is_empty()
            && !split_at_limit
            && push_within(&mut text, "\u{FFFD}").is_err()
        {
            break;
        }
    }
    text
}

fn push_within(text: &mut String<MAX_MESSAGE_LEN>, s: &str) -> Result<(), ()> {
    if text.len() + s.len() > MAX_TEXT_LEN {
        return Err(());
    }
    text.push_str(s).map_err(|_| ())
}

/// Routes one inbound message.
///
/// The message is cached if `topic` is subscribed, and `handler` is called
/// either way.
pub fn route<const MAX_TOPICS: usize>(
    cache: &mut TopicCache<MAX_TOPICS>,
    handler: Option<&mut (dyn MessageHandler + '_)>,
    topic: &str,
    payload: &[u8],
) {
    let message = truncate_payload(payload);
    if payload.len() > MAX_TEXT_LEN {
        trace!("message on {} cut from {} to {} bytes", topic, payload.len(), message.len());
    }

    if !cache.record(topic, &message) {
        trace!("message on unsubscribed topic {} not cached", topic);
    }

    if let Some(handler) = handler {
        handler.on_message(topic, &message);
    }
}
