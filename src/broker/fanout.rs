//! Publishing to several brokers at once
//!
//! A thin loop over [`BrokerHandle::publish`]: no state, no retries. Brokers
//! that cannot be reached are logged and skipped.

use tracing::warn;

use super::engine::BrokerHandle;

/// Publish `message` on every broker in `brokers` accepted by `filter`.
/// Returns how many brokers accepted the publish.
pub fn publish_where<'a, M, I, F>(brokers: I, mut filter: F, topic: &str, message: M) -> usize
where
    M: Clone + 'a,
    I: IntoIterator<Item = &'a BrokerHandle<M>>,
    F: FnMut(&BrokerHandle<M>) -> bool,
{
    let mut published = 0;
    for broker in brokers {
        if !filter(broker) {
            continue;
        }
        match broker.publish(topic, message.clone()) {
            Ok(()) => published += 1,
            Err(err) => warn!(broker = broker.name(), topic, %err, "fan-out publish failed"),
        }
    }
    published
}
