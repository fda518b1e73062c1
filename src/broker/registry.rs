//! Subscription registry
//!
//! Concurrent multimap from `Topic` to the subscriber handles registered for
//! it. The map is split into a fixed number of shards, each behind its own
//! `RwLock`; a topic always lives in the shard its hash selects, so every
//! single-topic operation touches exactly one lock.
//!
//! Concurrency notes:
//! - Reads (`list_subscribers`, `dispatch`, topic listings) only take shard
//!   read locks and may run from any task.
//! - Writes are expected to come from the owning broker's event loop, which
//!   keeps a single writer per registry. The registry itself stays sound
//!   with concurrent writers.
//! - `purge` walks the shards one after another and is not atomic across
//!   them.
//! - Duplicate registrations of the same (topic, subscriber) pair are kept as
//!   separate entries.

use std::collections::HashMap;

use ahash::RandomState;
use parking_lot::RwLock;

use super::topic::Topic;
use crate::client::{Subscriber, SubscriberId};

type Shard<M> = RwLock<HashMap<Topic, Vec<Subscriber<M>>>>;

pub struct SubscriptionRegistry<M> {
    identity: String,
    shards: Box<[Shard<M>]>,
    hasher: RandomState,
}

impl<M> SubscriptionRegistry<M> {
    /// Create an empty registry. `partitions` is clamped to at least one.
    pub fn new(identity: impl Into<String>, partitions: usize) -> Self {
        let shards = (0..partitions.max(1))
            .map(|_| RwLock::new(HashMap::new()))
            .collect();
        Self {
            identity: identity.into(),
            shards,
            hasher: RandomState::new(),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn partitions(&self) -> usize {
        self.shards.len()
    }

    fn shard(&self, topic: &str) -> &Shard<M> {
        let idx = self.hasher.hash_one(topic) as usize % self.shards.len();
        &self.shards[idx]
    }

    /// Add a (topic, subscriber) entry.
    pub fn register(&self, topic: Topic, subscriber: Subscriber<M>) {
        self.shard(topic.as_str())
            .write()
            .entry(topic)
            .or_default()
            .push(subscriber);
    }

    /// Remove every entry under `topic` for which `matches` returns true.
    /// Drops the topic once its last entry is gone. Returns how many entries
    /// were removed.
    pub fn unregister_match<F>(&self, topic: &str, mut matches: F) -> usize
    where
        F: FnMut(&Subscriber<M>) -> bool,
    {
        let mut shard = self.shard(topic).write();
        let Some(subscribers) = shard.get_mut(topic) else {
            return 0;
        };

        let before = subscribers.len();
        subscribers.retain(|s| !matches(s));
        let removed = before - subscribers.len();

        if subscribers.is_empty() {
            shard.remove(topic);
        }
        removed
    }

    /// Remove every entry exactly matching (topic, subscriber).
    pub fn unregister_all_matching(&self, topic: &str, subscriber: &Subscriber<M>) -> usize {
        let id = subscriber.id();
        self.unregister_match(topic, |s| s.id() == id)
    }

    /// Remove `id` from every topic, one shard at a time. Returns the topics
    /// it was removed from.
    pub fn purge(&self, id: SubscriberId) -> Vec<Topic> {
        let mut touched = Vec::new();

        for shard in self.shards.iter() {
            let mut shard = shard.write();
            shard.retain(|topic, subscribers| {
                let before = subscribers.len();
                subscribers.retain(|s| s.id() != id);
                if subscribers.len() != before {
                    touched.push(topic.clone());
                }
                !subscribers.is_empty()
            });
        }

        touched
    }

    /// Current handles registered for `topic`, duplicates included.
    pub fn list_subscribers(&self, topic: &str) -> Vec<Subscriber<M>> {
        self.shard(topic)
            .read()
            .get(topic)
            .cloned()
            .unwrap_or_default()
    }

    /// Topics with at least one entry.
    pub fn list_topics(&self) -> Vec<Topic> {
        self.select_topics(|_, _| true)
    }

    /// Topics having at least one entry accepted by `filter`.
    pub fn select_topics<F>(&self, mut filter: F) -> Vec<Topic>
    where
        F: FnMut(&Topic, &Subscriber<M>) -> bool,
    {
        let mut topics = Vec::new();
        for shard in self.shards.iter() {
            let shard = shard.read();
            for (topic, subscribers) in shard.iter() {
                if subscribers.iter().any(|s| filter(topic, s)) {
                    topics.push(topic.clone());
                }
            }
        }
        topics
    }

    /// Call `deliver` once per handle registered for `topic` at call time.
    ///
    /// The handle list is snapshotted under the read lock and delivery runs
    /// after the lock is released, so `deliver` may itself use the registry.
    pub fn dispatch<F>(&self, topic: &str, mut deliver: F) -> usize
    where
        F: FnMut(&Subscriber<M>),
    {
        let snapshot = self.list_subscribers(topic);
        for subscriber in &snapshot {
            deliver(subscriber);
        }
        snapshot.len()
    }

    pub fn topic_count(&self) -> usize {
        self.shards.iter().map(|s| s.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|s| s.read().is_empty())
    }

    /// Discard every entry.
    pub fn clear(&self) {
        for shard in self.shards.iter() {
            shard.write().clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SubscriptionRegistry<&'static str> {
        SubscriptionRegistry::new("test.registry", 4)
    }

    #[test]
    fn new_clamps_partitions() {
        let reg: SubscriptionRegistry<()> = SubscriptionRegistry::new("r", 0);
        assert_eq!(reg.partitions(), 1);
        assert_eq!(reg.identity(), "r");
        assert!(reg.is_empty());
    }

    #[test]
    fn register_and_list() {
        let reg = registry();
        let (a, _ma) = Subscriber::channel();
        let (b, _mb) = Subscriber::channel();

        reg.register("news".into(), a.clone());
        reg.register("news".into(), b.clone());

        let subs = reg.list_subscribers("news");
        assert_eq!(subs.len(), 2);
        assert!(subs.contains(&a));
        assert!(subs.contains(&b));
        assert!(reg.list_subscribers("sports").is_empty());
    }

    #[test]
    fn duplicates_are_kept_and_removed_together() {
        let reg = registry();
        let (a, _ma) = Subscriber::channel();

        reg.register("x".into(), a.clone());
        reg.register("x".into(), a.clone());
        assert_eq!(reg.list_subscribers("x").len(), 2);

        assert_eq!(reg.unregister_all_matching("x", &a), 2);
        assert!(reg.list_subscribers("x").is_empty());
        assert!(reg.list_topics().is_empty());
    }

    #[test]
    fn unregister_missing_entry_is_noop() {
        let reg = registry();
        let (a, _ma) = Subscriber::channel();
        let (b, _mb) = Subscriber::channel();

        assert_eq!(reg.unregister_all_matching("nothing", &a), 0);

        reg.register("t".into(), b.clone());
        assert_eq!(reg.unregister_all_matching("t", &a), 0);
        assert_eq!(reg.list_subscribers("t"), vec![b]);
    }

    #[test]
    fn unregister_match_by_predicate() {
        let reg = registry();
        let (a, _ma) = Subscriber::channel();
        let (b, mb) = Subscriber::channel();
        reg.register("t".into(), a.clone());
        reg.register("t".into(), b.clone());

        drop(mb);
        let removed = reg.unregister_match("t", |s| s.is_terminated());
        assert_eq!(removed, 1);
        assert_eq!(reg.list_subscribers("t"), vec![a]);
    }

    #[test]
    fn purge_sweeps_every_topic() {
        let reg = registry();
        let (a, _ma) = Subscriber::channel();
        let (b, _mb) = Subscriber::channel();

        for topic in ["t1", "t2", "t3", "t4", "t5"] {
            reg.register(topic.into(), a.clone());
        }
        reg.register("t1".into(), b.clone());

        let mut touched = reg.purge(a.id());
        touched.sort();
        assert_eq!(touched.len(), 5);
        assert_eq!(touched[0], "t1");

        assert_eq!(reg.list_topics(), vec![Topic::from("t1")]);
        assert_eq!(reg.list_subscribers("t1"), vec![b]);
    }

    #[test]
    fn list_topics_only_reports_non_empty() {
        let reg = registry();
        let (a, _ma) = Subscriber::channel();

        reg.register("a".into(), a.clone());
        reg.register("b".into(), a.clone());
        reg.unregister_all_matching("b", &a);

        assert_eq!(reg.list_topics(), vec![Topic::from("a")]);
        assert_eq!(reg.topic_count(), 1);
    }

    #[test]
    fn select_topics_filters_entries() {
        let reg = registry();
        let (a, _ma) = Subscriber::channel();
        let (b, _mb) = Subscriber::channel();
        reg.register("a".into(), a.clone());
        reg.register("b".into(), b.clone());
        reg.register("c".into(), a.clone());

        let mut mine = reg.select_topics(|_, s| *s == a);
        mine.sort();
        assert_eq!(mine, vec![Topic::from("a"), Topic::from("c")]);
    }

    #[test]
    fn dispatch_visits_snapshot() {
        let reg = registry();
        let (a, mut ma) = Subscriber::channel();
        let (b, mut mb) = Subscriber::channel();
        reg.register("t".into(), a.clone());
        reg.register("t".into(), b.clone());

        let visited = reg.dispatch("t", |s| {
            // mutation during dispatch does not affect the current snapshot
            reg.unregister_all_matching("t", s);
            s.deliver("m");
        });

        assert_eq!(visited, 2);
        assert_eq!(ma.try_recv().unwrap(), "m");
        assert_eq!(mb.try_recv().unwrap(), "m");
        assert!(reg.list_topics().is_empty());
    }

    #[test]
    fn dispatch_unknown_topic_visits_nothing() {
        let reg = registry();
        let mut calls = 0;
        assert_eq!(reg.dispatch("none", |_| calls += 1), 0);
        assert_eq!(calls, 0);
    }

    #[test]
    fn clear_discards_everything() {
        let reg = registry();
        let (a, _ma) = Subscriber::channel();
        reg.register("a".into(), a.clone());
        reg.register("b".into(), a);
        reg.clear();
        assert!(reg.is_empty());
        assert_eq!(reg.topic_count(), 0);
    }

    #[test]
    fn concurrent_registration_from_threads() {
        let reg = std::sync::Arc::new(registry());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let reg = reg.clone();
                std::thread::spawn(move || {
                    let (s, mailbox) = Subscriber::channel();
                    for t in 0..16 {
                        reg.register(format!("topic-{t}").into(), s.clone());
                    }
                    (i, mailbox)
                })
            })
            .collect();

        let _mailboxes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(reg.topic_count(), 16);
        assert_eq!(reg.list_subscribers("topic-3").len(), 8);
    }
}
