//! Broker engine
//!
//! This module contains the broker instance: one event loop owning one
//! `SubscriptionRegistry`, and the `BrokerHandle` callers use to talk to it.
//! Responsibilities:
//! - serialize subscribe/unsubscribe/listing requests through the loop
//! - monitor every subscribed handle and purge it from all topics once it
//!   terminates
//! - fan published messages out to the current subscribers of a topic
//!
//! Concurrency and usage notes:
//! - The loop is the only writer of its registry. Requests are handled one
//!   at a time in receipt order and answered over a `oneshot` channel.
//! - `publish` does not go through the loop. It snapshots the topic from the
//!   shared registry and enqueues into each mailbox from the caller's task,
//!   so a caller that awaited `subscribe` always sees that subscription in a
//!   later `publish`.
//! - Termination is observed by one small monitor task per subscriber which
//!   reports on a dedicated channel; the loop consumes those reports like
//!   any other request.
//! - Nothing here has a built-in timeout. Wrap calls in
//!   `tokio::time::timeout` to bound the wait.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::directory::Directory;
use super::message::Command;
use super::registry::SubscriptionRegistry;
use super::topic::Topic;
use crate::client::{Subscriber, SubscriberId};
use crate::config::BrokerSettings;
use crate::utils::error::{BrokerError, Result};

/// Identity used when `BrokerOptions::name` is not set.
pub const DEFAULT_BROKER_NAME: &str = "subhub.broker";

/// Options recognized by [`Broker::start`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrokerOptions {
    pub name: Option<String>,
    pub registry_identity: Option<String>,
    pub registry_partitions: Option<usize>,
}

impl BrokerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn registry_identity(mut self, identity: impl Into<String>) -> Self {
        self.registry_identity = Some(identity.into());
        self
    }

    pub fn registry_partitions(mut self, partitions: usize) -> Self {
        self.registry_partitions = Some(partitions);
        self
    }

    pub fn resolved_name(&self) -> &str {
        self.name.as_deref().unwrap_or(DEFAULT_BROKER_NAME)
    }

    /// Registry identity, `<name>.registry` unless overridden.
    pub fn resolved_registry_identity(&self) -> String {
        self.registry_identity
            .clone()
            .unwrap_or_else(|| format!("{}.registry", self.resolved_name()))
    }

    /// Shard count, the host's available parallelism unless overridden.
    pub fn resolved_partitions(&self) -> usize {
        self.registry_partitions.unwrap_or_else(num_cpus::get).max(1)
    }
}

impl From<&BrokerSettings> for BrokerOptions {
    fn from(settings: &BrokerSettings) -> Self {
        Self {
            name: Some(settings.name.clone()),
            registry_identity: settings.registry_identity.clone(),
            registry_partitions: settings.registry_partitions,
        }
    }
}

/// State owned by a running broker's event loop.
pub struct Broker<M> {
    name: Arc<str>,
    registry: Arc<SubscriptionRegistry<M>>,
    /// One watcher per subscribed handle. An entry outlives the handle's
    /// subscriptions and is only dropped when the handle terminates or the
    /// broker stops, so the map holds at most one task per live handle.
    monitors: HashMap<SubscriberId, JoinHandle<()>>,
    downs: UnboundedSender<SubscriberId>,
}

impl<M: Send + 'static> Broker<M> {
    /// Start a broker and register it in `directory` under its name.
    ///
    /// Fails with `StartFailure` when a running instance already owns the
    /// name. The name of a stopped instance may be reused. Must be called
    /// from within a tokio runtime.
    pub fn start(options: BrokerOptions, directory: &Directory<M>) -> Result<BrokerHandle<M>> {
        let name = options.resolved_name().to_string();
        directory.claim(&name, || Self::spawn(options))
    }

    /// Start a broker that is not registered in any directory. Only the
    /// returned handle (and its clones) can reach it.
    pub fn spawn(options: BrokerOptions) -> BrokerHandle<M> {
        let name: Arc<str> = Arc::from(options.resolved_name());
        let registry = Arc::new(SubscriptionRegistry::new(
            options.resolved_registry_identity(),
            options.resolved_partitions(),
        ));

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (down_tx, down_rx) = mpsc::unbounded_channel();

        let broker = Broker {
            name: name.clone(),
            registry: registry.clone(),
            monitors: HashMap::new(),
            downs: down_tx,
        };
        tokio::spawn(broker.run(command_rx, down_rx));

        BrokerHandle {
            name,
            commands: command_tx,
            registry,
        }
    }

    async fn run(
        mut self,
        mut commands: UnboundedReceiver<Command<M>>,
        mut downs: UnboundedReceiver<SubscriberId>,
    ) {
        info!(
            broker = %self.name,
            registry = self.registry.identity(),
            partitions = self.registry.partitions(),
            "broker started"
        );

        let mut stop_reply = None;
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => {
                        if let ControlFlow::Break(reply) = self.handle(command) {
                            stop_reply = Some(reply);
                            break;
                        }
                    }
                    // every handle is gone
                    None => break,
                },
                Some(id) = downs.recv() => self.handle_down(id),
            }
        }

        // Refuse new requests before tearing down; queued ones are dropped
        // with their reply senders and their callers see `NotRunning`.
        commands.close();
        self.shutdown();

        if let Some(reply) = stop_reply {
            let _ = reply.send(());
        }
    }

    fn handle(&mut self, command: Command<M>) -> ControlFlow<oneshot::Sender<()>> {
        trace!(broker = %self.name, kind = command.kind(), "handling request");

        match command {
            Command::Subscribe {
                topic,
                subscriber,
                reply,
            } => {
                self.monitor(&subscriber);
                debug!(broker = %self.name, subscriber = %subscriber.id(), %topic, "subscribed");
                self.registry.register(topic, subscriber);
                let _ = reply.send(());
            }
            Command::Unsubscribe {
                topic,
                subscriber,
                reply,
            } => {
                let removed = self
                    .registry
                    .unregister_all_matching(topic.as_str(), &subscriber);
                debug!(broker = %self.name, subscriber = %subscriber.id(), %topic, removed, "unsubscribed");
                let _ = reply.send(());
            }
            Command::Subscribers { topic, reply } => {
                let _ = reply.send(self.registry.list_subscribers(topic.as_str()));
            }
            Command::Topics { reply } => {
                let _ = reply.send(self.registry.list_topics());
            }
            Command::Stop { reply } => return ControlFlow::Break(reply),
        }

        ControlFlow::Continue(())
    }

    /// Start watching `subscriber` unless it is already watched.
    fn monitor(&mut self, subscriber: &Subscriber<M>) {
        if let Entry::Vacant(slot) = self.monitors.entry(subscriber.id()) {
            let watched = subscriber.clone();
            let downs = self.downs.clone();
            slot.insert(tokio::spawn(async move {
                watched.terminated().await;
                let _ = downs.send(watched.id());
            }));
        }
    }

    fn handle_down(&mut self, id: SubscriberId) {
        self.monitors.remove(&id);
        let topics = self.registry.purge(id);
        debug!(
            broker = %self.name,
            subscriber = %id,
            topics = topics.len(),
            "subscriber terminated, removed from all topics"
        );
    }

    fn shutdown(&mut self) {
        for (_, task) in self.monitors.drain() {
            task.abort();
        }
        self.registry.clear();
        info!(broker = %self.name, "broker stopped");
    }
}

/// Caller-side handle to a running broker. Cheap to clone.
pub struct BrokerHandle<M> {
    name: Arc<str>,
    commands: UnboundedSender<Command<M>>,
    registry: Arc<SubscriptionRegistry<M>>,
}

impl<M> Clone for BrokerHandle<M> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            commands: self.commands.clone(),
            registry: self.registry.clone(),
        }
    }
}

impl<M> fmt::Debug for BrokerHandle<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerHandle")
            .field("name", &self.name)
            .field("registry", &self.registry.identity())
            .field("running", &self.is_running())
            .finish()
    }
}

impl<M> BrokerHandle<M> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registry_identity(&self) -> &str {
        self.registry.identity()
    }

    pub fn partitions(&self) -> usize {
        self.registry.partitions()
    }

    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    async fn request<R>(&self, make: impl FnOnce(oneshot::Sender<R>) -> Command<M>) -> Result<R> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .map_err(|_| BrokerError::not_running(&self.name))?;
        rx.await.map_err(|_| BrokerError::not_running(&self.name))
    }

    /// Register `subscriber` under `topic` and start monitoring it.
    /// Subscribing twice keeps two entries.
    pub async fn subscribe(
        &self,
        topic: impl Into<Topic>,
        subscriber: &Subscriber<M>,
    ) -> Result<()> {
        let topic = topic.into();
        let subscriber = subscriber.clone();
        self.request(|reply| Command::Subscribe {
            topic,
            subscriber,
            reply,
        })
        .await
    }

    /// Remove every (topic, subscriber) entry. Not an error if none exist.
    pub async fn unsubscribe(
        &self,
        topic: impl Into<Topic>,
        subscriber: &Subscriber<M>,
    ) -> Result<()> {
        let topic = topic.into();
        let subscriber = subscriber.clone();
        self.request(|reply| Command::Unsubscribe {
            topic,
            subscriber,
            reply,
        })
        .await
    }

    /// Handles currently registered for `topic`, in no particular order.
    pub async fn subscribers(&self, topic: impl Into<Topic>) -> Result<Vec<Subscriber<M>>> {
        let topic = topic.into();
        self.request(|reply| Command::Subscribers { topic, reply }).await
    }

    /// Topics with at least one subscriber, in no particular order.
    pub async fn topics(&self) -> Result<Vec<Topic>> {
        self.request(|reply| Command::Topics { reply }).await
    }

    /// Stop the instance. Resolves once its registry has been discarded.
    pub async fn stop(&self) -> Result<()> {
        self.request(|reply| Command::Stop { reply }).await
    }
}

impl<M: Clone> BrokerHandle<M> {
    /// Enqueue `message` into the mailbox of every current subscriber of
    /// `topic` without waiting for delivery.
    ///
    /// A topic without subscribers is a no-op. Mailboxes that are already
    /// gone are skipped; their entries are removed once the termination is
    /// observed.
    pub fn publish(&self, topic: impl AsRef<str>, message: M) -> Result<()> {
        if !self.is_running() {
            return Err(BrokerError::not_running(&self.name));
        }

        let topic = topic.as_ref();
        let mut dropped = 0usize;
        let visited = self.registry.dispatch(topic, |subscriber| {
            if !subscriber.deliver(message.clone()) {
                dropped += 1;
            }
        });

        trace!(broker = %self.name, topic, visited, "published");
        if dropped > 0 {
            warn!(broker = %self.name, topic, dropped, "dropped deliveries to terminated subscribers");
        }
        Ok(())
    }
}
