//! Broker directory
//!
//! Resolves broker identities to running instances. A `Directory` is an
//! ordinary value passed to whoever needs to address brokers by name; there
//! is no process-wide table. Stopped instances stay listed so resolving them
//! reports `NotRunning` rather than `NotRegistered`, until `prune` drops them.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

use super::engine::BrokerHandle;
use super::named::NamedBroker;
use crate::utils::error::{BrokerError, Result};

pub struct Directory<M> {
    entries: DashMap<String, BrokerHandle<M>>,
}

impl<M> Default for Directory<M> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<M> Directory<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handle produced by `start` under `name`, unless a running
    /// instance already owns it. `start` runs while the name is held, so two
    /// concurrent starts can never both succeed.
    pub(crate) fn claim<F>(&self, name: &str, start: F) -> Result<BrokerHandle<M>>
    where
        F: FnOnce() -> BrokerHandle<M>,
    {
        match self.entries.entry(name.to_string()) {
            Entry::Occupied(entry) if entry.get().is_running() => Err(BrokerError::StartFailure {
                name: name.to_string(),
            }),
            Entry::Occupied(mut entry) => {
                debug!(broker = name, "replacing stopped broker");
                let handle = start();
                entry.insert(handle.clone());
                Ok(handle)
            }
            Entry::Vacant(entry) => {
                let handle = start();
                entry.insert(handle.clone());
                Ok(handle)
            }
        }
    }

    /// Look up a running broker by name.
    pub fn resolve(&self, name: &str) -> Result<BrokerHandle<M>> {
        let handle = self
            .entries
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| BrokerError::NotRegistered {
                name: name.to_string(),
            })?;

        if handle.is_running() {
            Ok(handle)
        } else {
            Err(BrokerError::not_running(name))
        }
    }

    /// Stop the broker registered under `name`.
    pub async fn stop(&self, name: &str) -> Result<()> {
        self.resolve(name)?.stop().await
    }

    /// Names of the running brokers, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.value().is_running())
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    /// Forget stopped brokers. Returns how many were dropped.
    pub fn prune(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, handle| handle.is_running());
        before - self.entries.len()
    }

    /// A binding that addresses `name` through this directory on every call.
    pub fn named(self: &Arc<Self>, name: impl Into<String>) -> NamedBroker<M> {
        NamedBroker::new(name, self.clone())
    }
}
