//! Named broker bindings
//!
//! `NamedBroker` fixes a broker identity and resolves it through a
//! `Directory` on every call, so the binding keeps working across a restart
//! of the instance behind the name. Each operation fails with an addressing
//! error when the name does not resolve to a running broker.

use std::sync::Arc;

use super::directory::Directory;
use super::topic::Topic;
use crate::client::Subscriber;
use crate::utils::error::Result;

pub struct NamedBroker<M> {
    name: String,
    directory: Arc<Directory<M>>,
}

impl<M> Clone for NamedBroker<M> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            directory: self.directory.clone(),
        }
    }
}

impl<M> NamedBroker<M> {
    pub fn new(name: impl Into<String>, directory: Arc<Directory<M>>) -> Self {
        Self {
            name: name.into(),
            directory,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        self.directory.resolve(&self.name).is_ok()
    }

    pub async fn subscribe(
        &self,
        topic: impl Into<Topic>,
        subscriber: &Subscriber<M>,
    ) -> Result<()> {
        self.directory
            .resolve(&self.name)?
            .subscribe(topic, subscriber)
            .await
    }

    pub async fn unsubscribe(
        &self,
        topic: impl Into<Topic>,
        subscriber: &Subscriber<M>,
    ) -> Result<()> {
        self.directory
            .resolve(&self.name)?
            .unsubscribe(topic, subscriber)
            .await
    }

    pub async fn subscribers(&self, topic: impl Into<Topic>) -> Result<Vec<Subscriber<M>>> {
        self.directory.resolve(&self.name)?.subscribers(topic).await
    }

    pub async fn topics(&self) -> Result<Vec<Topic>> {
        self.directory.resolve(&self.name)?.topics().await
    }

    pub async fn stop(&self) -> Result<()> {
        self.directory.stop(&self.name).await
    }
}

impl<M: Clone> NamedBroker<M> {
    pub fn publish(&self, topic: impl AsRef<str>, message: M) -> Result<()> {
        self.directory.resolve(&self.name)?.publish(topic, message)
    }
}
