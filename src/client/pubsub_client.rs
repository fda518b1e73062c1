//! Subscriber handles and mailboxes
//!
//! `Subscriber` holds the sending side of a per-subscriber unbounded channel
//! and a UUID identifying the execution unit behind it. The only way to get
//! a handle is `Subscriber::channel`, which mints exactly one id per
//! mailbox; every other handle for that mailbox is a clone. Comparing ids is
//! therefore the same as comparing mailboxes.

use std::fmt;
use std::hash::{Hash, Hasher};

use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

pub type SubscriberId = Uuid;

pub struct Subscriber<M> {
    id: SubscriberId,
    sender: UnboundedSender<M>,
}

impl<M> Subscriber<M> {
    /// Create a connected handle and mailbox. Clone the handle to address
    /// the same mailbox from elsewhere.
    pub fn channel() -> (Self, Mailbox<M>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscriber = Self {
            id: Uuid::new_v4(),
            sender: tx,
        };
        let mailbox = Mailbox {
            id: subscriber.id,
            receiver: rx,
        };
        (subscriber, mailbox)
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Enqueue `message` without waiting. Returns `false` when the mailbox is
    /// gone and the message was dropped.
    pub fn deliver(&self, message: M) -> bool {
        self.sender.send(message).is_ok()
    }

    pub fn is_terminated(&self) -> bool {
        self.sender.is_closed()
    }

    /// Resolves once the mailbox behind this handle is dropped or closed.
    pub async fn terminated(&self) {
        self.sender.closed().await
    }
}

impl<M> Clone for Subscriber<M> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            sender: self.sender.clone(),
        }
    }
}

impl<M> PartialEq for Subscriber<M> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<M> Eq for Subscriber<M> {}

impl<M> Hash for Subscriber<M> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<M> fmt::Debug for Subscriber<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("terminated", &self.is_terminated())
            .finish()
    }
}

/// Receiving side of a subscriber. Dropping it terminates the subscriber.
#[derive(Debug)]
pub struct Mailbox<M> {
    id: SubscriberId,
    receiver: UnboundedReceiver<M>,
}

impl<M> Mailbox<M> {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next message. `None` once the mailbox is closed and
    /// drained, or every handle to it is gone.
    pub async fn recv(&mut self) -> Option<M> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Result<M, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Refuse further deliveries while keeping already queued messages
    /// readable. Monitors observe this as termination.
    pub fn close(&mut self) {
        self.receiver.close();
    }
}
