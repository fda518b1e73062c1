//! Requests handled by the broker event loop
//!
//! Every mutating or listing operation travels to the loop as a `Command`
//! carrying a `oneshot` sender for the reply. The loop processes commands in
//! receipt order, one at a time. Publish never goes through here: it is
//! dispatched straight from the shared registry by the caller.

use tokio::sync::oneshot;

use super::topic::Topic;
use crate::client::Subscriber;

pub(crate) enum Command<M> {
    Subscribe {
        topic: Topic,
        subscriber: Subscriber<M>,
        reply: oneshot::Sender<()>,
    },
    Unsubscribe {
        topic: Topic,
        subscriber: Subscriber<M>,
        reply: oneshot::Sender<()>,
    },
    Subscribers {
        topic: Topic,
        reply: oneshot::Sender<Vec<Subscriber<M>>>,
    },
    Topics {
        reply: oneshot::Sender<Vec<Topic>>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
}

impl<M> Command<M> {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Subscribe { .. } => "subscribe",
            Self::Unsubscribe { .. } => "unsubscribe",
            Self::Subscribers { .. } => "subscribers",
            Self::Topics { .. } => "topics",
            Self::Stop { .. } => "stop",
        }
    }
}
