//! The `client` module defines the subscriber side of the broker.
//!
//! A [`Subscriber`] is the handle the broker stores and delivers to; the
//! matching [`Mailbox`] is owned by the execution unit that consumes the
//! messages. Dropping the mailbox is how an execution unit terminates as far
//! as the broker is concerned.

pub mod pubsub_client;
pub use pubsub_client::{Mailbox, Subscriber, SubscriberId};
