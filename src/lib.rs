//! # SubHub
//!
//! `subhub` is a lightweight, in-process publish/subscribe broker built on
//! tokio. Subscribers register interest in named topics; publishing to a
//! topic enqueues the message into the mailbox of every subscriber currently
//! registered for it. A subscriber whose mailbox is dropped is removed from
//! every topic automatically, without an explicit unsubscribe.
//!
//! ## Core Modules
//!
//! - `broker`: the broker event loop, its sharded subscription registry, the
//!   name directory and convenience bindings.
//! - `client`: subscriber handles and the mailboxes behind them.
//! - `config`: loading broker and logging settings from files and the environment.
//! - `utils`: shared utilities, such as error handling and logging setup.
//!
//! ## Example
//!
//! ```no_run
//! use subhub::{Broker, BrokerOptions, Directory, Subscriber};
//!
//! # async fn demo() -> subhub::Result<()> {
//! let directory = Directory::new();
//! let broker = Broker::start(BrokerOptions::new().name("chat"), &directory)?;
//!
//! let (subscriber, mut mailbox) = Subscriber::channel();
//! broker.subscribe("lobby", &subscriber).await?;
//! broker.publish("lobby", "hello".to_string())?;
//! assert_eq!(mailbox.recv().await.as_deref(), Some("hello"));
//! # Ok(())
//! # }
//! ```

pub mod broker;
pub mod client;
pub mod config;
pub mod utils;

pub use broker::{
    Broker, BrokerHandle, BrokerOptions, DEFAULT_BROKER_NAME, Directory, NamedBroker, Topic,
};
pub use client::{Mailbox, Subscriber, SubscriberId};
pub use utils::error::{BrokerError, Result};
