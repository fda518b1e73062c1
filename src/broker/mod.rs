pub mod directory;
pub mod engine;
pub mod fanout;
pub(crate) mod message;
pub mod named;
pub mod registry;
pub mod topic;

pub use directory::Directory;
pub use engine::{Broker, BrokerHandle, BrokerOptions, DEFAULT_BROKER_NAME};
pub use named::NamedBroker;
pub use registry::SubscriptionRegistry;
pub use topic::Topic;
