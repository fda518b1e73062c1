//! The `error` module defines the error types surfaced by broker operations.
//!
//! Only two things can go wrong when talking to a broker: starting one under
//! an identity that is already taken, and addressing one that cannot be
//! reached. Subscribe, unsubscribe and publish are otherwise total.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    /// A running broker already owns this identity.
    #[error("broker `{name}` is already started")]
    StartFailure { name: String },

    /// Nothing was ever started under this identity.
    #[error("no broker registered under `{name}`")]
    NotRegistered { name: String },

    /// The identity resolves, but the instance has stopped.
    #[error("broker `{name}` is not running")]
    NotRunning { name: String },
}

impl BrokerError {
    /// True for the failures caused by an unreachable instance.
    pub fn is_addressing(&self) -> bool {
        matches!(self, Self::NotRegistered { .. } | Self::NotRunning { .. })
    }

    pub(crate) fn not_running(name: &str) -> Self {
        Self::NotRunning {
            name: name.to_string(),
        }
    }
}

pub type Result<T, E = BrokerError> = std::result::Result<T, E>;
