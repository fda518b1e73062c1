use serde::Deserialize;

use crate::broker::DEFAULT_BROKER_NAME;

/// Top-level configuration settings for the application.
///
/// Includes settings for the broker instance and for logging.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Settings {
    pub broker: BrokerSettings,
    pub logging: LoggingSettings,
}

/// Configuration settings for a broker instance.
///
/// `registry_identity` and `registry_partitions` fall back to values derived
/// from the name and the host when left unset.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct BrokerSettings {
    pub name: String,
    pub registry_identity: Option<String>,
    pub registry_partitions: Option<usize>,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub broker: Option<PartialBrokerSettings>,
    pub logging: Option<PartialLoggingSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialBrokerSettings {
    pub name: Option<String>,
    pub registry_identity: Option<String>,
    pub registry_partitions: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            broker: BrokerSettings {
                name: DEFAULT_BROKER_NAME.to_string(),
                registry_identity: None,
                registry_partitions: None,
            },
            logging: LoggingSettings {
                level: "info".to_string(),
            },
        }
    }
}

impl PartialSettings {
    /// Merge with defaults; values present here win.
    pub fn merge(self, default: Settings) -> Settings {
        let broker = self.broker;
        let logging = self.logging;

        Settings {
            broker: BrokerSettings {
                name: broker
                    .as_ref()
                    .and_then(|b| b.name.clone())
                    .unwrap_or(default.broker.name),
                registry_identity: broker
                    .as_ref()
                    .and_then(|b| b.registry_identity.clone())
                    .or(default.broker.registry_identity),
                registry_partitions: broker
                    .as_ref()
                    .and_then(|b| b.registry_partitions)
                    .or(default.broker.registry_partitions),
            },
            logging: LoggingSettings {
                level: logging
                    .and_then(|l| l.level)
                    .unwrap_or(default.logging.level),
            },
        }
    }
}
