use serde::{Deserialize, Serialize};
use std::env;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub broker: BrokerConfig,
    pub consumer: ConsumerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    pub url: String,
    pub consumer_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerConfig {
    pub max_connect_attempts: u32,
    pub retry_delay_seconds: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("SERVER_PORT")
                    .unwrap_or_else(|_| "8006".to_string())
                    .parse()
                    .map_err(|_| ConfigError::InvalidPort)?,
            },
            broker: BrokerConfig {
                url: env::var("BROKER_URL")
                    .unwrap_or_else(|_| "redis://redis:6379".to_string()),
                consumer_name: env::var("CONSUMER_NAME")
                    .unwrap_or_else(|_| "analytics-consumer".to_string()),
            },
            consumer: ConsumerConfig {
                max_connect_attempts: env::var("MAX_CONNECT_ATTEMPTS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
                retry_delay_seconds: env::var("RETRY_DELAY_SECONDS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
            },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidPort);
        }

        if self.broker.url.is_empty() {
            return Err(ConfigError::InvalidConfig("Broker URL must not be empty".to_string()));
        }

        if self.consumer.max_connect_attempts == 0 {
            return Err(ConfigError::InvalidConfig(
                "Max connect attempts must be > 0".to_string(),
            ));
        }

        if self.consumer.retry_delay_seconds == 0 {
            return Err(ConfigError::InvalidConfig(
                "Retry delay must be > 0 seconds".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8006,
            },
            broker: BrokerConfig {
                url: "redis://redis:6379".to_string(),
                consumer_name: "analytics-consumer".to_string(),
            },
            consumer: ConsumerConfig {
                max_connect_attempts: 10,
                retry_delay_seconds: 5,
            },
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 8006);
        assert_eq!(config.consumer.max_connect_attempts, 10);
        assert_eq!(config.consumer.retry_delay_seconds, 5);
    }

    #[test]
    fn test_config_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_retry_budget_rejected() {
        let mut config = Config::default();
        config.consumer.max_connect_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_broker_url_rejected() {
        let mut config = Config::default();
        config.broker.url = String::new();
        assert!(config.validate().is_err());
    }
}
