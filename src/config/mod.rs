//! # Editorial Workflow Configuration
//!
//! Explicit configuration passed to component constructors at startup.
//! Nothing in the crate looks routing names or tunables up from ambient
//! global state; [`ConfigManager`] builds an [`EditorialConfig`] once and
//! the bootstrap hands the relevant sections to each component.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use editorial_workflow::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let exchange = &manager.config().messaging.exchange;
//! let batch_size = manager.config().consumer.batch_size;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::constants::{messaging, system};
use crate::messaging::Route;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring `config/editorial.toml`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EditorialConfig {
    /// Deployment environment (development, test, production)
    pub environment: String,

    /// Which domains this process hosts
    pub service: ServiceConfig,

    /// Storage backend for stores and the message bus
    pub backend: Backend,

    pub database: DatabaseConfig,

    /// Exchange, routing keys and queues
    pub messaging: MessagingConfig,

    /// Broker pull-loop settings
    pub consumer: ConsumerConfig,

    pub outbox: OutboxConfig,

    pub review: ReviewConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Process-local stores and bus; state is lost on restart
    Memory,
    /// PostgreSQL tables for stores, outbox and queues
    Postgres,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceRole {
    /// Both domains in one process
    All,
    /// Post records, submission and result consumption
    Authoring,
    /// Review records and decisions
    Review,
}

impl ServiceRole {
    pub fn hosts_authoring(&self) -> bool {
        matches!(self, Self::All | Self::Authoring)
    }

    pub fn hosts_review(&self) -> bool {
        matches!(self, Self::All | Self::Review)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    pub role: ServiceRole,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Required when `backend = "postgres"`
    pub url: Option<String>,
    pub max_connections: u32,
    pub acquire_timeout_seconds: u64,
    /// Apply bundled migrations on startup
    pub run_migrations: bool,
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_seconds)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MessagingConfig {
    pub exchange: String,
    pub review_request_routing_key: String,
    pub review_result_routing_key: String,
    pub review_request_queue: String,
    pub review_result_queue: String,
}

impl MessagingConfig {
    pub fn review_request_route(&self) -> Route {
        Route::new(&self.exchange, &self.review_request_routing_key)
    }

    pub fn review_result_route(&self) -> Route {
        Route::new(&self.exchange, &self.review_result_routing_key)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConsumerConfig {
    /// Deliveries pulled per poll
    pub batch_size: usize,
    /// Sleep between empty polls
    pub polling_interval_ms: u64,
    /// How long a received delivery stays invisible before redelivery
    pub visibility_timeout_seconds: u64,
    /// Transient failures beyond this many deliveries are dead-lettered
    pub max_deliveries: u32,
}

impl ConsumerConfig {
    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms)
    }

    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.visibility_timeout_seconds)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutboxConfig {
    pub batch_size: usize,
    pub dispatch_interval_ms: u64,
}

impl OutboxConfig {
    pub fn dispatch_interval(&self) -> Duration {
        Duration::from_millis(self.dispatch_interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReviewConfig {
    pub result_policy: ResultApplyPolicy,
}

/// How the result consumer treats an item that is no longer REQUESTED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultApplyPolicy {
    /// Only transition out of REQUESTED; anything else is a logged no-op
    RequireRequested,
    /// Apply the result status whatever the current status is
    Overwrite,
}

impl Default for EditorialConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            service: ServiceConfig {
                role: ServiceRole::All,
            },
            backend: Backend::Memory,
            database: DatabaseConfig {
                url: None,
                max_connections: system::DEFAULT_MAX_CONNECTIONS,
                acquire_timeout_seconds: system::DEFAULT_ACQUIRE_TIMEOUT_SECONDS,
                run_migrations: true,
            },
            messaging: MessagingConfig {
                exchange: messaging::DEFAULT_EXCHANGE.to_string(),
                review_request_routing_key: messaging::REVIEW_REQUEST_ROUTING_KEY.to_string(),
                review_result_routing_key: messaging::REVIEW_RESULT_ROUTING_KEY.to_string(),
                review_request_queue: messaging::REVIEW_REQUEST_QUEUE.to_string(),
                review_result_queue: messaging::REVIEW_RESULT_QUEUE.to_string(),
            },
            consumer: ConsumerConfig {
                batch_size: system::DEFAULT_CONSUMER_BATCH_SIZE,
                polling_interval_ms: system::DEFAULT_POLLING_INTERVAL_MS,
                visibility_timeout_seconds: system::DEFAULT_VISIBILITY_TIMEOUT_SECONDS,
                max_deliveries: system::DEFAULT_MAX_DELIVERIES,
            },
            outbox: OutboxConfig {
                batch_size: system::DEFAULT_OUTBOX_BATCH_SIZE,
                dispatch_interval_ms: system::DEFAULT_OUTBOX_INTERVAL_MS,
            },
            review: ReviewConfig {
                result_policy: ResultApplyPolicy::RequireRequested,
            },
        }
    }
}

impl EditorialConfig {
    /// Validate configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.environment.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "environment",
                "root configuration",
            ));
        }

        let names = [
            ("messaging.exchange", &self.messaging.exchange),
            (
                "messaging.review_request_routing_key",
                &self.messaging.review_request_routing_key,
            ),
            (
                "messaging.review_result_routing_key",
                &self.messaging.review_result_routing_key,
            ),
            (
                "messaging.review_request_queue",
                &self.messaging.review_request_queue,
            ),
            (
                "messaging.review_result_queue",
                &self.messaging.review_result_queue,
            ),
        ];
        for (field, value) in names {
            if value.trim().is_empty() {
                return Err(ConfigurationError::missing_required_field(
                    field,
                    "messaging configuration",
                ));
            }
        }

        if self.messaging.review_request_queue == self.messaging.review_result_queue {
            return Err(ConfigurationError::invalid_value(
                "messaging.review_result_queue",
                &self.messaging.review_result_queue,
                "request and result queues must differ",
            ));
        }

        if self.consumer.batch_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "consumer.batch_size",
                "0",
                "batch size must be greater than 0",
            ));
        }

        if self.consumer.visibility_timeout_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "consumer.visibility_timeout_seconds",
                "0",
                "visibility timeout must be greater than 0",
            ));
        }

        if self.consumer.max_deliveries == 0 {
            return Err(ConfigurationError::invalid_value(
                "consumer.max_deliveries",
                "0",
                "max deliveries must be greater than 0",
            ));
        }

        if self.outbox.batch_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "outbox.batch_size",
                "0",
                "batch size must be greater than 0",
            ));
        }

        if self.backend == Backend::Postgres {
            match &self.database.url {
                Some(url) if !url.trim().is_empty() => {}
                _ => {
                    return Err(ConfigurationError::missing_required_field(
                        "database.url",
                        "postgres backend",
                    ))
                }
            }

            if self.database.max_connections == 0 {
                return Err(ConfigurationError::invalid_value(
                    "database.max_connections",
                    "0",
                    "pool size must be greater than 0",
                ));
            }
        }

        Ok(())
    }
}
