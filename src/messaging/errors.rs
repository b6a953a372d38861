//! # Messaging Error Types
//!
//! Structured broker errors using thiserror instead of `Box<dyn Error>`
//! patterns. Every variant is transient from the workflow's point of view:
//! the outbox keeps undelivered events and consumers release deliveries
//! they could not settle.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MessagingError {
    #[error("Broker unavailable: {message}")]
    Unavailable { message: String },

    #[error("Database query error: {operation}: {message}")]
    DatabaseQuery { operation: String, message: String },

    #[error("Queue operation failed: {queue_name}: {operation}: {message}")]
    QueueOperation {
        queue_name: String,
        operation: String,
        message: String,
    },

    #[error("Queue not found: {queue_name}")]
    QueueNotFound { queue_name: String },

    /// No queue is bound to the exchange/routing key pair
    #[error("Unroutable message: no queue bound to {exchange}/{routing_key}")]
    Unroutable {
        exchange: String,
        routing_key: String,
    },

    #[error("Delivery {delivery_id} not found in queue {queue_name}")]
    DeliveryNotFound { queue_name: String, delivery_id: i64 },

    #[error("Message serialization error: {message}")]
    MessageSerialization { message: String },
}

impl MessagingError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Create a database query error
    pub fn database_query(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DatabaseQuery {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a queue operation error
    pub fn queue_operation(
        queue_name: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::QueueOperation {
            queue_name: queue_name.into(),
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a queue not found error
    pub fn queue_not_found(queue_name: impl Into<String>) -> Self {
        Self::QueueNotFound {
            queue_name: queue_name.into(),
        }
    }

    pub fn unroutable(exchange: impl Into<String>, routing_key: impl Into<String>) -> Self {
        Self::Unroutable {
            exchange: exchange.into(),
            routing_key: routing_key.into(),
        }
    }

    pub fn delivery_not_found(queue_name: impl Into<String>, delivery_id: i64) -> Self {
        Self::DeliveryNotFound {
            queue_name: queue_name.into(),
            delivery_id,
        }
    }
}

/// Conversion from sqlx::Error to MessagingError
impl From<sqlx::Error> for MessagingError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                MessagingError::unavailable(err.to_string())
            }
            sqlx::Error::Database(db_err) => {
                MessagingError::database_query("database", db_err.to_string())
            }
            other => MessagingError::database_query("query", other.to_string()),
        }
    }
}

impl From<serde_json::Error> for MessagingError {
    fn from(err: serde_json::Error) -> Self {
        MessagingError::MessageSerialization {
            message: err.to_string(),
        }
    }
}

/// Result type alias for messaging operations
pub type MessagingResult<T> = Result<T, MessagingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messaging_error_creation() {
        let err = MessagingError::queue_operation("review_queue", "send", "Failed to send");
        assert!(matches!(err, MessagingError::QueueOperation { .. }));

        let err: MessagingError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, MessagingError::Unavailable { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = MessagingError::unroutable("post.review.exchange", "post.review.result");
        assert_eq!(
            err.to_string(),
            "Unroutable message: no queue bound to post.review.exchange/post.review.result"
        );

        let err = MessagingError::queue_operation("my_queue", "read", "Read failed");
        let display_str = format!("{err}");
        assert!(display_str.contains("my_queue"));
        assert!(display_str.contains("Read failed"));
    }
}
