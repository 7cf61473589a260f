//! Domain errors for thread persistence and the chat protocol.

use thiserror::Error;

/// Errors raised by the thread store, branch editor and protocol handler.
#[derive(Debug, Error)]
pub enum ChatError {
    /// A request or record failed validation. Nothing was persisted.
    #[error("invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// The referenced thread or message does not exist (or is not visible to the caller).
    #[error("{0} not found")]
    NotFound(String),

    /// The agent engine failed to produce a response.
    #[error("agent failed: {0}")]
    Agent(String),

    /// The datastore failed.
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl ChatError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn agent(message: impl Into<String>) -> Self {
        Self::Agent(message.into())
    }

    /// Message safe to show to the end user.
    ///
    /// Agent and store failures are reported generically; their detail only goes to the log.
    pub fn public_message(&self) -> String {
        match self {
            Self::Agent(_) => AGENT_FAILURE_MESSAGE.to_string(),
            Self::Store(_) => "An internal error occurred. Please try again.".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<sqlx::Error> for ChatError {
    fn from(err: sqlx::Error) -> Self {
        Self::Store(err.into())
    }
}

/// Shown to the end user when the agent engine fails.
pub const AGENT_FAILURE_MESSAGE: &str = "The assistant failed to respond. Please try again.";

/// Result alias for thread operations.
pub type ChatResult<T> = Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ChatError::validation("metadata.eventId", "required for agent type client");
        assert_eq!(
            err.to_string(),
            "invalid metadata.eventId: required for agent type client"
        );

        let err = ChatError::not_found("thread thr_1");
        assert_eq!(err.to_string(), "thread thr_1 not found");
    }

    #[test]
    fn test_public_message_hides_detail() {
        let err = ChatError::Store(anyhow::anyhow!("disk I/O error at page 42"));
        assert!(!err.public_message().contains("page 42"));

        let err = ChatError::agent("upstream timed out: sk-live-1234");
        assert_eq!(err.public_message(), AGENT_FAILURE_MESSAGE);
        assert!(err.to_string().contains("sk-live-1234"));
    }
}
