//! Error types for reactive-action

use thiserror::Error;

/// Result type alias for the fallible setup operations of this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while setting an action up
///
/// Running an action never produces this type: rejections and work failures
/// are delivered on [`Action::errors`](crate::Action::errors) as
/// [`ActionError`].
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Failed to parse YAML
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Failed to parse JSON
    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// No spawner could be resolved for the calling context
    #[error("No supported async runtime detected, pass a spawner explicitly")]
    NoRuntime,
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

/// Event published on an action's error stream
///
/// Exactly one event is published per rejected input and per failed
/// execution. Cancellation never produces one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError<F> {
    /// The input arrived while the action was disabled, either because an
    /// execution was in flight or because the enable condition was `false`
    #[error("Action is not enabled")]
    NotEnabled,

    /// The work stream terminated with a failure
    #[error("Action failed: {0}")]
    Failed(F),
}

impl<F> ActionError<F> {
    /// Whether this is a [`ActionError::NotEnabled`] rejection
    pub fn is_not_enabled(&self) -> bool {
        matches!(self, Self::NotEnabled)
    }

    /// A fresh `NotEnabled` value if this is a rejection, otherwise `None`
    pub fn not_enabled(&self) -> Option<ActionError<F>> {
        match self {
            Self::NotEnabled => Some(Self::NotEnabled),
            Self::Failed(_) => None,
        }
    }

    /// The wrapped failure, if this is a [`ActionError::Failed`]
    pub fn action_error(&self) -> Option<&F> {
        match self {
            Self::Failed(failure) => Some(failure),
            Self::NotEnabled => None,
        }
    }

    /// Consume the event, yielding the wrapped failure if there is one
    pub fn into_action_error(self) -> Option<F> {
        match self {
            Self::Failed(failure) => Some(failure),
            Self::NotEnabled => None,
        }
    }

    /// Transform the wrapped failure, keeping the tag
    pub fn map_failure<G>(self, f: impl FnOnce(F) -> G) -> ActionError<G> {
        match self {
            Self::NotEnabled => ActionError::NotEnabled,
            Self::Failed(failure) => ActionError::Failed(f(failure)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq, Error)]
    #[error("timed out")]
    struct Timeout;

    #[test]
    fn test_not_enabled_accessors() {
        let err: ActionError<Timeout> = ActionError::NotEnabled;

        assert!(err.is_not_enabled());
        assert_eq!(err.not_enabled(), Some(ActionError::NotEnabled));
        assert_eq!(err.action_error(), None);
        assert_eq!(err.into_action_error(), None);
    }

    #[test]
    fn test_failed_accessors() {
        let err = ActionError::Failed(Timeout);

        assert!(!err.is_not_enabled());
        assert_eq!(err.not_enabled(), None);
        assert_eq!(err.action_error(), Some(&Timeout));
        assert_eq!(err.into_action_error(), Some(Timeout));
    }

    #[test]
    fn test_display() {
        assert_eq!(
            ActionError::<Timeout>::NotEnabled.to_string(),
            "Action is not enabled"
        );
        assert_eq!(
            ActionError::Failed(Timeout).to_string(),
            "Action failed: timed out"
        );
    }

    #[test]
    fn test_map_failure_keeps_tag() {
        let mapped = ActionError::Failed(Timeout).map_failure(|e| e.to_string());
        assert_eq!(mapped, ActionError::Failed("timed out".to_string()));

        let mapped = ActionError::<Timeout>::NotEnabled.map_failure(|e| e.to_string());
        assert!(mapped.is_not_enabled());
    }

    #[test]
    fn test_config_error_message() {
        let err = Error::config("observer_capacity must be greater than zero");
        assert_eq!(
            err.to_string(),
            "Invalid configuration: observer_capacity must be greater than zero"
        );
    }
}
