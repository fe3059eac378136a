use thiserror::Error;

use crate::cloudstack::CloudStackError;

pub type Result<T> = std::result::Result<T, ProviderError>;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// A CloudStack call failed while performing `action`
    #[error("Error {action}: {source}")]
    Api {
        action: String,
        #[source]
        source: CloudStackError,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid {resource} configuration: {message}")]
    Validation { resource: String, message: String },

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("{kind} '{name}' not found")]
    NotFound { kind: String, name: String },

    #[error("unknown resource type: {0}")]
    UnknownResource(String),

    #[error("unknown data source type: {0}")]
    UnknownDataSource(String),

    #[error("user data error: {0}")]
    UserData(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProviderError {
    pub fn validation(resource: &str, message: impl Into<String>) -> Self {
        ProviderError::Validation {
            resource: resource.to_string(),
            message: message.into(),
        }
    }

    pub fn not_found(kind: &str, name: impl Into<String>) -> Self {
        ProviderError::NotFound {
            kind: kind.to_string(),
            name: name.into(),
        }
    }

    /// True when the underlying API error reports a missing entity.
    pub fn is_not_found(&self) -> bool {
        match self {
            ProviderError::Api { source, .. } => source.is_not_found(),
            ProviderError::NotFound { .. } => true,
            _ => false,
        }
    }
}

/// Attaches a description of the failed operation to a CloudStack error.
pub trait Context<T> {
    fn context<F>(self, action: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> Context<T> for std::result::Result<T, CloudStackError> {
    fn context<F>(self, action: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|source| ProviderError::Api {
            action: action(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_api_error_display() {
        let err: Result<()> = Err(CloudStackError::Api {
            code: 431,
            message: "Unable to find zone".to_string(),
        })
        .context(|| "creating network web".to_string());

        assert_eq!(
            err.unwrap_err().to_string(),
            "Error creating network web: CloudStack API error 431: Unable to find zone"
        );
    }

    #[test]
    fn test_config_error_display() {
        let err = ProviderError::Config("missing api_url".to_string());
        assert_eq!(err.to_string(), "configuration error: missing api_url");
    }

    #[test]
    fn test_validation_error_display() {
        let err = ProviderError::validation("cloudstack_network", "missing required argument \"zone\"");
        assert_eq!(
            err.to_string(),
            "invalid cloudstack_network configuration: missing required argument \"zone\""
        );
    }

    #[test]
    fn test_io_error_from_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: ProviderError = io_err.into();
        assert!(matches!(err, ProviderError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_is_not_found_through_context() {
        let err = Err::<(), _>(CloudStackError::Api {
            code: 431,
            message: "entity does not exist".to_string(),
        })
        .context(|| "deleting volume".to_string())
        .unwrap_err();
        assert!(err.is_not_found());

        let other = ProviderError::Config("x".to_string());
        assert!(!other.is_not_found());
    }
}
