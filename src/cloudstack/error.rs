use thiserror::Error;

/// CloudStack error code returned for invalid parameters, including ids of
/// entities that no longer exist.
pub const PARAM_ERROR_CODE: u16 = 431;

/// Errors raised while talking to the CloudStack management API.
///
/// SECURITY: Error messages must NEVER contain the API key or secret key.
#[derive(Debug, Error)]
pub enum CloudStackError {
    /// The API answered with an `errorcode` / `errortext` pair
    #[error("CloudStack API error {code}: {message}")]
    Api { code: u16, message: String },

    /// Network-level error (connection failed, timeout, etc.)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The response body did not have the expected envelope
    #[error("invalid response for {command}: {message}")]
    InvalidResponse { command: String, message: String },

    /// An async job finished with `jobstatus == 2`
    #[error("async job {job_id} failed ({code}): {message}")]
    AsyncJobFailed {
        job_id: String,
        code: u16,
        message: String,
    },

    /// An async job did not finish before the configured timeout
    #[error("timeout waiting for async job {job_id} after {seconds}s")]
    Timeout { job_id: String, seconds: u64 },

    #[error("failed to sign request: {0}")]
    Signature(String),
}

impl CloudStackError {
    /// True when the API reports the addressed entity as missing.
    pub fn is_not_found(&self) -> bool {
        let (code, message) = match self {
            CloudStackError::Api { code, message } => (*code, message),
            CloudStackError::AsyncJobFailed { code, message, .. } => (*code, message),
            _ => return false,
        };
        code == PARAM_ERROR_CODE && message.contains("does not exist")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = CloudStackError::Api {
            code: 530,
            message: "Internal error executing command".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "CloudStack API error 530: Internal error executing command"
        );
    }

    #[test]
    fn test_not_found_detection() {
        let err = CloudStackError::Api {
            code: 431,
            message: "Invalid parameter id value=abc due to incorrect long value format, or entity does not exist or due to incorrect parameter annotation for the field in api cmd class.".to_string(),
        };
        assert!(err.is_not_found());
    }

    #[test]
    fn test_not_found_requires_param_error_code() {
        let err = CloudStackError::Api {
            code: 530,
            message: "entity does not exist".to_string(),
        };
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_other_param_errors_are_not_not_found() {
        let err = CloudStackError::Api {
            code: 431,
            message: "Unable to find a valid service offering".to_string(),
        };
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_async_job_not_found() {
        let err = CloudStackError::AsyncJobFailed {
            job_id: "job-1".to_string(),
            code: 431,
            message: "Unable to find volume; entity does not exist".to_string(),
        };
        assert!(err.is_not_found());
    }

    #[test]
    fn test_timeout_display() {
        let err = CloudStackError::Timeout {
            job_id: "job-1".to_string(),
            seconds: 900,
        };
        assert_eq!(
            err.to_string(),
            "timeout waiting for async job job-1 after 900s"
        );
    }
}
