//! Error types for the fabrication assistant

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Dataset unavailable: {0}")]
    DatasetUnavailable(String),

    #[error("Malformed dataset row {row}: {reason}")]
    MalformedRecord { row: usize, reason: String },

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("{provider} error {status}: {body}")]
    ProviderStatus {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("Empty response from {0}")]
    EmptyResponse(&'static str),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Http(err.to_string())
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Error::DatasetUnavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_config() {
        let err = Error::Config("missing section".to_string());
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("missing section"));
    }

    #[test]
    fn test_error_display_dataset_unavailable() {
        let err = Error::DatasetUnavailable("methods.csv".to_string());
        assert!(err.to_string().contains("Dataset unavailable"));
        assert!(err.to_string().contains("methods.csv"));
    }

    #[test]
    fn test_error_display_malformed_record() {
        let err = Error::MalformedRecord {
            row: 7,
            reason: "empty description".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("row 7"));
        assert!(msg.contains("empty description"));
    }

    #[test]
    fn test_error_display_provider_status() {
        let err = Error::ProviderStatus {
            provider: "Gemini",
            status: 429,
            body: "quota exceeded".to_string(),
        };
        assert_eq!(err.to_string(), "Gemini error 429: quota exceeded");
    }

    #[test]
    fn test_error_display_empty_response() {
        let err = Error::EmptyResponse("Gemini");
        assert_eq!(err.to_string(), "Empty response from Gemini");
    }

    #[test]
    fn test_error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::IoError(_)));
        assert!(err.to_string().contains("IO error"));
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();

        assert!(matches!(err, Error::SerializationError(_)));
        assert!(err.to_string().contains("Serialization error"));
    }

    #[test]
    fn test_error_from_serde_yaml() {
        let yaml_err = serde_yaml::from_str::<Vec<i32>>("{ invalid yaml [").unwrap_err();
        let err: Error = yaml_err.into();

        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_result_unwrap_or_else() {
        let result: Result<i32> = Err(Error::InvalidArgument("bad".to_string()));
        let value = result.unwrap_or_else(|_| 42);
        assert_eq!(value, 42);
    }
}
