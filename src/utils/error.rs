use thiserror::Error;

#[derive(Error, Debug)]
pub enum HubError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Config validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("LLM provider error ({status}): {message}")]
    ProviderError { status: u16, message: String },

    #[error("LLM returned no usable output: {message}")]
    ExtractionError { message: String },

    #[error("GitHub API error: {message} (status: {status})")]
    GitHubError { status: u16, message: String },

    #[error("GitHub authentication required")]
    GitHubUnauthorized,

    #[error("GitHub rate limit exceeded")]
    GitHubRateLimited,

    #[error("Google Forms API error: {message} (status: {status})")]
    FormsError { status: u16, message: String },

    #[error("OAuth error: {message}")]
    OAuthError { message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Provider,
    Processing,
    Storage,
    Authentication,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl HubError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            HubError::ConfigError { .. }
            | HubError::MissingConfigError { .. }
            | HubError::InvalidConfigValueError { .. }
            | HubError::ConfigValidationError { .. }
            | HubError::ValidationError { .. } => ErrorCategory::Configuration,
            HubError::ApiError(_) => ErrorCategory::Network,
            HubError::ProviderError { .. } | HubError::ExtractionError { .. } => {
                ErrorCategory::Provider
            }
            HubError::GitHubUnauthorized | HubError::OAuthError { .. } => {
                ErrorCategory::Authentication
            }
            HubError::GitHubError { status, .. } | HubError::FormsError { status, .. }
                if *status == 401 || *status == 403 =>
            {
                ErrorCategory::Authentication
            }
            HubError::GitHubError { .. }
            | HubError::GitHubRateLimited
            | HubError::FormsError { .. } => ErrorCategory::Network,
            HubError::ZipError(_) | HubError::IoError(_) => ErrorCategory::Storage,
            HubError::SerializationError(_) | HubError::ProcessingError { .. } => {
                ErrorCategory::Processing
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network | ErrorCategory::Provider => ErrorSeverity::Medium,
            ErrorCategory::Processing
            | ErrorCategory::Configuration
            | ErrorCategory::Authentication => ErrorSeverity::High,
            ErrorCategory::Storage => ErrorSeverity::Critical,
        }
    }

    /// Whether running the same step again has a reasonable chance of succeeding.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            HubError::ApiError(_)
                | HubError::GitHubRateLimited
                | HubError::ExtractionError { .. }
                | HubError::SerializationError(_)
        ) || matches!(self, HubError::ProviderError { status, .. } if *status == 429 || *status >= 500)
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            HubError::MissingConfigError { field } => format!(
                "Set {} in the environment or in hub.toml",
                field
            ),
            HubError::InvalidConfigValueError { field, .. }
            | HubError::ConfigValidationError { field, .. } => {
                format!("Fix the value of {} and try again", field)
            }
            HubError::ProviderError { status: 401, .. } => {
                "Check that the LLM API key is valid for the selected provider".to_string()
            }
            HubError::ProviderError { status: 429, .. } => {
                "The LLM provider is rate limiting requests; wait a moment and retry".to_string()
            }
            HubError::ExtractionError { .. } => {
                "The model reply could not be parsed; run the step again".to_string()
            }
            HubError::GitHubUnauthorized => {
                "Check GITHUB_TOKEN and make sure it has the repo scope".to_string()
            }
            HubError::GitHubRateLimited => {
                "GitHub rate limit reached; wait for the limit to reset".to_string()
            }
            HubError::OAuthError { .. } => {
                "Delete the cached token file and authorize the Google account again".to_string()
            }
            HubError::ApiError(_) => "Check the network connection and the API endpoint".to_string(),
            HubError::IoError(_) | HubError::ZipError(_) => {
                "Check that the output directory exists and is writable".to_string()
            }
            _ => "See the logs (run with --verbose) for details".to_string(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Network => format!("Remote service request failed: {}", self),
            ErrorCategory::Provider => format!("The language model call failed: {}", self),
            ErrorCategory::Processing => format!("Could not process generated content: {}", self),
            ErrorCategory::Storage => format!("Could not write output: {}", self),
            ErrorCategory::Authentication => format!("Authentication failed: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, HubError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories_and_severity() {
        let err = HubError::MissingConfigError {
            field: "GROQ_API_KEY".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(err.severity(), ErrorSeverity::High);
        assert!(err.recovery_suggestion().contains("GROQ_API_KEY"));

        let err = HubError::GitHubError {
            status: 403,
            message: "Forbidden".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Authentication);

        let err = HubError::IoError(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
        assert_eq!(err.severity(), ErrorSeverity::Critical);
    }

    #[test]
    fn test_retryable() {
        assert!(HubError::ProviderError {
            status: 503,
            message: "busy".to_string()
        }
        .is_retryable());
        assert!(!HubError::ProviderError {
            status: 400,
            message: "bad".to_string()
        }
        .is_retryable());
        assert!(!HubError::GitHubUnauthorized.is_retryable());

        let wrong_shape = serde_json::from_str::<Vec<String>>("{}").unwrap_err();
        assert!(HubError::from(wrong_shape).is_retryable());
    }
}
