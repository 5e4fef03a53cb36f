use thiserror::Error;

/// Core error types for RelayCache operations.
///
/// Cache reads and writes never fail; errors only arise while building an
/// instance.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl CacheError {
    /// Create a new Configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

/// Convenience result type for core operations
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error() {
        let err = CacheError::configuration("cleanup interval must be > 0");
        assert_eq!(
            err.to_string(),
            "Configuration error: cleanup interval must be > 0"
        );
    }
}
