//! Error types for environment resolution.

/// Errors produced while resolving the build environment.
///
/// Absent optional fields are never errors; only values every build needs
/// fail hard.
#[derive(Debug, thiserror::Error)]
pub enum EnvError {
    #[error("repo not found: {0}")]
    RepoNotFound(String),
}

/// Result type for environment resolution.
pub type Result<T> = std::result::Result<T, EnvError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_not_found_display() {
        let err = EnvError::RepoNotFound("no origin remote".to_string());
        assert!(err.to_string().contains("repo not found"));
        assert!(err.to_string().contains("no origin remote"));
    }
}
