//! Error taxonomy for the Percy client.

use std::path::PathBuf;

use percy_env::EnvError;

/// Percy client errors.
#[derive(Debug, thiserror::Error)]
pub enum PercyError {
    #[error("auth error: {0}")]
    Auth(String),

    #[error(transparent)]
    RepoNotFound(#[from] EnvError),

    #[error("uninitialized build: {0}")]
    UninitializedBuild(String),

    #[error("api error: status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid resource: {0}")]
    InvalidResource(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("resource unavailable at {}: {source}", path.display())]
    ResourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for Percy client operations.
pub type Result<T> = std::result::Result<T, PercyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percy_error_display() {
        let err = PercyError::Auth("PERCY_TOKEN is not set".to_string());
        assert!(err.to_string().contains("auth error"));

        let err = PercyError::Api {
            status: 422,
            body: "{\"errors\":[]}".to_string(),
        };
        assert_eq!(err.to_string(), "api error: status 422: {\"errors\":[]}");
    }

    #[test]
    fn test_repo_not_found_is_transparent() {
        let err: PercyError = EnvError::RepoNotFound("no remote".to_string()).into();
        assert!(matches!(err, PercyError::RepoNotFound(_)));
        assert_eq!(err.to_string(), "repo not found: no remote");
    }

    #[test]
    fn test_resource_unavailable_names_path() {
        let err = PercyError::ResourceUnavailable {
            path: PathBuf::from("/tmp/gone.css"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert!(err.to_string().contains("/tmp/gone.css"));
    }
}
