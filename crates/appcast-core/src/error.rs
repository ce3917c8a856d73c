use thiserror::Error;

use crate::feed::FetchError;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("feed document is not valid {encoding}")]
    Encoding { encoding: &'static str },
    #[error("feed document is not well-formed: {0}")]
    Malformed(#[source] roxmltree::Error),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to resolve state directory: {0}")]
    Paths(#[from] appcast_platform::AppPathsError),
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize decision state: {0}")]
    Serialize(#[source] serde_json::Error),
}

impl StoreError {
    pub(crate) fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }
}

/// Why a check cycle could not produce a result.
///
/// Every variant is reported to the caller the same way: the check failed,
/// nothing was persisted, and no retry happens within the cycle.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("decision state unavailable: {0}")]
    Store(#[from] StoreError),
    #[error("check cycle aborted: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::{CheckError, StoreError};

    #[test]
    fn store_error_display_includes_context() {
        let error = StoreError::io(
            "failed to write decision state",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(error.to_string(), "failed to write decision state: denied");
    }

    #[test]
    fn check_error_wraps_store_failures() {
        let error = CheckError::from(StoreError::io(
            "failed to read decision state",
            std::io::Error::other("disk gone"),
        ));
        assert!(matches!(error, CheckError::Store(_)));
        assert_eq!(
            error.to_string(),
            "decision state unavailable: failed to read decision state: disk gone"
        );
    }
}
