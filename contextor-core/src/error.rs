// Copyright 2025 Contextor Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Shared error taxonomy
//!
//! Failures in derived subsystems (indexing, retrieval) are absorbed and
//! degrade gracefully; failures on the durable path (event store, journal)
//! are always surfaced to the caller.

use thiserror::Error;

/// Result type for contextor operations
pub type Result<T> = std::result::Result<T, ContextorError>;

/// Errors that can occur across the context store
#[derive(Debug, Error)]
pub enum ContextorError {
    /// Malformed request (missing required field, duplicate id, bad name).
    /// Surfaced immediately; never retried.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Event store or journal I/O failure. Fatal for the request, the
    /// service stays up for other requests.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Referenced event, session, or policy does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Vector/keyword index update failure (soft: never fails an ingest)
    #[error("Indexing error: {0}")]
    Indexing(String),

    /// Failure inside the retrieval engine (soft: reported, never a crash)
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Memory journal failure
    #[error("Journal error: {0}")]
    Journal(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for ContextorError {
    fn from(e: serde_json::Error) -> Self {
        ContextorError::Serialization(e.to_string())
    }
}

impl ContextorError {
    /// True for errors the caller should treat as a bad request rather than
    /// a service fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ContextorError::Validation(_) | ContextorError::NotFound(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_classification() {
        assert!(ContextorError::Validation("missing type".into()).is_client_error());
        assert!(ContextorError::NotFound("session x".into()).is_client_error());
        assert!(!ContextorError::Storage("disk full".into()).is_client_error());
        assert!(!ContextorError::Retrieval("ranking failed".into()).is_client_error());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: ContextorError = io.into();
        assert!(matches!(err, ContextorError::Io(_)));
    }
}
