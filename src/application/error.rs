use std::error::Error as StdError;

use thiserror::Error;

use crate::{
    application::repos::RepoError, domain::error::DomainError, infra::error::InfraError,
    presentation::views::RenderError,
};

/// Flattened error chain, outermost message first.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self { source, messages }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("repository error: {0}")]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("render failed: {0}")]
    Render(#[from] RenderError),
    /// The network is set up in a way the aggregation cannot work with.
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// Process exit status used by the command line entry point.
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Domain(DomainError::Validation { .. }) | AppError::Validation(_) => 2,
            AppError::Configuration(_) | AppError::Infra(InfraError::Configuration { .. }) => 3,
            AppError::Repo(_)
            | AppError::Infra(InfraError::Database { .. } | InfraError::Migration(_)) => 4,
            AppError::Render(_) => 5,
            AppError::Infra(InfraError::Telemetry(_))
            | AppError::Domain(DomainError::Invariant { .. })
            | AppError::Unexpected(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_collects_source_chain() {
        let err = AppError::Repo(RepoError::Persistence("connection reset".to_string()));
        let report = ErrorReport::from_error("test", &err);

        assert_eq!(report.source, "test");
        assert_eq!(
            report.messages,
            vec![
                "repository error: persistence error: connection reset".to_string(),
                "persistence error: connection reset".to_string(),
            ]
        );
    }

    #[test]
    fn exit_codes_distinguish_failure_kinds() {
        assert_eq!(AppError::validation("bad").exit_code(), 2);
        assert_eq!(AppError::configuration("blog id 0").exit_code(), 3);
        assert_eq!(AppError::Repo(RepoError::Timeout).exit_code(), 4);
        assert_eq!(AppError::unexpected("boom").exit_code(), 1);
    }
}
