//! Error handling for skillgate.
//!
//! This module provides:
//! - [`SgError`]: The main error enum for all skillgate operations
//! - [`ErrorCode`]: Standardized error codes for machine parsing
//! - [`StructuredError`]: Rich error type with suggestions and context

mod codes;

use std::io;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use codes::ErrorCode;

use crate::security::PathViolation;

/// Main error type for skillgate operations.
#[derive(Error, Debug)]
pub enum SgError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Missing required config: {0}")]
    MissingConfig(String),

    #[error("No proposal found matching '{0}'")]
    ProposalNotFound(String),

    #[error("Proposal '{slug}' is in status '{status}', not 'human-review'. Use --force to override.")]
    NotAwaitingApproval { slug: String, status: String },

    #[error("Proposal '{slug}' is in status '{status}', not '{expected}'")]
    InvalidState {
        slug: String,
        status: String,
        expected: String,
    },

    /// Missing or malformed proposal fields.
    #[error("{0}")]
    Validation(String),

    #[error("Code generation failed: {0}")]
    Generation(String),

    #[error("Proposal infeasible: {0}")]
    Infeasible(String),

    #[error("Analysis found critical issues: {}", .0.join("; "))]
    Analysis(Vec<String>),

    #[error("Install failed: {0}")]
    Install(String),

    #[error("Path violation: {0}")]
    PathViolation(#[from] PathViolation),

    #[error("Cannot remove core skill '{0}'. Only user-installed skills can be removed.")]
    CoreSkillProtected(String),

    #[error("Registry is frozen; cannot register skill '{0}'")]
    RegistryFrozen(String),

    #[error("Boot failed: {0}")]
    Boot(String),

    #[error("Lock timeout: {0}")]
    LockTimeout(String),

    #[error("Lock failed: {0}")]
    LockFailed(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl SgError {
    /// Get the error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) | Self::Yaml(_) => ErrorCode::SerializationError,
            Self::Http(_) => ErrorCode::NetworkError,
            Self::Config(_) => ErrorCode::ConfigInvalid,
            Self::MissingConfig(_) => ErrorCode::ConfigMissingRequired,
            Self::ProposalNotFound(_) => ErrorCode::ProposalNotFound,
            Self::NotAwaitingApproval { .. } | Self::InvalidState { .. } => {
                ErrorCode::ProposalInvalidState
            }
            Self::Validation(_) => ErrorCode::ProposalInvalid,
            Self::Generation(_) => ErrorCode::GenerationFailed,
            Self::Infeasible(_) => ErrorCode::ProposalInfeasible,
            Self::Analysis(_) => ErrorCode::AnalysisFailed,
            Self::Install(_) => ErrorCode::InstallFailed,
            Self::PathViolation(_) => ErrorCode::PathViolation,
            Self::CoreSkillProtected(_) => ErrorCode::CoreSkillProtected,
            Self::RegistryFrozen(_) => ErrorCode::RegistryFrozen,
            Self::Boot(_) => ErrorCode::BootFailed,
            Self::LockTimeout(_) => ErrorCode::LockTimeout,
            Self::LockFailed(_) => ErrorCode::LockFailed,
            Self::Timeout(_) => ErrorCode::Timeout,
            Self::NotFound(_) => ErrorCode::NotFound,
        }
    }

    /// Tag recorded as `rejection_reason_type` when this error rejects a proposal.
    #[must_use]
    pub const fn rejection_tag(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::Generation(_) | Self::Infeasible(_) | Self::Http(_) | Self::Timeout(_) => {
                "GenerationError"
            }
            Self::Analysis(_) => "AnalysisError",
            Self::Install(_) | Self::CoreSkillProtected(_) => "InstallError",
            Self::PathViolation(_) => "PathViolation",
            Self::Io(_) => "IoError",
            Self::Json(_) | Self::Yaml(_) => "SerializationError",
            _ => "InternalError",
        }
    }

    /// Errors that must reach the caller even after the proposal was rejected.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Install(_) | Self::PathViolation(_))
    }

    /// Get context information for this error as JSON.
    #[must_use]
    pub fn context(&self) -> Option<Value> {
        match self {
            Self::ProposalNotFound(query) => Some(serde_json::json!({ "query": query })),
            Self::NotAwaitingApproval { slug, status } => {
                Some(serde_json::json!({ "slug": slug, "status": status }))
            }
            Self::InvalidState {
                slug,
                status,
                expected,
            } => Some(serde_json::json!({ "slug": slug, "status": status, "expected": expected })),
            Self::Analysis(issues) => Some(serde_json::json!({ "issues": issues })),
            Self::CoreSkillProtected(module) => Some(serde_json::json!({ "module": module })),
            Self::MissingConfig(key) => Some(serde_json::json!({ "config_key": key })),
            _ => None,
        }
    }

    /// Convert this error to a structured error.
    #[must_use]
    pub fn to_structured(&self) -> StructuredError {
        StructuredError::from_sg_error(self)
    }
}

/// A structured error with machine-readable code, suggestion, and context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// The error code (e.g., "PROPOSAL_NOT_FOUND")
    pub code: ErrorCode,

    /// The numeric error code (e.g., 101)
    pub numeric_code: u16,

    /// Human-readable error message
    pub message: String,

    /// Actionable suggestion for recovery
    pub suggestion: String,

    /// Additional context for debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,

    /// Whether this error is potentially recoverable by the user
    pub recoverable: bool,

    /// Error category (e.g., "proposal", "security")
    pub category: String,
}

impl StructuredError {
    /// Create a new structured error.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            numeric_code: code.numeric(),
            suggestion: code.suggestion().to_string(),
            context: None,
            recoverable: code.is_recoverable(),
            category: code.category().to_string(),
            code,
            message: message.into(),
        }
    }

    /// Create a structured error from an `SgError`.
    #[must_use]
    pub fn from_sg_error(err: &SgError) -> Self {
        let mut structured = Self::new(err.code(), err.to_string());
        structured.context = err.context();
        structured
    }

    /// Set a custom suggestion.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = suggestion.into();
        self
    }
}

impl std::fmt::Display for StructuredError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl From<&SgError> for StructuredError {
    fn from(err: &SgError) -> Self {
        Self::from_sg_error(err)
    }
}

/// Result type alias using `SgError`.
pub type Result<T> = std::result::Result<T, SgError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        assert_eq!(
            SgError::ProposalNotFound("x".into()).code(),
            ErrorCode::ProposalNotFound
        );
        assert_eq!(SgError::Config("bad".into()).code(), ErrorCode::ConfigInvalid);
        assert_eq!(
            SgError::Analysis(vec!["a".into()]).code(),
            ErrorCode::AnalysisFailed
        );
    }

    #[test]
    fn test_analysis_message_joins_issues() {
        let err = SgError::Analysis(vec![
            "Forbidden import: 'os' (line 1)".into(),
            "Forbidden builtin call: 'eval' (line 3)".into(),
        ]);
        assert_eq!(
            err.to_string(),
            "Analysis found critical issues: Forbidden import: 'os' (line 1); Forbidden builtin call: 'eval' (line 3)"
        );
    }

    #[test]
    fn test_rejection_tags() {
        assert_eq!(SgError::Validation("x".into()).rejection_tag(), "ValidationError");
        assert_eq!(SgError::Infeasible("x".into()).rejection_tag(), "GenerationError");
        assert_eq!(SgError::Generation("x".into()).rejection_tag(), "GenerationError");
        assert_eq!(SgError::Analysis(vec![]).rejection_tag(), "AnalysisError");
        assert_eq!(SgError::Install("x".into()).rejection_tag(), "InstallError");
    }

    #[test]
    fn test_fatal_errors() {
        assert!(SgError::Install("x".into()).is_fatal());
        assert!(!SgError::Validation("x".into()).is_fatal());
    }

    #[test]
    fn test_not_awaiting_approval_message() {
        let err = SgError::NotAwaitingApproval {
            slug: "clock".into(),
            status: "new".into(),
        };
        assert_eq!(
            err.to_string(),
            "Proposal 'clock' is in status 'new', not 'human-review'. Use --force to override."
        );
        let ctx = err.context().unwrap();
        assert_eq!(ctx["slug"], "clock");
    }

    #[test]
    fn test_structured_error_serialization() {
        let err = SgError::CoreSkillProtected("memory".into());
        let structured = err.to_structured();
        let json = serde_json::to_string(&structured).unwrap();
        assert!(json.contains("CORE_SKILL_PROTECTED"));
        assert!(json.contains("\"numeric_code\":402"));
        assert!(json.contains("\"category\":\"skill\""));
    }

    #[test]
    fn test_structured_error_display() {
        let err = StructuredError::new(ErrorCode::ProposalNotFound, "missing");
        assert_eq!(format!("{err}"), "[E101] missing");
    }
}
