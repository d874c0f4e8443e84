//! Standardized error codes for machine-parseable output.
//!
//! Error codes follow a numeric taxonomy:
//! - 1xx: Proposal errors
//! - 2xx: Pipeline errors
//! - 3xx: Config errors
//! - 4xx: Skill runtime errors
//! - 5xx: Network errors
//! - 6xx: Storage errors
//! - 8xx: Security errors
//! - 9xx: Internal errors

use serde::{Deserialize, Serialize};

/// Standardized error codes for robot mode output.
///
/// Each variant maps to a numeric code (e.g., `ProposalNotFound` -> E101).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================
    // Proposal errors (1xx)
    // ========================================
    /// E101: No proposal matches the given id or slug
    ProposalNotFound,
    /// E102: Proposal is missing required fields or carries malformed ones
    ProposalInvalid,
    /// E103: Proposal is not in the status the operation requires
    ProposalInvalidState,

    // ========================================
    // Pipeline errors (2xx)
    // ========================================
    /// E201: Code generation collaborator failed
    GenerationFailed,
    /// E202: Generator reported the proposal as infeasible
    ProposalInfeasible,
    /// E203: Static analysis found blocking issues
    AnalysisFailed,

    // ========================================
    // Config errors (3xx)
    // ========================================
    /// E302: Config file has invalid syntax or values
    ConfigInvalid,
    /// E304: Required config value is missing
    ConfigMissingRequired,

    // ========================================
    // Skill runtime errors (4xx)
    // ========================================
    /// E401: Installing or removing a skill package failed
    InstallFailed,
    /// E402: Attempted to remove a protected core skill
    CoreSkillProtected,
    /// E403: Registration attempted after the registry was frozen
    RegistryFrozen,
    /// E404: Kernel could not boot
    BootFailed,

    // ========================================
    // Network errors (5xx)
    // ========================================
    /// E501: Remote endpoint could not be reached or answered with an error
    NetworkError,

    // ========================================
    // Storage errors (6xx)
    // ========================================
    /// E605: Serialization/deserialization failed
    SerializationError,
    /// E606: IO operation failed
    IoError,

    // ========================================
    // Security errors (8xx)
    // ========================================
    /// E801: Write target escaped the sandbox or used a disallowed directory
    PathViolation,
    /// E851: Failed to acquire lock within timeout
    LockTimeout,
    /// E852: Failed to acquire lock
    LockFailed,

    // ========================================
    // Internal errors (9xx)
    // ========================================
    /// E901: Unexpected internal error
    InternalError,
    /// E903: Operation timed out
    Timeout,
    /// E905: Generic not found (catch-all)
    NotFound,
}

impl ErrorCode {
    /// Get the numeric error code (e.g., `ProposalNotFound` -> 101).
    #[must_use]
    pub const fn numeric(&self) -> u16 {
        match self {
            Self::ProposalNotFound => 101,
            Self::ProposalInvalid => 102,
            Self::ProposalInvalidState => 103,

            Self::GenerationFailed => 201,
            Self::ProposalInfeasible => 202,
            Self::AnalysisFailed => 203,

            Self::ConfigInvalid => 302,
            Self::ConfigMissingRequired => 304,

            Self::InstallFailed => 401,
            Self::CoreSkillProtected => 402,
            Self::RegistryFrozen => 403,
            Self::BootFailed => 404,

            Self::NetworkError => 501,

            Self::SerializationError => 605,
            Self::IoError => 606,

            Self::PathViolation => 801,
            Self::LockTimeout => 851,
            Self::LockFailed => 852,

            Self::InternalError => 901,
            Self::Timeout => 903,
            Self::NotFound => 905,
        }
    }

    /// Get the error code as a formatted string (e.g., "E101").
    #[must_use]
    pub fn code_string(&self) -> String {
        format!("E{}", self.numeric())
    }

    /// Get the default suggestion for this error code.
    #[must_use]
    pub const fn suggestion(&self) -> &'static str {
        match self {
            Self::ProposalNotFound => "Run `skillgate list` to see known proposals and their ids",
            Self::ProposalInvalid => "Fix the proposal record fields and submit it again",
            Self::ProposalInvalidState => "Check the proposal status with `skillgate list`, or pass --force",
            Self::GenerationFailed => "Check the [generator] settings and that the endpoint is reachable",
            Self::ProposalInfeasible => "Rephrase the proposal so it fits the runtime constraints",
            Self::AnalysisFailed => "Review the listed issues; generated code must avoid forbidden modules and builtins",
            Self::ConfigInvalid => "Check TOML syntax and values in the config file",
            Self::ConfigMissingRequired => "Set the required config value in config.toml or the environment",
            Self::InstallFailed => "Inspect the skills directory and manifest; the install was rolled back",
            Self::CoreSkillProtected => "Only user-installed skills can be removed",
            Self::RegistryFrozen => "Register skills through the manifest before the kernel boots",
            Self::BootFailed => "Ensure the manifest lists a skill with the user:input capability",
            Self::NetworkError => "Check network connectivity and the remote endpoint",
            Self::SerializationError => "The record may be corrupted. Check the file for valid YAML/JSON",
            Self::IoError => "File operation failed. Check path exists and permissions are correct",
            Self::PathViolation => "Writes are confined to allow-listed directories under the data root",
            Self::LockTimeout => "Another orchestrator may be holding the lock. Wait and retry",
            Self::LockFailed => "Another orchestrator process owns this data root",
            Self::InternalError => "An unexpected error occurred. Please report this issue with full error output",
            Self::Timeout => "Operation timed out. Try again or increase timeout settings",
            Self::NotFound => "The requested resource was not found. Check the path or identifier",
        }
    }

    /// Check if this error is potentially recoverable by the user.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::InternalError | Self::SerializationError | Self::PathViolation
        )
    }

    /// Get the error category name.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self.numeric() / 100 {
            1 => "proposal",
            2 => "pipeline",
            3 => "config",
            4 => "skill",
            5 => "network",
            6 => "storage",
            8 => "security",
            9 => "internal",
            _ => "unknown",
        }
    }

    /// Iterate over all error codes.
    pub fn all() -> impl Iterator<Item = Self> {
        [
            Self::ProposalNotFound,
            Self::ProposalInvalid,
            Self::ProposalInvalidState,
            Self::GenerationFailed,
            Self::ProposalInfeasible,
            Self::AnalysisFailed,
            Self::ConfigInvalid,
            Self::ConfigMissingRequired,
            Self::InstallFailed,
            Self::CoreSkillProtected,
            Self::RegistryFrozen,
            Self::BootFailed,
            Self::NetworkError,
            Self::SerializationError,
            Self::IoError,
            Self::PathViolation,
            Self::LockTimeout,
            Self::LockFailed,
            Self::InternalError,
            Self::Timeout,
            Self::NotFound,
        ]
        .into_iter()
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_numeric() {
        assert_eq!(ErrorCode::ProposalNotFound.numeric(), 101);
        assert_eq!(ErrorCode::GenerationFailed.numeric(), 201);
        assert_eq!(ErrorCode::ConfigInvalid.numeric(), 302);
        assert_eq!(ErrorCode::InstallFailed.numeric(), 401);
        assert_eq!(ErrorCode::PathViolation.numeric(), 801);
        assert_eq!(ErrorCode::InternalError.numeric(), 901);
    }

    #[test]
    fn test_all_codes_have_suggestions_and_categories() {
        for code in ErrorCode::all() {
            assert!(!code.suggestion().is_empty(), "{code:?} has empty suggestion");
            assert_ne!(code.category(), "unknown", "{code:?} has invalid category");
        }
    }

    #[test]
    fn test_error_code_serialization() {
        let json = serde_json::to_string(&ErrorCode::PathViolation).unwrap();
        assert_eq!(json, "\"PATH_VIOLATION\"");
        let back: ErrorCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ErrorCode::PathViolation);
    }

    #[test]
    fn test_path_violation_not_recoverable() {
        assert!(!ErrorCode::PathViolation.is_recoverable());
        assert!(ErrorCode::ProposalNotFound.is_recoverable());
    }

    #[test]
    fn test_no_duplicate_numeric_codes() {
        let mut seen = std::collections::HashSet::new();
        for code in ErrorCode::all() {
            assert!(seen.insert(code.numeric()), "Duplicate numeric code: {}", code.numeric());
        }
    }
}
