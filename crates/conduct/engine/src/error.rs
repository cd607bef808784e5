use conduct_storage::StorageError;
use conduct_types::Tier;
use serde::Serialize;
use thiserror::Error;

/// Result type of engine operations.
pub type ConductResult<T> = Result<T, ConductError>;

/// Why a tier gate refused an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateReason {
    AlreadyLocked,
    CoverageIncomplete,
    PreviousTierNotApproved,
}

impl GateReason {
    pub fn code(self) -> &'static str {
        match self {
            Self::AlreadyLocked => "ALREADY_LOCKED",
            Self::CoverageIncomplete => "COVERAGE_INCOMPLETE",
            Self::PreviousTierNotApproved => "PREVIOUS_TIER_NOT_APPROVED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstraintKind {
    Duplicate,
    InvalidReference,
}

/// Engine errors. Any of them aborts the enclosing transaction.
#[derive(Debug, Error)]
pub enum ConductError {
    /// Missing or malformed input, rejected before any transaction opens.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("term {0} is closed for assessment")]
    TermClosed(String),

    #[error("{message}")]
    Gate { reason: GateReason, message: String },

    #[error("constraint violation ({kind:?}): {detail}")]
    Constraint { kind: ConstraintKind, detail: String },

    /// Unexpected failure. The detail is for server logs only.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ConductError {
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            key: key.into(),
        }
    }

    pub fn already_locked(tier: Tier, class_code: &str, term_code: &str) -> Self {
        Self::Gate {
            reason: GateReason::AlreadyLocked,
            message: format!("{tier} approval of class {class_code} for term {term_code} is already locked"),
        }
    }

    /// A superior tier has already approved the class, so `tier` can no
    /// longer act on it.
    pub fn superseded(tier: Tier, superior: Tier, class_code: &str, term_code: &str) -> Self {
        Self::Gate {
            reason: GateReason::AlreadyLocked,
            message: format!(
                "{tier} cannot act on class {class_code} for term {term_code}: {superior} approval is already locked"
            ),
        }
    }

    pub fn student_locked(tier: Tier, locked: Tier, student_code: &str, term_code: &str) -> Self {
        Self::Gate {
            reason: GateReason::AlreadyLocked,
            message: format!(
                "{tier} score of student {student_code} for term {term_code} is locked by {locked} approval"
            ),
        }
    }

    pub fn coverage_incomplete(
        class_code: &str,
        term_code: &str,
        missing: &[String],
        roster: usize,
    ) -> Self {
        Self::Gate {
            reason: GateReason::CoverageIncomplete,
            message: format!(
                "{} of {roster} students of class {class_code} have no prior-tier assessment for term {term_code}: {}",
                missing.len(),
                missing.join(", ")
            ),
        }
    }

    pub fn previous_tier_not_approved(
        tier: Tier,
        required: Tier,
        class_code: &str,
        term_code: &str,
    ) -> Self {
        Self::Gate {
            reason: GateReason::PreviousTierNotApproved,
            message: format!(
                "{tier} cannot accept class {class_code} for term {term_code} before {required} approval"
            ),
        }
    }

    pub fn gate_reason(&self) -> Option<GateReason> {
        match self {
            Self::Gate { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::TermClosed(_) => "TERM_CLOSED",
            Self::Gate { reason, .. } => reason.code(),
            Self::Constraint {
                kind: ConstraintKind::Duplicate,
                ..
            } => "DUPLICATE",
            Self::Constraint {
                kind: ConstraintKind::InvalidReference,
                ..
            } => "INVALID_REFERENCE",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to return to callers. Internal details never leave the
    /// process.
    pub fn public_message(&self) -> String {
        match self {
            Self::Internal(_) => "internal error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<StorageError> for ConductError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => Self::not_found("record", key),
            StorageError::Conflict(detail) => Self::Constraint {
                kind: ConstraintKind::Duplicate,
                detail,
            },
            StorageError::InvalidReference(detail) => Self::Constraint {
                kind: ConstraintKind::InvalidReference,
                detail,
            },
            StorageError::InvalidInput(detail) => Self::Validation(detail),
            other => {
                tracing::error!(error = %other, "Storage failure");
                Self::Internal(other.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_details_stay_private() {
        let err = ConductError::from(StorageError::Backend("connection reset by peer".into()));
        assert_eq!(err.code(), "INTERNAL_ERROR");
        assert_eq!(err.public_message(), "internal error");
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn constraint_violations_keep_their_kind() {
        let dup = ConductError::from(StorageError::Conflict("duplicate key".into()));
        assert_eq!(dup.code(), "DUPLICATE");
        let fk = ConductError::from(StorageError::InvalidReference("student 9".into()));
        assert_eq!(fk.code(), "INVALID_REFERENCE");
    }

    #[test]
    fn gate_errors_carry_reason_codes() {
        let err = ConductError::already_locked(Tier::Teacher, "K65", "2024-1");
        assert_eq!(err.gate_reason(), Some(GateReason::AlreadyLocked));
        assert_eq!(err.code(), "ALREADY_LOCKED");
        assert!(err.public_message().contains("already locked"));
    }
}
