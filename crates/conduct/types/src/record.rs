//! Persisted records of the approval core.

use crate::ids::{ClassId, CriterionId, OptionId, StudentId};
use crate::rank::Rank;
use crate::tier::Tier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A student's answer for one criterion in one term.
///
/// Unique per (student, term, criterion).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfAssessmentRecord {
    pub student_id: StudentId,
    pub term_code: String,
    pub criterion_id: CriterionId,
    pub option_id: Option<OptionId>,
    pub text_value: Option<String>,
    pub self_score: i32,
    pub is_verified: bool,
    pub participated: Option<bool>,
    pub verify_note: Option<String>,
    pub verified_by: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl SelfAssessmentRecord {
    /// Whether the stored submission matches a new one.
    pub fn same_submission(&self, option_id: Option<OptionId>, text_value: Option<&str>) -> bool {
        self.option_id == option_id && self.text_value.as_deref() == text_value
    }

    pub fn clear_verification(&mut self) {
        self.is_verified = false;
        self.participated = None;
        self.verify_note = None;
        self.verified_by = None;
        self.verified_at = None;
    }
}

/// Total recorded by one tier for one student in one term.
///
/// Unique per (student, term, tier).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistorySnapshot {
    pub student_id: StudentId,
    pub term_code: String,
    pub tier: Tier,
    pub total_score: i32,
    pub changed_by: String,
    pub note: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Approval gates of one class in one term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassTermStatus {
    pub class_id: ClassId,
    pub term_code: String,
    pub is_leader_approved: bool,
    pub leader_approved_at: Option<DateTime<Utc>>,
    pub is_teacher_approved: bool,
    pub teacher_approved_at: Option<DateTime<Utc>>,
    pub is_faculty_approved: bool,
    pub faculty_approved_at: Option<DateTime<Utc>>,
    pub is_admin_approved: bool,
    pub admin_approved_at: Option<DateTime<Utc>>,
}

impl ClassTermStatus {
    /// All gates open.
    pub fn unlocked(class_id: ClassId, term_code: impl Into<String>) -> Self {
        Self {
            class_id,
            term_code: term_code.into(),
            is_leader_approved: false,
            leader_approved_at: None,
            is_teacher_approved: false,
            teacher_approved_at: None,
            is_faculty_approved: false,
            faculty_approved_at: None,
            is_admin_approved: false,
            admin_approved_at: None,
        }
    }

    pub fn is_approved(&self, tier: Tier) -> bool {
        match tier {
            Tier::Student => false,
            Tier::Leader => self.is_leader_approved,
            Tier::Teacher => self.is_teacher_approved,
            Tier::Faculty => self.is_faculty_approved,
            Tier::Admin => self.is_admin_approved,
        }
    }

    /// The first closed gate among `tier` and the tiers above it.
    pub fn closed_from(&self, tier: Tier) -> Option<Tier> {
        std::iter::once(tier)
            .chain(tier.superiors())
            .find(|t| self.is_approved(*t))
    }

    /// Highest tier whose gate is closed.
    pub fn highest_approved(&self) -> Option<Tier> {
        Tier::LADDER
            .into_iter()
            .rev()
            .find(|t| self.is_approved(*t))
    }

    pub fn approved_at(&self, tier: Tier) -> Option<DateTime<Utc>> {
        match tier {
            Tier::Student => None,
            Tier::Leader => self.leader_approved_at,
            Tier::Teacher => self.teacher_approved_at,
            Tier::Faculty => self.faculty_approved_at,
            Tier::Admin => self.admin_approved_at,
        }
    }

    /// Close `tier`'s gate. Returns false when it was already closed, in
    /// which case nothing changes. The student tier has no gate.
    pub fn lock(&mut self, tier: Tier, at: DateTime<Utc>) -> bool {
        let (flag, stamp) = match tier {
            Tier::Student => return false,
            Tier::Leader => (&mut self.is_leader_approved, &mut self.leader_approved_at),
            Tier::Teacher => (&mut self.is_teacher_approved, &mut self.teacher_approved_at),
            Tier::Faculty => (&mut self.is_faculty_approved, &mut self.faculty_approved_at),
            Tier::Admin => (&mut self.is_admin_approved, &mut self.admin_approved_at),
        };
        if *flag {
            return false;
        }
        *flag = true;
        *stamp = Some(at);
        true
    }
}

/// Authoritative total and rank of a student for a term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermScore {
    pub student_id: StudentId,
    pub term_code: String,
    pub total_score: i32,
    pub rank: Rank,
    pub updated_at: DateTime<Utc>,
}

impl TermScore {
    pub fn new(
        student_id: StudentId,
        term_code: impl Into<String>,
        total_score: i32,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            student_id,
            term_code: term_code.into(),
            total_score,
            rank: Rank::for_total(total_score),
            updated_at,
        }
    }
}
