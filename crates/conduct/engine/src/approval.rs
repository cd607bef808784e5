//! Approval gate registry and tier orchestration.
//!
//! An accept walks one class (or every class of a faculty) inside the
//! caller's transaction:
//!
//! 1. the tier's own gate and every gate above it must still be open
//! 2. tier preconditions: roster coverage for teachers, the previous gate for
//!    faculty and admin
//! 3. each student's total is carried forward from the nearest tier that has
//!    recorded one
//! 4. snapshot and term score are upserted
//! 5. the gate is flipped with a compare-and-set
//!
//! Any failure leaves the transaction uncommitted.

use crate::aggregation::Aggregate;
use crate::config::EngineConfig;
use crate::error::{ConductError, ConductResult};
use crate::lookup::{require_class, require_field, require_student, require_term};
use chrono::{DateTime, Utc};
use conduct_storage::ConductTx;
use conduct_types::{
    ClassRef, ClassTermStatus, HistorySnapshot, StudentRef, TermScore, Tier,
};
use serde::{Deserialize, Serialize};

/// What an accept covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "code", rename_all = "lowercase")]
pub enum ApprovalScope {
    Class(String),
    /// Every class of the faculty; only faculty and admin tiers.
    Faculty(String),
}

impl ApprovalScope {
    pub fn code(&self) -> &str {
        match self {
            Self::Class(code) | Self::Faculty(code) => code,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptRequest {
    pub tier: Tier,
    pub scope: ApprovalScope,
    pub term_code: String,
    pub actor_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcceptOutcome {
    pub tier: Tier,
    pub term_code: String,
    pub class_codes: Vec<String>,
    pub students_processed: usize,
    pub approved_at: DateTime<Utc>,
}

/// A reviewer's own total for one student, recorded ahead of the accept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordTierScoreRequest {
    pub tier: Tier,
    pub student_code: String,
    pub term_code: String,
    pub total_score: i32,
    #[serde(default)]
    pub note: Option<String>,
    pub actor_id: String,
}

/// Total a tier writes for a student and which tier it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CarriedTotal {
    pub total: i32,
    pub source: Option<Tier>,
}

/// The tier's own snapshot if present, else the nearest subordinate one,
/// else zero.
pub fn carry_forward(tier: Tier, snapshots: &[HistorySnapshot]) -> CarriedTotal {
    std::iter::once(tier)
        .chain(tier.subordinates())
        .find_map(|candidate| {
            snapshots
                .iter()
                .find(|s| s.tier == candidate)
                .map(|s| CarriedTotal {
                    total: s.total_score,
                    source: Some(candidate),
                })
        })
        .unwrap_or(CarriedTotal {
            total: 0,
            source: None,
        })
}

pub(crate) fn validate_accept(request: &AcceptRequest) -> ConductResult<()> {
    require_field("scope", request.scope.code())?;
    require_field("term_code", &request.term_code)?;
    require_field("actor_id", &request.actor_id)?;
    if !request.tier.is_gated() {
        return Err(ConductError::Validation(format!(
            "tier {} has no accept step",
            request.tier
        )));
    }
    if matches!(request.scope, ApprovalScope::Faculty(_))
        && matches!(request.tier, Tier::Leader | Tier::Teacher)
    {
        return Err(ConductError::Validation(format!(
            "tier {} accepts one class at a time",
            request.tier
        )));
    }
    Ok(())
}

pub(crate) fn validate_record(request: &RecordTierScoreRequest) -> ConductResult<()> {
    require_field("student_code", &request.student_code)?;
    require_field("term_code", &request.term_code)?;
    require_field("actor_id", &request.actor_id)?;
    if !request.tier.is_gated() {
        return Err(ConductError::Validation(
            "student totals come from the self assessment".to_string(),
        ));
    }
    if request.total_score < 0 {
        return Err(ConductError::Validation(format!(
            "total score {} must not be negative",
            request.total_score
        )));
    }
    Ok(())
}

pub(crate) async fn accept(
    tx: &mut dyn ConductTx,
    config: &EngineConfig,
    request: &AcceptRequest,
    now: DateTime<Utc>,
) -> ConductResult<AcceptOutcome> {
    let term = require_term(tx, &request.term_code).await?;
    let classes = match &request.scope {
        ApprovalScope::Class(code) => vec![require_class(tx, code).await?],
        ApprovalScope::Faculty(code) => {
            let classes = tx.list_faculty_classes(code).await?;
            if classes.is_empty() {
                return Err(ConductError::not_found("faculty", code.as_str()));
            }
            classes
        }
    };

    let mut students_processed = 0;
    for class in &classes {
        students_processed += accept_class(tx, config, request, class, &term.code, now).await?;
    }

    Ok(AcceptOutcome {
        tier: request.tier,
        term_code: term.code,
        class_codes: classes.into_iter().map(|c| c.code).collect(),
        students_processed,
        approved_at: now,
    })
}

async fn accept_class(
    tx: &mut dyn ConductTx,
    config: &EngineConfig,
    request: &AcceptRequest,
    class: &ClassRef,
    term_code: &str,
    now: DateTime<Utc>,
) -> ConductResult<usize> {
    let tier = request.tier;
    let status = tx
        .get_class_status(class.id, term_code)
        .await?
        .unwrap_or_else(|| ClassTermStatus::unlocked(class.id, term_code));

    match status.closed_from(tier) {
        Some(closed) if closed == tier => {
            return Err(ConductError::already_locked(tier, &class.code, term_code));
        }
        Some(superior) => {
            return Err(ConductError::superseded(tier, superior, &class.code, term_code));
        }
        None => {}
    }
    check_previous_gate(config, tier, &status, &class.code, term_code)?;

    let mut roster: Vec<(StudentRef, Vec<HistorySnapshot>)> = Vec::new();
    for student in tx.list_class_students(class.id).await? {
        let snapshots = tx.list_student_history(student.id, term_code).await?;
        roster.push((student, snapshots));
    }

    if tier == Tier::Teacher {
        check_coverage(config, &roster, &class.code, term_code)?;
    }

    for (student, snapshots) in &roster {
        let carried = carry_forward(tier, snapshots);
        let own_note = snapshots
            .iter()
            .find(|s| s.tier == tier)
            .and_then(|s| s.note.clone());

        tx.upsert_history(&HistorySnapshot {
            student_id: student.id,
            term_code: term_code.to_string(),
            tier,
            total_score: carried.total,
            changed_by: request.actor_id.clone(),
            note: own_note,
            updated_at: now,
        })
        .await?;
        tx.upsert_term_score(&TermScore::new(student.id, term_code, carried.total, now))
            .await?;

        tracing::debug!(
            student = %student.code,
            tier = %tier,
            total = carried.total,
            source = ?carried.source,
            "Carried total forward"
        );
    }

    if !tx.lock_gate(class.id, term_code, tier, now).await? {
        // A concurrent accept flipped the gate after our check.
        return Err(ConductError::already_locked(tier, &class.code, term_code));
    }

    Ok(roster.len())
}

fn check_previous_gate(
    config: &EngineConfig,
    tier: Tier,
    status: &ClassTermStatus,
    class_code: &str,
    term_code: &str,
) -> ConductResult<()> {
    let required = match tier {
        Tier::Teacher if config.leader_tier_required => Some(Tier::Leader),
        Tier::Faculty => Some(Tier::Teacher),
        Tier::Admin => Some(Tier::Faculty),
        _ => None,
    };
    match required {
        Some(required) if !status.is_approved(required) => Err(
            ConductError::previous_tier_not_approved(tier, required, class_code, term_code),
        ),
        _ => Ok(()),
    }
}

fn check_coverage(
    config: &EngineConfig,
    roster: &[(StudentRef, Vec<HistorySnapshot>)],
    class_code: &str,
    term_code: &str,
) -> ConductResult<()> {
    let accepted: &[Tier] = if config.leader_tier_required {
        &[Tier::Leader]
    } else {
        &[Tier::Leader, Tier::Student]
    };
    let missing: Vec<String> = roster
        .iter()
        .filter(|(_, snapshots)| !snapshots.iter().any(|s| accepted.contains(&s.tier)))
        .map(|(student, _)| student.code.clone())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ConductError::coverage_incomplete(
            class_code,
            term_code,
            &missing,
            roster.len(),
        ))
    }
}

pub(crate) async fn record_tier_score(
    tx: &mut dyn ConductTx,
    request: &RecordTierScoreRequest,
    now: DateTime<Utc>,
) -> ConductResult<Aggregate> {
    let term = require_term(tx, &request.term_code).await?;
    let student = require_student(tx, &request.student_code).await?;
    let closed = tx
        .get_class_status(student.class_id, &term.code)
        .await?
        .and_then(|status| status.closed_from(request.tier));
    if let Some(locked) = closed {
        return Err(ConductError::student_locked(
            request.tier,
            locked,
            &student.code,
            &term.code,
        ));
    }

    tx.upsert_history(&HistorySnapshot {
        student_id: student.id,
        term_code: term.code,
        tier: request.tier,
        total_score: request.total_score,
        changed_by: request.actor_id.clone(),
        note: request.note.clone(),
        updated_at: now,
    })
    .await?;

    Ok(Aggregate::from_total(request.total_score))
}

pub(crate) async fn class_status(
    tx: &mut dyn ConductTx,
    class_code: &str,
    term_code: &str,
) -> ConductResult<ClassTermStatus> {
    let class = require_class(tx, class_code).await?;
    let term = require_term(tx, term_code).await?;
    Ok(tx
        .get_class_status(class.id, &term.code)
        .await?
        .unwrap_or_else(|| ClassTermStatus::unlocked(class.id, term.code)))
}
