//! Verification sub-ledger.
//!
//! Criteria flagged `requires_verification` are saved at zero. A verifier
//! later confirms (participated or not) or unconfirms the submission, and the
//! term total is recomputed from the whole ledger each time.

use crate::error::{ConductError, ConductResult};
use crate::ledger::refresh_term_score;
use crate::lookup::{require_class, require_criterion, require_field, require_student, require_term};
use chrono::{DateTime, Utc};
use conduct_storage::ConductTx;
use conduct_types::{Criterion, OptionId, SelfAssessmentRecord, StudentRef, TermRef};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmVerificationRequest {
    pub student_code: String,
    pub term_code: String,
    pub criterion_code: String,
    pub participated: bool,
    #[serde(default)]
    pub note: Option<String>,
    pub verifier: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmOutcome {
    pub score: i32,
    pub total_score: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnconfirmOutcome {
    pub total_score: i32,
}

/// A submitted, not yet verified record awaiting a verifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingVerification {
    pub student_code: String,
    pub full_name: String,
    pub criterion_code: String,
    pub option_id: Option<OptionId>,
    pub text_value: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

pub(crate) fn validate_confirm(request: &ConfirmVerificationRequest) -> ConductResult<()> {
    require_field("student_code", &request.student_code)?;
    require_field("term_code", &request.term_code)?;
    require_field("criterion_code", &request.criterion_code)?;
    require_field("verifier", &request.verifier)
}

pub(crate) async fn confirm(
    tx: &mut dyn ConductTx,
    request: &ConfirmVerificationRequest,
    now: DateTime<Utc>,
) -> ConductResult<ConfirmOutcome> {
    let target = load_target(
        tx,
        &request.student_code,
        &request.term_code,
        &request.criterion_code,
    )
    .await?;
    let criterion = &target.criterion;

    // Score is derived from the stored submission inside this transaction.
    let score = if request.participated {
        criterion.participation_points(
            target.record.option_id,
            target.record.text_value.as_deref(),
        )
    } else {
        0
    };

    let mut record = target.record.clone();
    record.self_score = score;
    record.is_verified = true;
    record.participated = Some(request.participated);
    record.verify_note = request.note.clone();
    record.verified_by = Some(request.verifier.clone());
    record.verified_at = Some(now);
    record.updated_at = now;
    tx.upsert_self_assessment(&record).await?;

    let aggregate = refresh_term_score(
        tx,
        &target.student,
        &target.term.code,
        &target.criteria,
        Some(&request.verifier),
        now,
    )
    .await?;

    Ok(ConfirmOutcome {
        score,
        total_score: aggregate.total,
    })
}

pub(crate) async fn unconfirm(
    tx: &mut dyn ConductTx,
    student_code: &str,
    term_code: &str,
    criterion_code: &str,
    now: DateTime<Utc>,
) -> ConductResult<UnconfirmOutcome> {
    let target = load_target(tx, student_code, term_code, criterion_code).await?;

    let mut record = target.record.clone();
    record.self_score = 0;
    record.clear_verification();
    record.updated_at = now;
    tx.upsert_self_assessment(&record).await?;

    let aggregate = refresh_term_score(
        tx,
        &target.student,
        &target.term.code,
        &target.criteria,
        None,
        now,
    )
    .await?;

    Ok(UnconfirmOutcome {
        total_score: aggregate.total,
    })
}

pub(crate) async fn list_pending(
    tx: &mut dyn ConductTx,
    class_code: &str,
    term_code: &str,
) -> ConductResult<Vec<PendingVerification>> {
    let class = require_class(tx, class_code).await?;
    let term = require_term(tx, term_code).await?;
    let criteria: Vec<Criterion> = tx
        .list_criteria(&term.code)
        .await?
        .into_iter()
        .filter(|c| c.requires_verification)
        .collect();
    if criteria.is_empty() {
        return Ok(Vec::new());
    }

    let mut pending = Vec::new();
    for student in tx.list_class_students(class.id).await? {
        for record in tx.list_self_assessments(student.id, &term.code).await? {
            if record.is_verified {
                continue;
            }
            if let Some(criterion) = criteria.iter().find(|c| c.id == record.criterion_id) {
                pending.push(PendingVerification {
                    student_code: student.code.clone(),
                    full_name: student.full_name.clone(),
                    criterion_code: criterion.code.clone(),
                    option_id: record.option_id,
                    text_value: record.text_value,
                    submitted_at: record.updated_at,
                });
            }
        }
    }
    Ok(pending)
}

struct Target {
    student: StudentRef,
    term: TermRef,
    criteria: Vec<Criterion>,
    criterion: Criterion,
    record: SelfAssessmentRecord,
}

async fn load_target(
    tx: &mut dyn ConductTx,
    student_code: &str,
    term_code: &str,
    criterion_code: &str,
) -> ConductResult<Target> {
    let term = require_term(tx, term_code).await?;
    let student = require_student(tx, student_code).await?;
    let criteria = tx.list_criteria(&term.code).await?;
    let criterion = require_criterion(&criteria, criterion_code)?.clone();
    if !criterion.requires_verification {
        return Err(ConductError::Validation(format!(
            "criterion {criterion_code} does not require verification"
        )));
    }

    let record = tx
        .get_self_assessment(student.id, &term.code, criterion.id)
        .await?
        .ok_or_else(|| {
            ConductError::not_found(
                "self assessment",
                format!("{student_code}/{term_code}/{criterion_code}"),
            )
        })?;

    Ok(Target {
        student,
        term,
        criteria,
        criterion,
        record,
    })
}
