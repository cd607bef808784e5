//! Score ledger: self assessments and the term total they produce.

use crate::aggregation::{self, Aggregate};
use crate::error::{ConductError, ConductResult};
use crate::lookup::{require_criterion, require_field, require_student, require_term};
use chrono::{DateTime, Utc};
use conduct_storage::ConductTx;
use conduct_types::{
    Criterion, CriterionKind, HistorySnapshot, OptionId, Rank, SelfAssessmentRecord, StudentId,
    StudentRef, TermScore, Tier,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One answered criterion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfAssessmentItem {
    pub criterion_code: String,
    #[serde(default)]
    pub option_id: Option<OptionId>,
    #[serde(default)]
    pub text_value: Option<String>,
    /// Self-awarded points, used when no option determines them.
    #[serde(default)]
    pub score: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveSelfAssessmentRequest {
    pub student_code: String,
    pub term_code: String,
    pub items: Vec<SelfAssessmentItem>,
    /// Delegated reviewer saving on the student's behalf.
    #[serde(default)]
    pub submitted_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveOutcome {
    pub message: String,
    pub student_id: StudentId,
    pub total: i32,
    pub rank: Rank,
}

pub(crate) fn validate(request: &SaveSelfAssessmentRequest) -> ConductResult<()> {
    require_field("student_code", &request.student_code)?;
    require_field("term_code", &request.term_code)?;
    if request.items.is_empty() {
        return Err(ConductError::Validation("items must not be empty".to_string()));
    }
    let mut seen = HashSet::new();
    for item in &request.items {
        require_field("criterion_code", &item.criterion_code)?;
        if !seen.insert(item.criterion_code.as_str()) {
            return Err(ConductError::Validation(format!(
                "criterion {} appears more than once",
                item.criterion_code
            )));
        }
        if item.option_id.is_some() && item.text_value.is_some() {
            return Err(ConductError::Validation(format!(
                "criterion {} takes either an option or a text value",
                item.criterion_code
            )));
        }
    }
    Ok(())
}

pub(crate) async fn save(
    tx: &mut dyn ConductTx,
    request: &SaveSelfAssessmentRequest,
    now: DateTime<Utc>,
) -> ConductResult<SaveOutcome> {
    let term = require_term(tx, &request.term_code).await?;
    if !term.is_open {
        return Err(ConductError::TermClosed(term.code));
    }
    let student = require_student(tx, &request.student_code).await?;
    let criteria = tx.list_criteria(&term.code).await?;

    for item in &request.items {
        let criterion = require_criterion(&criteria, &item.criterion_code)?;
        let score = item_score(criterion, item)?;
        let existing = tx
            .get_self_assessment(student.id, &term.code, criterion.id)
            .await?;

        let mut record = SelfAssessmentRecord {
            student_id: student.id,
            term_code: term.code.clone(),
            criterion_id: criterion.id,
            option_id: item.option_id,
            text_value: item.text_value.clone(),
            self_score: score,
            is_verified: false,
            participated: None,
            verify_note: None,
            verified_by: None,
            verified_at: None,
            updated_at: now,
        };

        if criterion.requires_verification {
            match existing {
                // Unchanged answer keeps the verifier's decision.
                Some(prev)
                    if prev.is_verified
                        && prev.same_submission(item.option_id, item.text_value.as_deref()) =>
                {
                    record = SelfAssessmentRecord {
                        updated_at: now,
                        ..prev
                    };
                }
                _ => {
                    record.self_score = 0;
                    record.clear_verification();
                }
            }
        }

        tx.upsert_self_assessment(&record).await?;
    }

    let submitter = request
        .submitted_by
        .clone()
        .unwrap_or_else(|| student.code.clone());
    let aggregate =
        refresh_term_score(tx, &student, &term.code, &criteria, Some(&submitter), now).await?;

    Ok(SaveOutcome {
        message: "Self assessment saved".to_string(),
        student_id: student.id,
        total: aggregate.total,
        rank: aggregate.rank,
    })
}

/// Recompute the ledger total and store it as the student-tier snapshot.
///
/// The snapshot is what reviewing tiers carry forward, so it tracks every
/// ledger change. `TermScore` follows the ledger only until the first gate
/// of the student's class closes; after that it belongs to the approving
/// tiers. `changed_by` of `None` keeps the snapshot's previous author.
pub(crate) async fn refresh_term_score(
    tx: &mut dyn ConductTx,
    student: &StudentRef,
    term_code: &str,
    criteria: &[Criterion],
    changed_by: Option<&str>,
    now: DateTime<Utc>,
) -> ConductResult<Aggregate> {
    let records = tx.list_self_assessments(student.id, term_code).await?;
    let aggregate = aggregation::aggregate_ledger(&records, criteria);

    let approved = tx
        .get_class_status(student.class_id, term_code)
        .await?
        .and_then(|status| status.highest_approved());
    match approved {
        None => {
            tx.upsert_term_score(&TermScore::new(student.id, term_code, aggregate.total, now))
                .await?;
        }
        Some(tier) => tracing::debug!(
            student = %student.code,
            term = %term_code,
            approved = %tier,
            total = aggregate.total,
            "Term score held by approving tier"
        ),
    }

    let changed_by = match changed_by {
        Some(actor) => actor.to_string(),
        None => tx
            .list_student_history(student.id, term_code)
            .await?
            .into_iter()
            .find(|s| s.tier == Tier::Student)
            .map(|s| s.changed_by)
            .unwrap_or_else(|| student.code.clone()),
    };
    tx.upsert_history(&HistorySnapshot {
        student_id: student.id,
        term_code: term_code.to_string(),
        tier: Tier::Student,
        total_score: aggregate.total,
        changed_by,
        note: None,
        updated_at: now,
    })
    .await?;

    Ok(aggregate)
}

/// Points a submission is worth before any verification.
fn item_score(criterion: &Criterion, item: &SelfAssessmentItem) -> ConductResult<i32> {
    if let Some(option_id) = item.option_id {
        if criterion.kind != CriterionKind::Choice {
            return Err(ConductError::Validation(format!(
                "criterion {} does not take an option",
                criterion.code
            )));
        }
        return criterion
            .option(option_id)
            .map(|o| o.points)
            .ok_or_else(|| {
                ConductError::Validation(format!(
                    "option {option_id} does not belong to criterion {}",
                    criterion.code
                ))
            });
    }

    match item.score {
        Some(score) if !(0..=criterion.max_points).contains(&score) => {
            Err(ConductError::Validation(format!(
                "score {score} for criterion {} is outside 0..={}",
                criterion.code, criterion.max_points
            )))
        }
        Some(score) => Ok(score),
        None => Ok(criterion.participation_points(None, item.text_value.as_deref())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduct_types::{CriterionId, CriterionOption};

    fn choice() -> Criterion {
        Criterion {
            id: CriterionId(1),
            term_code: "2024-1".to_string(),
            code: "ATTEND".to_string(),
            title: "Attendance".to_string(),
            kind: CriterionKind::Choice,
            max_points: 10,
            requires_verification: false,
            options: vec![
                CriterionOption {
                    id: OptionId(11),
                    label: "always".to_string(),
                    points: 10,
                },
                CriterionOption {
                    id: OptionId(12),
                    label: "mostly".to_string(),
                    points: 6,
                },
            ],
        }
    }

    fn item(option_id: Option<i64>, text: Option<&str>, score: Option<i32>) -> SelfAssessmentItem {
        SelfAssessmentItem {
            criterion_code: "ATTEND".to_string(),
            option_id: option_id.map(OptionId),
            text_value: text.map(str::to_string),
            score,
        }
    }

    #[test]
    fn option_points_override_submitted_score() {
        assert_eq!(item_score(&choice(), &item(Some(12), None, Some(10))).unwrap(), 6);
    }

    #[test]
    fn foreign_option_is_rejected() {
        let err = item_score(&choice(), &item(Some(99), None, None)).unwrap_err();
        assert!(matches!(err, ConductError::Validation(_)));
    }

    #[test]
    fn submitted_score_must_fit_the_criterion() {
        assert!(item_score(&choice(), &item(None, None, Some(11))).is_err());
        assert!(item_score(&choice(), &item(None, None, Some(-1))).is_err());
        assert_eq!(item_score(&choice(), &item(None, None, Some(7))).unwrap(), 7);
    }

    #[test]
    fn text_without_score_earns_full_marks() {
        let mut text = choice();
        text.kind = CriterionKind::Text;
        text.options.clear();
        assert_eq!(item_score(&text, &item(None, Some("volunteer day"), None)).unwrap(), 10);
        assert_eq!(item_score(&text, &item(None, Some("  "), None)).unwrap(), 0);
    }

    #[test]
    fn duplicate_criteria_fail_validation() {
        let request = SaveSelfAssessmentRequest {
            student_code: "SV1".to_string(),
            term_code: "2024-1".to_string(),
            items: vec![item(Some(11), None, None), item(Some(12), None, None)],
            submitted_by: None,
        };
        assert!(matches!(validate(&request), Err(ConductError::Validation(_))));
    }
}
