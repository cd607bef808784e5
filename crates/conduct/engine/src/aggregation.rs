//! Pure scoring functions shared by every write site.

use conduct_types::{Criterion, CriterionId, Rank, SelfAssessmentRecord};
use serde::Serialize;
use std::collections::HashMap;

/// A total and its rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Aggregate {
    pub total: i32,
    pub rank: Rank,
}

impl Aggregate {
    pub fn from_total(total: i32) -> Self {
        Self {
            total,
            rank: Rank::for_total(total),
        }
    }
}

/// A record still waiting for its verifier contributes nothing.
pub fn is_pending(record: &SelfAssessmentRecord, criterion: Option<&Criterion>) -> bool {
    criterion.is_some_and(|c| c.requires_verification) && !record.is_verified
}

/// Sum of the ledger records that count toward the term total.
pub fn ledger_total(records: &[SelfAssessmentRecord], criteria: &[Criterion]) -> i32 {
    let by_id: HashMap<CriterionId, &Criterion> = criteria.iter().map(|c| (c.id, c)).collect();
    records
        .iter()
        .filter(|r| !is_pending(r, by_id.get(&r.criterion_id).copied()))
        .map(|r| r.self_score)
        .sum()
}

pub fn aggregate_ledger(records: &[SelfAssessmentRecord], criteria: &[Criterion]) -> Aggregate {
    Aggregate::from_total(ledger_total(records, criteria))
}
