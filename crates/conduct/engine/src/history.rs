use crate::error::ConductResult;
use crate::lookup::require_student;
use conduct_storage::ConductTx;
use conduct_types::Rank;
use serde::Serialize;

/// One term of a student's conduct history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TermHistoryEntry {
    pub term_code: String,
    pub term_name: String,
    pub total_score: i32,
    pub rank: Rank,
}

/// Term scores of a student, newest term first.
pub(crate) async fn student_history(
    tx: &mut dyn ConductTx,
    student_code: &str,
) -> ConductResult<Vec<TermHistoryEntry>> {
    let student = require_student(tx, student_code).await?;
    let rows = tx.list_term_scores(student.id).await?;
    Ok(rows
        .into_iter()
        .map(|(score, term)| TermHistoryEntry {
            term_code: score.term_code,
            term_name: term.name,
            total_score: score.total_score,
            rank: score.rank,
        })
        .collect())
}
