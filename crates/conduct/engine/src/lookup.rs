use crate::error::{ConductError, ConductResult};
use conduct_storage::ConductTx;
use conduct_types::{ClassRef, Criterion, StudentRef, TermRef};

pub(crate) async fn require_student(
    tx: &mut dyn ConductTx,
    student_code: &str,
) -> ConductResult<StudentRef> {
    tx.find_student(student_code)
        .await?
        .ok_or_else(|| ConductError::not_found("student", student_code))
}

pub(crate) async fn require_term(tx: &mut dyn ConductTx, term_code: &str) -> ConductResult<TermRef> {
    tx.find_term(term_code)
        .await?
        .ok_or_else(|| ConductError::not_found("term", term_code))
}

pub(crate) async fn require_class(
    tx: &mut dyn ConductTx,
    class_code: &str,
) -> ConductResult<ClassRef> {
    tx.find_class(class_code)
        .await?
        .ok_or_else(|| ConductError::not_found("class", class_code))
}

pub(crate) fn require_criterion<'a>(
    criteria: &'a [Criterion],
    criterion_code: &str,
) -> ConductResult<&'a Criterion> {
    criteria
        .iter()
        .find(|c| c.code == criterion_code)
        .ok_or_else(|| ConductError::not_found("criterion", criterion_code))
}

pub(crate) fn require_field(name: &str, value: &str) -> ConductResult<()> {
    if value.trim().is_empty() {
        return Err(ConductError::Validation(format!("{name} is required")));
    }
    Ok(())
}
