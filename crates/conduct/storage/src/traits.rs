use crate::StorageResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use conduct_types::{
    ClassId, ClassRef, ClassTermStatus, Criterion, CriterionId, HistorySnapshot,
    SelfAssessmentRecord, StudentId, StudentRef, TermRef, TermScore, Tier,
};

/// Entry point of a storage backend.
#[async_trait]
pub trait ConductStore: Send + Sync {
    /// Open a unit of work. Dropping it without [`ConductTx::commit`] rolls
    /// every write back.
    async fn begin(&self) -> StorageResult<Box<dyn ConductTx>>;

    /// Short backend name for logs.
    fn backend_label(&self) -> &'static str;
}

/// One transaction over the reference data and the four core tables.
#[async_trait]
pub trait ConductTx: Send {
    // ── Reference lookups ────────────────────────────────────────────

    async fn find_student(&mut self, student_code: &str) -> StorageResult<Option<StudentRef>>;

    async fn find_class(&mut self, class_code: &str) -> StorageResult<Option<ClassRef>>;

    /// Classes of a faculty, ordered by class code.
    async fn list_faculty_classes(&mut self, faculty_code: &str) -> StorageResult<Vec<ClassRef>>;

    /// Students enrolled in a class, ordered by student code.
    async fn list_class_students(&mut self, class_id: ClassId) -> StorageResult<Vec<StudentRef>>;

    async fn find_term(&mut self, term_code: &str) -> StorageResult<Option<TermRef>>;

    /// Criteria catalog of a term, options included.
    async fn list_criteria(&mut self, term_code: &str) -> StorageResult<Vec<Criterion>>;

    // ── Score ledger ─────────────────────────────────────────────────

    /// Insert or replace by (student, term, criterion).
    async fn upsert_self_assessment(&mut self, record: &SelfAssessmentRecord)
        -> StorageResult<()>;

    async fn get_self_assessment(
        &mut self,
        student_id: StudentId,
        term_code: &str,
        criterion_id: CriterionId,
    ) -> StorageResult<Option<SelfAssessmentRecord>>;

    async fn list_self_assessments(
        &mut self,
        student_id: StudentId,
        term_code: &str,
    ) -> StorageResult<Vec<SelfAssessmentRecord>>;

    // ── History snapshots ────────────────────────────────────────────

    /// Insert or replace by (student, term, tier).
    async fn upsert_history(&mut self, snapshot: &HistorySnapshot) -> StorageResult<()>;

    /// All tier snapshots of one student for a term.
    async fn list_student_history(
        &mut self,
        student_id: StudentId,
        term_code: &str,
    ) -> StorageResult<Vec<HistorySnapshot>>;

    // ── Approval gates ───────────────────────────────────────────────

    async fn get_class_status(
        &mut self,
        class_id: ClassId,
        term_code: &str,
    ) -> StorageResult<Option<ClassTermStatus>>;

    /// Compare-and-set `tier`'s gate from false to true.
    ///
    /// Returns `false` when the gate was already true; nothing is written
    /// in that case.
    async fn lock_gate(
        &mut self,
        class_id: ClassId,
        term_code: &str,
        tier: Tier,
        at: DateTime<Utc>,
    ) -> StorageResult<bool>;

    // ── Term scores ──────────────────────────────────────────────────

    /// Insert or replace by (student, term).
    async fn upsert_term_score(&mut self, score: &TermScore) -> StorageResult<()>;

    async fn get_term_score(
        &mut self,
        student_id: StudentId,
        term_code: &str,
    ) -> StorageResult<Option<TermScore>>;

    /// Every term score of a student with its term, newest term first.
    async fn list_term_scores(
        &mut self,
        student_id: StudentId,
    ) -> StorageResult<Vec<(TermScore, TermRef)>>;

    async fn commit(self: Box<Self>) -> StorageResult<()>;
}
