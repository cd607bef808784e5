//! In-memory reference implementation of the storage contract.
//!
//! Transactions are serialized behind one async mutex. Each transaction works
//! on a private copy of the state that replaces the shared state on commit,
//! so an abandoned transaction leaves no trace. Production deployments should
//! use the PostgreSQL adapter.

use crate::traits::{ConductStore, ConductTx};
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use conduct_types::{
    ClassId, ClassRef, ClassTermStatus, Criterion, CriterionId, HistorySnapshot,
    SelfAssessmentRecord, StudentId, StudentRef, TermRef, TermScore, Tier,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    classes: BTreeMap<ClassId, ClassRef>,
    students: BTreeMap<StudentId, StudentRef>,
    terms: BTreeMap<String, TermRef>,
    criteria: BTreeMap<CriterionId, Criterion>,
    self_assessments: BTreeMap<(StudentId, String, CriterionId), SelfAssessmentRecord>,
    history: BTreeMap<(StudentId, String, Tier), HistorySnapshot>,
    class_status: BTreeMap<(ClassId, String), ClassTermStatus>,
    term_scores: BTreeMap<(StudentId, String), TermScore>,
}

/// In-memory conduct storage.
#[derive(Clone, Default)]
pub struct InMemoryConductStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryConductStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Reference data is owned by catalog services; these seed it directly.

    pub async fn insert_class(&self, class: ClassRef) {
        self.state.lock().await.classes.insert(class.id, class);
    }

    pub async fn insert_student(&self, student: StudentRef) -> StorageResult<()> {
        let mut state = self.state.lock().await;
        if !state.classes.contains_key(&student.class_id) {
            return Err(StorageError::InvalidReference(format!(
                "class {} for student {}",
                student.class_id, student.code
            )));
        }
        state.students.insert(student.id, student);
        Ok(())
    }

    pub async fn insert_term(&self, term: TermRef) {
        self.state.lock().await.terms.insert(term.code.clone(), term);
    }

    pub async fn set_term_open(&self, term_code: &str, is_open: bool) -> StorageResult<()> {
        let mut state = self.state.lock().await;
        let term = state
            .terms
            .get_mut(term_code)
            .ok_or_else(|| StorageError::NotFound(format!("term {term_code}")))?;
        term.is_open = is_open;
        Ok(())
    }

    pub async fn insert_criterion(&self, criterion: Criterion) -> StorageResult<()> {
        let mut state = self.state.lock().await;
        if !state.terms.contains_key(&criterion.term_code) {
            return Err(StorageError::InvalidReference(format!(
                "term {} for criterion {}",
                criterion.term_code, criterion.code
            )));
        }
        state.criteria.insert(criterion.id, criterion);
        Ok(())
    }
}

#[async_trait]
impl ConductStore for InMemoryConductStore {
    async fn begin(&self) -> StorageResult<Box<dyn ConductTx>> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryTx { guard, working }))
    }

    fn backend_label(&self) -> &'static str {
        "memory"
    }
}

struct InMemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl ConductTx for InMemoryTx {
    async fn find_student(&mut self, student_code: &str) -> StorageResult<Option<StudentRef>> {
        Ok(self
            .working
            .students
            .values()
            .find(|s| s.code == student_code)
            .cloned())
    }

    async fn find_class(&mut self, class_code: &str) -> StorageResult<Option<ClassRef>> {
        Ok(self
            .working
            .classes
            .values()
            .find(|c| c.code == class_code)
            .cloned())
    }

    async fn list_faculty_classes(&mut self, faculty_code: &str) -> StorageResult<Vec<ClassRef>> {
        let mut classes: Vec<_> = self
            .working
            .classes
            .values()
            .filter(|c| c.faculty_code == faculty_code)
            .cloned()
            .collect();
        classes.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(classes)
    }

    async fn list_class_students(&mut self, class_id: ClassId) -> StorageResult<Vec<StudentRef>> {
        let mut students: Vec<_> = self
            .working
            .students
            .values()
            .filter(|s| s.class_id == class_id)
            .cloned()
            .collect();
        students.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(students)
    }

    async fn find_term(&mut self, term_code: &str) -> StorageResult<Option<TermRef>> {
        Ok(self.working.terms.get(term_code).cloned())
    }

    async fn list_criteria(&mut self, term_code: &str) -> StorageResult<Vec<Criterion>> {
        Ok(self
            .working
            .criteria
            .values()
            .filter(|c| c.term_code == term_code)
            .cloned()
            .collect())
    }

    async fn upsert_self_assessment(
        &mut self,
        record: &SelfAssessmentRecord,
    ) -> StorageResult<()> {
        if !self.working.students.contains_key(&record.student_id) {
            return Err(StorageError::InvalidReference(format!(
                "student {}",
                record.student_id
            )));
        }
        if !self.working.criteria.contains_key(&record.criterion_id) {
            return Err(StorageError::InvalidReference(format!(
                "criterion {}",
                record.criterion_id
            )));
        }
        self.working.self_assessments.insert(
            (
                record.student_id,
                record.term_code.clone(),
                record.criterion_id,
            ),
            record.clone(),
        );
        Ok(())
    }

    async fn get_self_assessment(
        &mut self,
        student_id: StudentId,
        term_code: &str,
        criterion_id: CriterionId,
    ) -> StorageResult<Option<SelfAssessmentRecord>> {
        Ok(self
            .working
            .self_assessments
            .get(&(student_id, term_code.to_string(), criterion_id))
            .cloned())
    }

    async fn list_self_assessments(
        &mut self,
        student_id: StudentId,
        term_code: &str,
    ) -> StorageResult<Vec<SelfAssessmentRecord>> {
        Ok(self
            .working
            .self_assessments
            .values()
            .filter(|r| r.student_id == student_id && r.term_code == term_code)
            .cloned()
            .collect())
    }

    async fn upsert_history(&mut self, snapshot: &HistorySnapshot) -> StorageResult<()> {
        if !self.working.students.contains_key(&snapshot.student_id) {
            return Err(StorageError::InvalidReference(format!(
                "student {}",
                snapshot.student_id
            )));
        }
        self.working.history.insert(
            (
                snapshot.student_id,
                snapshot.term_code.clone(),
                snapshot.tier,
            ),
            snapshot.clone(),
        );
        Ok(())
    }

    async fn list_student_history(
        &mut self,
        student_id: StudentId,
        term_code: &str,
    ) -> StorageResult<Vec<HistorySnapshot>> {
        Ok(self
            .working
            .history
            .values()
            .filter(|h| h.student_id == student_id && h.term_code == term_code)
            .cloned()
            .collect())
    }

    async fn get_class_status(
        &mut self,
        class_id: ClassId,
        term_code: &str,
    ) -> StorageResult<Option<ClassTermStatus>> {
        Ok(self
            .working
            .class_status
            .get(&(class_id, term_code.to_string()))
            .cloned())
    }

    async fn lock_gate(
        &mut self,
        class_id: ClassId,
        term_code: &str,
        tier: Tier,
        at: DateTime<Utc>,
    ) -> StorageResult<bool> {
        if !tier.is_gated() {
            return Err(StorageError::InvalidInput(format!(
                "tier {tier} has no approval gate"
            )));
        }
        if !self.working.classes.contains_key(&class_id) {
            return Err(StorageError::InvalidReference(format!("class {class_id}")));
        }
        let status = self
            .working
            .class_status
            .entry((class_id, term_code.to_string()))
            .or_insert_with(|| ClassTermStatus::unlocked(class_id, term_code));
        Ok(status.lock(tier, at))
    }

    async fn upsert_term_score(&mut self, score: &TermScore) -> StorageResult<()> {
        if !self.working.students.contains_key(&score.student_id) {
            return Err(StorageError::InvalidReference(format!(
                "student {}",
                score.student_id
            )));
        }
        self.working.term_scores.insert(
            (score.student_id, score.term_code.clone()),
            score.clone(),
        );
        Ok(())
    }

    async fn get_term_score(
        &mut self,
        student_id: StudentId,
        term_code: &str,
    ) -> StorageResult<Option<TermScore>> {
        Ok(self
            .working
            .term_scores
            .get(&(student_id, term_code.to_string()))
            .cloned())
    }

    async fn list_term_scores(
        &mut self,
        student_id: StudentId,
    ) -> StorageResult<Vec<(TermScore, TermRef)>> {
        let mut rows = Vec::new();
        for score in self
            .working
            .term_scores
            .values()
            .filter(|s| s.student_id == student_id)
        {
            let term = self.working.terms.get(&score.term_code).ok_or_else(|| {
                StorageError::InvalidReference(format!("term {}", score.term_code))
            })?;
            rows.push((score.clone(), term.clone()));
        }
        rows.sort_by(|a, b| {
            b.1.starts_on
                .cmp(&a.1.starts_on)
                .then_with(|| b.1.code.cmp(&a.1.code))
        });
        Ok(rows)
    }

    async fn commit(self: Box<Self>) -> StorageResult<()> {
        let InMemoryTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}
