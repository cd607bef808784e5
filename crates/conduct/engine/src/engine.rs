use crate::aggregation::Aggregate;
use crate::approval::{self, AcceptOutcome, AcceptRequest, RecordTierScoreRequest};
use crate::config::EngineConfig;
use crate::error::ConductResult;
use crate::history::{self, TermHistoryEntry};
use crate::ledger::{self, SaveOutcome, SaveSelfAssessmentRequest};
use crate::lookup::require_field;
use crate::verification::{
    self, ConfirmOutcome, ConfirmVerificationRequest, PendingVerification, UnconfirmOutcome,
};
use chrono::Utc;
use conduct_storage::ConductStore;
use conduct_types::ClassTermStatus;
use std::sync::Arc;

/// Entry point of the approval core.
///
/// Each operation validates its input, opens one storage transaction, and
/// commits only when every step succeeded.
#[derive(Clone)]
pub struct ConductEngine {
    store: Arc<dyn ConductStore>,
    config: EngineConfig,
}

impl ConductEngine {
    pub fn new(store: Arc<dyn ConductStore>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn ConductStore> {
        Arc::clone(&self.store)
    }

    // ── Score ledger ─────────────────────────────────────────────────

    pub async fn save_self_assessment(
        &self,
        request: SaveSelfAssessmentRequest,
    ) -> ConductResult<SaveOutcome> {
        ledger::validate(&request)?;
        let mut tx = self.store.begin().await?;
        let outcome = ledger::save(tx.as_mut(), &request, Utc::now()).await?;
        tx.commit().await?;

        tracing::info!(
            student = %request.student_code,
            term = %request.term_code,
            items = request.items.len(),
            total = outcome.total,
            "Saved self assessment"
        );
        Ok(outcome)
    }

    // ── Verification ─────────────────────────────────────────────────

    pub async fn confirm_verification(
        &self,
        request: ConfirmVerificationRequest,
    ) -> ConductResult<ConfirmOutcome> {
        verification::validate_confirm(&request)?;
        let mut tx = self.store.begin().await?;
        let outcome = verification::confirm(tx.as_mut(), &request, Utc::now()).await?;
        tx.commit().await?;

        tracing::info!(
            student = %request.student_code,
            term = %request.term_code,
            criterion = %request.criterion_code,
            participated = request.participated,
            verifier = %request.verifier,
            score = outcome.score,
            total = outcome.total_score,
            "Confirmed verification"
        );
        Ok(outcome)
    }

    pub async fn unconfirm_verification(
        &self,
        student_code: &str,
        term_code: &str,
        criterion_code: &str,
    ) -> ConductResult<UnconfirmOutcome> {
        require_field("student_code", student_code)?;
        require_field("term_code", term_code)?;
        require_field("criterion_code", criterion_code)?;
        let mut tx = self.store.begin().await?;
        let outcome = verification::unconfirm(
            tx.as_mut(),
            student_code,
            term_code,
            criterion_code,
            Utc::now(),
        )
        .await?;
        tx.commit().await?;

        tracing::info!(
            student = %student_code,
            term = %term_code,
            criterion = %criterion_code,
            total = outcome.total_score,
            "Unconfirmed verification"
        );
        Ok(outcome)
    }

    pub async fn pending_verifications(
        &self,
        class_code: &str,
        term_code: &str,
    ) -> ConductResult<Vec<PendingVerification>> {
        require_field("class_code", class_code)?;
        require_field("term_code", term_code)?;
        let mut tx = self.store.begin().await?;
        verification::list_pending(tx.as_mut(), class_code, term_code).await
    }

    // ── Approval ladder ──────────────────────────────────────────────

    pub async fn accept_tier(&self, request: AcceptRequest) -> ConductResult<AcceptOutcome> {
        approval::validate_accept(&request)?;
        let result = self.accept_in_tx(&request).await;

        match &result {
            Ok(outcome) => tracing::info!(
                tier = %outcome.tier,
                scope = %request.scope.code(),
                term = %outcome.term_code,
                classes = outcome.class_codes.len(),
                students = outcome.students_processed,
                actor = %request.actor_id,
                "Accepted tier"
            ),
            Err(err) => {
                if let Some(reason) = err.gate_reason() {
                    tracing::warn!(
                        tier = %request.tier,
                        scope = %request.scope.code(),
                        term = %request.term_code,
                        reason = reason.code(),
                        error = %err,
                        "Accept refused"
                    );
                }
            }
        }
        result
    }

    async fn accept_in_tx(&self, request: &AcceptRequest) -> ConductResult<AcceptOutcome> {
        let mut tx = self.store.begin().await?;
        let outcome = approval::accept(tx.as_mut(), &self.config, request, Utc::now()).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    pub async fn record_tier_score(
        &self,
        request: RecordTierScoreRequest,
    ) -> ConductResult<Aggregate> {
        approval::validate_record(&request)?;
        let mut tx = self.store.begin().await?;
        let aggregate = approval::record_tier_score(tx.as_mut(), &request, Utc::now()).await?;
        tx.commit().await?;

        tracing::info!(
            tier = %request.tier,
            student = %request.student_code,
            term = %request.term_code,
            total = aggregate.total,
            actor = %request.actor_id,
            "Recorded tier score"
        );
        Ok(aggregate)
    }

    pub async fn class_status(
        &self,
        class_code: &str,
        term_code: &str,
    ) -> ConductResult<ClassTermStatus> {
        require_field("class_code", class_code)?;
        require_field("term_code", term_code)?;
        let mut tx = self.store.begin().await?;
        approval::class_status(tx.as_mut(), class_code, term_code).await
    }

    // ── History ──────────────────────────────────────────────────────

    pub async fn history(&self, student_code: &str) -> ConductResult<Vec<TermHistoryEntry>> {
        require_field("student_code", student_code)?;
        let mut tx = self.store.begin().await?;
        history::student_history(tx.as_mut(), student_code).await
    }
}
