mod common;

use common::*;
use conduct_engine::{
    AcceptRequest, ApprovalScope, ConductError, ConfirmVerificationRequest, EngineConfig,
    GateReason, RecordTierScoreRequest,
};
use conduct_storage::ConductStore;
use conduct_types::{Rank, StudentId, Tier};

fn accept(tier: Tier, class_code: &str) -> AcceptRequest {
    AcceptRequest {
        tier,
        scope: ApprovalScope::Class(class_code.to_string()),
        term_code: TERM.to_string(),
        actor_id: format!("{tier}01"),
    }
}

fn accept_faculty(tier: Tier) -> AcceptRequest {
    AcceptRequest {
        scope: ApprovalScope::Faculty(FACULTY.to_string()),
        ..accept(tier, CLASS_A)
    }
}

fn record(tier: Tier, student: &str, total: i32) -> RecordTierScoreRequest {
    RecordTierScoreRequest {
        tier,
        student_code: student.to_string(),
        term_code: TERM.to_string(),
        total_score: total,
        note: Some("reviewed in class meeting".to_string()),
        actor_id: format!("{tier}01"),
    }
}

async fn save_all(fx: &Fixture, students: &[&str]) {
    for student in students {
        fx.engine
            .save_self_assessment(save_request(
                student,
                vec![option("STUDY", 101), option("RULES", 201), scored("SELF", 5)],
            ))
            .await
            .unwrap();
    }
}

fn gate_reason(err: &ConductError) -> GateReason {
    err.gate_reason()
        .unwrap_or_else(|| panic!("expected a gate error, got {err:?}"))
}

#[tokio::test]
async fn teacher_accept_requires_full_roster_coverage() {
    let fx = fixture().await;
    save_all(&fx, &["SV001"]).await;

    let err = fx
        .engine
        .accept_tier(accept(Tier::Teacher, CLASS_A))
        .await
        .unwrap_err();
    assert_eq!(gate_reason(&err), GateReason::CoverageIncomplete);
    assert!(err.to_string().contains("SV002"));

    let status = fx.engine.class_status(CLASS_A, TERM).await.unwrap();
    assert!(!status.is_teacher_approved);

    let mut tx = fx.store.begin().await.unwrap();
    let snapshots = tx.list_student_history(StudentId(1), TERM).await.unwrap();
    assert!(snapshots.iter().all(|s| s.tier == Tier::Student));
}

#[tokio::test]
async fn teacher_carries_the_leader_total_forward() {
    let fx = fixture().await;
    save_all(&fx, &["SV001", "SV002"]).await;

    let recorded = fx
        .engine
        .record_tier_score(record(Tier::Leader, "SV001", 72))
        .await
        .unwrap();
    assert_eq!(recorded.rank, Rank::Kha);

    let outcome = fx
        .engine
        .accept_tier(accept(Tier::Teacher, CLASS_A))
        .await
        .unwrap();
    assert_eq!(outcome.class_codes, vec![CLASS_A.to_string()]);
    assert_eq!(outcome.students_processed, 2);

    let mut tx = fx.store.begin().await.unwrap();
    let snapshots = tx.list_student_history(StudentId(1), TERM).await.unwrap();
    let teacher = snapshots
        .iter()
        .find(|s| s.tier == Tier::Teacher)
        .expect("teacher snapshot");
    assert_eq!(teacher.total_score, 72);
    assert_eq!(teacher.changed_by, "teacher01");

    // No leader review for SV002: the self assessment total is carried.
    let snapshots = tx.list_student_history(StudentId(2), TERM).await.unwrap();
    let teacher = snapshots.iter().find(|s| s.tier == Tier::Teacher).unwrap();
    assert_eq!(teacher.total_score, 50);
    drop(tx);

    let history = fx.engine.history("SV001").await.unwrap();
    assert_eq!(history[0].total_score, 72);
    assert_eq!(history[0].rank, Rank::Kha);
}

#[tokio::test]
async fn teacher_own_score_overrides_carried_total() {
    let fx = fixture().await;
    save_all(&fx, &["SV001", "SV002"]).await;
    fx.engine
        .record_tier_score(record(Tier::Leader, "SV001", 72))
        .await
        .unwrap();
    fx.engine
        .record_tier_score(record(Tier::Teacher, "SV001", 81))
        .await
        .unwrap();

    fx.engine
        .accept_tier(accept(Tier::Teacher, CLASS_A))
        .await
        .unwrap();

    let mut tx = fx.store.begin().await.unwrap();
    let snapshots = tx.list_student_history(StudentId(1), TERM).await.unwrap();
    let teacher = snapshots.iter().find(|s| s.tier == Tier::Teacher).unwrap();
    assert_eq!(teacher.total_score, 81);
    assert_eq!(teacher.note.as_deref(), Some("reviewed in class meeting"));
    let score = tx.get_term_score(StudentId(1), TERM).await.unwrap().unwrap();
    assert_eq!(score.rank, Rank::Tot);
}

#[tokio::test]
async fn faculty_cannot_accept_before_teacher() {
    let fx = fixture().await;
    save_all(&fx, &["SV001", "SV002"]).await;

    let err = fx
        .engine
        .accept_tier(accept(Tier::Faculty, CLASS_A))
        .await
        .unwrap_err();
    assert_eq!(gate_reason(&err), GateReason::PreviousTierNotApproved);
    assert_eq!(err.code(), "PREVIOUS_TIER_NOT_APPROVED");

    let err = fx
        .engine
        .accept_tier(accept(Tier::Admin, CLASS_A))
        .await
        .unwrap_err();
    assert_eq!(gate_reason(&err), GateReason::PreviousTierNotApproved);
}

#[tokio::test]
async fn second_accept_is_refused() {
    let fx = fixture().await;
    save_all(&fx, &["SV001", "SV002"]).await;

    let first = fx
        .engine
        .accept_tier(accept(Tier::Teacher, CLASS_A))
        .await
        .unwrap();
    let err = fx
        .engine
        .accept_tier(accept(Tier::Teacher, CLASS_A))
        .await
        .unwrap_err();
    assert_eq!(gate_reason(&err), GateReason::AlreadyLocked);

    let status = fx.engine.class_status(CLASS_A, TERM).await.unwrap();
    assert_eq!(status.teacher_approved_at, Some(first.approved_at));
}

#[tokio::test]
async fn concurrent_accepts_lock_once() {
    let fx = fixture().await;
    save_all(&fx, &["SV001", "SV002"]).await;

    let left = fx.engine.clone();
    let right = fx.engine.clone();
    let (a, b) = tokio::join!(
        left.accept_tier(accept(Tier::Teacher, CLASS_A)),
        right.accept_tier(accept(Tier::Teacher, CLASS_A)),
    );

    let outcomes = [a, b];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    let refused = outcomes.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert_eq!(gate_reason(refused), GateReason::AlreadyLocked);
}

#[tokio::test]
async fn full_ladder_locks_every_gate() {
    let fx = fixture().await;
    save_all(&fx, &["SV001", "SV002"]).await;

    for tier in [Tier::Leader, Tier::Teacher, Tier::Faculty, Tier::Admin] {
        fx.engine.accept_tier(accept(tier, CLASS_A)).await.unwrap();
    }

    let status = fx.engine.class_status(CLASS_A, TERM).await.unwrap();
    for tier in [Tier::Leader, Tier::Teacher, Tier::Faculty, Tier::Admin] {
        assert!(status.is_approved(tier), "{tier} gate should be locked");
        assert!(status.approved_at(tier).is_some());
    }

    let mut tx = fx.store.begin().await.unwrap();
    let snapshots = tx.list_student_history(StudentId(2), TERM).await.unwrap();
    assert_eq!(snapshots.len(), 5);
    assert!(snapshots.iter().all(|s| s.total_score == 50));
}

#[tokio::test]
async fn faculty_scope_is_all_or_nothing() {
    let fx = fixture().await;
    save_all(&fx, &["SV001", "SV002", "SV003"]).await;
    fx.engine
        .accept_tier(accept(Tier::Teacher, CLASS_A))
        .await
        .unwrap();

    // Class B has no teacher approval yet.
    let err = fx
        .engine
        .accept_tier(accept_faculty(Tier::Faculty))
        .await
        .unwrap_err();
    assert_eq!(gate_reason(&err), GateReason::PreviousTierNotApproved);

    let status = fx.engine.class_status(CLASS_A, TERM).await.unwrap();
    assert!(!status.is_faculty_approved);
    let mut tx = fx.store.begin().await.unwrap();
    let snapshots = tx.list_student_history(StudentId(1), TERM).await.unwrap();
    assert!(snapshots.iter().all(|s| s.tier != Tier::Faculty));
    drop(tx);

    fx.engine
        .accept_tier(accept(Tier::Teacher, CLASS_B))
        .await
        .unwrap();
    let outcome = fx
        .engine
        .accept_tier(accept_faculty(Tier::Faculty))
        .await
        .unwrap();
    assert_eq!(
        outcome.class_codes,
        vec![CLASS_A.to_string(), CLASS_B.to_string()]
    );
    assert_eq!(outcome.students_processed, 3);
    assert!(fx.engine.class_status(CLASS_B, TERM).await.unwrap().is_faculty_approved);
}

#[tokio::test]
async fn locked_tier_rejects_new_scores() {
    let fx = fixture().await;
    save_all(&fx, &["SV001", "SV002"]).await;
    fx.engine
        .accept_tier(accept(Tier::Teacher, CLASS_A))
        .await
        .unwrap();

    let err = fx
        .engine
        .record_tier_score(record(Tier::Teacher, "SV001", 90))
        .await
        .unwrap_err();
    assert_eq!(gate_reason(&err), GateReason::AlreadyLocked);

    // The faculty gate is still open.
    fx.engine
        .record_tier_score(record(Tier::Faculty, "SV001", 90))
        .await
        .unwrap();
}

#[tokio::test]
async fn required_leader_tier_gates_the_teacher() {
    let fx = fixture_with(EngineConfig {
        leader_tier_required: true,
    })
    .await;
    save_all(&fx, &["SV001", "SV002"]).await;

    let err = fx
        .engine
        .accept_tier(accept(Tier::Teacher, CLASS_A))
        .await
        .unwrap_err();
    assert_eq!(gate_reason(&err), GateReason::PreviousTierNotApproved);

    fx.engine
        .accept_tier(accept(Tier::Leader, CLASS_A))
        .await
        .unwrap();
    fx.engine
        .accept_tier(accept(Tier::Teacher, CLASS_A))
        .await
        .unwrap();
}

#[tokio::test]
async fn optional_leader_tier_does_not_gate_the_teacher() {
    let fx = fixture().await;
    save_all(&fx, &["SV001", "SV002"]).await;

    fx.engine
        .accept_tier(accept(Tier::Teacher, CLASS_A))
        .await
        .unwrap();
    let status = fx.engine.class_status(CLASS_A, TERM).await.unwrap();
    assert!(status.is_teacher_approved);
    assert!(!status.is_leader_approved);
}

#[tokio::test]
async fn accept_input_is_validated() {
    let fx = fixture().await;

    let err = fx
        .engine
        .accept_tier(accept(Tier::Student, CLASS_A))
        .await
        .unwrap_err();
    assert!(matches!(err, ConductError::Validation(_)));

    let err = fx
        .engine
        .accept_tier(accept_faculty(Tier::Teacher))
        .await
        .unwrap_err();
    assert!(matches!(err, ConductError::Validation(_)));

    let err = fx
        .engine
        .accept_tier(accept(Tier::Teacher, "K99-XX"))
        .await
        .unwrap_err();
    assert!(matches!(err, ConductError::NotFound { entity: "class", .. }));

    let err = fx
        .engine
        .accept_tier(AcceptRequest {
            scope: ApprovalScope::Faculty("LAW".to_string()),
            ..accept(Tier::Faculty, CLASS_A)
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ConductError::NotFound { entity: "faculty", .. }));

    let err = fx
        .engine
        .record_tier_score(record(Tier::Leader, "SV001", -1))
        .await
        .unwrap_err();
    assert!(matches!(err, ConductError::Validation(_)));
}

#[tokio::test]
async fn unlocked_class_reports_open_gates() {
    let fx = fixture().await;
    let status = fx.engine.class_status(CLASS_B, TERM).await.unwrap();
    for tier in Tier::LADDER {
        assert!(!status.is_approved(tier));
    }
}

#[tokio::test]
async fn lower_tier_cannot_accept_after_a_superior() {
    let fx = fixture().await;
    save_all(&fx, &["SV001", "SV002"]).await;
    fx.engine
        .record_tier_score(record(Tier::Teacher, "SV001", 85))
        .await
        .unwrap();
    fx.engine
        .accept_tier(accept(Tier::Teacher, CLASS_A))
        .await
        .unwrap();
    fx.engine
        .accept_tier(accept(Tier::Faculty, CLASS_A))
        .await
        .unwrap();

    let err = fx
        .engine
        .accept_tier(accept(Tier::Leader, CLASS_A))
        .await
        .unwrap_err();
    assert_eq!(gate_reason(&err), GateReason::AlreadyLocked);
    assert!(err.to_string().contains("teacher approval"));

    let status = fx.engine.class_status(CLASS_A, TERM).await.unwrap();
    assert!(!status.is_leader_approved);
    let history = fx.engine.history("SV001").await.unwrap();
    assert_eq!(history[0].total_score, 85);
    assert_eq!(history[0].rank, Rank::Tot);
}

#[tokio::test]
async fn lower_tier_cannot_record_after_a_superior() {
    let fx = fixture().await;
    save_all(&fx, &["SV001", "SV002"]).await;
    fx.engine
        .accept_tier(accept(Tier::Teacher, CLASS_A))
        .await
        .unwrap();

    let err = fx
        .engine
        .record_tier_score(record(Tier::Leader, "SV001", 99))
        .await
        .unwrap_err();
    assert_eq!(gate_reason(&err), GateReason::AlreadyLocked);
    let message = err.to_string();
    assert!(message.contains("student SV001"), "{message}");
    assert!(message.contains("teacher approval"), "{message}");
}

fn confirm_volunteer(participated: bool) -> ConfirmVerificationRequest {
    ConfirmVerificationRequest {
        student_code: "SV001".to_string(),
        term_code: TERM.to_string(),
        criterion_code: "VOLUNTEER".to_string(),
        participated,
        note: None,
        verifier: "ctsv01".to_string(),
    }
}

async fn save_with_pending_volunteer(fx: &Fixture) {
    fx.engine
        .save_self_assessment(save_request(
            "SV001",
            vec![option("STUDY", 101), option("VOLUNTEER", 301)],
        ))
        .await
        .unwrap();
    save_all(fx, &["SV002"]).await;
}

#[tokio::test]
async fn confirmed_points_survive_the_teacher_accept() {
    let fx = fixture().await;
    save_with_pending_volunteer(&fx).await;

    let confirmed = fx
        .engine
        .confirm_verification(confirm_volunteer(true))
        .await
        .unwrap();
    assert_eq!(confirmed.total_score, 28);

    fx.engine
        .accept_tier(accept(Tier::Teacher, CLASS_A))
        .await
        .unwrap();

    let history = fx.engine.history("SV001").await.unwrap();
    assert_eq!(history[0].total_score, 28);

    let mut tx = fx.store.begin().await.unwrap();
    let snapshots = tx.list_student_history(StudentId(1), TERM).await.unwrap();
    let student = snapshots.iter().find(|s| s.tier == Tier::Student).unwrap();
    assert_eq!(student.total_score, 28);
    assert_eq!(student.changed_by, "ctsv01");
    let teacher = snapshots.iter().find(|s| s.tier == Tier::Teacher).unwrap();
    assert_eq!(teacher.total_score, 28);
}

#[tokio::test]
async fn unconfirm_is_carried_by_the_next_accept() {
    let fx = fixture().await;
    save_with_pending_volunteer(&fx).await;
    fx.engine
        .confirm_verification(confirm_volunteer(true))
        .await
        .unwrap();
    fx.engine
        .unconfirm_verification("SV001", TERM, "VOLUNTEER")
        .await
        .unwrap();

    fx.engine
        .accept_tier(accept(Tier::Teacher, CLASS_A))
        .await
        .unwrap();

    let mut tx = fx.store.begin().await.unwrap();
    let snapshots = tx.list_student_history(StudentId(1), TERM).await.unwrap();
    let student = snapshots.iter().find(|s| s.tier == Tier::Student).unwrap();
    assert_eq!(student.total_score, 20);
    assert_eq!(student.changed_by, "ctsv01");
    let teacher = snapshots.iter().find(|s| s.tier == Tier::Teacher).unwrap();
    assert_eq!(teacher.total_score, 20);
}

#[tokio::test]
async fn approved_term_score_is_not_overwritten_by_the_ledger() {
    let fx = fixture().await;
    save_with_pending_volunteer(&fx).await;
    fx.engine
        .record_tier_score(record(Tier::Teacher, "SV001", 70))
        .await
        .unwrap();
    fx.engine
        .accept_tier(accept(Tier::Teacher, CLASS_A))
        .await
        .unwrap();

    let confirmed = fx
        .engine
        .confirm_verification(confirm_volunteer(true))
        .await
        .unwrap();
    // The ledger moves on; the approved total stays with the teacher.
    assert_eq!(confirmed.total_score, 28);
    let history = fx.engine.history("SV001").await.unwrap();
    assert_eq!(history[0].total_score, 70);

    fx.engine
        .save_self_assessment(save_request("SV001", vec![option("STUDY", 103)]))
        .await
        .unwrap();
    let history = fx.engine.history("SV001").await.unwrap();
    assert_eq!(history[0].total_score, 70);

    // Faculty still sees the teacher's total, not the ledger.
    fx.engine
        .accept_tier(accept(Tier::Faculty, CLASS_A))
        .await
        .unwrap();
    let history = fx.engine.history("SV001").await.unwrap();
    assert_eq!(history[0].total_score, 70);
}
